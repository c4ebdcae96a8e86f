//! strata CLI - G-code generation for sliced layer geometry.
//!
//! Consumes JSON layer documents (polygon outlines in integer
//! micrometers, one Z height per layer) and writes a G-code stream
//! through the strata planning pipeline.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use strata_gcode::{GcodeExport, GcodeFlavor};
use strata_geom::Polygon;
use strata_plan::{LayerPlanner, PathConfig, PathConfigs, PlanError, Settings};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Generate printer G-code from sliced layer polygons", version)]
struct Cli {
    /// Output G-code file
    #[arg(short, long)]
    output: PathBuf,

    /// Override a setting, e.g. -s print_speed=60 (repeatable)
    #[arg(short = 's', value_name = "KEY=VALUE")]
    setting: Vec<String>,

    /// Load settings from a TOML file before applying -s overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings to a TOML file, then continue
    #[arg(long, value_name = "FILE")]
    dump_settings: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Legacy binary mesh input
    #[arg(long, value_name = "FILE")]
    binary_mesh: Option<PathBuf>,

    /// Legacy 3x3 transform matrix
    #[arg(long, value_name = "MATRIX")]
    matrix: Option<String>,

    /// Sliced layer documents (JSON arrays of layers)
    #[arg(required = true)]
    layers: Vec<PathBuf>,
}

/// One sliced layer: outline polygons at a Z height, micrometers.
#[derive(Debug, Deserialize)]
struct LayerDoc {
    z: i64,
    polygons: Vec<Polygon>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    reject_legacy_inputs(&cli)?;

    let mut settings = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => Settings::default(),
    };
    for override_ in &cli.setting {
        match override_.split_once('=') {
            Some((key, value)) => {
                if !settings.set(key, value) {
                    warn!("setting not found: {key}={value}");
                }
            }
            None => warn!("ignoring malformed override (expected key=value): {override_}"),
        }
    }
    settings.validate()?;

    if let Some(path) = &cli.dump_settings {
        let text = toml::to_string_pretty(&settings).context("failed to serialize settings")?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;
    }

    let mut layers: Vec<LayerDoc> = Vec::new();
    for path in &cli.layers {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read layer document {}", path.display()))?;
        let mut doc: Vec<LayerDoc> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse layer document {}", path.display()))?;
        layers.append(&mut doc);
    }
    info!("loaded {} layers", layers.len());

    // The output sink is the one thing that can fail at configuration
    // time; nothing is emitted before it is open.
    let sink = File::create(&cli.output)
        .with_context(|| format!("failed to open {} for output", cli.output.display()))?;
    let mut gcode = GcodeExport::new(BufWriter::new(sink));

    run_job(&mut gcode, &settings, &layers)?;

    let used = gcode.total_filament_used(0);
    let time = gcode.total_print_time();
    info!("print time estimate: {:.0}s", time);
    info!("filament used: {:.0}mm", used);
    gcode.finish()?;
    Ok(())
}

/// Fail fast on input paths this tool deliberately does not handle,
/// instead of guessing at intent.
fn reject_legacy_inputs(cli: &Cli) -> Result<()> {
    if let Some(path) = &cli.binary_mesh {
        return Err(PlanError::NotSupported(format!("binary mesh input {}", path.display())).into());
    }
    if cli.matrix.is_some() {
        return Err(PlanError::NotSupported("transform-matrix input".into()).into());
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn run_job<W: std::io::Write>(
    gcode: &mut GcodeExport<W>,
    settings: &Settings,
    layers: &[LayerDoc],
) -> Result<()> {
    gcode.set_flavor(settings.gcode_flavor);
    gcode.set_retraction(
        settings.retraction_amount,
        settings.retraction_speed,
        settings.retraction_amount_extruder_switch,
        settings.minimal_extrusion_before_retraction,
    );
    for (index, offset) in settings.extruder_offset.iter().enumerate() {
        gcode.set_extruder_offset(index, *offset);
    }

    gcode.write_comment("Generated with strata")?;
    if settings.gcode_flavor != GcodeFlavor::UltiGcode {
        gcode.write_raw(&settings.start_code)?;
    }

    let mut configs = PathConfigs::new();
    let travel = configs.insert(PathConfig::travel(settings.travel_speed));
    let mut wall_config = PathConfig::new(settings.print_speed, settings.extrusion_width, "WALL-OUTER");
    if settings.spiralize_mode {
        wall_config = wall_config.spiralized();
    }
    let wall = configs.insert(wall_config);

    for (layer_nr, layer) in layers.iter().enumerate() {
        let outline_mm: f64 = layer.polygons.iter().map(Polygon::perimeter_mm).sum();
        debug!(
            "layer {layer_nr}: {} polygons, {outline_mm:.1}mm outline at z={}",
            layer.polygons.len(),
            layer.z
        );
        let thickness = if layer_nr == 0 {
            settings.initial_layer_thickness
        } else {
            settings.layer_thickness
        };
        gcode.write_comment(&format!("LAYER:{layer_nr}"))?;
        gcode.set_extrusion(thickness, settings.filament_diameter, settings.filament_flow);
        gcode.set_z(layer.z);
        gcode.write_fan_command(fan_duty(settings, layer_nr))?;

        let mut planner = LayerPlanner::new(gcode, &configs, travel, settings.retraction_minimal_distance);
        planner.set_always_retract(!settings.enable_combing);
        planner.set_extrude_speed_factor(speedup_factor(settings, layer_nr));
        planner.add_polygons_ordered(&layer.polygons, wall);
        planner.force_minimal_layer_time(settings.minimal_layer_time, settings.minimal_feedrate);
        planner.write_gcode(settings.cool_head_lift, thickness)?;
    }

    if settings.gcode_flavor != GcodeFlavor::UltiGcode {
        gcode.write_raw(&settings.end_code)?;
    }
    gcode.update_total_print_time();
    Ok(())
}

/// Extrusion speed factor (percent) for the initial-layer ramp: the
/// first layer runs at the initial-layer speed, then speed climbs
/// linearly back to 100% over the speedup layers.
fn speedup_factor(settings: &Settings, layer_nr: usize) -> i32 {
    let n = settings.initial_speedup_layers;
    if n <= 0 || layer_nr as i32 >= n {
        return 100;
    }
    let base = settings.initial_layer_speed * 100 / settings.print_speed;
    base + (100 - base) * layer_nr as i32 / n
}

/// Fan duty (percent) for a layer: ramps from the minimum up to full
/// duty at `fan_full_on_layer_nr`.
fn fan_duty(settings: &Settings, layer_nr: usize) -> i32 {
    let full_on = settings.fan_full_on_layer_nr;
    if full_on <= 0 || layer_nr as i32 >= full_on {
        return settings.fan_speed_max;
    }
    settings.fan_speed_min * layer_nr as i32 / full_on
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_geom::Point;

    #[test]
    fn test_speedup_factor_ramp() {
        let settings = Settings::default(); // 20mm/s initial over 4 layers, 50mm/s print
        assert_eq!(speedup_factor(&settings, 0), 40);
        assert_eq!(speedup_factor(&settings, 2), 70);
        assert_eq!(speedup_factor(&settings, 4), 100);
        assert_eq!(speedup_factor(&settings, 100), 100);
    }

    #[test]
    fn test_fan_duty_ramp() {
        let settings = Settings::default(); // min 100, max 100, full on at 2
        assert_eq!(fan_duty(&settings, 0), 0);
        assert_eq!(fan_duty(&settings, 1), 50);
        assert_eq!(fan_duty(&settings, 2), 100);
    }

    #[test]
    fn test_run_job_emits_layers() {
        let settings = Settings::default();
        let layers = vec![
            LayerDoc {
                z: 300,
                polygons: vec![Polygon::new(vec![
                    Point::new(0, 0),
                    Point::new(20_000, 0),
                    Point::new(20_000, 20_000),
                ])],
            },
            LayerDoc {
                z: 400,
                polygons: vec![Polygon::new(vec![
                    Point::new(0, 0),
                    Point::new(20_000, 0),
                    Point::new(20_000, 20_000),
                ])],
            },
        ];
        let mut gcode = GcodeExport::new(Vec::new());
        run_job(&mut gcode, &settings, &layers).unwrap();
        assert!(gcode.total_filament_used(0) > 0.0);
        let text = String::from_utf8(gcode.finish().unwrap()).unwrap();
        assert!(text.contains(";LAYER:0"));
        assert!(text.contains(";LAYER:1"));
        assert!(text.contains("G92 E0"));
        assert!(text.lines().any(|l| l.contains(" Z0.30")));
        assert!(text.lines().any(|l| l.contains(" Z0.40")));
    }

    #[test]
    fn test_legacy_inputs_rejected() {
        let cli = Cli::parse_from([
            "strata", "-o", "out.gcode", "--binary-mesh", "part.stl", "layers.json",
        ]);
        let err = reject_legacy_inputs(&cli).unwrap_err();
        assert!(err.to_string().contains("not supported"));

        let cli = Cli::parse_from([
            "strata", "-o", "out.gcode", "--matrix", "1,0,0,0,1,0,0,0,1", "layers.json",
        ]);
        assert!(reject_legacy_inputs(&cli).is_err());
    }

    #[test]
    fn test_layer_doc_parses() {
        let doc = r#"[{"z":300,"polygons":[{"points":[{"x":0,"y":0},{"x":1000,"y":0},{"x":1000,"y":1000}]}]}]"#;
        let layers: Vec<LayerDoc> = serde_json::from_str(doc).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].polygons[0].len(), 3);
    }
}
