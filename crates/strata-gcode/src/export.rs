//! The instruction emitter.
//!
//! [`GcodeExport`] is the single owner of the machine state for one
//! job: everything it emits is derived from, and folded back into,
//! that state. The state is path dependent (position, accumulated
//! extrusion, retraction), so operations must be invoked in the exact
//! order the machine is meant to execute them. Tests instantiate
//! independent emitters over in-memory sinks.

use std::io::Write;

use strata_geom::{Point, Point3, MICRONS_PER_MM};

use crate::error::Result;
use crate::estimate::{MoveSample, NominalTimeEstimator, TimeEstimator};
use crate::flavor::GcodeFlavor;

/// Maximum number of extruders a job can address.
pub const MAX_EXTRUDERS: usize = 16;

/// Accumulated E beyond this many millimeters loses precision in the
/// 5-decimal output format, so the counter is re-zeroed first.
const EXTRUSION_RESET_THRESHOLD_MM: f64 = 10_000.0;

/// G-code emitter and machine-state tracker.
///
/// Owns the output sink for the lifetime of the job. All geometry
/// arrives in integer micrometers and is converted to millimeters only
/// when formatted: planar coordinates to 2 decimals, E values to 5.
pub struct GcodeExport<W: Write> {
    sink: W,
    flavor: GcodeFlavor,

    extrusion_amount: f64,
    extrusion_per_mm: f64,
    retraction_amount_mm: f64,
    extruder_switch_retraction_mm: f64,
    minimal_extrusion_before_retraction_mm: f64,
    extrusion_at_previous_retraction: f64,
    is_retracted: bool,

    current_position: Point3,
    z_pos: i64,
    current_speed: i32,
    retraction_speed: i32,
    extruder_index: usize,
    extruder_offset: [Point; MAX_EXTRUDERS],
    fan_duty: Option<i32>,

    total_filament: [f64; MAX_EXTRUDERS],
    total_print_time: f64,
    estimator: Box<dyn TimeEstimator>,
}

impl<W: Write> GcodeExport<W> {
    /// Create an emitter writing to `sink`.
    ///
    /// The machine starts retracted, with the previous-retraction mark
    /// far in the past so the first retraction is always eligible.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            flavor: GcodeFlavor::default(),
            extrusion_amount: 0.0,
            extrusion_per_mm: 0.0,
            retraction_amount_mm: 4.5,
            extruder_switch_retraction_mm: 14.5,
            minimal_extrusion_before_retraction_mm: 0.0,
            extrusion_at_previous_retraction: -10_000.0,
            is_retracted: true,
            current_position: Point3::default(),
            z_pos: 0,
            current_speed: 0,
            retraction_speed: 45,
            extruder_index: 0,
            extruder_offset: [Point::default(); MAX_EXTRUDERS],
            fan_duty: None,
            total_filament: [0.0; MAX_EXTRUDERS],
            total_print_time: 0.0,
            estimator: Box::new(NominalTimeEstimator::new()),
        }
    }

    /// Replace the time estimator (e.g. with an acceleration-aware one).
    pub fn set_estimator(&mut self, estimator: Box<dyn TimeEstimator>) {
        self.estimator = estimator;
    }

    /// Select the output dialect.
    pub fn set_flavor(&mut self, flavor: GcodeFlavor) {
        self.flavor = flavor;
    }

    /// The active output dialect.
    pub fn flavor(&self) -> GcodeFlavor {
        self.flavor
    }

    /// Set the physical XY offset of an extruder's nozzle, micrometers.
    pub fn set_extruder_offset(&mut self, extruder: usize, offset: Point) {
        self.extruder_offset[extruder] = offset;
    }

    /// Derive the volumetric-to-linear extrusion ratio for a layer.
    ///
    /// Must be called again whenever the layer thickness changes.
    /// `flow_pct` is the flow percentage (100 = nominal).
    pub fn set_extrusion(&mut self, layer_thickness_um: i64, filament_diameter_um: i64, flow_pct: i64) {
        let radius_mm = filament_diameter_um as f64 / MICRONS_PER_MM as f64 / 2.0;
        let filament_area = std::f64::consts::PI * radius_mm * radius_mm;
        if self.flavor.volumetric_e() {
            // Volume on the E axis: no cross-section correction needed.
            self.extrusion_per_mm = layer_thickness_um as f64 / MICRONS_PER_MM as f64;
        } else {
            self.extrusion_per_mm = layer_thickness_um as f64 / MICRONS_PER_MM as f64 / filament_area
                * flow_pct as f64
                / 100.0;
        }
    }

    /// Configure retraction. Takes effect on the next retraction.
    pub fn set_retraction(
        &mut self,
        amount_um: i64,
        speed_mm_s: i32,
        extruder_switch_um: i64,
        minimal_extrusion_um: i64,
    ) {
        self.retraction_amount_mm = amount_um as f64 / MICRONS_PER_MM as f64;
        self.retraction_speed = speed_mm_s;
        self.extruder_switch_retraction_mm = extruder_switch_um as f64 / MICRONS_PER_MM as f64;
        self.minimal_extrusion_before_retraction_mm =
            minimal_extrusion_um as f64 / MICRONS_PER_MM as f64;
    }

    /// Set the Z height for subsequent moves, micrometers. The Z token
    /// is only emitted on the first move after it changes.
    pub fn set_z(&mut self, z_um: i64) {
        self.z_pos = z_um;
    }

    /// Current planar head position.
    pub fn position_xy(&self) -> Point {
        self.current_position.xy()
    }

    /// Current head Z, micrometers.
    pub fn position_z(&self) -> i64 {
        self.current_position.z
    }

    /// Index of the active extruder.
    pub fn extruder_index(&self) -> usize {
        self.extruder_index
    }

    /// Is the filament currently retracted?
    pub fn is_retracted(&self) -> bool {
        self.is_retracted
    }

    /// Lifetime filament use for an extruder, millimeters, including
    /// the live counter if it is the active one.
    pub fn total_filament_used(&self, extruder: usize) -> f64 {
        if extruder == self.extruder_index {
            self.total_filament[extruder] + self.extrusion_amount
        } else {
            self.total_filament[extruder]
        }
    }

    /// Cumulative print time committed so far, seconds.
    pub fn total_print_time(&self) -> f64 {
        self.total_print_time
    }

    /// Drain the time estimator into the cumulative print time.
    pub fn update_total_print_time(&mut self) {
        self.total_print_time += self.estimator.drain();
    }

    /// Emit a comment line (`;text`). Never parsed back.
    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        writeln!(self.sink, ";{text}")?;
        Ok(())
    }

    /// Emit a raw block verbatim, e.g. configured start/end G-code.
    pub fn write_raw(&mut self, code: &str) -> Result<()> {
        writeln!(self.sink, "{code}")?;
        Ok(())
    }

    /// Zero the E axis. Folds the accumulated amount into the active
    /// extruder's lifetime total and shifts the previous-retraction
    /// mark so retraction gating stays consistent.
    pub fn reset_extrusion_value(&mut self) -> Result<()> {
        if self.extrusion_amount != 0.0 {
            writeln!(self.sink, "G92 E0")?;
            self.total_filament[self.extruder_index] += self.extrusion_amount;
            self.extrusion_at_previous_retraction -= self.extrusion_amount;
            self.extrusion_amount = 0.0;
        }
        Ok(())
    }

    /// Emit a dwell for `seconds` and account for it.
    pub fn write_delay(&mut self, seconds: f64) -> Result<()> {
        writeln!(self.sink, "G4 P{}", (seconds * 1000.0) as i64)?;
        self.total_print_time += seconds;
        Ok(())
    }

    /// Emit one move to `p` at `speed_mm_s`.
    ///
    /// `line_width_um == 0` is a non-extruding travel move; it never
    /// touches extrusion accounting or retraction state. A nonzero
    /// width deposits material: if the machine is retracted an
    /// un-retraction is emitted first, then the E counter advances by
    /// the volume-corrected planar distance. Feed-rate and Z tokens
    /// are emitted only when they changed.
    pub fn write_move(&mut self, p: Point, speed_mm_s: i32, line_width_um: i64) -> Result<()> {
        if line_width_um != 0 {
            let diff = p - self.position_xy();
            if self.is_retracted {
                if self.flavor.has_retract_latch() {
                    writeln!(self.sink, "G11")?;
                } else {
                    writeln!(
                        self.sink,
                        "G1 F{} E{:.5}",
                        self.retraction_speed * 60,
                        self.extrusion_amount
                    )?;
                    self.current_speed = self.retraction_speed;
                    self.estimator.plan(
                        MoveSample::new(
                            p.x as f64 / MICRONS_PER_MM as f64,
                            p.y as f64 / MICRONS_PER_MM as f64,
                            self.z_pos as f64 / MICRONS_PER_MM as f64,
                            self.extrusion_amount,
                        ),
                        self.current_speed as f64,
                    );
                }
                if self.extrusion_amount > EXTRUSION_RESET_THRESHOLD_MM {
                    self.reset_extrusion_value()?;
                }
                self.is_retracted = false;
            }
            self.extrusion_amount +=
                self.extrusion_per_mm * (line_width_um as f64 / MICRONS_PER_MM as f64) * diff.vsize_mm();
            write!(self.sink, "G1")?;
        } else {
            write!(self.sink, "G0")?;
        }

        if self.current_speed != speed_mm_s {
            write!(self.sink, " F{}", speed_mm_s * 60)?;
            self.current_speed = speed_mm_s;
        }
        let offset = self.extruder_offset[self.extruder_index];
        write!(
            self.sink,
            " X{:.2} Y{:.2}",
            (p.x - offset.x) as f64 / MICRONS_PER_MM as f64,
            (p.y - offset.y) as f64 / MICRONS_PER_MM as f64
        )?;
        if self.z_pos != self.current_position.z {
            write!(self.sink, " Z{:.2}", self.z_pos as f64 / MICRONS_PER_MM as f64)?;
        }
        if line_width_um != 0 {
            write!(self.sink, " E{:.5}", self.extrusion_amount)?;
        }
        writeln!(self.sink)?;

        self.current_position = Point3::new(p.x, p.y, self.z_pos);
        self.estimator.plan(
            MoveSample::new(
                self.current_position.x as f64 / MICRONS_PER_MM as f64,
                self.current_position.y as f64 / MICRONS_PER_MM as f64,
                self.current_position.z as f64 / MICRONS_PER_MM as f64,
                self.extrusion_amount,
            ),
            self.current_speed as f64,
        );
        Ok(())
    }

    /// Emit a retraction, if one is due.
    ///
    /// No-op while already retracted, when retraction is disabled, or
    /// when too little extrusion happened since the last retraction to
    /// justify another one.
    pub fn write_retraction(&mut self) -> Result<()> {
        if self.retraction_amount_mm > 0.0
            && !self.is_retracted
            && self.extrusion_at_previous_retraction + self.minimal_extrusion_before_retraction_mm
                < self.extrusion_amount
        {
            if self.flavor.has_retract_latch() {
                writeln!(self.sink, "G10")?;
            } else {
                writeln!(
                    self.sink,
                    "G1 F{} E{:.5}",
                    self.retraction_speed * 60,
                    self.extrusion_amount - self.retraction_amount_mm
                )?;
                self.current_speed = self.retraction_speed;
                self.estimator.plan(
                    MoveSample::new(
                        self.current_position.x as f64 / MICRONS_PER_MM as f64,
                        self.current_position.y as f64 / MICRONS_PER_MM as f64,
                        self.current_position.z as f64 / MICRONS_PER_MM as f64,
                        self.extrusion_amount - self.retraction_amount_mm,
                    ),
                    self.current_speed as f64,
                );
            }
            self.extrusion_at_previous_retraction = self.extrusion_amount;
            self.is_retracted = true;
        }
        Ok(())
    }

    /// Switch the active extruder. No-op if already active.
    ///
    /// Flushes the outgoing extruder's E accounting, emits the
    /// dedicated (larger) extruder-switch retraction, then the
    /// tool-select token.
    pub fn switch_extruder(&mut self, new_extruder: usize) -> Result<()> {
        if self.extruder_index == new_extruder {
            return Ok(());
        }

        self.reset_extrusion_value()?;
        self.extruder_index = new_extruder;
        tracing::debug!("switching to extruder {new_extruder}");

        if self.flavor.has_retract_latch() {
            writeln!(self.sink, "G10 S1")?;
        } else {
            writeln!(
                self.sink,
                "G1 F{} E{:.4}",
                self.retraction_speed * 60,
                self.extrusion_amount - self.extruder_switch_retraction_mm
            )?;
            self.current_speed = self.retraction_speed;
        }
        self.is_retracted = true;
        writeln!(self.sink, "{}", self.flavor.tool_change_line(new_extruder))?;
        Ok(())
    }

    /// Set the part-cooling fan to `percent` (0 turns it off). No-op
    /// when the duty is unchanged. The logical 0-100 range is scaled
    /// to the 8-bit duty cycle the firmware expects.
    pub fn write_fan_command(&mut self, percent: i32) -> Result<()> {
        if self.fan_duty == Some(percent) {
            return Ok(());
        }
        if percent > 0 {
            let line = self.flavor.fan_on_line(percent * 255 / 100);
            writeln!(self.sink, "{line}")?;
        } else {
            writeln!(self.sink, "{}", self.flavor.fan_off_line())?;
        }
        self.fan_duty = Some(percent);
        Ok(())
    }

    /// Flush and hand back the output sink.
    pub fn finish(mut self) -> Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}
