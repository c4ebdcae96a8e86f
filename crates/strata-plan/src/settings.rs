//! Job settings.
//!
//! Lengths are integer micrometers, speeds are mm/s, times are
//! seconds. Settings arrive either as a whole deserialized document or
//! as individual `key=value` overrides via [`Settings::set`]; unknown
//! keys are reported to the caller and the job proceeds with defaults.

use serde::{Deserialize, Serialize};
use strata_gcode::GcodeFlavor;
use strata_geom::Point;

use crate::error::{PlanError, Result};

/// Settings consumed by the toolpath pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Layer thickness for non-first layers (um).
    pub layer_thickness: i64,
    /// First layer thickness (um).
    pub initial_layer_thickness: i64,
    /// Filament diameter (um).
    pub filament_diameter: i64,
    /// Flow percentage (100 = nominal).
    pub filament_flow: i64,
    /// Extrusion line width (um).
    pub extrusion_width: i64,

    /// Print speed (mm/s).
    pub print_speed: i32,
    /// Travel speed (mm/s).
    pub travel_speed: i32,
    /// First layer speed (mm/s).
    pub initial_layer_speed: i32,
    /// Number of layers over which speed ramps up from the first-layer
    /// speed to full speed.
    pub initial_speedup_layers: i32,

    /// Travel retraction distance (um).
    pub retraction_amount: i64,
    /// Retraction speed (mm/s).
    pub retraction_speed: i32,
    /// Dedicated extruder-switch retraction distance (um).
    pub retraction_amount_extruder_switch: i64,
    /// Travels shorter than this never retract (um).
    pub retraction_minimal_distance: i64,
    /// Minimum extrusion between two retractions (um of filament).
    pub minimal_extrusion_before_retraction: i64,

    /// Route travels inside printed geometry instead of retracting.
    pub enable_combing: bool,
    /// Minimum wall-clock time per layer (s).
    pub minimal_layer_time: f64,
    /// Floor for governed extrusion speed (mm/s).
    pub minimal_feedrate: i32,
    /// Lift the head and dwell when a layer finishes too fast.
    pub cool_head_lift: bool,

    /// Fan duty on early layers (percent).
    pub fan_speed_min: i32,
    /// Fan duty once fully on (percent).
    pub fan_speed_max: i32,
    /// Layer at which the fan reaches full duty.
    pub fan_full_on_layer_nr: i32,

    /// Print single-wall polygons as a continuous Z spiral.
    pub spiralize_mode: bool,
    /// Output dialect.
    pub gcode_flavor: GcodeFlavor,
    /// Physical XY offset per extruder (um).
    pub extruder_offset: Vec<Point>,

    /// Raw G-code emitted before the first layer.
    pub start_code: String,
    /// Raw G-code emitted after the last layer.
    pub end_code: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            layer_thickness: 100,
            initial_layer_thickness: 300,
            filament_diameter: 2890,
            filament_flow: 100,
            extrusion_width: 400,
            print_speed: 50,
            travel_speed: 200,
            initial_layer_speed: 20,
            initial_speedup_layers: 4,
            retraction_amount: 4500,
            retraction_speed: 45,
            retraction_amount_extruder_switch: 14_500,
            retraction_minimal_distance: 1500,
            minimal_extrusion_before_retraction: 100,
            enable_combing: true,
            minimal_layer_time: 5.0,
            minimal_feedrate: 10,
            cool_head_lift: false,
            fan_speed_min: 100,
            fan_speed_max: 100,
            fan_full_on_layer_nr: 2,
            spiralize_mode: false,
            gcode_flavor: GcodeFlavor::RepRap,
            extruder_offset: Vec::new(),
            start_code: "G21        ;metric values\n\
                         G90        ;absolute positioning\n\
                         G28        ;home\n\
                         G92 E0     ;zero the extruded length"
                .into(),
            end_code: "M104 S0    ;extruder heater off\n\
                       M140 S0    ;heated bed heater off\n\
                       G91        ;relative positioning\n\
                       G1 E-1 F300\n\
                       G28 X0 Y0  ;move out of the way\n\
                       M84        ;steppers off\n\
                       G90        ;absolute positioning"
                .into(),
        }
    }
}

impl Settings {
    /// Apply one `key=value` override. Returns `false` for an unknown
    /// key or an unparsable value, leaving the setting unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        fn parse<T: std::str::FromStr>(value: &str, slot: &mut T) -> bool {
            match value.parse() {
                Ok(v) => {
                    *slot = v;
                    true
                }
                Err(_) => false,
            }
        }

        match key {
            "layer_thickness" => parse(value, &mut self.layer_thickness),
            "initial_layer_thickness" => parse(value, &mut self.initial_layer_thickness),
            "filament_diameter" => parse(value, &mut self.filament_diameter),
            "filament_flow" => parse(value, &mut self.filament_flow),
            "extrusion_width" => parse(value, &mut self.extrusion_width),
            "print_speed" => parse(value, &mut self.print_speed),
            "travel_speed" => parse(value, &mut self.travel_speed),
            "initial_layer_speed" => parse(value, &mut self.initial_layer_speed),
            "initial_speedup_layers" => parse(value, &mut self.initial_speedup_layers),
            "retraction_amount" => parse(value, &mut self.retraction_amount),
            "retraction_speed" => parse(value, &mut self.retraction_speed),
            "retraction_amount_extruder_switch" => {
                parse(value, &mut self.retraction_amount_extruder_switch)
            }
            "retraction_minimal_distance" => parse(value, &mut self.retraction_minimal_distance),
            "minimal_extrusion_before_retraction" => {
                parse(value, &mut self.minimal_extrusion_before_retraction)
            }
            "enable_combing" => parse(value, &mut self.enable_combing),
            "minimal_layer_time" => parse(value, &mut self.minimal_layer_time),
            "minimal_feedrate" => parse(value, &mut self.minimal_feedrate),
            "cool_head_lift" => parse(value, &mut self.cool_head_lift),
            "fan_speed_min" => parse(value, &mut self.fan_speed_min),
            "fan_speed_max" => parse(value, &mut self.fan_speed_max),
            "fan_full_on_layer_nr" => parse(value, &mut self.fan_full_on_layer_nr),
            "spiralize_mode" => parse(value, &mut self.spiralize_mode),
            "gcode_flavor" => match GcodeFlavor::parse(value) {
                Some(flavor) => {
                    self.gcode_flavor = flavor;
                    true
                }
                None => false,
            },
            "start_code" => {
                self.start_code = value.to_owned();
                true
            }
            "end_code" => {
                self.end_code = value.to_owned();
                true
            }
            _ => false,
        }
    }

    /// Validate the settings before a job starts.
    pub fn validate(&self) -> Result<()> {
        if self.layer_thickness <= 0 || self.initial_layer_thickness <= 0 {
            return Err(PlanError::InvalidSettings(
                "layer thickness must be positive".into(),
            ));
        }
        if self.filament_diameter <= 0 {
            return Err(PlanError::InvalidSettings(
                "filament_diameter must be positive".into(),
            ));
        }
        if self.filament_flow <= 0 {
            return Err(PlanError::InvalidSettings(
                "filament_flow must be positive".into(),
            ));
        }
        if self.extrusion_width <= 0 {
            return Err(PlanError::InvalidSettings(
                "extrusion_width must be positive".into(),
            ));
        }
        if self.print_speed <= 0 || self.travel_speed <= 0 || self.initial_layer_speed <= 0 {
            return Err(PlanError::InvalidSettings(
                "speeds must be positive".into(),
            ));
        }
        if self.retraction_speed <= 0 {
            return Err(PlanError::InvalidSettings(
                "retraction_speed must be positive".into(),
            ));
        }
        Ok(())
    }
}
