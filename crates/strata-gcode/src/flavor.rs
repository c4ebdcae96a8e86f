//! G-code flavor (dialect) definitions.
//!
//! A flavor is the command vocabulary a target firmware expects. The
//! set is closed; each variant supplies its own token formatting for
//! the operations that differ between firmwares (retraction, tool
//! select, fan control), selected once at configuration time.

use serde::{Deserialize, Serialize};

/// G-code flavor (dialect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GcodeFlavor {
    /// RepRap-style firmware (Marlin, RepRapFirmware). E values are
    /// filament lengths in millimeters.
    #[default]
    RepRap,
    /// Ultimaker UltiGCode. E values are extruded volume, and
    /// retraction is a firmware-side latch (`G10`/`G11`).
    UltiGcode,
    /// MakerBot firmware. Fan and tool-select use `M12x`/`M135`.
    MakerBot,
}

impl GcodeFlavor {
    /// Does this flavor pair retract/unretract as single latch
    /// commands instead of explicit E-axis moves?
    pub fn has_retract_latch(&self) -> bool {
        matches!(self, GcodeFlavor::UltiGcode)
    }

    /// Does this flavor consume volume on the E axis? If so the
    /// extrusion ratio needs no filament cross-section correction.
    pub fn volumetric_e(&self) -> bool {
        matches!(self, GcodeFlavor::UltiGcode)
    }

    /// Fan-on instruction at the given 8-bit duty cycle.
    pub fn fan_on_line(&self, duty: i32) -> String {
        match self {
            GcodeFlavor::MakerBot => format!("M126 T0 ; value = {duty}"),
            _ => format!("M106 S{duty}"),
        }
    }

    /// Fan-off instruction.
    pub fn fan_off_line(&self) -> &'static str {
        match self {
            GcodeFlavor::MakerBot => "M127 T0",
            _ => "M107",
        }
    }

    /// Tool-select instruction for the given extruder index.
    pub fn tool_change_line(&self, extruder: usize) -> String {
        match self {
            GcodeFlavor::MakerBot => format!("M135 T{extruder}"),
            _ => format!("T{extruder}"),
        }
    }

    /// Parse a flavor name as used in settings files.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "reprap" => Some(GcodeFlavor::RepRap),
            "ultigcode" => Some(GcodeFlavor::UltiGcode),
            "makerbot" => Some(GcodeFlavor::MakerBot),
            _ => None,
        }
    }
}
