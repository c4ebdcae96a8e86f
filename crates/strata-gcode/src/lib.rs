#![warn(missing_docs)]

//! G-code emission for the strata toolpath core.
//!
//! This crate owns the machine state of one print job: head position,
//! per-extruder filament accounting, retraction state, commanded feed
//! rate and fan duty. Every operation emits at most a handful of
//! instruction lines and updates that state in lock-step, so the
//! emitted stream always matches what the machine will physically do.
//!
//! # Example
//!
//! ```no_run
//! use strata_gcode::{GcodeExport, GcodeFlavor};
//! use strata_geom::Point;
//!
//! let sink = std::fs::File::create("out.gcode")?;
//! let mut gcode = GcodeExport::new(sink);
//! gcode.set_flavor(GcodeFlavor::RepRap);
//! gcode.set_extrusion(100, 2890, 100);
//! gcode.set_z(300);
//! gcode.write_move(Point::new(10_000, 10_000), 150, 0)?;
//! # Ok::<(), strata_gcode::GcodeError>(())
//! ```

pub mod error;
pub mod estimate;
pub mod export;
pub mod flavor;

pub use error::{GcodeError, Result};
pub use estimate::{MoveSample, NominalTimeEstimator, TimeEstimator};
pub use export::{GcodeExport, MAX_EXTRUDERS};
pub use flavor::GcodeFlavor;
