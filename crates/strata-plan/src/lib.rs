#![warn(missing_docs)]

//! Per-layer path planning for the strata toolpath core.
//!
//! This crate sits between layer geometry and the instruction emitter:
//! it buffers typed travel/extrusion segments, decides where to
//! retract, orders polygons for short travels, governs per-layer speed
//! for minimum layer time, and finally replays the buffer into a
//! [`strata_gcode::GcodeExport`].
//!
//! # Example
//!
//! ```no_run
//! use strata_gcode::GcodeExport;
//! use strata_geom::{Point, Polygon};
//! use strata_plan::{LayerPlanner, PathConfig, PathConfigs};
//!
//! let mut configs = PathConfigs::new();
//! let travel = configs.insert(PathConfig::travel(150));
//! let wall = configs.insert(PathConfig::new(50, 400, "WALL-OUTER"));
//!
//! let mut gcode = GcodeExport::new(std::fs::File::create("out.gcode")?);
//! let mut planner = LayerPlanner::new(&mut gcode, &configs, travel, 1500);
//! planner.add_polygons_ordered(&[Polygon::new(vec![
//!     Point::new(0, 0),
//!     Point::new(10_000, 0),
//!     Point::new(10_000, 10_000),
//! ])], wall);
//! planner.force_minimal_layer_time(5.0, 10);
//! planner.write_gcode(false, 100)?;
//! # Ok::<(), strata_gcode::GcodeError>(())
//! ```

pub mod comb;
pub mod config;
pub mod error;
pub mod order;
pub mod planner;
pub mod settings;

pub use comb::TravelRouter;
pub use config::{ConfigKey, PathConfig, PathConfigs};
pub use error::{PlanError, Result};
pub use order::PathOrderOptimizer;
pub use planner::LayerPlanner;
pub use settings::Settings;
