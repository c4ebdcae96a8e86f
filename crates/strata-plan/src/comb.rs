//! Collision-aware travel routing seam ("comb").
//!
//! Boundary geometry and routing live outside this crate; the planner
//! only needs the three queries below. A failed route or nudge means
//! the planner falls back to a straight move with retraction.

use strata_geom::Point;

/// Routes travel moves so they stay inside the printed geometry.
pub trait TravelRouter {
    /// Waypoints for a safe route from `from` to `to`, excluding the
    /// endpoints, or `None` when no in-boundary route exists.
    fn route(&self, from: Point, to: Point) -> Option<Vec<Point>>;

    /// Is `p` inside the travel boundary?
    fn is_inside(&self, p: Point) -> bool;

    /// Nudge `p` inside the boundary by `margin` micrometers, or
    /// `None` when no nearby interior position exists.
    fn move_inside(&self, p: Point, margin: i64) -> Option<Point>;
}
