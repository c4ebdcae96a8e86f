//! The per-layer path planner.
//!
//! Buffers typed path segments, decides retraction while buffering,
//! then replays the buffer into the emitter in one terminal pass that
//! applies speed governance, merges degenerate dab moves and handles
//! vase-mode Z ramping.

use std::io::Write;

use strata_gcode::GcodeExport;
use strata_geom::{Point, Polygon};

use crate::comb::TravelRouter;
use crate::config::{ConfigKey, PathConfigs};
use crate::order::PathOrderOptimizer;

/// Extra dwell shorter than this is dropped rather than absorbed.
const IDLE_TIME_TOLERANCE: f64 = 0.1;

/// One buffered path segment: an ordered run of points sharing a move
/// profile and an extruder.
#[derive(Debug)]
struct GcodePath {
    config: ConfigKey,
    /// Retract before the first point of this segment.
    retract: bool,
    extruder: usize,
    points: Vec<Point>,
    /// Closed for appending; a new segment must be started even for
    /// the same profile.
    done: bool,
}

/// Plans and emits the moves of one layer.
pub struct LayerPlanner<'a, W: Write> {
    gcode: &'a mut GcodeExport<W>,
    configs: &'a PathConfigs,
    router: Option<&'a dyn TravelRouter>,

    travel_config: ConfigKey,
    paths: Vec<GcodePath>,
    last_position: Point,
    current_extruder: usize,

    extrude_speed_factor: i32,
    travel_speed_factor: i32,
    retraction_minimal_distance: i64,
    force_retraction: bool,
    always_retract: bool,

    extra_time: f64,
    total_print_time: f64,
}

impl<'a, W: Write> LayerPlanner<'a, W> {
    /// Create a planner over `gcode` for one layer.
    ///
    /// `travel_config` must be a zero-width profile in `configs`;
    /// travels below `retraction_minimal_distance` micrometers never
    /// retract.
    pub fn new(
        gcode: &'a mut GcodeExport<W>,
        configs: &'a PathConfigs,
        travel_config: ConfigKey,
        retraction_minimal_distance: i64,
    ) -> Self {
        let last_position = gcode.position_xy();
        let current_extruder = gcode.extruder_index();
        Self {
            gcode,
            configs,
            router: None,
            travel_config,
            paths: Vec::new(),
            last_position,
            current_extruder,
            extrude_speed_factor: 100,
            travel_speed_factor: 100,
            retraction_minimal_distance,
            force_retraction: false,
            always_retract: false,
            extra_time: 0.0,
            total_print_time: 0.0,
        }
    }

    /// Attach a collision-aware travel router for this layer.
    pub fn set_router(&mut self, router: Option<&'a dyn TravelRouter>) {
        self.router = router;
    }

    /// Retract before every sufficiently long travel.
    pub fn set_always_retract(&mut self, always_retract: bool) {
        self.always_retract = always_retract;
    }

    /// Force a retraction before the next travel move.
    pub fn force_retract(&mut self) {
        self.force_retraction = true;
    }

    /// Select the extruder for subsequently buffered segments.
    /// Returns whether the selection changed.
    pub fn set_extruder(&mut self, extruder: usize) -> bool {
        if extruder == self.current_extruder {
            return false;
        }
        self.current_extruder = extruder;
        true
    }

    /// Extruder for subsequently buffered segments.
    pub fn extruder(&self) -> usize {
        self.current_extruder
    }

    /// Set the extrusion speed factor, percent. Clamped to at least 1.
    pub fn set_extrude_speed_factor(&mut self, factor_pct: i32) {
        self.extrude_speed_factor = factor_pct.max(1);
    }

    /// Extrusion speed factor, percent.
    pub fn extrude_speed_factor(&self) -> i32 {
        self.extrude_speed_factor
    }

    /// Set the travel speed factor, percent. Clamped to at least 1.
    pub fn set_travel_speed_factor(&mut self, factor_pct: i32) {
        self.travel_speed_factor = factor_pct.max(1);
    }

    /// Travel speed factor, percent.
    pub fn travel_speed_factor(&self) -> i32 {
        self.travel_speed_factor
    }

    /// Idle time the governor could not absorb by slowing extrusion.
    pub fn extra_time(&self) -> f64 {
        self.extra_time
    }

    /// Planned print time for this layer, seconds. Valid after
    /// [`force_minimal_layer_time`](Self::force_minimal_layer_time).
    pub fn total_print_time(&self) -> f64 {
        self.total_print_time
    }

    /// Index of the open segment with `config`, appending a fresh one
    /// when the latest segment has another profile or is closed.
    fn latest_path_index(&mut self, config: ConfigKey) -> usize {
        if let Some(last) = self.paths.last() {
            if last.config == config && !last.done {
                return self.paths.len() - 1;
            }
        }
        self.paths.push(GcodePath {
            config,
            retract: false,
            extruder: self.current_extruder,
            points: Vec::new(),
            done: false,
        });
        self.paths.len() - 1
    }

    /// Close the open segment so nothing more is appended to it.
    fn force_new_path_start(&mut self) {
        if let Some(last) = self.paths.last_mut() {
            last.done = true;
        }
    }

    /// Buffer a travel move to `p`, deciding whether it retracts.
    ///
    /// Exactly one branch applies: a forced retraction, the router's
    /// verdict, or the always-retract policy. In every branch a travel
    /// below the minimal retraction distance stays unretracted.
    pub fn add_travel(&mut self, p: Point) {
        let idx = self.latest_path_index(self.travel_config);
        if self.force_retraction {
            if !(self.last_position - p).shorter_than(self.retraction_minimal_distance) {
                self.paths[idx].retract = true;
            }
            self.force_retraction = false;
        } else if let Some(router) = self.router {
            if let Some(waypoints) = router.route(self.last_position, p) {
                self.paths[idx].points.extend(waypoints);
            } else if !(self.last_position - p).shorter_than(self.retraction_minimal_distance) {
                self.paths[idx].retract = true;
            }
        } else if self.always_retract
            && !(self.last_position - p).shorter_than(self.retraction_minimal_distance)
        {
            self.paths[idx].retract = true;
        }
        self.paths[idx].points.push(p);
        self.last_position = p;
    }

    /// Buffer an extrusion move to `p` with the given profile.
    pub fn add_extrusion_move(&mut self, p: Point, config: ConfigKey) {
        let idx = self.latest_path_index(config);
        self.paths[idx].points.push(p);
        self.last_position = p;
    }

    /// If the head is outside the travel boundary, nudge it inside by
    /// `margin` micrometers. The nudge is applied twice to escape
    /// sharp interior corners, recorded as a travel move, and the
    /// segment is closed so a later retraction attaches to the move
    /// that follows rather than to the nudge.
    pub fn move_inside_boundary(&mut self, margin: i64) {
        let Some(router) = self.router else {
            return;
        };
        if router.is_inside(self.last_position) {
            return;
        }
        if let Some(once) = router.move_inside(self.last_position, margin) {
            let twice = router.move_inside(once, margin).unwrap_or(once);
            if router.is_inside(twice) {
                self.add_travel(twice);
                self.force_new_path_start();
            }
        }
    }

    /// Buffer a whole polygon: travel to the chosen start vertex, then
    /// extrude through the remaining vertices in order, closing the
    /// loop when the polygon has more than two vertices.
    pub fn add_polygon(&mut self, polygon: &Polygon, start_index: usize, config: ConfigKey) {
        if polygon.is_empty() {
            return;
        }
        self.add_travel(polygon.points[start_index]);
        for i in 1..polygon.len() {
            let p = polygon.points[(start_index + i) % polygon.len()];
            self.add_extrusion_move(p, config);
        }
        if polygon.len() > 2 {
            self.add_extrusion_move(polygon.points[start_index], config);
        }
    }

    /// Buffer a set of polygons in a travel-efficient order, seeded at
    /// the planner's current position.
    pub fn add_polygons_ordered(&mut self, polygons: &[Polygon], config: ConfigKey) {
        let mut optimizer = PathOrderOptimizer::new(self.last_position);
        optimizer.add_polygons(polygons);
        optimizer.optimize();
        for &nr in &optimizer.poly_order {
            self.add_polygon(&polygons[nr], optimizer.poly_start[nr], config);
        }
    }

    /// Slow extrusion so the layer takes at least `min_time` seconds.
    ///
    /// Travel time is unaffected; extrusion segments are scaled by a
    /// common factor, floored so no segment drops below
    /// `minimal_speed` mm/s. A factor already in effect (e.g. a
    /// first-layer slowdown) is only replaced when the new one is more
    /// restrictive; a layer never speeds back up once slowed. Any
    /// remaining shortfall beyond the tolerance is recorded as idle
    /// time to be absorbed at emission.
    pub fn force_minimal_layer_time(&mut self, min_time: f64, minimal_speed: i32) {
        let mut p0 = self.gcode.position_xy();
        let mut travel_time = 0.0;
        let mut extrude_time = 0.0;
        for path in &self.paths {
            let config = &self.configs[path.config];
            for &point in &path.points {
                let this_time = (p0 - point).vsize_mm() / config.speed as f64;
                if config.line_width != 0 {
                    extrude_time += this_time;
                } else {
                    travel_time += this_time;
                }
                p0 = point;
            }
        }
        let total_time = extrude_time + travel_time;
        if total_time < min_time && extrude_time > 0.0 {
            tracing::debug!("layer takes {total_time:.2}s, slowing extrusion to reach {min_time:.2}s");
            let min_extrude_time = (min_time - travel_time).max(1.0);
            let mut factor = extrude_time / min_extrude_time;
            for path in &self.paths {
                let config = &self.configs[path.config];
                if config.line_width == 0 {
                    continue;
                }
                let speed = (config.speed as f64 * factor) as i32;
                if speed < minimal_speed {
                    factor = minimal_speed as f64 / config.speed as f64;
                }
            }

            if factor * 100.0 < self.extrude_speed_factor as f64 {
                self.set_extrude_speed_factor((factor * 100.0) as i32);
            } else {
                factor = self.extrude_speed_factor as f64 / 100.0;
            }

            if min_time - extrude_time / factor - travel_time > IDLE_TIME_TOLERANCE {
                self.extra_time = min_time - extrude_time / factor - travel_time;
            }
            self.total_print_time = extrude_time / factor + travel_time;
        } else {
            self.total_print_time = total_time;
        }
    }

    /// Replay the buffer into the emitter.
    ///
    /// Handles tool changes and retract-before flags, annotates
    /// profile changes, merges chains of degenerate single-point
    /// segments, ramps Z across the final vase-mode segment, and
    /// absorbs recorded idle time with a lifted dwell when
    /// `lift_head_if_needed` is set.
    pub fn write_gcode(&mut self, lift_head_if_needed: bool, layer_thickness_um: i64) -> strata_gcode::Result<()> {
        let mut last_config: Option<ConfigKey> = None;
        let mut extruder = self.gcode.extruder_index();

        let mut n = 0;
        while n < self.paths.len() {
            let path = &self.paths[n];
            if extruder != path.extruder {
                extruder = path.extruder;
                self.gcode.switch_extruder(extruder)?;
            } else if path.retract {
                self.gcode.write_retraction()?;
            }

            let config_key = path.config;
            let config = &self.configs[config_key];
            if config_key != self.travel_config && last_config != Some(config_key) {
                self.gcode.write_comment(&format!("TYPE:{}", config.name))?;
                last_config = Some(config_key);
            }

            let mut speed = config.speed;
            if config.line_width != 0 {
                // The layer-time governor only throttles extrusion.
                speed = speed * self.extrude_speed_factor / 100;
            } else {
                speed = speed * self.travel_speed_factor / 100;
            }

            let line_width = config.line_width;
            if path.points.len() == 1
                && config_key != self.travel_config
                && (self.gcode.position_xy() - path.points[0]).shorter_than(line_width * 2)
            {
                // A run of single-point dabs close together: collapse
                // the chain into fewer, longer strokes with the width
                // scaled to keep deposited volume per length.
                let mut p0 = path.points[0];
                let mut i = n + 1;
                while i < self.paths.len()
                    && self.paths[i].points.len() == 1
                    && (p0 - self.paths[i].points[0]).shorter_than(line_width * 2)
                {
                    p0 = self.paths[i].points[0];
                    i += 1;
                }
                if self.paths[i - 1].config == self.travel_config {
                    i -= 1;
                }

                if i > n + 2 {
                    let mut p0 = self.gcode.position_xy();
                    let mut x = n;
                    while x + 1 < i {
                        let a = self.paths[x].points[0];
                        let b = self.paths[x + 1].points[0];
                        let old_len = (p0 - a).vsize();
                        let midpoint = (a + b) / 2;
                        let new_len = (self.gcode.position_xy() - midpoint).vsize();
                        if new_len > 0 {
                            self.gcode.write_move(midpoint, speed, line_width * old_len / new_len)?;
                        }
                        p0 = b;
                        x += 2;
                    }
                    let last = self.paths[i - 1].points[0];
                    self.gcode.write_move(last, speed, line_width)?;
                    n = i;
                    continue;
                }
            }

            let mut spiralize = config.spiralize;
            if spiralize {
                // Only the last vase-mode segment in the buffer ramps.
                for later in &self.paths[n + 1..] {
                    if self.configs[later.config].spiralize {
                        spiralize = false;
                    }
                }
            }
            if spiralize {
                let z = self.gcode.position_z();
                let mut total_length = 0.0;
                let mut p0 = self.gcode.position_xy();
                for &point in &self.paths[n].points {
                    total_length += (p0 - point).vsize_mm();
                    p0 = point;
                }

                let mut length = 0.0;
                let mut p0 = self.gcode.position_xy();
                for i in 0..self.paths[n].points.len() {
                    let point = self.paths[n].points[i];
                    length += (p0 - point).vsize_mm();
                    p0 = point;
                    if total_length > 0.0 {
                        self.gcode
                            .set_z(z + (layer_thickness_um as f64 * length / total_length) as i64);
                    }
                    self.gcode.write_move(point, speed, line_width)?;
                }
            } else {
                for i in 0..self.paths[n].points.len() {
                    let point = self.paths[n].points[i];
                    self.gcode.write_move(point, speed, line_width)?;
                }
            }
            n += 1;
        }

        self.gcode.update_total_print_time();
        if lift_head_if_needed && self.extra_time > 0.0 {
            // Park the nozzle off the part while the idle time passes,
            // so it does not cook the layer it just printed.
            self.gcode
                .write_comment(&format!("Small layer, adding delay of {:.3}", self.extra_time))?;
            self.gcode.write_retraction()?;
            let lifted_z = self.gcode.position_z() + 3000;
            self.gcode.set_z(lifted_z);
            let travel_speed = self.configs[self.travel_config].speed;
            let here = self.gcode.position_xy();
            self.gcode.write_move(here, travel_speed, 0)?;
            self.gcode.write_move(here + Point::new(20_000, 0), travel_speed, 0)?;
            self.gcode.write_delay(self.extra_time)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathConfig;
    use approx::assert_relative_eq;
    use strata_geom::Polygon;

    struct Arena {
        configs: PathConfigs,
        travel: ConfigKey,
        wall: ConfigKey,
    }

    fn arena() -> Arena {
        let mut configs = PathConfigs::new();
        let travel = configs.insert(PathConfig::travel(150));
        let wall = configs.insert(PathConfig::new(50, 400, "WALL-OUTER"));
        Arena { configs, travel, wall }
    }

    fn emitter() -> GcodeExport<Vec<u8>> {
        let mut gcode = GcodeExport::new(Vec::new());
        gcode.set_extrusion(100, 2890, 100);
        gcode.set_retraction(4500, 45, 14_500, 0);
        gcode
    }

    fn output(gcode: GcodeExport<Vec<u8>>) -> String {
        String::from_utf8(gcode.finish().unwrap()).unwrap()
    }

    fn move_lines(text: &str) -> Vec<&str> {
        text.lines().filter(|l| l.contains(" X")).collect()
    }

    #[test]
    fn test_triangle_emits_four_moves() {
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        let triangle = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(50_000, 0),
            Point::new(50_000, 50_000),
        ]);
        planner.add_polygon(&triangle, 0, a.wall);
        planner.write_gcode(false, 100).unwrap();

        let text = output(gcode);
        let moves = move_lines(&text);
        assert_eq!(moves.len(), 4);
        assert!(moves[0].starts_with("G0"));
        // Two extrusion moves plus the closing move back to vertex 0.
        let e_values: Vec<f64> = moves[1..]
            .iter()
            .map(|l| l.split(" E").nth(1).unwrap().parse().unwrap())
            .collect();
        assert_eq!(e_values.len(), 3);
        assert!(e_values.windows(2).all(|w| w[0] < w[1]));
        assert!(moves[3].contains("X0.00 Y0.00"));
    }

    #[test]
    fn test_two_vertex_polygon_does_not_close() {
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        let line = Polygon::new(vec![Point::new(0, 0), Point::new(30_000, 0)]);
        planner.add_polygon(&line, 0, a.wall);
        planner.write_gcode(false, 100).unwrap();
        assert_eq!(move_lines(&output(gcode)).len(), 2);
    }

    #[test]
    fn test_same_profile_appends_until_closed() {
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        planner.add_extrusion_move(Point::new(1000, 0), a.wall);
        planner.add_extrusion_move(Point::new(2000, 0), a.wall);
        assert_eq!(planner.paths.len(), 1);
        planner.force_new_path_start();
        planner.add_extrusion_move(Point::new(3000, 0), a.wall);
        assert_eq!(planner.paths.len(), 2);
    }

    #[test]
    fn test_force_retract_respects_minimal_distance() {
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        planner.force_retract();
        planner.add_travel(Point::new(1000, 0)); // below 1500um
        assert!(!planner.paths[0].retract);
        planner.force_new_path_start();
        planner.force_retract();
        planner.add_travel(Point::new(50_000, 0));
        assert!(planner.paths[1].retract);
    }

    #[test]
    fn test_always_retract() {
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        planner.set_always_retract(true);
        planner.add_travel(Point::new(50_000, 0));
        assert!(planner.paths[0].retract);
    }

    struct StubRouter {
        waypoint: Option<Point>,
        inside_min_x: i64,
    }

    impl TravelRouter for StubRouter {
        fn route(&self, _from: Point, _to: Point) -> Option<Vec<Point>> {
            self.waypoint.map(|w| vec![w])
        }
        fn is_inside(&self, p: Point) -> bool {
            p.x >= self.inside_min_x
        }
        fn move_inside(&self, p: Point, margin: i64) -> Option<Point> {
            Some(Point::new(p.x + margin, p.y))
        }
    }

    #[test]
    fn test_router_route_adds_waypoints_without_retract() {
        let a = arena();
        let router = StubRouter {
            waypoint: Some(Point::new(10_000, 10_000)),
            inside_min_x: 0,
        };
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        planner.set_router(Some(&router));
        planner.add_travel(Point::new(50_000, 0));
        assert!(!planner.paths[0].retract);
        assert_eq!(
            planner.paths[0].points,
            vec![Point::new(10_000, 10_000), Point::new(50_000, 0)]
        );
    }

    #[test]
    fn test_router_no_route_falls_back_to_retract() {
        let a = arena();
        let router = StubRouter {
            waypoint: None,
            inside_min_x: 0,
        };
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        planner.set_router(Some(&router));
        planner.add_travel(Point::new(50_000, 0));
        assert!(planner.paths[0].retract);
        planner.add_travel(Point::new(50_500, 0));
        // Second travel is short; still no retraction wanted.
        assert_eq!(planner.paths.len(), 1);
    }

    #[test]
    fn test_move_inside_boundary_nudges_twice_and_closes() {
        let a = arena();
        let router = StubRouter {
            waypoint: Some(Point::new(0, 0)),
            inside_min_x: 1000,
        };
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        planner.set_router(Some(&router));
        planner.move_inside_boundary(600);
        assert_eq!(planner.last_position, Point::new(1200, 0));
        assert!(planner.paths.last().unwrap().done);
    }

    #[test]
    fn test_minimal_layer_time_governor() {
        let mut configs = PathConfigs::new();
        let travel = configs.insert(PathConfig::travel(50));
        let wall = configs.insert(PathConfig::new(50, 400, "WALL-OUTER"));
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &configs, travel, 1500);
        // 100mm travel at 50mm/s = 2s, 150mm extrusion at 50mm/s = 3s.
        planner.add_travel(Point::new(100_000, 0));
        planner.add_extrusion_move(Point::new(250_000, 0), wall);
        planner.force_minimal_layer_time(10.0, 1);

        // factor = 3 / (10 - 2) = 0.375
        assert_eq!(planner.extrude_speed_factor(), 37);
        assert_relative_eq!(planner.total_print_time(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(planner.extra_time(), 0.0);
    }

    #[test]
    fn test_governor_keeps_more_restrictive_prior_factor() {
        let mut configs = PathConfigs::new();
        let travel = configs.insert(PathConfig::travel(50));
        let wall = configs.insert(PathConfig::new(50, 400, "WALL-OUTER"));
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &configs, travel, 1500);
        planner.set_extrude_speed_factor(20);
        planner.add_travel(Point::new(100_000, 0));
        planner.add_extrusion_move(Point::new(250_000, 0), wall);
        planner.force_minimal_layer_time(10.0, 1);
        // 37.5% would be faster than the 20% already in effect.
        assert_eq!(planner.extrude_speed_factor(), 20);
        assert_relative_eq!(planner.total_print_time(), 17.0, epsilon = 1e-9);
    }

    #[test]
    fn test_governor_minimal_speed_leaves_idle_time() {
        let mut configs = PathConfigs::new();
        let travel = configs.insert(PathConfig::travel(50));
        let wall = configs.insert(PathConfig::new(50, 400, "WALL-OUTER"));
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &configs, travel, 1500);
        planner.add_travel(Point::new(100_000, 0));
        planner.add_extrusion_move(Point::new(250_000, 0), wall);
        // Floor of 40mm/s caps the factor at 0.8: 3/0.8 + 2 = 5.75s.
        planner.force_minimal_layer_time(10.0, 40);
        assert_eq!(planner.extrude_speed_factor(), 80);
        assert_relative_eq!(planner.extra_time(), 4.25, epsilon = 1e-9);

        planner.write_gcode(true, 100).unwrap();
        let text = output(gcode);
        assert!(text.lines().any(|l| l == "G4 P4250"));
        // The lift travels up 3mm before dwelling.
        assert!(text.lines().any(|l| l.contains(" Z3.00")));
    }

    #[test]
    fn test_merges_degenerate_dab_chain() {
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        // Five one-point segments, each within 2*line_width (800um).
        for i in 1..=5 {
            planner.add_extrusion_move(Point::new(i * 500, 0), a.wall);
            planner.force_new_path_start();
        }
        planner.write_gcode(false, 100).unwrap();

        let text = output(gcode);
        let moves = move_lines(&text);
        assert!(moves.len() < 5, "expected merged chain, got {moves:?}");
        assert!(
            moves.last().unwrap().contains("X2.50 Y0.00"),
            "final endpoint must be preserved exactly"
        );
    }

    #[test]
    fn test_three_dab_chain_sits_on_merge_threshold() {
        // Three one-point segments are the shortest chain that merges:
        // one midpoint stroke plus the exact final endpoint.
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        for i in 1..=3 {
            planner.add_extrusion_move(Point::new(i * 500, 0), a.wall);
            planner.force_new_path_start();
        }
        planner.write_gcode(false, 100).unwrap();

        let text = output(gcode);
        let moves = move_lines(&text);
        assert_eq!(moves.len(), 2);
        assert!(moves[0].contains("X0.75 Y0.00"));
        assert!(moves[1].contains("X1.50 Y0.00"));
    }

    #[test]
    fn test_short_dab_chain_is_not_merged() {
        // Two degenerate segments are below the chain threshold.
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        for i in 1..=2 {
            planner.add_extrusion_move(Point::new(i * 500, 0), a.wall);
            planner.force_new_path_start();
        }
        planner.write_gcode(false, 100).unwrap();
        assert_eq!(move_lines(&output(gcode)).len(), 2);
    }

    #[test]
    fn test_spiralize_ramps_z_by_one_layer() {
        let mut configs = PathConfigs::new();
        let travel = configs.insert(PathConfig::travel(150));
        let wall = configs.insert(PathConfig::new(30, 400, "WALL-OUTER").spiralized());
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &configs, travel, 1500);
        let square = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(10_000, 0),
            Point::new(10_000, 10_000),
            Point::new(0, 10_000),
        ]);
        planner.add_polygon(&square, 0, wall);
        planner.write_gcode(false, 100).unwrap();

        let text = output(gcode);
        let z_values: Vec<f64> = text
            .lines()
            .filter(|l| l.contains(" Z"))
            .map(|l| {
                let z = l.split(" Z").nth(1).unwrap();
                z.split_whitespace().next().unwrap().parse().unwrap()
            })
            .collect();
        assert_eq!(z_values.len(), 4);
        assert!(z_values.windows(2).all(|w| w[0] < w[1]));
        assert_relative_eq!(*z_values.last().unwrap(), 0.1);
    }

    #[test]
    fn test_only_last_spiralize_segment_ramps() {
        let mut configs = PathConfigs::new();
        let travel = configs.insert(PathConfig::travel(150));
        let wall_a = configs.insert(PathConfig::new(30, 400, "WALL-OUTER").spiralized());
        let wall_b = configs.insert(PathConfig::new(30, 400, "WALL-OUTER").spiralized());
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &configs, travel, 1500);
        planner.add_extrusion_move(Point::new(10_000, 0), wall_a);
        planner.add_extrusion_move(Point::new(20_000, 0), wall_a);
        planner.add_extrusion_move(Point::new(30_000, 0), wall_b);
        planner.add_extrusion_move(Point::new(40_000, 0), wall_b);
        planner.write_gcode(false, 100).unwrap();

        let text = output(gcode);
        // Only the two moves of the second segment carry Z tokens.
        let z_lines = text.lines().filter(|l| l.contains(" Z")).count();
        assert_eq!(z_lines, 2);
    }

    #[test]
    fn test_type_annotation_on_profile_change() {
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        planner.add_travel(Point::new(5000, 0));
        planner.add_extrusion_move(Point::new(10_000, 0), a.wall);
        planner.write_gcode(false, 100).unwrap();
        let text = output(gcode);
        assert!(text.lines().any(|l| l == ";TYPE:WALL-OUTER"));
    }

    #[test]
    fn test_speed_factor_clamped() {
        let a = arena();
        let mut gcode = emitter();
        let mut planner = LayerPlanner::new(&mut gcode, &a.configs, a.travel, 1500);
        planner.set_extrude_speed_factor(0);
        planner.set_travel_speed_factor(-5);
        assert_eq!(planner.extrude_speed_factor(), 1);
        assert_eq!(planner.travel_speed_factor(), 1);
    }
}
