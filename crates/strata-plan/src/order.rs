//! Travel-efficient ordering of disjoint polygons ("tour").
//!
//! Greedy nearest-neighbor heuristic in three passes: provisional
//! entry vertices relative to the global start point, greedy visiting
//! order, then a final pass that re-derives each entry vertex against
//! the point actually reached before it in the tour. Quadratic in
//! polygon count, which is fine for per-layer counts.

use strata_geom::{Point, Polygon};

/// Chooses a visiting order and entry vertex for a set of polygons.
pub struct PathOrderOptimizer<'a> {
    start_point: Point,
    polygons: Vec<&'a Polygon>,
    /// Chosen entry vertex per input polygon, indexed like the input.
    pub poly_start: Vec<usize>,
    /// Visiting order as indices into the input. Degenerate empty
    /// polygons are dropped, so this can be shorter than the input.
    pub poly_order: Vec<usize>,
}

impl<'a> PathOrderOptimizer<'a> {
    /// Create an optimizer seeded at `start_point`.
    pub fn new(start_point: Point) -> Self {
        Self {
            start_point,
            polygons: Vec::new(),
            poly_start: Vec::new(),
            poly_order: Vec::new(),
        }
    }

    /// Add one polygon to the tour.
    pub fn add_polygon(&mut self, polygon: &'a Polygon) {
        self.polygons.push(polygon);
    }

    /// Add a batch of polygons to the tour.
    pub fn add_polygons(&mut self, polygons: &'a [Polygon]) {
        for polygon in polygons {
            self.polygons.push(polygon);
        }
    }

    /// Compute `poly_order` and `poly_start`.
    pub fn optimize(&mut self) {
        let mut picked = vec![false; self.polygons.len()];

        // Pass 1: provisional entry vertex nearest the global start.
        for poly in &self.polygons {
            let mut best_point = 0;
            let mut closest_dist = f64::MAX;
            for (point_index, point) in poly.points.iter().enumerate() {
                let dist = (*point - self.start_point).vsize2_f();
                if dist < closest_dist {
                    best_point = point_index;
                    closest_dist = dist;
                }
            }
            self.poly_start.push(best_point);
        }

        // Pass 2: greedy visiting order. Two-vertex polygons (open
        // line segments) probe both endpoints and may flip their
        // provisional entry.
        let mut p0 = self.start_point;
        for _ in 0..self.polygons.len() {
            let mut best: Option<usize> = None;
            let mut best_dist = f64::MAX;
            for (i, poly) in self.polygons.iter().enumerate() {
                if picked[i] || poly.is_empty() {
                    continue;
                }
                if poly.len() == 2 {
                    let dist = (poly.points[0] - p0).vsize2_f();
                    if dist < best_dist {
                        best = Some(i);
                        best_dist = dist;
                        self.poly_start[i] = 0;
                    }
                    let dist = (poly.points[1] - p0).vsize2_f();
                    if dist < best_dist {
                        best = Some(i);
                        best_dist = dist;
                        self.poly_start[i] = 1;
                    }
                } else {
                    let dist = (poly.points[self.poly_start[i]] - p0).vsize2_f();
                    if dist < best_dist {
                        best = Some(i);
                        best_dist = dist;
                    }
                }
            }
            if let Some(best) = best {
                let poly = self.polygons[best];
                if poly.len() == 2 {
                    // A line segment is left at its far endpoint.
                    p0 = poly.points[(self.poly_start[best] + 1) % 2];
                } else {
                    p0 = poly.points[self.poly_start[best]];
                }
                picked[best] = true;
                self.poly_order.push(best);
            }
        }

        // Pass 3: re-derive entry vertices against the point actually
        // reached before each polygon, instead of the global start.
        let mut p0 = self.start_point;
        for &nr in &self.poly_order {
            let poly = self.polygons[nr];
            let mut best = 0;
            let mut best_dist = f64::MAX;
            for (i, point) in poly.points.iter().enumerate() {
                let dist = (*point - p0).vsize2_f();
                if dist < best_dist {
                    best = i;
                    best_dist = dist;
                }
            }
            self.poly_start[nr] = best;
            if poly.len() <= 2 {
                p0 = poly.points[(best + 1) % poly.len()];
            } else {
                p0 = poly.points[best];
            }
        }
    }
}
