//! Clipping to the buffered tile square.
//!
//! Geometries arrive in tile units but may reach far beyond the tile, e.g. a
//! landcover polygon seen at a deep zoom. Everything is cut down to
//! `-buffer..extent + buffer` on both axes before rounding and encoding.

use geo_types::{coord, Coord};

/// Slack for coordinates that sit on the window edge after reprojection.
const EDGE_TOLERANCE: f64 = 1e-6;

/// Square clip window in tile units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClipBounds {
    min: f64,
    max: f64,
}

impl ClipBounds {
    pub(crate) fn new(extent: f64, buffer: f64) -> Self {
        let buffer = buffer.max(0.0);
        Self {
            min: -buffer,
            max: extent + buffer,
        }
    }

    fn lo(&self) -> f64 {
        self.min - EDGE_TOLERANCE
    }

    fn hi(&self) -> f64 {
        self.max + EDGE_TOLERANCE
    }

    pub(crate) fn contains(&self, c: Coord<f64>) -> bool {
        let range = self.lo()..=self.hi();
        range.contains(&c.x) && range.contains(&c.y)
    }

    fn clamp(&self, c: Coord<f64>) -> Coord<f64> {
        coord! { x: c.x.clamp(self.min, self.max), y: c.y.clamp(self.min, self.max) }
    }

    /// Points inside the window.
    pub(crate) fn clip_points(&self, points: Vec<Coord<f64>>) -> Vec<Coord<f64>> {
        points.into_iter().filter(|c| self.contains(*c)).collect()
    }

    /// Cut a line into the runs that lie inside the window.
    pub(crate) fn clip_line(&self, line: &[Coord<f64>]) -> Vec<Vec<Coord<f64>>> {
        let mut parts = Vec::new();
        let mut current: Vec<Coord<f64>> = Vec::new();

        for pair in line.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            match self.clip_segment(a, b) {
                Some((t0, t1)) => {
                    if t0 > 0.0 || current.is_empty() {
                        flush(&mut parts, &mut current);
                        current.push(self.clamp(lerp(a, b, t0)));
                    }
                    current.push(self.clamp(lerp(a, b, t1)));
                    if t1 < 1.0 {
                        flush(&mut parts, &mut current);
                    }
                }
                None => flush(&mut parts, &mut current),
            }
        }
        flush(&mut parts, &mut current);
        parts
    }

    /// Liang-Barsky: the parameter range of `a..b` inside the window.
    fn clip_segment(&self, a: Coord<f64>, b: Coord<f64>) -> Option<(f64, f64)> {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let mut t0 = 0.0;
        let mut t1 = 1.0;
        let (lo, hi) = (self.lo(), self.hi());

        for (p, q) in [(-dx, a.x - lo), (dx, hi - a.x), (-dy, a.y - lo), (dy, hi - a.y)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                if r > t0 {
                    t0 = r;
                }
            } else {
                if r < t0 {
                    return None;
                }
                if r < t1 {
                    t1 = r;
                }
            }
        }
        Some((t0, t1))
    }

    /// Sutherland-Hodgman against the four window edges. The result is an
    /// open ring, possibly empty.
    pub(crate) fn clip_ring(&self, ring: &[Coord<f64>]) -> Vec<Coord<f64>> {
        let (min, max) = (self.min, self.max);
        let (lo, hi) = (self.lo(), self.hi());

        let mut out = clip_edge(ring, |c| c.x >= lo, |a, b| {
            let t = (min - a.x) / (b.x - a.x);
            coord! { x: min, y: a.y + t * (b.y - a.y) }
        });
        out = clip_edge(&out, |c| c.x <= hi, |a, b| {
            let t = (max - a.x) / (b.x - a.x);
            coord! { x: max, y: a.y + t * (b.y - a.y) }
        });
        out = clip_edge(&out, |c| c.y >= lo, |a, b| {
            let t = (min - a.y) / (b.y - a.y);
            coord! { x: a.x + t * (b.x - a.x), y: min }
        });
        out = clip_edge(&out, |c| c.y <= hi, |a, b| {
            let t = (max - a.y) / (b.y - a.y);
            coord! { x: a.x + t * (b.x - a.x), y: max }
        });
        out.into_iter().map(|c| self.clamp(c)).collect()
    }

    /// Clip every ring of one polygon; empty rings are dropped later.
    pub(crate) fn clip_polygon(&self, rings: Vec<Vec<Coord<f64>>>) -> Vec<Vec<Coord<f64>>> {
        rings.iter().map(|ring| self.clip_ring(ring)).collect()
    }
}

fn flush(parts: &mut Vec<Vec<Coord<f64>>>, current: &mut Vec<Coord<f64>>) {
    if current.len() >= 2 {
        parts.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

fn lerp(a: Coord<f64>, b: Coord<f64>, t: f64) -> Coord<f64> {
    if t <= 0.0 {
        a
    } else if t >= 1.0 {
        b
    } else {
        coord! { x: a.x + t * (b.x - a.x), y: a.y + t * (b.y - a.y) }
    }
}

fn clip_edge<F, I>(ring: &[Coord<f64>], inside: F, intersect: I) -> Vec<Coord<f64>>
where
    F: Fn(&Coord<f64>) -> bool,
    I: Fn(&Coord<f64>, &Coord<f64>) -> Coord<f64>,
{
    let n = ring.len();
    let mut out = Vec::with_capacity(n + 4);

    for i in 0..n {
        let current = &ring[i];
        let next = &ring[(i + 1) % n];

        match (inside(current), inside(next)) {
            (true, true) => out.push(*next),
            (true, false) => out.push(intersect(current, next)),
            (false, true) => {
                out.push(intersect(current, next));
                out.push(*next);
            }
            (false, false) => {}
        }
    }
    out
}
