use std::fmt::Write;

use glam::DVec2;

use crate::braille::BrailleCanvas;
use crate::choropleth::Rgb;
use crate::map::projection::ZoomTransform;

/// One ring or line in screen space
#[derive(Clone, Debug, PartialEq)]
pub struct SubPath {
    pub points: Vec<DVec2>,
    /// Closed sub-paths are polygon rings and take part in fills
    pub closed: bool,
}

impl SubPath {
    /// Consecutive point pairs, plus the closing edge of a ring when the
    /// ring does not already repeat its first point
    pub fn segments(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        let closing = match (self.closed, self.points.first(), self.points.last()) {
            (true, Some(&first), Some(&last)) if self.points.len() > 1 && first != last => Some((last, first)),
            _ => None,
        };
        self.points.windows(2).map(|w| (w[0], w[1])).chain(closing)
    }
}

/// Axis-aligned screen bounds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// Zoom transforms have positive scale, so the corners stay ordered
    pub fn transformed(&self, zoom: &ZoomTransform) -> Self {
        Self::new(zoom.apply(self.min), zoom.apply(self.max))
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x && self.min.y <= other.max.y && self.max.y >= other.min.y
    }

    pub fn contains(&self, p: DVec2, tolerance: f64) -> bool {
        p.x >= self.min.x - tolerance
            && p.x <= self.max.x + tolerance
            && p.y >= self.min.y - tolerance
            && p.y <= self.max.y + tolerance
    }
}

/// Drawable path data produced by the projection
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScreenPath {
    pub subpaths: Vec<SubPath>,
}

impl ScreenPath {
    pub fn new(subpaths: Vec<SubPath>) -> Self {
        Self { subpaths }
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.points.is_empty())
    }

    pub fn is_finite(&self) -> bool {
        self.points().all(|p| p.is_finite())
    }

    fn points(&self) -> impl Iterator<Item = DVec2> + '_ {
        self.subpaths.iter().flat_map(|s| s.points.iter().copied())
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut points = self.points();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Bounds::new(min, max))
    }

    pub fn transformed(&self, zoom: &ZoomTransform) -> ScreenPath {
        ScreenPath::new(
            self.subpaths
                .iter()
                .map(|s| SubPath {
                    points: s.points.iter().map(|&p| zoom.apply(p)).collect(),
                    closed: s.closed,
                })
                .collect(),
        )
    }

    /// SVG path data: `M` and `L` commands, rings closed with `Z`
    pub fn to_svg_d(&self) -> String {
        let mut d = String::new();
        for sub in &self.subpaths {
            let mut points: &[DVec2] = &sub.points;
            if sub.closed && points.len() > 1 && points.first() == points.last() {
                points = &points[..points.len() - 1];
            }
            for (i, p) in points.iter().enumerate() {
                let cmd = if i == 0 { 'M' } else { 'L' };
                let _ = write!(d, "{cmd}{:.2},{:.2}", p.x, p.y);
            }
            if sub.closed && !points.is_empty() {
                d.push('Z');
            }
        }
        d
    }

    /// Even-odd point-in-polygon over every closed sub-path, so a point in
    /// a hole is outside
    pub fn contains(&self, p: DVec2) -> bool {
        let mut inside = false;
        for sub in self.subpaths.iter().filter(|s| s.closed) {
            for (a, b) in sub.segments() {
                if (a.y > p.y) != (b.y > p.y) {
                    let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                    if p.x < x {
                        inside = !inside;
                    }
                }
            }
        }
        inside
    }

    /// Distance from `p` to the nearest edge
    pub fn distance_to(&self, p: DVec2) -> f64 {
        let mut best = f64::INFINITY;
        for sub in &self.subpaths {
            if let [only] = sub.points.as_slice() {
                best = best.min(only.distance(p));
            }
            for (a, b) in sub.segments() {
                best = best.min(segment_distance(p, a, b));
            }
        }
        best
    }
}

fn segment_distance(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Fill the closed sub-paths of `path` with the even-odd rule.
/// Cells are sampled at their center, one scanline per cell row.
pub fn fill_path(canvas: &mut BrailleCanvas, path: &ScreenPath, color: Rgb, alpha: f64) {
    let Some(bounds) = path.bounds() else {
        return;
    };
    let rows = canvas.height();
    let cols = canvas.width();
    if rows == 0 || cols == 0 {
        return;
    }

    let first_row = ((bounds.min.y - 2.0) / 4.0).ceil().max(0.0) as usize;
    let last_row = ((bounds.max.y - 2.0) / 4.0).floor().min(rows as f64 - 1.0);
    if last_row < 0.0 {
        return;
    }

    let mut crossings = Vec::new();
    for cy in first_row..=last_row as usize {
        let y = cy as f64 * 4.0 + 2.0;
        crossings.clear();
        for sub in path.subpaths.iter().filter(|s| s.closed) {
            for (a, b) in sub.segments() {
                if (a.y > y) != (b.y > y) {
                    crossings.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for span in crossings.chunks_exact(2) {
            // Cell centers sit at x = 2 * cx + 1
            let start = ((span[0] - 1.0) / 2.0).ceil().max(0.0);
            let end = ((span[1] - 1.0) / 2.0).ceil().min(cols as f64);
            if end <= start {
                continue;
            }
            for cx in start as usize..end as usize {
                canvas.fill_cell(cx, cy, color, alpha);
            }
        }
    }
}

/// Stroke every sub-path. Widths of 1.5 pixels and up draw a thick line;
/// `dash` is a dash/gap pair in pixels.
pub fn stroke_path(
    canvas: &mut BrailleCanvas,
    path: &ScreenPath,
    color: Rgb,
    alpha: f64,
    width: f64,
    dash: Option<[f64; 2]>,
) {
    let clip = Bounds::new(
        DVec2::splat(-2.0),
        DVec2::new(canvas.pixel_width() as f64 + 2.0, canvas.pixel_height() as f64 + 2.0),
    );
    let thick = width >= 1.5;

    for sub in &path.subpaths {
        let mut dasher = dash.map(Dasher::new);
        for (a, b) in sub.segments() {
            let pieces = match dasher.as_mut() {
                Some(d) => d.split(a, b),
                None => vec![(a, b)],
            };
            for (p, q) in pieces {
                let Some((p, q)) = clip_segment(p, q, &clip) else {
                    continue;
                };
                let (x0, y0, x1, y1) = (p.x.round() as i32, p.y.round() as i32, q.x.round() as i32, q.y.round() as i32);
                if thick {
                    draw_thick_line(canvas, x0, y0, x1, y1, color, alpha);
                } else {
                    draw_line(canvas, x0, y0, x1, y1, color, alpha);
                }
            }
        }
    }
}

/// Walks a dash pattern along consecutive segments of one sub-path
struct Dasher {
    pattern: [f64; 2],
    /// Index into `pattern` and distance left in that run
    run: usize,
    left: f64,
}

impl Dasher {
    fn new(pattern: [f64; 2]) -> Self {
        let pattern = [pattern[0].max(1.0), pattern[1].max(1.0)];
        Self { pattern, run: 0, left: pattern[0] }
    }

    fn split(&mut self, a: DVec2, b: DVec2) -> Vec<(DVec2, DVec2)> {
        let length = a.distance(b);
        if length == 0.0 {
            return Vec::new();
        }
        let dir = (b - a) / length;
        let mut pieces = Vec::new();
        let mut at = 0.0;
        while at < length {
            let step = self.left.min(length - at);
            if self.run == 0 {
                pieces.push((a + dir * at, a + dir * (at + step)));
            }
            at += step;
            self.left -= step;
            if self.left <= 0.0 {
                self.run = 1 - self.run;
                self.left = self.pattern[self.run];
            }
        }
        pieces
    }
}

/// Liang-Barsky clip of segment `a`-`b` to `bounds`
fn clip_segment(a: DVec2, b: DVec2, bounds: &Bounds) -> Option<(DVec2, DVec2)> {
    let d = b - a;
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    let checks = [
        (-d.x, a.x - bounds.min.x),
        (d.x, bounds.max.x - a.x),
        (-d.y, a.y - bounds.min.y),
        (d.y, bounds.max.y - a.y),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((a + d * t0, a + d * t1))
}

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb, alpha: f64) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y, color, alpha);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Draw a thicker line (wide strokes and zoomed-in borders)
pub fn draw_thick_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb, alpha: f64) {
    draw_line(canvas, x0, y0, x1, y1, color, alpha);
    draw_line(canvas, x0 + 1, y0, x1 + 1, y1, color, alpha);
    draw_line(canvas, x0, y0 + 1, x1, y1 + 1, color, alpha);
}
