use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::thread;

use clap::ValueEnum;
use glam::DVec2;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::{ProjectionConfig, RetryPolicy};
use crate::data::{GeoGeometry, LonLat};
use crate::error::{MapError, Result};
use crate::map::geometry::{ScreenPath, SubPath};

/// Mercator latitude limit, beyond which y diverges
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    #[default]
    Mercator,
    /// Albers equal-area conic
    Albers,
}

/// Constants of the conic equal-area projection, derived from the parallels
#[derive(Clone, Copy, Debug, PartialEq)]
enum Conic {
    Cone { n: f64, c: f64, r0: f64 },
    /// Parallels symmetric about the equator degenerate to a cylinder
    Cylinder { cos_phi0: f64 },
}

impl Conic {
    fn new(parallels: [f64; 2]) -> Self {
        let phi0 = parallels[0].to_radians();
        let phi1 = parallels[1].to_radians();
        let sy0 = phi0.sin();
        let n = (sy0 + phi1.sin()) / 2.0;
        if n.abs() < 1e-6 {
            return Conic::Cylinder { cos_phi0: phi0.cos() };
        }
        let c = 1.0 + sy0 * (2.0 * n - sy0);
        Conic::Cone { n, c, r0: c.sqrt() / n }
    }

    fn forward(&self, lambda: f64, phi: f64) -> DVec2 {
        match *self {
            Conic::Cone { n, c, r0 } => {
                let r = (c - 2.0 * n * phi.sin()).max(0.0).sqrt() / n;
                let a = lambda * n;
                DVec2::new(r * a.sin(), r0 - r * a.cos())
            }
            Conic::Cylinder { cos_phi0 } => DVec2::new(lambda * cos_phi0, phi.sin() / cos_phi0),
        }
    }

    fn inverse(&self, p: DVec2) -> (f64, f64) {
        match *self {
            Conic::Cone { n, c, r0 } => {
                let r0y = r0 - p.y;
                let mut l = p.x.atan2(r0y.abs()) * r0y.signum();
                if r0y * n < 0.0 {
                    l -= PI * p.x.signum() * r0y.signum();
                }
                let s = ((c - (p.x * p.x + r0y * r0y) * n * n) / (2.0 * n)).clamp(-1.0, 1.0);
                (l / n, s.asin())
            }
            Conic::Cylinder { cos_phi0 } => (p.x / cos_phi0, (p.y * cos_phi0).clamp(-1.0, 1.0).asin()),
        }
    }
}

/// Base projection shared by every layer: a unit projection scaled and
/// translated so that `center` lands on `translate`.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    kind: ProjectionKind,
    center: LonLat,
    scale: f64,
    translate: DVec2,
    conic: Conic,
    /// Unit-projected center
    origin: DVec2,
}

impl Projection {
    pub fn new(kind: ProjectionKind, center: LonLat, scale: f64, parallels: [f64; 2], translate: DVec2) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(MapError::ProjectionInitFailure(format!("scale {scale} must be positive")));
        }
        if !(center.0.is_finite() && center.1.is_finite() && translate.is_finite()) {
            return Err(MapError::ProjectionInitFailure(format!(
                "center {center:?} / translate {translate} must be finite"
            )));
        }

        let mut projection = Self {
            kind,
            center,
            scale,
            translate,
            conic: Conic::new(parallels),
            origin: DVec2::ZERO,
        };
        projection.origin = projection.raw(center.0, center.1);
        if !projection.origin.is_finite() {
            return Err(MapError::ProjectionInitFailure(format!(
                "center {center:?} is outside the {kind:?} domain"
            )));
        }
        Ok(projection)
    }

    /// Build from config for a viewport of `width` x `height` braille pixels
    pub fn from_config(config: &ProjectionConfig, width: usize, height: usize) -> Result<Self> {
        Self::new(
            config.kind,
            (config.center[0], config.center[1]),
            config.scale * config.pixel_ratio,
            config.parallels,
            viewport_center(width, height),
        )
    }

    /// Unit projection with y pointing north
    fn raw(&self, lon: f64, lat: f64) -> DVec2 {
        match self.kind {
            ProjectionKind::Mercator => {
                let phi = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
                DVec2::new(lon.to_radians(), (FRAC_PI_4 + phi / 2.0).tan().ln())
            }
            ProjectionKind::Albers => {
                // Longitudes are measured from the central meridian
                let lambda = wrap_degrees(lon - self.center.0).to_radians();
                self.conic.forward(lambda, lat.to_radians())
            }
        }
    }

    pub fn project(&self, lon: f64, lat: f64) -> DVec2 {
        let p = self.raw(lon, lat) - self.origin;
        DVec2::new(self.translate.x + p.x * self.scale, self.translate.y - p.y * self.scale)
    }

    /// Screen point back to (lon, lat)
    pub fn invert(&self, point: DVec2) -> LonLat {
        let raw = DVec2::new(
            (point.x - self.translate.x) / self.scale,
            (self.translate.y - point.y) / self.scale,
        ) + self.origin;
        match self.kind {
            ProjectionKind::Mercator => {
                let lat = 2.0 * raw.y.exp().atan() - FRAC_PI_2;
                (raw.x.to_degrees(), lat.to_degrees())
            }
            ProjectionKind::Albers => {
                let (lambda, phi) = self.conic.inverse(raw);
                (wrap_degrees(lambda.to_degrees() + self.center.0), phi.to_degrees())
            }
        }
    }

    /// Screen path of a geometry. Every polygon ring becomes a closed
    /// sub-path with its vertex order kept, so holes survive the even-odd
    /// fill; lines stay open.
    pub fn path_for(&self, geometry: &GeoGeometry) -> ScreenPath {
        let ring = |coords: &[LonLat], closed: bool| SubPath {
            points: coords.iter().map(|&(lon, lat)| self.project(lon, lat)).collect(),
            closed,
        };

        let subpaths = match geometry {
            GeoGeometry::Polygon(rings) => rings.iter().map(|r| ring(r, true)).collect(),
            GeoGeometry::MultiPolygon(polygons) => polygons
                .iter()
                .flat_map(|rings| rings.iter().map(|r| ring(r, true)))
                .collect(),
            GeoGeometry::LineString(line) => vec![ring(line, false)],
            GeoGeometry::MultiLineString(lines) => lines.iter().map(|l| ring(l, false)).collect(),
        };
        ScreenPath::new(subpaths)
    }

    /// Re-center after a viewport resize; center and scale are fixed
    pub fn set_viewport(&mut self, width: usize, height: usize) {
        self.translate = viewport_center(width, height);
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn center(&self) -> LonLat {
        self.center
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translate(&self) -> DVec2 {
        self.translate
    }
}

fn viewport_center(width: usize, height: usize) -> DVec2 {
    DVec2::new(width as f64 / 2.0, height as f64 / 2.0)
}

fn wrap_degrees(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Pan/zoom applied after projection: `screen = p * k + (x, y)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomTransform {
    pub k: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ZoomTransform {
    pub const IDENTITY: ZoomTransform = ZoomTransform { k: 1.0, x: 0.0, y: 0.0 };

    pub fn new(k: f64, x: f64, y: f64) -> Self {
        Self { k, x, y }
    }

    pub fn apply(&self, p: DVec2) -> DVec2 {
        DVec2::new(p.x * self.k + self.x, p.y * self.k + self.y)
    }

    pub fn invert(&self, p: DVec2) -> DVec2 {
        DVec2::new((p.x - self.x) / self.k, (p.y - self.y) / self.k)
    }

    /// Scale by `factor` keeping the map point under `anchor` fixed.
    /// The resulting scale is clamped to `extent`.
    pub fn scaled_about(&self, factor: f64, anchor: DVec2, extent: [f64; 2]) -> Self {
        let k = (self.k * factor).clamp(extent[0], extent[1]);
        let fixed = self.invert(anchor);
        Self {
            k,
            x: anchor.x - fixed.x * k,
            y: anchor.y - fixed.y * k,
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            k: self.k,
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn clamped(&self, extent: [f64; 2]) -> Self {
        Self {
            k: self.k.clamp(extent[0], extent[1]),
            ..*self
        }
    }

    pub fn to_svg(&self) -> String {
        format!("translate({},{}) scale({})", self.x, self.y, self.k)
    }
}

/// Snapshot of everything needed to place a point on screen
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionState {
    pub projection: Projection,
    pub zoom: ZoomTransform,
}

impl ProjectionState {
    pub fn screen(&self, lon: f64, lat: f64) -> DVec2 {
        self.zoom.apply(self.projection.project(lon, lat))
    }

    pub fn geographic(&self, screen: DVec2) -> LonLat {
        self.projection.invert(self.zoom.invert(screen))
    }
}

/// Reports the current viewport size in braille pixels
pub trait ViewportProbe {
    fn size(&mut self) -> (usize, usize);
}

impl<F: FnMut() -> (usize, usize)> ViewportProbe for F {
    fn size(&mut self) -> (usize, usize) {
        self()
    }
}

/// Poll until the viewport has a non-zero size, up to `policy.max_attempts`
/// times with `policy.delay` between attempts.
pub fn await_viewport(probe: &mut dyn ViewportProbe, policy: &RetryPolicy) -> Result<(usize, usize)> {
    for attempt in 1..=policy.max_attempts {
        let (width, height) = probe.size();
        if width > 0 && height > 0 {
            debug!(attempt, width, height, "viewport measurable");
            return Ok((width, height));
        }
        let err = MapError::ViewportNotReady { width, height };
        debug!(attempt, max = policy.max_attempts, "{err}, retrying");
        if attempt < policy.max_attempts {
            thread::sleep(policy.delay());
        }
    }
    let err = MapError::InitFailure {
        attempts: policy.max_attempts,
    };
    error!("{err}");
    Err(err)
}

/// Wait for a measurable viewport and set up the projection for it
pub fn establish(
    probe: &mut dyn ViewportProbe,
    policy: &RetryPolicy,
    config: &ProjectionConfig,
) -> Result<(Projection, usize, usize)> {
    let (width, height) = await_viewport(probe, policy)?;
    let projection = Projection::from_config(config, width, height)?;
    info!(
        kind = ?projection.kind(),
        width,
        height,
        scale = projection.scale(),
        "projection ready"
    );
    Ok((projection, width, height))
}
