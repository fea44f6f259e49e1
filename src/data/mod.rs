mod demo;

pub use demo::demo_layers;

use std::fmt;
use std::fs;
use std::path::Path;

use geojson::{GeoJson, JsonObject, JsonValue, Value};
use tracing::{debug, info, warn};

use crate::error::{MapError, Result};

/// A (longitude, latitude) pair in degrees
pub type LonLat = (f64, f64);

/// A closed ring; GeoJSON repeats the first position at the end
pub type Ring = Vec<LonLat>;

/// The three map layers, in the order they are drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerId {
    Historical,
    Administrative,
    RiskGrid,
}

impl LayerId {
    pub const DRAW_ORDER: [LayerId; 3] = [LayerId::Historical, LayerId::Administrative, LayerId::RiskGrid];

    pub fn name(self) -> &'static str {
        match self {
            LayerId::Historical => "historical-boundary",
            LayerId::Administrative => "administrative-unit",
            LayerId::RiskGrid => "risk-grid",
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Geometry kinds the map can draw. Points are not drawable and are
/// dropped at load time.
#[derive(Clone, Debug, PartialEq)]
pub enum GeoGeometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
    LineString(Vec<LonLat>),
    MultiLineString(Vec<Vec<LonLat>>),
}

/// An immutable geometry with its attribute table
#[derive(Clone, Debug)]
pub struct Feature {
    pub geometry: GeoGeometry,
    pub properties: JsonObject,
}

impl Feature {
    pub fn new(geometry: GeoGeometry, properties: JsonObject) -> Self {
        Self { geometry, properties }
    }

    /// Numeric attribute. Numeric strings are accepted; anything else,
    /// including non-finite values, is `None`.
    pub fn number(&self, key: &str) -> Option<f64> {
        let value = match self.properties.get(key)? {
            JsonValue::Number(n) => n.as_f64()?,
            JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

/// An ordered feature list; a feature's identity is its index
#[derive(Clone, Debug, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    /// Parse GeoJSON text (used for inline data and tests)
    pub fn from_geojson_str(content: &str) -> Result<Self> {
        let geojson: GeoJson = content.parse().map_err(|e: geojson::Error| MapError::Decode {
            path: "<inline>".into(),
            reason: e.to_string(),
        })?;
        Self::from_geojson(geojson, Path::new("<inline>"))
    }

    fn from_geojson(geojson: GeoJson, path: &Path) -> Result<Self> {
        let GeoJson::FeatureCollection(fc) = geojson else {
            return Err(MapError::NotACollection {
                path: path.to_path_buf(),
            });
        };

        let mut features = Vec::with_capacity(fc.features.len());
        for (index, feature) in fc.features.into_iter().enumerate() {
            let Some(geometry) = feature.geometry.and_then(|g| convert_geometry(g.value)) else {
                debug!(index, path = %path.display(), "skipping feature without drawable geometry");
                continue;
            };
            features.push(Feature::new(geometry, feature.properties.unwrap_or_default()));
        }
        Ok(Self { features })
    }
}

fn to_lonlat(position: &[f64]) -> Option<LonLat> {
    match position {
        [lon, lat, ..] => Some((*lon, *lat)),
        _ => None,
    }
}

fn convert_line(coords: Vec<Vec<f64>>) -> Vec<LonLat> {
    coords.iter().filter_map(|c| to_lonlat(c)).collect()
}

fn convert_rings(rings: Vec<Vec<Vec<f64>>>) -> Vec<Ring> {
    rings.into_iter().map(convert_line).collect()
}

fn convert_geometry(value: Value) -> Option<GeoGeometry> {
    match value {
        Value::Polygon(rings) => Some(GeoGeometry::Polygon(convert_rings(rings))),
        Value::MultiPolygon(polygons) => Some(GeoGeometry::MultiPolygon(
            polygons.into_iter().map(convert_rings).collect(),
        )),
        Value::LineString(coords) => Some(GeoGeometry::LineString(convert_line(coords))),
        Value::MultiLineString(lines) => Some(GeoGeometry::MultiLineString(
            lines.into_iter().map(convert_line).collect(),
        )),
        _ => None,
    }
}

/// Source of feature collections
pub trait Loader {
    fn fetch_collection(&self, path: &Path) -> Result<FeatureCollection>;
}

/// Reads GeoJSON files from disk
#[derive(Clone, Copy, Debug, Default)]
pub struct FsLoader;

impl Loader for FsLoader {
    fn fetch_collection(&self, path: &Path) -> Result<FeatureCollection> {
        let mut bytes = fs::read(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let geojson: GeoJson =
            simd_json::serde::from_slice(&mut bytes).map_err(|e| MapError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        FeatureCollection::from_geojson(geojson, path)
    }
}

/// Fetch one layer, tagging any failure with the layer it belongs to
pub fn load_layer(loader: &dyn Loader, layer: LayerId, path: &Path) -> Result<FeatureCollection> {
    info!(%layer, path = %path.display(), "loading collection");
    match loader.fetch_collection(path) {
        Ok(collection) => {
            info!(%layer, features = collection.len(), "collection loaded");
            Ok(collection)
        }
        Err(source) => Err(MapError::Load {
            layer,
            source: Box::new(source),
        }),
    }
}

/// Like [`load_layer`], but a failure is logged and the layer left out
pub fn load_layer_or_skip(loader: &dyn Loader, layer: LayerId, path: &Path) -> Option<FeatureCollection> {
    match load_layer(loader, layer, path) {
        Ok(collection) => Some(collection),
        Err(err) => {
            let cause = match &err {
                MapError::Load { source, .. } => source.to_string(),
                other => other.to_string(),
            };
            warn!(%layer, %cause, "{err}; continuing without it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature",
              "properties": { "name": "紅線", "share": 41.5, "text_share": "12.5", "bad": "n/a" },
              "geometry": { "type": "LineString", "coordinates": [[120.1, 22.5], [120.4, 23.0]] } },
            { "type": "Feature",
              "properties": null,
              "geometry": { "type": "Point", "coordinates": [121.0, 23.5] } },
            { "type": "Feature",
              "properties": {},
              "geometry": { "type": "Polygon", "coordinates": [
                  [[120, 22], [122, 22], [122, 24], [120, 24], [120, 22]],
                  [[120.5, 22.5], [121, 22.5], [121, 23], [120.5, 22.5]] ] } }
        ]
    }"#;

    #[test]
    fn test_points_are_dropped_and_order_kept() {
        let fc = FeatureCollection::from_geojson_str(SAMPLE).unwrap();
        assert_eq!(fc.len(), 2);
        assert!(matches!(fc.features[0].geometry, GeoGeometry::LineString(_)));
        match &fc.features[1].geometry {
            GeoGeometry::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[1][1], (121.0, 22.5));
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_attribute_accessors() {
        let fc = FeatureCollection::from_geojson_str(SAMPLE).unwrap();
        let f = &fc.features[0];
        assert_eq!(f.number("share"), Some(41.5));
        assert_eq!(f.number("text_share"), Some(12.5));
        assert_eq!(f.number("bad"), None);
        assert_eq!(f.number("missing"), None);
        assert_eq!(f.text("name"), Some("紅線"));
    }

    #[test]
    fn test_bare_geometry_is_not_a_collection() {
        let err = FeatureCollection::from_geojson_str(
            r#"{ "type": "Point", "coordinates": [121.0, 23.5] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, MapError::NotACollection { .. }));
    }

    #[test]
    fn test_fs_loader_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let fc = FsLoader.fetch_collection(file.path()).unwrap();
        assert_eq!(fc.len(), 2);
    }

    #[test]
    fn test_missing_file_is_tagged_with_layer() {
        let err = load_layer(&FsLoader, LayerId::RiskGrid, Path::new("/nonexistent/grid.geojson"))
            .unwrap_err();
        match err {
            MapError::Load { layer, source } => {
                assert_eq!(layer, LayerId::RiskGrid);
                assert!(matches!(*source, MapError::Io { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(load_layer_or_skip(&FsLoader, LayerId::RiskGrid, Path::new("/nonexistent")).is_none());
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = FsLoader.fetch_collection(file.path()).unwrap_err();
        assert!(matches!(err, MapError::Decode { .. }));
    }
}
