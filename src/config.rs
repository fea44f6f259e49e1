use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::choropleth::{ColorEncoder, Rgb};
use crate::error::{MapError, Result};
use crate::map::ProjectionKind;

/// Runtime configuration. Every field has a default tuned for the Taiwan
/// dataset, so a config file only needs to name what it overrides.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub data_dir: PathBuf,
    pub files: LayerFiles,
    pub projection: ProjectionConfig,
    /// Allowed zoom factor range `[min, max]`
    pub zoom_extent: [f64; 2],
    pub retry: RetryPolicy,
    pub attributes: AttributeKeys,
    /// Candidate colours as `#RRGGBB`, in candidate order
    pub palette: [String; 3],
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/geojson"),
            files: LayerFiles::default(),
            projection: ProjectionConfig::default(),
            zoom_extent: [0.5, 50.0],
            retry: RetryPolicy::default(),
            attributes: AttributeKeys::default(),
            palette: ["#00A8AC".to_string(), "#4CAF50".to_string(), "#1976D2".to_string()],
        }
    }
}

impl MapConfig {
    /// Read a JSON config file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MapConfig =
            serde_json::from_str(&content).map_err(|e| MapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let [min, max] = self.zoom_extent;
        if !(min > 0.0 && min <= max && max.is_finite()) {
            return Err(MapError::Config(format!(
                "zoom extent [{min}, {max}] must be positive and ordered"
            )));
        }
        if !(self.projection.pixel_ratio > 0.0 && self.projection.pixel_ratio.is_finite()) {
            return Err(MapError::Config(format!(
                "pixel ratio {} must be positive",
                self.projection.pixel_ratio
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(MapError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if let Some(bad) = self.palette.iter().find(|c| Rgb::parse(c).is_none()) {
            return Err(MapError::Config(format!("palette colour {bad:?} is not #RRGGBB")));
        }
        Ok(())
    }

    /// Colour encoder for the configured palette. Entries that fail to
    /// parse keep the built-in colour for that candidate.
    pub fn encoder(&self) -> ColorEncoder {
        let fallback = ColorEncoder::default().palette();
        let mut palette = fallback;
        for (slot, hex) in palette.iter_mut().zip(&self.palette) {
            if let Some(rgb) = Rgb::parse(hex) {
                *slot = rgb;
            }
        }
        ColorEncoder::new(palette)
    }

    pub fn historical_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.historical)
    }

    pub fn administrative_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.administrative)
    }

    pub fn risk_grid_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.risk_grid)
    }
}

/// File names of the three collections, relative to `data_dir`
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LayerFiles {
    pub historical: String,
    pub administrative: String,
    pub risk_grid: String,
}

impl Default for LayerFiles {
    fn default() -> Self {
        Self {
            historical: "乾隆臺灣番界.geojson".to_string(),
            administrative: "總統_得票地圖_合併.geojson".to_string(),
            risk_grid: "dengue_grid_counts_1km_2023_land_only.geojson".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub kind: ProjectionKind,
    /// Geographic center (lon, lat)
    pub center: [f64; 2],
    /// Projection scale in CSS pixels per radian
    pub scale: f64,
    /// Standard parallels, only used by the conic projection
    pub parallels: [f64; 2],
    /// Braille pixels per CSS pixel
    pub pixel_ratio: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            kind: ProjectionKind::Mercator,
            center: [121.0, 23.5],
            scale: 12_000.0,
            parallels: [22.0, 25.0],
            pixel_ratio: 0.25,
        }
    }
}

/// Bounded polling used while the viewport has no measurable size.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay_ms: 100,
        }
    }
}

/// Property names read from each layer's features.
///
/// Index `i` of `shares`, `votes` and `candidates` belongs to the same
/// candidate; the array order is also the tie-break priority.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AttributeKeys {
    pub shares: [String; 3],
    pub votes: [String; 3],
    pub candidates: [String; 3],
    pub county: String,
    pub town: String,
    pub boundary_name: String,
    pub boundary_note: String,
    pub grid_count: String,
    pub grid_level: String,
}

impl Default for AttributeKeys {
    fn default() -> Self {
        Self {
            shares: [
                "(1) 得票率 (%)".to_string(),
                "(2) 得票率 (%)".to_string(),
                "(3) 得票率 (%)".to_string(),
            ],
            votes: [
                "(1) 柯文哲 吳欣盈".to_string(),
                "(2) 賴清德 蕭美琴".to_string(),
                "(3) 侯友宜 趙少康".to_string(),
            ],
            candidates: [
                "柯文哲 吳欣盈".to_string(),
                "賴清德 蕭美琴".to_string(),
                "侯友宜 趙少康".to_string(),
            ],
            county: "COUNTYNAME".to_string(),
            town: "TOWNNAME".to_string(),
            boundary_name: "name".to_string(),
            boundary_note: "Note".to_string(),
            grid_count: "count".to_string(),
            grid_level: "level".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "zoom_extent": [1.0, 8.0], "retry": {{ "max_attempts": 3 }} }}"#).unwrap();

        let config = MapConfig::from_file(file.path()).unwrap();
        assert_eq!(config.zoom_extent, [1.0, 8.0]);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 100);
        assert_eq!(config.projection.center, [121.0, 23.5]);
        assert_eq!(config.attributes.county, "COUNTYNAME");
    }

    #[test]
    fn test_rejects_inverted_zoom_extent() {
        let config = MapConfig {
            zoom_extent: [10.0, 2.0],
            ..MapConfig::default()
        };
        assert!(matches!(config.validate(), Err(MapError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_retry_attempts() {
        let mut config = MapConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(MapError::Config(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "retry": {{ "max_attempts": 0 }} }}"#).unwrap();
        assert!(MapConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_projection_kind_from_json() {
        let config: MapConfig =
            serde_json::from_str(r#"{ "projection": { "kind": "albers" } }"#).unwrap();
        assert_eq!(config.projection.kind, ProjectionKind::Albers);
        assert_eq!(config.projection.scale, 12_000.0);
    }

    #[test]
    fn test_palette_override() {
        let config: MapConfig =
            serde_json::from_str(r##"{ "palette": ["#FF0000", "#00FF00", "#0000FF"] }"##).unwrap();
        assert!(config.validate().is_ok());
        let encoder = config.encoder();
        assert_eq!(encoder.palette(), [Rgb(255, 0, 0), Rgb(0, 255, 0), Rgb(0, 0, 255)]);
    }

    #[test]
    fn test_rejects_bad_palette() {
        let mut config = MapConfig::default();
        config.palette[1] = "green".to_string();
        assert!(matches!(config.validate(), Err(MapError::Config(_))));
        assert_eq!(config.encoder().palette()[1], ColorEncoder::default().palette()[1]);
    }
}
