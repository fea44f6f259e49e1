use std::path::PathBuf;

use thiserror::Error;

use crate::data::LayerId;

/// Everything that can go wrong between reading a collection and painting it.
///
/// `Load` and `MalformedFeature` are recovered locally (the layer is skipped,
/// the attribute defaults to 0). `ViewportNotReady` is retried until the
/// retry budget runs out, at which point it becomes `InitFailure`.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode GeoJSON in {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("{path:?} does not contain a FeatureCollection")]
    NotACollection { path: PathBuf },
    #[error("{layer} layer unavailable")]
    Load {
        layer: LayerId,
        #[source]
        source: Box<MapError>,
    },
    #[error("viewport has zero size ({width}x{height})")]
    ViewportNotReady { width: usize, height: usize },
    #[error("map initialisation failed after {attempts} attempts")]
    InitFailure { attempts: u32 },
    #[error("projection could not be initialised: {0}")]
    ProjectionInitFailure(String),
    #[error("{layer} feature {index}: attribute {attribute:?} missing or not numeric")]
    MalformedFeature {
        layer: LayerId,
        index: usize,
        attribute: String,
    },
    #[error("{layer} feature {index} does not project to finite screen coordinates")]
    Unprojectable { layer: LayerId, index: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MapError>;
