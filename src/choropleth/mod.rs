mod color;
mod normalize;

pub use color::{
    boundary_stroke, risk_level_color, BoundaryStroke, ColorEncoder, Rgb, MAX_SHARE_EPSILON, NEUTRAL,
    OPACITY_FLOOR,
};
pub use normalize::{Candidate, NormalizationEngine, NormalizationRange, VoteShareCollection, WinningRecord};
