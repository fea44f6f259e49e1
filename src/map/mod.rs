pub mod geometry;
pub mod projection;
pub mod renderer;
pub mod spatial;

pub use geometry::{Bounds, ScreenPath, SubPath};
pub use projection::{
    await_viewport, establish, Projection, ProjectionKind, ProjectionState, ViewportProbe, ZoomTransform,
};
pub use renderer::{
    FeatureRef, Interactivity, LayerVisibility, Layers, ReadyNotifier, RenderPipeline, Scene, SceneElement,
    StrokeOverride, Style, SurfaceReady, BACKGROUND,
};
