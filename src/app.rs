use glam::DVec2;
use tracing::{error, info, warn};

use crate::braille::BrailleCanvas;
use crate::choropleth::{ColorEncoder, NormalizationEngine, VoteShareCollection};
use crate::config::{AttributeKeys, MapConfig};
use crate::data::{demo_layers, load_layer_or_skip, FeatureCollection, LayerId, Loader};
use crate::error::Result;
use crate::interaction::{
    boundary_tooltip, vote_share_tooltip, FeatureInspector, InteractionController, InteractionEvent, TooltipLine,
};
use crate::map::{
    establish, FeatureRef, Layers, ProjectionState, ReadyNotifier, RenderPipeline, SurfaceReady, ViewportProbe,
    BACKGROUND,
};

/// Keyboard pan step in braille pixels
const KEY_PAN: (f64, f64) = (20.0, 12.0);

/// Zoom factor per key press or wheel notch
const ZOOM_STEP: f64 = 1.5;

/// Map area inside the border and above the status bar, in braille pixels
pub fn inner_pixels(cols: usize, rows: usize) -> (usize, usize) {
    // 2 for border + 1 for status bar
    (cols.saturating_sub(2) * 2, rows.saturating_sub(3) * 4)
}

/// Centre of a terminal cell in braille pixels, or `None` when the cell
/// lies outside a `width × height` map area (border or status bar)
pub fn cell_to_pixel(col: u16, row: u16, (width, height): (usize, usize)) -> Option<DVec2> {
    if col == 0 || row == 0 {
        return None;
    }
    let p = DVec2::new((col - 1) as f64 * 2.0 + 1.0, (row - 1) as f64 * 4.0 + 2.0);
    in_viewport(p, (width, height)).then_some(p)
}

fn in_viewport(p: DVec2, (width, height): (usize, usize)) -> bool {
    p.x >= 0.0 && p.y >= 0.0 && p.x < width as f64 && p.y < height as f64
}

/// The loaded collections. A layer whose load failed is `None`.
pub struct LayerStore {
    pub historical: Option<FeatureCollection>,
    pub administrative: Option<VoteShareCollection>,
    pub risk_grid: Option<FeatureCollection>,
    keys: AttributeKeys,
    encoder: ColorEncoder,
    demo: bool,
}

impl LayerStore {
    /// Fetch each layer independently. Falls back to the demo layers when
    /// nothing could be loaded at all.
    pub fn load(loader: &dyn Loader, config: &MapConfig) -> Self {
        let engine = NormalizationEngine::new(&config.attributes);
        let historical = load_layer_or_skip(loader, LayerId::Historical, &config.historical_path());
        let administrative = load_layer_or_skip(loader, LayerId::Administrative, &config.administrative_path())
            .map(|collection| VoteShareCollection::build(collection, &engine));
        let risk_grid = load_layer_or_skip(loader, LayerId::RiskGrid, &config.risk_grid_path());

        if historical.is_none() && administrative.is_none() && risk_grid.is_none() {
            warn!(data_dir = %config.data_dir.display(), "no layer could be loaded, showing demo data");
            return Self::demo(config);
        }

        Self {
            historical,
            administrative,
            risk_grid,
            keys: config.attributes.clone(),
            encoder: config.encoder(),
            demo: false,
        }
    }

    /// Synthetic layers, used when there is no data on disk
    pub fn demo(config: &MapConfig) -> Self {
        let engine = NormalizationEngine::new(&config.attributes);
        let (historical, administrative, risk_grid) = demo_layers(&config.attributes);
        Self {
            historical: Some(historical),
            administrative: Some(VoteShareCollection::build(administrative, &engine)),
            risk_grid: Some(risk_grid),
            keys: config.attributes.clone(),
            encoder: config.encoder(),
            demo: true,
        }
    }

    pub fn layers(&self) -> Layers<'_> {
        Layers {
            historical: self.historical.as_ref(),
            administrative: self.administrative.as_ref(),
            risk_grid: self.risk_grid.as_ref(),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.demo
    }

    pub fn is_loaded(&self, layer: LayerId) -> bool {
        match layer {
            LayerId::Historical => self.historical.is_some(),
            LayerId::Administrative => self.administrative.is_some(),
            LayerId::RiskGrid => self.risk_grid.is_some(),
        }
    }
}

impl FeatureInspector for LayerStore {
    fn describe(&self, feature: FeatureRef) -> Option<Vec<TooltipLine>> {
        match feature.layer {
            LayerId::Historical => {
                let f = self.historical.as_ref()?.get(feature.index)?;
                Some(boundary_tooltip(f, &self.keys))
            }
            LayerId::Administrative => {
                let towns = self.administrative.as_ref()?;
                let f = towns.features().get(feature.index)?;
                let record = towns.record(feature.index)?;
                Some(vote_share_tooltip(f, record, &towns.range(), &self.encoder, &self.keys))
            }
            LayerId::RiskGrid => None,
        }
    }
}

/// Application state
pub struct App {
    pub config: MapConfig,
    loader: Box<dyn Loader>,
    pub store: LayerStore,
    /// `None` until the viewport could be measured
    pipeline: Option<RenderPipeline>,
    pub controller: InteractionController,
    canvas: BrailleCanvas,
    ready: ReadyNotifier,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    last_mouse: Option<(u16, u16)>,
    /// Current pointer in braille pixels
    pointer: Option<DVec2>,
    /// Set when initialisation gave up
    init_error: Option<String>,
}

impl App {
    pub fn new(config: MapConfig, loader: Box<dyn Loader>, demo: bool) -> Self {
        let store = if demo {
            LayerStore::demo(&config)
        } else {
            LayerStore::load(loader.as_ref(), &config)
        };
        Self {
            controller: InteractionController::new(config.zoom_extent),
            config,
            loader,
            store,
            pipeline: None,
            canvas: BrailleCanvas::new(0, 0, BACKGROUND),
            ready: ReadyNotifier::default(),
            should_quit: false,
            last_mouse: None,
            pointer: None,
            init_error: None,
        }
    }

    /// Register for the one-time surface-ready event
    pub fn on_ready(&mut self, listener: impl FnOnce(&SurfaceReady) + 'static) {
        self.ready.subscribe(listener);
    }

    /// Wait for a measurable viewport, then build the projection and draw
    /// every layer. On failure the map stays blank and the error is kept
    /// for the status bar.
    pub fn initialise(&mut self, probe: &mut dyn ViewportProbe) -> Result<()> {
        let (projection, width, height) = match establish(probe, &self.config.retry, &self.config.projection) {
            Ok(established) => established,
            Err(err) => {
                error!("{err}");
                self.init_error = Some(err.to_string());
                return Err(err);
            }
        };

        let mut pipeline = RenderPipeline::new(projection.clone(), width, height, &self.config);
        pipeline.render(&self.store.layers());
        self.canvas.resize(width.div_ceil(2), height.div_ceil(4), BACKGROUND);
        self.pipeline = Some(pipeline);
        self.init_error = None;
        info!(width, height, demo = self.store.is_demo(), "map ready");

        self.ready.notify(SurfaceReady {
            projection,
            width,
            height,
        });
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn pipeline(&self) -> Option<&RenderPipeline> {
        self.pipeline.as_ref()
    }

    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    /// Update the render surface when the terminal resizes
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let (width, height) = inner_pixels(cols, rows);
        if width == 0 || height == 0 {
            return;
        }
        match self.pipeline.as_mut() {
            Some(pipeline) => {
                pipeline.resize(width, height);
                pipeline.render(&self.store.layers());
                self.canvas.resize(width.div_ceil(2), height.div_ceil(4), BACKGROUND);
                self.refresh_hover();
            }
            None => {
                let _ = self.initialise(&mut || (width, height));
            }
        }
    }

    /// Re-fetch every collection and redraw. The old collections, range and
    /// scene are replaced together; the hover is dropped because feature
    /// indices may have changed.
    pub fn reload(&mut self) {
        info!("reloading collections");
        self.store = LayerStore::load(self.loader.as_ref(), &self.config);
        self.controller.handle(InteractionEvent::PointerLeave);
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.render(&self.store.layers());
        }
    }

    /// Paint the scene under the current transform and emphasis
    pub fn frame(&mut self) -> &BrailleCanvas {
        match &self.pipeline {
            Some(pipeline) => {
                let emphasis = self.controller.emphasis();
                pipeline
                    .scene()
                    .paint(&mut self.canvas, &self.controller.transform(), emphasis.as_ref());
            }
            None => self.canvas.clear(BACKGROUND),
        }
        &self.canvas
    }

    pub fn canvas(&self) -> &BrailleCanvas {
        &self.canvas
    }

    /// Pointer moved to a terminal cell
    pub fn pointer_moved(&mut self, col: u16, row: u16) {
        self.pointer = cell_to_pixel(col, row, self.map_size());
        self.refresh_hover();
    }

    fn map_size(&self) -> (usize, usize) {
        self.pipeline.as_ref().map_or((0, 0), RenderPipeline::size)
    }

    /// Re-run the hit test after the pointer, the transform or the scene
    /// changed
    fn refresh_hover(&mut self) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        let size = pipeline.size();
        match self.pointer.filter(|&p| in_viewport(p, size)) {
            Some(p) => self.controller.pointer_at(p, pipeline.scene(), &self.store),
            None => self.controller.handle(InteractionEvent::PointerLeave),
        }
    }

    /// Pan by a screen offset in braille pixels
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.controller.pan_by(dx, dy);
        self.refresh_hover();
    }

    pub fn pan_left(&mut self) {
        self.pan(KEY_PAN.0, 0.0);
    }

    pub fn pan_right(&mut self) {
        self.pan(-KEY_PAN.0, 0.0);
    }

    pub fn pan_up(&mut self) {
        self.pan(0.0, KEY_PAN.1);
    }

    pub fn pan_down(&mut self) {
        self.pan(0.0, -KEY_PAN.1);
    }

    fn viewport_center(&self) -> DVec2 {
        let (w, h) = self.map_size();
        DVec2::new(w as f64 / 2.0, h as f64 / 2.0)
    }

    pub fn zoom_in(&mut self) {
        let c = self.viewport_center();
        self.controller.zoom_by(ZOOM_STEP, c);
        self.refresh_hover();
    }

    pub fn zoom_out(&mut self) {
        let c = self.viewport_center();
        self.controller.zoom_by(1.0 / ZOOM_STEP, c);
        self.refresh_hover();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        self.zoom_at(col, row, ZOOM_STEP);
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        self.zoom_at(col, row, 1.0 / ZOOM_STEP);
    }

    fn zoom_at(&mut self, col: u16, row: u16, factor: f64) {
        let anchor = cell_to_pixel(col, row, self.map_size()).unwrap_or_else(|| self.viewport_center());
        self.controller.zoom_by(factor, anchor);
        // The feature under the pointer changes with the transform
        self.refresh_hover();
    }

    pub fn reset_view(&mut self) {
        self.controller.reset_view();
        self.refresh_hover();
    }

    /// Flip a layer's visibility and redraw
    pub fn toggle_layer(&mut self, layer: LayerId) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            let visible = pipeline.toggle_layer(layer);
            info!(%layer, visible, "layer toggled");
            pipeline.render(&self.store.layers());
            self.refresh_hover();
        }
    }

    pub fn begin_drag(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
    }

    /// Drag pans the map with the pointer
    pub fn handle_drag(&mut self, col: u16, row: u16) {
        if let Some((last_col, last_row)) = self.last_mouse {
            let dx = (col as f64 - last_col as f64) * 2.0;
            let dy = (row as f64 - last_row as f64) * 4.0;
            self.pan(dx, dy);
        }
        self.last_mouse = Some((col, row));
    }

    /// Reset drag state when mouse button released
    pub fn end_drag(&mut self) {
        self.last_mouse = None;
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", self.controller.transform().k)
    }

    /// Geographic position under the pointer
    pub fn pointer_coords(&self) -> Option<String> {
        let pipeline = self.pipeline.as_ref()?;
        let state = ProjectionState {
            projection: pipeline.projection().clone(),
            zoom: self.controller.transform(),
        };
        let (lon, lat) = state.geographic(self.pointer?);
        Some(format!(
            "{:.3}°{}, {:.3}°{}",
            lat.abs(),
            if lat >= 0.0 { "N" } else { "S" },
            lon.abs(),
            if lon >= 0.0 { "E" } else { "W" }
        ))
    }

    /// First tooltip line of the hovered feature
    pub fn hovered_label(&self) -> Option<&str> {
        self.controller.hovered()?;
        self.controller.tooltip().lines.first().map(|l| l.text.as_str())
    }

    /// Observed winning-share range of the vote-share layer
    pub fn range_summary(&self) -> Option<String> {
        let range = self.store.administrative.as_ref()?.range();
        Some(format!("{:.1}%–{:.1}%", range.min, range.max))
    }

    /// SVG of the current scene, or `None` before initialisation
    pub fn export_svg(&self) -> Option<String> {
        let emphasis = self.controller.emphasis();
        self.pipeline
            .as_ref()
            .map(|p| p.scene().to_svg(&self.controller.transform(), emphasis.as_ref()))
    }
}
