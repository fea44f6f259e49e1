use std::fmt::Write;

use glam::DVec2;
use tracing::{debug, error, info};

use crate::braille::BrailleCanvas;
use crate::choropleth::{
    boundary_stroke, risk_level_color, ColorEncoder, NormalizationRange, Rgb, VoteShareCollection, WinningRecord,
};
use crate::config::{AttributeKeys, MapConfig};
use crate::data::{Feature, FeatureCollection, LayerId};
use crate::error::{MapError, Result};
use crate::map::geometry::{fill_path, stroke_path, Bounds, ScreenPath};
use crate::map::projection::{Projection, ZoomTransform};
use crate::map::spatial::FeatureGrid;

/// Basemap colour under every layer
pub const BACKGROUND: Rgb = Rgb::WHITE;

/// Pointer slack for hit-testing, in screen pixels
const HIT_TOLERANCE: f64 = 3.0;

/// Hit-test index cell size, in base-projected pixels
const INDEX_CELL: f64 = 16.0;

/// Identity of a drawn feature: its layer and position in that collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureRef {
    pub layer: LayerId,
    pub index: usize,
}

impl FeatureRef {
    pub fn new(layer: LayerId, index: usize) -> Self {
        Self { layer, index }
    }
}

/// How an element reacts to the pointer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interactivity {
    /// Pointer passes through to whatever is below
    Inert,
    /// Shows a tooltip, keeps its normal stroke
    Tooltip,
    /// Shows a tooltip and takes the emphasis stroke
    Highlight,
}

/// Paint attributes of one element. Widths and dashes are CSS pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    pub fill: Option<Rgb>,
    pub fill_opacity: f64,
    pub stroke: Option<Rgb>,
    pub stroke_width: f64,
    pub stroke_opacity: f64,
    pub dash: Option<[f64; 2]>,
}

/// Historical boundaries: unfilled lines coloured and dashed by name
pub fn historical_style(feature: &Feature, keys: &AttributeKeys) -> Style {
    let stroke = boundary_stroke(feature.text(&keys.boundary_name));
    Style {
        fill: None,
        fill_opacity: 0.0,
        stroke: Some(stroke.color),
        stroke_width: 2.0,
        stroke_opacity: 0.95,
        dash: stroke.dash,
    }
}

/// Administrative units: leading-candidate colour at relative opacity
pub fn administrative_style(record: &WinningRecord, range: &NormalizationRange, encoder: &ColorEncoder) -> Style {
    Style {
        fill: Some(encoder.color_for(record)),
        fill_opacity: encoder.opacity_for(record, range),
        stroke: Some(Rgb::WHITE),
        stroke_width: 0.5,
        stroke_opacity: 0.8,
        dash: None,
    }
}

/// Risk grid cells by level; `None` for cells without cases
pub fn risk_grid_style(feature: &Feature, keys: &AttributeKeys) -> Option<Style> {
    let count = feature.number(&keys.grid_count).unwrap_or(0.0);
    if count <= 0.0 {
        return None;
    }
    Some(Style {
        fill: Some(risk_level_color(feature.number(&keys.grid_level))),
        fill_opacity: 0.7,
        stroke: None,
        stroke_width: 0.0,
        stroke_opacity: 0.0,
        dash: None,
    })
}

/// Temporary stroke replacing an element's own while it is hovered
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeOverride {
    pub feature: FeatureRef,
    pub stroke: Rgb,
    pub stroke_width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneElement {
    pub feature: FeatureRef,
    /// Base-projected path, before any zoom
    pub path: ScreenPath,
    pub bounds: Bounds,
    pub style: Style,
    pub interactivity: Interactivity,
}

impl SceneElement {
    fn is_area(&self) -> bool {
        self.style.fill.is_some() && self.path.subpaths.iter().any(|s| s.closed)
    }

    fn stroke_for(&self, emphasis: Option<&StrokeOverride>) -> Option<(Rgb, f64)> {
        match emphasis {
            Some(o) if o.feature == self.feature => Some((o.stroke, o.stroke_width)),
            _ => self.style.stroke.map(|s| (s, self.style.stroke_width)),
        }
    }
}

/// Everything the pipeline has drawn, in draw order
#[derive(Clone, Debug)]
pub struct Scene {
    background: Rgb,
    /// Braille pixels per CSS pixel, for stroke widths and dashes
    pixel_ratio: f64,
    width: usize,
    height: usize,
    elements: Vec<SceneElement>,
    index: FeatureGrid,
}

impl Scene {
    fn new(width: usize, height: usize, pixel_ratio: f64) -> Self {
        Self {
            background: BACKGROUND,
            pixel_ratio,
            width,
            height,
            elements: Vec::new(),
            index: FeatureGrid::new(INDEX_CELL),
        }
    }

    fn rebuild_index(&mut self) {
        self.index = FeatureGrid::build(
            self.elements
                .iter()
                .enumerate()
                .filter(|(_, e)| e.interactivity != Interactivity::Inert)
                .map(|(slot, e)| (slot, e.bounds)),
            INDEX_CELL,
        );
    }

    pub fn elements(&self) -> &[SceneElement] {
        &self.elements
    }

    pub fn layer(&self, layer: LayerId) -> impl Iterator<Item = &SceneElement> {
        self.elements.iter().filter(move |e| e.feature.layer == layer)
    }

    /// Elements are stored sorted by layer, then feature index
    pub fn element(&self, feature: FeatureRef) -> Option<&SceneElement> {
        self.elements
            .binary_search_by_key(&feature, |e| e.feature)
            .ok()
            .map(|i| &self.elements[i])
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Rasterize under `zoom`. Paths are transformed here; styles and the
    /// projection are never recomputed.
    pub fn paint(&self, canvas: &mut BrailleCanvas, zoom: &ZoomTransform, emphasis: Option<&StrokeOverride>) {
        canvas.clear(self.background);
        let visible = Bounds::new(
            DVec2::splat(-2.0),
            DVec2::new(canvas.pixel_width() as f64 + 2.0, canvas.pixel_height() as f64 + 2.0),
        );
        let unit = self.pixel_ratio * zoom.k;

        for element in &self.elements {
            if !element.bounds.transformed(zoom).intersects(&visible) {
                continue;
            }
            let path = element.path.transformed(zoom);
            if let Some(fill) = element.style.fill {
                fill_path(canvas, &path, fill, element.style.fill_opacity);
            }
            if let Some((stroke, width)) = element.stroke_for(emphasis) {
                let dash = element.style.dash.map(|[on, off]| [on * unit, off * unit]);
                stroke_path(canvas, &path, stroke, element.style.stroke_opacity, width * unit, dash);
            }
        }
    }

    /// Topmost interactive element under a screen point
    pub fn hit_test(&self, screen: DVec2, zoom: &ZoomTransform) -> Option<FeatureRef> {
        let p = zoom.invert(screen);
        let tolerance = HIT_TOLERANCE / zoom.k;
        self.index
            .query_point(p, tolerance)
            .into_iter()
            .map(|slot| &self.elements[slot])
            .find(|e| {
                e.bounds.contains(p, tolerance)
                    && if e.is_area() {
                        e.path.contains(p)
                    } else {
                        e.path.distance_to(p) <= tolerance
                    }
            })
            .map(|e| e.feature)
    }

    /// Serialize as an SVG document, one `<path>` per element
    pub fn to_svg(&self, zoom: &ZoomTransform, emphasis: Option<&StrokeOverride>) -> String {
        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="{}"/>"#, self.background.to_hex());
        let _ = writeln!(svg, r#"<g transform="{}">"#, zoom.to_svg());

        for layer in LayerId::DRAW_ORDER {
            let _ = writeln!(svg, r#"<g class="{layer}">"#);
            for element in self.layer(layer) {
                let style = &element.style;
                let _ = write!(svg, r#"<path data-index="{}" d="{}""#, element.feature.index, element.path.to_svg_d());
                match style.fill {
                    Some(fill) => {
                        let _ = write!(svg, r#" fill="{}" fill-opacity="{:.4}""#, fill.to_hex(), style.fill_opacity);
                    }
                    None => svg.push_str(r#" fill="none""#),
                }
                if let Some((stroke, width)) = element.stroke_for(emphasis) {
                    let _ = write!(
                        svg,
                        r#" stroke="{}" stroke-width="{}" stroke-opacity="{}""#,
                        stroke.to_hex(),
                        width * self.pixel_ratio,
                        style.stroke_opacity
                    );
                    if let Some([on, off]) = style.dash {
                        let _ = write!(svg, r#" stroke-dasharray="{},{}""#, on * self.pixel_ratio, off * self.pixel_ratio);
                    }
                }
                svg.push_str("/>\n");
            }
            svg.push_str("</g>\n");
        }
        svg.push_str("</g>\n</svg>\n");
        svg
    }
}

/// The collections available for drawing, each optional because a
/// failed load leaves its layer out
#[derive(Clone, Copy, Debug, Default)]
pub struct Layers<'a> {
    pub historical: Option<&'a FeatureCollection>,
    pub administrative: Option<&'a VoteShareCollection>,
    pub risk_grid: Option<&'a FeatureCollection>,
}

/// Per-layer visibility toggles
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerVisibility {
    pub historical: bool,
    pub administrative: bool,
    pub risk_grid: bool,
}

impl Default for LayerVisibility {
    fn default() -> Self {
        Self {
            historical: true,
            administrative: true,
            risk_grid: true,
        }
    }
}

impl LayerVisibility {
    pub fn is_visible(&self, layer: LayerId) -> bool {
        match layer {
            LayerId::Historical => self.historical,
            LayerId::Administrative => self.administrative,
            LayerId::RiskGrid => self.risk_grid,
        }
    }

    /// Flip one layer, returning its new state
    pub fn toggle(&mut self, layer: LayerId) -> bool {
        let flag = match layer {
            LayerId::Historical => &mut self.historical,
            LayerId::Administrative => &mut self.administrative,
            LayerId::RiskGrid => &mut self.risk_grid,
        };
        *flag = !*flag;
        *flag
    }
}

/// Handles given to collaborators once the render surface exists
#[derive(Clone, Debug)]
pub struct SurfaceReady {
    pub projection: Projection,
    pub width: usize,
    pub height: usize,
}

type ReadyListener = Box<dyn FnOnce(&SurfaceReady)>;

/// One-shot "surface ready" event. Listeners subscribing after it fired
/// are called immediately.
#[derive(Default)]
pub struct ReadyNotifier {
    listeners: Vec<ReadyListener>,
    fired: Option<SurfaceReady>,
}

impl ReadyNotifier {
    pub fn subscribe(&mut self, listener: impl FnOnce(&SurfaceReady) + 'static) {
        match &self.fired {
            Some(ready) => listener(ready),
            None => self.listeners.push(Box::new(listener)),
        }
    }

    pub fn notify(&mut self, ready: SurfaceReady) {
        if self.fired.is_some() {
            return;
        }
        for listener in self.listeners.drain(..) {
            listener(&ready);
        }
        self.fired = Some(ready);
    }

    pub fn has_fired(&self) -> bool {
        self.fired.is_some()
    }
}

/// Owns the projection and the scene; turns collections into styled,
/// projected elements
pub struct RenderPipeline {
    projection: Projection,
    encoder: ColorEncoder,
    keys: AttributeKeys,
    pixel_ratio: f64,
    visibility: LayerVisibility,
    scene: Scene,
}

impl RenderPipeline {
    pub fn new(projection: Projection, width: usize, height: usize, config: &MapConfig) -> Self {
        let pixel_ratio = config.projection.pixel_ratio;
        Self {
            projection,
            encoder: config.encoder(),
            keys: config.attributes.clone(),
            pixel_ratio,
            visibility: LayerVisibility::default(),
            scene: Scene::new(width, height, pixel_ratio),
        }
    }

    /// Clear the scene and rebuild every visible layer in draw order.
    /// A layer that fails contributes nothing.
    pub fn render(&mut self, layers: &Layers<'_>) {
        let (width, height) = self.scene.size();
        let mut scene = Scene::new(width, height, self.pixel_ratio);

        for layer in LayerId::DRAW_ORDER {
            if !self.visibility.is_visible(layer) {
                debug!(%layer, "layer hidden");
                continue;
            }
            match self.build_layer(layer, layers) {
                Ok(Some(elements)) => {
                    info!(%layer, elements = elements.len(), "layer drawn");
                    scene.elements.extend(elements);
                }
                Ok(None) => debug!(%layer, "layer not loaded, skipped"),
                Err(err) => error!(%layer, "{err}; layer left empty"),
            }
        }

        scene.rebuild_index();
        self.scene = scene;
    }

    fn build_layer(&self, layer: LayerId, layers: &Layers<'_>) -> Result<Option<Vec<SceneElement>>> {
        let elements = match layer {
            LayerId::Historical => {
                let Some(collection) = layers.historical else {
                    return Ok(None);
                };
                self.project_all(layer, &collection.features, Interactivity::Tooltip, |feature, _| {
                    Some(historical_style(feature, &self.keys))
                })?
            }
            LayerId::Administrative => {
                let Some(collection) = layers.administrative else {
                    return Ok(None);
                };
                let range = collection.range();
                self.project_all(
                    layer,
                    &collection.features().features,
                    Interactivity::Highlight,
                    |_, index| {
                        collection
                            .record(index)
                            .map(|record| administrative_style(record, &range, &self.encoder))
                    },
                )?
            }
            LayerId::RiskGrid => {
                let Some(collection) = layers.risk_grid else {
                    return Ok(None);
                };
                self.project_all(layer, &collection.features, Interactivity::Inert, |feature, _| {
                    risk_grid_style(feature, &self.keys)
                })?
            }
        };
        Ok(Some(elements))
    }

    /// Project every styled feature. Any unprojectable feature fails the
    /// whole layer.
    fn project_all(
        &self,
        layer: LayerId,
        features: &[Feature],
        interactivity: Interactivity,
        style_for: impl Fn(&Feature, usize) -> Option<Style>,
    ) -> Result<Vec<SceneElement>> {
        let mut elements = Vec::with_capacity(features.len());
        for (index, feature) in features.iter().enumerate() {
            let Some(style) = style_for(feature, index) else {
                continue;
            };
            let path = self.projection.path_for(&feature.geometry);
            if !path.is_finite() {
                return Err(MapError::Unprojectable { layer, index });
            }
            let Some(bounds) = path.bounds() else {
                debug!(%layer, index, "feature has no coordinates");
                continue;
            };
            elements.push(SceneElement {
                feature: FeatureRef::new(layer, index),
                path,
                bounds,
                style,
                interactivity,
            });
        }
        Ok(elements)
    }

    /// Re-derive the projection's translate for a new viewport. The scene
    /// is stale until the next `render`.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.projection.set_viewport(width, height);
        self.scene.width = width;
        self.scene.height = height;
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn encoder(&self) -> &ColorEncoder {
        &self.encoder
    }

    pub fn visibility(&self) -> LayerVisibility {
        self.visibility
    }

    pub fn toggle_layer(&mut self, layer: LayerId) -> bool {
        self.visibility.toggle(layer)
    }

    pub fn size(&self) -> (usize, usize) {
        self.scene.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choropleth::NormalizationEngine;
    use crate::data::GeoGeometry;
    use crate::map::projection::ProjectionKind;
    use geojson::{JsonObject, JsonValue};
    use std::cell::Cell;
    use std::rc::Rc;

    fn config() -> MapConfig {
        MapConfig::default()
    }

    fn pipeline() -> RenderPipeline {
        let projection = Projection::from_config(&config().projection, 200, 160).unwrap();
        RenderPipeline::new(projection, 200, 160, &config())
    }

    fn square(lon: f64, lat: f64, size: f64) -> GeoGeometry {
        GeoGeometry::Polygon(vec![vec![
            (lon, lat),
            (lon + size, lat),
            (lon + size, lat + size),
            (lon, lat + size),
            (lon, lat),
        ]])
    }

    fn town(lon: f64, lat: f64, shares: [f64; 3]) -> Feature {
        let keys = AttributeKeys::default();
        let mut props = JsonObject::new();
        for (k, s) in keys.shares.iter().zip(shares) {
            props.insert(k.clone(), JsonValue::from(s));
        }
        Feature::new(square(lon, lat, 0.3), props)
    }

    fn cell(lon: f64, lat: f64, count: i64, level: i64) -> Feature {
        let mut props = JsonObject::new();
        props.insert("count".into(), JsonValue::from(count));
        props.insert("level".into(), JsonValue::from(level));
        Feature::new(square(lon, lat, 0.05), props)
    }

    fn boundary(name: &str) -> Feature {
        let mut props = JsonObject::new();
        props.insert("name".into(), JsonValue::from(name));
        Feature::new(GeoGeometry::LineString(vec![(120.5, 22.5), (121.5, 24.5)]), props)
    }

    fn fixture() -> (FeatureCollection, VoteShareCollection, FeatureCollection) {
        let engine = NormalizationEngine::new(&AttributeKeys::default());
        let towns = FeatureCollection::new(vec![
            town(120.6, 23.2, [40.0, 30.0, 30.0]),
            town(121.0, 23.2, [10.0, 60.0, 30.0]),
        ]);
        (
            FeatureCollection::new(vec![boundary("紅線"), boundary("藍線暫定界")]),
            VoteShareCollection::build(towns, &engine),
            FeatureCollection::new(vec![cell(120.7, 23.3, 0, 3), cell(121.1, 23.3, 4, 5)]),
        )
    }

    #[test]
    fn test_draw_order_and_grid_filter() {
        let (historical, towns, grid) = fixture();
        let mut pipeline = pipeline();
        pipeline.render(&Layers {
            historical: Some(&historical),
            administrative: Some(&towns),
            risk_grid: Some(&grid),
        });

        let order: Vec<FeatureRef> = pipeline.scene().elements().iter().map(|e| e.feature).collect();
        assert_eq!(
            order,
            vec![
                FeatureRef::new(LayerId::Historical, 0),
                FeatureRef::new(LayerId::Historical, 1),
                FeatureRef::new(LayerId::Administrative, 0),
                FeatureRef::new(LayerId::Administrative, 1),
                FeatureRef::new(LayerId::RiskGrid, 1),
            ]
        );
    }

    #[test]
    fn test_styles_follow_attributes() {
        let (historical, towns, grid) = fixture();
        let mut pipeline = pipeline();
        pipeline.render(&Layers {
            historical: Some(&historical),
            administrative: Some(&towns),
            risk_grid: Some(&grid),
        });
        let scene = pipeline.scene();

        let dashed = scene.element(FeatureRef::new(LayerId::Historical, 1)).unwrap();
        assert_eq!(dashed.style.dash, Some([6.0, 4.0]));
        assert_eq!(dashed.style.fill, None);
        assert_eq!(dashed.interactivity, Interactivity::Tooltip);

        let weak = scene.element(FeatureRef::new(LayerId::Administrative, 0)).unwrap();
        let strong = scene.element(FeatureRef::new(LayerId::Administrative, 1)).unwrap();
        assert_eq!(weak.style.fill, Some(Rgb::hex(0x00A8AC)));
        assert!((weak.style.fill_opacity - 0.2).abs() < 1e-12);
        assert_eq!(strong.style.fill, Some(Rgb::hex(0x4CAF50)));
        assert_eq!(strong.style.fill_opacity, 1.0);

        let hot = scene.element(FeatureRef::new(LayerId::RiskGrid, 1)).unwrap();
        assert_eq!(hot.style.fill, Some(Rgb::hex(0xD32F2F)));
        assert_eq!(hot.style.stroke, None);
        assert_eq!(hot.interactivity, Interactivity::Inert);
    }

    #[test]
    fn test_render_is_idempotent() {
        let (historical, towns, grid) = fixture();
        let layers = Layers {
            historical: Some(&historical),
            administrative: Some(&towns),
            risk_grid: Some(&grid),
        };
        let mut pipeline = pipeline();
        pipeline.render(&layers);
        let first = pipeline.scene().elements().to_vec();
        let mut canvas_a = BrailleCanvas::new(100, 40, BACKGROUND);
        pipeline.scene().paint(&mut canvas_a, &ZoomTransform::IDENTITY, None);

        pipeline.render(&layers);
        assert_eq!(pipeline.scene().elements(), first.as_slice());
        let mut canvas_b = BrailleCanvas::new(100, 40, BACKGROUND);
        pipeline.scene().paint(&mut canvas_b, &ZoomTransform::IDENTITY, None);
        for row in 0..40 {
            assert_eq!(canvas_a.row_cells(row), canvas_b.row_cells(row));
        }
    }

    #[test]
    fn test_missing_layers_render_the_rest() {
        let (_, towns, _) = fixture();
        let mut pipeline = pipeline();
        pipeline.render(&Layers {
            administrative: Some(&towns),
            ..Layers::default()
        });
        assert_eq!(pipeline.scene().elements().len(), 2);
        assert!(pipeline.scene().layer(LayerId::Historical).next().is_none());
    }

    #[test]
    fn test_unprojectable_feature_empties_its_layer_only() {
        let (historical, towns, _) = fixture();
        let bad = FeatureCollection::new(vec![
            cell(121.1, 23.3, 4, 5),
            Feature::new(
                GeoGeometry::Polygon(vec![vec![(f64::NAN, 23.0), (121.0, 23.0), (121.0, 24.0)]]),
                {
                    let mut props = JsonObject::new();
                    props.insert("count".into(), JsonValue::from(1));
                    props
                },
            ),
        ]);
        let mut pipeline = pipeline();
        pipeline.render(&Layers {
            historical: Some(&historical),
            administrative: Some(&towns),
            risk_grid: Some(&bad),
        });
        assert!(pipeline.scene().layer(LayerId::RiskGrid).next().is_none());
        assert_eq!(pipeline.scene().layer(LayerId::Administrative).count(), 2);
    }

    #[test]
    fn test_hidden_layer_is_not_drawn() {
        let (historical, towns, grid) = fixture();
        let mut pipeline = pipeline();
        assert!(!pipeline.toggle_layer(LayerId::Administrative));
        pipeline.render(&Layers {
            historical: Some(&historical),
            administrative: Some(&towns),
            risk_grid: Some(&grid),
        });
        assert!(pipeline.scene().layer(LayerId::Administrative).next().is_none());
        assert_eq!(pipeline.scene().layer(LayerId::RiskGrid).count(), 1);
    }

    #[test]
    fn test_hit_test_prefers_top_interactive_element() {
        let (historical, towns, grid) = fixture();
        let mut pipeline = pipeline();
        pipeline.render(&Layers {
            historical: Some(&historical),
            administrative: Some(&towns),
            risk_grid: Some(&grid),
        });
        let projection = pipeline.projection().clone();
        let scene = pipeline.scene();

        // Inside town 1, under the (inert) risk cell
        let p = projection.project(121.12, 23.32);
        assert_eq!(
            scene.hit_test(p, &ZoomTransform::IDENTITY),
            Some(FeatureRef::new(LayerId::Administrative, 1))
        );

        // Far from everything
        assert_eq!(scene.hit_test(DVec2::new(-500.0, -500.0), &ZoomTransform::IDENTITY), None);

        // Same map point after zooming
        let zoom = ZoomTransform::new(2.0, -150.0, -100.0);
        assert_eq!(scene.hit_test(zoom.apply(p), &zoom), Some(FeatureRef::new(LayerId::Administrative, 1)));
    }

    #[test]
    fn test_hit_test_finds_lines_within_tolerance() {
        let (historical, _, _) = fixture();
        let mut pipeline = pipeline();
        pipeline.render(&Layers {
            historical: Some(&historical),
            ..Layers::default()
        });
        let a = pipeline.projection().project(120.5, 22.5);
        let b = pipeline.projection().project(121.5, 24.5);
        let mid = (a + b) / 2.0 + DVec2::new(1.0, 0.0);
        let hit = pipeline.scene().hit_test(mid, &ZoomTransform::IDENTITY).unwrap();
        assert_eq!(hit.layer, LayerId::Historical);
    }

    #[test]
    fn test_paint_applies_emphasis_stroke() {
        let (_, towns, _) = fixture();
        let mut pipeline = pipeline();
        pipeline.render(&Layers {
            administrative: Some(&towns),
            ..Layers::default()
        });
        let target = FeatureRef::new(LayerId::Administrative, 1);
        let emphasis = StrokeOverride {
            feature: target,
            stroke: Rgb::hex(0xFF0000),
            stroke_width: 1.0,
        };
        let mut canvas = BrailleCanvas::new(100, 40, BACKGROUND);
        pipeline.scene().paint(&mut canvas, &ZoomTransform::IDENTITY, Some(&emphasis));
        let reddish = (0..40).flat_map(|r| canvas.row_cells(r).to_vec()).any(|c| match c.fg {
            Some(Rgb(r, g, b)) => r > 200 && g < 120 && b < 120,
            None => false,
        });
        assert!(reddish);
    }

    #[test]
    fn test_svg_export_lists_layers_in_order() {
        let (historical, towns, grid) = fixture();
        let mut pipeline = pipeline();
        pipeline.render(&Layers {
            historical: Some(&historical),
            administrative: Some(&towns),
            risk_grid: Some(&grid),
        });
        let svg = pipeline.scene().to_svg(&ZoomTransform::new(2.0, 1.0, 1.0), None);
        let h = svg.find(r#"class="historical-boundary""#).unwrap();
        let a = svg.find(r#"class="administrative-unit""#).unwrap();
        let g = svg.find(r#"class="risk-grid""#).unwrap();
        assert!(h < a && a < g);
        assert!(svg.contains(r#"transform="translate(1,1) scale(2)""#));
        assert!(svg.contains("stroke-dasharray=\"1.5,1\""));
        assert_eq!(svg.matches("<path").count(), 5);
    }

    #[test]
    fn test_ready_notifier_fires_once() {
        let calls = Rc::new(Cell::new(0));
        let mut notifier = ReadyNotifier::default();
        let c = calls.clone();
        notifier.subscribe(move |ready| {
            assert_eq!(ready.width, 200);
            c.set(c.get() + 1);
        });
        let projection =
            Projection::new(ProjectionKind::Mercator, (121.0, 23.5), 3000.0, [22.0, 25.0], DVec2::new(100.0, 80.0))
                .unwrap();
        let ready = SurfaceReady {
            projection,
            width: 200,
            height: 160,
        };
        notifier.notify(ready.clone());
        notifier.notify(ready);
        assert_eq!(calls.get(), 1);

        let late = calls.clone();
        notifier.subscribe(move |_| late.set(late.get() + 10));
        assert_eq!(calls.get(), 11);
        assert!(notifier.has_fired());
    }
}
