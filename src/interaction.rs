use glam::DVec2;
use tracing::debug;

use crate::choropleth::{Candidate, ColorEncoder, NormalizationRange, Rgb, WinningRecord};
use crate::config::AttributeKeys;
use crate::data::Feature;
use crate::map::{FeatureRef, Interactivity, Scene, StrokeOverride, ZoomTransform};

/// Tooltip offset from the pointer, in screen pixels
pub const TOOLTIP_OFFSET: DVec2 = DVec2::new(10.0, -10.0);

/// Emphasis stroke of a hovered administrative unit
pub const EMPHASIS_STROKE: Rgb = Rgb::hex(0xFF0000);
pub const EMPHASIS_WIDTH: f64 = 1.0;

/// Tooltip opacity while shown
const TOOLTIP_VISIBLE: f64 = 1.0;

const NOTE_COLOR: Rgb = Rgb::hex(0x666666);

/// One line of tooltip text
#[derive(Clone, Debug, PartialEq)]
pub struct TooltipLine {
    pub text: String,
    pub color: Option<Rgb>,
    pub bold: bool,
}

impl TooltipLine {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::plain(text)
        }
    }

    pub fn colored(text: impl Into<String>, color: Rgb) -> Self {
        Self {
            color: Some(color),
            ..Self::plain(text)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tooltip {
    pub lines: Vec<TooltipLine>,
    /// Top-left corner in screen pixels
    pub position: DVec2,
    /// Map-space point under the pointer, under the transform current at
    /// the last placement
    pub map_anchor: DVec2,
    pub opacity: f64,
}

impl Tooltip {
    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0 && !self.lines.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum HighlightState {
    #[default]
    Idle,
    Hovering {
        feature: FeatureRef,
        /// Whether the feature takes the emphasis stroke
        emphasized: bool,
    },
}

/// Everything that can change hover or pan/zoom state
#[derive(Clone, Debug, PartialEq)]
pub enum InteractionEvent {
    PointerEnter {
        target: FeatureRef,
        emphasize: bool,
        lines: Vec<TooltipLine>,
        position: DVec2,
    },
    PointerMove(DVec2),
    PointerLeave,
    ZoomChanged(ZoomTransform),
    ResetView,
}

/// Supplies tooltip content for a feature
pub trait FeatureInspector {
    fn describe(&self, feature: FeatureRef) -> Option<Vec<TooltipLine>>;
}

/// Hover and pan/zoom state machine. Hover (`Idle`/`Hovering`) and the
/// zoom transform are independent; neither touches feature data.
#[derive(Clone, Debug)]
pub struct InteractionController {
    zoom_extent: [f64; 2],
    transform: ZoomTransform,
    state: HighlightState,
    tooltip: Tooltip,
}

impl InteractionController {
    pub fn new(zoom_extent: [f64; 2]) -> Self {
        Self {
            zoom_extent,
            transform: ZoomTransform::IDENTITY,
            state: HighlightState::Idle,
            tooltip: Tooltip::default(),
        }
    }

    pub fn handle(&mut self, event: InteractionEvent) {
        match event {
            InteractionEvent::PointerEnter {
                target,
                emphasize,
                lines,
                position,
            } => {
                debug!(layer = %target.layer, index = target.index, "hover start");
                self.state = HighlightState::Hovering {
                    feature: target,
                    emphasized: emphasize,
                };
                self.tooltip.lines = lines;
                self.tooltip.opacity = TOOLTIP_VISIBLE;
                self.place_tooltip(position);
            }
            InteractionEvent::PointerMove(position) => {
                if matches!(self.state, HighlightState::Hovering { .. }) {
                    self.place_tooltip(position);
                }
            }
            InteractionEvent::PointerLeave => {
                if let HighlightState::Hovering { feature, .. } = self.state {
                    debug!(layer = %feature.layer, index = feature.index, "hover end");
                }
                self.state = HighlightState::Idle;
                self.tooltip.opacity = 0.0;
                self.tooltip.lines.clear();
            }
            InteractionEvent::ZoomChanged(transform) => {
                self.transform = transform.clamped(self.zoom_extent);
            }
            InteractionEvent::ResetView => {
                self.transform = ZoomTransform::IDENTITY;
            }
        }
    }

    /// Reads the transform at call time, so a move after a zoom anchors
    /// the tooltip under the new transform
    fn place_tooltip(&mut self, pointer: DVec2) {
        self.tooltip.position = pointer + TOOLTIP_OFFSET;
        self.tooltip.map_anchor = self.transform.invert(pointer);
    }

    /// Hit-test the scene at a pointer position and emit whichever of
    /// enter, move or leave that implies
    pub fn pointer_at(&mut self, position: DVec2, scene: &Scene, inspector: &dyn FeatureInspector) {
        let target = scene.hit_test(position, &self.transform);
        match (self.state, target) {
            (HighlightState::Hovering { feature, .. }, Some(t)) if feature == t => {
                self.handle(InteractionEvent::PointerMove(position));
            }
            (state, Some(t)) => {
                if state != HighlightState::Idle {
                    self.handle(InteractionEvent::PointerLeave);
                }
                let emphasize = scene
                    .element(t)
                    .is_some_and(|e| e.interactivity == Interactivity::Highlight);
                let lines = inspector.describe(t).unwrap_or_default();
                self.handle(InteractionEvent::PointerEnter {
                    target: t,
                    emphasize,
                    lines,
                    position,
                });
            }
            (HighlightState::Hovering { .. }, None) => self.handle(InteractionEvent::PointerLeave),
            (HighlightState::Idle, None) => {}
        }
    }

    /// Zoom by `factor` keeping the map point under `anchor` fixed
    pub fn zoom_by(&mut self, factor: f64, anchor: DVec2) {
        let next = self.transform.scaled_about(factor, anchor, self.zoom_extent);
        self.handle(InteractionEvent::ZoomChanged(next));
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let next = self.transform.translated(dx, dy);
        self.handle(InteractionEvent::ZoomChanged(next));
    }

    pub fn reset_view(&mut self) {
        self.handle(InteractionEvent::ResetView);
    }

    /// Stroke override for the hovered feature, if it takes one
    pub fn emphasis(&self) -> Option<StrokeOverride> {
        match self.state {
            HighlightState::Hovering {
                feature,
                emphasized: true,
            } => Some(StrokeOverride {
                feature,
                stroke: EMPHASIS_STROKE,
                stroke_width: EMPHASIS_WIDTH,
            }),
            _ => None,
        }
    }

    pub fn hovered(&self) -> Option<FeatureRef> {
        match self.state {
            HighlightState::Hovering { feature, .. } => Some(feature),
            HighlightState::Idle => None,
        }
    }

    pub fn transform(&self) -> ZoomTransform {
        self.transform
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    pub fn tooltip(&self) -> &Tooltip {
        &self.tooltip
    }
}

/// Tooltip of an administrative unit: place, leader, confidence, and
/// each candidate's share and votes
pub fn vote_share_tooltip(
    feature: &Feature,
    record: &WinningRecord,
    range: &NormalizationRange,
    encoder: &ColorEncoder,
    keys: &AttributeKeys,
) -> Vec<TooltipLine> {
    let county = feature.text(&keys.county).unwrap_or("");
    let town = feature.text(&keys.town).unwrap_or("");
    let confidence = encoder.opacity_for(record, range) * 100.0;

    let mut lines = vec![
        TooltipLine::bold(format!("{county} {town}").trim().to_string()),
        TooltipLine::bold(format!("最高得票：{}", keys.candidates[record.leading.index()])),
        TooltipLine::plain(format!("透明度：{confidence:.1}%")),
    ];
    for candidate in Candidate::PRIORITY {
        let i = candidate.index();
        let votes = feature.number(&keys.votes[i]).unwrap_or(0.0);
        lines.push(TooltipLine::colored(
            format!(
                "{}: {:.1}% ({}票)",
                keys.candidates[i],
                record.shares[i],
                group_thousands(votes)
            ),
            encoder.color_for_candidate(Some(candidate)),
        ));
    }
    lines
}

/// Tooltip of a historical boundary: its name and note
pub fn boundary_tooltip(feature: &Feature, keys: &AttributeKeys) -> Vec<TooltipLine> {
    let mut lines = vec![TooltipLine::bold(feature.text(&keys.boundary_name).unwrap_or(""))];
    if let Some(note) = feature.text(&keys.boundary_note) {
        lines.push(TooltipLine::colored(note, NOTE_COLOR));
    }
    lines
}

/// Integer with comma thousands separators
fn group_thousands(value: f64) -> String {
    let n = value.round() as i64;
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
