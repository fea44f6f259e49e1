use crate::choropleth::normalize::{Candidate, NormalizationRange, WinningRecord};

/// An opaque sRGB colour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb::hex(0xFFFFFF);
    pub const BLACK: Rgb = Rgb::hex(0x000000);

    pub const fn hex(value: u32) -> Self {
        Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Parse `#RRGGBB` (the leading `#` is optional)
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Rgb::hex)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    /// Composite `self` at `alpha` over an opaque `base`
    pub fn over(self, base: Rgb, alpha: f64) -> Rgb {
        let a = alpha.clamp(0.0, 1.0);
        let mix = |top: u8, bottom: u8| (top as f64 * a + bottom as f64 * (1.0 - a)).round() as u8;
        Rgb(mix(self.0, base.0), mix(self.1, base.1), mix(self.2, base.2))
    }
}

/// Used for anything without a category of its own
pub const NEUTRAL: Rgb = Rgb::hex(0x9E9E9E);

/// Lowest opacity a non-leading feature can get
pub const OPACITY_FLOOR: f64 = 0.2;

/// Shares this close to the range maximum count as the maximum
pub const MAX_SHARE_EPSILON: f64 = 1e-9;

/// Maps winning records to a fill colour and a relative opacity
#[derive(Clone, Debug)]
pub struct ColorEncoder {
    palette: [Rgb; 3],
}

impl Default for ColorEncoder {
    fn default() -> Self {
        Self {
            palette: [Rgb::hex(0x00A8AC), Rgb::hex(0x4CAF50), Rgb::hex(0x1976D2)],
        }
    }
}

impl ColorEncoder {
    pub fn new(palette: [Rgb; 3]) -> Self {
        Self { palette }
    }

    pub fn palette(&self) -> [Rgb; 3] {
        self.palette
    }

    pub fn color_for(&self, record: &WinningRecord) -> Rgb {
        self.color_for_candidate(Some(record.leading))
    }

    pub fn color_for_candidate(&self, candidate: Option<Candidate>) -> Rgb {
        candidate.map_or(NEUTRAL, |c| self.palette[c.index()])
    }

    /// Opacity of a feature relative to the observed spread of the
    /// collection: the strongest winner is fully opaque, the weakest
    /// fades to [`OPACITY_FLOOR`].
    pub fn opacity_for(&self, record: &WinningRecord, range: &NormalizationRange) -> f64 {
        let span = range.span();
        if span == 0.0 || (record.winning_share - range.max).abs() < MAX_SHARE_EPSILON {
            return 1.0;
        }
        let t = (record.winning_share - range.min) / span;
        (OPACITY_FLOOR + (1.0 - OPACITY_FLOOR) * t).clamp(0.0, 1.0)
    }
}

/// Five-step risk scale, level 1 (low) to 5 (high)
pub fn risk_level_color(level: Option<f64>) -> Rgb {
    match level.map(|l| l.round() as i64) {
        Some(1) => Rgb::hex(0x1A237E),
        Some(2) => Rgb::hex(0x4CAF50),
        Some(3) => Rgb::hex(0xFBC02D),
        Some(4) => Rgb::hex(0xFF6F00),
        Some(5) => Rgb::hex(0xD32F2F),
        _ => NEUTRAL,
    }
}

/// Stroke treatment of a historical boundary line
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryStroke {
    pub color: Rgb,
    /// Dash and gap length in CSS pixels; `None` draws a solid line
    pub dash: Option<[f64; 2]>,
}

const PROVISIONAL_MARK: &str = "暫定界";

pub fn boundary_stroke(name: Option<&str>) -> BoundaryStroke {
    let color = match name {
        Some("紅線") => Rgb::hex(0xE53935),
        Some("藍線") => Rgb::hex(0x1E88E5),
        Some("紫線") => Rgb::hex(0x8E24AA),
        Some(n) if n.contains("藍線暫定界") => Rgb::hex(0x1E88E5),
        _ => Rgb::hex(0x999999),
    };
    let dash = name
        .filter(|n| n.contains(PROVISIONAL_MARK))
        .map(|_| [6.0, 4.0]);
    BoundaryStroke { color, dash }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(leading: Candidate, share: f64) -> WinningRecord {
        let mut shares = [0.0; 3];
        shares[leading.index()] = share;
        WinningRecord {
            leading,
            winning_share: share,
            shares,
        }
    }

    #[test]
    fn test_palette_lookup() {
        let encoder = ColorEncoder::default();
        assert_eq!(encoder.color_for(&record(Candidate::A, 50.0)), Rgb::hex(0x00A8AC));
        assert_eq!(encoder.color_for(&record(Candidate::B, 50.0)), Rgb::hex(0x4CAF50));
        assert_eq!(encoder.color_for(&record(Candidate::C, 50.0)), Rgb::hex(0x1976D2));
        assert_eq!(encoder.color_for_candidate(None), NEUTRAL);
    }

    #[test]
    fn test_opacity_interpolates_between_floor_and_one() {
        let encoder = ColorEncoder::default();
        let range = NormalizationRange { min: 40.0, max: 60.0 };
        assert_relative_eq!(encoder.opacity_for(&record(Candidate::A, 40.0), &range), 0.2);
        assert_relative_eq!(encoder.opacity_for(&record(Candidate::A, 50.0), &range), 0.6);
        assert_eq!(encoder.opacity_for(&record(Candidate::A, 60.0), &range), 1.0);
        assert_eq!(encoder.opacity_for(&record(Candidate::A, 60.0 - 1e-12), &range), 1.0);
    }

    #[test]
    fn test_opacity_degenerate_span() {
        let encoder = ColorEncoder::default();
        let flat = NormalizationRange { min: 50.0, max: 50.0 };
        assert_eq!(encoder.opacity_for(&record(Candidate::B, 12.0), &flat), 1.0);
        // An empty collection's range has a negative raw span, clamped to 0
        assert_eq!(encoder.opacity_for(&record(Candidate::B, 12.0), &NormalizationRange::EMPTY), 1.0);
    }

    #[test]
    fn test_opacity_stays_in_unit_interval_outside_range() {
        let encoder = ColorEncoder::default();
        let range = NormalizationRange { min: 40.0, max: 60.0 };
        assert_eq!(encoder.opacity_for(&record(Candidate::A, 10.0), &range), 0.0);
        assert_eq!(encoder.opacity_for(&record(Candidate::A, 90.0), &range), 1.0);
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(risk_level_color(Some(1.0)), Rgb::hex(0x1A237E));
        assert_eq!(risk_level_color(Some(5.0)), Rgb::hex(0xD32F2F));
        assert_eq!(risk_level_color(Some(7.0)), NEUTRAL);
        assert_eq!(risk_level_color(None), NEUTRAL);
    }

    #[test]
    fn test_boundary_strokes() {
        assert_eq!(boundary_stroke(Some("紅線")).color, Rgb::hex(0xE53935));
        assert_eq!(boundary_stroke(Some("紅線")).dash, None);
        let provisional = boundary_stroke(Some("藍線暫定界"));
        assert_eq!(provisional.color, Rgb::hex(0x1E88E5));
        assert_eq!(provisional.dash, Some([6.0, 4.0]));
        let unknown = boundary_stroke(Some("綠線暫定界"));
        assert_eq!(unknown.color, Rgb::hex(0x999999));
        assert!(unknown.dash.is_some());
        assert_eq!(boundary_stroke(None).color, Rgb::hex(0x999999));
    }

    #[test]
    fn test_rgb_helpers() {
        assert_eq!(Rgb::parse("#4CAF50"), Some(Rgb(0x4C, 0xAF, 0x50)));
        assert_eq!(Rgb::parse("4caf50"), Some(Rgb(0x4C, 0xAF, 0x50)));
        assert_eq!(Rgb::parse("#fff"), None);
        assert_eq!(Rgb::parse("#+12345"), None);
        assert_eq!(Rgb::parse("-12345"), None);
        assert_eq!(Rgb(0x4C, 0xAF, 0x50).to_hex(), "#4CAF50");
        assert_eq!(Rgb::BLACK.over(Rgb::WHITE, 0.5), Rgb(128, 128, 128));
        assert_eq!(Rgb::BLACK.over(Rgb::WHITE, 0.0), Rgb::WHITE);
    }
}
