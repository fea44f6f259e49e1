use tracing::{debug, info};

use crate::config::AttributeKeys;
use crate::data::{Feature, FeatureCollection, LayerId};
use crate::error::MapError;

/// One of the three competing tickets. Declaration order is the
/// tie-break priority: when shares are equal the earlier candidate leads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Candidate {
    A,
    B,
    C,
}

impl Candidate {
    pub const PRIORITY: [Candidate; 3] = [Candidate::A, Candidate::B, Candidate::C];

    pub fn index(self) -> usize {
        match self {
            Candidate::A => 0,
            Candidate::B => 1,
            Candidate::C => 2,
        }
    }
}

/// Leading candidate of a feature and the share it won with
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WinningRecord {
    pub leading: Candidate,
    pub winning_share: f64,
    /// All three shares, indexed by [`Candidate::index`]
    pub shares: [f64; 3],
}

/// Observed spread of winning shares over one collection
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizationRange {
    pub min: f64,
    pub max: f64,
}

impl NormalizationRange {
    /// Range of an empty collection. Its clamped span is 0, so every
    /// opacity computed against it is 1.
    pub const EMPTY: NormalizationRange = NormalizationRange { min: 100.0, max: 0.0 };

    pub fn span(&self) -> f64 {
        (self.max - self.min).max(0.0)
    }
}

/// Scans vote-share features for their winning records and the
/// collection-wide range.
#[derive(Clone, Debug)]
pub struct NormalizationEngine {
    share_keys: [String; 3],
    county_key: String,
    town_key: String,
}

impl NormalizationEngine {
    pub fn new(keys: &AttributeKeys) -> Self {
        Self {
            share_keys: keys.shares.clone(),
            county_key: keys.county.clone(),
            town_key: keys.town.clone(),
        }
    }

    /// Missing or non-numeric shares count as 0
    pub fn compute_winning_record(&self, feature: &Feature, index: usize) -> WinningRecord {
        let mut shares = [0.0; 3];
        for (slot, key) in shares.iter_mut().zip(&self.share_keys) {
            *slot = feature.number(key).unwrap_or_else(|| {
                let err = MapError::MalformedFeature {
                    layer: LayerId::Administrative,
                    index,
                    attribute: key.clone(),
                };
                debug!("{err}; using 0");
                0.0
            });
        }

        let leading = Candidate::PRIORITY
            .into_iter()
            .reduce(|best, c| if shares[c.index()] > shares[best.index()] { c } else { best })
            .unwrap_or(Candidate::A);

        WinningRecord {
            leading,
            winning_share: shares[leading.index()],
            shares,
        }
    }

    pub fn compute_range(&self, features: &[Feature]) -> NormalizationRange {
        self.scan(features).1
    }

    /// Single pass producing every record plus the range. The extreme
    /// features are logged so the opacity endpoints can be traced back.
    pub fn scan(&self, features: &[Feature]) -> (Vec<WinningRecord>, NormalizationRange) {
        let mut records = Vec::with_capacity(features.len());
        let mut range = NormalizationRange::EMPTY;
        let mut weakest: Option<usize> = None;
        let mut strongest: Option<usize> = None;

        for (index, feature) in features.iter().enumerate() {
            let record = self.compute_winning_record(feature, index);
            if record.winning_share < range.min {
                range.min = record.winning_share;
                weakest = Some(index);
            }
            if record.winning_share > range.max {
                range.max = record.winning_share;
                strongest = Some(index);
            }
            records.push(record);
        }

        if range.min > range.max {
            range.min = range.max;
        }

        if let Some(index) = strongest {
            info!(
                share = range.max,
                place = %self.place_name(&features[index]),
                "highest winning share maps to full opacity"
            );
        }
        if let Some(index) = weakest {
            info!(
                share = range.min,
                place = %self.place_name(&features[index]),
                "lowest winning share maps to the opacity floor"
            );
        }

        (records, range)
    }

    fn place_name(&self, feature: &Feature) -> String {
        let county = feature.text(&self.county_key).unwrap_or("");
        let town = feature.text(&self.town_key).unwrap_or("");
        format!("{county} {town}").trim().to_string()
    }
}

/// A vote-share collection together with everything derived from it.
/// Reloading replaces the whole value, so the range can never disagree
/// with the features it was computed from.
#[derive(Clone, Debug)]
pub struct VoteShareCollection {
    collection: FeatureCollection,
    records: Vec<WinningRecord>,
    range: NormalizationRange,
}

impl VoteShareCollection {
    pub fn build(collection: FeatureCollection, engine: &NormalizationEngine) -> Self {
        let (records, range) = engine.scan(&collection.features);
        Self {
            collection,
            records,
            range,
        }
    }

    pub fn features(&self) -> &FeatureCollection {
        &self.collection
    }

    pub fn record(&self, index: usize) -> Option<&WinningRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[WinningRecord] {
        &self.records
    }

    pub fn range(&self) -> NormalizationRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choropleth::ColorEncoder;
    use crate::data::GeoGeometry;
    use geojson::{JsonObject, JsonValue};

    fn feature(shares: [Option<f64>; 3]) -> Feature {
        let keys = AttributeKeys::default();
        let mut props = JsonObject::new();
        for (key, share) in keys.shares.iter().zip(shares) {
            if let Some(s) = share {
                props.insert(key.clone(), JsonValue::from(s));
            }
        }
        Feature::new(GeoGeometry::Polygon(vec![]), props)
    }

    fn shares(a: f64, b: f64, c: f64) -> Feature {
        feature([Some(a), Some(b), Some(c)])
    }

    fn engine() -> NormalizationEngine {
        NormalizationEngine::new(&AttributeKeys::default())
    }

    #[test]
    fn test_winner_is_max_share() {
        let record = engine().compute_winning_record(&shares(30.0, 45.5, 24.5), 0);
        assert_eq!(record.leading, Candidate::B);
        assert_eq!(record.winning_share, 45.5);
        assert_eq!(record.shares, [30.0, 45.5, 24.5]);
    }

    #[test]
    fn test_ties_resolve_by_priority() {
        let e = engine();
        assert_eq!(e.compute_winning_record(&shares(40.0, 40.0, 20.0), 0).leading, Candidate::A);
        assert_eq!(e.compute_winning_record(&shares(20.0, 40.0, 40.0), 0).leading, Candidate::B);
        assert_eq!(e.compute_winning_record(&shares(33.0, 20.0, 33.0), 0).leading, Candidate::A);
        for _ in 0..10 {
            assert_eq!(e.compute_winning_record(&shares(50.0, 50.0, 50.0), 0).leading, Candidate::A);
        }
    }

    #[test]
    fn test_missing_shares_default_to_zero() {
        let record = engine().compute_winning_record(&feature([None, Some(12.0), None]), 3);
        assert_eq!(record.shares, [0.0, 12.0, 0.0]);
        assert_eq!(record.leading, Candidate::B);

        let record = engine().compute_winning_record(&feature([None, None, None]), 4);
        assert_eq!(record.leading, Candidate::A);
        assert_eq!(record.winning_share, 0.0);
    }

    #[test]
    fn test_two_feature_scenario() {
        let features = vec![shares(40.0, 30.0, 20.0), shares(60.0, 10.0, 10.0)];
        let collection = VoteShareCollection::build(FeatureCollection::new(features), &engine());
        let range = collection.range();
        assert_eq!(range, NormalizationRange { min: 40.0, max: 60.0 });

        let encoder = ColorEncoder::default();
        let opacities: Vec<f64> = collection
            .records()
            .iter()
            .map(|r| encoder.opacity_for(r, &range))
            .collect();
        assert!((opacities[0] - 0.2).abs() < 1e-12);
        assert_eq!(opacities[1], 1.0);
    }

    #[test]
    fn test_single_feature_has_zero_span() {
        let features = vec![shares(50.0, 50.0, 50.0)];
        let range = engine().compute_range(&features);
        assert_eq!(range, NormalizationRange { min: 50.0, max: 50.0 });
        assert_eq!(range.span(), 0.0);
    }

    #[test]
    fn test_empty_collection_range() {
        let range = engine().compute_range(&[]);
        assert_eq!(range, NormalizationRange::EMPTY);
        assert_eq!(range.span(), 0.0);
    }

    #[test]
    fn test_range_is_order_independent() {
        let mut features = vec![
            shares(41.0, 30.0, 29.0),
            shares(20.0, 70.0, 10.0),
            shares(35.0, 33.0, 32.0),
            shares(10.0, 10.0, 80.0),
        ];
        let forward = engine().compute_range(&features);
        features.reverse();
        assert_eq!(engine().compute_range(&features), forward);
        features.swap(0, 2);
        assert_eq!(engine().compute_range(&features), forward);
        assert_eq!(forward, NormalizationRange { min: 35.0, max: 80.0 });
    }

    #[test]
    fn test_every_opacity_respects_floor() {
        let features: Vec<Feature> = (0..50)
            .map(|i| {
                let a = 34.0 + (i as f64 * 7.3) % 40.0;
                shares(a, (100.0 - a) / 2.0, (100.0 - a) / 2.0)
            })
            .collect();
        let collection = VoteShareCollection::build(FeatureCollection::new(features), &engine());
        let range = collection.range();
        let encoder = ColorEncoder::default();
        for record in collection.records() {
            let opacity = encoder.opacity_for(record, &range);
            assert!((0.2..=1.0).contains(&opacity), "opacity {opacity}");
            if (record.winning_share - range.max).abs() < 1e-9 {
                assert_eq!(opacity, 1.0);
            }
        }
    }
}
