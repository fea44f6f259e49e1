use geojson::{JsonObject, JsonValue};

use crate::config::AttributeKeys;
use crate::data::{Feature, FeatureCollection, GeoGeometry, LonLat};
use crate::hash::{hash2, rand_simple};

/// Synthetic stand-in layers used when no data files are present.
/// Returns (historical, administrative, risk grid).
pub fn demo_layers(keys: &AttributeKeys) -> (FeatureCollection, FeatureCollection, FeatureCollection) {
    (demo_boundaries(keys), demo_towns(keys), demo_grid(keys))
}

fn rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Vec<LonLat> {
    vec![
        (min_lon, min_lat),
        (max_lon, min_lat),
        (max_lon, max_lat),
        (min_lon, max_lat),
        (min_lon, min_lat),
    ]
}

fn props(pairs: impl IntoIterator<Item = (String, JsonValue)>) -> JsonObject {
    pairs.into_iter().collect()
}

fn demo_boundaries(keys: &AttributeKeys) -> FeatureCollection {
    let lines = [
        ("紅線", "乾隆十五年番界", vec![(120.55, 22.4), (120.6, 23.0), (120.75, 23.8), (121.0, 24.6), (121.5, 25.0)]),
        ("藍線暫定界", "乾隆二十五年番界（暫定）", vec![(120.7, 22.3), (120.75, 23.1), (120.9, 23.9), (121.2, 24.7)]),
        ("紫線", "乾隆四十九年番界", vec![(120.85, 22.5), (120.95, 23.4), (121.15, 24.2)]),
    ];

    let features = lines
        .into_iter()
        .map(|(name, note, line)| {
            Feature::new(
                GeoGeometry::LineString(line),
                props([
                    (keys.boundary_name.clone(), JsonValue::from(name)),
                    (keys.boundary_note.clone(), JsonValue::from(note)),
                ]),
            )
        })
        .collect();
    FeatureCollection::new(features)
}

fn demo_towns(keys: &AttributeKeys) -> FeatureCollection {
    const COLS: usize = 4;
    const ROWS: usize = 6;
    let (lon0, lat0, step_lon, step_lat) = (120.0, 22.0, 0.5, 0.55);

    let mut features = Vec::with_capacity(COLS * ROWS);
    for row in 0..ROWS {
        for col in 0..COLS {
            let min_lon = lon0 + col as f64 * step_lon;
            let min_lat = lat0 + row as f64 * step_lat;
            let ring = rect(min_lon, min_lat, min_lon + step_lon, min_lat + step_lat);

            // Three raw weights normalised to percentages
            let seed = hash2(row as u64, col as u64);
            let weights: Vec<f64> = (0..3)
                .map(|i| 0.2 + rand_simple(seed.wrapping_add(i)))
                .collect();
            let total: f64 = weights.iter().sum();
            let turnout = 20_000.0 + rand_simple(seed ^ 0xabcdef) * 80_000.0;

            let mut pairs = vec![
                (keys.county.clone(), JsonValue::from(format!("縣市{}", row + 1))),
                (keys.town.clone(), JsonValue::from(format!("鄉鎮{}", col + 1))),
            ];
            for i in 0..3 {
                let share = weights[i] / total * 100.0;
                pairs.push((keys.shares[i].clone(), JsonValue::from((share * 100.0).round() / 100.0)));
                pairs.push((keys.votes[i].clone(), JsonValue::from((turnout * share / 100.0).round() as u64)));
            }

            features.push(Feature::new(GeoGeometry::Polygon(vec![ring]), props(pairs)));
        }
    }
    FeatureCollection::new(features)
}

fn demo_grid(keys: &AttributeKeys) -> FeatureCollection {
    let mut features = Vec::new();
    for i in 0..40u64 {
        let lon = 120.1 + rand_simple(hash2(i, 1)) * 1.8;
        let lat = 22.1 + rand_simple(hash2(i, 2)) * 3.0;
        let count = (rand_simple(hash2(i, 3)) * 30.0) as u64;
        let level = 1 + (count / 6).min(4);

        features.push(Feature::new(
            GeoGeometry::Polygon(vec![rect(lon, lat, lon + 0.05, lat + 0.05)]),
            props([
                (keys.grid_count.clone(), JsonValue::from(count)),
                (keys.grid_level.clone(), JsonValue::from(level)),
            ]),
        ));
    }
    FeatureCollection::new(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_towns_have_all_shares() {
        let keys = AttributeKeys::default();
        let (historical, towns, grid) = demo_layers(&keys);
        assert_eq!(historical.len(), 3);
        assert_eq!(towns.len(), 24);
        assert_eq!(grid.len(), 40);

        for town in &towns.features {
            let sum: f64 = keys.shares.iter().filter_map(|k| town.number(k)).sum();
            assert!((sum - 100.0).abs() < 0.1, "shares sum to {sum}");
        }
    }

    #[test]
    fn test_demo_is_deterministic() {
        let keys = AttributeKeys::default();
        let (_, a, _) = demo_layers(&keys);
        let (_, b, _) = demo_layers(&keys);
        let first = |fc: &FeatureCollection| fc.features[5].number(&keys.shares[0]);
        assert_eq!(first(&a), first(&b));
    }
}
