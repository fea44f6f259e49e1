use boundary_map::braille::BrailleCanvas;
use boundary_map::choropleth::{NormalizationEngine, VoteShareCollection};
use boundary_map::config::MapConfig;
use boundary_map::data::demo_layers;
use boundary_map::map::{Layers, Projection, RenderPipeline, ZoomTransform, BACKGROUND};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const WIDTH: usize = 400;
const HEIGHT: usize = 320;

fn bench_normalize(c: &mut Criterion) {
    let config = MapConfig::default();
    let (_, towns, _) = demo_layers(&config.attributes);
    let engine = NormalizationEngine::new(&config.attributes);

    c.bench_function("normalize_scan", |b| b.iter(|| engine.scan(black_box(&towns.features))));
}

fn bench_path_for(c: &mut Criterion) {
    let config = MapConfig::default();
    let (_, towns, _) = demo_layers(&config.attributes);
    let projection = Projection::from_config(&config.projection, WIDTH, HEIGHT).expect("projection");

    c.bench_function("path_for_towns", |b| {
        b.iter(|| {
            for feature in &towns.features {
                black_box(projection.path_for(&feature.geometry));
            }
        })
    });
}

fn bench_render_and_paint(c: &mut Criterion) {
    let config = MapConfig::default();
    let (historical, towns, grid) = demo_layers(&config.attributes);
    let towns = VoteShareCollection::build(towns, &NormalizationEngine::new(&config.attributes));
    let layers = Layers {
        historical: Some(&historical),
        administrative: Some(&towns),
        risk_grid: Some(&grid),
    };
    let projection = Projection::from_config(&config.projection, WIDTH, HEIGHT).expect("projection");
    let mut pipeline = RenderPipeline::new(projection, WIDTH, HEIGHT, &config);

    c.bench_function("render_scene", |b| b.iter(|| pipeline.render(black_box(&layers))));

    let mut canvas = BrailleCanvas::new(WIDTH / 2, HEIGHT / 4, BACKGROUND);
    for (name, zoom) in [
        ("paint_identity", ZoomTransform::IDENTITY),
        ("paint_zoomed", ZoomTransform::new(8.0, -1400.0, -1100.0)),
    ] {
        c.bench_function(name, |b| b.iter(|| pipeline.scene().paint(&mut canvas, black_box(&zoom), None)));
    }
}

criterion_group!(benches, bench_normalize, bench_path_for, bench_render_and_paint);
criterion_main!(benches);
