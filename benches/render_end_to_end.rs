mod common;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use penumbra::{ImageTarget, Renderer, RendererConfig, ShadowMethod};

fn render_end_to_end(c: &mut Criterion) {
    let scene = common::make_scene();
    let mut r = Renderer::new(RendererConfig::new(common::WIDTH, common::HEIGHT)).unwrap();
    let mut out = ImageTarget::new(common::WIDTH, common::HEIGHT);

    c.bench_function("render/end_to_end", |b| {
        b.iter(|| {
            r.render_image(black_box(&scene), &mut out).unwrap();
            black_box(out.hash64());
        })
    });

    // Soft sampling everywhere.
    let mut unmasked = scene.clone();
    for light in unmasked.lights_mut() {
        light.shadow.penumbra_mask = false;
        light.shadow.soft_method = ShadowMethod::Pcss;
    }

    c.bench_function("render/end_to_end/no_mask", |b| {
        b.iter(|| {
            r.render_image(black_box(&unmasked), &mut out).unwrap();
            black_box(out.hash64());
        })
    });
}

criterion_group!(benches, render_end_to_end);
criterion_main!(benches);
