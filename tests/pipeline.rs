use approx::assert_relative_eq;
use glam::{Vec2, Vec3, Vec4};

use penumbra::{
    clip::{clip_triangle, ClipTriangle, ClipVertex},
    math::EPSILON,
    raster::{barycentric, perspective_correct, ScreenTriangle},
    Camera, Light, Material, Mesh, Model, PenumbraClass, Renderer, RendererConfig, Scene,
    ShaderId, ShadowConfig, ShadowMethod,
};

/// Routes the renderer's stage timings to the test output; `RUST_LOG=debug` shows them.
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn vertex(clip: Vec4, uv: Vec2) -> ClipVertex {
    ClipVertex {
        clip,
        world: clip.truncate(),
        normal: Vec3::Z,
        color: Vec3::ONE,
        uv,
    }
}

fn shadow_scene() -> Scene {
    shadow_scene_with(ShadowConfig::default().with_resolution(256, 256))
}

fn shadow_scene_with(shadow: ShadowConfig) -> Scene {
    init_logger();
    let camera = Camera::perspective(
        Vec3::new(0.0, -3.0, 6.0),
        Vec3::new(0.0, 0.5, -1.0),
        60.0,
        0.1,
        50.0,
    );
    let mut scene = Scene::new(camera);
    let mut floor = Model::from_mesh("floor", Mesh::quad(8.0), Material::new());
    floor.translate_to(Vec3::new(0.0, 0.0, -1.0));
    scene.add_model(floor);
    let mut blocker = Model::from_mesh("blocker", Mesh::quad(2.0), Material::new());
    blocker.translate_to(Vec3::new(0.2, 0.1, 1.0));
    blocker.rotate(Vec3::Z, 30.0);
    scene.add_model(blocker);
    scene.add_light(
        Light::spot(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, Vec3::splat(30.0))
            .with_fov(70.0, 1.0)
            .with_depth_range(0.5, 50.0)
            .with_size(0.5)
            .with_shadow(shadow),
    );
    scene
}

#[test]
fn clipping_keeps_inside_drops_outside_and_bounds_straddlers() {
    let inside = ClipTriangle {
        vertices: [
            vertex(Vec4::new(-0.5, -0.5, 0.0, 1.0), Vec2::ZERO),
            vertex(Vec4::new(0.5, -0.5, 0.0, 1.0), Vec2::X),
            vertex(Vec4::new(0.0, 0.5, 0.0, 1.0), Vec2::Y),
        ],
    };
    let mut out = Vec::new();
    clip_triangle(&inside, &mut out);
    assert_eq!(out, vec![inside]);

    let outside = ClipTriangle {
        vertices: [
            vertex(Vec4::new(2.0, 0.0, 0.0, 1.0), Vec2::ZERO),
            vertex(Vec4::new(3.0, 0.5, 0.0, 1.0), Vec2::X),
            vertex(Vec4::new(2.5, -0.5, 0.0, 1.0), Vec2::Y),
        ],
    };
    out.clear();
    clip_triangle(&outside, &mut out);
    assert!(out.is_empty());

    let straddling = ClipTriangle {
        vertices: [
            vertex(Vec4::new(-0.5, -0.5, 0.2, 1.0), Vec2::ZERO),
            vertex(Vec4::new(2.5, -0.2, 0.4, 2.0), Vec2::X),
            vertex(Vec4::new(0.0, 3.0, -1.5, 1.5), Vec2::Y),
        ],
    };
    out.clear();
    clip_triangle(&straddling, &mut out);
    assert!(!out.is_empty());
    for tri in &out {
        for v in &tri.vertices {
            let c = v.clip;
            for axis in [c.x, c.y, c.z] {
                assert!(axis <= c.w + EPSILON && axis >= -c.w - EPSILON, "{c:?}");
            }
        }
    }
}

#[test]
fn perspective_weights_recover_centroid_uv() {
    let camera = Camera::perspective(Vec3::ZERO, Vec3::NEG_Z, 60.0, 0.1, 100.0);
    let vp = camera.view_projection(1.0);
    let world = [
        Vec3::new(-1.0, -1.0, -2.0),
        Vec3::new(3.0, -1.0, -9.0),
        Vec3::new(0.0, 2.0, -4.0),
    ];
    let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
    let tri = ClipTriangle {
        vertices: std::array::from_fn(|i| ClipVertex {
            clip: vp * world[i].extend(1.0),
            world: world[i],
            normal: Vec3::Z,
            color: Vec3::ONE,
            uv: uvs[i],
        }),
    };
    let (w, h) = (512, 512);
    let screen = ScreenTriangle::new(&tri, 0, w, h).expect("visible triangle");

    let centroid = (world[0] + world[1] + world[2]) / 3.0;
    let c = vp * centroid.extend(1.0);
    let p = Vec2::new(
        (c.x / c.w + 1.0) * 0.5 * w as f32,
        (1.0 - c.y / c.w) * 0.5 * h as f32,
    );
    let [a, b, cc] = screen.screen;
    let bary = barycentric(a, b, cc, p).unwrap();
    let clip_w = Vec3::new(
        tri.vertices[0].clip.w,
        tri.vertices[1].clip.w,
        tri.vertices[2].clip.w,
    );
    let corrected = perspective_correct(bary, clip_w).unwrap();

    let expected = (uvs[0] + uvs[1] + uvs[2]) / 3.0;
    let uv = screen.uv(corrected);
    assert_relative_eq!(uv.x, expected.x, epsilon = 1e-4);
    assert_relative_eq!(uv.y, expected.y, epsilon = 1e-4);

    let naive = uvs[0] * bary.x + uvs[1] * bary.y + uvs[2] * bary.z;
    assert!((naive - expected).length() > 1e-2);
}

#[test]
fn depth_test_is_order_independent() {
    init_logger();
    let near = Mesh::quad(1.5).with_uniform_color(Vec3::new(1.0, 0.0, 0.0));
    let far = Mesh::quad(2.0).with_uniform_color(Vec3::new(0.0, 0.0, 1.0));
    let build = |first_near: bool| {
        let mut scene = Scene::default();
        let mut a = Model::from_mesh("near", near.clone(), Material::new());
        a.translate_to(Vec3::new(0.3, 0.0, 0.2));
        let mut b = Model::from_mesh("far", far.clone(), Material::new());
        b.translate_to(Vec3::new(-0.2, 0.1, -0.3));
        if first_near {
            scene.add_model(a);
            scene.add_model(b);
        } else {
            scene.add_model(b);
            scene.add_model(a);
        }
        scene
    };
    let config = RendererConfig::new(48, 40).with_shader(ShaderId::Unlit);
    let mut r1 = Renderer::new(config.clone()).unwrap();
    let mut r2 = Renderer::new(config).unwrap();
    r1.render(&build(true)).unwrap();
    r2.render(&build(false)).unwrap();
    assert_eq!(r1.gbuffer().depth_slice(), r2.gbuffer().depth_slice());
    assert_eq!(r1.color(), r2.color());
    assert!(r1.color().iter().any(|c| *c == Vec3::new(1.0, 0.0, 0.0)));
    assert!(r1.color().iter().any(|c| *c == Vec3::new(0.0, 0.0, 1.0)));
}

#[test]
fn tile_partition_does_not_change_output() {
    let scene = shadow_scene();
    let render = |tile_size: usize, threads: usize| {
        let mut r = Renderer::new(
            RendererConfig::new(70, 45)
                .with_tile_size(tile_size)
                .with_max_threads(threads),
        )
        .unwrap();
        r.render(&scene).unwrap();
        r.color().to_vec()
    };
    let single = render(4096, 1);
    assert_eq!(single, render(7, 4));
    assert_eq!(single, render(16, 3));
}

#[test]
fn visibility_stays_in_unit_range() {
    let scene = shadow_scene();
    let mut renderer = Renderer::new(RendererConfig::new(40, 30)).unwrap();
    renderer.render(&scene).unwrap();
    let engine = renderer.shadow(0).unwrap();
    let mut dark = 0;
    for i in 0..30 {
        for j in 0..30 {
            let p = Vec3::new(-3.0 + 0.2 * i as f32, -3.0 + 0.2 * j as f32, -1.0);
            for method in [ShadowMethod::Direct, ShadowMethod::Pcf, ShadowMethod::Pcss] {
                let v = engine.visibility(p, Vec3::Z, method);
                assert!((0.0..=1.0).contains(&v), "{method:?} at {p:?}: {v}");
                if v == 0.0 {
                    dark += 1;
                }
            }
        }
    }
    assert!(dark > 0);
    // Directly under the blocker every method reports full shadow.
    let under = Vec3::new(0.2, 0.1, -1.0);
    assert_eq!(engine.visibility(under, Vec3::Z, ShadowMethod::Direct), 0.0);
    assert_eq!(engine.visibility(under, Vec3::Z, ShadowMethod::Pcss), 0.0);
}

#[test]
fn lit_triangle_matches_closed_form() {
    init_logger();
    let mut scene = Scene::new(Camera::default());
    scene.add_model(Model::from_mesh("tri", Mesh::unit_triangle(), Material::new()));
    let light_pos = Vec3::new(0.0, 0.0, 3.0);
    let intensity = Vec3::splat(4.0);
    scene.add_light(
        Light::spot(light_pos, Vec3::NEG_Z, intensity)
            .with_shadow(ShadowConfig::default().with_resolution(512, 512)),
    );
    let mut renderer = Renderer::new(RendererConfig::new(64, 64)).unwrap();
    renderer.render(&scene).unwrap();

    let frag = renderer.gbuffer().at(32, 32).expect("center pixel covered");
    let clip = scene.camera.view_projection(1.0) * frag.position.extend(1.0);
    assert_relative_eq!(frag.depth, clip.z / clip.w * 0.5 + 0.5, epsilon = 1e-4);
    assert!(frag.position.z.abs() < 1e-4);
    assert!(frag.position.truncate().length() < 0.05);

    let p = frag.position;
    let n = Vec3::Z;
    let kd = Vec3::splat(0.8);
    let ks = Vec3::splat(0.8);
    let l = (light_pos - p).normalize();
    let v = (scene.camera.eye - p).normalize();
    let h = (l + v).normalize();
    let radiance = intensity / (light_pos - p).length_squared();
    let expected = kd * 0.05 + l.dot(n).max(0.0) * kd * radiance
        + h.dot(n).max(0.0).powf(150.0) * ks * radiance;

    let color = renderer.color_at(32, 32).unwrap();
    assert_relative_eq!(color.x, expected.x, epsilon = 1e-5);
    assert_relative_eq!(color.y, expected.y, epsilon = 1e-5);
    assert_relative_eq!(color.z, expected.z, epsilon = 1e-5);

    // Nothing covers the corner.
    assert_eq!(renderer.color_at(0, 0), Some(Vec3::splat(0.7)));
}

#[test]
fn penumbra_mask_agrees_with_direct_test() {
    let scene = shadow_scene();
    let (w, h) = (64, 48);
    let mut renderer = Renderer::new(RendererConfig::new(w, h)).unwrap();
    let stats = renderer.render(&scene).unwrap();
    assert!(stats.penumbra_cells > 0);

    let engine = renderer.shadow(0).unwrap();
    let mask = engine.penumbra_mask().expect("mask enabled by default");
    assert_eq!((mask.width(), mask.height()), (16, 12));
    assert!(mask.count(PenumbraClass::Shadow) > 0);

    for y in 0..h {
        for x in 0..w {
            let Some(frag) = renderer.gbuffer().at(x, y) else {
                continue;
            };
            let direct = engine.visibility(frag.position, frag.normal, ShadowMethod::Direct);
            match mask.class_at(x, y) {
                PenumbraClass::Bright => assert_eq!(direct, 1.0, "pixel {x},{y}"),
                PenumbraClass::Shadow => assert_eq!(direct, 0.0, "pixel {x},{y}"),
                PenumbraClass::Penumbra => {}
            }
        }
    }
}

#[test]
fn penumbra_cells_match_unmasked_render() {
    let config = RendererConfig::new(48, 36);
    let shadow = ShadowConfig::default().with_resolution(256, 256);

    let mut masked = Renderer::new(config.clone()).unwrap();
    masked.render(&shadow_scene_with(shadow.clone())).unwrap();
    let mut unmasked = Renderer::new(config).unwrap();
    let stats = unmasked
        .render(&shadow_scene_with(shadow.with_penumbra_mask(false)))
        .unwrap();
    assert_eq!(stats.penumbra_cells, 0);
    assert!(unmasked.shadow(0).unwrap().penumbra_mask().is_none());

    // Both renders run the soft method wherever the mask asks for it.
    let mask = masked.shadow(0).unwrap().penumbra_mask().unwrap();
    let mut soft = 0;
    for y in 0..36 {
        for x in 0..48 {
            if mask.value_at(x, y) > EPSILON {
                soft += 1;
                assert_eq!(masked.color_at(x, y), unmasked.color_at(x, y), "pixel {x},{y}");
            }
        }
    }
    assert!(soft > 0);
}
