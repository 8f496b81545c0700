#![allow(dead_code)]

use penumbra::{Camera, Light, Material, Mesh, Model, Scene, ShadowConfig};

use glam::Vec3;

pub const WIDTH: usize = 320;
pub const HEIGHT: usize = 180;

pub fn make_scene() -> Scene {
    let _ = env_logger::builder().try_init();
    let camera = Camera::perspective(
        Vec3::new(0.0, -4.0, 5.5),
        Vec3::new(0.0, 0.7, -1.0),
        60.0,
        0.05,
        100.0,
    );
    let mut scene = Scene::new(camera);
    scene.add_light(
        Light::spot(Vec3::new(-2.0, -1.0, 6.0), Vec3::new(0.3, 0.15, -1.0), Vec3::splat(40.0))
            .with_size(0.8)
            .with_shadow(ShadowConfig::default().with_resolution(1024, 1024)),
    );

    let mut floor = Model::from_mesh("floor", Mesh::quad(10.0), Material::new());
    floor.translate_to(Vec3::new(0.0, 0.0, -0.5));
    scene.add_model(floor);

    // A small grid of cubes casting overlapping shadows.
    let grid = 4;
    let spacing = 1.1_f32;
    for y in 0..grid {
        for x in 0..grid {
            let tx = (x as f32 - (grid as f32 - 1.0) * 0.5) * spacing;
            let ty = (y as f32 - (grid as f32 - 1.0) * 0.5) * spacing;
            let mut cube = Model::from_mesh(format!("cube-{x}-{y}"), Mesh::unit_cube(), Material::new());
            cube.set_scale(0.6);
            cube.translate_to(Vec3::new(tx, ty, 0.5 + 0.2 * (x + y) as f32));
            cube.rotate(Vec3::Z, 15.0 * (x * grid + y) as f32);
            scene.add_model(cube);
        }
    }

    scene
}
