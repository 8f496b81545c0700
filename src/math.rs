use glam::{Mat4, Vec2, Vec3};

/// Tolerance used for inside tests, visibility thresholds and guarded divisions.
pub const EPSILON: f32 = 1e-4;

const GOLDEN_ANGLE: f32 = 2.399_963_2;

/// View matrix for an eye at `eye` looking along `dir`.
///
/// The up vector is +Y orthogonalized against `dir`, or +Z when `dir` is
/// (anti)parallel to +Y.
pub fn look_to(eye: Vec3, dir: Vec3) -> Mat4 {
    let dir = dir.normalize_or_zero();
    let dir = if dir.length_squared() > 0.0 { dir } else { Vec3::NEG_Z };
    let up = if dir.dot(Vec3::Y).abs() > 0.999 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    Mat4::look_to_rh(eye, dir, up)
}

/// `count` points on the unit disk following a Fibonacci spiral.
///
/// Sample `i` has radius `(i / count)^(0.5 * clump_exponent)`; an exponent of 1
/// spreads samples uniformly by area, larger values pull them toward the center.
pub fn fibonacci_disk(count: usize, clump_exponent: f32) -> Vec<Vec2> {
    if count == 0 {
        return Vec::new();
    }
    let inv = 1.0 / count as f32;
    (0..count)
        .map(|i| {
            let theta = i as f32 * GOLDEN_ANGLE;
            let r = (i as f32 * inv).powf(0.5 * clump_exponent);
            Vec2::new(theta.cos(), theta.sin()) * r
        })
        .collect()
}

/// Horizontal pass of a clamped box filter over a row-major `width * height` grid.
pub fn box_blur_horizontal(input: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let mut output = vec![0.0; input.len()];
    if width == 0 {
        return output;
    }
    let norm = 1.0 / (2 * radius + 1) as f32;
    let r = radius as isize;
    for y in 0..height {
        let row = &input[y * width..(y + 1) * width];
        for x in 0..width {
            let mut sum = 0.0;
            for offset in -r..=r {
                let sx = (x as isize + offset).clamp(0, width as isize - 1) as usize;
                sum += row[sx];
            }
            output[y * width + x] = sum * norm;
        }
    }
    output
}

/// Vertical pass of a clamped box filter over a row-major `width * height` grid.
pub fn box_blur_vertical(input: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let mut output = vec![0.0; input.len()];
    if height == 0 {
        return output;
    }
    let norm = 1.0 / (2 * radius + 1) as f32;
    let r = radius as isize;
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for offset in -r..=r {
                let sy = (y as isize + offset).clamp(0, height as isize - 1) as usize;
                sum += input[sy * width + x];
            }
            output[y * width + x] = sum * norm;
        }
    }
    output
}

/// Separable box blur, horizontal then vertical.
pub fn box_blur(input: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    if radius == 0 {
        return input.to_vec();
    }
    box_blur_vertical(
        &box_blur_horizontal(input, width, height, radius),
        width,
        height,
        radius,
    )
}
