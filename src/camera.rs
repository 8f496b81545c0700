use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::{error::RenderError, math::look_to};

/// OpenGL-style projection: the visible volume maps to `-w <= x, y, z <= w`
/// with `w > 0` in front of the eye.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective {
        fov_y_degrees: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        half_width: f32,
        half_height: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Projection {
    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } => *near,
            Projection::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } => *far,
            Projection::Orthographic { far, .. } => *far,
        }
    }

    pub fn is_perspective(&self) -> bool {
        matches!(self, Projection::Perspective { .. })
    }

    /// `aspect` is width over height; orthographic projections ignore it.
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        match self {
            Projection::Perspective {
                fov_y_degrees,
                near,
                far,
            } => {
                let f = 1.0 / (0.5 * fov_y_degrees.to_radians()).tan();
                let n = *near;
                let fa = *far;

                let m00 = f / aspect;
                let m11 = f;
                let m22 = (fa + n) / (n - fa);
                let m23 = (2.0 * fa * n) / (n - fa);

                Mat4::from_cols(
                    Vec4::new(m00, 0.0, 0.0, 0.0),
                    Vec4::new(0.0, m11, 0.0, 0.0),
                    Vec4::new(0.0, 0.0, m22, -1.0),
                    Vec4::new(0.0, 0.0, m23, 0.0),
                )
            }
            Projection::Orthographic {
                half_width,
                half_height,
                near,
                far,
            } => {
                let n = *near;
                let fa = *far;
                Mat4::from_cols(
                    Vec4::new(1.0 / half_width, 0.0, 0.0, 0.0),
                    Vec4::new(0.0, 1.0 / half_height, 0.0, 0.0),
                    Vec4::new(0.0, 0.0, -2.0 / (fa - n), 0.0),
                    Vec4::new(0.0, 0.0, -(fa + n) / (fa - n), 1.0),
                )
            }
        }
    }

    /// Rejects frusta that are non-finite or have no extent.
    pub fn validate(&self) -> Result<(), RenderError> {
        let (near, far) = (self.near(), self.far());
        if !(near.is_finite() && far.is_finite() && near > 0.0 && near < far) {
            return Err(RenderError::invalid_config(format!(
                "projection needs 0 < near < far, got near {near} far {far}"
            )));
        }
        match *self {
            Projection::Perspective { fov_y_degrees, .. } => {
                if !(fov_y_degrees > 0.0 && fov_y_degrees < 180.0) {
                    return Err(RenderError::invalid_config(format!(
                        "field of view must be in (0, 180) degrees, got {fov_y_degrees}"
                    )));
                }
            }
            Projection::Orthographic {
                half_width,
                half_height,
                ..
            } => {
                if !(half_width.is_finite() && half_height.is_finite())
                    || half_width <= 0.0
                    || half_height <= 0.0
                {
                    return Err(RenderError::invalid_config(format!(
                        "orthographic extent must be positive, got {half_width}x{half_height}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Distance along the view axis for an NDC depth in `[-1, 1]`.
    pub fn linear_depth(&self, ndc_z: f32) -> f32 {
        let n = self.near();
        let f = self.far();
        match self {
            Projection::Perspective { .. } => 2.0 * n * f / ((f + n) - ndc_z * (f - n)),
            Projection::Orthographic { .. } => 0.5 * (ndc_z * (f - n) + (f + n)),
        }
    }
}

/// Eye position, view direction and projection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub eye: Vec3,
    pub view_dir: Vec3,
    pub projection: Projection,
}

impl Camera {
    pub fn new(eye: Vec3, view_dir: Vec3, projection: Projection) -> Self {
        Self {
            eye,
            view_dir,
            projection,
        }
    }

    pub fn perspective(eye: Vec3, view_dir: Vec3, fov_y_degrees: f32, near: f32, far: f32) -> Self {
        Self::new(
            eye,
            view_dir,
            Projection::Perspective {
                fov_y_degrees,
                near,
                far,
            },
        )
    }

    pub fn view_matrix(&self) -> Mat4 {
        look_to(self.eye, self.view_dir)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        self.projection.matrix(aspect)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn near(&self) -> f32 {
        self.projection.near()
    }

    pub fn far(&self) -> f32 {
        self.projection.far()
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if !self.eye.is_finite() {
            return Err(RenderError::invalid_config("camera eye must be finite"));
        }
        if !self.view_dir.is_finite() || self.view_dir.length_squared() == 0.0 {
            return Err(RenderError::invalid_config(
                "camera view direction must be finite and non-zero",
            ));
        }
        self.projection.validate()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            view_dir: Vec3::NEG_Z,
            projection: Projection::default(),
        }
    }
}
