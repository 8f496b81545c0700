use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::{
    camera::Projection,
    config::ShadowConfig,
    error::RenderError,
    math::{look_to, EPSILON},
};

/// Frustum and softness parameters specific to a light type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Perspective light at `position` aimed along `direction`, with
    /// inverse-square falloff.
    Spot {
        direction: Vec3,
        fov_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
        /// Emitter size, drives PCSS penumbra width.
        light_size: f32,
    },
    /// Parallel light along `direction` with an orthographic shadow frustum
    /// placed at `position`. No falloff.
    Directional {
        direction: Vec3,
        view_width: f32,
        view_height: f32,
        near: f32,
        far: f32,
        /// Apparent diameter of the emitter in degrees.
        angular_diameter_degrees: f32,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub intensity: Vec3,
    pub kind: LightKind,
    #[serde(default)]
    pub shadow: ShadowConfig,
}

impl Light {
    pub fn spot(position: Vec3, direction: Vec3, intensity: Vec3) -> Self {
        Self {
            position,
            intensity,
            kind: LightKind::Spot {
                direction: direction.normalize_or_zero(),
                fov_degrees: 90.0,
                aspect: 1.0,
                near: 0.1,
                far: 1000.0,
                light_size: 1.0,
            },
            shadow: ShadowConfig::default(),
        }
    }

    pub fn directional(position: Vec3, direction: Vec3, intensity: Vec3) -> Self {
        Self {
            position,
            intensity,
            kind: LightKind::Directional {
                direction: direction.normalize_or_zero(),
                view_width: 50.0,
                view_height: 50.0,
                near: 0.1,
                far: 1000.0,
                angular_diameter_degrees: 3.0,
            },
            shadow: ShadowConfig::default().with_resolution(4096, 4096),
        }
    }

    pub fn with_shadow(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = shadow;
        self
    }

    /// Sets the near and far planes of either light type.
    pub fn with_depth_range(mut self, near_plane: f32, far_plane: f32) -> Self {
        match &mut self.kind {
            LightKind::Spot { near, far, .. } | LightKind::Directional { near, far, .. } => {
                *near = near_plane;
                *far = far_plane;
            }
        }
        self
    }

    /// Field of view and aspect ratio; ignored for directional lights.
    pub fn with_fov(mut self, fov: f32, aspect_ratio: f32) -> Self {
        if let LightKind::Spot {
            fov_degrees, aspect, ..
        } = &mut self.kind
        {
            *fov_degrees = fov;
            *aspect = aspect_ratio;
        }
        self
    }

    /// Emitter size: `light_size` for spot lights, angular diameter in
    /// degrees for directional lights.
    pub fn with_size(mut self, size: f32) -> Self {
        match &mut self.kind {
            LightKind::Spot { light_size, .. } => *light_size = size,
            LightKind::Directional {
                angular_diameter_degrees,
                ..
            } => *angular_diameter_degrees = size,
        }
        self
    }

    /// Width and height of the orthographic frustum; ignored for spot lights.
    pub fn with_view_size(mut self, width: f32, height: f32) -> Self {
        if let LightKind::Directional {
            view_width,
            view_height,
            ..
        } = &mut self.kind
        {
            *view_width = width;
            *view_height = height;
        }
        self
    }

    pub fn direction(&self) -> Vec3 {
        match self.kind {
            LightKind::Spot { direction, .. } | LightKind::Directional { direction, .. } => {
                direction
            }
        }
    }

    pub fn is_directional(&self) -> bool {
        matches!(self.kind, LightKind::Directional { .. })
    }

    pub fn projection(&self) -> Projection {
        match self.kind {
            LightKind::Spot {
                fov_degrees,
                near,
                far,
                ..
            } => Projection::Perspective {
                fov_y_degrees: fov_degrees,
                near,
                far,
            },
            LightKind::Directional {
                view_width,
                view_height,
                near,
                far,
                ..
            } => Projection::Orthographic {
                half_width: 0.5 * view_width,
                half_height: 0.5 * view_height,
                near,
                far,
            },
        }
    }

    pub fn aspect(&self) -> f32 {
        match self.kind {
            LightKind::Spot { aspect, .. } => aspect,
            LightKind::Directional {
                view_width,
                view_height,
                ..
            } => view_width / view_height,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        look_to(self.position, self.direction())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection().matrix(self.aspect())
    }

    /// Unit vector from `point` toward the light.
    pub fn direction_from(&self, point: Vec3) -> Vec3 {
        match self.kind {
            LightKind::Spot { .. } => (self.position - point).normalize_or_zero(),
            LightKind::Directional { direction, .. } => -direction,
        }
    }

    /// Incoming intensity at `point` after falloff.
    pub fn radiance_at(&self, point: Vec3) -> Vec3 {
        match self.kind {
            LightKind::Spot { .. } => {
                let dist_sq = (self.position - point).length_squared().max(EPSILON);
                self.intensity / dist_sq
            }
            LightKind::Directional { .. } => self.intensity,
        }
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        self.shadow.validate()?;
        if self.direction() == Vec3::ZERO {
            return Err(RenderError::invalid_config("light direction must be non-zero"));
        }
        let (near, far) = match self.kind {
            LightKind::Spot {
                fov_degrees,
                aspect,
                near,
                far,
                light_size,
                ..
            } => {
                if !(fov_degrees > 0.0 && fov_degrees < 180.0) {
                    return Err(RenderError::invalid_config(format!(
                        "spot light fov must be in (0, 180), got {fov_degrees}"
                    )));
                }
                if !(aspect > 0.0 && light_size >= 0.0) {
                    return Err(RenderError::invalid_config(
                        "spot light aspect must be positive and light_size non-negative",
                    ));
                }
                (near, far)
            }
            LightKind::Directional {
                view_width,
                view_height,
                near,
                far,
                angular_diameter_degrees,
                ..
            } => {
                if !(view_width > 0.0 && view_height > 0.0) {
                    return Err(RenderError::invalid_config(
                        "directional light view size must be positive",
                    ));
                }
                if !(0.0..180.0).contains(&angular_diameter_degrees) {
                    return Err(RenderError::invalid_config(
                        "angular diameter must be in [0, 180)",
                    ));
                }
                (near, far)
            }
        };
        if !(near > 0.0 && far > near) {
            return Err(RenderError::invalid_config(format!(
                "light depth range must satisfy 0 < near < far, got {near}..{far}"
            )));
        }
        Ok(())
    }
}
