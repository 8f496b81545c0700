use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{gbuffer::Fragment, math::EPSILON};

/// One light's contribution at a shaded point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightSample {
    /// Unit vector from the surface toward the light.
    pub direction: Vec3,
    /// Intensity after falloff.
    pub radiance: Vec3,
    /// Shadow visibility in `[0, 1]`.
    pub visibility: f32,
}

pub trait Shader {
    /// Color of `frag` seen from `eye`.
    fn shade(&self, frag: &Fragment, eye: Vec3, lights: &[LightSample]) -> Vec3;
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShaderId {
    #[default]
    BlinnPhong,
    Unlit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlinnPhongShader {
    /// Fraction of the diffuse color added per light regardless of shadow.
    pub ambient: f32,
    pub shininess: f32,
}

impl Default for BlinnPhongShader {
    fn default() -> Self {
        Self {
            ambient: 0.05,
            shininess: 150.0,
        }
    }
}

impl Shader for BlinnPhongShader {
    fn shade(&self, frag: &Fragment, eye: Vec3, lights: &[LightSample]) -> Vec3 {
        let n = frag.normal;
        let v = (eye - frag.position).normalize_or_zero();
        let mut out = frag.glow;
        for light in lights {
            out += frag.diffuse * self.ambient;
            if light.visibility < EPSILON {
                continue;
            }
            let l = light.direction;
            let h = (v + l).normalize_or_zero();
            let diffuse = l.dot(n).max(0.0) * frag.diffuse * light.radiance;
            let specular = h.dot(n).max(0.0).powf(self.shininess) * frag.specular * light.radiance;
            out += light.visibility * (diffuse + specular);
        }
        out
    }
}

/// Diffuse plus glow, ignoring lights.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UnlitShader;

impl Shader for UnlitShader {
    fn shade(&self, frag: &Fragment, _eye: Vec3, _lights: &[LightSample]) -> Vec3 {
        frag.diffuse + frag.glow
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BuiltinShader {
    BlinnPhong(BlinnPhongShader),
    Unlit(UnlitShader),
}

impl BuiltinShader {
    pub fn from_id(id: ShaderId) -> Self {
        match id {
            ShaderId::BlinnPhong => BuiltinShader::BlinnPhong(BlinnPhongShader::default()),
            ShaderId::Unlit => BuiltinShader::Unlit(UnlitShader),
        }
    }

    pub fn id(&self) -> ShaderId {
        match self {
            BuiltinShader::BlinnPhong(_) => ShaderId::BlinnPhong,
            BuiltinShader::Unlit(_) => ShaderId::Unlit,
        }
    }

    /// Whether the shader reads light samples at all.
    pub fn uses_lights(&self) -> bool {
        matches!(self, BuiltinShader::BlinnPhong(_))
    }
}

impl Shader for BuiltinShader {
    fn shade(&self, frag: &Fragment, eye: Vec3, lights: &[LightSample]) -> Vec3 {
        match self {
            BuiltinShader::BlinnPhong(s) => s.shade(frag, eye, lights),
            BuiltinShader::Unlit(s) => s.shade(frag, eye, lights),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frag() -> Fragment {
        Fragment {
            depth: 0.5,
            position: Vec3::ZERO,
            normal: Vec3::Z,
            diffuse: Vec3::new(0.8, 0.4, 0.2),
            specular: Vec3::splat(0.8),
            glow: Vec3::new(0.0, 0.0, 0.1),
        }
    }

    #[test]
    fn head_on_light_matches_closed_form() {
        let shader = BlinnPhongShader::default();
        let light = LightSample {
            direction: Vec3::Z,
            radiance: Vec3::splat(0.5),
            visibility: 1.0,
        };
        let c = shader.shade(&frag(), Vec3::new(0.0, 0.0, 2.0), &[light]);
        // n.l = n.h = 1
        let kd = frag().diffuse;
        let expected = frag().glow + kd * 0.05 + kd * 0.5 + Vec3::splat(0.8 * 0.5);
        assert_relative_eq!(c.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(c.y, expected.y, epsilon = 1e-6);
        assert_relative_eq!(c.z, expected.z, epsilon = 1e-6);
    }

    #[test]
    fn shadowed_light_keeps_only_ambient() {
        let shader = BlinnPhongShader::default();
        let light = LightSample {
            direction: Vec3::Z,
            radiance: Vec3::ONE,
            visibility: 0.0,
        };
        let c = shader.shade(&frag(), Vec3::Z, &[light, light]);
        let expected = frag().glow + frag().diffuse * 0.1;
        assert_relative_eq!(c.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(c.z, expected.z, epsilon = 1e-6);
    }

    #[test]
    fn light_behind_surface_adds_nothing_direct() {
        let shader = BlinnPhongShader::default();
        let light = LightSample {
            direction: Vec3::NEG_Z,
            radiance: Vec3::ONE,
            visibility: 1.0,
        };
        let c = shader.shade(&frag(), Vec3::Z, &[light]);
        assert_relative_eq!(c.x, 0.8 * 0.05, epsilon = 1e-6);
    }

    #[test]
    fn builtin_dispatch_matches_id() {
        let unlit = BuiltinShader::from_id(ShaderId::Unlit);
        assert_eq!(unlit.id(), ShaderId::Unlit);
        assert!(!unlit.uses_lights());
        assert_eq!(unlit.shade(&frag(), Vec3::Z, &[]), frag().diffuse + frag().glow);
        assert_eq!(BuiltinShader::from_id(ShaderId::default()).id(), ShaderId::BlinnPhong);
    }
}
