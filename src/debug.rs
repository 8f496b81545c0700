use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::shadow::PenumbraClass;

/// Which buffer the renderer writes to its color output.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DebugView {
    #[default]
    Final,
    Depth,
    Normals,
    Diffuse,
    /// Penumbra classification of the first light.
    PenumbraMask,
    /// Shadow visibility of the first light.
    ShadowVisibility,
}

impl DebugView {
    pub fn as_str(self) -> &'static str {
        match self {
            DebugView::Final => "final",
            DebugView::Depth => "depth",
            DebugView::Normals => "normals",
            DebugView::Diffuse => "diffuse",
            DebugView::PenumbraMask => "penumbra-mask",
            DebugView::ShadowVisibility => "shadow-visibility",
        }
    }

    pub fn parse(s: &str) -> Option<DebugView> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "final" => DebugView::Final,
            "depth" => DebugView::Depth,
            "normals" | "normal" => DebugView::Normals,
            "diffuse" | "kd" => DebugView::Diffuse,
            "penumbra-mask" | "penumbra" | "mask" => DebugView::PenumbraMask,
            "shadow-visibility" | "shadow" | "visibility" => DebugView::ShadowVisibility,
            _ => return None,
        })
    }

    /// Whether the view reads shadow maps.
    pub fn needs_shadows(self) -> bool {
        matches!(
            self,
            DebugView::Final | DebugView::PenumbraMask | DebugView::ShadowVisibility
        )
    }
}

/// Depth in `[0, 1]` as gray, near is dark.
pub fn depth_rgb(depth: f32) -> Vec3 {
    Vec3::splat(depth.clamp(0.0, 1.0))
}

pub fn normal_rgb(normal: Vec3) -> Vec3 {
    (normal + Vec3::ONE) * 0.5
}

/// Bright cells are white, shadow cells black, penumbra cells red. The
/// blurred mask value pulls neighbouring cells toward red.
pub fn mask_rgb(class: PenumbraClass, blurred: f32) -> Vec3 {
    const PENUMBRA: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    let base = match class {
        PenumbraClass::Bright => Vec3::ONE,
        PenumbraClass::Shadow => Vec3::ZERO,
        PenumbraClass::Penumbra => PENUMBRA,
    };
    base.lerp(PENUMBRA, blurred.clamp(0.0, 1.0))
}
