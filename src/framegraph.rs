/// A stage of the frame. Stages run one after another; each is a
/// fork-join over the tile scheduler.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FramePassId {
    /// Look-at and depth rasterization for every light.
    ShadowDepth,
    ClipCamera,
    RasterizeGBuffer,
    PenumbraMask,
    Shade,
    /// Copy to an 8-bit output target.
    Resolve,
}

#[derive(Clone, Debug)]
pub struct FramePass {
    pub id: FramePassId,
    pub deps: Vec<FramePassId>,
}

/// What a frame needs, decided by the renderer from its config and scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSettings {
    pub shadows: bool,
    pub penumbra_mask: bool,
    pub resolve: bool,
}

#[derive(Clone, Debug)]
pub struct FrameGraph {
    passes: Vec<FramePass>,
}

impl FrameGraph {
    pub fn new(settings: FrameSettings) -> Self {
        let mut passes = Vec::new();
        if settings.shadows {
            passes.push(FramePass {
                id: FramePassId::ShadowDepth,
                deps: Vec::new(),
            });
        }
        passes.push(FramePass {
            id: FramePassId::ClipCamera,
            deps: Vec::new(),
        });
        passes.push(FramePass {
            id: FramePassId::RasterizeGBuffer,
            deps: vec![FramePassId::ClipCamera],
        });

        let mut shade_deps = vec![FramePassId::RasterizeGBuffer];
        if settings.shadows {
            shade_deps.push(FramePassId::ShadowDepth);
            if settings.penumbra_mask {
                passes.push(FramePass {
                    id: FramePassId::PenumbraMask,
                    deps: vec![FramePassId::ShadowDepth, FramePassId::RasterizeGBuffer],
                });
                shade_deps.push(FramePassId::PenumbraMask);
            }
        }
        passes.push(FramePass {
            id: FramePassId::Shade,
            deps: shade_deps,
        });

        if settings.resolve {
            passes.push(FramePass {
                id: FramePassId::Resolve,
                deps: vec![FramePassId::Shade],
            });
        }
        Self { passes }
    }

    pub fn passes(&self) -> &[FramePass] {
        &self.passes
    }

    pub fn contains(&self, id: FramePassId) -> bool {
        self.passes.iter().any(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_orders_dependencies() {
        let fg = FrameGraph::new(FrameSettings {
            shadows: true,
            penumbra_mask: true,
            resolve: true,
        });
        let ids: Vec<_> = fg.passes().iter().map(|p| p.id).collect();
        assert_eq!(
            ids,
            vec![
                FramePassId::ShadowDepth,
                FramePassId::ClipCamera,
                FramePassId::RasterizeGBuffer,
                FramePassId::PenumbraMask,
                FramePassId::Shade,
                FramePassId::Resolve,
            ]
        );
        // Every dependency runs earlier.
        for (i, pass) in fg.passes().iter().enumerate() {
            for dep in &pass.deps {
                let j = ids.iter().position(|id| id == dep).unwrap();
                assert!(j < i, "{:?} depends on later {:?}", pass.id, dep);
            }
        }
    }

    #[test]
    fn mask_requires_shadows() {
        let fg = FrameGraph::new(FrameSettings {
            shadows: false,
            penumbra_mask: true,
            resolve: false,
        });
        assert!(!fg.contains(FramePassId::ShadowDepth));
        assert!(!fg.contains(FramePassId::PenumbraMask));
        assert!(!fg.contains(FramePassId::Resolve));
        assert_eq!(fg.passes().last().map(|p| p.id), Some(FramePassId::Shade));
    }
}
