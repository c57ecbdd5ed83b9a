use crate::device::GraphicsBackend;
use crate::geometry::Aabb;

use super::RenderInfo;

/// Capabilities shared by all geometric renderables.
///
/// Draw calls bind their own program and leave it bound; callers issue passes
/// in the order forward, transparent, shadow.
pub trait Renderable {
    /// World-space bounds including the renderable's own transform.
    fn compute_aabb(&self) -> Aabb;

    /// Fingerprint of the fully resolved configuration.
    fn compute_hash(&self) -> u64;

    fn render_forward(&self, backend: &mut dyn GraphicsBackend, info: &RenderInfo);

    fn render_transparent(&self, backend: &mut dyn GraphicsBackend, info: &RenderInfo);

    fn render_shadow(&self, backend: &mut dyn GraphicsBackend, info: &RenderInfo);
}
