use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

/// Per-frame camera and target state, read-only to renderables.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderInfo {
    pub view: Mat4,
    pub proj: Mat4,
    /// Camera position in world space.
    pub cam_pos: Vec3,
    /// Target size in pixels.
    pub resolution: UVec2,
    /// Frames accumulated so far; seeds stochastic transparency.
    pub accumulation_count: u32,
    /// Informational for renderables: reverse Z is carried by `proj` and the
    /// target's depth compare, and fragment depth is written unmapped.
    pub reverse_z_enabled: bool,
    /// Fragments with `dot(plane.xyz, p) > plane.w` are clipped.
    pub clip_plane: Vec4,
}

/// Plane that clips nothing.
pub const NO_CLIP_PLANE: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

impl RenderInfo {
    /// Perspective camera at `eye` looking at `target` with +Y up.
    ///
    /// `fov_y` is the full vertical field of view in radians.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y: f32, resolution: UVec2) -> Self {
        let aspect = resolution.x.max(1) as f32 / resolution.y.max(1) as f32;
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            proj: Mat4::perspective_rh(fov_y, aspect, 0.1, 1000.0),
            cam_pos: eye,
            resolution,
            accumulation_count: 0,
            reverse_z_enabled: false,
            clip_plane: NO_CLIP_PLANE,
        }
    }

    pub fn with_accumulation_count(mut self, count: u32) -> Self {
        self.accumulation_count = count;
        self
    }

    pub fn with_clip_plane(mut self, plane: Vec4) -> Self {
        self.clip_plane = plane;
        self
    }

    pub fn with_reverse_z(mut self, enabled: bool) -> Self {
        self.reverse_z_enabled = enabled;
        self
    }

    /// `tan(fovY / 2)` recovered from the projection matrix.
    #[inline]
    pub fn tan_half_fov_y(&self) -> f32 {
        1.0 / self.proj.y_axis.y.abs()
    }

    #[inline]
    pub fn screen_size(&self) -> Vec2 {
        self.resolution.as_vec2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tan_half_fov_from_projection() {
        let info = RenderInfo::look_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            90f32.to_radians(),
            UVec2::new(800, 600),
        );
        assert!((info.tan_half_fov_y() - 1.0).abs() < 1e-5);
        assert_eq!(info.screen_size(), Vec2::new(800.0, 600.0));
    }

    #[test]
    fn default_plane_clips_nothing() {
        let p = Vec3::new(1e3, -1e3, 1e3);
        assert!(NO_CLIP_PLANE.truncate().dot(p) <= NO_CLIP_PLANE.w);
    }
}
