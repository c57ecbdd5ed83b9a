use glam::{Vec2, Vec3, Vec4};

use crate::error::RenderError;
use crate::geometry::Aabb;

/// Per-vertex data of a finished mesh.
///
/// Every optional sequence is either empty or holds exactly one entry per
/// position. `aabb` is kept in sync by the constructors; providers that
/// assemble the struct by hand are expected to fill it themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshDefinition {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub uv_channels: Vec<Vec<Vec2>>,
    pub color_channels: Vec<Vec<Vec4>>,
    pub indices: Vec<u32>,
    pub aabb: Aabb,
}

/// Named per-vertex stream of a [`MeshDefinition`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MeshChannel {
    Position,
    Normal,
    Tangent,
    Uv(usize),
    Color(usize),
}

impl MeshChannel {
    /// Kind byte followed by the full channel index, little-endian.
    pub(crate) fn tag(self) -> [u8; 9] {
        let (kind, index) = match self {
            MeshChannel::Position => (0u8, 0usize),
            MeshChannel::Normal => (1, 0),
            MeshChannel::Tangent => (2, 0),
            MeshChannel::Uv(i) => (3, i),
            MeshChannel::Color(i) => (4, i),
        };
        let mut tag = [0u8; 9];
        tag[0] = kind;
        tag[1..].copy_from_slice(&(index as u64).to_le_bytes());
        tag
    }
}

impl MeshDefinition {
    /// Point set without any further per-vertex data.
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        let aabb = Aabb::from_points(&positions);
        Self {
            positions,
            aabb,
            ..Default::default()
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_tangents(mut self, tangents: Vec<Vec3>) -> Self {
        self.tangents = tangents;
        self
    }

    pub fn with_uv_channel(mut self, uvs: Vec<Vec2>) -> Self {
        self.uv_channels.push(uvs);
        self
    }

    pub fn with_color_channel(mut self, colors: Vec<Vec4>) -> Self {
        self.color_channels.push(colors);
        self
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = indices;
        self
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Whether `channel` carries data for this mesh.
    pub fn has_channel(&self, channel: MeshChannel) -> bool {
        match channel {
            MeshChannel::Position => true,
            MeshChannel::Normal => !self.normals.is_empty(),
            MeshChannel::Tangent => !self.tangents.is_empty(),
            MeshChannel::Uv(i) => self.uv_channels.get(i).is_some_and(|c| !c.is_empty()),
            MeshChannel::Color(i) => self.color_channels.get(i).is_some_and(|c| !c.is_empty()),
        }
    }

    /// Checks the parallel-sequence invariant and index bounds.
    pub fn validate(&self) -> Result<(), RenderError> {
        let n = self.positions.len();
        let check = |what: String, len: usize| {
            if len != 0 && len != n {
                Err(RenderError::InvalidMesh(format!(
                    "{what} has {len} entries, expected {n}"
                )))
            } else {
                Ok(())
            }
        };

        check("normals".into(), self.normals.len())?;
        check("tangents".into(), self.tangents.len())?;
        for (i, uvs) in self.uv_channels.iter().enumerate() {
            check(format!("uv channel {i}"), uvs.len())?;
        }
        for (i, colors) in self.color_channels.iter().enumerate() {
            check(format!("color channel {i}"), colors.len())?;
        }

        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(RenderError::InvalidMesh(format!(
                "index {bad} out of range for {n} vertices"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> MeshDefinition {
        MeshDefinition::from_positions(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ])
    }

    #[test]
    fn from_positions_computes_aabb() {
        let mesh = tri();
        assert_eq!(mesh.aabb, Aabb::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn validate_accepts_parallel_sequences() {
        let mesh = tri()
            .with_normals(vec![Vec3::Y; 3])
            .with_color_channel(vec![Vec4::ONE; 3])
            .with_indices(vec![0, 1, 2]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_normals() {
        let mesh = tri().with_normals(vec![Vec3::Y; 2]);
        assert!(matches!(mesh.validate(), Err(RenderError::InvalidMesh(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_index() {
        let mesh = tri().with_indices(vec![0, 1, 3]);
        assert!(matches!(mesh.validate(), Err(RenderError::InvalidMesh(_))));
    }

    #[test]
    fn has_channel_reports_optional_streams() {
        let mesh = tri().with_uv_channel(vec![Vec2::ZERO; 3]);
        assert!(mesh.has_channel(MeshChannel::Position));
        assert!(mesh.has_channel(MeshChannel::Uv(0)));
        assert!(!mesh.has_channel(MeshChannel::Uv(1)));
        assert!(!mesh.has_channel(MeshChannel::Normal));
        assert!(!mesh.has_channel(MeshChannel::Color(0)));
    }

    #[test]
    fn channel_tags_keep_full_index() {
        assert_ne!(MeshChannel::Uv(256).tag(), MeshChannel::Uv(0).tag());
        assert_ne!(MeshChannel::Color(1).tag(), MeshChannel::Uv(1).tag());
        assert_eq!(MeshChannel::Color(300).tag()[1..3], [44, 1]);
    }
}
