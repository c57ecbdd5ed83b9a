use glam::UVec2;

/// Attachment formats a frame is rendered into.
///
/// Programs map their first fragment output to `color`, the second to
/// `normal`; programs without outputs only touch `depth`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TargetFormats {
    pub color: wgpu::TextureFormat,
    pub normal: Option<wgpu::TextureFormat>,
    pub depth: Option<wgpu::TextureFormat>,
    /// `Greater` when rendering with reverse Z.
    pub depth_compare: wgpu::CompareFunction,
}

impl Default for TargetFormats {
    fn default() -> Self {
        Self {
            color: wgpu::TextureFormat::Rgba8UnormSrgb,
            normal: Some(wgpu::TextureFormat::Rgba16Float),
            depth: Some(wgpu::TextureFormat::Depth32Float),
            depth_compare: wgpu::CompareFunction::Less,
        }
    }
}

impl TargetFormats {
    pub fn reverse_z(mut self) -> Self {
        self.depth_compare = wgpu::CompareFunction::Greater;
        self
    }

    /// Format of fragment output `location`, if it has a target.
    pub fn output_format(&self, location: usize) -> Option<wgpu::TextureFormat> {
        match location {
            0 => Some(self.color),
            1 => self.normal,
            _ => None,
        }
    }
}

/// Views a batch of draws is encoded against.
#[derive(Debug, Copy, Clone)]
pub struct FrameTargets<'a> {
    pub formats: TargetFormats,
    pub color: &'a wgpu::TextureView,
    pub normal: Option<&'a wgpu::TextureView>,
    pub depth: Option<&'a wgpu::TextureView>,
}

impl<'a> FrameTargets<'a> {
    /// View bound to fragment output `location`.
    pub fn output_view(&self, location: usize) -> Option<&'a wgpu::TextureView> {
        match location {
            0 => Some(self.color),
            1 => self.normal,
            _ => None,
        }
    }
}

/// Owned color/normal/depth textures for headless rendering.
pub struct OffscreenTargets {
    formats: TargetFormats,
    size: UVec2,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    normal: Option<(wgpu::Texture, wgpu::TextureView)>,
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
}

fn attachment(
    device: &wgpu::Device,
    label: &str,
    size: UVec2,
    format: wgpu::TextureFormat,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.x.max(1),
            height: size.y.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

impl OffscreenTargets {
    pub fn new(device: &wgpu::Device, size: UVec2, formats: TargetFormats) -> Self {
        let (color, color_view) = attachment(device, "stipple color target", size, formats.color);
        let normal = formats
            .normal
            .map(|f| attachment(device, "stipple normal target", size, f));
        let depth = formats
            .depth
            .map(|f| attachment(device, "stipple depth target", size, f));
        log::debug!("offscreen targets {}x{} ({:?})", size.x, size.y, formats);
        Self {
            formats,
            size,
            color,
            color_view,
            normal,
            depth,
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn formats(&self) -> TargetFormats {
        self.formats
    }

    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.color
    }

    pub fn depth_texture(&self) -> Option<&wgpu::Texture> {
        self.depth.as_ref().map(|(t, _)| t)
    }

    /// Clears all attachments (depth to the far plane of `formats.depth_compare`).
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder, color: wgpu::Color) {
        let far = if self.formats.depth_compare == wgpu::CompareFunction::Greater {
            0.0
        } else {
            1.0
        };

        let mut color_attachments = vec![Some(wgpu::RenderPassColorAttachment {
            view: &self.color_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(color),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })];
        if let Some((_, view)) = &self.normal {
            color_attachments.push(Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            }));
        }

        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("stipple clear pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: self.depth.as_ref().map(|(_, view)| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(far),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    pub fn frame_targets(&self) -> FrameTargets<'_> {
        FrameTargets {
            formats: self.formats,
            color: &self.color_view,
            normal: self.normal.as_ref().map(|(_, v)| v),
            depth: self.depth.as_ref().map(|(_, v)| v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_map_to_color_then_normal() {
        let f = TargetFormats::default();
        assert_eq!(f.output_format(0), Some(f.color));
        assert_eq!(f.output_format(1), f.normal);
        assert_eq!(f.output_format(2), None);
    }

    #[test]
    fn reverse_z_flips_compare() {
        let f = TargetFormats::default().reverse_z();
        assert_eq!(f.depth_compare, wgpu::CompareFunction::Greater);
    }
}
