use super::{Declaration, ShaderType};

/// Position of one uniform inside the packed uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub ty: ShaderType,
    pub offset: usize,
}

/// Byte layout of the uniform struct generated for a program.
///
/// Offsets follow the WGSL uniform address-space rules so a CPU-side byte
/// buffer filled through [`UniformLayout::write`] matches the shader's view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: usize,
}

#[inline]
fn align_to(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}

impl UniformLayout {
    pub fn new(declarations: &[Declaration]) -> Self {
        let mut offset = 0;
        let mut fields = Vec::with_capacity(declarations.len());

        for decl in declarations {
            let (align, size) = decl.ty.uniform_layout();
            offset = align_to(offset, align);
            fields.push(UniformField {
                name: decl.name.clone(),
                ty: decl.ty,
                offset,
            });
            offset += size;
        }

        // Struct alignment in the uniform address space is at least 16.
        let size = if fields.is_empty() { 0 } else { align_to(offset, 16) };
        Self { fields, size }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Copies `bytes` into `buffer` at the offset of `name`.
    ///
    /// Returns `false` if the program has no such uniform or the byte count
    /// does not fit the declared type.
    pub fn write(&self, buffer: &mut [u8], name: &str, bytes: &[u8]) -> bool {
        let Some(field) = self.field(name) else { return false };
        let (_, size) = field.ty.uniform_layout();
        if bytes.len() != size || field.offset + size > buffer.len() {
            return false;
        }
        buffer[field.offset..field.offset + size].copy_from_slice(bytes);
        true
    }
}
