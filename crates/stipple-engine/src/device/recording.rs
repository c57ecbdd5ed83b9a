//! CPU-side backend that records every call.
//!
//! No GPU work is performed. Programs keep their generated sources, buffers
//! keep their bytes, and every state change or draw is appended to a command
//! log, which makes this backend suitable for tests and headless tooling.

use std::collections::HashMap;

use super::backend::{
    BackendResult, BufferHandle, GraphicsBackend, ProgramHandle, ProgramSource, TextureHandle,
    UniformValue, VertexArrayDesc, VertexArrayHandle,
};
use super::BackendError;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    CreateVertexBuffer { buffer: BufferHandle, label: String, size: usize },
    CreateTexture { texture: TextureHandle, label: String, width: u32, height: u32 },
    CreateVertexArray { vertex_array: VertexArrayHandle, label: String },
    CompileProgram { program: ProgramHandle, label: String },
    UseProgram(ProgramHandle),
    SetUniform { name: String, value: UniformValue },
    BindTexture { name: String, texture: TextureHandle },
    Draw {
        program: Option<ProgramHandle>,
        vertex_array: VertexArrayHandle,
        vertex_count: u32,
        instance_count: u32,
    },
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u64,
    commands: Vec<RecordedCommand>,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    textures: HashMap<TextureHandle, (u32, u32)>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArrayDesc>,
    programs: HashMap<ProgramHandle, ProgramSource>,
    bound_program: Option<ProgramHandle>,
    rejection: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose driver rejects every program with `diagnostic`.
    pub fn rejecting_programs(diagnostic: impl Into<String>) -> Self {
        Self {
            rejection: Some(diagnostic.into()),
            ..Self::default()
        }
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn draw_calls(&self) -> impl Iterator<Item = &RecordedCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Draw { .. }))
    }

    pub fn draw_count(&self) -> usize {
        self.draw_calls().count()
    }

    /// Names passed to `set_uniform`, in call order.
    pub fn uniform_names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::SetUniform { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Last value uploaded to `name`.
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.commands.iter().rev().find_map(|c| match c {
            RecordedCommand::SetUniform { name: n, value } if n == name => Some(*value),
            _ => None,
        })
    }

    pub fn program_source(&self, program: ProgramHandle) -> Option<&ProgramSource> {
        self.programs.get(&program)
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn vertex_array(&self, vertex_array: VertexArrayHandle) -> Option<&VertexArrayDesc> {
        self.vertex_arrays.get(&vertex_array)
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&texture).copied()
    }
}

impl GraphicsBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "Recording"
    }

    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BackendResult<BufferHandle> {
        let buffer = BufferHandle(self.allocate());
        self.buffers.insert(buffer, contents.to_vec());
        self.commands.push(RecordedCommand::CreateVertexBuffer {
            buffer,
            label: label.to_owned(),
            size: contents.len(),
        });
        Ok(buffer)
    }

    fn create_texture_rgba8(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        texels: &[u8],
    ) -> BackendResult<TextureHandle> {
        let expected = width as usize * height as usize * 4;
        if texels.len() != expected {
            return Err(BackendError::ResourceCreation(format!(
                "texture `{label}` expects {expected} bytes, got {}",
                texels.len()
            )));
        }
        let texture = TextureHandle(self.allocate());
        self.textures.insert(texture, (width, height));
        self.commands.push(RecordedCommand::CreateTexture {
            texture,
            label: label.to_owned(),
            width,
            height,
        });
        Ok(texture)
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> BackendResult<VertexArrayHandle> {
        if let Some(missing) = desc.bindings.iter().find(|b| !self.buffers.contains_key(&b.buffer)) {
            return Err(BackendError::UnknownHandle {
                kind: "buffer",
                id: missing.buffer.0,
            });
        }
        let vertex_array = VertexArrayHandle(self.allocate());
        self.vertex_arrays.insert(vertex_array, desc.clone());
        self.commands.push(RecordedCommand::CreateVertexArray {
            vertex_array,
            label: desc.label.clone(),
        });
        Ok(vertex_array)
    }

    fn compile_program(&mut self, source: &ProgramSource) -> BackendResult<ProgramHandle> {
        if let Some(diagnostic) = &self.rejection {
            return Err(BackendError::ShaderCompilation {
                label: source.label.clone(),
                diagnostic: diagnostic.clone(),
            });
        }
        let program = ProgramHandle(self.allocate());
        self.programs.insert(program, source.clone());
        self.commands.push(RecordedCommand::CompileProgram {
            program,
            label: source.label.clone(),
        });
        Ok(program)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.bound_program = Some(program);
        self.commands.push(RecordedCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let declared = self
            .bound_program
            .and_then(|p| self.programs.get(&p))
            .is_some_and(|p| p.uniforms.field(name).is_some());
        if !declared {
            log::trace!("RecordingBackend: uniform `{name}` not declared by bound program");
        }
        self.commands.push(RecordedCommand::SetUniform {
            name: name.to_owned(),
            value,
        });
    }

    fn bind_texture(&mut self, name: &str, texture: TextureHandle) {
        self.commands.push(RecordedCommand::BindTexture {
            name: name.to_owned(),
            texture,
        });
    }

    fn draw_instanced(
        &mut self,
        vertex_array: VertexArrayHandle,
        vertex_count: u32,
        instance_count: u32,
    ) {
        log::trace!(
            "RecordingBackend: draw {vertex_count} vertices x {instance_count} instances"
        );
        self.commands.push(RecordedCommand::Draw {
            program: self.bound_program,
            vertex_array,
            vertex_count,
            instance_count,
        });
    }
}
