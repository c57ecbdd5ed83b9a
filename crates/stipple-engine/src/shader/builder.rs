use std::fmt::Write as _;

use crate::device::{BackendError, GraphicsBackend, ProgramHandle, ProgramSource};
use crate::error::RenderError;

use super::{ShaderType, UniformLayout};

/// Entry point names of the generated stages.
pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// A typed, named shader declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Declaration {
    pub ty: ShaderType,
    pub name: String,
}

/// Assembled WGSL text of both stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

/// Accumulates declarations and code fragments for one program.
///
/// Declarations are deduplicated by name: re-adding an existing name is a
/// no-op, which lets mutually exclusive code paths each declare the
/// passthrough they write. Code fragments are kept verbatim and in call order,
/// since later fragments may use symbols introduced by earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ShaderBuilder {
    label: String,

    uniforms: Vec<Declaration>,
    vertex_inputs: Vec<Declaration>,
    passthroughs: Vec<Declaration>,
    fragment_outputs: Vec<Declaration>,
    textures: Vec<String>,
    writes_depth: bool,

    vertex_decls: Vec<String>,
    vertex_code: Vec<String>,
    fragment_decls: Vec<String>,
    fragment_code: Vec<String>,
}

fn push_unique(list: &mut Vec<Declaration>, kind: &str, ty: ShaderType, name: &str) {
    if let Some(existing) = list.iter().find(|d| d.name == name) {
        if existing.ty != ty {
            log::warn!(
                "{kind} `{name}` redeclared as {:?} (keeping {:?})",
                ty,
                existing.ty
            );
        }
        return;
    }
    list.push(Declaration {
        ty,
        name: name.to_owned(),
    });
}

/// Appends `code` with its common leading whitespace replaced by `indent`.
fn push_block(out: &mut String, code: &str, indent: &str) {
    let lines: Vec<&str> = code.lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.trim().is_empty()).map_or(start, |i| i + 1);
    let lines = &lines[start..end];

    let margin = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    for line in lines {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            out.push_str(indent);
            out.push_str(line[margin..].trim_end());
            out.push('\n');
        }
    }
}

impl ShaderBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn add_uniform(&mut self, ty: ShaderType, name: &str) -> &mut Self {
        push_unique(&mut self.uniforms, "uniform", ty, name);
        self
    }

    pub fn add_vertex_input(&mut self, ty: ShaderType, name: &str) -> &mut Self {
        push_unique(&mut self.vertex_inputs, "vertex input", ty, name);
        self
    }

    pub fn add_passthrough(&mut self, ty: ShaderType, name: &str) -> &mut Self {
        push_unique(&mut self.passthroughs, "passthrough", ty, name);
        self
    }

    pub fn add_fragment_output(&mut self, ty: ShaderType, name: &str) -> &mut Self {
        push_unique(&mut self.fragment_outputs, "fragment output", ty, name);
        self
    }

    /// Declares a sampled 2D texture usable as `name` with sampler `name_sampler`.
    pub fn add_texture(&mut self, name: &str) -> &mut Self {
        if !self.textures.iter().any(|t| t == name) {
            self.textures.push(name.to_owned());
        }
        self
    }

    /// Adds `fOut.fDepth`, written through `@builtin(frag_depth)`.
    pub fn enable_depth_write(&mut self) -> &mut Self {
        self.writes_depth = true;
        self
    }

    pub fn add_vertex_decl(&mut self, code: impl Into<String>) -> &mut Self {
        let code = code.into();
        if !self.vertex_decls.contains(&code) {
            self.vertex_decls.push(code);
        }
        self
    }

    pub fn add_vertex_code(&mut self, code: impl Into<String>) -> &mut Self {
        self.vertex_code.push(code.into());
        self
    }

    pub fn add_fragment_decl(&mut self, code: impl Into<String>) -> &mut Self {
        let code = code.into();
        if !self.fragment_decls.contains(&code) {
            self.fragment_decls.push(code);
        }
        self
    }

    pub fn add_fragment_code(&mut self, code: impl Into<String>) -> &mut Self {
        self.fragment_code.push(code.into());
        self
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.iter().any(|d| d.name == name)
    }

    pub fn has_passthrough(&self, name: &str) -> bool {
        self.passthroughs.iter().any(|d| d.name == name)
    }

    pub fn uniforms(&self) -> &[Declaration] {
        &self.uniforms
    }

    pub fn vertex_inputs(&self) -> &[Declaration] {
        &self.vertex_inputs
    }

    pub fn passthroughs(&self) -> &[Declaration] {
        &self.passthroughs
    }

    // ── assembly ───────────────────────────────────────────────────────────

    fn emit_uniforms(&self, out: &mut String) {
        if self.uniforms.is_empty() {
            return;
        }
        out.push_str("struct Uniforms {\n");
        for d in &self.uniforms {
            let _ = writeln!(out, "    {}: {},", d.name, d.ty.wgsl());
        }
        out.push_str("}\n\n@group(0) @binding(0) var<uniform> u: Uniforms;\n\n");
    }

    fn emit_passthrough_struct(&self, out: &mut String) {
        out.push_str("struct VertexOutput {\n    @builtin(position) position: vec4<f32>,\n");
        for (location, d) in self.passthroughs.iter().enumerate() {
            let flat = if d.ty.is_integer() { " @interpolate(flat)" } else { "" };
            let _ = writeln!(out, "    @location({location}){flat} {}: {},", d.name, d.ty.wgsl());
        }
        out.push_str("}\n\n");
    }

    fn has_fragment_outputs(&self) -> bool {
        !self.fragment_outputs.is_empty() || self.writes_depth
    }

    fn assemble_vertex(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// {} (vertex stage)\n", self.label);

        self.emit_uniforms(&mut out);

        out.push_str("struct VertexInput {\n");
        out.push_str("    @builtin(vertex_index) vertex_index: u32,\n");
        out.push_str("    @builtin(instance_index) instance_index: u32,\n");
        for (location, d) in self.vertex_inputs.iter().enumerate() {
            let _ = writeln!(out, "    @location({location}) {}: {},", d.name, d.ty.wgsl());
        }
        out.push_str("}\n\n");

        self.emit_passthrough_struct(&mut out);

        for decl in &self.vertex_decls {
            push_block(&mut out, decl, "");
            out.push('\n');
        }

        let _ = writeln!(out, "@vertex\nfn {VERTEX_ENTRY}(vIn: VertexInput) -> VertexOutput {{");
        out.push_str("    var vOut: VertexOutput;\n");
        out.push_str("    let vertexIndex = vIn.vertex_index;\n");
        out.push_str("    let instanceIndex = vIn.instance_index;\n");
        for d in &self.vertex_inputs {
            let _ = writeln!(out, "    let {0} = vIn.{0};", d.name);
        }
        for code in &self.vertex_code {
            push_block(&mut out, code, "    ");
        }
        out.push_str("    return vOut;\n}\n");
        out
    }

    fn assemble_fragment(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// {} (fragment stage)\n", self.label);

        self.emit_uniforms(&mut out);

        for (i, name) in self.textures.iter().enumerate() {
            let binding = 1 + 2 * i;
            let _ = writeln!(out, "@group(0) @binding({binding}) var {name}: texture_2d<f32>;");
            let _ = writeln!(out, "@group(0) @binding({}) var {name}_sampler: sampler;", binding + 1);
        }
        if !self.textures.is_empty() {
            out.push('\n');
        }

        self.emit_passthrough_struct(&mut out);

        if self.has_fragment_outputs() {
            out.push_str("struct FragmentOutput {\n");
            for (location, d) in self.fragment_outputs.iter().enumerate() {
                let _ = writeln!(out, "    @location({location}) {}: {},", d.name, d.ty.wgsl());
            }
            if self.writes_depth {
                out.push_str("    @builtin(frag_depth) fDepth: f32,\n");
            }
            out.push_str("}\n\n");
        }

        for decl in &self.fragment_decls {
            push_block(&mut out, decl, "");
            out.push('\n');
        }

        if self.has_fragment_outputs() {
            let _ = writeln!(out, "@fragment\nfn {FRAGMENT_ENTRY}(vIn: VertexOutput) -> FragmentOutput {{");
            out.push_str("    var fOut: FragmentOutput;\n");
            for code in &self.fragment_code {
                push_block(&mut out, code, "    ");
            }
            out.push_str("    return fOut;\n}\n");
        } else {
            let _ = writeln!(out, "@fragment\nfn {FRAGMENT_ENTRY}(vIn: VertexOutput) {{");
            for code in &self.fragment_code {
                push_block(&mut out, code, "    ");
            }
            out.push_str("}\n");
        }
        out
    }

    /// Assembles both stage texts without touching the driver.
    pub fn assemble(&self) -> ShaderSources {
        ShaderSources {
            vertex: self.assemble_vertex(),
            fragment: self.assemble_fragment(),
        }
    }

    pub fn program_source(&self) -> ProgramSource {
        let ShaderSources { vertex, fragment } = self.assemble();
        ProgramSource {
            label: self.label.clone(),
            vertex,
            fragment,
            uniforms: UniformLayout::new(&self.uniforms),
            vertex_inputs: self.vertex_inputs.clone(),
            fragment_outputs: self.fragment_outputs.clone(),
            textures: self.textures.clone(),
            writes_depth: self.writes_depth,
        }
    }

    /// Assembles and compiles the program. Consumes the builder.
    pub fn build(self, backend: &mut dyn GraphicsBackend) -> Result<CompiledProgram, RenderError> {
        let source = self.program_source();
        let handle = backend.compile_program(&source).map_err(|err| match err {
            BackendError::ShaderCompilation { label, diagnostic } => {
                RenderError::ShaderCompile { program: label, diagnostic }
            }
            other => RenderError::Backend(other),
        })?;

        log::debug!(
            "compiled `{}` on {} ({} uniforms, {} inputs, {} passthroughs)",
            source.label,
            backend.name(),
            source.uniforms.fields().len(),
            source.vertex_inputs.len(),
            self.passthroughs.len()
        );

        Ok(CompiledProgram { handle, source })
    }
}

/// A program accepted by the driver, with the source it was built from.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    handle: ProgramHandle,
    source: ProgramSource,
}

impl CompiledProgram {
    #[inline]
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn source(&self) -> &ProgramSource {
        &self.source
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.source.uniforms.field(name).is_some()
    }
}
