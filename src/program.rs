//! # Program Module
//!
//! Turns up to two WGSL stage sources into a [`LinkedProgram`]: a checked pair of shader
//! stages plus the resolved [`UniformBinding`] for the six well-known uniforms.
//!
//! ## Compile and link
//!
//! Compilation is done entirely on the CPU with `naga`, the same shader front end `wgpu`
//! uses internally. Each present stage is parsed and validated on its own; a failure is
//! reported as [`ProgramError::Compile`] tagged with the stage.
//!
//! Linking then checks the two stages against each other and against what the renderer
//! provides:
//!
//! - the vertex stage has a `@vertex fn vertex_main`, the fragment stage a
//!   `@fragment fn fragment_main`
//! - the vertex stage only reads `@location(0)`, the quad corner
//! - every fragment input location is written by the vertex stage with the same type
//! - the only resource is the uniform struct at `@group(0) @binding(0)`
//! - recognised uniform members have their expected type, and sit at the same offset in
//!   both stages
//!
//! Any violation is a [`ProgramError::Link`]. The GPU side of linking, building the
//! actual render pipeline, is left to a [`ProgramBackend`], which may report its own
//! link errors.
//!
//! ## Missing stages
//!
//! A program without a vertex stage gets [`PASSTHROUGH_VERTEX_SHADER`], which places the
//! quad straight into clip space. A program without a fragment stage is built with no
//! fragment stage at all. A program with neither is rejected.

use std::collections::BTreeMap;

use naga::{Binding, Handle, Module, ResourceBinding, Scalar, Type, TypeInner, VectorSize};

use crate::uniform_binding::{UniformBinding, UniformKind, UniformName};

/// Entry point every vertex stage must export.
pub const VERTEX_ENTRY_POINT: &str = "vertex_main";

/// Entry point every fragment stage must export.
pub const FRAGMENT_ENTRY_POINT: &str = "fragment_main";

/// Vertex stage used when a program supplies only a fragment stage.
pub const PASSTHROUGH_VERTEX_SHADER: &str = r#"
@vertex
fn vertex_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 0.0, 1.0);
}
"#;

const UNIFORM_GROUP: u32 = 0;
const UNIFORM_BINDING: u32 = 0;
const QUAD_POSITION_LOCATION: u32 = 0;

/// One of the two programmable stages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => VERTEX_ENTRY_POINT,
            ShaderStage::Fragment => FRAGMENT_ENTRY_POINT,
        }
    }

    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors from building a program.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgramError {
    #[error("failed to compile {stage} stage:\n{diagnostic}")]
    Compile {
        stage: ShaderStage,
        diagnostic: String,
    },
    #[error("failed to link program: {diagnostic}")]
    Link { diagnostic: String },
}

impl ProgramError {
    fn link(diagnostic: impl Into<String>) -> Self {
        ProgramError::Link {
            diagnostic: diagnostic.into(),
        }
    }
}

/// Uploads linked programs to a device and releases them again.
///
/// The renderer implements this over `wgpu`; tests implement it with plain counters.
/// `destroy_program` takes the program by value, so a program can only be released
/// once.
pub trait ProgramBackend {
    type Program;

    fn create_program(&mut self, linked: &LinkedProgram) -> Result<Self::Program, ProgramError>;

    fn destroy_program(&mut self, program: Self::Program);
}

/// A single stage that parsed and validated.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    stage: ShaderStage,
    source: String,
    module: Module,
}

impl CompiledStage {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// The WGSL text the stage was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entry_point(&self) -> &'static str {
        self.stage.entry_point()
    }
}

/// A program whose stages compiled and agree with each other.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    vertex: CompiledStage,
    fragment: Option<CompiledStage>,
    binding: UniformBinding,
    block_size: u64,
}

impl LinkedProgram {
    pub fn vertex(&self) -> &CompiledStage {
        &self.vertex
    }

    pub fn fragment(&self) -> Option<&CompiledStage> {
        self.fragment.as_ref()
    }

    /// Locations of the well-known uniforms.
    pub fn binding(&self) -> &UniformBinding {
        &self.binding
    }

    /// Bytes spanned by the uniform struct, zero when the program declares none.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}

/// Parses and validates a single stage.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, ProgramError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| ProgramError::Compile {
        stage,
        diagnostic: err.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator
        .validate(&module)
        .map_err(|err| ProgramError::Compile {
            stage,
            diagnostic: err.emit_to_string(source),
        })?;

    Ok(CompiledStage {
        stage,
        source: source.to_owned(),
        module,
    })
}

/// Compiles both stages and links them into a program.
///
/// `None` marks an absent stage.
pub fn compile_program(
    vertex: Option<&str>,
    fragment: Option<&str>,
) -> Result<LinkedProgram, ProgramError> {
    if vertex.is_none() && fragment.is_none() {
        return Err(ProgramError::link("program has neither a vertex nor a fragment stage"));
    }

    let vertex = compile_stage(
        ShaderStage::Vertex,
        vertex.unwrap_or(PASSTHROUGH_VERTEX_SHADER),
    )?;
    let fragment = fragment
        .map(|source| compile_stage(ShaderStage::Fragment, source))
        .transpose()?;

    link_program(vertex, fragment)
}

/// Checks two compiled stages against each other and resolves the uniform binding.
pub fn link_program(
    vertex: CompiledStage,
    fragment: Option<CompiledStage>,
) -> Result<LinkedProgram, ProgramError> {
    let vertex_fn = entry_function(&vertex)?;
    check_vertex_inputs(&vertex.module, vertex_fn)?;

    let mut block = uniform_block(&vertex)?;

    if let Some(fragment) = &fragment {
        let fragment_fn = entry_function(fragment)?;
        check_interface(&vertex.module, vertex_fn, &fragment.module, fragment_fn)?;

        let fragment_block = uniform_block(fragment)?;
        block = merge_blocks(block, fragment_block)?;
    }

    let mut binding = UniformBinding::unbound();
    for (name, offset) in &block.members {
        binding.bind(*name, *offset);
    }

    Ok(LinkedProgram {
        vertex,
        fragment,
        binding,
        block_size: block.span,
    })
}

fn entry_function(stage: &CompiledStage) -> Result<&naga::Function, ProgramError> {
    let name = stage.entry_point();
    let entry = stage
        .module
        .entry_points
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| {
            ProgramError::link(format!("{} stage has no entry point `{name}`", stage.stage))
        })?;

    if entry.stage != stage.stage.naga_stage() {
        return Err(ProgramError::link(format!(
            "entry point `{name}` must be a @{} function",
            stage.stage
        )));
    }
    Ok(&entry.function)
}

/// Collects the user-defined locations reachable from one argument or result,
/// descending into IO structs.
fn collect_locations(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut BTreeMap<u32, TypeInner>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.insert(*location, module.types[ty].inner.clone());
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn function_inputs(module: &Module, function: &naga::Function) -> BTreeMap<u32, TypeInner> {
    let mut inputs = BTreeMap::new();
    for argument in &function.arguments {
        collect_locations(module, argument.ty, argument.binding.as_ref(), &mut inputs);
    }
    inputs
}

fn function_outputs(module: &Module, function: &naga::Function) -> BTreeMap<u32, TypeInner> {
    let mut outputs = BTreeMap::new();
    if let Some(result) = &function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut outputs);
    }
    outputs
}

fn is_float_attribute(inner: &TypeInner) -> bool {
    match inner {
        TypeInner::Scalar(scalar) | TypeInner::Vector { scalar, .. } => *scalar == Scalar::F32,
        _ => false,
    }
}

fn check_vertex_inputs(module: &Module, function: &naga::Function) -> Result<(), ProgramError> {
    for (location, inner) in function_inputs(module, function) {
        if location != QUAD_POSITION_LOCATION {
            return Err(ProgramError::link(format!(
                "vertex input @location({location}) is not provided by the full-screen quad"
            )));
        }
        if !is_float_attribute(&inner) {
            return Err(ProgramError::link(format!(
                "vertex input @location({location}) must be a float vector, found {inner:?}"
            )));
        }
    }
    Ok(())
}

fn check_interface(
    vertex_module: &Module,
    vertex_fn: &naga::Function,
    fragment_module: &Module,
    fragment_fn: &naga::Function,
) -> Result<(), ProgramError> {
    let outputs = function_outputs(vertex_module, vertex_fn);
    for (location, input) in function_inputs(fragment_module, fragment_fn) {
        match outputs.get(&location) {
            None => {
                return Err(ProgramError::link(format!(
                    "fragment input @location({location}) is not written by the vertex stage"
                )))
            }
            Some(output) if *output != input => {
                return Err(ProgramError::link(format!(
                    "@location({location}) is {output:?} in the vertex stage \
                     but {input:?} in the fragment stage"
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// The recognised members of one stage's uniform struct.
#[derive(Debug, Default)]
struct UniformBlockLayout {
    members: BTreeMap<UniformName, u32>,
    span: u64,
}

fn expected_inner(kind: UniformKind) -> TypeInner {
    match kind {
        UniformKind::Mat4 => TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar: Scalar::F32,
        },
        UniformKind::F32 => TypeInner::Scalar(Scalar::F32),
    }
}

fn uniform_block(stage: &CompiledStage) -> Result<UniformBlockLayout, ProgramError> {
    let module = &stage.module;
    let mut layout = UniformBlockLayout::default();

    for (_, global) in module.global_variables.iter() {
        let Some(ResourceBinding { group, binding }) = global.binding.clone() else {
            continue;
        };
        let label = global.name.as_deref().unwrap_or("<unnamed>");

        if (group, binding) != (UNIFORM_GROUP, UNIFORM_BINDING)
            || global.space != naga::AddressSpace::Uniform
        {
            return Err(ProgramError::link(format!(
                "{} stage declares unsupported resource `{label}` at \
                 @group({group}) @binding({binding})",
                stage.stage
            )));
        }

        let TypeInner::Struct { members, span } = &module.types[global.ty].inner else {
            return Err(ProgramError::link(format!(
                "uniform `{label}` at @group(0) @binding(0) must be a struct"
            )));
        };

        layout.span = u64::from(*span);
        for member in members {
            let Some(name) = member.name.as_deref().and_then(UniformName::from_member) else {
                continue;
            };
            let found = &module.types[member.ty].inner;
            if *found != expected_inner(name.kind()) {
                return Err(ProgramError::link(format!(
                    "uniform `{name}` must be {}, found {found:?}",
                    name.kind().wgsl()
                )));
            }
            layout.members.insert(name, member.offset);
        }
    }

    Ok(layout)
}

fn merge_blocks(
    vertex: UniformBlockLayout,
    fragment: UniformBlockLayout,
) -> Result<UniformBlockLayout, ProgramError> {
    let mut merged = vertex;
    for (name, offset) in fragment.members {
        match merged.members.get(&name) {
            Some(existing) if *existing != offset => {
                return Err(ProgramError::link(format!(
                    "uniform `{name}` is at offset {existing} in the vertex stage \
                     but at offset {offset} in the fragment stage"
                )))
            }
            _ => {
                merged.members.insert(name, offset);
            }
        }
    }
    merged.span = merged.span.max(fragment.span);
    Ok(merged)
}
