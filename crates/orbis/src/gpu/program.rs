//! Shader programs.
//!
//! A [`GpuProgram`] is built from a WGSL vertex module and a WGSL fragment
//! module. Building runs three steps:
//!
//! 1. **Compile**: each stage is parsed and validated by naga.
//! 2. **Link**: the fragment inputs must be produced by the vertex stage at
//!    the same location with the same type, the vertex stage must write a
//!    clip-space position, and uniform blocks declared by both stages at the
//!    same binding must agree member for member.
//! 3. **Reflect**: vertex attribute locations and uniform slots are resolved
//!    by name and frozen for the lifetime of the program.
//!
//! A program keeps its validated sources, which a backend compiles into a
//! pipeline when it first replays a draw made with the program.

use std::collections::HashMap;
use std::sync::Arc;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{
    AddressSpace, Binding, BuiltIn, Handle, Module, ResourceBinding, ScalarKind, ShaderStage,
    Type, TypeInner, VectorSize,
};

use crate::error::{Error, Result};

/// Static key identifying a program in the resource cache.
pub type ProgramKey = &'static str;

/// Data type of a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Vec4,
    Mat4,
    /// Texture unit selector for a sampled texture.
    Sampler,
}

/// A resolved uniform location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub location: u32,
    pub kind: UniformKind,
}

/// A typed view of a program shared through the resource cache.
pub trait Program: Sized {
    /// Key of the shared instance in the resource cache.
    const KEY: ProgramKey;

    /// WGSL source of the vertex stage.
    const VERTEX_SOURCE: &'static str;

    /// WGSL source of the fragment stage.
    const FRAGMENT_SOURCE: &'static str;

    /// Compile and link a new instance.
    fn create() -> Result<GpuProgram> {
        GpuProgram::new(Self::KEY, Self::VERTEX_SOURCE, Self::FRAGMENT_SOURCE)
    }

    /// Wrap a linked instance, resolving the slots this type uses.
    fn from_linked(program: Arc<GpuProgram>) -> Result<Self>;
}

/// A compiled and linked program with reflected slot locations.
#[derive(Debug)]
pub struct GpuProgram {
    key: ProgramKey,
    attributes: HashMap<String, u32>,
    uniforms: HashMap<String, UniformSlot>,
    vertex_source: Arc<str>,
    fragment_source: Arc<str>,
}

impl GpuProgram {
    /// Compile and link a program from WGSL sources.
    ///
    /// The vertex source must contain a `@vertex` entry point and the
    /// fragment source a `@fragment` entry point.
    pub fn new(key: ProgramKey, vertex_source: &str, fragment_source: &str) -> Result<Self> {
        let vertex = compile_stage(key, "vertex", vertex_source, ShaderStage::Vertex)?;
        let fragment = compile_stage(key, "fragment", fragment_source, ShaderStage::Fragment)?;
        let interface = link(key, &vertex, &fragment)?;

        tracing::debug!(
            key,
            attributes = interface.attributes.len(),
            uniforms = interface.uniforms.len(),
            "linked program"
        );

        Ok(Self {
            key,
            attributes: interface.attributes,
            uniforms: interface.uniforms,
            vertex_source: Arc::from(vertex_source),
            fragment_source: Arc::from(fragment_source),
        })
    }

    #[must_use]
    pub fn key(&self) -> ProgramKey {
        self.key
    }

    /// Location of a named vertex attribute.
    #[must_use]
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    /// Slot of a named uniform.
    #[must_use]
    pub fn uniform_slot(&self, name: &str) -> Option<UniformSlot> {
        self.uniforms.get(name).copied()
    }

    /// Number of uniform slots.
    #[must_use]
    pub fn uniform_count(&self) -> usize {
        self.uniforms.len()
    }

    /// Validated WGSL of the vertex stage.
    #[must_use]
    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    /// Validated WGSL of the fragment stage.
    #[must_use]
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    /// Approximate memory held by the program, for cache accounting.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.vertex_source.len() + self.fragment_source.len()
    }
}

fn compile_stage(
    key: ProgramKey,
    stage: &'static str,
    source: &str,
    expected: ShaderStage,
) -> Result<Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| Error::ProgramCompile {
        key,
        stage,
        message: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| Error::ProgramCompile {
            key,
            stage,
            message: e.as_inner().to_string(),
        })?;

    if !module.entry_points.iter().any(|ep| ep.stage == expected) {
        return Err(Error::ProgramCompile {
            key,
            stage,
            message: format!("no @{stage} entry point"),
        });
    }

    Ok(module)
}

/// Reflected interface of a linked program.
struct Interface {
    attributes: HashMap<String, u32>,
    uniforms: HashMap<String, UniformSlot>,
}

/// A binding on an entry point argument, result or struct member.
struct InterfaceVar<'a> {
    name: Option<&'a str>,
    binding: &'a Binding,
    inner: &'a TypeInner,
}

/// Uniform block layout used to check that both stages agree.
type BlockLayout = Vec<(Option<String>, u32, TypeInner)>;

fn link(key: ProgramKey, vertex: &Module, fragment: &Module) -> Result<Interface> {
    let link_error = |message: String| Error::ProgramLink { key, message };

    let vs = vertex
        .entry_points
        .iter()
        .find(|ep| ep.stage == ShaderStage::Vertex)
        .ok_or_else(|| link_error("vertex module has no vertex entry point".into()))?;
    let fs = fragment
        .entry_points
        .iter()
        .find(|ep| ep.stage == ShaderStage::Fragment)
        .ok_or_else(|| link_error("fragment module has no fragment entry point".into()))?;

    // Vertex attributes.
    let mut inputs = Vec::new();
    for arg in &vs.function.arguments {
        flatten_bindings(vertex, arg.ty, arg.binding.as_ref(), arg.name.as_deref(), &mut inputs);
    }
    let mut attributes = HashMap::new();
    for var in &inputs {
        if let Binding::Location { location, .. } = var.binding {
            let name = var
                .name
                .ok_or_else(|| link_error(format!("unnamed vertex attribute at location {location}")))?;
            attributes.insert(name.to_string(), *location);
        }
    }

    // Vertex outputs must cover the fragment inputs.
    let mut outputs = Vec::new();
    if let Some(result) = &vs.function.result {
        flatten_bindings(vertex, result.ty, result.binding.as_ref(), None, &mut outputs);
    }
    let writes_position = outputs
        .iter()
        .any(|v| matches!(v.binding, Binding::BuiltIn(BuiltIn::Position { .. })));
    if !writes_position {
        return Err(link_error(
            "vertex stage does not write @builtin(position)".into(),
        ));
    }

    let mut fragment_inputs = Vec::new();
    for arg in &fs.function.arguments {
        flatten_bindings(
            fragment,
            arg.ty,
            arg.binding.as_ref(),
            arg.name.as_deref(),
            &mut fragment_inputs,
        );
    }
    for input in &fragment_inputs {
        let Binding::Location { location, .. } = input.binding else {
            continue;
        };
        let produced = outputs.iter().find(
            |o| matches!(o.binding, Binding::Location { location: l, .. } if l == location),
        );
        match produced {
            None => {
                return Err(link_error(format!(
                    "fragment input {} at location {location} is not written by the vertex stage",
                    input.name.unwrap_or("<unnamed>")
                )));
            }
            Some(output) if output.inner != input.inner => {
                return Err(link_error(format!(
                    "location {location} is {:?} in the vertex stage but {:?} in the fragment stage",
                    output.inner, input.inner
                )));
            }
            Some(_) => {}
        }
    }

    // Uniforms: vertex stage first, then anything only the fragment stage
    // declares.
    let mut uniforms = HashMap::new();
    let mut blocks: HashMap<(u32, u32), BlockLayout> = HashMap::new();
    for module in [vertex, fragment] {
        reflect_uniforms(module, &mut uniforms, &mut blocks).map_err(link_error)?;
    }

    Ok(Interface {
        attributes,
        uniforms,
    })
}

fn flatten_bindings<'a>(
    module: &'a Module,
    ty: Handle<Type>,
    binding: Option<&'a Binding>,
    name: Option<&'a str>,
    out: &mut Vec<InterfaceVar<'a>>,
) {
    let inner = &module.types[ty].inner;
    if let Some(binding) = binding {
        out.push(InterfaceVar {
            name,
            binding,
            inner,
        });
        return;
    }
    if let TypeInner::Struct { members, .. } = inner {
        for member in members {
            if let Some(binding) = &member.binding {
                out.push(InterfaceVar {
                    name: member.name.as_deref(),
                    binding,
                    inner: &module.types[member.ty].inner,
                });
            }
        }
    }
}

fn reflect_uniforms(
    module: &Module,
    uniforms: &mut HashMap<String, UniformSlot>,
    blocks: &mut HashMap<(u32, u32), BlockLayout>,
) -> std::result::Result<(), String> {
    for (_, var) in module.global_variables.iter() {
        let inner = &module.types[var.ty].inner;
        match var.space {
            AddressSpace::Uniform => {
                if let TypeInner::Struct { members, .. } = inner {
                    let layout: BlockLayout = members
                        .iter()
                        .map(|m| (m.name.clone(), m.offset, module.types[m.ty].inner.clone()))
                        .collect();
                    if let Some(ResourceBinding { group, binding }) = &var.binding {
                        let (group, binding) = (*group, *binding);
                        match blocks.get(&(group, binding)) {
                            Some(existing) if *existing != layout => {
                                return Err(format!(
                                    "uniform block at group {group} binding {binding} differs between stages"
                                ));
                            }
                            Some(_) => {}
                            None => {
                                blocks.insert((group, binding), layout);
                            }
                        }
                    }
                    for member in members {
                        let name = member.name.clone().unwrap_or_default();
                        let kind = uniform_kind(&module.types[member.ty].inner)
                            .ok_or_else(|| format!("uniform {name} has an unsupported type"))?;
                        insert_uniform(uniforms, name, kind)?;
                    }
                } else {
                    let name = var.name.clone().unwrap_or_default();
                    let kind = uniform_kind(inner)
                        .ok_or_else(|| format!("uniform {name} has an unsupported type"))?;
                    insert_uniform(uniforms, name, kind)?;
                }
            }
            AddressSpace::Handle => {
                if matches!(inner, TypeInner::Image { .. }) {
                    let name = var.name.clone().unwrap_or_default();
                    insert_uniform(uniforms, name, UniformKind::Sampler)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn insert_uniform(
    uniforms: &mut HashMap<String, UniformSlot>,
    name: String,
    kind: UniformKind,
) -> std::result::Result<(), String> {
    if let Some(existing) = uniforms.get(&name) {
        if existing.kind != kind {
            return Err(format!(
                "uniform {name} is {:?} in one stage and {kind:?} in the other",
                existing.kind
            ));
        }
        return Ok(());
    }
    let location = uniforms.len() as u32;
    uniforms.insert(name, UniformSlot { location, kind });
    Ok(())
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float => Some(UniformKind::Float),
            ScalarKind::Sint | ScalarKind::Uint => Some(UniformKind::Int),
            _ => None,
        },
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float => Some(UniformKind::Vec4),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => Some(UniformKind::Mat4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"
struct Params {
    mvp: mat4x4<f32>,
    tint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> params: Params;

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) point: vec4<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    return VsOut(params.mvp * point, uv);
}
";

    const FRAGMENT: &str = r"
struct Params {
    mvp: mat4x4<f32>,
    tint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return params.tint * uv.x;
}
";

    fn build(vertex: &str, fragment: &str) -> Result<GpuProgram> {
        GpuProgram::new("test", vertex, fragment)
    }

    #[test]
    fn test_reflects_attributes_and_uniforms() {
        let program = build(VERTEX, FRAGMENT).unwrap();
        assert_eq!(program.vertex_source(), VERTEX);
        assert_eq!(program.fragment_source(), FRAGMENT);
        assert_eq!(program.size_in_bytes(), VERTEX.len() + FRAGMENT.len());
        assert_eq!(program.attribute_location("point"), Some(0));
        assert_eq!(program.attribute_location("uv"), Some(1));
        assert_eq!(program.attribute_location("missing"), None);

        let mvp = program.uniform_slot("mvp").unwrap();
        let tint = program.uniform_slot("tint").unwrap();
        assert_eq!(mvp.kind, UniformKind::Mat4);
        assert_eq!(tint.kind, UniformKind::Vec4);
        assert_ne!(mvp.location, tint.location);
        assert_eq!(program.uniform_count(), 2);
    }

    #[test]
    fn test_syntax_error_fails_compile() {
        let err = build("fn vs_main( {", FRAGMENT).unwrap_err();
        assert!(matches!(
            err,
            Error::ProgramCompile {
                stage: "vertex",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_entry_point_fails_compile() {
        let err = build(VERTEX, VERTEX).unwrap_err();
        assert!(matches!(
            err,
            Error::ProgramCompile {
                stage: "fragment",
                ..
            }
        ));
    }

    #[test]
    fn test_unmatched_varying_fails_link() {
        let fragment = r"
@fragment
fn fs_main(@location(3) other: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(other, 0.0, 1.0);
}
";
        let err = build(VERTEX, fragment).unwrap_err();
        assert!(matches!(err, Error::ProgramLink { .. }), "{err}");
    }

    #[test]
    fn test_varying_type_mismatch_fails_link() {
        let fragment = r"
@fragment
fn fs_main(@location(0) uv: vec4<f32>) -> @location(0) vec4<f32> {
    return uv;
}
";
        let err = build(VERTEX, fragment).unwrap_err();
        assert!(matches!(err, Error::ProgramLink { .. }), "{err}");
    }

    #[test]
    fn test_disagreeing_uniform_blocks_fail_link() {
        let fragment = r"
struct Params {
    tint: vec4<f32>,
    mvp: mat4x4<f32>,
};
@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return params.tint * uv.x;
}
";
        let err = build(VERTEX, fragment).unwrap_err();
        assert!(matches!(err, Error::ProgramLink { .. }), "{err}");
    }
}
