//! GPU state and the recorded draw stream.
//!
//! [`GpuContext`] mirrors the state machine of a classic GL context: one
//! program bound at a time, per-program uniform values, numbered texture
//! units with one of them active. Draw calls snapshot that state into
//! [`DrawCommand`]s, which a backend replays after the frame is built.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec4};

use crate::error::{Error, Result};
use crate::gpu::program::{GpuProgram, ProgramKey, UniformKind, UniformSlot};
use crate::gpu::texture::Texture;

/// Enumerant of the first texture unit.
pub const TEXTURE0: u32 = 0x84C0;

/// Number of texture units a context provides.
pub const MAX_TEXTURE_UNITS: u32 = 32;

/// Convert a texture unit enumerant to a zero-based unit index.
pub fn texture_unit_index(unit: u32) -> Result<u32> {
    if (TEXTURE0..TEXTURE0 + MAX_TEXTURE_UNITS).contains(&unit) {
        Ok(unit - TEXTURE0)
    } else {
        Err(Error::invalid(
            "texture unit",
            format!("{unit:#x} is not one of TEXTURE0..TEXTURE{}", MAX_TEXTURE_UNITS - 1),
        ))
    }
}

/// Value stored in a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum UniformValue {
    #[default]
    Unset,
    Float(f32),
    Int(i32),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    fn kind_matches(&self, kind: UniformKind) -> bool {
        matches!(
            (self, kind),
            (UniformValue::Float(_), UniformKind::Float)
                | (UniformValue::Int(_), UniformKind::Int | UniformKind::Sampler)
                | (UniformValue::Vec4(_), UniformKind::Vec4)
                | (UniformValue::Mat4(_), UniformKind::Mat4)
        )
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            UniformValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            UniformValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            UniformValue::Mat4(m) => Some(*m),
            _ => None,
        }
    }
}

/// Largest number of components a vertex attribute may have.
pub const MAX_ATTRIBUTE_COMPONENTS: usize = 4;

/// A vertex attribute array bound at a location.
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    location: u32,
    components: usize,
    data: Arc<[f32]>,
}

impl VertexAttribute {
    /// Wrap tightly packed per-vertex values of 1 to 4 components each.
    pub fn new(location: u32, components: usize, data: Arc<[f32]>) -> Result<Self> {
        if !(1..=MAX_ATTRIBUTE_COMPONENTS).contains(&components) {
            return Err(Error::invalid(
                "vertex attribute components",
                format!("{components} is not in 1..={MAX_ATTRIBUTE_COMPONENTS}"),
            ));
        }
        Ok(Self {
            location,
            components,
            data,
        })
    }

    #[must_use]
    pub fn location(&self) -> u32 {
        self.location
    }

    #[must_use]
    pub fn components(&self) -> usize {
        self.components
    }

    #[must_use]
    pub fn data(&self) -> &Arc<[f32]> {
        &self.data
    }

    /// Number of whole vertices in the array.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.components
    }

    /// Read the attribute of one vertex, filling missing components from
    /// `(0, 0, 0, 1)`. Vertices past the end read as `(0, 0, 0, 1)`.
    #[must_use]
    pub fn fetch(&self, index: u32) -> Vec4 {
        let mut out = [0.0, 0.0, 0.0, 1.0];
        let start = index as usize * self.components;
        if let Some(values) = self.data.get(start..start + self.components) {
            out[..self.components].copy_from_slice(values);
        }
        Vec4::from_array(out)
    }
}

/// Fixed-function state applied to a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawState {
    /// Premultiplied "over" blending.
    pub blend: bool,
    /// Less-or-equal depth test.
    pub depth_test: bool,
    pub depth_write: bool,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            blend: true,
            depth_test: true,
            depth_write: true,
        }
    }
}

/// A recorded indexed triangle draw.
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub program: Arc<GpuProgram>,
    /// Uniform values by slot location.
    pub uniforms: Vec<UniformValue>,
    /// Textures by unit index.
    pub textures: Vec<Option<Arc<Texture>>>,
    pub attributes: Vec<VertexAttribute>,
    /// Triangle list indices.
    pub indices: Arc<[u32]>,
    pub state: DrawState,
}

impl DrawCommand {
    /// Uniform value of a slot.
    #[must_use]
    pub fn uniform(&self, slot: UniformSlot) -> UniformValue {
        self.uniforms
            .get(slot.location as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Attribute bound at a location.
    #[must_use]
    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }

    /// Texture bound to a zero-based unit.
    #[must_use]
    pub fn texture(&self, unit: i32) -> Option<&Arc<Texture>> {
        usize::try_from(unit)
            .ok()
            .and_then(|u| self.textures.get(u))
            .and_then(Option::as_ref)
    }

    /// Number of triangles drawn.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Program, uniform and texture state of the render thread plus the draw
/// stream of the current frame.
#[derive(Debug)]
pub struct GpuContext {
    program: Option<Arc<GpuProgram>>,
    uniforms: HashMap<ProgramKey, Vec<UniformValue>>,
    active_texture: u32,
    textures: Vec<Option<Arc<Texture>>>,
    commands: Vec<DrawCommand>,
}

impl Default for GpuContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: None,
            uniforms: HashMap::new(),
            active_texture: 0,
            textures: vec![None; MAX_TEXTURE_UNITS as usize],
            commands: Vec::new(),
        }
    }

    /// Bind a program, or unbind with `None`.
    pub fn use_program(&mut self, program: Option<Arc<GpuProgram>>) {
        if let Some(program) = &program {
            self.uniforms
                .entry(program.key())
                .or_insert_with(|| vec![UniformValue::Unset; program.uniform_count()]);
        }
        self.program = program;
    }

    #[must_use]
    pub fn current_program(&self) -> Option<&Arc<GpuProgram>> {
        self.program.as_ref()
    }

    /// Store a uniform value on the bound program.
    ///
    /// The slot must belong to the bound program. This is a precondition of
    /// every uniform load and is only checked in debug builds; values written
    /// with no program bound are dropped.
    pub fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue) {
        debug_assert!(self.program.is_some(), "uniform loaded with no program bound");
        debug_assert!(value.kind_matches(slot.kind), "{value:?} loaded into {slot:?}");
        let Some(program) = &self.program else {
            return;
        };
        if let Some(values) = self.uniforms.get_mut(program.key())
            && let Some(v) = values.get_mut(slot.location as usize)
        {
            *v = value;
        }
    }

    /// Uniform value of the bound program.
    #[must_use]
    pub fn uniform(&self, slot: UniformSlot) -> UniformValue {
        self.program
            .as_ref()
            .and_then(|p| self.uniforms.get(p.key()))
            .and_then(|values| values.get(slot.location as usize))
            .copied()
            .unwrap_or_default()
    }

    /// Select the texture unit that [`GpuContext::bind_texture`] affects.
    pub fn active_texture(&mut self, unit: u32) -> Result<()> {
        self.active_texture = texture_unit_index(unit)?;
        Ok(())
    }

    /// Bind a texture to the active unit.
    pub fn bind_texture(&mut self, texture: Option<Arc<Texture>>) {
        self.textures[self.active_texture as usize] = texture;
    }

    /// Texture bound to a zero-based unit.
    #[must_use]
    pub fn bound_texture(&self, unit: u32) -> Option<&Arc<Texture>> {
        self.textures.get(unit as usize).and_then(Option::as_ref)
    }

    /// Record an indexed triangle draw with the bound program.
    ///
    /// Draws issued with no program bound are ignored.
    pub fn draw_elements(
        &mut self,
        attributes: Vec<VertexAttribute>,
        indices: Arc<[u32]>,
        state: DrawState,
    ) {
        debug_assert!(self.program.is_some(), "draw issued with no program bound");
        let Some(program) = self.program.clone() else {
            return;
        };
        let uniforms = self
            .uniforms
            .get(program.key())
            .cloned()
            .unwrap_or_default();
        self.commands.push(DrawCommand {
            program,
            uniforms,
            textures: self.textures.clone(),
            attributes,
            indices,
            state,
        });
    }

    /// Draws recorded so far this frame.
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Take the recorded draws, leaving the stream empty.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Unbind the program and all textures and drop recorded draws.
    ///
    /// Uniform values persist with their programs, as they do on a GPU.
    pub fn reset(&mut self) {
        self.program = None;
        self.active_texture = 0;
        self.textures.iter_mut().for_each(|t| *t = None);
        self.commands.clear();
    }
}
