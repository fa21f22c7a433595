//! # Uniform Binding Module
//!
//! This module defines the closed set of uniforms the renderer knows how to feed, and the
//! `UniformBinding` that maps each of them to a location inside one program's uniform
//! block.
//!
//! ## Overview
//!
//! Every program may declare a single uniform struct at `@group(0) @binding(0)`. The
//! members of that struct whose names match one of the six well-known uniforms are
//! resolved at link time into byte offsets:
//!
//! | Name          | WGSL type     | Meaning                                  |
//! |---------------|---------------|------------------------------------------|
//! | `P`           | `mat4x4<f32>` | Projection matrix                        |
//! | `RX`          | `mat4x4<f32>` | Rotation about X (camera pitch)          |
//! | `RY`          | `mat4x4<f32>` | Rotation about Y (camera yaw)            |
//! | `M`           | `mat4x4<f32>` | Model matrix, reserved (identity)        |
//! | `aspectRatio` | `f32`         | Viewport width over height               |
//! | `time`        | `f32`         | Elapsed shader time in seconds           |
//!
//! A program is free to omit any of them. An omitted uniform resolves to "not present"
//! and every write to it is silently dropped, so the renderer can always push the full
//! set without caring which ones a given shader actually reads.
//!
//! ## Why a fixed table
//!
//! The uniform set is closed, so the binding is a six-slot array indexed by
//! [`UniformName`] instead of a dynamic map.

use nalgebra_glm::Mat4;

use crate::uniform_buffer::UniformBlock;

/// The six uniforms the renderer can write.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UniformName {
    Projection,
    RotationX,
    RotationY,
    Model,
    AspectRatio,
    Time,
}

/// The value type a uniform must be declared with.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UniformKind {
    Mat4,
    F32,
}

impl UniformKind {
    /// The WGSL spelling of the type, for diagnostics.
    pub fn wgsl(self) -> &'static str {
        match self {
            UniformKind::Mat4 => "mat4x4<f32>",
            UniformKind::F32 => "f32",
        }
    }
}

impl UniformName {
    /// Every well-known uniform, in slot order.
    pub const ALL: [UniformName; 6] = [
        UniformName::Projection,
        UniformName::RotationX,
        UniformName::RotationY,
        UniformName::Model,
        UniformName::AspectRatio,
        UniformName::Time,
    ];

    /// The member name a shader uses for this uniform.
    pub fn as_str(self) -> &'static str {
        match self {
            UniformName::Projection => "P",
            UniformName::RotationX => "RX",
            UniformName::RotationY => "RY",
            UniformName::Model => "M",
            UniformName::AspectRatio => "aspectRatio",
            UniformName::Time => "time",
        }
    }

    /// Looks up a uniform by its shader-side member name.
    pub fn from_member(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|uniform| uniform.as_str() == name)
    }

    pub fn kind(self) -> UniformKind {
        match self {
            UniformName::AspectRatio | UniformName::Time => UniformKind::F32,
            _ => UniformKind::Mat4,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for UniformName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved locations of the well-known uniforms within one program's uniform block.
///
/// Each slot holds the byte offset of the uniform inside the block, or `None` when the
/// program does not declare it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformBinding {
    offsets: [Option<u32>; 6],
}

impl UniformBinding {
    /// A binding where nothing is present.
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Records that `name` lives at `offset` bytes into the uniform block.
    pub fn bind(&mut self, name: UniformName, offset: u32) {
        self.offsets[name.slot()] = Some(offset);
    }

    /// The byte offset of `name`, or `None` when the program does not declare it.
    pub fn location(&self, name: UniformName) -> Option<u32> {
        self.offsets[name.slot()]
    }

    pub fn is_present(&self, name: UniformName) -> bool {
        self.location(name).is_some()
    }

    /// The uniforms this program declares, in slot order.
    pub fn resolved(&self) -> impl Iterator<Item = UniformName> + '_ {
        UniformName::ALL
            .into_iter()
            .filter(|name| self.is_present(*name))
    }

    /// Writes a matrix uniform into `block`. Absent uniforms are skipped.
    pub fn write_matrix(&self, block: &mut UniformBlock, name: UniformName, value: &Mat4) {
        debug_assert_eq!(name.kind(), UniformKind::Mat4, "{name} is not a matrix");
        if let Some(offset) = self.location(name) {
            block.write_matrix(offset, value);
        }
    }

    /// Writes a scalar uniform into `block`. Absent uniforms are skipped.
    pub fn write_scalar(&self, block: &mut UniformBlock, name: UniformName, value: f32) {
        debug_assert_eq!(name.kind(), UniformKind::F32, "{name} is not a scalar");
        if let Some(offset) = self.location(name) {
            block.write_scalar(offset, value);
        }
    }

    /// Reads back a matrix uniform from `block`.
    pub fn read_matrix(&self, block: &UniformBlock, name: UniformName) -> Option<Mat4> {
        self.location(name).map(|offset| block.read_matrix(offset))
    }

    /// Reads back a scalar uniform from `block`.
    pub fn read_scalar(&self, block: &UniformBlock, name: UniformName) -> Option<f32> {
        self.location(name).map(|offset| block.read_scalar(offset))
    }
}
