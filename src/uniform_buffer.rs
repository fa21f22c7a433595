//! # Uniform Buffer
//!
//! This module defines `UniformBlock`, the CPU-side staging copy of one program's uniform
//! struct. The renderer writes the well-known uniforms into it at the offsets resolved by
//! [`crate::uniform_binding::UniformBinding`], and the GPU backend uploads the raw bytes
//! verbatim before every draw.
//!
//! ## Memory Layout
//!
//! The block is a plain byte array laid out exactly like the WGSL struct the program
//! declared. Matrices are stored column-major as sixteen `f32`s (the same order as
//! `nalgebra_glm::Mat4` storage), scalars as a single `f32`. Values are converted with
//! `bytemuck`, so there is no manual byte shuffling anywhere.
//!
//! The length is padded up to a multiple of 16 bytes and never drops below 16, which is
//! what `wgpu` requires for the size of a uniform buffer binding.
//!
//! ## Example Usage
//!
//! ```rust
//! use nalgebra_glm as glm;
//! use sky_core::uniform_buffer::UniformBlock;
//!
//! let mut block = UniformBlock::zeroed(264);
//! block.write_matrix(0, &glm::Mat4::identity());
//! block.write_scalar(256, 0.5);
//! assert_eq!(block.len(), 272);
//! assert_eq!(block.read_scalar(256), 0.5);
//! ```

use nalgebra_glm::Mat4;

/// Minimum size and alignment of a uniform buffer binding, in bytes.
pub const UNIFORM_ALIGNMENT: u64 = 16;

const MATRIX_SIZE: usize = std::mem::size_of::<[f32; 16]>();
const SCALAR_SIZE: usize = std::mem::size_of::<f32>();

/// Staging bytes for one program's uniform block.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    /// Allocates a zero-filled block able to hold `span` bytes of uniform data.
    pub fn zeroed(span: u64) -> Self {
        let size = span.max(UNIFORM_ALIGNMENT).div_ceil(UNIFORM_ALIGNMENT) * UNIFORM_ALIGNMENT;
        Self {
            bytes: vec![0; size as usize],
        }
    }

    /// Writes `value` as sixteen column-major floats starting at `offset`.
    ///
    /// # Panics
    ///
    /// If the matrix does not fit in the block. Offsets come from a linked program's
    /// layout, so this only fires on a layout bug.
    pub fn write_matrix(&mut self, offset: u32, value: &Mat4) {
        let offset = offset as usize;
        self.bytes[offset..offset + MATRIX_SIZE]
            .copy_from_slice(bytemuck::cast_slice(value.as_slice()));
    }

    /// Writes a single float at `offset`.
    pub fn write_scalar(&mut self, offset: u32, value: f32) {
        let offset = offset as usize;
        self.bytes[offset..offset + SCALAR_SIZE].copy_from_slice(bytemuck::bytes_of(&value));
    }

    pub fn read_matrix(&self, offset: u32) -> Mat4 {
        let offset = offset as usize;
        let columns: [f32; 16] =
            bytemuck::pod_read_unaligned(&self.bytes[offset..offset + MATRIX_SIZE]);
        Mat4::from_column_slice(&columns)
    }

    pub fn read_scalar(&self, offset: u32) -> f32 {
        let offset = offset as usize;
        bytemuck::pod_read_unaligned(&self.bytes[offset..offset + SCALAR_SIZE])
    }

    /// The raw bytes, ready for `Queue::write_buffer`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_padded() {
        assert_eq!(UniformBlock::zeroed(0).len(), 16);
        assert_eq!(UniformBlock::zeroed(4).len(), 16);
        assert_eq!(UniformBlock::zeroed(16).len(), 16);
        assert_eq!(UniformBlock::zeroed(264).len(), 272);
    }

    #[test]
    fn matrix_is_stored_column_major() {
        let mut block = UniformBlock::zeroed(64);
        let m = Mat4::from_column_slice(&[
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0,
            16.0,
        ]);
        block.write_matrix(0, &m);

        let floats: &[f32] = bytemuck::cast_slice(block.as_bytes());
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[4], 5.0);
        assert_eq!(floats[15], 16.0);
        assert_eq!(block.read_matrix(0), m);
    }

    #[test]
    fn scalar_lands_at_offset() {
        let mut block = UniformBlock::zeroed(8);
        block.write_scalar(4, -10.0);
        assert_eq!(block.read_scalar(0), 0.0);
        assert_eq!(block.read_scalar(4), -10.0);
    }
}
