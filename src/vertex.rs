//! # Vertex Module
//!
//! This module provides the `QuadVertex` struct and the fixed full-screen quad every
//! entity is drawn with.
//!
//! The quad covers the whole clip-space square `[-1, 1] x [-1, 1]`. Its four corners are
//! ordered for a triangle strip:
//!
//! ```text
//!  0 (-1,  1)      2 ( 1,  1)
//!      +--------------+
//!      |          /   |
//!      |      /       |
//!      |  /           |
//!      +--------------+
//!  1 (-1, -1)      3 ( 1, -1)
//! ```
//!
//! so the strip yields the triangles `(0, 1, 2)` and `(1, 2, 3)`, which together tile the
//! viewport exactly once.
//!
//! # GPU Compatibility
//!
//! The single attribute is bound at shader location 0 as a `vec2<f32>`. Any vertex stage
//! used with the quad must read its position from `@location(0)`.

/// A single corner of the full-screen quad, in clip space.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    /// `x` and `y` in clip space. Depth and `w` are supplied by the vertex stage.
    pub position: [f32; 2],
}

impl QuadVertex {
    /// Generates the vertex attributes layout for the `QuadVertex` struct.
    ///
    /// A single `Float32x2` attribute at location 0.
    pub fn vertex_attributes() -> Vec<wgpu::VertexAttribute> {
        wgpu::vertex_attr_array![0 => Float32x2].to_vec()
    }

    /// Returns the vertex buffer layout for the `QuadVertex` struct.
    ///
    /// The layout is passed to every render pipeline built for an entity, so all
    /// programs share the one quad buffer.
    pub fn description(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    }
}

/// The full-screen quad, ordered as a triangle strip.
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, -1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
    },
];

/// Number of vertices submitted per draw.
pub const QUAD_VERTEX_COUNT: u32 = QUAD_VERTICES.len() as u32;

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_area(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> f32 {
        0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]))
    }

    #[test]
    fn strip_tiles_clip_space() {
        let p: Vec<[f32; 2]> = QUAD_VERTICES.iter().map(|v| v.position).collect();
        let first = signed_area(p[0], p[1], p[2]).abs();
        let second = signed_area(p[1], p[2], p[3]).abs();
        assert_eq!(first + second, 4.0);
    }

    #[test]
    fn stride_matches_attribute() {
        let attributes = QuadVertex::vertex_attributes();
        let layout = QuadVertex::description(&attributes);
        assert_eq!(layout.array_stride, 8);
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].shader_location, 0);
    }
}
