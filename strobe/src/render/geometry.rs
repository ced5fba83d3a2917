//! Unit box mesh instanced for every call and GC pause
//!
//! x spans the interval (0 = start, 1 = end), y spans one depth level and z
//! spans the middle of the lane so neighbouring lanes keep a gap.

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

    const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { position: [x, y, z] }
    }

    #[must_use]
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Lane-local z extent of a box
pub const LANE_NEAR: f32 = 0.2;
pub const LANE_FAR: f32 = 0.8;

pub const VERTICES: &[Vertex] = &[
    Vertex::new(0.0, 0.0, LANE_NEAR),
    Vertex::new(1.0, 0.0, LANE_NEAR),
    Vertex::new(0.0, 1.0, LANE_NEAR),
    Vertex::new(1.0, 1.0, LANE_NEAR),
    Vertex::new(0.0, 0.0, LANE_FAR),
    Vertex::new(1.0, 0.0, LANE_FAR),
    Vertex::new(0.0, 1.0, LANE_FAR),
    Vertex::new(1.0, 1.0, LANE_FAR),
];

/// Two triangles per face, six faces
pub const INDICES: &[u16] = &[
    0, 2, 3, 0, 3, 1, // near
    1, 3, 7, 1, 7, 5, // right
    5, 7, 6, 5, 6, 4, // far
    4, 6, 2, 4, 2, 0, // left
    2, 6, 7, 2, 7, 3, // top
    0, 1, 5, 0, 5, 4, // bottom
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_cover_every_vertex() {
        assert_eq!(INDICES.len(), 36);
        for v in 0..VERTICES.len() {
            assert!(INDICES.contains(&u16::try_from(v).expect("small index")));
        }
        assert!(INDICES.iter().all(|&i| usize::from(i) < VERTICES.len()));
    }

    #[test]
    fn test_unit_extent() {
        for vertex in VERTICES {
            let [x, y, z] = vertex.position;
            assert!((0.0..=1.0).contains(&x));
            assert!((0.0..=1.0).contains(&y));
            assert!((LANE_NEAR..=LANE_FAR).contains(&z));
        }
    }
}
