//! CPU-side mesh generation for the head proxy and the ground plane.
//!
//! Geometry is generated once at scene initialization and never mutated; the
//! avatar deforms only by rotation and material changes.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex layout matching the shader.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// A generated mesh ready for buffer upload.
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Generate a UV sphere centered at the origin.
///
/// UVs run u = 0..1 around the equator and v = 0..1 pole to pole, which is
/// what the texture projection expects: decoded photo rows map straight onto
/// v without a vertical flip.
pub fn head_sphere(radius: f32, segments: u32, rings: u32) -> MeshData {
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);

    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let theta = v * std::f32::consts::PI;
        let (sin_t, cos_t) = theta.sin_cos();

        for seg in 0..=segments {
            let u = seg as f32 / segments as f32;
            let phi = u * std::f32::consts::TAU;
            let (sin_p, cos_p) = phi.sin_cos();

            let dir = Vec3::new(sin_t * sin_p, cos_t, sin_t * cos_p);
            vertices.push(Vertex {
                position: (dir * radius).to_array(),
                normal: dir.to_array(),
                uv: [u, v],
            });
        }
    }

    let stride = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    MeshData { vertices, indices }
}

/// Generate a ground plane in the XZ plane at y = 0, facing up.
pub fn ground_plane(size: f32) -> MeshData {
    let h = size / 2.0;
    let vertices = vec![
        Vertex {
            position: [-h, 0.0, -h],
            normal: [0.0, 1.0, 0.0],
            uv: [0.0, 0.0],
        },
        Vertex {
            position: [h, 0.0, -h],
            normal: [0.0, 1.0, 0.0],
            uv: [1.0, 0.0],
        },
        Vertex {
            position: [h, 0.0, h],
            normal: [0.0, 1.0, 0.0],
            uv: [1.0, 1.0],
        },
        Vertex {
            position: [-h, 0.0, h],
            normal: [0.0, 1.0, 0.0],
            uv: [0.0, 1.0],
        },
    ];
    let indices = vec![0, 2, 1, 0, 3, 2];

    MeshData { vertices, indices }
}
