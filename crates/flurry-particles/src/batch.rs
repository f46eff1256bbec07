//! Fixed-capacity quad batch: vertex records and the per-layer buffer
//!
//! Each quad is 6 vertices, two triangles sharing the top-left to
//! bottom-right diagonal:
//! - triangle 1: (left, top), (right, top), (right, bottom)
//! - triangle 2: (left, top), (left, bottom), (right, bottom)

use bytemuck::{Pod, Zeroable};
use flurry_core::{
    BufferHandle, FlurryError, GraphicsDevice, MotionModel, Rect, Result, TextureHandle,
    VertexLayout,
};

/// Quads per layer buffer
pub const MAX_QUADS_PER_BATCH: usize = 1000;

pub const VERTS_PER_QUAD: usize = 6;

/// Corner order for the 6 vertices of a quad, as (x from right?, y from bottom?)
const QUAD_CORNERS: [(bool, bool); VERTS_PER_QUAD] = [
    (false, false),
    (true, false),
    (true, true),
    (false, false),
    (false, true),
    (true, true),
];

/// Vertex for the CPU motion model; matches the WGSL vertex input.
/// 16 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

/// Vertex for the time-driven motion model; matches the WGSL vertex input.
/// 28 bytes: position, velocity, spawn time, texcoord.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TimedQuadVertex {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub spawn_time: f32,
    pub tex_coord: [f32; 2],
}

/// Extra per-quad attributes stamped into every vertex under the GPU model
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimedAttributes {
    pub velocity: [f32; 2],
    /// Scene time in ms
    pub spawn_time: f32,
}

enum Vertices {
    Cpu(Vec<QuadVertex>),
    Gpu(Vec<TimedQuadVertex>),
}

/// A layer's vertex storage plus its device-side buffer handle.
///
/// Storage is allocated once at full capacity and written in place.
/// Under the CPU model the buffer is rebuilt every frame; under the GPU
/// model quads accumulate and are never recycled.
pub struct BatchBuffer {
    vertices: Vertices,
    capacity: usize,
    written: usize,
    handle: BufferHandle,
}

impl BatchBuffer {
    /// Allocate storage for `capacity` quads and a matching device buffer
    pub fn new(
        device: &mut dyn GraphicsDevice,
        motion: MotionModel,
        capacity: usize,
    ) -> Result<Self> {
        let vertex_count = capacity * VERTS_PER_QUAD;
        let vertices = match motion {
            MotionModel::Cpu => Vertices::Cpu(vec![QuadVertex::zeroed(); vertex_count]),
            MotionModel::Gpu => Vertices::Gpu(vec![TimedQuadVertex::zeroed(); vertex_count]),
        };
        let stride = VertexLayout::for_motion(motion).stride_bytes();
        let handle = device.create_vertex_buffer(vertex_count * stride)?;
        Ok(Self {
            vertices,
            capacity,
            written: 0,
            handle,
        })
    }

    pub fn motion(&self) -> MotionModel {
        match self.vertices {
            Vertices::Cpu(_) => MotionModel::Cpu,
            Vertices::Gpu(_) => MotionModel::Gpu,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of quads currently populated
    pub fn written_quads(&self) -> usize {
        self.written
    }

    pub fn is_full(&self) -> bool {
        self.written == self.capacity
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Write one quad at the next free slot and return its index.
    ///
    /// `extra` is stamped into all 6 vertices under the GPU model and ignored
    /// under the CPU model. A full buffer rejects the quad with
    /// [`FlurryError::BatchFull`]; nothing is overwritten.
    pub fn append(&mut self, rect: Rect, extra: Option<TimedAttributes>) -> Result<usize> {
        if self.written == self.capacity {
            return Err(FlurryError::BatchFull {
                capacity: self.capacity,
            });
        }

        let index = self.written;
        let offset = index * VERTS_PER_QUAD;

        match &mut self.vertices {
            Vertices::Cpu(verts) => {
                for (slot, &(right, bottom)) in QUAD_CORNERS.iter().enumerate() {
                    verts[offset + slot] = QuadVertex {
                        position: corner_position(&rect, right, bottom),
                        tex_coord: corner_tex_coord(right, bottom),
                    };
                }
            }
            Vertices::Gpu(verts) => {
                let extra = extra.unwrap_or_default();
                for (slot, &(right, bottom)) in QUAD_CORNERS.iter().enumerate() {
                    verts[offset + slot] = TimedQuadVertex {
                        position: corner_position(&rect, right, bottom),
                        velocity: extra.velocity,
                        spawn_time: extra.spawn_time,
                        tex_coord: corner_tex_coord(right, bottom),
                    };
                }
            }
        }

        self.written += 1;
        Ok(index)
    }

    /// Upload the live range, bind `texture` and draw `written * 6` vertices.
    ///
    /// The CPU model resets the buffer afterwards; the GPU model keeps
    /// every written quad for the next frame.
    pub fn flush(&mut self, device: &mut dyn GraphicsDevice, texture: TextureHandle) -> Result<()> {
        let live = self.written * VERTS_PER_QUAD;
        device.upload_vertices(self.handle, self.live_bytes())?;
        device.bind_texture(texture)?;
        device.draw(live as u32)?;

        if let Vertices::Cpu(_) = self.vertices {
            self.written = 0;
        }
        Ok(())
    }

    /// Raw bytes of the populated vertex range
    pub fn live_bytes(&self) -> &[u8] {
        let live = self.written * VERTS_PER_QUAD;
        match &self.vertices {
            Vertices::Cpu(verts) => bytemuck::cast_slice(&verts[..live]),
            Vertices::Gpu(verts) => bytemuck::cast_slice(&verts[..live]),
        }
    }

    /// CPU-model vertex records, `None` under the GPU model
    pub fn quad_vertices(&self) -> Option<&[QuadVertex]> {
        match &self.vertices {
            Vertices::Cpu(verts) => Some(&verts[..self.written * VERTS_PER_QUAD]),
            Vertices::Gpu(_) => None,
        }
    }

    /// GPU-model vertex records, `None` under the CPU model
    pub fn timed_vertices(&self) -> Option<&[TimedQuadVertex]> {
        match &self.vertices {
            Vertices::Gpu(verts) => Some(&verts[..self.written * VERTS_PER_QUAD]),
            Vertices::Cpu(_) => None,
        }
    }

    /// Give the device-side buffer back. Consumes the batch.
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        device.release_buffer(self.handle);
    }
}

fn corner_position(rect: &Rect, right: bool, bottom: bool) -> [f32; 2] {
    [
        if right { rect.right } else { rect.left },
        if bottom { rect.bottom } else { rect.top },
    ]
}

/// Full texture over the quad, image top row at the quad's top edge
fn corner_tex_coord(right: bool, bottom: bool) -> [f32; 2] {
    [
        if right { 1.0 } else { 0.0 },
        if bottom { 1.0 } else { 0.0 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DeviceCall, RecordingDevice};

    fn cpu_batch(device: &mut RecordingDevice, capacity: usize) -> BatchBuffer {
        BatchBuffer::new(device, MotionModel::Cpu, capacity).unwrap()
    }

    #[test]
    fn vertex_layouts_match_strides() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), VertexLayout::PositionTexCoord.stride_bytes());
        assert_eq!(
            std::mem::size_of::<TimedQuadVertex>(),
            VertexLayout::PositionVelocityTime.stride_bytes()
        );
        assert_eq!(std::mem::align_of::<TimedQuadVertex>(), 4);
    }

    #[test]
    fn new_allocates_device_buffer_at_capacity() {
        let mut device = RecordingDevice::new();
        let batch = BatchBuffer::new(&mut device, MotionModel::Gpu, MAX_QUADS_PER_BATCH).unwrap();
        assert_eq!(batch.capacity(), 1000);
        assert!(device.calls().iter().any(|c| matches!(
            c,
            DeviceCall::CreateVertexBuffer { capacity_bytes, .. } if *capacity_bytes == 1000 * 6 * 28
        )));
    }

    #[test]
    fn append_writes_six_vertices_at_quad_offset() {
        let mut device = RecordingDevice::new();
        let mut batch = cpu_batch(&mut device, 4);
        batch.append(Rect::new(0.0, 0.0, 1.0, 1.0), None).unwrap();
        let index = batch.append(Rect::new(10.0, 20.0, 13.0, 23.0), None).unwrap();
        assert_eq!(index, 1);

        let verts = batch.quad_vertices().unwrap();
        assert_eq!(verts.len(), 12);
        let quad = &verts[index * 6..index * 6 + 6];
        let positions: Vec<[f32; 2]> = quad.iter().map(|v| v.position).collect();
        assert_eq!(
            positions,
            vec![
                [10.0, 20.0],
                [13.0, 20.0],
                [13.0, 23.0],
                [10.0, 20.0],
                [10.0, 23.0],
                [13.0, 23.0],
            ]
        );
        // First quad untouched
        assert_eq!(verts[0].position, [0.0, 0.0]);
        assert_eq!(verts[5].position, [1.0, 1.0]);
    }

    #[test]
    fn tex_coords_cover_full_texture() {
        let mut device = RecordingDevice::new();
        let mut batch = cpu_batch(&mut device, 1);
        batch.append(Rect::new(5.0, 5.0, 8.0, 8.0), None).unwrap();
        let verts = batch.quad_vertices().unwrap();
        for v in verts {
            let expected_u = if v.position[0] == 8.0 { 1.0 } else { 0.0 };
            let expected_v = if v.position[1] == 8.0 { 1.0 } else { 0.0 };
            assert_eq!(v.tex_coord, [expected_u, expected_v]);
        }
    }

    #[test]
    fn timed_append_stamps_every_vertex() {
        let mut device = RecordingDevice::new();
        let mut batch = BatchBuffer::new(&mut device, MotionModel::Gpu, 2).unwrap();
        let extra = TimedAttributes {
            velocity: [-0.5, 5.0],
            spawn_time: 1234.0,
        };
        batch.append(Rect::new(0.0, -3.0, 3.0, 0.0), Some(extra)).unwrap();
        let verts = batch.timed_vertices().unwrap();
        assert_eq!(verts.len(), 6);
        for v in verts {
            assert_eq!(v.velocity, [-0.5, 5.0]);
            assert_eq!(v.spawn_time, 1234.0);
        }
        assert!(batch.quad_vertices().is_none());
    }

    #[test]
    fn append_rejects_when_full() {
        let mut device = RecordingDevice::new();
        let mut batch = cpu_batch(&mut device, 2);
        let r = Rect::new(0.0, 0.0, 1.0, 1.0);
        batch.append(r, None).unwrap();
        batch.append(r, None).unwrap();
        assert!(batch.is_full());
        let err = batch.append(r, None).unwrap_err();
        assert!(matches!(err, FlurryError::BatchFull { capacity: 2 }));
        assert_eq!(batch.written_quads(), 2);
    }

    #[test]
    fn cpu_flush_resets_and_draws_live_range() {
        let mut device = RecordingDevice::new();
        let texture = device.create_texture(&flurry_core::TextureImage::white()).unwrap();
        let mut batch = cpu_batch(&mut device, 8);
        for _ in 0..3 {
            batch.append(Rect::new(0.0, 0.0, 1.0, 1.0), None).unwrap();
        }
        batch.flush(&mut device, texture).unwrap();
        assert_eq!(batch.written_quads(), 0);
        assert_eq!(device.draw_counts(), vec![18]);
        assert_eq!(device.uploaded(batch.handle()).unwrap().len(), 18 * 16);
    }

    #[test]
    fn gpu_flush_keeps_written_quads() {
        let mut device = RecordingDevice::new();
        let texture = device.create_texture(&flurry_core::TextureImage::white()).unwrap();
        let mut batch = BatchBuffer::new(&mut device, MotionModel::Gpu, 8).unwrap();
        batch.append(Rect::new(0.0, 0.0, 1.0, 1.0), None).unwrap();
        batch.flush(&mut device, texture).unwrap();
        batch.flush(&mut device, texture).unwrap();
        assert_eq!(batch.written_quads(), 1);
        assert_eq!(device.draw_counts(), vec![6, 6]);
    }

    #[test]
    fn flush_empty_buffer_draws_zero() {
        let mut device = RecordingDevice::new();
        let texture = device.create_texture(&flurry_core::TextureImage::white()).unwrap();
        for motion in [MotionModel::Cpu, MotionModel::Gpu] {
            let mut batch = BatchBuffer::new(&mut device, motion, 4).unwrap();
            batch.flush(&mut device, texture).unwrap();
            batch.flush(&mut device, texture).unwrap();
            assert_eq!(batch.written_quads(), 0);
        }
        assert_eq!(device.draw_counts(), vec![0, 0, 0, 0]);
    }
}
