//! Double-buffered storage fields.
//!
//! Fluid state lives in storage buffers rather than textures: f32 textures
//! are not filterable without optional device features, so kernels sample
//! with explicit bilinear/wrap helpers instead. A [`Layer`] owns one or
//! two buffers of `width * height * components` f32 cells; stencil kernels
//! read the front buffer and write the back, then [`Layer::swap`] flips.

/// A named field over the grid, optionally double-buffered.
pub struct Layer {
    label: String,
    buffers: Vec<wgpu::Buffer>,
    front: usize,
    width: u32,
    height: u32,
    components: u32,
}

impl Layer {
    /// Allocate a layer. Buffers start zeroed.
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        components: u32,
        num_buffers: usize,
    ) -> Self {
        let mut layer = Self {
            label: label.to_string(),
            buffers: Vec::new(),
            front: 0,
            width: width.max(1),
            height: height.max(1),
            components,
        };
        layer.allocate(device, num_buffers);
        layer
    }

    fn allocate(&mut self, device: &wgpu::Device, num_buffers: usize) {
        self.buffers = (0..num_buffers)
            .map(|i| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{} Buffer {}", self.label, i)),
                    size: self.size_bytes(),
                    usage: wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_DST
                        | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                })
            })
            .collect();
        self.front = 0;
    }

    pub fn size_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.components as u64 * 4
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Buffer holding the current field state.
    pub fn front(&self) -> &wgpu::Buffer {
        &self.buffers[self.front]
    }

    /// Scratch buffer for the next state. For a single-buffered layer
    /// this is the front buffer itself.
    pub fn back(&self) -> &wgpu::Buffer {
        &self.buffers[(self.front + 1) % self.buffers.len()]
    }

    /// Make the last written buffer current.
    pub fn swap(&mut self) {
        self.front = (self.front + 1) % self.buffers.len();
    }

    /// Reallocate for new dimensions. Contents reset to zero.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        let n = self.buffers.len();
        self.allocate(device, n);
    }

    /// Upload cell data into the front buffer.
    pub fn write(&self, queue: &wgpu::Queue, data: &[u8]) {
        queue.write_buffer(self.front(), 0, data);
    }
}
