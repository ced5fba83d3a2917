//! CPU vector mirrored into a growable GPU buffer
//!
//! Only the range that changed since the last upload is written. The buffer
//! grows to the next power of two when the data outgrows it, and a regrown
//! buffer is uploaded in full.

use bytemuck::Pod;
use std::ops::Range;

pub struct GpuVec<T> {
    label: &'static str,
    usage: wgpu::BufferUsages,
    data: Vec<T>,
    /// Element range not yet uploaded; empty when clean
    dirty: Range<usize>,
    buffer: Option<wgpu::Buffer>,
}

impl<T: Pod + PartialEq> GpuVec<T> {
    /// Empty vector; the GPU buffer is created on first sync
    #[must_use]
    pub fn new(label: &'static str, usage: wgpu::BufferUsages) -> Self {
        Self { label, usage: usage | wgpu::BufferUsages::COPY_DST, data: Vec::new(), dirty: 0..0, buffer: None }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Elements waiting for upload
    #[must_use]
    pub fn dirty_range(&self) -> Range<usize> {
        self.dirty.clone()
    }

    fn mark_dirty(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        self.dirty = if self.dirty.is_empty() {
            range
        } else {
            self.dirty.start.min(range.start)..self.dirty.end.max(range.end)
        };
    }

    /// Replace the contents, marking everything from the first difference on as dirty
    pub fn assign(&mut self, items: impl IntoIterator<Item = T>) {
        let mut first_change = None;
        let mut len = 0;
        for (i, item) in items.into_iter().enumerate() {
            if let Some(slot) = self.data.get_mut(i) {
                if *slot != item {
                    *slot = item;
                    first_change.get_or_insert(i);
                }
            } else {
                self.data.push(item);
                first_change.get_or_insert(i);
            }
            len = i + 1;
        }
        self.data.truncate(len);
        // Keep the pending range inside the data after a shrink
        self.dirty = self.dirty.start.min(len)..self.dirty.end.min(len);
        if let Some(start) = first_change {
            self.mark_dirty(start..len);
        }
    }

    /// Upload the dirty range, growing the buffer if needed
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let elem = std::mem::size_of::<T>() as wgpu::BufferAddress;
        let required = (self.data.len() as wgpu::BufferAddress * elem).max(elem);

        let needs_grow = !matches!(&self.buffer, Some(b) if b.size() >= required);
        if needs_grow {
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: required.next_power_of_two(),
                usage: self.usage,
                mapped_at_creation: false,
            }));
            self.dirty = 0..self.data.len();
        }

        if self.dirty.is_empty() {
            return;
        }
        if let Some(buffer) = &self.buffer {
            let bytes: &[u8] = bytemuck::cast_slice(&self.data[self.dirty.clone()]);
            queue.write_buffer(buffer, self.dirty.start as wgpu::BufferAddress * elem, bytes);
        }
        self.dirty = 0..0;
    }

    /// Backing buffer, once synced at least once
    #[must_use]
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }
}
