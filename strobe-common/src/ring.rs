//! # Lock-free SPSC ring buffer
//!
//! Fixed-capacity circular buffer of [`TraceEvent`]s with one writer and one
//! reader, designed to live in memory shared between two processes.
//!
//! ## Protocol
//!
//! - Two monotonically increasing 64-bit cursors, `write_cursor` and
//!   `read_cursor`, each stored by exactly one side.
//! - Each side caches the other side's cursor, so the common case is a purely
//!   local read; the real cursor is loaded (acquire) only when the cache says
//!   the ring is full (writer) or empty (reader).
//! - A slot is published by storing the advanced cursor with release
//!   ordering, after the slot contents were written.
//! - Writer and reader cursor blocks sit on separate 64-byte cache lines.
//!
//! ## Single producer, single consumer
//!
//! Exactly one [`RingWriter`] and one [`RingReader`] exist per ring. Both
//! are `Send` but not `Sync`, and `push`/`pop` take `&mut self`, so the
//! compiler enforces the SPSC requirement within a process. Across
//! processes the requirement is upheld by the channel protocol: only the
//! producer creates a writer, only the viewer opens a reader.

#![allow(unsafe_code)] // shared-memory ring access goes through raw pointers

use bytemuck::Zeroable;
use std::cell::UnsafeCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::event::TraceEvent;

/// Number of slots; must stay a power of two
pub const CAPACITY: usize = 65_536;

const MASK: u64 = CAPACITY as u64 - 1;

#[repr(C, align(64))]
struct WriterCursors {
    write_cursor: AtomicU64,
    /// Only touched by the writer
    read_cursor_cache: UnsafeCell<u64>,
}

#[repr(C, align(64))]
struct ReaderCursors {
    read_cursor: AtomicU64,
    /// Only touched by the reader
    write_cursor_cache: UnsafeCell<u64>,
}

/// Shared-memory ring layout
///
/// **Memory Layout**: `{ buffer: [TraceEvent; 65536], writer: 64 bytes,
/// reader: 64 bytes }`. Changing anything here requires rebuilding both the
/// producer and the viewer.
#[repr(C)]
pub struct RingBuffer {
    buffer: [UnsafeCell<TraceEvent>; CAPACITY],
    writer: WriterCursors,
    reader: ReaderCursors,
}

const _: () = assert!(CAPACITY.is_power_of_two());
const _: () = assert!(std::mem::size_of::<RingBuffer>() == CAPACITY * 16 + 128);
const _: () = assert!(std::mem::offset_of!(RingBuffer, writer) == CAPACITY * 16);
const _: () = assert!(std::mem::offset_of!(RingBuffer, reader) == CAPACITY * 16 + 64);

// SAFETY: every field (atomics, `UnsafeCell<u64>`, `UnsafeCell<TraceEvent>`)
// is valid when all bytes are zero, and zeroed cursors describe an empty ring.
unsafe impl Zeroable for RingBuffer {}

impl RingBuffer {
    /// Reset cursors and caches to the empty state
    ///
    /// Only valid before either endpoint is in use, which `&mut` guarantees.
    pub fn reset(&mut self) {
        *self.writer.write_cursor.get_mut() = 0;
        *self.writer.read_cursor_cache.get_mut() = 0;
        *self.reader.read_cursor.get_mut() = 0;
        *self.reader.write_cursor_cache.get_mut() = 0;
    }

    /// Approximate number of unread records
    ///
    /// The two cursors are loaded separately, so the value can be stale by
    /// the time it is returned. Diagnostics only.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn len(&self) -> usize {
        let read = self.reader.read_cursor.load(Ordering::Acquire);
        let write = self.writer.write_cursor.load(Ordering::Acquire);
        (write.saturating_sub(read) as usize).min(CAPACITY)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, cursor: u64) -> &UnsafeCell<TraceEvent> {
        #[allow(clippy::cast_possible_truncation)]
        &self.buffer[(cursor & MASK) as usize]
    }

    /// # Safety
    /// The caller must be the only writer of this ring.
    unsafe fn push(&self, event: TraceEvent) -> bool {
        let write = self.writer.write_cursor.load(Ordering::Relaxed);
        let cache = self.writer.read_cursor_cache.get();
        // SAFETY: the read cursor cache belongs to the (unique) writer.
        unsafe {
            if write.wrapping_sub(*cache) >= CAPACITY as u64 {
                *cache = self.reader.read_cursor.load(Ordering::Acquire);
                if write.wrapping_sub(*cache) >= CAPACITY as u64 {
                    return false;
                }
            }
            // SAFETY: the slot at `write` is not visible to the reader until the
            // release store below, and the reader has finished with it because
            // `write - read < CAPACITY`.
            self.slot(write).get().write(event);
        }
        self.writer.write_cursor.store(write + 1, Ordering::Release);
        true
    }

    /// # Safety
    /// The caller must be the only reader of this ring.
    unsafe fn pop(&self) -> Option<TraceEvent> {
        let read = self.reader.read_cursor.load(Ordering::Relaxed);
        let cache = self.reader.write_cursor_cache.get();
        // SAFETY: the write cursor cache belongs to the (unique) reader; the
        // slot at `read` was published by the writer's release store, which
        // the acquire load of the write cursor synchronises with.
        let event = unsafe {
            if read == *cache {
                *cache = self.writer.write_cursor.load(Ordering::Acquire);
                if read == *cache {
                    return None;
                }
            }
            self.slot(read).get().read()
        };
        self.reader.read_cursor.store(read + 1, Ordering::Release);
        Some(event)
    }

    /// # Safety
    /// The caller must be the only reader of this ring.
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn read_batch(&self, out: &mut [TraceEvent]) -> usize {
        let read = self.reader.read_cursor.load(Ordering::Relaxed);
        let cache = self.reader.write_cursor_cache.get();
        // SAFETY: same reasoning as `pop`, applied to every slot in
        // `read..read + len`, all of which precede the observed write cursor.
        unsafe {
            if read == *cache {
                *cache = self.writer.write_cursor.load(Ordering::Acquire);
            }
            let available = (*cache - read) as usize;
            let len = available.min(out.len());
            if len == 0 {
                return 0;
            }

            let start = (read & MASK) as usize;
            let first = len.min(CAPACITY - start);
            let base = self.buffer.as_ptr().cast::<TraceEvent>();
            std::ptr::copy_nonoverlapping(base.add(start), out.as_mut_ptr(), first);
            if first < len {
                std::ptr::copy_nonoverlapping(base, out.as_mut_ptr().add(first), len - first);
            }

            self.reader.read_cursor.store(read + len as u64, Ordering::Release);
            len
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Memory that keeps a [`RingBuffer`] mapped for as long as an endpoint lives
pub(crate) trait RingStorage: Send + Sync {
    fn ring(&self) -> NonNull<RingBuffer>;
}

/// Zero-initialised heap ring for in-process use
struct HeapStorage {
    ring: NonNull<RingBuffer>,
}

// SAFETY: the ring is only accessed through endpoints that uphold the SPSC
// protocol; the storage itself only frees the allocation on drop.
unsafe impl Send for HeapStorage {}
unsafe impl Sync for HeapStorage {}

impl HeapStorage {
    fn new() -> Self {
        // `zeroed_box` allocates zeroed memory directly, so the 1 MiB ring never
        // passes through the stack.
        let ring: Box<RingBuffer> = bytemuck::zeroed_box();
        Self { ring: NonNull::from(Box::leak(ring)) }
    }
}

impl RingStorage for HeapStorage {
    fn ring(&self) -> NonNull<RingBuffer> {
        self.ring
    }
}

impl Drop for HeapStorage {
    fn drop(&mut self) {
        // SAFETY: `ring` came from `Box::leak` in `new` and is freed exactly once.
        drop(unsafe { Box::from_raw(self.ring.as_ptr()) });
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// Producer endpoint of a ring
pub struct RingWriter {
    ring: NonNull<RingBuffer>,
    _storage: Arc<dyn RingStorage>,
}

// SAFETY: the pointer stays valid while `_storage` is alive and the writer is
// the ring's only producer; moving it to another thread keeps that true.
unsafe impl Send for RingWriter {}

impl RingWriter {
    /// # Safety
    /// No other writer may exist for the ring in `storage`, in this process or
    /// any other.
    pub(crate) unsafe fn attach(storage: Arc<dyn RingStorage>) -> Self {
        Self { ring: storage.ring(), _storage: storage }
    }

    /// Non-blocking enqueue; `false` means the ring is full
    ///
    /// A failed push leaves the ring untouched.
    pub fn push(&mut self, event: TraceEvent) -> bool {
        // SAFETY: `self` is the unique writer and the ring outlives it.
        unsafe { self.ring.as_ref().push(event) }
    }

    /// Approximate number of records the reader has not consumed yet
    #[must_use]
    pub fn len(&self) -> usize {
        // SAFETY: the ring outlives `self`; `len` only performs atomic loads.
        unsafe { self.ring.as_ref().len() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer endpoint of a ring
pub struct RingReader {
    ring: NonNull<RingBuffer>,
    _storage: Arc<dyn RingStorage>,
}

// SAFETY: as for `RingWriter`, with the reader being the unique consumer.
unsafe impl Send for RingReader {}

impl RingReader {
    /// # Safety
    /// No other reader may exist for the ring in `storage`.
    pub(crate) unsafe fn attach(storage: Arc<dyn RingStorage>) -> Self {
        Self { ring: storage.ring(), _storage: storage }
    }

    /// Non-blocking dequeue; `None` means the ring is empty
    pub fn pop(&mut self) -> Option<TraceEvent> {
        // SAFETY: `self` is the unique reader and the ring outlives it.
        unsafe { self.ring.as_ref().pop() }
    }

    /// Drain up to `out.len()` records with a single cursor publish
    ///
    /// Returns the number of records written to the front of `out`.
    pub fn read_batch(&mut self, out: &mut [TraceEvent]) -> usize {
        // SAFETY: `self` is the unique reader and the ring outlives it.
        unsafe { self.ring.as_ref().read_batch(out) }
    }

    /// Approximate number of records waiting to be read
    #[must_use]
    pub fn len(&self) -> usize {
        // SAFETY: the ring outlives `self`; `len` only performs atomic loads.
        unsafe { self.ring.as_ref().len() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Create an in-process ring and its two endpoints
#[must_use]
pub fn local() -> (RingWriter, RingReader) {
    let storage: Arc<dyn RingStorage> = Arc::new(HeapStorage::new());
    // SAFETY: the storage is fresh and these are the only endpoints created for it.
    unsafe { (RingWriter::attach(Arc::clone(&storage)), RingReader::attach(storage)) }
}
