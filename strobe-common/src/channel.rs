//! Named shared-memory channel carrying one [`RingBuffer`]
//!
//! The producer calls [`create`], passes the returned name to the viewer on
//! its command line, and the viewer calls [`open`]. The viewer is spawned
//! asynchronously and may attach after the producer has already finished, so
//! the creator gives up ownership of the name: dropping the writer only
//! unmaps. The first reader to open the channel takes ownership and unlinks
//! the name when it is dropped.

#![allow(unsafe_code)] // mapping the region yields a raw pointer

use log::debug;
use shared_memory::{Shmem, ShmemConf, ShmemError};
use std::ptr::NonNull;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ChannelError;
use crate::ring::{RingBuffer, RingReader, RingStorage, RingWriter};

/// Prefix of every channel name
#[cfg(unix)]
pub const NAME_PREFIX: &str = "/strobe_shm_";
#[cfg(windows)]
pub const NAME_PREFIX: &str = "Local\\strobe_shm_";

const MAX_CREATE_ATTEMPTS: u32 = 8;

/// Bytes mapped for one channel
pub const REGION_SIZE: usize = std::mem::size_of::<RingBuffer>();

struct SharedRegion {
    ring: NonNull<RingBuffer>,
    // Dropped after `ring` is no longer reachable; unmaps and, for the
    // reader, unlinks the name.
    _shmem: Shmem,
}

// SAFETY: `Shmem` is only a mapping handle; the mapped bytes are accessed
// exclusively through the ring endpoints, which uphold the SPSC protocol.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl RingStorage for SharedRegion {
    fn ring(&self) -> NonNull<RingBuffer> {
        self.ring
    }
}

fn mapped_ring(shmem: &Shmem, name: &str) -> Result<NonNull<RingBuffer>, ChannelError> {
    if shmem.len() < REGION_SIZE {
        return Err(ChannelError::SizeMismatch {
            name: name.to_string(),
            expected: REGION_SIZE,
            actual: shmem.len(),
        });
    }
    NonNull::new(shmem.as_ptr().cast::<RingBuffer>()).ok_or_else(|| ChannelError::Open {
        name: name.to_string(),
        reason: "mapping returned a null pointer".to_string(),
    })
}

/// Channel name unique to this process and moment
#[must_use]
pub fn unique_name() -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.subsec_nanos());
    format!("{NAME_PREFIX}{}_{nanos}", std::process::id())
}

/// Create a fresh channel and return its writer and name
///
/// The region is zero-initialised and the cursors reset before the name is
/// handed out, so the viewer always observes an empty ring.
///
/// # Errors
/// Returns [`ChannelError::Create`] if the region cannot be created, or
/// [`ChannelError::SizeMismatch`] if the OS mapped less than requested.
pub fn create() -> Result<(RingWriter, String), ChannelError> {
    let mut attempt = 0;
    let (mut shmem, name) = loop {
        let name = unique_name();
        match ShmemConf::new().size(REGION_SIZE).os_id(&name).create() {
            Ok(shmem) => break (shmem, name),
            Err(ShmemError::MappingIdExists) if attempt + 1 < MAX_CREATE_ATTEMPTS => {
                debug!("Channel name {name} already taken, retrying");
                attempt += 1;
            }
            Err(e) => return Err(ChannelError::Create { name, reason: e.to_string() }),
        }
    };

    // The name must survive the writer until the viewer has attached
    shmem.set_owner(false);
    let mut ring = mapped_ring(&shmem, &name)?;
    // SAFETY: the region was just created and nobody else knows its name yet,
    // so this is the only reference.
    unsafe {
        std::ptr::write_bytes(ring.as_ptr().cast::<u8>(), 0, REGION_SIZE);
        ring.as_mut().reset();
    }
    debug!("Created channel {name} ({REGION_SIZE} bytes)");

    let region: Arc<dyn RingStorage> = Arc::new(SharedRegion { ring, _shmem: shmem });
    // SAFETY: the creator is the only writer; the viewer only ever opens readers.
    let writer = unsafe { RingWriter::attach(region) };
    Ok((writer, name))
}

/// Attach to an existing channel as its reader
///
/// The reader takes ownership of the name, which is unlinked once the reader
/// is dropped.
///
/// The mapping may be larger than [`REGION_SIZE`]: macOS reports shared
/// memory sizes rounded up to whole pages and Windows reports the size of
/// the mapped view. Only a region too small to hold a ring is rejected.
///
/// # Errors
/// Returns [`ChannelError::Open`] if no region has that name, or
/// [`ChannelError::SizeMismatch`] if it is too small to hold a ring.
pub fn open(name: &str) -> Result<RingReader, ChannelError> {
    let mut shmem = ShmemConf::new().os_id(name).open().map_err(|e| ChannelError::Open {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let ring = mapped_ring(&shmem, name)?;
    shmem.set_owner(true);
    debug!("Opened channel {name} ({} bytes mapped)", shmem.len());

    let region: Arc<dyn RingStorage> = Arc::new(SharedRegion { ring, _shmem: shmem });
    // SAFETY: one viewer opens one reader per channel name.
    Ok(unsafe { RingReader::attach(region) })
}
