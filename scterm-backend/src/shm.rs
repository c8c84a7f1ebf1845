//! POSIX shared-memory backing for window buffers.
//!
//! A [`ShmBacking`] is created, filled and unmapped in one call; dropping it unlinks
//! the name and then closes the descriptor, on every exit path.

use std::fs::File;
use std::os::fd::{AsFd, BorrowedFd};

use memmap2::MmapOptions;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use tracing::{trace, warn};

use crate::error::BackendError;

/// Bytes per ARGB8888 pixel.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Shared-memory object holding one `width * height` ARGB8888 bitmap.
#[derive(Debug)]
pub struct ShmBacking {
    name: String,
    file: File,
    width: u32,
    height: u32,
    stride: u32,
    len: usize,
}

impl ShmBacking {
    /// Creates `name` exclusively, sizes it to `width * height * 4` bytes and fills every
    /// pixel with `color` (`0xAARRGGBB`). The mapping is released before returning.
    pub fn create(name: &str, width: u32, height: u32, color: u32) -> Result<Self, BackendError> {
        let stride = width
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or_else(|| BackendError::resource("pixel buffer", std::io::ErrorKind::InvalidInput))?;
        let len = (stride as usize)
            .checked_mul(height as usize)
            .filter(|len| *len > 0 && i32::try_from(*len).is_ok())
            .ok_or_else(|| BackendError::resource("pixel buffer", std::io::ErrorKind::InvalidInput))?;

        let backing = Self {
            name: name.to_owned(),
            file: File::from(open_exclusive(name)?),
            width,
            height,
            stride,
            len,
        };

        backing
            .file
            .set_len(len as u64)
            .map_err(|e| BackendError::resource("shared memory object", e))?;

        // SAFETY: the object was just created exclusively by us and sized to `len`.
        let mut map = unsafe { MmapOptions::new().len(len).map_mut(&backing.file) }
            .map_err(|e| BackendError::resource("buffer mapping", e))?;
        fill_pixels(&mut map, color);
        drop(map);

        trace!("Allocated {}x{} shared buffer {} ({} bytes)", width, height, name, len);
        Ok(backing)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes, always `width * 4`.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsFd for ShmBacking {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl Drop for ShmBacking {
    fn drop(&mut self) {
        if let Err(e) = shm_unlink(self.name.as_str()) {
            warn!("Failed to unlink shared memory object {}: {}", self.name, e);
        }
        // `file` is closed after this body runs.
    }
}

fn open_exclusive(name: &str) -> Result<std::os::fd::OwnedFd, BackendError> {
    let flags = OFlag::O_CREAT | OFlag::O_RDWR | OFlag::O_EXCL;
    let mode = Mode::S_IRUSR | Mode::S_IWUSR;
    match shm_open(name, flags, mode) {
        Ok(fd) => Ok(fd),
        Err(Errno::EEXIST) => {
            // Names are per-process, so a leftover belongs to a dead process that reused our pid.
            warn!("Removing stale shared memory object {}", name);
            let _ = shm_unlink(name);
            shm_open(name, flags, mode).map_err(|e| BackendError::resource("shared memory object", e))
        }
        Err(e) => Err(BackendError::resource("shared memory object", e)),
    }
}

/// Writes `color` into every 4-byte pixel of `pixels` in wl_shm (little-endian) order.
pub fn fill_pixels(pixels: &mut [u8], color: u32) {
    let bytes = color.to_le_bytes();
    for pixel in pixels.chunks_exact_mut(BYTES_PER_PIXEL as usize) {
        pixel.copy_from_slice(&bytes);
    }
}

/// Per-process shared-memory name derived from the configured base name.
pub fn process_shm_name(base: &str) -> String {
    format!("{}-{}", base, std::process::id())
}
