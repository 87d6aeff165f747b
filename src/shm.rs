//! Anonymous `MAP_SHARED` mappings.
//!
//! A ring placed in one of these with [`SpscRing::init_in_shared`] stays
//! reachable from both sides of a `fork`, which is how the cross-process
//! benchmark runs its producer and consumer.
//!
//! [`SpscRing::init_in_shared`]: crate::SpscRing::init_in_shared

use nix::errno::Errno;
use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use std::{ffi::c_void, num::NonZeroUsize, ptr::NonNull};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ShmError {
   #[error("cannot map a zero-length region")]
   ZeroLength,
   #[error("mmap failed: {0}")]
   Map(#[from] Errno),
}

/// Page-rounded, read/write, process-shared anonymous mapping.
/// Unmapped on drop.
#[derive(Debug)]
pub struct SharedMapping {
   ptr: NonNull<c_void>,
   len: usize,
}

impl SharedMapping {
   pub fn anonymous(len: usize) -> Result<Self, ShmError> {
      let len = NonZeroUsize::new(len).ok_or(ShmError::ZeroLength)?;
      let len = len
         .get()
         .checked_next_multiple_of(page_size())
         .and_then(NonZeroUsize::new)
         .ok_or(Errno::ENOMEM)?;

      let ptr = unsafe {
         mmap_anonymous(
            None,
            len,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED,
         )?
      };

      debug!(len = len.get(), "mapped shared region");
      Ok(Self { ptr, len: len.get() })
   }

   #[inline]
   pub fn as_mut_ptr(&self) -> *mut u8 {
      self.ptr.as_ptr().cast()
   }

   /// Mapped length in bytes, after page rounding.
   #[inline]
   pub fn len(&self) -> usize {
      self.len
   }

   /// Always false: zero-length mappings are rejected.
   #[inline]
   pub fn is_empty(&self) -> bool {
      self.len == 0
   }
}

impl Drop for SharedMapping {
   fn drop(&mut self) {
      match unsafe { munmap(self.ptr, self.len) } {
         Ok(()) => debug!(len = self.len, "unmapped shared region"),
         Err(err) => warn!(%err, len = self.len, "munmap failed"),
      }
   }
}

fn page_size() -> usize {
   let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
   if page > 0 { page as usize } else { 4096 }
}
