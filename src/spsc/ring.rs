// Bounded single-producer / single-consumer ring buffer
//
// `storage_size` slots are allocated once. One slot always stays empty so
// that `write == read` means empty and `next(write) == read` means full,
// without a separate element count. Only the producer stores `write`, only
// the consumer stores `read`; each side loads the other's cursor with
// Acquire and publishes its own with Release, which is what hands a slot
// from one side to the other.

use crate::SpscQueue;
use crossbeam::utils::CachePadded;
use std::{
   alloc::Layout,
   cell::UnsafeCell,
   fmt,
   mem::MaybeUninit,
   ptr::{self, NonNull},
   sync::atomic::{AtomicUsize, Ordering},
};
use tracing::debug;

type Slot<T> = UnsafeCell<MaybeUninit<T>>;

/*──────────────────────────────────────────────────────────────────────────*/
/*  Errors                                                                  */
/*──────────────────────────────────────────────────────────────────────────*/

/// Returned by `push` on a full ring; carries the rejected value back.
#[derive(Debug, PartialEq, Eq)]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
   pub fn into_inner(self) -> T {
      self.0
   }
}

impl<T> fmt::Display for PushError<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str("ring is full")
   }
}

impl<T: fmt::Debug> std::error::Error for PushError<T> {}

/// Returned by `pop` on an empty ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("ring is empty")]
pub struct PopError;

/*──────────────────────────────────────────────────────────────────────────*/
/*  Ring header                                                             */
/*──────────────────────────────────────────────────────────────────────────*/

#[repr(C)]
pub struct SpscRing<T: Send + 'static> {
   write: CachePadded<AtomicUsize>, // stored by producer only
   read : CachePadded<AtomicUsize>, // stored by consumer only
   storage_size: usize,
   buffer: NonNull<Slot<T>>,
   owns_buffer: bool,
}

unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

/*────────────────────────  heap-backed constructor  ───────────────────────*/

impl<T: Send + 'static> SpscRing<T> {
   /// Allocate a ring with `storage_size` slots.
   ///
   /// The parameter is the *total* storage size: the ring holds at most
   /// `storage_size - 1` elements. Sizes 0 and 1 are legal and give a ring on
   /// which every push fails.
   pub fn new(storage_size: usize) -> Self {
      let slots = (0..storage_size)
         .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
         .collect::<Vec<Slot<T>>>()
         .into_boxed_slice();

      debug!(
         storage_size,
         capacity = storage_size.saturating_sub(1),
         "allocated spsc ring"
      );

      Self {
         write: CachePadded::new(AtomicUsize::new(0)),
         read : CachePadded::new(AtomicUsize::new(0)),
         storage_size,
         buffer: NonNull::from(Box::leak(slots)).cast(),
         owns_buffer: true,
      }
   }

   #[inline]
   fn slot(&self, i: usize) -> &Slot<T> {
      debug_assert!(i < self.storage_size);
      unsafe { &*self.buffer.as_ptr().add(i) }
   }

   /// Wraparound successor of a cursor. Callers guarantee `storage_size > 0`.
   #[inline]
   fn next(&self, i: usize) -> usize {
      let n = i + 1;
      if n == self.storage_size { 0 } else { n }
   }
}

/*──────────────  shared-memory in-place constructor  ──────────────────────*/

impl<T: Send + 'static> SpscRing<T> {
   fn shared_layout(storage_size: usize) -> (Layout, usize) {
      let layout = Layout::array::<Slot<T>>(storage_size)
         .and_then(|slots| Layout::new::<Self>().extend(slots));
      match layout {
         Ok(pair) => pair,
         Err(_) => panic!("storage size {storage_size} does not fit a shared layout"),
      }
   }

   /// Bytes required for header + `storage_size` slots.
   pub fn shared_size(storage_size: usize) -> usize {
      Self::shared_layout(storage_size).0.pad_to_align().size()
   }

   /// # Safety
   /// `mem` must point to a writable, process-shared mapping of at least
   /// `shared_size(storage_size)` bytes, aligned for `Self`, which outlives
   /// every use of the returned reference. The ring does not own that
   /// memory and never frees it.
   pub unsafe fn init_in_shared(mem: *mut u8, storage_size: usize) -> &'static mut Self {
      assert!(!mem.is_null(), "shared memory pointer is null");
      let (layout, offset) = Self::shared_layout(storage_size);
      debug_assert_eq!(mem as usize % layout.align(), 0);

      // Slots are MaybeUninit: nothing to initialise.
      let header = mem.cast::<Self>();
      let slots = mem.add(offset).cast::<Slot<T>>();

      header.write(Self {
         write: CachePadded::new(AtomicUsize::new(0)),
         read : CachePadded::new(AtomicUsize::new(0)),
         storage_size,
         buffer: NonNull::new_unchecked(slots),
         owns_buffer: false,
      });

      debug!(storage_size, bytes = layout.size(), "placed spsc ring in shared memory");
      &mut *header
   }
}

/*──────────────────────────── accessors ───────────────────────────────────*/

impl<T: Send + 'static> SpscRing<T> {
   /// Live element count from an Acquire snapshot of both cursors.
   ///
   /// The two loads are not one transaction, so under concurrent push/pop
   /// this is approximate, but it always lies in `[0, capacity()]`.
   pub fn size(&self) -> usize {
      let write = self.write.load(Ordering::Acquire);
      let read = self.read.load(Ordering::Acquire);
      if write >= read {
         write - read
      } else {
         self.storage_size - read + write
      }
   }

   /// Usable capacity: `storage_size - 1`, or 0 for an empty storage block.
   #[inline]
   pub fn capacity(&self) -> usize {
      self.storage_size.saturating_sub(1)
   }

   #[inline]
   pub fn storage_size(&self) -> usize {
      self.storage_size
   }

   pub fn is_empty(&self) -> bool {
      self.size() == 0
   }

   pub fn is_full(&self) -> bool {
      self.size() == self.capacity()
   }
}

/*──────────────────────────── queue operations ────────────────────────────*/

impl<T: Send + 'static> SpscQueue<T> for SpscRing<T> {
   type PushError = PushError<T>;
   type PopError  = PopError;

   #[inline]
   fn push(&self, item: T) -> Result<(), PushError<T>> {
      if self.storage_size == 0 {
         return Err(PushError(item));
      }

      // own cursor: only this thread ever stores it
      let write = self.write.load(Ordering::Relaxed);
      let next = self.next(write);

      // pairs with the consumer's Release store of `read`
      let read = self.read.load(Ordering::Acquire);
      if next == read {
         return Err(PushError(item));
      }

      // the consumer is done with this slot until `write` moves past it
      unsafe { (*self.slot(write).get()).write(item) };

      self.write.store(next, Ordering::Release);
      Ok(())
   }

   #[inline]
   fn pop(&self) -> Result<T, PopError> {
      let read = self.read.load(Ordering::Relaxed);

      // pairs with the producer's Release store of `write`
      let write = self.write.load(Ordering::Acquire);
      if read == write {
         return Err(PopError);
      }

      // initialised by the push that published `write` past this index
      let item = unsafe { (*self.slot(read).get()).assume_init_read() };

      self.read.store(self.next(read), Ordering::Release);
      Ok(item)
   }

   #[inline]
   fn available(&self) -> bool {
      !self.is_full()
   }

   #[inline]
   fn empty(&self) -> bool {
      self.is_empty()
   }
}

impl<T: Send + 'static> Drop for SpscRing<T> {
   fn drop(&mut self) {
      let write = *self.write.get_mut();
      let mut read = *self.read.get_mut();
      while read != write {
         unsafe { ptr::drop_in_place((*self.slot(read).get()).as_mut_ptr()) };
         read = self.next(read);
      }

      if self.owns_buffer {
         let slots = ptr::slice_from_raw_parts_mut(self.buffer.as_ptr(), self.storage_size);
         unsafe { drop(Box::from_raw(slots)) };
      }
   }
}

impl<T: Send + 'static> fmt::Debug for SpscRing<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("SpscRing")
         .field("storage_size", &self.storage_size)
         .field("size", &self.size())
         .field("owns_buffer", &self.owns_buffer)
         .finish()
   }
}
