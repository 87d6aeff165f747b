// Typed producer / consumer endpoints over a shared ring.
//
// Each endpoint is `Send` but neither `Clone` nor `Sync`, so there is exactly
// one thread able to push and one able to pop.

use crate::spsc::{PopError, PushError, SpscRing};
use crate::SpscQueue;
use std::{cell::Cell, marker::PhantomData, sync::Arc};

/// Split a fresh ring of `storage_size` slots into its two endpoints.
pub fn channel<T: Send + 'static>(storage_size: usize) -> (Producer<T>, Consumer<T>) {
   let ring = Arc::new(SpscRing::new(storage_size));
   (
      Producer { ring: Arc::clone(&ring), _unsync: PhantomData },
      Consumer { ring, _unsync: PhantomData },
   )
}

#[derive(Debug)]
pub struct Producer<T: Send + 'static> {
   ring: Arc<SpscRing<T>>,
   _unsync: PhantomData<Cell<()>>,
}

impl<T: Send + 'static> Producer<T> {
   #[inline]
   pub fn push(&mut self, item: T) -> Result<(), PushError<T>> {
      self.ring.push(item)
   }

   pub fn size(&self) -> usize {
      self.ring.size()
   }

   pub fn capacity(&self) -> usize {
      self.ring.capacity()
   }

   pub fn is_full(&self) -> bool {
      self.ring.is_full()
   }
}

#[derive(Debug)]
pub struct Consumer<T: Send + 'static> {
   ring: Arc<SpscRing<T>>,
   _unsync: PhantomData<Cell<()>>,
}

impl<T: Send + 'static> Consumer<T> {
   #[inline]
   pub fn pop(&mut self) -> Result<T, PopError> {
      self.ring.pop()
   }

   pub fn size(&self) -> usize {
      self.ring.size()
   }

   pub fn capacity(&self) -> usize {
      self.ring.capacity()
   }

   pub fn is_empty(&self) -> bool {
      self.ring.is_empty()
   }
}
