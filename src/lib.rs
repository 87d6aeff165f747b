pub mod spsc;
pub mod shm;

pub use spsc::SpscRing;
pub use spsc::{channel, Consumer, Producer};
pub use spsc::{PopError, PushError};
pub use shm::{SharedMapping, ShmError};

/// Common interface for bounded SPSC queues.
pub trait SpscQueue<T: Send>: Send + 'static {
    /// Error on push when the queue is full.
    type PushError;
    /// Error on pop when the queue is empty.
    type PopError;

    /// Producer side only.
    fn push(&self, item: T) -> Result<(), Self::PushError>;
    /// Consumer side only.
    fn pop(&self) -> Result<T, Self::PopError>;

    /// True when a subsequent `push` *may* succeed.
    fn available(&self) -> bool;
    /// True when a subsequent `pop` will fail.
    fn empty(&self) -> bool;
}
