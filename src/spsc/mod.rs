mod ring;
mod handle;

pub use ring::{PopError, PushError, SpscRing};
pub use handle::{channel, Consumer, Producer};
