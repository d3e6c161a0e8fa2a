pub mod mem;
pub mod serial;
pub mod transport;

pub use serial::Serial;
pub use transport::{Tcp, Transport};
