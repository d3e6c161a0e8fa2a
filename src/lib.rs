mod error;
pub mod conn;
pub mod proto;
pub mod servo;
pub mod sim;
pub mod util;

pub use error::*;
