pub(crate) mod chan;
pub(crate) mod macros;
pub mod scale;
