//! Public entry points for foreign function interfaces.

pub mod buffers;
pub mod ffi;
