//! Transducer geometry consumed by the focusing and apodization setters.
//!
//! Handles are owned by the caller; the session only remembers which ones
//! it handed out.

pub mod domain;

pub use domain::{Point3D, Transducer, TransducerId};
