//! Synthetic-aperture image combination: sum, add and subtract.

pub mod service;

pub use service::{add_images, sub_images, sum_images};
