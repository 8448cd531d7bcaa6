//! Delay-line resampling: strategy selection and argument framing.

pub mod domain;
pub mod service;

pub use domain::{DelayFraming, DelayTable, FilterBank, ResampleMethod};
