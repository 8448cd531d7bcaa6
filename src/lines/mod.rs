//! Focus, apodization and summation-apodization line collections.
//!
//! The three collections always hold the same number of lines; the session
//! resizes them together.

pub mod domain;

pub use domain::{
    ApodizationLine, ApodizationLineCollection, DynamicFocus, FocusLine, FocusLineCollection,
    FocusTarget, LineCollection,
};
