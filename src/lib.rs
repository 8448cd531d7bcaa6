// lib.rs - beamforming toolbox session layer
pub mod api;
pub mod beamform;
pub mod common;
pub mod image;
pub mod kernels;
pub mod lines;
pub mod resample;
pub mod session;
pub mod transducer;

pub use beamform::Transmit;
pub use common::{BftCode, BftError, BftResult};
pub use kernels::{BeamKernels, DirectKernels};
pub use resample::domain::{DelayFraming, FilterBank, ResampleMethod};
pub use session::BeamformingSession;
pub use transducer::{Point3D, Transducer};
