//! Numeric kernels called by the orchestration layer.
//!
//! The session only decides which kernel runs on which line and with what
//! framing. [`BeamKernels`] is that contract; [`DirectKernels`] is the
//! implementation a session uses unless another one is installed.

pub mod direct;

use crate::common::buf::Frame;
use crate::common::error::BftResult;
use crate::lines::domain::{ApodizationLine, FocusLine};
use crate::resample::domain::{DelayFraming, DelayTable, FilterBank};
use crate::session::domain::SystemParameters;
use crate::transducer::domain::Point3D;

pub use direct::DirectKernels;

pub trait BeamKernels {
    /// Delay-and-sum one scanline of `rf` (one row per element) into `out`.
    #[allow(clippy::too_many_arguments)]
    fn beamform_line(
        &self,
        sys: &SystemParameters,
        focus: &FocusLine,
        apo: &ApodizationLine,
        rf: &Frame<'_>,
        start_time: f64,
        transmit: Option<Point3D>,
        out: &mut [f64],
    ) -> BftResult<()>;

    /// Combine two focused lines acquired with transmit elements
    /// `element1` and `element2`.
    #[allow(clippy::too_many_arguments)]
    fn sum_lines(
        &self,
        sys: &SystemParameters,
        apo: &ApodizationLine,
        line1: &[f64],
        element1: usize,
        line2: &[f64],
        element2: usize,
        start_time: f64,
        out: &mut [f64],
    );

    /// `hi += sign * w(element, t) * lo`, sample by sample.
    #[allow(clippy::too_many_arguments)]
    fn accumulate_line(
        &self,
        sys: &SystemParameters,
        apo: &ApodizationLine,
        hi: &mut [f64],
        lo: &[f64],
        element: usize,
        start_time: f64,
        sign: f64,
    );

    fn delay_filter(
        &self,
        sys: &SystemParameters,
        bank: &FilterBank,
        table: &DelayTable<'_>,
        src: &[f64],
        framing: &DelayFraming,
    ) -> Vec<f64>;

    fn delay_linear(
        &self,
        sys: &SystemParameters,
        table: &DelayTable<'_>,
        src: &[f64],
        framing: &DelayFraming,
    ) -> Vec<f64>;
}
