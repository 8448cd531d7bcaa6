//! Image arithmetic across matched line collections.
//!
//! Every buffer is `line count x samples`, one row per focus line in line
//! order. The line count always comes from the session.

use crate::common::buf::{Frame, FrameMut, Image};
use crate::common::error::BftResult;
use crate::kernels::BeamKernels;
use crate::lines::domain::ApodizationLineCollection;
use crate::session::domain::SessionState;

/// Combine two low-resolution images acquired with transmit elements
/// `element1` and `element2` into one high-resolution image.
#[allow(clippy::too_many_arguments)]
pub fn sum_images(
    state: &SessionState,
    kernels: &dyn BeamKernels,
    data1: &[f64],
    element1: usize,
    data2: &[f64],
    element2: usize,
    start_time: f64,
    samples: usize,
) -> BftResult<Image> {
    let lines = state.line_count();
    let image1 = Frame::new(data1, lines, samples)?;
    let image2 = Frame::new(data2, lines, samples)?;
    let mut out = Image::zeroed(lines, samples)?;

    for i in 0..lines {
        kernels.sum_lines(
            &state.params,
            state.apo.get(i)?,
            image1.row(i),
            element1,
            image2.row(i),
            element2,
            start_time,
            out.line_mut(i),
        );
    }
    Ok(out)
}

/// Add `lo_res` into `hi_res` in place, weighted by the summation
/// apodization.
pub fn add_images(
    state: &SessionState,
    kernels: &dyn BeamKernels,
    hi_res: &mut [f64],
    lo_res: &[f64],
    samples: usize,
    start_time: f64,
    element: usize,
) -> BftResult<()> {
    accumulate(
        state,
        kernels,
        &state.sum_apo,
        hi_res,
        lo_res,
        samples,
        start_time,
        element,
        1.0,
    )
}

/// Subtract `lo_res` from `hi_res` in place, weighted by the primary
/// apodization.
pub fn sub_images(
    state: &SessionState,
    kernels: &dyn BeamKernels,
    hi_res: &mut [f64],
    lo_res: &[f64],
    samples: usize,
    start_time: f64,
    element: usize,
) -> BftResult<()> {
    accumulate(
        state,
        kernels,
        &state.apo,
        hi_res,
        lo_res,
        samples,
        start_time,
        element,
        -1.0,
    )
}

#[allow(clippy::too_many_arguments)]
fn accumulate(
    state: &SessionState,
    kernels: &dyn BeamKernels,
    apo: &ApodizationLineCollection,
    hi_res: &mut [f64],
    lo_res: &[f64],
    samples: usize,
    start_time: f64,
    element: usize,
    sign: f64,
) -> BftResult<()> {
    let lines = state.line_count();
    let mut hi = FrameMut::new(hi_res, lines, samples)?;
    let lo = Frame::new(lo_res, lines, samples)?;

    for i in 0..hi.rows() {
        kernels.accumulate_line(
            &state.params,
            apo.get(i)?,
            hi.row_mut(i),
            lo.row(i),
            element,
            start_time,
            sign,
        );
    }
    Ok(())
}
