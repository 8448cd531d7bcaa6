//! Delay-line resampling dispatch.

use crate::common::error::{BftError, BftResult};
use crate::kernels::BeamKernels;
use crate::session::domain::SessionState;

use super::domain::{DelayFraming, DelayTable, ResampleMethod};

/// Resample `src` onto the destination framing, applying the delay curve
/// given by `(times, delays)`.
pub fn delay(
    state: &SessionState,
    kernels: &dyn BeamKernels,
    src: &[f64],
    times: &[f64],
    delays: &[f64],
    framing: DelayFraming,
    method: ResampleMethod,
) -> BftResult<Vec<f64>> {
    let table = DelayTable::new(times, delays)?;
    tracing::debug!(
        ?method,
        src_len = src.len(),
        dest_len = framing.dest_len,
        "resampling delay line"
    );

    let out = match method {
        ResampleMethod::FilterBank => {
            let bank = state
                .focus
                .filter_bank
                .as_ref()
                .ok_or(BftError::MissingFilterBank)?;
            kernels.delay_filter(&state.params, bank, &table, src, &framing)
        }
        ResampleMethod::Linear => kernels.delay_linear(&state.params, &table, src, &framing),
    };
    Ok(out)
}
