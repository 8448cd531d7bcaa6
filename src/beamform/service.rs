//! Beamforming dispatch: splits the RF buffer into per-element rows, runs
//! the kernel for every focus line and assembles one line-major image.

use crate::common::buf::{Frame, Image};
use crate::common::error::{BftError, BftResult};
use crate::kernels::BeamKernels;
use crate::lines::domain::FocusLine;
use crate::session::domain::SessionState;
use crate::transducer::domain::Point3D;

/// Where the transmitted wave originates, for synthetic transmit aperture
/// beamforming.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum Transmit {
    /// Plain receive focusing.
    #[default]
    None,
    /// Transmit from this element of the focusing transducer.
    Element(usize),
    /// Transmit from an explicit point.
    Origin(Point3D),
}

impl Transmit {
    /// Combine the two optional inputs of the C boundary; supplying both is
    /// ambiguous.
    pub fn from_parts(element: Option<usize>, origin: Option<Point3D>) -> BftResult<Self> {
        match (element, origin) {
            (Some(_), Some(_)) => Err(BftError::invalid(
                "either choose element index, or transmit position",
            )),
            (Some(e), None) => Ok(Transmit::Element(e)),
            (None, Some(p)) => Ok(Transmit::Origin(p)),
            (None, None) => Ok(Transmit::None),
        }
    }

    fn resolve(&self, line: &FocusLine) -> BftResult<Option<Point3D>> {
        match *self {
            Transmit::None => Ok(None),
            Transmit::Origin(p) => Ok(Some(p)),
            Transmit::Element(e) => line.elements.get(e).copied().map(Some).ok_or_else(|| {
                BftError::invalid(format!(
                    "transmit element {e} not in a {}-element aperture",
                    line.elements.len()
                ))
            }),
        }
    }
}

/// Number of samples per output line. A single pixel-mode line dictates
/// its own sample count; pixel lines mixed with other lines are rejected.
pub fn output_samples(state: &SessionState, samples: usize) -> BftResult<usize> {
    let lines = state.focus.len();
    let pixel_lines = state.focus.pixel_lines();
    match (lines, pixel_lines) {
        (_, 0) => Ok(samples),
        (1, 1) => Ok(state.focus.lines.get(0)?.sample_count()),
        _ => Err(BftError::PixelModeConflict { lines: pixel_lines }),
    }
}

/// Beamform `rf` (`elements` rows of `samples` samples) into one image of
/// `line count x output samples`.
#[tracing::instrument(skip(state, kernels, rf), fields(lines = state.focus.len()))]
pub fn beamform(
    state: &SessionState,
    kernels: &dyn BeamKernels,
    rf: &[f64],
    start_time: f64,
    samples: usize,
    elements: usize,
    transmit: Transmit,
) -> BftResult<Image> {
    let frame = Frame::new(rf, elements, samples)?;
    let out_samples = output_samples(state, samples)?;
    let mut image = Image::zeroed(state.focus.len(), out_samples)?;

    for (i, line) in state.focus.lines.iter().enumerate() {
        let apo = state.apo.get(i)?;
        let origin = transmit.resolve(line)?;
        kernels.beamform_line(
            &state.params,
            line,
            apo,
            &frame,
            start_time,
            origin,
            image.line_mut(i),
        )?;
    }
    Ok(image)
}
