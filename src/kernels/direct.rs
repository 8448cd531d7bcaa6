//! Straightforward time-domain kernels: delay-and-sum with linear
//! interpolation, weighted line arithmetic and the two delay-line
//! resamplers.

use crate::common::buf::Frame;
use crate::common::error::{BftError, BftResult};
use crate::lines::domain::{ApodizationLine, FocusLine, FocusTarget};
use crate::resample::domain::{DelayFraming, DelayTable, FilterBank};
use crate::session::domain::SystemParameters;
use crate::transducer::domain::Point3D;

use super::BeamKernels;

#[derive(Copy, Clone, Debug, Default)]
pub struct DirectKernels;

/// Receive focusing resolved for one output sample.
enum Focal<'a> {
    /// Element offsets are zero.
    Direct,
    /// Explicit per-element delays [s].
    Delays(&'a [f64]),
    /// Focal point, delays relative to the line center.
    Point(Point3D),
    /// Focal point, absolute two-way flight time from `transmit`.
    Absolute { point: Point3D, transmit: Point3D },
}

impl DirectKernels {
    fn focal<'a>(
        sys: &SystemParameters,
        focus: &'a FocusLine,
        elements: usize,
        k: usize,
        t: f64,
        transmit: Option<Point3D>,
    ) -> Focal<'a> {
        if let FocusTarget::Pixels(points) = &focus.target {
            return match points.get(k) {
                Some(&point) => Focal::Absolute {
                    point,
                    transmit: transmit.unwrap_or(focus.center),
                },
                None => Focal::Direct,
            };
        }

        let point = if let Some(dynamic) = focus.dynamic {
            let depth = sys.sound_speed * t / 2.0;
            Some(focus.center.add(&dynamic.direction().scale(depth)))
        } else {
            match &focus.target {
                FocusTarget::Points(points) => points.get(focus.zone(t)).copied(),
                FocusTarget::Delays(delays) => {
                    let z = focus.zone(t);
                    return delays
                        .get(z * elements..(z + 1) * elements)
                        .map_or(Focal::Direct, Focal::Delays);
                }
                _ => None,
            }
        };

        match (point, transmit) {
            (Some(point), Some(transmit)) => Focal::Absolute { point, transmit },
            (Some(point), None) => Focal::Point(point),
            (None, _) => Focal::Direct,
        }
    }
}

impl BeamKernels for DirectKernels {
    fn beamform_line(
        &self,
        sys: &SystemParameters,
        focus: &FocusLine,
        apo: &ApodizationLine,
        rf: &Frame<'_>,
        start_time: f64,
        transmit: Option<Point3D>,
        out: &mut [f64],
    ) -> BftResult<()> {
        let n = rf.rows();
        if !focus.elements.is_empty() && focus.elements.len() != n {
            return Err(BftError::ElementCountMismatch {
                expected: focus.elements.len(),
                actual: n,
            });
        }
        if apo.is_set() && apo.elements != n {
            return Err(BftError::ElementCountMismatch {
                expected: apo.elements,
                actual: n,
            });
        }

        let fs = sys.sampling_frequency;
        let c = sys.sound_speed;
        let element = |e: usize| focus.elements.get(e).copied().unwrap_or(focus.center);

        for (k, sample) in out.iter_mut().enumerate() {
            let mut t = start_time + k as f64 / fs;
            let focal = Self::focal(sys, focus, n, k, t, transmit);
            if let Focal::Absolute { point, transmit } = &focal {
                if focus.is_pixel() {
                    t = (point.distance(transmit) + point.distance(&focus.center)) / c;
                }
            }

            let mut acc = 0.0;
            for e in 0..n {
                let pos = match &focal {
                    Focal::Direct => k as f64,
                    Focal::Delays(delays) => k as f64 + delays[e] * fs,
                    Focal::Point(point) => {
                        let offset = point.distance(&element(e)) - point.distance(&focus.center);
                        k as f64 + offset / c * fs
                    }
                    Focal::Absolute { point, transmit } => {
                        let tau = (point.distance(transmit) + point.distance(&element(e))) / c;
                        (tau - start_time) * fs
                    }
                };
                acc += apo.weight(e, t) * interpolate(rf.row(e), pos);
            }
            *sample = acc;
        }
        Ok(())
    }

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
    ) {
        let fs = sys.sampling_frequency;
        for (k, ((o, a), b)) in out.iter_mut().zip(line1).zip(line2).enumerate() {
            let t = start_time + k as f64 / fs;
            *o = apo.weight(element1, t) * a + apo.weight(element2, t) * b;
        }
    }

    fn accumulate_line(
        &self,
        sys: &SystemParameters,
        apo: &ApodizationLine,
        hi: &mut [f64],
        lo: &[f64],
        element: usize,
        start_time: f64,
        sign: f64,
    ) {
        let fs = sys.sampling_frequency;
        for (k, (h, l)) in hi.iter_mut().zip(lo).enumerate() {
            let t = start_time + k as f64 / fs;
            *h += sign * apo.weight(element, t) * l;
        }
    }

    fn delay_filter(
        &self,
        sys: &SystemParameters,
        bank: &FilterBank,
        table: &DelayTable<'_>,
        src: &[f64],
        framing: &DelayFraming,
    ) -> Vec<f64> {
        let banks = bank.banks();
        let center = bank.center_tap() as i64;
        (0..framing.dest_len)
            .map(|j| {
                let pos = source_position(sys, table, framing, j);
                if !pos.is_finite() {
                    return 0.0;
                }
                let base = pos.floor();
                let mut index = base as i64;
                let mut b = ((pos - base) * banks as f64).round() as usize;
                if b >= banks {
                    b = 0;
                    index = index.saturating_add(1);
                }
                bank.bank(b)
                    .iter()
                    .enumerate()
                    .map(|(k, h)| {
                        h * sample_at(src, index.saturating_add(k as i64).saturating_sub(center))
                    })
                    .sum()
            })
            .collect()
    }

    fn delay_linear(
        &self,
        sys: &SystemParameters,
        table: &DelayTable<'_>,
        src: &[f64],
        framing: &DelayFraming,
    ) -> Vec<f64> {
        (0..framing.dest_len)
            .map(|j| interpolate(src, source_position(sys, table, framing, j)))
            .collect()
    }
}

/// Fractional source index read by destination sample `j`.
fn source_position(
    sys: &SystemParameters,
    table: &DelayTable<'_>,
    framing: &DelayFraming,
    j: usize,
) -> f64 {
    let fs = sys.sampling_frequency;
    let t = framing.dest_start_time + j as f64 / fs;
    j as f64 + (framing.dest_start_time - framing.src_start_time + table.at(t)) * fs
}

fn sample_at(src: &[f64], index: i64) -> f64 {
    if index < 0 {
        return 0.0;
    }
    src.get(index as usize).copied().unwrap_or(0.0)
}

/// Linear interpolation at fractional index `pos`; zero outside `src`.
fn interpolate(src: &[f64], pos: f64) -> f64 {
    if !pos.is_finite() || pos < 0.0 {
        return 0.0;
    }
    let base = pos.floor();
    let index = base as usize;
    let Some(&s0) = src.get(index) else {
        return 0.0;
    };
    let frac = pos - base;
    if frac == 0.0 {
        return s0;
    }
    let s1 = src.get(index + 1).copied().unwrap_or(0.0);
    s0 + frac * (s1 - s0)
}
