//! Delay-line resampling types: strategy tag, time framing, delay table and
//! the fractional-delay filter bank.

use crate::common::error::{BftError, BftResult};

/// Resampling strategy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResampleMethod {
    /// Fractional-delay filtering with the attached filter bank.
    FilterBank,
    /// Linear interpolation between neighbouring source samples.
    Linear,
}

impl ResampleMethod {
    /// Map the C boundary's integer code: `0` selects the filter bank,
    /// anything else linear interpolation.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ResampleMethod::FilterBank,
            _ => ResampleMethod::Linear,
        }
    }
}

/// Time framing of the source and destination sample streams.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DelayFraming {
    /// Time of the first source sample.
    pub src_start_time: f64,
    /// Time of the first destination sample.
    pub dest_start_time: f64,
    /// Number of destination samples to produce.
    pub dest_len: usize,
}

/// Piecewise-linear delay curve `d(t)` given at sorted `times`.
#[derive(Copy, Clone, Debug)]
pub struct DelayTable<'a> {
    times: &'a [f64],
    delays: &'a [f64],
}

impl<'a> DelayTable<'a> {
    pub fn new(times: &'a [f64], delays: &'a [f64]) -> BftResult<Self> {
        if times.len() != delays.len() {
            return Err(BftError::shape("delays", times.len(), delays.len()));
        }
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(BftError::invalid("delay times must be non-decreasing"));
        }
        Ok(Self { times, delays })
    }

    /// Delay at time `t`, clamped to the first/last entry outside the table.
    /// Empty tables and NaN times give zero.
    pub fn at(&self, t: f64) -> f64 {
        let n = self.times.len();
        if n == 0 || t.is_nan() {
            return 0.0;
        }
        if t <= self.times[0] {
            return self.delays[0];
        }
        if t >= self.times[n - 1] {
            return self.delays[n - 1];
        }
        let hi = self.times.partition_point(|&x| x <= t);
        let lo = hi - 1;
        let span = self.times[hi] - self.times[lo];
        if span <= 0.0 {
            return self.delays[lo];
        }
        let frac = (t - self.times[lo]) / span;
        self.delays[lo] + frac * (self.delays[hi] - self.delays[lo])
    }
}

/// Bank of fractional-delay filters, `banks x taps` coefficients row-major.
///
/// Bank `b` realises a delay of `b / banks` samples. Tap `k` weighs the
/// source sample at offset `k - (taps - 1) / 2` from the integer position.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterBank {
    banks: usize,
    taps: usize,
    coefficients: Vec<f64>,
}

impl FilterBank {
    pub fn new(coefficients: &[f64], banks: usize, taps: usize) -> BftResult<Self> {
        let expected = banks.checked_mul(taps);
        if banks == 0 || taps == 0 || expected != Some(coefficients.len()) {
            return Err(BftError::InvalidFilterBank {
                banks,
                taps,
                len: coefficients.len(),
            });
        }
        Ok(Self {
            banks,
            taps,
            coefficients: coefficients.to_vec(),
        })
    }

    /// Two-tap bank performing linear interpolation.
    pub fn linear(banks: usize) -> BftResult<Self> {
        let banks_f = banks as f64;
        let coefficients: Vec<f64> = (0..banks)
            .flat_map(|b| {
                let frac = b as f64 / banks_f;
                [1.0 - frac, frac]
            })
            .collect();
        Self::new(&coefficients, banks, 2)
    }

    pub fn banks(&self) -> usize {
        self.banks
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    pub fn center_tap(&self) -> usize {
        (self.taps - 1) / 2
    }

    pub fn bank(&self, b: usize) -> &[f64] {
        &self.coefficients[b * self.taps..(b + 1) * self.taps]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_codes() {
        assert_eq!(ResampleMethod::from_code(0), ResampleMethod::FilterBank);
        assert_eq!(ResampleMethod::from_code(1), ResampleMethod::Linear);
        assert_eq!(ResampleMethod::from_code(42), ResampleMethod::Linear);
    }

    #[test]
    fn delay_table_interpolates_and_clamps() {
        let times = [0.0, 1.0, 3.0];
        let delays = [0.0, 2.0, 4.0];
        let table = DelayTable::new(&times, &delays).unwrap();
        assert_eq!(table.at(-1.0), 0.0);
        assert_eq!(table.at(0.5), 1.0);
        assert_eq!(table.at(2.0), 3.0);
        assert_eq!(table.at(10.0), 4.0);
    }

    #[test]
    fn nan_time_reads_zero_delay() {
        let table = DelayTable::new(&[0.0, 1.0], &[0.5, 1.5]).unwrap();
        assert_eq!(table.at(f64::NAN), 0.0);
        assert_eq!(table.at(f64::INFINITY), 1.5);
        assert_eq!(table.at(f64::NEG_INFINITY), 0.5);
    }

    #[test]
    fn empty_delay_table_is_zero() {
        let table = DelayTable::new(&[], &[]).unwrap();
        assert_eq!(table.at(1.0), 0.0);
    }

    #[test]
    fn delay_table_rejects_mismatch_and_unsorted() {
        assert!(DelayTable::new(&[0.0, 1.0], &[0.0]).is_err());
        assert!(DelayTable::new(&[1.0, 0.0], &[0.0, 0.0]).is_err());
    }

    #[test]
    fn filter_bank_requires_matching_length() {
        let err = FilterBank::new(&[1.0; 5], 2, 3).unwrap_err();
        assert_eq!(
            err,
            BftError::InvalidFilterBank {
                banks: 2,
                taps: 3,
                len: 5
            }
        );
        assert!(FilterBank::new(&[], 0, 0).is_err());
    }

    #[test]
    fn linear_bank_layout() {
        let bank = FilterBank::linear(4).unwrap();
        assert_eq!(bank.taps(), 2);
        assert_eq!(bank.center_tap(), 0);
        assert_eq!(bank.bank(0), &[1.0, 0.0]);
        assert_eq!(bank.bank(2), &[0.5, 0.5]);
    }
}
