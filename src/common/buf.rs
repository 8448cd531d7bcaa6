//! Strided views over flat sample buffers and the owned output image.
//!
//! Callers hand over one contiguous buffer per acquisition. The views below
//! split it into equally long rows (one per element or per scanline) after
//! checking the shape once, so the kernels only ever see slices.

use crate::common::error::{BftError, BftResult};

/// Read-only `rows x cols` view over a contiguous buffer.
#[derive(Copy, Clone, Debug)]
pub struct Frame<'a> {
    data: &'a [f64],
    rows: usize,
    cols: usize,
}

impl<'a> Frame<'a> {
    pub fn new(data: &'a [f64], rows: usize, cols: usize) -> BftResult<Self> {
        let expected = checked_len(rows, cols)?;
        if data.len() != expected {
            return Err(BftError::shape("frame", expected, data.len()));
        }
        Ok(Self { data, rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Row `i`, i.e. the slice at offset `i * cols`.
    pub fn row(&self, i: usize) -> &'a [f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
}

/// Mutable counterpart of [`Frame`], used for in-place image arithmetic.
#[derive(Debug)]
pub struct FrameMut<'a> {
    data: &'a mut [f64],
    rows: usize,
    cols: usize,
}

impl<'a> FrameMut<'a> {
    pub fn new(data: &'a mut [f64], rows: usize, cols: usize) -> BftResult<Self> {
        let expected = checked_len(rows, cols)?;
        if data.len() != expected {
            return Err(BftError::shape("frame", expected, data.len()));
        }
        Ok(Self { data, rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }
}

/// Owned, contiguous `lines x samples` result, line-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    lines: usize,
    samples: usize,
    data: Vec<f64>,
}

impl Image {
    /// Zero-filled image ready to be written line by line.
    pub fn zeroed(lines: usize, samples: usize) -> BftResult<Self> {
        let len = checked_len(lines, samples)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| BftError::Allocation("output image"))?;
        data.resize(len, 0.0);
        Ok(Self {
            lines,
            samples,
            data,
        })
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn line(&self, i: usize) -> &[f64] {
        &self.data[i * self.samples..(i + 1) * self.samples]
    }

    pub fn line_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.samples..(i + 1) * self.samples]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

pub(crate) fn checked_len(rows: usize, cols: usize) -> BftResult<usize> {
    rows.checked_mul(cols)
        .ok_or_else(|| BftError::invalid(format!("{rows} x {cols} buffer size overflow")))
}
