//! Per-scanline focusing and apodization records and the collections that
//! hold them.

use crate::common::error::{BftError, BftResult};
use crate::resample::domain::FilterBank;
use crate::transducer::domain::{Point3D, Transducer};

/// How the receive delays of a focus line are obtained.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FocusTarget {
    /// Nothing set: all elements are summed without delay.
    #[default]
    Unfocused,
    /// One focal point per time zone.
    Points(Vec<Point3D>),
    /// Explicit delays, one row of `elements` values per time zone.
    Delays(Vec<f64>),
    /// Pixel mode: one output sample per listed point.
    Pixels(Vec<Point3D>),
}

/// Direction of dynamic receive focusing, angles in radians.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DynamicFocus {
    pub dir_xz: f64,
    pub dir_yz: f64,
}

impl DynamicFocus {
    /// Unit vector along the focusing direction.
    pub fn direction(&self) -> Point3D {
        let v = Point3D::new(self.dir_xz.tan(), self.dir_yz.tan(), 1.0);
        let norm = v.distance(&Point3D::default());
        v.scale(1.0 / norm)
    }
}

/// Focusing settings of one scanline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FocusLine {
    /// Line origin and reference point for the delays.
    pub center: Point3D,
    /// Start times of the focal zones.
    pub times: Vec<f64>,
    pub target: FocusTarget,
    /// Element centers captured when the focus was set.
    pub elements: Vec<Point3D>,
    pub dynamic: Option<DynamicFocus>,
}

impl FocusLine {
    pub fn is_pixel(&self) -> bool {
        matches!(self.target, FocusTarget::Pixels(_))
    }

    /// Samples this line produces in pixel mode, zones otherwise.
    pub fn sample_count(&self) -> usize {
        match &self.target {
            FocusTarget::Pixels(points) => points.len(),
            _ => self.times.len(),
        }
    }

    pub fn set_center(&mut self, point: Point3D) {
        self.center = point;
    }

    pub fn set_points(&mut self, xdc: &Transducer, times: &[f64], points: Vec<Point3D>) -> BftResult<()> {
        check_times(times)?;
        if points.len() != times.len() {
            return Err(BftError::shape("focus points", times.len(), points.len()));
        }
        self.times = times.to_vec();
        self.target = FocusTarget::Points(points);
        self.elements = xdc.centers().to_vec();
        Ok(())
    }

    pub fn set_delays(&mut self, xdc: &Transducer, times: &[f64], delays: &[f64]) -> BftResult<()> {
        check_times(times)?;
        let expected = times.len() * xdc.elements();
        if delays.len() != expected {
            return Err(BftError::shape("focus delays", expected, delays.len()));
        }
        self.times = times.to_vec();
        self.target = FocusTarget::Delays(delays.to_vec());
        self.elements = xdc.centers().to_vec();
        Ok(())
    }

    /// Switch the line to pixel mode. Time zones and dynamic focusing are
    /// dropped since each output sample has its own focal point.
    pub fn set_pixels(&mut self, xdc: &Transducer, points: Vec<Point3D>) {
        self.times.clear();
        self.dynamic = None;
        self.target = FocusTarget::Pixels(points);
        self.elements = xdc.centers().to_vec();
    }

    pub fn set_dynamic(&mut self, xdc: &Transducer, dynamic: DynamicFocus) {
        if self.is_pixel() {
            self.target = FocusTarget::Unfocused;
        }
        self.dynamic = Some(dynamic);
        self.elements = xdc.centers().to_vec();
    }

    /// Index of the zone active at time `t`.
    pub fn zone(&self, t: f64) -> usize {
        zone(&self.times, t)
    }
}

/// Amplitude weights of one scanline, one row of `elements` values per zone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApodizationLine {
    pub times: Vec<f64>,
    pub weights: Vec<f64>,
    pub elements: usize,
}

impl ApodizationLine {
    pub fn set(&mut self, xdc: &Transducer, times: &[f64], weights: &[f64]) -> BftResult<()> {
        check_times(times)?;
        let expected = times.len() * xdc.elements();
        if weights.len() != expected {
            return Err(BftError::shape("apodization weights", expected, weights.len()));
        }
        self.times = times.to_vec();
        self.weights = weights.to_vec();
        self.elements = xdc.elements();
        Ok(())
    }

    pub fn sample_count(&self) -> usize {
        self.times.len()
    }

    pub fn is_set(&self) -> bool {
        !self.times.is_empty()
    }

    /// Weight of `element` at time `t`; unset lines and uncovered
    /// elements weigh 1.
    pub fn weight(&self, element: usize, t: f64) -> f64 {
        if !self.is_set() || element >= self.elements {
            return 1.0;
        }
        self.weights[zone(&self.times, t) * self.elements + element]
    }
}

/// Ordered, resizable collection of per-line records.
#[derive(Clone, Debug, PartialEq)]
pub struct LineCollection<T> {
    lines: Vec<T>,
}

impl<T: Default> LineCollection<T> {
    /// Collection of `count` default lines.
    pub fn with_lines(count: usize) -> Self {
        let mut lines = Vec::with_capacity(count);
        lines.resize_with(count, T::default);
        Self { lines }
    }

    /// Grow with default lines or drop trailing ones.
    pub fn resize(&mut self, count: usize) {
        self.lines.resize_with(count, T::default);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line `index`, or [`BftError::LineOutOfRange`].
    pub fn get(&self, index: usize) -> BftResult<&T> {
        let count = self.lines.len();
        self.lines
            .get(index)
            .ok_or(BftError::LineOutOfRange { index, count })
    }

    /// Mutable line `index`, or [`BftError::LineOutOfRange`].
    pub fn get_mut(&mut self, index: usize) -> BftResult<&mut T> {
        let count = self.lines.len();
        self.lines
            .get_mut(index)
            .ok_or(BftError::LineOutOfRange { index, count })
    }

    /// Lines in scan order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.lines.iter()
    }
}

pub type ApodizationLineCollection = LineCollection<ApodizationLine>;

/// Focus lines plus the filter bank shared by all of them.
#[derive(Clone, Debug, PartialEq)]
pub struct FocusLineCollection {
    pub lines: LineCollection<FocusLine>,
    pub filter_bank: Option<FilterBank>,
}

impl FocusLineCollection {
    pub fn with_lines(count: usize) -> Self {
        Self {
            lines: LineCollection::with_lines(count),
            filter_bank: None,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn pixel_lines(&self) -> usize {
        self.lines.iter().filter(|line| line.is_pixel()).count()
    }
}

fn check_times(times: &[f64]) -> BftResult<()> {
    if times.windows(2).any(|w| w[1] < w[0]) {
        return Err(BftError::invalid("zone times must be non-decreasing"));
    }
    Ok(())
}

fn zone(times: &[f64], t: f64) -> usize {
    times.partition_point(|&x| x <= t).saturating_sub(1)
}
