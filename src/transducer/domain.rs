//! Array geometry: element centers in 3D and the transducer handle.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::error::{BftError, BftResult};

/// Point in 3D space, SI units.
///
/// `repr(C)` so the host's flat `[x0, y0, z0, x1, ...]` buffers map onto it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn add(&self, other: &Point3D) -> Point3D {
        Point3D::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(&self, s: f64) -> Point3D {
        Point3D::new(self.x * s, self.y * s, self.z * s)
    }

    /// Read `count` points from a flat coordinate buffer.
    pub fn from_flat(coords: &[f64], count: usize) -> BftResult<Vec<Point3D>> {
        let expected = count
            .checked_mul(3)
            .ok_or_else(|| BftError::invalid("point count overflow"))?;
        if coords.len() != expected {
            return Err(BftError::shape("point coordinates", expected, coords.len()));
        }
        Ok(coords
            .chunks_exact(3)
            .map(|c| Point3D::new(c[0], c[1], c[2]))
            .collect())
    }
}

/// Opaque identifier used by the session to track open handles.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TransducerId(u64);

impl TransducerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Transducer definition. The element count is fixed at creation.
#[derive(Clone, Debug, PartialEq)]
pub struct Transducer {
    id: TransducerId,
    centers: Vec<Point3D>,
}

impl Transducer {
    /// Create a transducer from a flat buffer of `elements` centers.
    pub fn new(centers: &[f64], elements: usize) -> BftResult<Self> {
        if elements == 0 {
            return Err(BftError::invalid("a transducer needs at least one element"));
        }
        Ok(Self::from_points(Point3D::from_flat(centers, elements)?))
    }

    pub fn from_points(centers: Vec<Point3D>) -> Self {
        Self {
            id: TransducerId::next(),
            centers,
        }
    }

    /// Linear array along x, centered on the origin.
    pub fn linear_array(elements: usize, pitch: f64) -> Self {
        let mid = (elements as f64 - 1.0) / 2.0;
        let centers = (0..elements)
            .map(|i| Point3D::new((i as f64 - mid) * pitch, 0.0, 0.0))
            .collect();
        Self::from_points(centers)
    }

    /// Convex array on an arc of radius `radius`, apex at `z = 0`.
    pub fn convex_array(elements: usize, pitch: f64, radius: f64) -> Self {
        let mid = (elements as f64 - 1.0) / 2.0;
        let mut centers: Vec<Point3D> = (0..elements)
            .map(|i| {
                let theta = (i as f64 - mid) * pitch / radius;
                Point3D::new(radius * theta.sin(), 0.0, radius * theta.cos())
            })
            .collect();
        let apex = centers.iter().map(|p| p.z).fold(f64::NEG_INFINITY, f64::max);
        for p in &mut centers {
            p.z -= apex;
        }
        Self::from_points(centers)
    }

    pub fn id(&self) -> TransducerId {
        self.id
    }

    pub fn elements(&self) -> usize {
        self.centers.len()
    }

    pub fn centers(&self) -> &[Point3D] {
        &self.centers
    }

    /// Replace the element centers in place; the element count must not change.
    pub fn replace_centers(&mut self, centers: &[f64], elements: usize) -> BftResult<()> {
        if elements != self.centers.len() {
            return Err(BftError::ElementCountMismatch {
                expected: self.centers.len(),
                actual: elements,
            });
        }
        self.centers = Point3D::from_flat(centers, elements)?;
        Ok(())
    }
}
