//! Geometric moments of a pixel set.
//!
//! Raw moments are accumulated relative to a fixed origin so that large sheet
//! coordinates do not eat the precision of third-order sums. Central and
//! normalized moments are translation invariant, hence origin independent.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    origin: (f64, f64),
    m00: f64,
    m10: f64,
    m01: f64,
    m20: f64,
    m11: f64,
    m02: f64,
    m30: f64,
    m21: f64,
    m12: f64,
    m03: f64,
}

/// Scale-invariant central moments plus the first two Hu invariants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMoments {
    pub n20: f64,
    pub n11: f64,
    pub n02: f64,
    pub n30: f64,
    pub n21: f64,
    pub n12: f64,
    pub n03: f64,
    pub hu1: f64,
    pub hu2: f64,
}

impl Moments {
    pub fn with_origin(x: f64, y: f64) -> Self {
        Self {
            origin: (x, y),
            ..Self::default()
        }
    }

    pub fn include_pixel(&mut self, x: usize, y: usize) {
        let x = x as f64 - self.origin.0;
        let y = y as f64 - self.origin.1;
        let (xx, yy) = (x * x, y * y);
        self.m00 += 1.0;
        self.m10 += x;
        self.m01 += y;
        self.m20 += xx;
        self.m11 += x * y;
        self.m02 += yy;
        self.m30 += xx * x;
        self.m21 += xx * y;
        self.m12 += x * yy;
        self.m03 += yy * y;
    }

    /// Pixel count.
    pub fn weight(&self) -> f64 {
        self.m00
    }

    /// Absolute centroid, `None` for an empty set.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        (self.m00 > 0.0).then(|| {
            (
                self.origin.0 + self.m10 / self.m00,
                self.origin.1 + self.m01 / self.m00,
            )
        })
    }

    pub fn normalized(&self) -> NormalizedMoments {
        if self.m00 <= 0.0 {
            return NormalizedMoments::default();
        }
        let n = self.m00;
        let xb = self.m10 / n;
        let yb = self.m01 / n;

        let mu20 = self.m20 - xb * self.m10;
        let mu02 = self.m02 - yb * self.m01;
        let mu11 = self.m11 - xb * self.m01;
        let mu30 = self.m30 - 3.0 * xb * self.m20 + 2.0 * xb * xb * self.m10;
        let mu03 = self.m03 - 3.0 * yb * self.m02 + 2.0 * yb * yb * self.m01;
        let mu21 = self.m21 - 2.0 * xb * self.m11 - yb * self.m20 + 2.0 * xb * xb * self.m01;
        let mu12 = self.m12 - 2.0 * yb * self.m11 - xb * self.m02 + 2.0 * yb * yb * self.m10;

        let second = n * n;
        let third = n.powf(2.5);
        let n20 = mu20 / second;
        let n02 = mu02 / second;
        let n11 = mu11 / second;

        NormalizedMoments {
            n20,
            n11,
            n02,
            n30: mu30 / third,
            n21: mu21 / third,
            n12: mu12 / third,
            n03: mu03 / third,
            hu1: n20 + n02,
            hu2: (n20 - n02).powi(2) + 4.0 * n11 * n11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(at: (usize, usize), side: usize, origin: (f64, f64)) -> Moments {
        let mut m = Moments::with_origin(origin.0, origin.1);
        for y in at.1..at.1 + side {
            for x in at.0..at.0 + side {
                m.include_pixel(x, y);
            }
        }
        m
    }

    #[test]
    fn centroid_of_square() {
        let m = square((10, 20), 3, (0.0, 0.0));
        assert_eq!(m.weight(), 9.0);
        assert_eq!(m.centroid(), Some((11.0, 21.0)));
    }

    #[test]
    fn normalized_moments_ignore_translation_and_origin() {
        let a = square((0, 0), 4, (0.0, 0.0)).normalized();
        let b = square((500, 900), 4, (480.0, 870.0)).normalized();
        assert!((a.n20 - b.n20).abs() < 1e-12);
        assert!((a.hu1 - b.hu1).abs() < 1e-12);
        assert!(a.n11.abs() < 1e-12);
        assert!(a.n30.abs() < 1e-12, "a symmetric square has no skew");
    }

    #[test]
    fn elongation_shows_in_second_order() {
        let mut tall = Moments::default();
        for y in 0..12 {
            tall.include_pixel(0, y);
        }
        let n = tall.normalized();
        assert!(n.n02 > n.n20);
        assert!(n.hu2 > 0.0);
    }

    #[test]
    fn empty_moments_are_zero() {
        assert_eq!(Moments::default().centroid(), None);
        assert_eq!(Moments::default().normalized(), NormalizedMoments::default());
    }
}
