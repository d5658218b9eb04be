//! Plain geometry: integer rectangles and least-squares line fitting.

use serde::{Deserialize, Serialize};

/// Axis-aligned integer rectangle. `x`/`y` is the top-left pixel, and the
/// rectangle spans `width` x `height` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rectangle {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One-pixel rectangle.
    pub fn of_point(x: usize, y: usize) -> Self {
        Self::new(x, y, 1, 1)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Smallest rectangle containing both. An empty rectangle is the identity.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rectangle {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Center in continuous pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Least-squares line accumulator.
///
/// Points are given as `(along, across)` pairs: the fitted model is
/// `across = slope * along + intercept`. A horizontal stick uses
/// `(x, y)`, a vertical stick `(y, x)`, which keeps slopes small for both.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineFit {
    n: f64,
    sa: f64,
    sc: f64,
    saa: f64,
    scc: f64,
    sac: f64,
    min_along: f64,
    max_along: f64,
}

/// Result of a least-squares fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedLine {
    pub slope: f64,
    pub intercept: f64,
    /// Root mean squared distance of the points to the line, measured across.
    pub residual: f64,
    /// Extent of the fitted points along the main axis.
    pub start: f64,
    pub stop: f64,
}

impl FittedLine {
    /// Across coordinate at a given along coordinate.
    pub fn across_at(&self, along: f64) -> f64 {
        self.slope * along + self.intercept
    }

    /// Across coordinate at the middle of the fitted extent.
    pub fn mid_across(&self) -> f64 {
        self.across_at((self.start + self.stop) / 2.0)
    }

    /// Euclidean length of the fitted segment.
    pub fn length(&self) -> f64 {
        let da = self.stop - self.start;
        let dc = self.slope * da;
        (da * da + dc * dc).sqrt()
    }
}

impl LineFit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn point_count(&self) -> usize {
        self.n as usize
    }

    pub fn include_point(&mut self, along: f64, across: f64) {
        if self.n == 0.0 {
            self.min_along = along;
            self.max_along = along;
        } else {
            self.min_along = self.min_along.min(along);
            self.max_along = self.max_along.max(along);
        }
        self.n += 1.0;
        self.sa += along;
        self.sc += across;
        self.saa += along * along;
        self.scc += across * across;
        self.sac += along * across;
    }

    /// Fit the accumulated points. `None` when no point was included.
    pub fn fit(&self) -> Option<FittedLine> {
        if self.n == 0.0 {
            return None;
        }
        let n = self.n;
        let den = n * self.saa - self.sa * self.sa;
        let (slope, intercept) = if den.abs() < f64::EPSILON {
            (0.0, self.sc / n)
        } else {
            let slope = (n * self.sac - self.sa * self.sc) / den;
            (slope, (self.sc - slope * self.sa) / n)
        };

        let sq = self.scc - 2.0 * slope * self.sac - 2.0 * intercept * self.sc
            + slope * slope * self.saa
            + 2.0 * slope * intercept * self.sa
            + n * intercept * intercept;

        Some(FittedLine {
            slope,
            intercept,
            residual: (sq.max(0.0) / n).sqrt(),
            start: self.min_along,
            stop: self.max_along,
        })
    }
}
