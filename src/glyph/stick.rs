//! Elongated glyphs with a least-squares line.
//!
//! A stick is a glyph whose pixels are expected to lie along a straight line:
//! stems, staff line chunks, ledgers, bar lines. The line is fitted over every
//! member pixel, with the main axis following the stick orientation.

use std::cmp::Ordering;

use crate::geom::{FittedLine, LineFit};
use crate::lag::{Lag, LagResult, Orientation};

use super::Glyph;

#[derive(Debug, Clone)]
pub struct Stick {
    glyph: Glyph,
    orientation: Orientation,
    line: Option<FittedLine>,
}

impl Stick {
    pub fn new(glyph: Glyph, orientation: Orientation) -> Self {
        Self {
            glyph,
            orientation,
            line: None,
        }
    }

    pub fn glyph(&self) -> &Glyph {
        &self.glyph
    }

    /// Mutable access to the underlying glyph. Changing members makes the
    /// current line stale until [`Stick::fit_line`] runs again.
    pub fn glyph_mut(&mut self) -> &mut Glyph {
        &mut self.glyph
    }

    pub fn into_glyph(self) -> Glyph {
        self.glyph
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Fit the line over every member pixel and cache it.
    pub fn fit_line(&mut self, lag: &Lag) -> LagResult<Option<FittedLine>> {
        let mut fit = LineFit::new();
        for &id in self.glyph.members() {
            for (x, y) in lag.get(id)?.pixels() {
                let (along, across) = match self.orientation {
                    Orientation::Horizontal => (x, y),
                    Orientation::Vertical => (y, x),
                };
                fit.include_point(along as f64, across as f64);
            }
        }
        self.line = fit.fit();
        Ok(self.line)
    }

    /// Last fitted line, if any.
    pub fn line(&self) -> Option<&FittedLine> {
        self.line.as_ref()
    }

    /// Across coordinate of the line at the middle of the stick.
    pub fn mid_position(&self) -> Option<f64> {
        self.line.map(|l| l.mid_across())
    }

    pub fn length(&self) -> f64 {
        self.line.map_or(0.0, |l| l.length())
    }

    pub fn slope(&self) -> Option<f64> {
        self.line.map(|l| l.slope)
    }

    pub fn residual(&self) -> Option<f64> {
        self.line.map(|l| l.residual)
    }

    /// Mean thickness across the main axis.
    pub fn thickness(&self) -> f64 {
        let length = self.length();
        if length <= 0.0 {
            return self.glyph.weight() as f64;
        }
        self.glyph.weight() as f64 / (length + 1.0)
    }
}

/// Order sticks by the across coordinate of their middle point. Unfitted
/// sticks sort last.
pub fn by_mid_position(a: &Stick, b: &Stick) -> Ordering {
    match (a.mid_position(), b.mid_position()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Order sticks by fitted length, longest first.
pub fn by_length(a: &Stick, b: &Stick) -> Ordering {
    b.length().total_cmp(&a.length())
}
