//! Glyph classification.
//!
//! A [`GlyphEvaluator`] turns a glyph into one [`Evaluation`] per trainable
//! shape, sorted by increasing doubt. The neural implementation lives in
//! [`glyph_network`]; [`network`] is the generic engine underneath it and
//! [`samples`] reads labelled training glyphs.
//!
//! ## Doubt scale
//!
//! Accepted shapes carry `1 / output`, which is finite and above 1 for a
//! sigmoid output. Shapes vetoed by the [`ShapeChecker`] carry
//! [`Evaluation::INFINITE_DOUBT`] and always sort after every accepted shape.
//! Use [`Evaluation::is_rejected`] rather than comparing doubts against a
//! threshold of your own.

pub mod checker;
pub mod features;
pub mod glyph_network;
pub mod network;
pub mod samples;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::glyph::Glyph;
use crate::shape::{Shape, ShapeRange};

pub use checker::ShapeChecker;
pub use features::{PARAM_COUNT, feed_input};
pub use glyph_network::{GlyphMonitor, GlyphNetwork, LoggingMonitor, StartingMode};
pub use network::{
    NeuralNetwork, NoMonitor, StopReason, TrainingMonitor, TrainingParams, TrainingSummary,
};
pub use samples::{SampleRecord, load_samples};

/// Result type for evaluator operations.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// A shape hypothesis. Smaller doubt means more confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub shape: Shape,
    pub doubt: f64,
}

impl Evaluation {
    /// Doubt of a certain hypothesis.
    pub const NO_DOUBT: f64 = 0.0;

    /// Doubt of a shape ruled out by a specific check. Kept finite so that
    /// evaluations survive a JSON round trip.
    pub const INFINITE_DOUBT: f64 = f64::MAX;

    pub fn new(shape: Shape, doubt: f64) -> Self {
        Self { shape, doubt }
    }

    pub fn is_rejected(&self) -> bool {
        self.doubt >= Self::INFINITE_DOUBT
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rejected() {
            write!(f, "{}(rejected)", self.shape)
        } else {
            write!(f, "{}({:.4})", self.shape, self.doubt)
        }
    }
}

/// Sort evaluations by increasing doubt. Ties keep their relative order.
pub fn sort_by_doubt(evaluations: &mut [Evaluation]) {
    evaluations.sort_by(|a, b| a.doubt.total_cmp(&b.doubt));
}

/// Anything able to rank every trainable shape for a glyph.
///
/// Implementations must be usable from several threads at once: inference
/// never mutates the evaluator.
pub trait GlyphEvaluator: Send + Sync {
    /// Short human-readable name.
    fn name(&self) -> &str;

    /// One evaluation per trainable shape, sorted by increasing doubt.
    fn get_all_evaluations(&self, glyph: &Glyph) -> Vec<Evaluation>;

    /// The best hypothesis, unless every shape was rejected.
    fn best_evaluation(&self, glyph: &Glyph) -> Option<Evaluation> {
        self.get_all_evaluations(glyph)
            .into_iter()
            .next()
            .filter(|e| !e.is_rejected())
    }

    /// At most `count` hypotheses whose doubt does not exceed `max_doubt`.
    fn top_evaluations(&self, glyph: &Glyph, count: usize, max_doubt: f64) -> Vec<Evaluation> {
        self.get_all_evaluations(glyph)
            .into_iter()
            .take_while(|e| !e.is_rejected() && e.doubt <= max_doubt)
            .take(count)
            .collect()
    }

    /// The best hypothesis restricted to the shapes of `range`.
    fn vote(&self, glyph: &Glyph, range: &ShapeRange, max_doubt: f64) -> Option<Evaluation> {
        self.get_all_evaluations(glyph)
            .into_iter()
            .filter(|e| !e.is_rejected() && e.doubt <= max_doubt)
            .find(|e| range.contains(e.shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::GlyphId;
    use crate::shape::ShapeRanges;

    /// Ranks shapes in a fixed order, rejecting everything past `accepted`.
    struct Fixed {
        accepted: usize,
    }

    impl GlyphEvaluator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn get_all_evaluations(&self, _glyph: &Glyph) -> Vec<Evaluation> {
            let mut all: Vec<Evaluation> = Shape::trainable_shapes()
                .iter()
                .enumerate()
                .map(|(i, &shape)| {
                    let doubt = if i < self.accepted {
                        1.0 + i as f64
                    } else {
                        Evaluation::INFINITE_DOUBT
                    };
                    Evaluation::new(shape, doubt)
                })
                .collect();
            sort_by_doubt(&mut all);
            all
        }
    }

    fn glyph() -> Glyph {
        Glyph::new(GlyphId::new(1).unwrap(), 10)
    }

    #[test]
    fn helpers_skip_rejected_shapes() {
        let eval = Fixed { accepted: 5 };
        let g = glyph();
        assert_eq!(eval.best_evaluation(&g).unwrap().shape, Shape::ALL[0]);
        assert_eq!(eval.top_evaluations(&g, 10, f64::MAX).len(), 5);
        assert_eq!(eval.top_evaluations(&g, 2, f64::MAX).len(), 2);
        assert_eq!(eval.top_evaluations(&g, 10, 3.0).len(), 3);

        let none = Fixed { accepted: 0 };
        assert!(none.best_evaluation(&g).is_none());
    }

    #[test]
    fn vote_restricts_to_range() {
        let ranges = ShapeRanges::standard();
        let dots = ranges.get("Dots").unwrap();
        let eval = Fixed {
            accepted: Shape::TRAINABLE_COUNT,
        };
        let g = glyph();
        assert_eq!(eval.vote(&g, dots, f64::MAX).unwrap().shape, Shape::Dot);
        assert!(eval.vote(&g, dots, 1.5).is_none());
    }

    #[test]
    fn rejected_evaluations_sort_last_and_display() {
        let mut all = vec![
            Evaluation::new(Shape::Sharp, Evaluation::INFINITE_DOUBT),
            Evaluation::new(Shape::Flat, 2.0),
            Evaluation::new(Shape::Natural, 1.25),
        ];
        sort_by_doubt(&mut all);
        let shapes: Vec<Shape> = all.iter().map(|e| e.shape).collect();
        assert_eq!(shapes, vec![Shape::Natural, Shape::Flat, Shape::Sharp]);
        assert_eq!(all[2].to_string(), "Sharp(rejected)");
        assert_eq!(all[0].to_string(), "Natural(1.2500)");
    }
}
