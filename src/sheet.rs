//! Per-sheet recognition pipeline.
//!
//! raster -> run table -> lag -> glyphs -> evaluations, polling a
//! [`CancelToken`] between steps and between glyphs.

use std::path::Path;

use serde::Serialize;

use crate::batch::{CancelToken, TaskOutcome};
use crate::config::OmrConfig;
use crate::error::{LagError, OmrResult};
use crate::eval::{Evaluation, GlyphEvaluator};
use crate::glyph::{Glyph, GlyphNest, GlyphOutcome, GlyphsBuilder};
use crate::lag::builder::build_lag;
use crate::lag::{BinaryImage, JunctionDeltaPolicy, Lag, LagResult, Orientation, RunTable};
use crate::shape::Shape;

/// Read an ASCII raster file.
pub fn load_ascii(path: &Path) -> LagResult<BinaryImage> {
    let text = std::fs::read_to_string(path).map_err(|e| LagError::ReadImage {
        path: path.display().to_string(),
        source: e,
    })?;
    BinaryImage::from_ascii(&text)
}

/// Everything built for one sheet.
#[derive(Debug)]
pub struct Sheet {
    name: String,
    lag: Lag,
    nest: GlyphNest,
}

/// Counts describing a processed sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub sections: usize,
    pub junctions: usize,
    pub glyphs: usize,
    pub classified: usize,
    pub noise: usize,
}

impl Sheet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lag(&self) -> &Lag {
        &self.lag
    }

    pub fn nest(&self) -> &GlyphNest {
        &self.nest
    }

    /// Active glyphs in id order.
    pub fn glyphs(&self) -> impl Iterator<Item = &Glyph> {
        self.nest.active_glyphs(&self.lag)
    }

    pub fn summary(&self) -> SheetSummary {
        let glyphs: Vec<&Glyph> = self.glyphs().collect();
        SheetSummary {
            sections: self.lag.len(),
            junctions: self.lag.junction_count(),
            glyphs: glyphs.len(),
            classified: glyphs.iter().filter(|g| g.evaluation().is_some()).count(),
            noise: glyphs.iter().filter(|g| g.shape() == Some(Shape::Noise)).count(),
        }
    }
}

/// Runs the pipeline with one configuration and one evaluator.
pub struct SheetProcessor<'a> {
    config: &'a OmrConfig,
    evaluator: &'a dyn GlyphEvaluator,
    orientation: Orientation,
}

impl<'a> SheetProcessor<'a> {
    pub fn new(config: &'a OmrConfig, evaluator: &'a dyn GlyphEvaluator) -> Self {
        Self {
            config,
            evaluator,
            orientation: Orientation::Horizontal,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn process(&self, name: &str, image: &BinaryImage, cancel: &CancelToken) -> TaskOutcome<Sheet> {
        match self.steps(name, image, cancel) {
            Ok(Some(sheet)) => TaskOutcome::Completed(sheet),
            Ok(None) => TaskOutcome::Cancelled,
            Err(e) => TaskOutcome::Failed(e),
        }
    }

    /// `Ok(None)` when cancelled.
    fn steps(&self, name: &str, image: &BinaryImage, cancel: &CancelToken) -> OmrResult<Option<Sheet>> {
        let stopped = |step: &str| {
            let stop = cancel.is_cancelled();
            if stop {
                tracing::info!(sheet = name, step, "sheet processing cancelled");
            }
            stop
        };

        if stopped("runs") {
            return Ok(None);
        }
        let table = RunTable::from_image(image, self.orientation, self.config.lag.min_run_length);

        if stopped("lag") {
            return Ok(None);
        }
        let policy = JunctionDeltaPolicy::new(self.config.lag.max_delta_length);
        let mut lag = build_lag(name, &table, policy)?;

        if stopped("glyphs") {
            return Ok(None);
        }
        let mut nest = GlyphNest::new(self.config.glyph.interline);
        let ids = GlyphsBuilder::new(&mut nest).build(&mut lag)?;

        for id in ids {
            if stopped("evaluation") {
                return Ok(None);
            }
            let glyph = nest.get_mut(id)?;
            let outcome = match self.evaluator.best_evaluation(glyph) {
                Some(best) => {
                    let too_small = best.shape == Shape::Noise && best.doubt == Evaluation::NO_DOUBT;
                    glyph.set_evaluation(Some(best));
                    if too_small {
                        GlyphOutcome::TooSmall
                    } else {
                        GlyphOutcome::Accepted
                    }
                }
                None => GlyphOutcome::Rejected {
                    reason: "every shape ruled out".into(),
                },
            };
            glyph.set_outcome(Some(outcome));
        }

        let sheet = Sheet {
            name: name.to_string(),
            lag,
            nest,
        };
        let summary = sheet.summary();
        tracing::info!(
            sheet = name,
            sections = summary.sections,
            glyphs = summary.glyphs,
            noise = summary.noise,
            "sheet processed"
        );
        Ok(Some(sheet))
    }
}
