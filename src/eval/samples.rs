//! Labelled training samples stored as JSON.
//!
//! A sample file is an array of records, each holding a shape name and the
//! glyph raster as ASCII rows (`#` foreground, `.` background). Context
//! normally set by later pipeline stages may be given explicitly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::glyph::{Glyph, GlyphNest, Linking};
use crate::lag::{BinaryImage, JunctionAllPolicy, Orientation, RunTable, builder::build_lag};
use crate::shape::{Shape, UnknownShape};

use super::EvalResult;

/// One stored sample. `shape` is kept as written so that a name the taxonomy
/// no longer knows only costs that sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub shape: String,
    pub rows: Vec<String>,
    #[serde(default)]
    pub stems: u8,
    #[serde(default)]
    pub ledger: bool,
    #[serde(default)]
    pub pitch: f64,
}

impl SampleRecord {
    pub fn new(shape: Shape, rows: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            shape: shape.name().to_string(),
            rows: rows.into_iter().map(Into::into).collect(),
            stems: 0,
            ledger: false,
            pitch: 0.0,
        }
    }

    pub fn parsed_shape(&self) -> Result<Shape, UnknownShape> {
        self.shape.parse()
    }
}

/// Read every record of a sample file and turn each into a labelled glyph.
///
/// Records naming an unknown shape are dropped with a warning; the others
/// still load.
pub fn load_samples(path: &Path, interline: u32) -> EvalResult<Vec<Glyph>> {
    let samples_err = |message: String| EvalError::Samples {
        path: path.display().to_string(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| samples_err(e.to_string()))?;
    let records: Vec<SampleRecord> =
        serde_json::from_str(&content).map_err(|e| samples_err(e.to_string()))?;

    let mut nest = GlyphNest::new(interline);
    let mut glyphs = Vec::with_capacity(records.len());
    let mut dropped = 0usize;
    for (index, record) in records.iter().enumerate() {
        match record.parsed_shape() {
            Ok(shape) => glyphs.push(labelled_glyph(record, shape, &mut nest)?),
            Err(e) => {
                tracing::warn!(path = %path.display(), index, shape = %e.name, "dropping sample with unknown shape");
                dropped += 1;
            }
        }
    }
    tracing::info!(path = %path.display(), samples = glyphs.len(), dropped, "samples loaded");
    Ok(glyphs)
}

/// Build the glyph of one record: every foreground pixel, one glyph.
pub fn sample_glyph(record: &SampleRecord, nest: &mut GlyphNest) -> EvalResult<Glyph> {
    let shape = record.parsed_shape()?;
    labelled_glyph(record, shape, nest)
}

fn labelled_glyph(record: &SampleRecord, shape: Shape, nest: &mut GlyphNest) -> EvalResult<Glyph> {
    let image = BinaryImage::from_rows(&record.rows)?;
    let table = RunTable::from_image(&image, Orientation::Horizontal, 1);
    let mut lag = build_lag("sample", &table, JunctionAllPolicy)?;
    let sections: Vec<_> = lag.sections().iter().map(|s| s.id()).collect();

    let mut glyph = nest.detached_glyph();
    for section in sections {
        glyph.add_section(section, Linking::LinkBack, &mut lag)?;
    }
    glyph.set_shape(shape, 0.0);
    glyph.set_stem_count(record.stems);
    glyph.set_ledger(record.ledger);
    glyph.set_pitch_position(record.pitch);
    Ok(glyph)
}
