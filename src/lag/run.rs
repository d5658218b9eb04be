//! Runs: maximal foreground segments along one scan line.

use serde::{Deserialize, Serialize};

use crate::error::LagError;

use super::{LagResult, Orientation};

/// A maximal contiguous foreground segment on one scan line.
///
/// For a horizontal orientation the scan index is the row (`y`) and `start`
/// is a column; for a vertical orientation the roles are swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Run {
    start: usize,
    length: usize,
    scan: usize,
}

impl Run {
    pub fn new(start: usize, length: usize, scan: usize) -> Self {
        Self {
            start,
            length,
            scan,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn scan(&self) -> usize {
        self.scan
    }

    /// Last position covered by the run. Meaningless for an empty run.
    pub fn stop(&self) -> usize {
        (self.start + self.length).saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether the two runs share at least one position (4-connectivity
    /// between consecutive scan lines).
    pub fn overlaps(&self, other: &Run) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start <= other.stop()
            && other.start <= self.stop()
    }

    /// Mid position along the scan line.
    pub fn center(&self) -> f64 {
        self.start as f64 + self.length as f64 / 2.0
    }
}

/// A binarized raster: `true` is foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    width: usize,
    height: usize,
    pixels: Vec<bool>,
}

impl BinaryImage {
    /// Blank (all background) image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; width * height],
        }
    }

    /// Parse an ASCII raster: `#`, `X` or `*` is foreground, anything else
    /// background. Blank lines are skipped; all rows must share one width.
    pub fn from_ascii(text: &str) -> LagResult<Self> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        Self::from_rows(&rows)
    }

    /// Build from ASCII rows (see [`BinaryImage::from_ascii`]).
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> LagResult<Self> {
        let width = rows.first().map(|r| r.as_ref().chars().count()).unwrap_or(0);
        let mut pixels = Vec::with_capacity(width * rows.len());
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            let actual = line.chars().count();
            if actual != width {
                return Err(LagError::Raster {
                    row,
                    expected: width,
                    actual,
                });
            }
            pixels.extend(line.chars().map(|c| matches!(c, '#' | 'X' | '*')));
        }
        Ok(Self {
            width,
            height: rows.len(),
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.pixels[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = value;
        }
    }

    /// Fill a rectangle with foreground.
    pub fn fill(&mut self, x: usize, y: usize, width: usize, height: usize) {
        for yy in y..(y + height).min(self.height) {
            for xx in x..(x + width).min(self.width) {
                self.pixels[yy * self.width + xx] = true;
            }
        }
    }

    pub fn foreground_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }
}

/// All runs of a raster for one orientation, grouped by scan line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTable {
    orientation: Orientation,
    sequences: Vec<Vec<Run>>,
}

impl RunTable {
    /// Extract runs. Runs shorter than `min_length` are dropped.
    pub fn from_image(image: &BinaryImage, orientation: Orientation, min_length: usize) -> Self {
        let (scan_count, scan_len) = match orientation {
            Orientation::Horizontal => (image.height(), image.width()),
            Orientation::Vertical => (image.width(), image.height()),
        };
        let pixel = |scan: usize, pos: usize| match orientation {
            Orientation::Horizontal => image.get(pos, scan),
            Orientation::Vertical => image.get(scan, pos),
        };

        let sequences = (0..scan_count)
            .map(|scan| {
                let mut runs = Vec::new();
                let mut pos = 0;
                while pos < scan_len {
                    if !pixel(scan, pos) {
                        pos += 1;
                        continue;
                    }
                    let start = pos;
                    while pos < scan_len && pixel(scan, pos) {
                        pos += 1;
                    }
                    let length = pos - start;
                    if length >= min_length.max(1) {
                        runs.push(Run::new(start, length, scan));
                    }
                }
                runs
            })
            .collect();

        Self {
            orientation,
            sequences,
        }
    }

    /// Assemble a table from explicit scan lines (index = scan).
    pub fn from_sequences(orientation: Orientation, sequences: Vec<Vec<Run>>) -> Self {
        Self {
            orientation,
            sequences,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn scan_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn runs(&self, scan: usize) -> &[Run] {
        self.sequences.get(scan).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate `(scan, runs)` in ascending scan order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Run])> {
        self.sequences
            .iter()
            .enumerate()
            .map(|(scan, runs)| (scan, runs.as_slice()))
    }

    pub fn run_count(&self) -> usize {
        self.sequences.iter().map(Vec::len).sum()
    }

    /// Total foreground pixels covered by the runs.
    pub fn weight(&self) -> usize {
        self.sequences.iter().flatten().map(Run::length).sum()
    }
}
