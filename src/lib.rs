// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # omr-core
//!
//! Recognition core of an optical music recognition engine: turns a binarized
//! score raster into sections, groups them into glyphs, and classifies each
//! glyph against a musical shape taxonomy with a feed-forward network.
//!
//! ## Architecture
//!
//! - **Lag** (`lag`): runs stacked into sections, with junction edges, per orientation
//! - **Glyphs** (`glyph`): owned compositions of sections, compounds, sticks
//! - **Shapes** (`shape`): the symbol taxonomy and its named ranges
//! - **Evaluation** (`eval`): feature extraction, rule checks, the glyph network
//! - **Batch** (`batch`): bounded worker pool with deadlines and cancellation
//! - **Engine** (`engine`): the context object tying them together
//!
//! ## Library usage
//!
//! ```no_run
//! use omr_core::batch::CancelToken;
//! use omr_core::engine::Engine;
//! use omr_core::lag::{BinaryImage, Orientation};
//! use omr_core::paths::OmrPaths;
//!
//! let engine = Engine::open(OmrPaths::resolve().unwrap()).unwrap();
//! let image = BinaryImage::from_ascii("..##..\n..##..\n").unwrap();
//! let sheet = engine
//!     .process("demo", &image, Orientation::Horizontal, &CancelToken::new())
//!     .completed()
//!     .unwrap();
//! for glyph in sheet.glyphs() {
//!     println!("{} -> {:?}", glyph.id(), glyph.evaluation());
//! }
//! ```

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod geom;
pub mod glyph;
pub mod lag;
pub mod paths;
pub mod shape;
pub mod sheet;
