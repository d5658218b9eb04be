//! Rich diagnostic error types for the recognition core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Conditions the pipeline tolerates
//! (stale network files, untrainable samples, alien systems) are logged and
//! never surface here.

use miette::Diagnostic;
use thiserror::Error;

use crate::batch::BatchError;
use crate::config::ConfigError;
use crate::paths::PathError;
use crate::shape::UnknownShape;

/// Top-level error type for the recognition core.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum OmrError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lag(#[from] LagError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Glyph(#[from] GlyphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Batch(#[from] BatchError),
}

// ---------------------------------------------------------------------------
// Lag errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LagError {
    #[error("section not found: {id}")]
    #[diagnostic(
        code(omr::lag::section_not_found),
        help(
            "The section id does not belong to this lag. Sections are only valid \
             inside the lag that built them; rebuild glyphs after rebuilding a lag."
        )
    )]
    SectionNotFound { id: u32 },

    #[error("runs must arrive in ascending scan order: got scan {scan} after {previous}")]
    #[diagnostic(
        code(omr::lag::scan_order),
        help("Feed the sections builder one scan line at a time, top to bottom (or left to right).")
    )]
    ScanOrder { scan: usize, previous: usize },

    #[error("invalid raster: row {row} has {actual} pixels, expected {expected}")]
    #[diagnostic(
        code(omr::lag::raster),
        help("Every raster row must have the same width. Check the input for ragged lines.")
    )]
    Raster {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("failed to read raster: {path}")]
    #[diagnostic(
        code(omr::lag::read),
        help("Rasters are plain text files, one line per pixel row, `#` for foreground.")
    )]
    ReadImage {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Glyph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GlyphError {
    #[error("glyph not found: {id}")]
    #[diagnostic(
        code(omr::glyph::not_found),
        help("The glyph id is not registered in this nest.")
    )]
    NotFound { id: u32 },

    #[error("glyph {glyph} cannot be part of {parent}: the compound tree would contain a cycle")]
    #[diagnostic(
        code(omr::glyph::cycle),
        help("A glyph may not be nested, directly or indirectly, inside one of its own parts.")
    )]
    CompoundCycle { glyph: u32, parent: u32 },

    #[error("a compound glyph needs at least one part")]
    #[diagnostic(
        code(omr::glyph::empty_compound),
        help("Pass the ids of the glyphs to merge.")
    )]
    EmptyCompound,
}

// ---------------------------------------------------------------------------
// Neural network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NetworkError {
    #[error("I/O error on network file {path}")]
    #[diagnostic(
        code(omr::network::io),
        help("Check that the file exists and that its directory is readable and writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("network serialization error: {message}")]
    #[diagnostic(
        code(omr::network::serde),
        help(
            "The network file could not be encoded or decoded. It may be truncated \
             or written by an incompatible version; retrain from scratch."
        )
    )]
    Serialization { message: String },

    #[error("unsupported network format version {found} (supported: {supported})")]
    #[diagnostic(
        code(omr::network::version),
        help("Delete the stale network file and retrain.")
    )]
    FormatVersion { found: u32, supported: u32 },

    #[error("input size mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(omr::network::input_size),
        help("Feature vectors must have exactly one value per network input.")
    )]
    InputSize { expected: usize, actual: usize },

    #[error("invalid topology: {message}")]
    #[diagnostic(
        code(omr::network::topology),
        help("Input, hidden and output layers must all have at least one neuron.")
    )]
    Topology { message: String },

    #[error("training set mismatch: {inputs} input vectors but {desired} desired vectors")]
    #[diagnostic(
        code(omr::network::training_set),
        help("Provide exactly one desired-output vector per input vector.")
    )]
    TrainingSet { inputs: usize, desired: usize },
}

// ---------------------------------------------------------------------------
// Evaluator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    #[error("failed to read training samples from {path}: {message}")]
    #[diagnostic(
        code(omr::eval::samples),
        help("Samples are a JSON array of {{\"shape\": \"...\", \"rows\": [\"#..\", ...]}} objects.")
    )]
    Samples { path: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    UnknownShape(#[from] UnknownShape),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lag(#[from] LagError),
}

/// Convenience alias for functions returning recognition-core results.
pub type OmrResult<T> = std::result::Result<T, OmrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lag_error_converts_to_omr_error() {
        let err = LagError::SectionNotFound { id: 7 };
        let omr: OmrError = err.into();
        assert!(matches!(omr, OmrError::Lag(LagError::SectionNotFound { id: 7 })));
    }

    #[test]
    fn eval_error_wraps_network_error() {
        let err = NetworkError::InputSize {
            expected: 18,
            actual: 3,
        };
        let eval: EvalError = err.into();
        assert!(matches!(
            eval,
            EvalError::Network(NetworkError::InputSize { .. })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = GlyphError::CompoundCycle {
            glyph: 3,
            parent: 9,
        };
        let msg = format!("{err}");
        assert!(msg.contains('3'));
        assert!(msg.contains('9'));
        assert!(msg.contains("cycle"));
    }
}
