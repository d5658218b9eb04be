//! Glyph feature vector.
//!
//! The vector has a fixed length, [`PARAM_COUNT`], and depends only on the
//! glyph: its geometry normalized by the interline, plus the context set by
//! later stages (stems, ledger, pitch position).

use crate::glyph::Glyph;

/// Number of values produced by [`feed_input`].
pub const PARAM_COUNT: usize = 18;

/// Label of each feature, in vector order.
pub const PARAM_LABELS: [&str; PARAM_COUNT] = [
    "weight", "width", "height", "aspect", "n20", "n11", "n02", "n30", "n21", "n12", "n03", "hu1",
    "hu2", "xbar", "ybar", "stems", "ledger", "pitch",
];

/// Fill the feature vector of `glyph`, reusing `buffer` when given.
pub fn feed_input(glyph: &Glyph, buffer: Option<Vec<f64>>) -> Vec<f64> {
    let mut input = buffer.unwrap_or_default();
    input.clear();
    input.reserve(PARAM_COUNT);

    let width = glyph.normalized_width();
    let height = glyph.normalized_height();
    input.push(glyph.normalized_weight());
    input.push(width);
    input.push(height);
    input.push(if width > 0.0 { height / width } else { 0.0 });

    let m = glyph.moments().normalized();
    input.extend_from_slice(&[m.n20, m.n11, m.n02, m.n30, m.n21, m.n12, m.n03, m.hu1, m.hu2]);

    let bounds = glyph.bounds();
    let (xbar, ybar) = match glyph.centroid() {
        Some((cx, cy)) if !bounds.is_empty() => (
            (cx - bounds.x as f64) / bounds.width as f64,
            (cy - bounds.y as f64) / bounds.height as f64,
        ),
        _ => (0.0, 0.0),
    };
    input.push(xbar);
    input.push(ybar);

    input.push(f64::from(glyph.stem_count()));
    input.push(if glyph.has_ledger() { 1.0 } else { 0.0 });
    input.push(glyph.pitch_position());

    debug_assert_eq!(input.len(), PARAM_COUNT);
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::{GlyphId, Linking};
    use crate::lag::{Lag, Orientation, Run};

    fn block_glyph(width: usize, height: usize) -> (Lag, Glyph) {
        let mut lag = Lag::new("h", Orientation::Horizontal);
        let mut glyph = Glyph::new(GlyphId::new(1).unwrap(), 10);
        for y in 0..height {
            let id = lag.create_section(Run::new(20, width, 30 + y));
            glyph.add_section(id, Linking::LinkBack, &mut lag).unwrap();
        }
        (lag, glyph)
    }

    #[test]
    fn vector_has_fixed_length() {
        let (_, glyph) = block_glyph(5, 3);
        assert_eq!(feed_input(&glyph, None).len(), PARAM_COUNT);
        let empty = Glyph::new(GlyphId::new(2).unwrap(), 10);
        let v = feed_input(&empty, None);
        assert_eq!(v.len(), PARAM_COUNT);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn buffer_is_reused_and_reset() {
        let (_, glyph) = block_glyph(10, 20);
        let stale = vec![42.0; 50];
        let v = feed_input(&glyph, Some(stale));
        assert_eq!(v.len(), PARAM_COUNT);
        assert_eq!(v, feed_input(&glyph, None));
    }

    #[test]
    fn geometry_is_normalized_by_interline() {
        let (_, mut glyph) = block_glyph(10, 20);
        glyph.set_stem_count(2);
        glyph.set_ledger(true);
        glyph.set_pitch_position(-3.0);
        let v = feed_input(&glyph, None);
        assert!((v[0] - 2.0).abs() < 1e-12);
        assert!((v[1] - 1.0).abs() < 1e-12);
        assert!((v[2] - 2.0).abs() < 1e-12);
        assert!((v[3] - 2.0).abs() < 1e-12);
        assert!((v[13] - 0.45).abs() < 1e-12);
        assert_eq!(&v[15..], &[2.0, 1.0, -3.0]);
    }
}
