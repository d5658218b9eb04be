//! Deterministic per-shape vetoes applied on top of network outputs.
//!
//! The network sees only a handful of numbers; these rules encode geometric
//! and contextual facts it cannot be trusted to learn, such as "a flag hangs
//! on a stem" or "a bar line spans the staff height". Every dimension is
//! expressed in interlines.

use serde::{Deserialize, Serialize};

use crate::glyph::Glyph;
use crate::shape::Shape;

/// Thresholds of the specific checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeChecker {
    /// Largest side of a dot.
    pub max_dot_size: f64,
    /// Smallest height of a full-size G or C clef.
    pub min_tall_clef_height: f64,
    /// Smallest height of an F clef or a small clef.
    pub min_short_clef_height: f64,
    /// Smallest height of anything spanning the staff.
    pub min_staff_height: f64,
    /// Largest height of a note head.
    pub max_head_height: f64,
    /// Largest height of a time signature digit.
    pub max_digit_height: f64,
    /// Largest distance from the middle line, in half interlines, of a
    /// symbol that lives inside the staff.
    pub max_inner_pitch: f64,
}

impl Default for ShapeChecker {
    fn default() -> Self {
        Self {
            max_dot_size: 0.8,
            min_tall_clef_height: 3.0,
            min_short_clef_height: 1.5,
            min_staff_height: 3.0,
            max_head_height: 1.5,
            max_digit_height: 2.5,
            max_inner_pitch: 4.0,
        }
    }
}

impl ShapeChecker {
    /// Whether `shape` is still plausible for `glyph`. Logical shapes are
    /// never proposed by the network and always fail.
    pub fn specific_check(&self, shape: Shape, glyph: &Glyph) -> bool {
        use Shape::*;

        if !shape.is_trainable() {
            return false;
        }
        let width = glyph.normalized_width();
        let height = glyph.normalized_height();
        let stems = glyph.stem_count();

        match shape {
            Dot => width <= self.max_dot_size && height <= self.max_dot_size,
            RepeatDots => width <= self.max_dot_size,

            GClef | GClef8va | GClef8vb | CClef => height >= self.min_tall_clef_height,
            GClefSmall | FClef | FClefSmall | FClef8va | FClef8vb | PercussionClef => {
                height >= self.min_short_clef_height
            }

            ThinBarline | ThickBarline | DoubleBarline | FinalBarline | ReverseFinalBarline
            | LeftRepeatSign | RightRepeatSign | BackToBackRepeatSign | DottedBarline => {
                height >= self.min_staff_height && height > width
            }
            Brace | Bracket => height >= self.min_staff_height,

            Flag1 | Flag2 | Flag3 | Flag4 | Flag5 | Flag1Up | Flag2Up | Flag3Up | Flag4Up
            | Flag5Up => stems > 0,

            LongRest | BreveRest | QuarterRest | EighthRest | SixteenthRest | ThirtySecondRest
            | SixtyFourthRest | HundredTwentyEighthRest => stems == 0,
            WholeOrHalfRest => {
                stems == 0 && glyph.pitch_position().abs() <= self.max_inner_pitch && width > height
            }

            Stem => height >= 2.0 * width,
            Ledger => width >= 1.5 * height,
            BeamHook | Beam | Beam2 | Beam3 | Slur | Crescendo | Decrescendo => width > height,

            NoteheadBlack | NoteheadVoid | NoteheadBlackSmall | NoteheadVoidSmall
            | NoteheadCross | NoteheadDiamond => height <= self.max_head_height,
            WholeNote | BreveNote | WholeNoteSmall => {
                stems == 0 && height <= self.max_head_height
            }

            TimeZero | TimeOne | TimeTwo | TimeThree | TimeFour | TimeFive | TimeSix
            | TimeSeven | TimeEight | TimeNine | TimeTwelve | TimeSixteen => {
                stems == 0
                    && height <= self.max_digit_height
                    && glyph.pitch_position().abs() <= self.max_inner_pitch
            }
            CommonTime | CutTime => stems == 0 && height <= self.min_staff_height,

            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::{GlyphId, Linking};
    use crate::lag::{Lag, Orientation, Run};

    fn glyph(width: usize, height: usize) -> Glyph {
        let mut lag = Lag::new("h", Orientation::Horizontal);
        let mut glyph = Glyph::new(GlyphId::new(1).unwrap(), 10);
        for y in 0..height {
            let id = lag.create_section(Run::new(0, width, y));
            glyph.add_section(id, Linking::LinkBack, &mut lag).unwrap();
        }
        glyph
    }

    #[test]
    fn dots_must_be_small() {
        let checker = ShapeChecker::default();
        assert!(checker.specific_check(Shape::Dot, &glyph(5, 5)));
        assert!(!checker.specific_check(Shape::Dot, &glyph(5, 12)));
    }

    #[test]
    fn flags_need_a_stem_and_rests_refuse_one() {
        let checker = ShapeChecker::default();
        let mut g = glyph(8, 20);
        assert!(!checker.specific_check(Shape::Flag1, &g));
        assert!(checker.specific_check(Shape::EighthRest, &g));
        g.set_stem_count(1);
        assert!(checker.specific_check(Shape::Flag1, &g));
        assert!(!checker.specific_check(Shape::EighthRest, &g));
    }

    #[test]
    fn barlines_span_the_staff() {
        let checker = ShapeChecker::default();
        assert!(checker.specific_check(Shape::ThinBarline, &glyph(2, 40)));
        assert!(!checker.specific_check(Shape::ThinBarline, &glyph(2, 15)));
        assert!(!checker.specific_check(Shape::GClef, &glyph(15, 20)));
    }

    #[test]
    fn logical_shapes_always_fail_and_noise_always_passes() {
        let checker = ShapeChecker::default();
        let g = glyph(3, 3);
        assert!(!checker.specific_check(Shape::KeySharp2, &g));
        assert!(checker.specific_check(Shape::Noise, &g));
        assert!(checker.specific_check(Shape::Text, &glyph(100, 100)));
    }
}
