//! Shape taxonomy.
//!
//! [`Shape`] is the closed set of symbol identities the recognizer knows
//! about. The first [`Shape::TRAINABLE_COUNT`] variants are *trainable*: the
//! glyph network has exactly one output per trainable shape, in declaration
//! order. The remaining variants are logical shapes assigned by later stages
//! (key signatures, composite time signatures, stemmed notes).
//!
//! Any change to the trainable list changes the network output width and
//! invalidates persisted networks.

pub mod range;

use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use range::{Rgb, ShapeRange, ShapeRanges};

/// Unrecognized shape name.
#[derive(Debug, Error, Diagnostic)]
#[error("unknown shape: {name}")]
#[diagnostic(
    code(omr::shape::unknown),
    help("Run `omr ranges` to list every known shape name.")
)]
pub struct UnknownShape {
    pub name: String,
}

macro_rules! shapes {
    (
        trainable: [ $( $(#[$tm:meta])* $t:ident ),* $(,)? ],
        logical: [ $( $(#[$lm:meta])* $l:ident ),* $(,)? ] $(,)?
    ) => {
        /// A symbol identity. Trainable variants come first.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Shape {
            $( $(#[$tm])* $t, )*
            $( $(#[$lm])* $l, )*
        }

        impl Shape {
            /// Every shape, trainable ones first.
            pub const ALL: &'static [Shape] = &[ $( Shape::$t, )* $( Shape::$l, )* ];

            /// Number of shapes the network is trained on.
            pub const TRAINABLE_COUNT: usize = [ $( Shape::$t ),* ].len();

            pub const fn name(self) -> &'static str {
                match self {
                    $( Shape::$t => stringify!($t), )*
                    $( Shape::$l => stringify!($l), )*
                }
            }
        }
    };
}

shapes! {
    trainable: [
        /// Too small or too garbled to mean anything.
        Noise,
        /// Recognizable as foreground but not as a symbol.
        Clutter,
        Text,
        Character,

        Dot,
        /// The pair of dots of a repeat sign.
        RepeatDots,

        Breath,
        Caesura,
        Fermata,
        FermataBelow,

        ThinBarline,
        ThickBarline,
        DoubleBarline,
        FinalBarline,
        ReverseFinalBarline,
        LeftRepeatSign,
        RightRepeatSign,
        BackToBackRepeatSign,
        DottedBarline,
        Brace,
        Bracket,

        GClef,
        GClefSmall,
        GClef8va,
        GClef8vb,
        CClef,
        FClef,
        FClefSmall,
        FClef8va,
        FClef8vb,
        PercussionClef,

        Flat,
        Natural,
        Sharp,
        DoubleSharp,
        DoubleFlat,

        TimeZero,
        TimeOne,
        TimeTwo,
        TimeThree,
        TimeFour,
        TimeFive,
        TimeSix,
        TimeSeven,
        TimeEight,
        TimeNine,
        TimeTwelve,
        TimeSixteen,
        CommonTime,
        CutTime,

        OttavaAlta,
        OttavaBassa,
        QuindicesimaAlta,
        QuindicesimaBassa,

        LongRest,
        BreveRest,
        /// Whole and half rests look alike; pitch position tells them apart.
        WholeOrHalfRest,
        QuarterRest,
        EighthRest,
        SixteenthRest,
        ThirtySecondRest,
        SixtyFourthRest,
        HundredTwentyEighthRest,

        Flag1,
        Flag2,
        Flag3,
        Flag4,
        Flag5,
        Flag1Up,
        Flag2Up,
        Flag3Up,
        Flag4Up,
        Flag5Up,

        BeamHook,
        Beam,
        Beam2,
        Beam3,
        Stem,
        Ledger,

        Slur,
        Crescendo,
        Decrescendo,

        NoteheadBlack,
        NoteheadVoid,
        WholeNote,
        BreveNote,
        NoteheadBlackSmall,
        NoteheadVoidSmall,
        WholeNoteSmall,
        NoteheadCross,
        NoteheadDiamond,

        Accent,
        Tenuto,
        Staccato,
        Staccatissimo,
        StrongAccent,
        Arpeggiato,

        DynamicP,
        DynamicPp,
        DynamicMp,
        DynamicF,
        DynamicFf,
        DynamicMf,
        DynamicSf,
        DynamicSfz,
        DynamicFp,
        DynamicRf,
        DynamicFz,

        GraceNote,
        GraceNoteSlash,
        Trill,
        Turn,
        InvertedTurn,
        TurnSlash,
        TurnUp,
        Mordent,
        InvertedMordent,
        Tremolo,

        PedalMark,
        PedalUpMark,

        DaCapo,
        DalSegno,
        Coda,
        Segno,
        Repeat1Bar,
        Repeat2Bar,

        TupletThree,
        TupletSix,

        DigitZero,
        DigitOne,
        DigitTwo,
        DigitThree,
        DigitFour,
        DigitFive,
        PluckP,
        PluckI,
        PluckM,
        PluckA,
    ],
    logical: [
        WholeRest,
        HalfRest,
        MultiRest,

        KeyFlat1,
        KeyFlat2,
        KeyFlat3,
        KeyFlat4,
        KeyFlat5,
        KeyFlat6,
        KeyFlat7,
        KeySharp1,
        KeySharp2,
        KeySharp3,
        KeySharp4,
        KeySharp5,
        KeySharp6,
        KeySharp7,
        KeyCancel,

        TimeFourFour,
        TimeTwoTwo,
        TimeTwoFour,
        TimeThreeFour,
        TimeFiveFour,
        TimeSixFour,
        TimeThreeEight,
        TimeSixEight,
        TimeNineEight,
        TimeTwelveEight,
        TimeCustom,

        Ending,
        EndingNoRight,
        Fine,
        ToCoda,

        QuarterNoteUp,
        QuarterNoteDown,
        HalfNoteUp,
        HalfNoteDown,

        Lyrics,
        Title,
        Direction,
        Tempo,

        DynamicPpp,
        DynamicFff,
        DynamicSffz,
        DynamicRfz,

        VentiduesimaAlta,
        VentiduesimaBassa,

        BeamSmall,
        BeamHookSmall,

        Glissando,
        WavyLine,

        CClefAlto,
        CClefTenor,
    ],
}

impl Shape {
    pub const fn is_trainable(self) -> bool {
        (self as usize) < Self::TRAINABLE_COUNT
    }

    /// Network output index of a trainable shape.
    pub const fn trainable_index(self) -> Option<usize> {
        if self.is_trainable() {
            Some(self as usize)
        } else {
            None
        }
    }

    pub fn from_trainable_index(index: usize) -> Option<Shape> {
        Self::trainable_shapes().get(index).copied()
    }

    /// The trainable prefix of [`Shape::ALL`], in network output order.
    pub fn trainable_shapes() -> &'static [Shape] {
        &Self::ALL[..Self::TRAINABLE_COUNT]
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shape {
    type Err = UnknownShape;

    /// Case-insensitive. Underscores and hyphens are ignored, so `g_clef`,
    /// `G-CLEF` and `GClef` all parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect();
        Self::ALL
            .iter()
            .copied()
            .find(|shape| shape.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| UnknownShape { name: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trainable_shapes_form_a_prefix() {
        assert!(Shape::TRAINABLE_COUNT > 100);
        assert!(Shape::ALL.len() > Shape::TRAINABLE_COUNT);
        for (i, shape) in Shape::ALL.iter().enumerate() {
            assert_eq!(*shape as usize, i);
            assert_eq!(shape.is_trainable(), i < Shape::TRAINABLE_COUNT);
        }
        assert!(Shape::Noise.is_trainable());
        assert!(Shape::Sharp.is_trainable());
        assert!(!Shape::KeySharp3.is_trainable());
    }

    #[test]
    fn trainable_index_round_trips() {
        for &shape in Shape::trainable_shapes() {
            let index = shape.trainable_index().unwrap();
            assert_eq!(Shape::from_trainable_index(index), Some(shape));
        }
        assert_eq!(Shape::WholeRest.trainable_index(), None);
        assert_eq!(Shape::from_trainable_index(Shape::TRAINABLE_COUNT), None);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("sharp".parse::<Shape>().unwrap(), Shape::Sharp);
        assert_eq!("G_CLEF".parse::<Shape>().unwrap(), Shape::GClef);
        assert_eq!("time-four-four".parse::<Shape>().unwrap(), Shape::TimeFourFour);
        assert!("kazoo".parse::<Shape>().is_err());
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = Shape::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Shape::ALL.len());
    }

    #[test]
    fn serde_uses_variant_names() {
        let json = serde_json::to_string(&Shape::DoubleSharp).unwrap();
        assert_eq!(json, "\"DoubleSharp\"");
        let back: Shape = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Shape::DoubleSharp);
    }
}
