//! Named families of shapes.
//!
//! Ranges are authored once in [`RANGE_TABLE`] and materialized into a
//! [`ShapeRanges`] context when the process starts. Every shape belongs to
//! exactly one range.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Shape;

/// Display color of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// An immutable named group of shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeRange {
    name: &'static str,
    shapes: Vec<Shape>,
    representative: Shape,
    color: Rgb,
}

impl ShapeRange {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// The shape used to depict the whole range.
    pub fn representative(&self) -> Shape {
        self.representative
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn contains(&self, shape: Shape) -> bool {
        self.shapes.contains(&shape)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

type RangeRow = (&'static str, Shape, Rgb, &'static [Shape]);

/// (name, representative, color, members)
const RANGE_TABLE: &[RangeRow] = {
    use Shape::*;
    &[
        ("Garbage", Noise, Rgb(0x99, 0x99, 0x99), &[Noise, Clutter]),
        (
            "Texts",
            Text,
            Rgb(0x99, 0x66, 0x33),
            &[Text, Character, Lyrics, Title, Direction, Tempo],
        ),
        ("Dots", Dot, Rgb(0xcc, 0x66, 0x00), &[Dot, RepeatDots]),
        (
            "Pauses",
            Fermata,
            Rgb(0x66, 0x99, 0x00),
            &[Breath, Caesura, Fermata, FermataBelow],
        ),
        (
            "Barlines",
            ThinBarline,
            Rgb(0x00, 0x33, 0x99),
            &[
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
            ],
        ),
        (
            "Clefs",
            GClef,
            Rgb(0xcc, 0x00, 0x99),
            &[
                GClef,
                GClefSmall,
                GClef8va,
                GClef8vb,
                CClef,
                CClefAlto,
                CClefTenor,
                FClef,
                FClefSmall,
                FClef8va,
                FClef8vb,
                PercussionClef,
            ],
        ),
        (
            "Accidentals",
            Sharp,
            Rgb(0x00, 0x99, 0x99),
            &[Flat, Natural, Sharp, DoubleSharp, DoubleFlat],
        ),
        (
            "Keys",
            KeySharp1,
            Rgb(0x00, 0x66, 0x66),
            &[
                KeyFlat1, KeyFlat2, KeyFlat3, KeyFlat4, KeyFlat5, KeyFlat6, KeyFlat7, KeySharp1,
                KeySharp2, KeySharp3, KeySharp4, KeySharp5, KeySharp6, KeySharp7, KeyCancel,
            ],
        ),
        (
            "Times",
            CommonTime,
            Rgb(0xcc, 0x33, 0x00),
            &[
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
            ],
        ),
        (
            "Octaves",
            OttavaAlta,
            Rgb(0x66, 0x33, 0x99),
            &[
                OttavaAlta,
                OttavaBassa,
                QuindicesimaAlta,
                QuindicesimaBassa,
                VentiduesimaAlta,
                VentiduesimaBassa,
            ],
        ),
        (
            "Rests",
            QuarterRest,
            Rgb(0x00, 0x99, 0x00),
            &[
                LongRest,
                BreveRest,
                WholeOrHalfRest,
                WholeRest,
                HalfRest,
                QuarterRest,
                EighthRest,
                SixteenthRest,
                ThirtySecondRest,
                SixtyFourthRest,
                HundredTwentyEighthRest,
                MultiRest,
            ],
        ),
        (
            "Flags",
            Flag1,
            Rgb(0x99, 0x00, 0x33),
            &[
                Flag1, Flag2, Flag3, Flag4, Flag5, Flag1Up, Flag2Up, Flag3Up, Flag4Up, Flag5Up,
            ],
        ),
        (
            "Beams",
            Beam,
            Rgb(0x33, 0x33, 0xcc),
            &[BeamHook, Beam, Beam2, Beam3, BeamSmall, BeamHookSmall, Stem, Ledger],
        ),
        (
            "Lines",
            Slur,
            Rgb(0x66, 0x66, 0x00),
            &[Slur, Crescendo, Decrescendo, Glissando, WavyLine],
        ),
        (
            "NoteHeads",
            NoteheadBlack,
            Rgb(0xff, 0x66, 0x00),
            &[
                NoteheadBlack,
                NoteheadVoid,
                WholeNote,
                BreveNote,
                NoteheadBlackSmall,
                NoteheadVoidSmall,
                WholeNoteSmall,
                NoteheadCross,
                NoteheadDiamond,
            ],
        ),
        (
            "Notes",
            QuarterNoteUp,
            Rgb(0xff, 0x99, 0x33),
            &[QuarterNoteUp, QuarterNoteDown, HalfNoteUp, HalfNoteDown],
        ),
        (
            "Articulations",
            Accent,
            Rgb(0x99, 0x33, 0x66),
            &[Accent, Tenuto, Staccato, Staccatissimo, StrongAccent, Arpeggiato],
        ),
        (
            "Dynamics",
            DynamicF,
            Rgb(0xcc, 0x00, 0x00),
            &[
                DynamicP, DynamicPp, DynamicPpp, DynamicMp, DynamicF, DynamicFf, DynamicFff,
                DynamicMf, DynamicSf, DynamicSfz, DynamicSffz, DynamicFp, DynamicRf, DynamicRfz,
                DynamicFz,
            ],
        ),
        (
            "Ornaments",
            Trill,
            Rgb(0x00, 0x66, 0xcc),
            &[
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
            ],
        ),
        ("Pedals", PedalMark, Rgb(0x33, 0x99, 0x66), &[PedalMark, PedalUpMark]),
        (
            "Markers",
            Segno,
            Rgb(0x66, 0x00, 0x66),
            &[
                DaCapo,
                DalSegno,
                Coda,
                Segno,
                Fine,
                ToCoda,
                Repeat1Bar,
                Repeat2Bar,
                Ending,
                EndingNoRight,
            ],
        ),
        ("Tuplets", TupletThree, Rgb(0x33, 0x66, 0x99), &[TupletThree, TupletSix]),
        (
            "Fingering",
            DigitOne,
            Rgb(0x66, 0x99, 0x99),
            &[
                DigitZero, DigitOne, DigitTwo, DigitThree, DigitFour, DigitFive, PluckP, PluckI,
                PluckM, PluckA,
            ],
        ),
    ]
};

/// Registry of every shape range, by name and by member shape.
#[derive(Debug, Clone)]
pub struct ShapeRanges {
    ranges: Vec<ShapeRange>,
    by_name: HashMap<&'static str, usize>,
    by_shape: HashMap<Shape, usize>,
}

impl ShapeRanges {
    /// Build the standard ranges. Meant to be called once at startup and the
    /// result shared with every consumer.
    pub fn standard() -> Self {
        Self::from_rows(RANGE_TABLE)
    }

    fn from_rows(rows: &[RangeRow]) -> Self {
        let mut ranges = Vec::with_capacity(rows.len());
        let mut by_name = HashMap::with_capacity(rows.len());
        let mut by_shape = HashMap::with_capacity(Shape::ALL.len());
        for (index, &(name, representative, color, shapes)) in rows.iter().enumerate() {
            debug_assert!(shapes.contains(&representative), "{name}: foreign representative");
            by_name.insert(name, index);
            for &shape in shapes {
                if let Some(previous) = by_shape.insert(shape, index) {
                    tracing::warn!(%shape, first = rows[previous].0, second = name, "shape listed in two ranges");
                }
            }
            ranges.push(ShapeRange {
                name,
                shapes: shapes.to_vec(),
                representative,
                color,
            });
        }
        Self {
            ranges,
            by_name,
            by_shape,
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<&ShapeRange> {
        self.by_name.get(name).map(|&i| &self.ranges[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShapeRange> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn range_of(&self, shape: Shape) -> Option<&ShapeRange> {
        self.by_shape.get(&shape).map(|&i| &self.ranges[i])
    }

    /// Every shape in range order.
    pub fn all_shapes(&self) -> Vec<Shape> {
        self.ranges.iter().flat_map(|r| r.shapes.iter().copied()).collect()
    }

    /// Display color of a shape, inherited from its range.
    pub fn color_of(&self, shape: Shape) -> Option<Rgb> {
        self.range_of(shape).map(ShapeRange::color)
    }
}

impl Default for ShapeRanges {
    fn default() -> Self {
        Self::standard()
    }
}
