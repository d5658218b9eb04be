//! Glyph composition.
//!
//! A [`Glyph`] owns a set of member sections of a [`Lag`] and may be a part
//! of a larger compound glyph. Ownership is recorded on both sides: the glyph
//! keeps its member ids, each section keeps an `Option<GlyphId>` back-pointer.
//! A glyph is *active* iff every member section points back to it; inactive
//! glyphs must not be classified or translated.
//!
//! ## Components
//!
//! - [`moments`]: geometric moments feeding feature extraction
//! - [`nest`]: arena of glyphs with compound bookkeeping
//! - [`builder`]: glyph retrieval from connected sections
//! - [`stick`]: elongated glyphs with a fitted line

pub mod builder;
pub mod moments;
pub mod nest;
pub mod stick;

use std::collections::BTreeSet;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::eval::Evaluation;
use crate::geom::Rectangle;
use crate::lag::{Lag, LagResult, SectionId, SystemId};
use crate::shape::Shape;

pub use builder::GlyphsBuilder;
pub use moments::{Moments, NormalizedMoments};
pub use nest::GlyphNest;
pub use stick::Stick;

/// Unique glyph identifier. `Option<GlyphId>` costs no extra space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct GlyphId(NonZeroU32);

impl GlyphId {
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(GlyphId)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for GlyphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "glyph:{}", self.0)
    }
}

/// Whether adding a section also makes this glyph its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linking {
    /// Set the section's back-pointer to this glyph.
    LinkBack,
    /// Only record membership.
    NoLink,
}

/// Outcome of a classification or assembly attempt, distinct from the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlyphOutcome {
    Accepted,
    TooSmall,
    Ambiguous,
    Rejected { reason: String },
}

impl GlyphOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GlyphOutcome::Accepted)
    }
}

impl std::fmt::Display for GlyphOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlyphOutcome::Accepted => write!(f, "accepted"),
            GlyphOutcome::TooSmall => write!(f, "too small"),
            GlyphOutcome::Ambiguous => write!(f, "ambiguous"),
            GlyphOutcome::Rejected { reason } => write!(f, "rejected: {reason}"),
        }
    }
}

/// Opaque handle to a score entity built from a glyph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Translation {
    pub kind: String,
    pub id: u64,
}

/// Lifecycle position of a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphState {
    /// Never linked to its sections (possibly empty).
    Created,
    ActiveUnclassified,
    Classified,
    Translated,
    /// Members were cut or taken over by another glyph.
    Inactive,
}

/// An owned composition of sections, subject to classification.
#[derive(Debug, Clone)]
pub struct Glyph {
    id: GlyphId,
    interline: u32,
    members: BTreeSet<SectionId>,
    parts: BTreeSet<GlyphId>,
    part_of: Option<GlyphId>,
    evaluation: Option<Evaluation>,
    outcome: Option<GlyphOutcome>,
    translations: Vec<Translation>,
    ever_linked: bool,
    moments: Moments,
    bounds: Rectangle,
    stem_count: u8,
    with_ledger: bool,
    pitch_position: f64,
}

impl Glyph {
    /// Empty glyph. `interline` is the staff scale used for normalization.
    pub fn new(id: GlyphId, interline: u32) -> Self {
        Self {
            id,
            interline: interline.max(1),
            members: BTreeSet::new(),
            parts: BTreeSet::new(),
            part_of: None,
            evaluation: None,
            outcome: None,
            translations: Vec::new(),
            ever_linked: false,
            moments: Moments::default(),
            bounds: Rectangle::default(),
            stem_count: 0,
            with_ledger: false,
            pitch_position: 0.0,
        }
    }

    pub fn id(&self) -> GlyphId {
        self.id
    }

    pub fn interline(&self) -> u32 {
        self.interline
    }

    // -- membership ---------------------------------------------------------

    pub fn members(&self) -> &BTreeSet<SectionId> {
        &self.members
    }

    pub fn contains(&self, section: SectionId) -> bool {
        self.members.contains(&section)
    }

    /// Insert a section. With [`Linking::LinkBack`] the section's owner becomes
    /// this glyph; this is the only place ownership is established.
    pub fn add_section(&mut self, section: SectionId, linking: Linking, lag: &mut Lag) -> LagResult<()> {
        let s = lag.get(section)?;
        if self.members.insert(section) {
            if self.members.len() == 1 {
                let b = s.bounds();
                self.moments = Moments::with_origin(b.x as f64, b.y as f64);
            }
            for (x, y) in s.pixels() {
                self.moments.include_pixel(x, y);
            }
            self.bounds = self.bounds.union(&s.bounds());
        }
        if linking == Linking::LinkBack {
            lag.set_owner(section, Some(self.id))?;
            self.ever_linked = true;
        }
        Ok(())
    }

    /// Merge all member sections of `other` into this glyph.
    pub fn add_glyph_sections(&mut self, other: &Glyph, linking: Linking, lag: &mut Lag) -> LagResult<()> {
        for &section in &other.members {
            self.add_section(section, linking, lag)?;
        }
        Ok(())
    }

    /// Remove a member. With [`Linking::LinkBack`] the section is released if
    /// this glyph still owns it.
    pub fn remove_section(&mut self, section: SectionId, linking: Linking, lag: &mut Lag) -> LagResult<bool> {
        if !self.members.remove(&section) {
            return Ok(false);
        }
        if linking == Linking::LinkBack {
            lag.release_owner(section, self.id)?;
        }
        self.recompute_geometry(lag)?;
        Ok(true)
    }

    /// Release every member still owned by this glyph. Sections already
    /// reassigned elsewhere are left alone.
    pub fn cut_sections(&self, lag: &mut Lag) -> LagResult<usize> {
        let mut released = 0;
        for &section in &self.members {
            if lag.release_owner(section, self.id)? {
                released += 1;
            }
        }
        Ok(released)
    }

    /// Force every member's owner to this glyph.
    pub fn link_all_sections(&mut self, lag: &mut Lag) -> LagResult<()> {
        for &section in &self.members {
            lag.set_owner(section, Some(self.id))?;
        }
        self.ever_linked = true;
        Ok(())
    }

    /// True iff there is at least one member and every member points back here.
    pub fn is_active(&self, lag: &Lag) -> bool {
        !self.members.is_empty()
            && self
                .members
                .iter()
                .all(|&s| lag.section(s).and_then(|s| s.owner()) == Some(self.id))
    }

    /// First system found among members that differs from `system`.
    pub fn alien_system(&self, system: SystemId, lag: &Lag) -> Option<SystemId> {
        self.members
            .iter()
            .filter_map(|&s| lag.section(s).and_then(|s| s.system()))
            .find(|&other| other != system)
    }

    fn recompute_geometry(&mut self, lag: &Lag) -> LagResult<()> {
        self.moments = Moments::default();
        self.bounds = Rectangle::default();
        let mut first = true;
        for &id in &self.members {
            let s = lag.get(id)?;
            if first {
                let b = s.bounds();
                self.moments = Moments::with_origin(b.x as f64, b.y as f64);
                first = false;
            }
            for (x, y) in s.pixels() {
                self.moments.include_pixel(x, y);
            }
            self.bounds = self.bounds.union(&s.bounds());
        }
        Ok(())
    }

    // -- compound tree ------------------------------------------------------

    pub fn part_of(&self) -> Option<GlyphId> {
        self.part_of
    }

    /// Set the parent compound. The parent's parts are not touched; use
    /// [`GlyphNest::attach_part`] to keep both sides consistent.
    pub fn set_part_of(&mut self, parent: Option<GlyphId>) {
        self.part_of = parent;
    }

    pub fn parts(&self) -> &BTreeSet<GlyphId> {
        &self.parts
    }

    /// Replace the parts set. The parts' parent links are not touched.
    pub fn set_parts(&mut self, parts: impl IntoIterator<Item = GlyphId>) {
        self.parts = parts.into_iter().collect();
    }

    pub(crate) fn parts_mut(&mut self) -> &mut BTreeSet<GlyphId> {
        &mut self.parts
    }

    pub fn is_compound(&self) -> bool {
        !self.parts.is_empty()
    }

    // -- classification -----------------------------------------------------

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn shape(&self) -> Option<Shape> {
        self.evaluation.as_ref().map(|e| e.shape)
    }

    pub fn doubt(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|e| e.doubt)
    }

    /// Assign a shape with the given doubt.
    pub fn set_shape(&mut self, shape: Shape, doubt: f64) {
        self.evaluation = Some(Evaluation::new(shape, doubt));
    }

    pub fn set_evaluation(&mut self, evaluation: Option<Evaluation>) {
        self.evaluation = evaluation;
    }

    pub fn outcome(&self) -> Option<&GlyphOutcome> {
        self.outcome.as_ref()
    }

    pub fn set_outcome(&mut self, outcome: Option<GlyphOutcome>) {
        self.outcome = outcome;
    }

    pub fn is_successful(&self) -> bool {
        self.outcome.as_ref().is_some_and(GlyphOutcome::is_success)
    }

    // -- translations -------------------------------------------------------

    pub fn translations(&self) -> &[Translation] {
        &self.translations
    }

    pub fn add_translation(&mut self, translation: Translation) {
        if !self.translations.contains(&translation) {
            self.translations.push(translation);
        }
    }

    pub fn clear_translations(&mut self) {
        self.translations.clear();
    }

    pub fn is_translated(&self) -> bool {
        !self.translations.is_empty()
    }

    pub fn state(&self, lag: &Lag) -> GlyphState {
        if self.is_active(lag) {
            if self.is_translated() {
                GlyphState::Translated
            } else if self.evaluation.is_some() {
                GlyphState::Classified
            } else {
                GlyphState::ActiveUnclassified
            }
        } else if self.ever_linked {
            GlyphState::Inactive
        } else {
            GlyphState::Created
        }
    }

    // -- geometry -----------------------------------------------------------

    /// Pixel count.
    pub fn weight(&self) -> usize {
        self.moments.weight() as usize
    }

    /// Contour box of all members.
    pub fn bounds(&self) -> Rectangle {
        self.bounds
    }

    pub fn moments(&self) -> &Moments {
        &self.moments
    }

    pub fn centroid(&self) -> Option<(f64, f64)> {
        self.moments.centroid()
    }

    /// Weight in interline-squared units.
    pub fn normalized_weight(&self) -> f64 {
        let il = self.interline as f64;
        self.moments.weight() / (il * il)
    }

    pub fn normalized_width(&self) -> f64 {
        self.bounds.width as f64 / self.interline as f64
    }

    pub fn normalized_height(&self) -> f64 {
        self.bounds.height as f64 / self.interline as f64
    }

    // -- context set by later stages -----------------------------------------

    pub fn stem_count(&self) -> u8 {
        self.stem_count
    }

    pub fn set_stem_count(&mut self, count: u8) {
        self.stem_count = count;
    }

    pub fn has_ledger(&self) -> bool {
        self.with_ledger
    }

    pub fn set_ledger(&mut self, with_ledger: bool) {
        self.with_ledger = with_ledger;
    }

    /// Vertical position relative to the staff, in half interlines.
    pub fn pitch_position(&self) -> f64 {
        self.pitch_position
    }

    pub fn set_pitch_position(&mut self, position: f64) {
        self.pitch_position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lag::{Orientation, Run};

    fn gid(raw: u32) -> GlyphId {
        GlyphId::new(raw).unwrap()
    }

    fn lag_with_sections(count: usize) -> (Lag, Vec<SectionId>) {
        let mut lag = Lag::new("h", Orientation::Horizontal);
        let ids = (0..count)
            .map(|i| lag.create_section(Run::new(i * 10, 4, i)))
            .collect();
        (lag, ids)
    }

    #[test]
    fn link_back_establishes_ownership() {
        let (mut lag, ids) = lag_with_sections(2);
        let mut g = Glyph::new(gid(1), 8);
        g.add_section(ids[0], Linking::LinkBack, &mut lag).unwrap();
        g.add_section(ids[1], Linking::NoLink, &mut lag).unwrap();

        assert_eq!(lag.section(ids[0]).unwrap().owner(), Some(g.id()));
        assert_eq!(lag.section(ids[1]).unwrap().owner(), None);
        assert!(!g.is_active(&lag));

        g.link_all_sections(&mut lag).unwrap();
        assert!(g.is_active(&lag));
        assert_eq!(g.weight(), 8);
    }

    #[test]
    fn cut_does_not_steal_back() {
        let (mut lag, ids) = lag_with_sections(2);
        let mut a = Glyph::new(gid(1), 8);
        let mut b = Glyph::new(gid(2), 8);
        a.add_section(ids[0], Linking::LinkBack, &mut lag).unwrap();
        a.add_section(ids[1], Linking::LinkBack, &mut lag).unwrap();
        b.add_section(ids[1], Linking::LinkBack, &mut lag).unwrap();

        assert!(!a.is_active(&lag));
        assert_eq!(a.cut_sections(&mut lag).unwrap(), 1);
        assert_eq!(lag.section(ids[0]).unwrap().owner(), None);
        assert_eq!(lag.section(ids[1]).unwrap().owner(), Some(b.id()));
        assert!(b.is_active(&lag));
    }

    #[test]
    fn empty_glyph_is_never_active() {
        let (lag, _) = lag_with_sections(1);
        let g = Glyph::new(gid(1), 8);
        assert!(!g.is_active(&lag));
        assert_eq!(g.state(&lag), GlyphState::Created);
    }

    #[test]
    fn state_machine_follows_lifecycle() {
        let (mut lag, ids) = lag_with_sections(1);
        let mut g = Glyph::new(gid(1), 8);
        g.add_section(ids[0], Linking::NoLink, &mut lag).unwrap();
        assert_eq!(g.state(&lag), GlyphState::Created);

        g.link_all_sections(&mut lag).unwrap();
        assert_eq!(g.state(&lag), GlyphState::ActiveUnclassified);

        g.set_shape(Shape::Sharp, 1.5);
        assert_eq!(g.state(&lag), GlyphState::Classified);

        g.add_translation(Translation {
            kind: "accidental".into(),
            id: 4,
        });
        assert_eq!(g.state(&lag), GlyphState::Translated);

        g.cut_sections(&mut lag).unwrap();
        assert_eq!(g.state(&lag), GlyphState::Inactive);
    }

    #[test]
    fn alien_system_reports_first_mismatch() {
        let (mut lag, ids) = lag_with_sections(3);
        lag.set_system(ids[0], Some(SystemId(1))).unwrap();
        lag.set_system(ids[2], Some(SystemId(2))).unwrap();
        let mut g = Glyph::new(gid(1), 8);
        for &id in &ids {
            g.add_section(id, Linking::LinkBack, &mut lag).unwrap();
        }
        assert_eq!(g.alien_system(SystemId(1), &lag), Some(SystemId(2)));
        assert_eq!(g.alien_system(SystemId(2), &lag), Some(SystemId(1)));
        lag.set_system(ids[0], Some(SystemId(2))).unwrap();
        assert_eq!(g.alien_system(SystemId(2), &lag), None);
    }

    #[test]
    fn remove_section_recomputes_geometry() {
        let (mut lag, ids) = lag_with_sections(2);
        let mut g = Glyph::new(gid(1), 8);
        g.add_section(ids[0], Linking::LinkBack, &mut lag).unwrap();
        g.add_section(ids[1], Linking::LinkBack, &mut lag).unwrap();
        assert_eq!(g.bounds(), Rectangle::new(0, 0, 14, 2));

        assert!(g.remove_section(ids[0], Linking::LinkBack, &mut lag).unwrap());
        assert_eq!(g.bounds(), Rectangle::new(10, 1, 4, 1));
        assert_eq!(g.weight(), 4);
        assert_eq!(lag.section(ids[0]).unwrap().owner(), None);
        assert!(!g.remove_section(ids[0], Linking::LinkBack, &mut lag).unwrap());
    }

    #[test]
    fn outcome_drives_success() {
        let mut g = Glyph::new(gid(1), 8);
        assert!(!g.is_successful());
        g.set_outcome(Some(GlyphOutcome::TooSmall));
        assert!(!g.is_successful());
        g.set_outcome(Some(GlyphOutcome::Accepted));
        assert!(g.is_successful());
    }
}
