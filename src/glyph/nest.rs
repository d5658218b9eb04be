//! Glyph arena.
//!
//! The nest allocates glyph ids, stores glyphs, and keeps the two sides of
//! the compound tree (`parts` / `part_of`) consistent when asked to. Sticks
//! draw their ids from the same allocator so that section back-pointers
//! never collide.

use crate::error::{GlyphError, OmrResult};
use crate::lag::{Lag, Orientation, SectionId};

use super::{Glyph, GlyphId, GlyphState, Linking, Stick};

/// Arena of the glyphs built for one sheet.
#[derive(Debug)]
pub struct GlyphNest {
    interline: u32,
    glyphs: Vec<Option<Glyph>>,
    next_id: u32,
}

impl GlyphNest {
    pub fn new(interline: u32) -> Self {
        Self {
            interline: interline.max(1),
            glyphs: Vec::new(),
            next_id: 1,
        }
    }

    pub fn interline(&self) -> u32 {
        self.interline
    }

    fn allocate_id(&mut self) -> GlyphId {
        let id = GlyphId::new(self.next_id).expect("glyph ids start at 1");
        self.next_id += 1;
        id
    }

    fn slot(id: GlyphId) -> usize {
        id.get() as usize - 1
    }

    fn store(&mut self, glyph: Glyph) -> GlyphId {
        let id = glyph.id();
        let slot = Self::slot(id);
        if self.glyphs.len() <= slot {
            self.glyphs.resize_with(slot + 1, || None);
        }
        self.glyphs[slot] = Some(glyph);
        id
    }

    /// Register a new empty glyph.
    pub fn create_glyph(&mut self) -> GlyphId {
        let id = self.allocate_id();
        self.store(Glyph::new(id, self.interline))
    }

    /// An empty glyph with a fresh id, not registered in the nest.
    pub fn detached_glyph(&mut self) -> Glyph {
        let id = self.allocate_id();
        Glyph::new(id, self.interline)
    }

    /// Create a stick with a fresh id. Sticks live outside the nest.
    pub fn create_stick(&mut self, orientation: Orientation) -> Stick {
        Stick::new(self.detached_glyph(), orientation)
    }

    /// Register a glyph made of the given sections, linked back.
    pub fn add_glyph_from_sections(
        &mut self,
        sections: impl IntoIterator<Item = SectionId>,
        lag: &mut Lag,
    ) -> OmrResult<GlyphId> {
        let id = self.allocate_id();
        let mut glyph = Glyph::new(id, self.interline);
        for section in sections {
            glyph.add_section(section, Linking::LinkBack, lag)?;
        }
        Ok(self.store(glyph))
    }

    pub fn glyph(&self, id: GlyphId) -> Option<&Glyph> {
        self.glyphs.get(Self::slot(id)).and_then(Option::as_ref)
    }

    pub fn glyph_mut(&mut self, id: GlyphId) -> Option<&mut Glyph> {
        self.glyphs.get_mut(Self::slot(id)).and_then(Option::as_mut)
    }

    pub fn get(&self, id: GlyphId) -> Result<&Glyph, GlyphError> {
        self.glyph(id).ok_or(GlyphError::NotFound { id: id.get() })
    }

    pub fn get_mut(&mut self, id: GlyphId) -> Result<&mut Glyph, GlyphError> {
        self.glyph_mut(id).ok_or(GlyphError::NotFound { id: id.get() })
    }

    pub fn len(&self) -> usize {
        self.glyphs.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Glyph> {
        self.glyphs.iter().flatten()
    }

    /// Glyphs whose members all point back to them.
    pub fn active_glyphs<'a>(&'a self, lag: &'a Lag) -> impl Iterator<Item = &'a Glyph> + 'a {
        self.iter().filter(move |g| g.is_active(lag))
    }

    /// Lifecycle state of glyph `id`.
    pub fn state_of(&self, id: GlyphId, lag: &Lag) -> Result<GlyphState, GlyphError> {
        Ok(self.get(id)?.state(lag))
    }

    /// Add `section` to glyph `id`.
    pub fn add_section(
        &mut self,
        id: GlyphId,
        section: SectionId,
        linking: Linking,
        lag: &mut Lag,
    ) -> OmrResult<()> {
        self.get_mut(id)?.add_section(section, linking, lag)?;
        Ok(())
    }

    /// Merge the member sections of `from` into `into`.
    pub fn add_glyph_sections(
        &mut self,
        into: GlyphId,
        from: GlyphId,
        linking: Linking,
        lag: &mut Lag,
    ) -> OmrResult<()> {
        let sections: Vec<SectionId> = self.get(from)?.members().iter().copied().collect();
        let target = self.get_mut(into)?;
        for section in sections {
            target.add_section(section, linking, lag)?;
        }
        Ok(())
    }

    /// Make `child` a part of `parent`, updating both sides. A previous parent
    /// of `child` loses it from its parts.
    pub fn attach_part(&mut self, parent: GlyphId, child: GlyphId) -> OmrResult<()> {
        self.get(child)?;
        // Walking up from the parent must never reach the child.
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(GlyphError::CompoundCycle {
                    glyph: child.get(),
                    parent: parent.get(),
                }
                .into());
            }
            cursor = self.get(current)?.part_of();
        }

        if let Some(previous) = self.get(child)?.part_of() {
            if let Some(old) = self.glyph_mut(previous) {
                old.parts_mut().remove(&child);
            }
        }
        self.get_mut(parent)?.parts_mut().insert(child);
        self.get_mut(child)?.set_part_of(Some(parent));
        Ok(())
    }

    /// Detach `child` from its parent compound, if any.
    pub fn detach_part(&mut self, child: GlyphId) -> OmrResult<()> {
        if let Some(parent) = self.get_mut(child)?.part_of.take() {
            if let Some(p) = self.glyph_mut(parent) {
                p.parts_mut().remove(&child);
            }
        }
        Ok(())
    }

    /// Build a compound from `parts`: a new glyph owning the union of their
    /// sections (linked back), with every part attached to it.
    pub fn build_compound(&mut self, parts: &[GlyphId], lag: &mut Lag) -> OmrResult<GlyphId> {
        if parts.is_empty() {
            return Err(GlyphError::EmptyCompound.into());
        }
        for &part in parts {
            self.get(part)?;
        }

        let compound = self.create_glyph();
        for &part in parts {
            self.add_glyph_sections(compound, part, Linking::LinkBack, lag)?;
            self.attach_part(compound, part)?;
        }
        tracing::debug!(%compound, parts = parts.len(), "compound built");
        Ok(compound)
    }

    /// Remove a glyph from the nest, cutting its sections and detaching it
    /// from the compound tree.
    pub fn remove(&mut self, id: GlyphId, lag: &mut Lag) -> OmrResult<Glyph> {
        self.detach_part(id)?;
        let glyph = self.glyphs[Self::slot(id)]
            .take()
            .ok_or(GlyphError::NotFound { id: id.get() })?;
        glyph.cut_sections(lag)?;
        for &part in glyph.parts() {
            if let Some(p) = self.glyph_mut(part) {
                p.set_part_of(None);
            }
        }
        Ok(glyph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lag::Run;

    fn lag_with(count: usize) -> (Lag, Vec<SectionId>) {
        let mut lag = Lag::new("h", Orientation::Horizontal);
        let ids = (0..count)
            .map(|i| lag.create_section(Run::new(0, 3 + i, i * 2)))
            .collect();
        (lag, ids)
    }

    #[test]
    fn compound_merges_members_and_takes_ownership() {
        let (mut lag, s) = lag_with(3);
        let mut nest = GlyphNest::new(10);
        let a = nest.add_glyph_from_sections([s[0]], &mut lag).unwrap();
        let b = nest.add_glyph_from_sections([s[1], s[2]], &mut lag).unwrap();

        let c = nest.build_compound(&[a, b], &mut lag).unwrap();
        let compound = nest.get(c).unwrap();
        let expected: std::collections::BTreeSet<_> = s.iter().copied().collect();
        assert_eq!(compound.members(), &expected);
        assert_eq!(compound.parts().len(), 2);
        for &id in &s {
            assert_eq!(lag.section(id).unwrap().owner(), Some(c));
        }
        assert!(compound.is_active(&lag));
        assert!(!nest.get(a).unwrap().is_active(&lag));
        assert_eq!(nest.get(b).unwrap().part_of(), Some(c));
        assert_eq!(nest.state_of(a, &lag).unwrap(), GlyphState::Inactive);
    }

    #[test]
    fn cycles_are_rejected() {
        let (mut lag, s) = lag_with(2);
        let mut nest = GlyphNest::new(10);
        let a = nest.add_glyph_from_sections([s[0]], &mut lag).unwrap();
        let b = nest.add_glyph_from_sections([s[1]], &mut lag).unwrap();
        nest.attach_part(a, b).unwrap();
        let err = nest.attach_part(b, a).unwrap_err();
        assert!(matches!(
            err,
            crate::error::OmrError::Glyph(GlyphError::CompoundCycle { .. })
        ));
        assert!(nest.attach_part(a, a).is_err());
    }

    #[test]
    fn reattaching_moves_child_between_parents() {
        let mut nest = GlyphNest::new(10);
        let p1 = nest.create_glyph();
        let p2 = nest.create_glyph();
        let child = nest.create_glyph();
        nest.attach_part(p1, child).unwrap();
        nest.attach_part(p2, child).unwrap();
        assert!(nest.get(p1).unwrap().parts().is_empty());
        assert!(nest.get(p2).unwrap().parts().contains(&child));
        nest.detach_part(child).unwrap();
        assert_eq!(nest.get(child).unwrap().part_of(), None);
        assert!(nest.get(p2).unwrap().parts().is_empty());
    }

    #[test]
    fn remove_cuts_sections() {
        let (mut lag, s) = lag_with(1);
        let mut nest = GlyphNest::new(10);
        let a = nest.add_glyph_from_sections([s[0]], &mut lag).unwrap();
        let removed = nest.remove(a, &mut lag).unwrap();
        assert_eq!(removed.id(), a);
        assert!(nest.glyph(a).is_none());
        assert_eq!(lag.section(s[0]).unwrap().owner(), None);
        assert!(nest.is_empty());
    }

    #[test]
    fn sticks_never_reuse_glyph_ids() {
        let mut nest = GlyphNest::new(10);
        let g = nest.create_glyph();
        let stick = nest.create_stick(Orientation::Vertical);
        assert_ne!(stick.glyph().id(), g);
        assert!(nest.glyph(stick.glyph().id()).is_none());
    }

    #[test]
    fn empty_compound_is_an_error() {
        let (mut lag, _) = lag_with(0);
        let mut nest = GlyphNest::new(10);
        assert!(nest.build_compound(&[], &mut lag).is_err());
    }
}
