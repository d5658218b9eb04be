//! Glyph retrieval from connected sections.

use crate::error::OmrResult;
use crate::lag::{Lag, SectionId};

use super::{GlyphId, GlyphNest};

/// Builds one glyph per group of connected, still unowned sections.
pub struct GlyphsBuilder<'a> {
    nest: &'a mut GlyphNest,
    min_weight: usize,
}

impl<'a> GlyphsBuilder<'a> {
    pub fn new(nest: &'a mut GlyphNest) -> Self {
        Self {
            nest,
            min_weight: 1,
        }
    }

    /// Skip components lighter than `weight` pixels. They stay unowned.
    pub fn with_min_weight(mut self, weight: usize) -> Self {
        self.min_weight = weight.max(1);
        self
    }

    /// Group the free sections of `lag` and register the resulting glyphs,
    /// every member linked back. Sections already owned by a glyph are left
    /// alone and also split components: a component is only the part of a
    /// junction-connected group made of free sections reachable through
    /// free sections.
    pub fn build(self, lag: &mut Lag) -> OmrResult<Vec<GlyphId>> {
        let groups = free_components(lag);
        let mut built = Vec::with_capacity(groups.len());
        let mut skipped = 0usize;
        for group in groups {
            let weight: usize = group
                .iter()
                .filter_map(|&id| lag.section(id))
                .map(|s| s.weight())
                .sum();
            if weight < self.min_weight {
                skipped += 1;
                continue;
            }
            built.push(self.nest.add_glyph_from_sections(group, lag)?);
        }
        tracing::debug!(
            lag = lag.name(),
            glyphs = built.len(),
            skipped,
            "glyphs retrieved"
        );
        Ok(built)
    }
}

/// Connected groups of free sections, walking junctions through free
/// sections only. Groups are sorted internally and by smallest id.
fn free_components(lag: &Lag) -> Vec<Vec<SectionId>> {
    let mut visited = vec![false; lag.len()];
    let mut groups = Vec::new();
    for section in lag.free_sections() {
        let start = section.id();
        if visited[start.get() as usize] {
            continue;
        }
        visited[start.get() as usize] = true;
        let mut group = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            group.push(id);
            for next in lag.neighbors(id) {
                let free = lag.section(next).is_some_and(|s| s.owner().is_none());
                if free && !visited[next.get() as usize] {
                    visited[next.get() as usize] = true;
                    stack.push(next);
                }
            }
        }
        group.sort();
        groups.push(group);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::Linking;
    use crate::lag::builder::build_lag;
    use crate::lag::{BinaryImage, JunctionAllPolicy, Orientation, RunTable};

    fn lag_of(ascii: &str) -> Lag {
        let image = BinaryImage::from_ascii(ascii).unwrap();
        let table = RunTable::from_image(&image, Orientation::Horizontal, 1);
        build_lag("h", &table, JunctionAllPolicy).unwrap()
    }

    #[test]
    fn one_glyph_per_connected_blob() {
        let mut lag = lag_of(
            "##....#\n\
             ##....#\n\
             ......#\n\
             ###....\n",
        );
        let mut nest = GlyphNest::new(4);
        let ids = GlyphsBuilder::new(&mut nest).build(&mut lag).unwrap();
        assert_eq!(ids.len(), 3);
        let weights: Vec<usize> = ids.iter().map(|&id| nest.get(id).unwrap().weight()).collect();
        assert_eq!(weights, vec![4, 3, 3]);
        for &id in &ids {
            assert!(nest.get(id).unwrap().is_active(&lag));
        }
        assert_eq!(lag.free_sections().count(), 0);
    }

    #[test]
    fn owned_sections_are_not_regrouped() {
        let mut lag = lag_of(
            "######\n\
             ##..##\n",
        );
        let mut nest = GlyphNest::new(4);
        let branch = lag.sections()[1].id();
        let taken = nest.create_glyph();
        nest.add_section(taken, branch, Linking::LinkBack, &mut lag)
            .unwrap();

        let ids = GlyphsBuilder::new(&mut nest).build(&mut lag).unwrap();
        assert_eq!(ids.len(), 1);
        let glyph = nest.get(ids[0]).unwrap();
        assert!(!glyph.contains(branch));
        assert_eq!(glyph.members().len(), 2);
    }

    #[test]
    fn light_components_stay_free() {
        let mut lag = lag_of(
            "#....\n\
             ..###\n",
        );
        let mut nest = GlyphNest::new(4);
        let ids = GlyphsBuilder::new(&mut nest)
            .with_min_weight(2)
            .build(&mut lag)
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(lag.free_sections().count(), 1);
    }
}
