//! Line Adjacency Graph (LAG).
//!
//! A [`Lag`] owns every [`Section`] built for one scan orientation of a sheet,
//! plus the junction edges between sections that touch across consecutive
//! scan lines. Sections live in a flat arena addressed by [`SectionId`]; the
//! owning glyph is recorded as an index (`Option<GlyphId>`), never as a
//! reference, so glyph ownership can be flipped without borrowing glyphs.
//!
//! ## Components
//!
//! - [`run`]: runs, binary rasters, run tables
//! - [`junction`]: policies deciding whether a run extends a section
//! - [`builder`]: scan-by-scan section construction

pub mod builder;
pub mod junction;
pub mod run;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::error::LagError;
use crate::geom::Rectangle;
use crate::glyph::GlyphId;

pub use builder::SectionsBuilder;
pub use junction::{JunctionAllPolicy, JunctionDeltaPolicy, JunctionPolicy, JunctionRatioPolicy};
pub use run::{BinaryImage, Run, RunTable};

/// Result type for lag operations.
pub type LagResult<T> = std::result::Result<T, LagError>;

/// Scan orientation of a lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Runs are horizontal: scan index is `y`, run positions are `x`.
    Horizontal,
    /// Runs are vertical: scan index is `x`, run positions are `y`.
    Vertical,
}

impl Orientation {
    /// Absolute `(x, y)` of a position on a scan line.
    pub fn absolute(self, scan: usize, pos: usize) -> (usize, usize) {
        match self {
            Orientation::Horizontal => (pos, scan),
            Orientation::Vertical => (scan, pos),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Horizontal => write!(f, "horizontal"),
            Orientation::Vertical => write!(f, "vertical"),
        }
    }
}

/// Index of a section inside its lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SectionId(u32);

impl SectionId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "section:{}", self.0)
    }
}

/// Identifier of the system (group of staves) a section was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(pub u32);

impl std::fmt::Display for SystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "system:{}", self.0)
    }
}

/// An ordered stack of runs on consecutive scan lines.
#[derive(Debug, Clone)]
pub struct Section {
    id: SectionId,
    orientation: Orientation,
    runs: Vec<Run>,
    weight: usize,
    bounds: Rectangle,
    owner: Option<GlyphId>,
    system: Option<SystemId>,
}

impl Section {
    fn new(id: SectionId, orientation: Orientation, first: Run) -> Self {
        let mut section = Self {
            id,
            orientation,
            runs: Vec::new(),
            weight: 0,
            bounds: Rectangle::default(),
            owner: None,
            system: None,
        };
        section.append_run(first);
        section
    }

    /// Append a run on the next scan line.
    fn append_run(&mut self, run: Run) {
        debug_assert!(
            self.runs.last().is_none_or(|last| last.scan() + 1 == run.scan()),
            "runs of a section must sit on consecutive scan lines"
        );
        self.weight += run.length();
        let (x, y) = self.orientation.absolute(run.scan(), run.start());
        let run_box = match self.orientation {
            Orientation::Horizontal => Rectangle::new(x, y, run.length(), 1),
            Orientation::Vertical => Rectangle::new(x, y, 1, run.length()),
        };
        self.bounds = self.bounds.union(&run_box);
        self.runs.push(run);
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn first_run(&self) -> &Run {
        &self.runs[0]
    }

    pub fn last_run(&self) -> &Run {
        &self.runs[self.runs.len() - 1]
    }

    pub fn first_scan(&self) -> usize {
        self.first_run().scan()
    }

    pub fn last_scan(&self) -> usize {
        self.last_run().scan()
    }

    /// Pixel count.
    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn bounds(&self) -> Rectangle {
        self.bounds
    }

    pub fn mean_run_length(&self) -> f64 {
        self.weight as f64 / self.runs.len() as f64
    }

    /// Glyph currently owning this section, if any.
    pub fn owner(&self) -> Option<GlyphId> {
        self.owner
    }

    pub fn system(&self) -> Option<SystemId> {
        self.system
    }

    /// Absolute `(x, y)` coordinates of every pixel.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let orientation = self.orientation;
        self.runs.iter().flat_map(move |run| {
            (run.start()..run.start() + run.length())
                .map(move |pos| orientation.absolute(run.scan(), pos))
        })
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        if !self.bounds.contains(x, y) {
            return false;
        }
        let (scan, pos) = match self.orientation {
            Orientation::Horizontal => (y, x),
            Orientation::Vertical => (x, y),
        };
        self.runs
            .get(scan - self.first_scan())
            .is_some_and(|run| pos >= run.start() && pos <= run.stop())
    }
}

/// The section graph for one orientation of a sheet.
pub struct Lag {
    name: String,
    orientation: Orientation,
    sections: Vec<Section>,
    graph: DiGraph<SectionId, ()>,
}

impl Lag {
    pub fn new(name: impl Into<String>, orientation: Orientation) -> Self {
        Self {
            name: name.into(),
            orientation,
            sections: Vec::new(),
            graph: DiGraph::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.index())
    }

    /// Like [`Lag::section`], with an error for unknown ids.
    pub fn get(&self, id: SectionId) -> LagResult<&Section> {
        self.section(id)
            .ok_or(LagError::SectionNotFound { id: id.get() })
    }

    fn get_mut(&mut self, id: SectionId) -> LagResult<&mut Section> {
        self.sections
            .get_mut(id.index())
            .ok_or(LagError::SectionNotFound { id: id.get() })
    }

    /// Start a new section with a single run.
    pub(crate) fn create_section(&mut self, run: Run) -> SectionId {
        let id = SectionId(self.sections.len() as u32);
        self.sections.push(Section::new(id, self.orientation, run));
        let node = self.graph.add_node(id);
        debug_assert_eq!(node.index(), id.index());
        id
    }

    pub(crate) fn extend_section(&mut self, id: SectionId, run: Run) -> LagResult<()> {
        self.get_mut(id)?.append_run(run);
        Ok(())
    }

    /// Record that `target` starts right after `source` ended, touching it.
    pub(crate) fn add_junction(&mut self, source: SectionId, target: SectionId) {
        let (s, t) = (NodeIndex::new(source.index()), NodeIndex::new(target.index()));
        if self.graph.find_edge(s, t).is_none() {
            self.graph.add_edge(s, t, ());
        }
    }

    pub fn junction_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Sections touching `id` on the preceding scan side.
    pub fn sources(&self, id: SectionId) -> Vec<SectionId> {
        self.adjacent(id, Direction::Incoming)
    }

    /// Sections touching `id` on the following scan side.
    pub fn targets(&self, id: SectionId) -> Vec<SectionId> {
        self.adjacent(id, Direction::Outgoing)
    }

    /// All sections touching `id`, sources first.
    pub fn neighbors(&self, id: SectionId) -> Vec<SectionId> {
        let mut all = self.sources(id);
        all.extend(self.targets(id));
        all
    }

    fn adjacent(&self, id: SectionId, direction: Direction) -> Vec<SectionId> {
        if id.index() >= self.sections.len() {
            return Vec::new();
        }
        let mut ids: Vec<SectionId> = self
            .graph
            .neighbors_directed(NodeIndex::new(id.index()), direction)
            .map(|n| self.graph[n])
            .collect();
        ids.sort();
        ids
    }

    /// Groups of sections connected through junctions, each sorted by id,
    /// ordered by their smallest id.
    pub fn connected_components(&self) -> Vec<Vec<SectionId>> {
        let mut sets = UnionFind::<usize>::new(self.sections.len());
        for edge in self.graph.raw_edges() {
            sets.union(edge.source().index(), edge.target().index());
        }
        let mut groups: std::collections::BTreeMap<usize, Vec<SectionId>> =
            std::collections::BTreeMap::new();
        for section in &self.sections {
            groups
                .entry(sets.find(section.id.index()))
                .or_default()
                .push(section.id);
        }
        let mut components: Vec<Vec<SectionId>> = groups.into_values().collect();
        components.sort_by_key(|c| c[0]);
        components
    }

    /// Sections whose bounds intersect `area`.
    pub fn sections_in(&self, area: &Rectangle) -> Vec<SectionId> {
        self.sections
            .iter()
            .filter(|s| s.bounds.intersects(area))
            .map(|s| s.id)
            .collect()
    }

    /// Set or clear the owning glyph of a section.
    pub(crate) fn set_owner(&mut self, id: SectionId, owner: Option<GlyphId>) -> LagResult<()> {
        self.get_mut(id)?.owner = owner;
        Ok(())
    }

    /// Clear the owner only if it is still `expected`.
    pub(crate) fn release_owner(&mut self, id: SectionId, expected: GlyphId) -> LagResult<bool> {
        let section = self.get_mut(id)?;
        if section.owner == Some(expected) {
            section.owner = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Assign a section to a system.
    pub fn set_system(&mut self, id: SectionId, system: Option<SystemId>) -> LagResult<()> {
        self.get_mut(id)?.system = system;
        Ok(())
    }

    /// Sections not owned by any glyph.
    pub fn free_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.owner.is_none())
    }

    /// Total foreground pixels in the lag.
    pub fn weight(&self) -> usize {
        self.sections.iter().map(Section::weight).sum()
    }
}

impl std::fmt::Debug for Lag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lag")
            .field("name", &self.name)
            .field("orientation", &self.orientation)
            .field("sections", &self.sections.len())
            .field("junctions", &self.graph.edge_count())
            .finish()
    }
}
