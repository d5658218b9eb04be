//! Scan-by-scan section construction.
//!
//! For each pair of consecutive scan lines the builder looks at run overlaps.
//! A run extends the section of the previous run only when the two runs are
//! each other's unique overlap and the junction policy agrees. Every other
//! run starts a new section, linked by a junction edge to each previous
//! section it touches. Boundaries once drawn are never revisited.

use crate::error::LagError;

use super::junction::JunctionPolicy;
use super::run::{Run, RunTable};
use super::{Lag, LagResult, SectionId};

/// Incrementally grows the sections of a [`Lag`].
pub struct SectionsBuilder<'a, P: JunctionPolicy> {
    lag: &'a mut Lag,
    policy: P,
    /// Runs of the last processed scan line with the section each ended up in.
    previous: Vec<(Run, SectionId)>,
    previous_scan: Option<usize>,
    created: Vec<SectionId>,
}

impl<'a, P: JunctionPolicy> SectionsBuilder<'a, P> {
    pub fn new(lag: &'a mut Lag, policy: P) -> Self {
        Self {
            lag,
            policy,
            previous: Vec::new(),
            previous_scan: None,
            created: Vec::new(),
        }
    }

    /// Process one scan line. `runs` must be sorted by start and all carry
    /// the given scan index; scans must arrive in strictly ascending order.
    pub fn add_scan(&mut self, scan: usize, runs: &[Run]) -> LagResult<()> {
        if let Some(previous) = self.previous_scan {
            if scan <= previous {
                return Err(LagError::ScanOrder { scan, previous });
            }
            if scan != previous + 1 {
                self.previous.clear();
            }
        }

        let runs: Vec<Run> = runs.iter().copied().filter(|r| !r.is_empty()).collect();

        // How many current runs each previous run touches.
        let successor_counts: Vec<usize> = self
            .previous
            .iter()
            .map(|(prev, _)| runs.iter().filter(|r| r.overlaps(prev)).count())
            .collect();

        let mut current = Vec::with_capacity(runs.len());
        for run in runs {
            let touching: Vec<usize> = self
                .previous
                .iter()
                .enumerate()
                .filter(|(_, (prev, _))| prev.overlaps(&run))
                .map(|(i, _)| i)
                .collect();

            let extended = match touching.as_slice() {
                [only] if successor_counts[*only] == 1 => {
                    let section_id = self.previous[*only].1;
                    let section = self.lag.get(section_id)?;
                    if self.policy.consistent_run(&run, section) {
                        self.lag.extend_section(section_id, run)?;
                        Some(section_id)
                    } else {
                        None
                    }
                }
                _ => None,
            };

            let section_id = match extended {
                Some(id) => id,
                None => {
                    let id = self.lag.create_section(run);
                    self.created.push(id);
                    for &i in &touching {
                        self.lag.add_junction(self.previous[i].1, id);
                    }
                    id
                }
            };
            current.push((run, section_id));
        }

        self.previous = current;
        self.previous_scan = Some(scan);
        Ok(())
    }

    /// Process every scan line of a run table.
    pub fn add_table(&mut self, table: &RunTable) -> LagResult<()> {
        for (scan, runs) in table.iter() {
            self.add_scan(scan, runs)?;
        }
        Ok(())
    }

    /// Finish and return the ids of the sections created by this builder.
    pub fn finish(self) -> Vec<SectionId> {
        tracing::debug!(
            lag = self.lag.name(),
            sections = self.created.len(),
            junctions = self.lag.junction_count(),
            "sections built"
        );
        self.created
    }
}

/// Build a whole lag from a run table in one call.
pub fn build_lag<P: JunctionPolicy>(
    name: impl Into<String>,
    table: &RunTable,
    policy: P,
) -> LagResult<Lag> {
    let mut lag = Lag::new(name, table.orientation());
    let mut builder = SectionsBuilder::new(&mut lag, policy);
    builder.add_table(table)?;
    builder.finish();
    Ok(lag)
}
