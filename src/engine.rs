//! Engine facade: the recognition context built once per process.
//!
//! The `Engine` owns the resolved paths, the configuration, the shape range
//! table and the glyph network, and hands them to the sheet pipeline and the
//! batch runner. Nothing in the crate keeps these as global state.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::batch::{BatchRunner, CancelToken, TaskOutcome, TaskReport};
use crate::config::OmrConfig;
use crate::error::OmrResult;
use crate::eval::{GlyphMonitor, GlyphNetwork, StartingMode, TrainingSummary};
use crate::glyph::Glyph;
use crate::lag::{BinaryImage, Orientation};
use crate::paths::OmrPaths;
use crate::shape::{Shape, ShapeRanges};
use crate::sheet::{Sheet, SheetProcessor, load_ascii};

/// The recognition context.
pub struct Engine {
    paths: OmrPaths,
    config: OmrConfig,
    ranges: ShapeRanges,
    network: GlyphNetwork,
}

impl Engine {
    /// Load the configuration and the glyph network found under `paths`.
    pub fn open(paths: OmrPaths) -> OmrResult<Self> {
        let config = OmrConfig::load_or_default(&paths)?;
        Self::with_config(paths, config)
    }

    /// Build the context from an explicit configuration.
    pub fn with_config(paths: OmrPaths, config: OmrConfig) -> OmrResult<Self> {
        config.validate()?;
        let network = GlyphNetwork::load(&paths, &config.evaluator)?;
        tracing::info!(
            shapes = Shape::ALL.len(),
            trainable = Shape::TRAINABLE_COUNT,
            trained = network.origin().is_some(),
            "initializing omr engine"
        );
        Ok(Self {
            paths,
            config,
            ranges: ShapeRanges::standard(),
            network,
        })
    }

    pub fn paths(&self) -> &OmrPaths {
        &self.paths
    }

    pub fn config(&self) -> &OmrConfig {
        &self.config
    }

    pub fn ranges(&self) -> &ShapeRanges {
        &self.ranges
    }

    pub fn network(&self) -> &GlyphNetwork {
        &self.network
    }

    /// Replace the glyph network, e.g. with a seeded one.
    pub fn set_network(&mut self, network: GlyphNetwork) {
        self.network = network;
    }

    /// Run the sheet pipeline on one raster.
    pub fn process(
        &self,
        name: &str,
        image: &BinaryImage,
        orientation: Orientation,
        cancel: &CancelToken,
    ) -> TaskOutcome<Sheet> {
        SheetProcessor::new(&self.config, &self.network)
            .with_orientation(orientation)
            .process(name, image, cancel)
    }

    /// Process several ASCII raster files on the bounded pool, under the
    /// configured deadline.
    pub fn process_files(
        &self,
        files: &[impl AsRef<Path>],
        orientation: Orientation,
    ) -> OmrResult<Vec<TaskReport<Sheet>>> {
        let runner = BatchRunner::new(&self.config.batch)?;
        let tasks = files
            .iter()
            .map(|f| {
                let path = f.as_ref().to_path_buf();
                (path.display().to_string(), path)
            })
            .collect();
        let processor = SheetProcessor::new(&self.config, &self.network).with_orientation(orientation);
        Ok(runner.run(tasks, |path: PathBuf, cancel| {
            let name = path.display().to_string();
            match load_ascii(&path) {
                Ok(image) => processor.process(&name, &image, cancel),
                Err(e) => TaskOutcome::Failed(e.into()),
            }
        }))
    }

    /// Train the glyph network and persist it to the user network file. A run
    /// that was cancelled or had nothing to learn leaves the file alone.
    pub fn train(
        &mut self,
        glyphs: &[&Glyph],
        monitor: &mut dyn GlyphMonitor,
        mode: StartingMode,
    ) -> OmrResult<TrainingSummary> {
        let summary = self.network.train(glyphs, monitor, mode)?;
        if summary.did_train() {
            self.network.store_user(&self.paths)?;
        } else {
            tracing::info!(stop = ?summary.stop, "network not stored");
        }
        Ok(summary)
    }

    pub fn info(&self) -> EngineInfo {
        let network = self.network.network();
        EngineInfo {
            config_file: self.paths.config_file().display().to_string(),
            network_file: self.network.origin().map(|p| p.display().to_string()),
            shape_count: Shape::ALL.len(),
            trainable_count: Shape::TRAINABLE_COUNT,
            range_count: self.ranges.len(),
            inputs: network.input_count(),
            hidden: network.hidden_count(),
            outputs: network.output_count(),
            threads: self.config.batch.threads,
            timeout_secs: self.config.batch.timeout_secs,
        }
    }
}

/// Snapshot of the engine state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub config_file: String,
    pub network_file: Option<String>,
    pub shape_count: usize,
    pub trainable_count: usize,
    pub range_count: usize,
    pub inputs: usize,
    pub hidden: usize,
    pub outputs: usize,
    pub threads: usize,
    pub timeout_secs: u64,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "omr engine info")?;
        writeln!(f, "  config:       {}", self.config_file)?;
        match &self.network_file {
            Some(path) => writeln!(f, "  network:      {path}")?,
            None => writeln!(f, "  network:      (untrained)")?,
        }
        writeln!(
            f,
            "  topology:     {} -> {} -> {}",
            self.inputs, self.hidden, self.outputs
        )?;
        writeln!(
            f,
            "  shapes:       {} ({} trainable)",
            self.shape_count, self.trainable_count
        )?;
        writeln!(f, "  ranges:       {}", self.range_count)?;
        writeln!(f, "  threads:      {}", self.threads)?;
        writeln!(f, "  timeout:      {}s", self.timeout_secs)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("paths", &self.paths)
            .field("config", &self.config)
            .field("ranges", &self.ranges.len())
            .field("network", &self.network.origin())
            .finish()
    }
}
