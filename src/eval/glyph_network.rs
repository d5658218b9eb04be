//! Neural glyph evaluator.
//!
//! [`GlyphNetwork`] wraps a [`NeuralNetwork`] of `PARAM_COUNT` inputs and one
//! output per trainable shape. Tiny glyphs are reported as noise without
//! running the network. For the others each output passes through the
//! [`ShapeChecker`] before becoming a doubt.
//!
//! ## Persistence
//!
//! [`GlyphNetwork::load`] tries the user network file, then the packaged one.
//! A file that cannot be read, or whose topology no longer matches the shape
//! taxonomy, is skipped with a warning. When nothing usable is found a fresh
//! untrained network is built.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::EvaluatorConfig;
use crate::error::{NetworkError, OmrResult};
use crate::glyph::Glyph;
use crate::paths::{OmrPaths, create_dir};
use crate::shape::Shape;

use super::checker::ShapeChecker;
use super::features::{PARAM_COUNT, feed_input};
use super::network::{NeuralNetwork, NoMonitor, StopReason, TrainingMonitor, TrainingParams, TrainingSummary};
use super::{EvalResult, Evaluation, GlyphEvaluator, sort_by_doubt};

/// Whether training starts from random weights or from the current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartingMode {
    Scratch,
    Incremental,
}

/// Observer of a glyph training run. Every method has a no-op default.
pub trait GlyphMonitor {
    /// `error` is the error of the previous epoch, 1.0 before the first.
    fn epoch_started(&mut self, _epoch: usize, _error: f64) {}

    fn epoch_ended(&mut self, _epoch: usize, _error: f64) {}

    fn glyph_processed(&mut self, _glyph: &Glyph) {}

    /// Polled between epochs.
    fn should_stop(&self) -> bool {
        false
    }
}

impl GlyphMonitor for NoMonitor {}

/// Logs the error every `every` epochs.
#[derive(Debug, Clone, Copy)]
pub struct LoggingMonitor {
    every: usize,
}

impl LoggingMonitor {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl GlyphMonitor for LoggingMonitor {
    fn epoch_ended(&mut self, epoch: usize, error: f64) {
        if epoch % self.every == 0 {
            tracing::info!(epoch, error, "training");
        }
    }
}

/// Adapts a [`GlyphMonitor`] to the sample-index callbacks of the network.
struct Relay<'a, 'g> {
    glyphs: &'a [&'g Glyph],
    monitor: &'a mut dyn GlyphMonitor,
}

impl TrainingMonitor for Relay<'_, '_> {
    fn epoch_started(&mut self, epoch: usize, error: f64) {
        self.monitor.epoch_started(epoch, error);
    }

    fn epoch_ended(&mut self, epoch: usize, error: f64) {
        self.monitor.epoch_ended(epoch, error);
    }

    fn sample_processed(&mut self, index: usize) {
        if let Some(glyph) = self.glyphs.get(index) {
            self.monitor.glyph_processed(glyph);
        }
    }

    fn should_stop(&self) -> bool {
        self.monitor.should_stop()
    }
}

fn training_params(config: &EvaluatorConfig) -> TrainingParams {
    TrainingParams {
        learning_rate: config.learning_rate,
        momentum: config.momentum,
        amplitude: config.amplitude,
        max_error: config.max_error,
        epochs: config.epochs,
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// The neural implementation of [`GlyphEvaluator`].
#[derive(Debug, Clone)]
pub struct GlyphNetwork {
    network: NeuralNetwork,
    checker: ShapeChecker,
    config: EvaluatorConfig,
    origin: Option<PathBuf>,
    seed: Option<u64>,
}

impl GlyphNetwork {
    /// A fresh, untrained network. `seed` makes weight init and shuffling
    /// reproducible.
    pub fn new(config: &EvaluatorConfig, seed: Option<u64>) -> EvalResult<Self> {
        let hidden = config.hidden_count.unwrap_or(Shape::TRAINABLE_COUNT);
        let mut rng = make_rng(seed);
        let network = NeuralNetwork::new(
            PARAM_COUNT,
            hidden,
            Shape::TRAINABLE_COUNT,
            training_params(config),
            &mut rng,
        )?;
        Ok(Self {
            network,
            checker: ShapeChecker::default(),
            config: config.clone(),
            origin: None,
            seed,
        })
    }

    /// Wrap an existing network, refusing one whose topology does not match
    /// the feature vector and the trainable shapes.
    pub fn from_network(network: NeuralNetwork, config: &EvaluatorConfig) -> EvalResult<Self> {
        if network.input_count() != PARAM_COUNT || network.output_count() != Shape::TRAINABLE_COUNT {
            return Err(NetworkError::Topology {
                message: format!(
                    "network is {} x {}, expected {} inputs and {} outputs",
                    network.input_count(),
                    network.output_count(),
                    PARAM_COUNT,
                    Shape::TRAINABLE_COUNT
                ),
            }
            .into());
        }
        Ok(Self {
            network,
            checker: ShapeChecker::default(),
            config: config.clone(),
            origin: None,
            seed: None,
        })
    }

    /// Load the first usable network among the user and packaged files,
    /// falling back to a fresh one.
    pub fn load(paths: &OmrPaths, config: &EvaluatorConfig) -> EvalResult<Self> {
        for path in paths.network_candidates() {
            if !path.is_file() {
                continue;
            }
            match NeuralNetwork::load(&path).map_err(Into::into).and_then(|n| Self::from_network(n, config)) {
                Ok(mut glyph_network) => {
                    tracing::info!(path = %path.display(), "glyph network loaded");
                    glyph_network.origin = Some(path);
                    return Ok(glyph_network);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding glyph network");
                }
            }
        }
        tracing::info!("no usable glyph network, starting untrained");
        Self::new(config, None)
    }

    /// Use a fixed seed for subsequent training shuffles and resets.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_checker(mut self, checker: ShapeChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn network(&self) -> &NeuralNetwork {
        &self.network
    }

    pub fn checker(&self) -> &ShapeChecker {
        &self.checker
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// File the network was loaded from, `None` for a fresh network.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn store(&self, path: &Path) -> EvalResult<()> {
        self.network.store(path)?;
        Ok(())
    }

    /// Store into the user network file, creating its directory.
    pub fn store_user(&self, paths: &OmrPaths) -> OmrResult<PathBuf> {
        let path = paths.user_network_file();
        if let Some(dir) = path.parent() {
            create_dir(dir)?;
        }
        self.store(&path)?;
        tracing::info!(path = %path.display(), "glyph network stored");
        Ok(path)
    }

    /// Doubt for every trainable shape when the glyph is too small to look at.
    fn noise_evaluations() -> Vec<Evaluation> {
        vec![Evaluation::new(Shape::Noise, Evaluation::NO_DOUBT); Shape::TRAINABLE_COUNT]
    }

    // -- training ------------------------------------------------------------

    /// Train on `glyphs`, each labelled by its current shape.
    ///
    /// Glyphs without a shape or with a logical shape are dropped with a
    /// warning. Every represented shape is oversampled up to the configured
    /// quorum, the population is shuffled, then back-propagation runs until
    /// convergence, the epoch limit, or a stop request from `monitor`.
    pub fn train(
        &mut self,
        glyphs: &[&Glyph],
        monitor: &mut dyn GlyphMonitor,
        mode: StartingMode,
    ) -> EvalResult<TrainingSummary> {
        let skipped = TrainingSummary {
            epochs: 0,
            error: 0.0,
            stop: StopReason::NoSamples,
        };
        if glyphs.is_empty() {
            tracing::warn!("no glyph to train on, network left untouched");
            return Ok(skipped);
        }

        let population = trainable_population(glyphs);
        if population.is_empty() {
            tracing::warn!("no trainable glyph left, network left untouched");
            return Ok(skipped);
        }

        let counts = shape_counts(&population);
        let missing: Vec<Shape> = Shape::trainable_shapes()
            .iter()
            .copied()
            .filter(|s| counts[*s as usize] == 0)
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                missing = missing.len(),
                first = %missing[0],
                "some trainable shapes have no sample"
            );
            for shape in &missing {
                tracing::debug!(%shape, "missing shape");
            }
        }

        let mut rng = make_rng(self.seed);
        let mut samples = oversample(&population, self.config.quorum);
        samples.shuffle(&mut rng);

        let mut inputs = Vec::with_capacity(samples.len());
        let mut desired = Vec::with_capacity(samples.len());
        for glyph in &samples {
            inputs.push(feed_input(glyph, None));
            let mut target = vec![0.0; Shape::TRAINABLE_COUNT];
            if let Some(index) = glyph.shape().and_then(Shape::trainable_index) {
                target[index] = 1.0;
            }
            desired.push(target);
        }

        self.network.set_params(training_params(&self.config));
        if mode == StartingMode::Scratch {
            self.network.reset(&mut rng);
        }

        tracing::info!(
            glyphs = glyphs.len(),
            samples = samples.len(),
            shapes = Shape::TRAINABLE_COUNT - missing.len(),
            ?mode,
            "training glyph network"
        );
        let mut relay = Relay {
            glyphs: &samples,
            monitor,
        };
        let summary = self.network.train(&inputs, &desired, &mut relay)?;
        Ok(summary)
    }
}

/// Drop glyphs that cannot be learned from.
fn trainable_population<'g>(glyphs: &[&'g Glyph]) -> Vec<&'g Glyph> {
    glyphs
        .iter()
        .copied()
        .filter(|glyph| match glyph.shape() {
            Some(shape) if shape.is_trainable() => true,
            Some(shape) => {
                tracing::warn!(glyph = %glyph.id(), %shape, "removing glyph with non-trainable shape");
                false
            }
            None => {
                tracing::warn!(glyph = %glyph.id(), "removing glyph without shape");
                false
            }
        })
        .collect()
}

fn shape_counts(glyphs: &[&Glyph]) -> Vec<usize> {
    let mut counts = vec![0; Shape::TRAINABLE_COUNT];
    for index in glyphs.iter().filter_map(|g| g.shape().and_then(Shape::trainable_index)) {
        counts[index] += 1;
    }
    counts
}

/// Replicate samples so that every represented trainable shape has at
/// least `quorum` of them. Samples of one shape are appended cyclically, in
/// their original order. The result is grouped by shape, not shuffled.
pub fn oversample<'g>(glyphs: &[&'g Glyph], quorum: usize) -> Vec<&'g Glyph> {
    let mut groups: Vec<Vec<&'g Glyph>> = vec![Vec::new(); Shape::TRAINABLE_COUNT];
    for &glyph in glyphs {
        if let Some(index) = glyph.shape().and_then(Shape::trainable_index) {
            groups[index].push(glyph);
        }
    }
    groups
        .into_iter()
        .filter(|group| !group.is_empty())
        .flat_map(|group| {
            let count = group.len().max(quorum);
            group.into_iter().cycle().take(count)
        })
        .collect()
}

impl GlyphEvaluator for GlyphNetwork {
    fn name(&self) -> &str {
        "neural"
    }

    fn get_all_evaluations(&self, glyph: &Glyph) -> Vec<Evaluation> {
        if glyph.normalized_weight() < self.config.min_weight {
            return Self::noise_evaluations();
        }

        let input = feed_input(glyph, None);
        let outputs = match self.network.run(&input) {
            Ok(outputs) => outputs,
            Err(e) => {
                tracing::error!(glyph = %glyph.id(), error = %e, "network evaluation failed");
                vec![0.0; Shape::TRAINABLE_COUNT]
            }
        };

        let mut evaluations: Vec<Evaluation> = Shape::trainable_shapes()
            .iter()
            .zip(&outputs)
            .map(|(&shape, &output)| {
                let doubt = if output > 0.0 && self.checker.specific_check(shape, glyph) {
                    1.0 / output
                } else {
                    Evaluation::INFINITE_DOUBT
                };
                Evaluation::new(shape, doubt)
            })
            .collect();
        sort_by_doubt(&mut evaluations);
        evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::{GlyphId, Linking};
    use crate::lag::{Lag, Orientation, Run};

    fn block(id: u32, width: usize, height: usize, shape: Option<Shape>) -> Glyph {
        let mut lag = Lag::new("h", Orientation::Horizontal);
        let mut glyph = Glyph::new(GlyphId::new(id).unwrap(), 10);
        for y in 0..height {
            let section = lag.create_section(Run::new(0, width, y));
            glyph.add_section(section, Linking::LinkBack, &mut lag).unwrap();
        }
        if let Some(shape) = shape {
            glyph.set_shape(shape, 0.0);
        }
        glyph
    }

    fn quick_config() -> EvaluatorConfig {
        EvaluatorConfig {
            hidden_count: Some(8),
            epochs: 3,
            ..EvaluatorConfig::default()
        }
    }

    #[test]
    fn evaluations_cover_every_trainable_shape_sorted() {
        let net = GlyphNetwork::new(&quick_config(), Some(5)).unwrap();
        let glyph = block(1, 12, 30, None);
        let all = net.get_all_evaluations(&glyph);
        assert_eq!(all.len(), Shape::TRAINABLE_COUNT);
        assert!(all.windows(2).all(|w| w[0].doubt <= w[1].doubt));
        let accepted: Vec<&Evaluation> = all.iter().filter(|e| !e.is_rejected()).collect();
        assert!(!accepted.is_empty());
        assert!(accepted.iter().all(|e| e.doubt > 1.0));
        assert!(all.iter().any(|e| e.shape == Shape::Dot && e.is_rejected()));
    }

    #[test]
    fn tiny_glyphs_are_noise() {
        let net = GlyphNetwork::new(&quick_config(), Some(5)).unwrap();
        let speck = block(1, 2, 2, None);
        let all = net.get_all_evaluations(&speck);
        assert_eq!(all.len(), Shape::TRAINABLE_COUNT);
        assert_eq!(all[0], Evaluation::new(Shape::Noise, Evaluation::NO_DOUBT));
        assert_eq!(net.best_evaluation(&speck).unwrap().shape, Shape::Noise);
    }

    #[test]
    fn oversampling_reaches_quorum_with_replicas() {
        let sharps: Vec<Glyph> = (1..=3).map(|i| block(i, 4, 10, Some(Shape::Sharp))).collect();
        let flats: Vec<Glyph> = (4..=15).map(|i| block(i, 4, 9, Some(Shape::Flat))).collect();
        let refs: Vec<&Glyph> = sharps.iter().chain(&flats).collect();

        let samples = oversample(&refs, 10);
        let sharp_samples: Vec<&&Glyph> = samples
            .iter()
            .filter(|g| g.shape() == Some(Shape::Sharp))
            .collect();
        assert_eq!(sharp_samples.len(), 10);
        assert!(sharp_samples.iter().all(|g| sharps.iter().any(|s| s.id() == g.id())));
        let flat_count = samples.iter().filter(|g| g.shape() == Some(Shape::Flat)).count();
        assert_eq!(flat_count, 12);
    }

    #[test]
    fn empty_or_untrainable_population_leaves_network_alone() {
        let mut net = GlyphNetwork::new(&quick_config(), Some(1)).unwrap();
        let before = net.network().clone();

        let summary = net.train(&[], &mut NoMonitor, StartingMode::Scratch).unwrap();
        assert_eq!(summary.stop, StopReason::NoSamples);

        let key = block(1, 20, 20, Some(Shape::KeySharp2));
        let unlabelled = block(2, 20, 20, None);
        let summary = net
            .train(&[&key, &unlabelled], &mut NoMonitor, StartingMode::Scratch)
            .unwrap();
        assert_eq!(summary.stop, StopReason::NoSamples);
        assert_eq!(net.network(), &before);
    }

    struct Counting {
        processed: usize,
        epochs: usize,
    }

    impl GlyphMonitor for Counting {
        fn epoch_ended(&mut self, _epoch: usize, _error: f64) {
            self.epochs += 1;
        }
        fn glyph_processed(&mut self, glyph: &Glyph) {
            assert_ne!(glyph.shape(), Some(Shape::KeySharp2));
            self.processed += 1;
        }
    }

    #[test]
    fn training_sees_every_oversampled_glyph() {
        let mut net = GlyphNetwork::new(&quick_config(), Some(2)).unwrap().with_seed(2);
        let sharp = block(1, 5, 14, Some(Shape::Sharp));
        let dot = block(2, 5, 5, Some(Shape::Dot));
        let key = block(3, 20, 14, Some(Shape::KeySharp2));
        let mut monitor = Counting {
            processed: 0,
            epochs: 0,
        };
        let summary = net
            .train(&[&sharp, &dot, &key], &mut monitor, StartingMode::Incremental)
            .unwrap();
        assert_eq!(summary.epochs, 3);
        assert_eq!(summary.stop, StopReason::EpochLimit);
        assert_eq!(monitor.epochs, 3);
        assert_eq!(monitor.processed, 3 * 20);
    }

    #[test]
    fn scratch_resets_weights_and_incremental_keeps_them() {
        let sharp = block(1, 5, 14, Some(Shape::Sharp));
        let dot = block(2, 5, 5, Some(Shape::Dot));
        let population = [&sharp, &dot];
        let mut net = GlyphNetwork::new(&quick_config(), Some(4)).unwrap().with_seed(4);
        net.train(&population, &mut NoMonitor, StartingMode::Incremental)
            .unwrap();

        let input = feed_input(&sharp, None);
        let trained = net.network().run(&input).unwrap();

        // With no epoch to run, only the starting mode touches the weights.
        let mut idle = net.clone();
        idle.config.epochs = 0;
        let mut incremental = idle.clone();
        let summary = incremental
            .train(&population, &mut NoMonitor, StartingMode::Incremental)
            .unwrap();
        assert_eq!(summary.epochs, 0);
        assert_eq!(incremental.network().run(&input).unwrap(), trained);

        let mut scratch = idle.clone().with_seed(99);
        scratch
            .train(&population, &mut NoMonitor, StartingMode::Scratch)
            .unwrap();
        assert_ne!(scratch.network().run(&input).unwrap(), trained);

        // One more epoch continues from the trained weights, deterministically.
        let mut first = net.clone();
        first.config.epochs = 1;
        let mut second = first.clone();
        first.train(&population, &mut NoMonitor, StartingMode::Incremental)
            .unwrap();
        second
            .train(&population, &mut NoMonitor, StartingMode::Incremental)
            .unwrap();
        assert_eq!(first.network(), second.network());
        assert_ne!(first.network().run(&input).unwrap(), trained);
    }

    #[test]
    fn mismatched_network_is_refused() {
        let small = NeuralNetwork::seeded(PARAM_COUNT, 4, 3, TrainingParams::default(), 1).unwrap();
        assert!(GlyphNetwork::from_network(small, &quick_config()).is_err());
    }
}
