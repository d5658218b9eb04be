//! Persistence and recovery tests for the glyph network and the config.
//!
//! These tests verify that a trained network survives a store + reload
//! cycle and that unusable network files never prevent start-up.

use serde_json::json;

use omr_core::config::OmrConfig;
use omr_core::engine::Engine;
use omr_core::eval::{
    GlyphEvaluator, GlyphNetwork, NeuralNetwork, NoMonitor, PARAM_COUNT, StartingMode,
    TrainingParams, load_samples,
};
use omr_core::glyph::Glyph;
use omr_core::paths::OmrPaths;
use omr_core::shape::Shape;

fn small_config() -> OmrConfig {
    let mut config = OmrConfig::default();
    config.glyph.interline = 4;
    config.evaluator.hidden_count = Some(6);
    config.evaluator.epochs = 20;
    config.evaluator.quorum = 2;
    config
}

fn write_samples(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("samples.json");
    let samples = json!([
        {"shape": "Dot", "rows": ["##", "##"]},
        {"shape": "Stem", "rows": ["#", "#", "#", "#", "#", "#", "#", "#"], "stems": 1},
        {"shape": "WholeNote", "rows": [".####.", "##..##", ".####."]}
    ]);
    std::fs::write(&path, samples.to_string()).unwrap();
    path
}

#[test]
fn network_survives_marshal_round_trip() {
    let network = NeuralNetwork::seeded(4, 3, 2, TrainingParams::default(), 11).unwrap();
    let mut buffer = Vec::new();
    network.marshal(&mut buffer).unwrap();
    let restored = NeuralNetwork::unmarshal(buffer.as_slice()).unwrap();

    let input = [0.1, 0.4, 0.7, 1.0];
    let before = network.run(&input).unwrap();
    let after = restored.run(&input).unwrap();
    for (a, b) in before.iter().zip(&after) {
        assert!((a - b).abs() < 1e-12, "{a} vs {b}");
    }
    assert_eq!(restored.hidden_count(), 3);
}

#[test]
fn trained_network_is_reloaded_from_user_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = OmrPaths::rooted(dir.path());
    let config = small_config();
    let samples = write_samples(dir.path());

    let glyphs: Vec<Glyph>;
    let expected;
    // First session: train and store.
    {
        let mut engine = Engine::with_config(paths.clone(), config.clone()).unwrap();
        assert!(engine.network().origin().is_none());
        engine.set_network(GlyphNetwork::new(&config.evaluator, Some(5)).unwrap());

        glyphs = load_samples(&samples, config.glyph.interline).unwrap();
        let refs: Vec<&Glyph> = glyphs.iter().collect();
        let summary = engine
            .train(&refs, &mut NoMonitor, StartingMode::Scratch)
            .unwrap();
        assert!(summary.epochs > 0);
        assert!(paths.user_network_file().is_file());
        expected = engine.network().get_all_evaluations(&glyphs[1]);
    }

    // Second session: the stored network is picked up.
    {
        let engine = Engine::with_config(paths.clone(), config).unwrap();
        assert_eq!(engine.network().origin(), Some(paths.user_network_file().as_path()));
        let evaluations = engine.network().get_all_evaluations(&glyphs[1]);
        assert_eq!(evaluations.len(), Shape::TRAINABLE_COUNT);
        assert_eq!(evaluations[0].shape, expected[0].shape);
        assert!((evaluations[0].doubt - expected[0].doubt).abs() < 1e-9);
    }
}

#[test]
fn training_without_samples_keeps_packaged_network() {
    let dir = tempfile::TempDir::new().unwrap();
    let system = dir.path().join("system");
    let paths = OmrPaths::rooted(dir.path()).with_system_dir(&system);
    std::fs::create_dir_all(system.join("eval")).unwrap();
    let packaged = paths.default_network_file().unwrap();
    NeuralNetwork::seeded(PARAM_COUNT, 6, Shape::TRAINABLE_COUNT, TrainingParams::default(), 3)
        .unwrap()
        .store(&packaged)
        .unwrap();

    {
        let mut engine = Engine::with_config(paths.clone(), small_config()).unwrap();
        assert_eq!(engine.network().origin(), Some(packaged.as_path()));
        let summary = engine
            .train(&[], &mut NoMonitor, StartingMode::Incremental)
            .unwrap();
        assert!(!summary.did_train());
        assert!(!paths.user_network_file().exists());
    }

    let engine = Engine::with_config(paths.clone(), small_config()).unwrap();
    assert_eq!(engine.network().origin(), Some(packaged.as_path()));
}

#[test]
fn garbage_network_file_falls_back_to_fresh_network() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = OmrPaths::rooted(dir.path());
    paths.ensure_dirs().unwrap();
    std::fs::write(paths.user_network_file(), "{ not a network").unwrap();

    let network = GlyphNetwork::load(&paths, &small_config().evaluator).unwrap();
    assert!(network.origin().is_none());
    assert_eq!(network.network().output_count(), Shape::TRAINABLE_COUNT);
}

#[test]
fn mismatched_topology_falls_back_to_packaged_network() {
    let dir = tempfile::TempDir::new().unwrap();
    let system = dir.path().join("system");
    let paths = OmrPaths::rooted(dir.path()).with_system_dir(&system);
    paths.ensure_dirs().unwrap();
    std::fs::create_dir_all(system.join("eval")).unwrap();

    // User file: a valid network with the wrong shape count.
    NeuralNetwork::seeded(PARAM_COUNT, 4, 3, TrainingParams::default(), 1)
        .unwrap()
        .store(&paths.user_network_file())
        .unwrap();
    // Packaged file: a usable one.
    let packaged = paths.default_network_file().unwrap();
    NeuralNetwork::seeded(PARAM_COUNT, 4, Shape::TRAINABLE_COUNT, TrainingParams::default(), 2)
        .unwrap()
        .store(&packaged)
        .unwrap();

    let network = GlyphNetwork::load(&paths, &small_config().evaluator).unwrap();
    assert_eq!(network.origin(), Some(packaged.as_path()));
    assert_eq!(network.network().hidden_count(), 4);
}

#[test]
fn config_survives_save_and_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = OmrPaths::rooted(dir.path());
    let mut config = small_config();
    config.lag.max_delta_length = 7;
    config.batch.timeout_secs = 12;
    config.save(&paths.config_file()).unwrap();

    let loaded = OmrConfig::load_or_default(&paths).unwrap();
    assert_eq!(loaded, config);

    std::fs::write(paths.config_file(), "[lag]\nmax_delta_length = \"x\"\n").unwrap();
    assert!(OmrConfig::load_or_default(&paths).is_err());
}
