//! omr CLI: optical music recognition core.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use omr_core::batch::{BatchStats, CancelToken, TaskOutcome};
use omr_core::config::OmrConfig;
use omr_core::engine::Engine;
use omr_core::eval::{Evaluation, GlyphEvaluator, LoggingMonitor, StartingMode, load_samples};
use omr_core::glyph::Glyph;
use omr_core::lag::Orientation;
use omr_core::paths::OmrPaths;
use omr_core::sheet::{Sheet, load_ascii};

#[derive(Parser)]
#[command(name = "omr", version, about = "Optical music recognition core")]
struct Cli {
    /// Keep config, data and cache under this single directory instead of
    /// the XDG locations.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Configuration file overriding the one in the config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the user directories and a default config file.
    Init,

    /// Show engine info.
    Info {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List shape ranges and their shapes.
    Ranges {
        /// Only show this range.
        #[arg(long)]
        name: Option<String>,
    },

    /// Build the lag and glyphs of one ASCII raster and classify them.
    Scan {
        /// Raster file made of `#` (foreground) and `.` (background).
        file: PathBuf,

        /// Scan columns instead of rows.
        #[arg(long)]
        vertical: bool,

        /// Hypotheses shown per glyph.
        #[arg(long, default_value = "3")]
        top: usize,
    },

    /// Train the glyph network from labelled samples and store it.
    Train {
        /// JSON array of samples.
        samples: PathBuf,

        /// Reinitialize the weights before training.
        #[arg(long)]
        scratch: bool,

        /// Seed for weight initialization and shuffling.
        #[arg(long)]
        seed: Option<u64>,

        /// Log progress every N epochs.
        #[arg(long, default_value = "100")]
        log_every: usize,
    },

    /// Process several rasters concurrently.
    Batch {
        /// Raster files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Scan columns instead of rows.
        #[arg(long)]
        vertical: bool,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let paths = match &cli.root {
        Some(root) => OmrPaths::rooted(root),
        None => OmrPaths::resolve().into_diagnostic()?,
    };

    match cli.command {
        Commands::Init => {
            paths.ensure_dirs().into_diagnostic()?;
            let file = paths.config_file();
            if file.is_file() {
                println!("Config already present at {}", file.display());
            } else {
                OmrConfig::default().save(&file).into_diagnostic()?;
                println!("Wrote default config to {}", file.display());
            }
        }

        Commands::Info { json } => {
            let info = open_engine(paths, cli.config.as_deref())?.info();
            if json {
                let text = serde_json::to_string_pretty(&info).into_diagnostic()?;
                println!("{text}");
            } else {
                println!("{info}");
            }
        }

        Commands::Ranges { name } => {
            let engine = open_engine(paths, cli.config.as_deref())?;
            let ranges: Vec<_> = match &name {
                Some(name) => match engine.ranges().get(name) {
                    Some(range) => vec![range],
                    None => miette::bail!("unknown shape range: {name}"),
                },
                None => engine.ranges().iter().collect(),
            };
            for range in ranges {
                println!(
                    "{} {} ({} shapes, shown as {})",
                    range.name(),
                    range.color(),
                    range.len(),
                    range.representative()
                );
                let names: Vec<_> = range.shapes().iter().map(|s| s.name()).collect();
                println!("  {}", names.join(", "));
            }
        }

        Commands::Scan {
            file,
            vertical,
            top,
        } => {
            let engine = open_engine(paths, cli.config.as_deref())?;
            let image = load_ascii(&file).into_diagnostic()?;
            let cancel = CancelToken::with_timeout(engine.config().batch.timeout());
            let name = file.display().to_string();
            match engine.process(&name, &image, orientation(vertical), &cancel) {
                TaskOutcome::Completed(sheet) => print_sheet(&sheet, engine.network(), top),
                TaskOutcome::Cancelled => miette::bail!("scan of {name} timed out"),
                TaskOutcome::Failed(e) => return Err(e.into()),
            }
        }

        Commands::Train {
            samples,
            scratch,
            seed,
            log_every,
        } => {
            let mut engine = open_engine(paths, cli.config.as_deref())?;
            let glyphs = load_samples(&samples, engine.config().glyph.interline).into_diagnostic()?;
            let refs: Vec<&Glyph> = glyphs.iter().collect();
            if let Some(seed) = seed {
                let seeded = engine.network().clone().with_seed(seed);
                engine.set_network(seeded);
            }
            let mode = if scratch {
                StartingMode::Scratch
            } else {
                StartingMode::Incremental
            };
            let mut monitor = LoggingMonitor::new(log_every);
            let summary = engine.train(&refs, &mut monitor, mode).into_diagnostic()?;
            println!(
                "Trained on {} samples: {} epochs, error {:.6} ({:?})",
                glyphs.len(),
                summary.epochs,
                summary.error,
                summary.stop
            );
            if summary.did_train() {
                println!("Stored network at {}", engine.paths().user_network_file().display());
            }
        }

        Commands::Batch { files, vertical } => {
            let engine = open_engine(paths, cli.config.as_deref())?;
            let reports = engine
                .process_files(&files, orientation(vertical))
                .into_diagnostic()?;
            for report in &reports {
                match &report.outcome {
                    TaskOutcome::Completed(sheet) => {
                        let s = sheet.summary();
                        println!(
                            "  ok        {} ({:.2?}): {} sections, {} glyphs, {} classified, {} noise",
                            report.name, report.elapsed, s.sections, s.glyphs, s.classified, s.noise
                        );
                    }
                    TaskOutcome::Cancelled => println!("  cancelled {}", report.name),
                    TaskOutcome::Failed(e) => println!("  failed    {}: {e}", report.name),
                }
            }
            let stats = BatchStats::from_reports(&reports);
            println!(
                "{} completed, {} cancelled, {} failed",
                stats.completed, stats.cancelled, stats.failed
            );
        }
    }

    Ok(())
}

/// Build the engine from an explicit config file or the one under `paths`.
fn open_engine(paths: OmrPaths, config: Option<&Path>) -> Result<Engine> {
    let config = match config {
        Some(file) => OmrConfig::load(file).into_diagnostic()?,
        None => OmrConfig::load_or_default(&paths).into_diagnostic()?,
    };
    Engine::with_config(paths, config).into_diagnostic()
}

fn orientation(vertical: bool) -> Orientation {
    if vertical {
        Orientation::Vertical
    } else {
        Orientation::Horizontal
    }
}

fn print_sheet(sheet: &Sheet, evaluator: &dyn GlyphEvaluator, top: usize) {
    let summary = sheet.summary();
    println!(
        "{}: {} sections, {} junctions, {} glyphs ({} classified, {} noise)",
        sheet.name(),
        summary.sections,
        summary.junctions,
        summary.glyphs,
        summary.classified,
        summary.noise
    );
    for glyph in sheet.glyphs() {
        let b = glyph.bounds();
        let outcome = glyph
            .outcome()
            .map(|o| o.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  glyph {} at ({}, {}) {}x{} weight {} [{}]",
            glyph.id(),
            b.x,
            b.y,
            b.width,
            b.height,
            glyph.weight(),
            outcome
        );
        let hypotheses = evaluator.top_evaluations(glyph, top, Evaluation::INFINITE_DOUBT);
        for eval in hypotheses {
            println!("      {eval}");
        }
    }
}
