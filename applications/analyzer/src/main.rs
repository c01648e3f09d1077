//! Soul Analyzer - tempo and ReplayGain analysis from the command line

mod report;

use anyhow::{bail, Context, Result};
use clap::Parser;
use report::{AlbumReport, FileReport, GainReport};
use soul_audio::SymphoniaEngine;
use soul_core::AudioEngine;
use soul_engine::{
    CancellationToken, EngineBootstrap, EngineConfig, GainAnalyzer, PluginStrategy, TempoAnalyzer,
};
use soul_loudness::{ReplayGainCalculator, TrackLoudness};
use soul_native::{DirectoryBundle, LibraryProvisioner, ProvisionerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "soul-analyze")]
#[command(about = "Detect tempo and measure ReplayGain of audio files", long_about = None)]
struct Cli {
    /// Audio files to analyze
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Detect tempo
    #[arg(long)]
    tempo: bool,

    /// Measure loudness and ReplayGain
    #[arg(long)]
    gain: bool,

    /// Engine configuration file
    #[arg(short, long, env = "SOUL_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the native libraries (defaults to the executable's directory)
    #[arg(long, env = "SOUL_NATIVE_DIR")]
    native_dir: Option<PathBuf>,

    /// Load every provisioned plugin instead of the format plugins only
    #[arg(long)]
    all_plugins: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Neither flag means both analyses
    fn analyses(&self) -> (bool, bool) {
        if self.tempo || self.gain {
            (self.tempo, self.gain)
        } else {
            (true, true)
        }
    }

    fn native_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.native_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe().context("Failed to locate the executable")?;
        exe.parent()
            .map(PathBuf::from)
            .context("Executable has no parent directory")
    }
}

/// Run the requested analyses on one file
///
/// Analysis failures land in the report; the error is reserved for a
/// worker task that could not be joined.
async fn analyze_file(
    tempo: &TempoAnalyzer,
    gain: &GainAnalyzer,
    path: &Path,
    want_tempo: bool,
    want_gain: bool,
    cancel: &CancellationToken,
) -> Result<(FileReport, Option<TrackLoudness>)> {
    let mut report = FileReport::new(path);
    let mut loudness = None;

    if want_tempo {
        let analyzer = tempo.clone();
        let file = path.to_path_buf();
        let token = cancel.clone();
        let detected =
            tokio::task::spawn_blocking(move || analyzer.try_detect(&file, None, Some(&token)))
                .await?;
        match detected {
            Ok(bpm) => report.bpm = Some(bpm),
            Err(e) => report.errors.push(e.to_string()),
        }
    }

    if want_gain {
        let analyzer = gain.clone();
        let file = path.to_path_buf();
        let token = cancel.clone();
        let measured =
            tokio::task::spawn_blocking(move || analyzer.try_measure(&file, None, Some(&token)))
                .await?;
        match measured {
            Ok(measurement) => {
                report.gain = Some(GainReport::from(&measurement));
                loudness = measurement.track_loudness();
            }
            Err(e) => report.errors.push(e.to_string()),
        }
    }

    Ok((report, loudness))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let (want_tempo, want_gain) = cli.analyses();

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if cli.all_plugins {
        config.plugin_strategy = PluginStrategy::All;
    }

    let native_dir = cli.native_dir()?;
    tracing::info!("Native libraries from {}", native_dir.display());
    let provisioner = LibraryProvisioner::new(
        ProvisionerConfig::default(),
        DirectoryBundle::new("Soul", native_dir),
    );

    let engine: Arc<dyn AudioEngine> = Arc::new(SymphoniaEngine::new());
    let bootstrap = Arc::new(EngineBootstrap::new(engine, provisioner, config));

    let init = bootstrap.initialize_async().await?;
    if !init.success {
        bootstrap.shutdown_async().await;
        bail!(
            "Engine initialization failed: {}",
            init.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    for warning in &init.warnings {
        tracing::warn!("{}", warning);
    }

    init.plugins.wait().await;
    for plugin in init.plugins.failed() {
        tracing::warn!("Plugin {} unavailable: {}", plugin.name, plugin.reason);
    }
    tracing::info!("Plugins loaded: {}", init.plugins.loaded_names().join(", "));

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling analysis");
            signal_token.cancel();
        }
    });

    let engine = Arc::clone(bootstrap.engine());
    let tempo = TempoAnalyzer::new(Arc::clone(&engine));
    let gain = GainAnalyzer::new(engine);

    let mut reports = Vec::with_capacity(cli.files.len());
    let mut album_tracks = Vec::new();

    for path in &cli.files {
        if cancel.is_cancelled() {
            break;
        }
        let (report, loudness) =
            analyze_file(&tempo, &gain, path, want_tempo, want_gain, &cancel).await?;
        album_tracks.extend(loudness);

        if !cli.json {
            println!("{}", report);
        }
        reports.push(report);
    }

    let album = if cli.files.len() > 1 && album_tracks.len() > 1 {
        ReplayGainCalculator::new()
            .album_gain(&album_tracks)
            .map(|album| AlbumReport::from(&album))
    } else {
        None
    };

    if cli.json {
        let output = serde_json::json!({
            "files": reports,
            "album": album,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(album) = album {
        println!("{}", album);
    }

    bootstrap.shutdown_async().await;

    if cancel.is_cancelled() {
        bail!("Analysis cancelled");
    }
    Ok(())
}
