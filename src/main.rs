//! NetGuard analyzer entrypoint: captures into fixed windows, classifies each
//! window and writes predictions and stats until Ctrl+C or end of input.

use clap::Parser;
use netguard_analyzer::{
    capture,
    config::{AnalyzerConfig, OutputFormat, SourceKind},
    logging::StructuredLogger,
    pipeline::Pipeline,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "netguard-analyzer", version, about = "Windowed network traffic threat analyzer")]
struct Cli {
    /// Config file (JSON); defaults to NETGUARD_CONFIG_PATH or config.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trained model artifact (.json forest or .onnx)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Capture interface selector, passed through to the source
    #[arg(short, long)]
    interface: Option<String>,

    /// Window length in seconds
    #[arg(short, long)]
    window_secs: Option<f64>,

    /// Capture source
    #[arg(long, value_parser = parse_source)]
    source: Option<SourceKind>,

    /// NDJSON packet file to replay (implies --source replay)
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Packets per second (simulated rate, or replay pacing)
    #[arg(long)]
    rate: Option<u32>,

    /// Output directory for predictions and stats
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_parser = parse_format)]
    output_format: Option<OutputFormat>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

fn parse_source(s: &str) -> Result<SourceKind, String> {
    match s {
        "simulated" => Ok(SourceKind::Simulated),
        "replay" => Ok(SourceKind::Replay),
        other => Err(format!("unknown source `{}` (simulated, replay)", other)),
    }
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s {
        "json" => Ok(OutputFormat::Json),
        "sqlite" => Ok(OutputFormat::Sqlite),
        other => Err(format!("unknown output format `{}` (json, sqlite)", other)),
    }
}

impl Cli {
    fn apply(self, config: &mut AnalyzerConfig) {
        if let Some(m) = self.model {
            config.model_path = Some(m);
        }
        if let Some(i) = self.interface {
            config.capture.interface = Some(i);
        }
        if let Some(w) = self.window_secs {
            config.window.window_secs = w;
        }
        if let Some(s) = self.source {
            config.capture.source = s;
        }
        if let Some(r) = self.replay {
            config.capture.replay_path = Some(r);
            if self.source.is_none() {
                config.capture.source = SourceKind::Replay;
            }
        }
        if let Some(rate) = self.rate {
            match config.capture.source {
                SourceKind::Simulated => config.capture.simulated_rate = rate,
                SourceKind::Replay => config.capture.replay_rate = Some(rate),
            }
        }
        if let Some(d) = self.output_dir {
            config.output.dir = d;
        }
        if let Some(f) = self.output_format {
            config.output.format = f;
        }
        if self.json_logs {
            config.log.json = true;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut cli = Cli::parse();
    let config_path = cli
        .config
        .take()
        .or_else(|| std::env::var("NETGUARD_CONFIG_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let mut config = AnalyzerConfig::load(&config_path)?;
    cli.apply(&mut config);

    StructuredLogger::init(&config.log)?;
    info!(config = %config_path.display(), output_dir = %config.output.dir.display(), "netguard analyzer starting");

    let mut pipeline = Pipeline::open(&config)?;
    let source = capture::open_source(&config.capture)?;

    let handle = pipeline.handle();
    if let Err(e) = ctrlc::set_handler(move || handle.stop()) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }

    let stats = pipeline.run(source)?;
    info!(
        windows = stats.windows_processed,
        packets = stats.total_packets,
        threats = stats.threat_count,
        dropped = stats.dropped_packets,
        skipped = stats.skipped_windows,
        "netguard analyzer finished"
    );
    Ok(())
}
