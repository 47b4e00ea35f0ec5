use anyhow::Context;
use clap::Parser;
use generator::profile::PeakProfile;
use status_bridge::bridge::StatusBridge;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{SourceConfig, WorkflowConfig};
use workflow::runner::Runner;

mod generator;
mod status_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Waterfall peak monitor for swept spectrum scans")]
struct Args {
    /// Load a workflow config from YAML; flags below override it
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Lower edge of the waterfall in Hz
    #[arg(long)]
    min_freq: Option<f64>,
    /// Upper edge of the waterfall in Hz
    #[arg(long)]
    max_freq: Option<f64>,
    /// Render power relative to the per-sweep median
    #[arg(long, default_value_t = false)]
    plot_snr: bool,
    /// Maximum detections logged per sweep
    #[arg(long)]
    n_detect: Option<usize>,
    #[arg(long)]
    save_path: Option<PathBuf>,
    /// Seconds per output bucket
    #[arg(long)]
    save_time: Option<u64>,
    /// Detector name (narrowband, wideband)
    #[arg(long)]
    peak_finder: Option<String>,
    /// Image backend (agg, none)
    #[arg(long)]
    render_engine: Option<String>,
    /// Also write every rotated image to this path
    #[arg(long)]
    savefig_path: Option<PathBuf>,
    #[arg(long)]
    rotate_secs: Option<f64>,
    /// Image width in inches
    #[arg(long)]
    width: Option<f64>,
    /// Image height in inches
    #[arg(long)]
    height: Option<f64>,
    /// Sweeps kept in the waterfall
    #[arg(long)]
    waterfall_height: Option<usize>,
    /// Frequency columns in the waterfall
    #[arg(long)]
    waterfall_width: Option<usize>,
    /// Seconds between sweeps
    #[arg(long)]
    refresh: Option<f64>,
    /// Process sweeps back to back without waiting for refresh
    #[arg(long, default_value_t = false)]
    batch: bool,
    /// POST a JSON status summary here after every sweep
    #[arg(long)]
    api_endpoint: Option<String>,
    /// Extra key=value pairs recorded with each bucket's metadata
    #[arg(long = "config-var", value_parser = parse_config_var)]
    config_vars: Vec<(String, String)>,
    #[arg(long)]
    config_vars_path: Option<PathBuf>,
    /// Bin width in Hz requested from the source
    #[arg(long)]
    scan_resolution: Option<f64>,
    /// Replay a `ts,freq,db,tune_count` CSV instead of generating scans
    #[arg(long)]
    replay: Option<PathBuf>,
    #[arg(long, default_value_t = 1e6)]
    sample_rate: f64,
    #[arg(long, default_value_t = 256)]
    nfft: usize,
    /// Synthetic source: stop after this many seconds
    #[arg(long)]
    run_secs: Option<f64>,
    /// Synthetic source: stop after this many sweeps
    #[arg(long)]
    batches: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Synthetic emission as min:max:db, repeatable
    #[arg(long = "peak")]
    peaks: Vec<PeakProfile>,
    /// Host a status endpoint on this address and keep it up after the run
    #[arg(long)]
    serve_status: Option<SocketAddr>,
}

fn parse_config_var(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got {:?}", value)),
    }
}

impl Args {
    fn workflow_config(&self) -> anyhow::Result<WorkflowConfig> {
        let mut config = match &self.workflow {
            Some(path) => WorkflowConfig::load(path)?,
            None => WorkflowConfig::default(),
        };

        let engine = &mut config.engine;
        if let Some(value) = self.min_freq {
            engine.min_freq = value;
        }
        if let Some(value) = self.max_freq {
            engine.max_freq = value;
        }
        engine.plot_snr |= self.plot_snr;
        engine.batch_mode |= self.batch;
        if let Some(value) = self.n_detect {
            engine.n_detect = value;
        }
        if let Some(value) = &self.save_path {
            engine.save_path = value.clone();
        }
        if let Some(value) = self.save_time {
            engine.save_time = value;
        }
        if let Some(value) = &self.peak_finder {
            engine.peak_finder = value.clone();
        }
        if let Some(value) = &self.render_engine {
            engine.render_engine = value.clone();
        }
        if let Some(value) = &self.savefig_path {
            engine.savefig_path = Some(value.clone());
        }
        if let Some(value) = self.rotate_secs {
            engine.rotate_secs = value;
        }
        if let Some(value) = self.width {
            engine.width = value;
        }
        if let Some(value) = self.height {
            engine.height = value;
        }
        if let Some(value) = self.waterfall_height {
            engine.waterfall_height = value;
        }
        if let Some(value) = self.waterfall_width {
            engine.waterfall_width = value;
        }
        if let Some(value) = self.refresh {
            engine.refresh = value;
        }
        if let Some(value) = &self.api_endpoint {
            engine.api_endpoint = Some(value.clone());
        }
        if !self.config_vars.is_empty() {
            engine.config_vars = Some(self.config_vars.iter().cloned().collect());
        }
        if let Some(value) = &self.config_vars_path {
            engine.config_vars_path = Some(value.clone());
        }
        if let Some(value) = self.scan_resolution {
            engine.scan_resolution = value;
        }

        if let Some(path) = &self.replay {
            config.source = SourceConfig::Replay {
                path: path.clone(),
                sample_rate: self.sample_rate,
                nfft: self.nfft,
            };
        } else if let SourceConfig::Synthetic(generator) = &mut config.source {
            if let Some(value) = self.min_freq {
                generator.freq_min = value;
            }
            if let Some(value) = self.max_freq {
                generator.freq_max = value;
            }
            if self.run_secs.is_some() {
                generator.run_secs = self.run_secs;
            }
            if self.batches.is_some() {
                generator.batches = self.batches;
            }
            if let Some(value) = self.seed {
                generator.seed = value;
            }
            if !self.peaks.is_empty() {
                generator.peaks = self.peaks.clone();
            }
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut workflow_config = args.workflow_config()?;

    let bridge = match args.serve_status {
        Some(addr) => {
            let bridge = StatusBridge::spawn(addr).context("starting status bridge")?;
            workflow_config
                .engine
                .api_endpoint
                .get_or_insert_with(|| bridge.endpoint());
            Some(bridge)
        }
        None => None,
    };

    let runner = Runner::new(workflow_config);
    let metrics = runner.execute()?;
    println!(
        "Run complete -> batches {}, detections {}, skipped {}, rotations {}, output errors {}",
        metrics.batches,
        metrics.detections,
        metrics.skipped_batches,
        metrics.rotations,
        metrics.io_errors
    );

    if let Some(bridge) = bridge {
        let model = bridge.snapshot();
        println!(
            "Status bridge on http://{}/status received {} summaries (Ctrl+C to stop)...",
            bridge.addr(),
            model.received
        );
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
