//! CLI argument parsing and command handling

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nvenc_capacity_core::config::{
    ENV_INPUT_DIR, ENV_LOG_DIR, ENV_OUTPUT_DIR, ENV_STREAMS_PER_NVENC, ENV_TEST_DURATION,
};
use nvenc_capacity_core::{
    ExternalScriptBuilder, NvidiaSmi, OrchestratorBuilder, RunReport, StreamCount, TestConfig,
};
use nvenc_capacity_report::{render_summary, write_summary, JsonExporter};

/// Exit code for a run that finished but did not pass
pub const EXIT_NOT_PASSED: u8 = 2;

/// Dual-NVENC concurrent capacity test
///
/// Splits `2 × streams` live encodes across the GPU's two hardware encoders,
/// supervises them for the test duration, and grades the produced outputs.
#[derive(Parser, Debug)]
#[command(name = "nvenc-capacity")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Streams per encoder (1-100) or a preset: conservative, standard, aggressive, maximum
    #[arg(env = ENV_STREAMS_PER_NVENC)]
    pub streams: Option<StreamCount>,

    /// Test duration in seconds
    #[arg(env = ENV_TEST_DURATION)]
    pub duration: Option<u64>,

    /// Output root (one directory per pool)
    #[arg(long, env = ENV_OUTPUT_DIR)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding the input streams
    #[arg(long, env = ENV_INPUT_DIR)]
    pub input_dir: Option<PathBuf>,

    /// Directory for process logs, telemetry and reports
    #[arg(long, env = ENV_LOG_DIR)]
    pub log_dir: Option<PathBuf>,

    /// JSON configuration file, applied before environment and arguments
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pipeline program launched once per pool
    #[arg(short, long, env = "PIPELINE_COMMAND", default_value = "./encode-pool.sh")]
    pub pipeline: PathBuf,

    /// Extra arguments passed to the pipeline program before the pool flags
    #[arg(last = true)]
    pub pipeline_args: Vec<String>,

    /// GPU index to query and monitor
    #[arg(short, long, default_value = "0")]
    pub gpu_index: u32,

    /// nvidia-smi binary
    #[arg(long, default_value = "nvidia-smi")]
    pub nvidia_smi: String,

    /// Launch even when the memory admission check cannot pass
    #[arg(long)]
    pub skip_admission_check: bool,

    /// Launch even when input files are missing
    #[arg(long)]
    pub allow_missing_inputs: bool,

    /// Reset the GPU during cleanup
    #[arg(long)]
    pub reset_device: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build the effective configuration: defaults, then the config file,
    /// then environment and arguments
    pub fn resolve_config(&self) -> Result<TestConfig> {
        let mut config = match &self.config {
            Some(path) => TestConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from: {}", path.display()))?,
            None => TestConfig::default(),
        };

        if let Some(streams) = self.streams {
            config.streams_per_pool = streams.streams_per_pool();
        }
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(dir) = &self.output_dir {
            config.paths.output_dir = dir.clone();
        }
        if let Some(dir) = &self.input_dir {
            config.paths.input_dir = dir.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.paths.log_dir = dir.clone();
        }
        if self.skip_admission_check {
            config.admission_check = false;
        }
        if self.allow_missing_inputs {
            config.require_inputs = false;
        }
        if self.reset_device {
            config.reset_device_on_cleanup = true;
        }
        config.show_progress = !self.no_progress;

        config.validate().context("Invalid test configuration")?;
        Ok(config)
    }

    /// Run the capacity test based on CLI arguments
    pub async fn run(&self) -> Result<ExitCode> {
        let config = self.resolve_config()?;

        print_banner(&config, self);

        let orchestrator = OrchestratorBuilder::new()
            .config(config)
            .device(Arc::new(NvidiaSmi::with_binary(self.nvidia_smi.clone(), self.gpu_index)))
            .command_builder(Arc::new(
                ExternalScriptBuilder::new(self.pipeline.clone()).with_args(&self.pipeline_args),
            ))
            .build()
            .context("Failed to set up the test")?;

        let report = orchestrator
            .run_with_signal_handling()
            .await
            .context("Capacity test aborted before launch")?;

        self.write_reports(&report)?;

        println!();
        println!("{}", render_summary(&report));

        if report.is_success() {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::from(EXIT_NOT_PASSED))
        }
    }

    fn write_reports(&self, report: &RunReport) -> Result<()> {
        let paths = &report.config.paths;

        let summary = paths.summary_txt();
        write_summary(report, &summary)
            .with_context(|| format!("Failed to write summary: {}", summary.display()))?;

        let analysis = paths.analysis_json();
        JsonExporter::export(report, &analysis)
            .with_context(|| format!("Failed to write analysis: {}", analysis.display()))?;

        tracing::info!(
            summary = %summary.display(),
            analysis = %analysis.display(),
            telemetry = %report.telemetry_csv.display(),
            "Reports written"
        );
        Ok(())
    }
}

fn print_banner(config: &TestConfig, cli: &Cli) {
    println!("\n{}", "=".repeat(70));
    println!("   Dual NVENC Concurrent Capacity Test");
    println!("{}", "=".repeat(70));
    println!();
    println!("Configuration:");
    println!("  Streams per NVENC: {}", config.streams_per_pool);
    println!("  Total streams:     {}", config.total_streams());
    println!("  Duration:          {}s", config.duration_secs);
    println!(
        "  Encode:            {} @ {}k, {} fps",
        config.encode.resolution(),
        config.encode.bitrate_kbps,
        config.encode.framerate
    );
    println!("  Pipeline:          {}", cli.pipeline.display());
    println!("  Output:            {}", config.paths.output_dir.display());
    println!("  Logs:              {}", config.paths.log_dir.display());
    println!("{}", "=".repeat(70));
    println!();
}
