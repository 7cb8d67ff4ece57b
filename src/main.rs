use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use steamcarve::cli::{self, Command, ReduceArgs, ScanArgs};
use steamcarve::config;
use steamcarve::constants::MIB;
use steamcarve::evidence::{self, EvidenceSource};
use steamcarve::logging;
use steamcarve::pipeline::{self, LogProgressReporter, ProgressConfig, RunInfo};
use steamcarve::reduce;
use steamcarve::sink;

fn main() -> Result<()> {
    let cli_opts = cli::parse();
    logging::init_logging(cli_opts.log_json);

    match cli_opts.command {
        Command::Scan(args) => run_scan(args),
        Command::Reduce(args) => run_reduce(args),
    }
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let loaded = config::load_config(args.config_path.as_deref())?;
    let mut cfg = loaded.config;
    if let Some(mib) = args.chunk_size_mib {
        cfg.scan.chunk_size = mib.saturating_mul(MIB);
    }
    if let Some(overlap) = args.overlap_bytes {
        cfg.scan.overlap = overlap;
    }
    if let Some(min_len) = args.min_len {
        cfg.scan.min_len = min_len;
    }
    if args.no_utf16 {
        cfg.scan.scan_utf16 = false;
    }
    if args.no_strings {
        cfg.scan.emit_strings = false;
    }
    cfg.scan.validate().context("invalid scan options")?;

    let run_output_dir = args.output.join(&cfg.run_id);
    std::fs::create_dir_all(&run_output_dir)
        .with_context(|| format!("creating {}", run_output_dir.display()))?;

    info!(
        "starting run_id={} input={} output={} workers={} chunk_size={} overlap={}",
        cfg.run_id,
        args.input.display(),
        run_output_dir.display(),
        args.workers,
        cfg.scan.chunk_size,
        cfg.scan.overlap
    );

    let evidence_source: Arc<dyn EvidenceSource> = Arc::from(
        evidence::open_source(&args.input)
            .with_context(|| format!("opening {}", args.input.display()))?,
    );
    let backend = args.sink.into();
    let record_sink = sink::build_sink(backend, &run_output_dir)?;

    let cancel_flag = Arc::new(AtomicBool::new(false));
    {
        let flag = cancel_flag.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        }) {
            warn!("failed to install Ctrl+C handler: {err}");
        }
    }

    let progress = (cfg.progress_interval_secs > 0).then(|| ProgressConfig {
        reporter: Arc::new(LogProgressReporter),
        interval: Duration::from_secs(cfg.progress_interval_secs),
    });
    let run_info = RunInfo {
        run_id: cfg.run_id.clone(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        config_hash: loaded.config_hash.clone(),
        evidence_path: args.input.display().to_string(),
    };

    let stats = pipeline::run_pipeline_with_cancel(
        &cfg.scan,
        evidence_source,
        record_sink,
        args.workers,
        cancel_flag,
        progress,
        run_info,
    )?;

    if stats.sink_errors > 0 {
        warn!("{} record(s) could not be written", stats.sink_errors);
    }
    info!(
        "records written to {}",
        sink::records_path(&run_output_dir, backend).display()
    );
    Ok(())
}

fn run_reduce(args: ReduceArgs) -> Result<()> {
    let loaded = config::load_config(args.config_path.as_deref())?;
    let outputs = reduce::reduce_file(&args.input, args.output_dir.as_deref(), &loaded.config.reduce)
        .with_context(|| format!("reducing {}", args.input.display()))?;
    info!("wrote {}", outputs.clean_path.display());
    info!("wrote {}", outputs.findings_path.display());
    Ok(())
}
