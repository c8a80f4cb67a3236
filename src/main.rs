use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use iq_slurper::args::{convert_filter, Args};
use iq_slurper::bladerf::BladeRf;
use iq_slurper::capture::{run_capture, StopReason};
use iq_slurper::device::GainMode;
use iq_slurper::stats::{autoscale, ProgressLog, StatsSampler};
use iq_slurper::store::CaptureFile;
use iq_slurper::{
    DEFAULT_BANDWIDTH, DEFAULT_FREQUENCY, DEFAULT_SAMPLE_RATE, RX_TIMEOUT_MS, SAMPLES_PER_BLOCK,
};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
enum CaptureError {
    #[error(transparent)]
    Store(#[from] iq_slurper::store::StoreError),
    #[error(transparent)]
    Device(#[from] iq_slurper::device::DeviceError),
    #[error("progress log {path}: {source}")]
    Log { path: PathBuf, source: io::Error },
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if is_usage_error(&e) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .with_writer(io::stderr)
        .init();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Help and version requests come back as clap errors but are not failures
fn is_usage_error(e: &clap::Error) -> bool {
    !matches!(
        e.kind(),
        clap::ErrorKind::DisplayHelp | clap::ErrorKind::DisplayVersion
    )
}

fn run(args: Args) -> Result<(), CaptureError> {
    // Create both artifacts before touching the device, so a path conflict
    // fails fast without claiming the radio
    let progress_log = args
        .logfile
        .as_deref()
        .map(|path| {
            ProgressLog::create(path).map_err(|source| CaptureError::Log {
                path: path.to_owned(),
                source,
            })
        })
        .transpose()?;
    let mut store = CaptureFile::create(&args.filename, args.size)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        // The handler only raises the flag; the loop does the real shutdown
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))?;
    }

    let mut dev = BladeRf::open()?;
    dev.configure(DEFAULT_FREQUENCY, DEFAULT_SAMPLE_RATE, DEFAULT_BANDWIDTH)?;
    match args.gain {
        Some(gain) => {
            dev.set_gain_mode(GainMode::Manual)?;
            dev.set_gain(gain)?;
        }
        None => dev.set_gain_mode(GainMode::Automatic)?,
    }
    dev.configure_stream(SAMPLES_PER_BLOCK, RX_TIMEOUT_MS)?;
    dev.enable(true)?;

    info!("receiving, press ctrl-c to stop");
    let mut stats = StatsSampler::new(progress_log);
    let reason = run_capture(&mut dev, &mut store, &stop, &mut stats);

    if let Err(e) = dev.enable(false) {
        warn!("disabling RX failed: {e}");
    }

    // Clear the in-place stats line before printing the summary
    print!("\r{:40}\r", "");
    let _ = io::stdout().flush();

    let written = store.written();
    store.finalize()?;
    let (scaled, prefix) = autoscale(written as f32);
    println!("wrote {scaled:.2} {prefix}Bytes ({written} Bytes)");

    match reason {
        StopReason::UserStop => info!("stopped on user request"),
        StopReason::CapacityReached => info!("capture file full"),
        StopReason::Overrun => warn!("overrun occurred, capture stopped"),
        StopReason::SourceError(e) => return Err(e.into()),
    }
    Ok(())
}
