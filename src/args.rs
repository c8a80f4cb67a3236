//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// File to capture raw IQ samples into (must not already exist)
    #[clap(short, long)]
    pub filename: PathBuf,
    /// Capture size limit with a decimal multiplier suffix, e.g. 500M, 2G, 1T
    #[clap(short, long, value_parser = parse_file_size)]
    pub size: u64,
    /// Manual gain in dB (automatic gain control when omitted)
    #[clap(short, long)]
    pub gain: Option<i32>,
    /// Append one progress record per second to this file (must not already exist)
    #[clap(short, long)]
    pub logfile: Option<PathBuf>,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

/// Parse a file size like `10M` into bytes, with 1000-based M/G/T multipliers
fn parse_file_size(s: &str) -> Result<u64, String> {
    let suffix = s.chars().last().ok_or("empty size")?;
    let multiplier: u64 = match suffix {
        'M' => 1000 * 1000,
        'G' => 1000 * 1000 * 1000,
        'T' => 1000 * 1000 * 1000 * 1000,
        _ => return Err("size needs an M, G or T suffix".to_string()),
    };
    let digits = &s[..s.len() - suffix.len_utf8()];
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{digits}'"))?;
    if value == 0 {
        return Err("size must be greater than zero".to_string());
    }
    value
        .checked_mul(multiplier)
        .ok_or_else(|| "size overflows".to_string())
}
