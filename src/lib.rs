pub mod args;
pub mod bladerf;
pub mod capture;
pub mod device;
pub mod stats;
pub mod store;

/// One complex sample is an interleaved i16 I + i16 Q pair
pub const BYTES_PER_SAMPLE: usize = 4;

/// Largest number of samples requested per pull, sized to one hardware buffer
pub const SAMPLES_PER_BLOCK: usize = 127 * 2048;

/// How long a single receive call may block before the driver gives up
pub const RX_TIMEOUT_MS: u32 = 3500;

// RF front-end defaults
pub const DEFAULT_FREQUENCY: u64 = 866_450_000; // 866.45 MHz
pub const DEFAULT_SAMPLE_RATE: u32 = 8_000_000; // 8 MS/s
pub const DEFAULT_BANDWIDTH: u32 = 7_000_000;
