//! The seam between the acquisition loop and the radio hardware.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open bladeRF: {0}")]
    Open(String),
    #[error("failed to configure bladeRF: {0}")]
    Configure(String),
    #[error("failed to set gain: {0}")]
    Gain(String),
    #[error("failed to configure RX sync interface: {0}")]
    Stream(String),
    #[error("failed to enable RX: {0}")]
    Enable(String),
    #[error("receive failed: {0}")]
    Receive(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainMode {
    Automatic,
    Manual,
}

/// What one receive call actually delivered
#[derive(Debug, Clone, Copy)]
pub struct RxDelivery {
    /// Complex samples written to the destination
    pub actual_count: usize,
    /// The hardware dropped samples because we fell behind
    pub overrun: bool,
}

/// A pull-driven source of interleaved i16 IQ sample blocks
pub trait SampleSource {
    /// Fill up to `dst.len() / 4` samples into `dst`, blocking at most
    /// `timeout_ms`. Samples land at the start of `dst` in delivery order.
    fn receive(&mut self, dst: &mut [u8], timeout_ms: u32) -> Result<RxDelivery, DeviceError>;
}
