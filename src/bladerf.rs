//! Thin libbladeRF wrapper for metadata-tagged synchronous RX.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::ptr;

use tracing::info;

use crate::device::{DeviceError, GainMode, RxDelivery, SampleSource};
use crate::BYTES_PER_SAMPLE;

type Device = c_void;

// BLADERF_CHANNEL_RX(0)
const CHANNEL_RX_0: c_int = 0;
const LAYOUT_RX_X1: c_int = 0;
// bladerf_format: SC16_Q11 = 0, SC16_Q11_META = 1, PACKET_META = 2
const FORMAT_SC16_Q11_META: c_int = 1;
const GAIN_AUTOMATIC: c_int = 0;
const GAIN_MGC: c_int = 1;
const META_FLAG_RX_NOW: u32 = 1 << 31;
const META_STATUS_OVERRUN: u32 = 1 << 0;

const NUM_BUFFERS: c_uint = 64;
const NUM_TRANSFERS: c_uint = 16;

// bladerf_metadata
#[repr(C)]
struct Metadata {
    timestamp: u64,
    flags: u32,
    status: u32,
    actual_count: c_uint,
    reserved: [u8; 32],
}

extern "C" {
    fn bladerf_open(device: *mut *mut Device, identifier: *const c_char) -> c_int;
    fn bladerf_close(device: *mut Device);
    fn bladerf_set_frequency(dev: *mut Device, ch: c_int, frequency: u64) -> c_int;
    fn bladerf_set_sample_rate(
        dev: *mut Device,
        ch: c_int,
        rate: c_uint,
        actual: *mut c_uint,
    ) -> c_int;
    fn bladerf_set_bandwidth(
        dev: *mut Device,
        ch: c_int,
        bandwidth: c_uint,
        actual: *mut c_uint,
    ) -> c_int;
    fn bladerf_set_gain_mode(dev: *mut Device, ch: c_int, mode: c_int) -> c_int;
    fn bladerf_set_gain(dev: *mut Device, ch: c_int, gain: c_int) -> c_int;
    fn bladerf_sync_config(
        dev: *mut Device,
        layout: c_int,
        format: c_int,
        num_buffers: c_uint,
        buffer_size: c_uint,
        num_transfers: c_uint,
        stream_timeout: c_uint,
    ) -> c_int;
    fn bladerf_sync_rx(
        dev: *mut Device,
        samples: *mut c_void,
        num_samples: c_uint,
        metadata: *mut Metadata,
        timeout_ms: c_uint,
    ) -> c_int;
    fn bladerf_enable_module(dev: *mut Device, ch: c_int, enable: bool) -> c_int;
    fn bladerf_strerror(code: c_int) -> *const c_char;
}

fn strerror(code: c_int) -> String {
    // Safety: bladerf_strerror returns a static NUL-terminated string
    unsafe {
        CStr::from_ptr(bladerf_strerror(code))
            .to_string_lossy()
            .into_owned()
    }
}

/// An opened bladeRF with RX channel 0 claimed for this process
pub struct BladeRf {
    dev: *mut Device,
}

impl BladeRf {
    /// Open the first available device
    pub fn open() -> Result<Self, DeviceError> {
        let mut dev: *mut Device = ptr::null_mut();
        let res = unsafe { bladerf_open(&mut dev, ptr::null()) };
        if res != 0 {
            return Err(DeviceError::Open(strerror(res)));
        }
        Ok(Self { dev })
    }

    /// Tune the RX front end
    pub fn configure(
        &mut self,
        frequency: u64,
        sample_rate: u32,
        bandwidth: u32,
    ) -> Result<(), DeviceError> {
        unsafe {
            let mut res = bladerf_set_frequency(self.dev, CHANNEL_RX_0, frequency);
            if res == 0 {
                res = bladerf_set_sample_rate(self.dev, CHANNEL_RX_0, sample_rate, ptr::null_mut());
            }
            if res == 0 {
                res = bladerf_set_bandwidth(self.dev, CHANNEL_RX_0, bandwidth, ptr::null_mut());
            }
            if res != 0 {
                return Err(DeviceError::Configure(strerror(res)));
            }
        }
        info!(
            "tuned to {} Hz, {} S/s, {} Hz bandwidth",
            frequency, sample_rate, bandwidth
        );
        Ok(())
    }

    pub fn set_gain_mode(&mut self, mode: GainMode) -> Result<(), DeviceError> {
        let mode = match mode {
            GainMode::Automatic => GAIN_AUTOMATIC,
            GainMode::Manual => GAIN_MGC,
        };
        let res = unsafe { bladerf_set_gain_mode(self.dev, CHANNEL_RX_0, mode) };
        if res != 0 {
            return Err(DeviceError::Gain(strerror(res)));
        }
        Ok(())
    }

    pub fn set_gain(&mut self, gain: i32) -> Result<(), DeviceError> {
        let res = unsafe { bladerf_set_gain(self.dev, CHANNEL_RX_0, gain) };
        if res != 0 {
            return Err(DeviceError::Gain(strerror(res)));
        }
        Ok(())
    }

    /// Configure the synchronous RX interface for metadata-tagged blocks of
    /// `samples_per_block` samples
    pub fn configure_stream(
        &mut self,
        samples_per_block: usize,
        timeout_ms: u32,
    ) -> Result<(), DeviceError> {
        let res = unsafe {
            bladerf_sync_config(
                self.dev,
                LAYOUT_RX_X1,
                FORMAT_SC16_Q11_META,
                NUM_BUFFERS,
                samples_per_block as c_uint,
                NUM_TRANSFERS,
                timeout_ms as c_uint,
            )
        };
        if res != 0 {
            return Err(DeviceError::Stream(strerror(res)));
        }
        Ok(())
    }

    pub fn enable(&mut self, on: bool) -> Result<(), DeviceError> {
        let res = unsafe { bladerf_enable_module(self.dev, CHANNEL_RX_0, on) };
        if res != 0 {
            return Err(DeviceError::Enable(strerror(res)));
        }
        Ok(())
    }
}

impl SampleSource for BladeRf {
    fn receive(&mut self, dst: &mut [u8], timeout_ms: u32) -> Result<RxDelivery, DeviceError> {
        let mut meta = Metadata {
            timestamp: 0,
            flags: META_FLAG_RX_NOW,
            status: 0,
            actual_count: 0,
            reserved: [0; 32],
        };
        let num_samples = (dst.len() / BYTES_PER_SAMPLE) as c_uint;
        let res = unsafe {
            bladerf_sync_rx(
                self.dev,
                dst.as_mut_ptr() as *mut c_void,
                num_samples,
                &mut meta,
                timeout_ms as c_uint,
            )
        };
        if res != 0 {
            return Err(DeviceError::Receive(strerror(res)));
        }
        Ok(RxDelivery {
            actual_count: meta.actual_count as usize,
            overrun: meta.status & META_STATUS_OVERRUN != 0,
        })
    }
}

impl Drop for BladeRf {
    fn drop(&mut self) {
        unsafe { bladerf_close(self.dev) };
    }
}
