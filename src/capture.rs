//! The acquisition loop.
//!
//! One thread pulls bounded sample blocks from the source straight into the
//! free tail of the capture file until one of four things happens: the user
//! asked to stop, the file is full, the hardware reported an overrun, or a
//! receive call failed. Data accepted before an overrun stays committed;
//! only further capture halts.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::device::{DeviceError, SampleSource};
use crate::stats::StatsSampler;
use crate::store::CaptureFile;
use crate::{BYTES_PER_SAMPLE, RX_TIMEOUT_MS, SAMPLES_PER_BLOCK};

/// Why the acquisition loop ended
#[derive(Debug)]
pub enum StopReason {
    /// SIGINT/SIGTERM observed
    UserStop,
    /// The capture file is full
    CapacityReached,
    /// The hardware dropped samples; everything before the drop is kept
    Overrun,
    /// A receive call failed
    SourceError(DeviceError),
}

/// Drain `source` into `store` until a stop condition fires.
///
/// The stop flag is polled once per iteration, before the next receive, so
/// worst-case stop latency is one receive timeout. The stats sampler is
/// invoked after every committed block with the cumulative byte count.
pub fn run_capture<S: SampleSource>(
    source: &mut S,
    store: &mut CaptureFile,
    stop: &AtomicBool,
    stats: &mut StatsSampler,
) -> StopReason {
    loop {
        if stop.load(Ordering::Relaxed) {
            return StopReason::UserStop;
        }
        let remaining_samples = store.remaining() / BYTES_PER_SAMPLE;
        if remaining_samples == 0 {
            return StopReason::CapacityReached;
        }
        let request = remaining_samples.min(SAMPLES_PER_BLOCK);
        let dst = store.tail_mut(request * BYTES_PER_SAMPLE);
        match source.receive(dst, RX_TIMEOUT_MS) {
            Ok(delivery) => {
                store.advance(delivery.actual_count * BYTES_PER_SAMPLE);
                stats.observe(store.written() as u64);
                if delivery.overrun {
                    return StopReason::Overrun;
                }
            }
            Err(e) => return StopReason::SourceError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicBool;

    use byte_slice_cast::AsByteSlice;

    use super::*;
    use crate::device::RxDelivery;

    /// Delivers a scripted sequence of (samples, overrun) blocks filled with
    /// a ramp so tests can check what landed where
    struct ScriptedSource {
        script: VecDeque<(usize, bool)>,
        next_value: i16,
        /// Set the stop flag after this many deliveries
        stop_after: Option<(usize, &'static AtomicBool)>,
        delivered: usize,
    }

    impl ScriptedSource {
        fn new(script: &[(usize, bool)]) -> Self {
            Self {
                script: script.iter().copied().collect(),
                next_value: 0,
                stop_after: None,
                delivered: 0,
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn receive(
            &mut self,
            dst: &mut [u8],
            _timeout_ms: u32,
        ) -> Result<RxDelivery, DeviceError> {
            let (samples, overrun) = self
                .script
                .pop_front()
                .ok_or_else(|| DeviceError::Receive("script exhausted".to_string()))?;
            let samples = samples.min(dst.len() / BYTES_PER_SAMPLE);
            let mut iq = Vec::with_capacity(samples * 2);
            for _ in 0..samples * 2 {
                iq.push(self.next_value);
                self.next_value = self.next_value.wrapping_add(1);
            }
            dst[..samples * BYTES_PER_SAMPLE].copy_from_slice(iq.as_byte_slice());
            self.delivered += 1;
            if let Some((after, flag)) = self.stop_after {
                if self.delivered >= after {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            Ok(RxDelivery {
                actual_count: samples,
                overrun,
            })
        }
    }

    fn store_with_capacity(dir: &tempfile::TempDir, bytes: u64) -> CaptureFile {
        CaptureFile::create(&dir.path().join("capture.iq"), bytes).unwrap()
    }

    #[test]
    fn test_stops_when_capacity_reached() {
        let dir = tempfile::tempdir().unwrap();
        // 10 samples of capacity, delivered as 4 + 4 + 2
        let mut store = store_with_capacity(&dir, 40);
        let mut source = ScriptedSource::new(&[(4, false), (4, false), (2, false)]);
        let stop = AtomicBool::new(false);
        let mut stats = StatsSampler::new(None);
        let reason = run_capture(&mut source, &mut store, &stop, &mut stats);
        assert!(matches!(reason, StopReason::CapacityReached));
        assert_eq!(store.written(), 40);
        store.finalize().unwrap();
        let data = std::fs::read(dir.path().join("capture.iq")).unwrap();
        assert_eq!(data.len(), 40);
        // Ramp arrived contiguous and in order across block boundaries
        let expected: Vec<i16> = (0..20).collect();
        assert_eq!(data, expected.as_byte_slice());
    }

    #[test]
    fn test_never_requests_more_than_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with_capacity(&dir, 40);
        // Second block fills whatever is requested; the loop must shrink
        // that request to the 6 remaining samples
        let mut source = ScriptedSource::new(&[(4, false), (usize::MAX, false)]);
        let stop = AtomicBool::new(false);
        let mut stats = StatsSampler::new(None);
        let reason = run_capture(&mut source, &mut store, &stop, &mut stats);
        assert!(matches!(reason, StopReason::CapacityReached));
        assert_eq!(store.written(), 40);
    }

    #[test]
    fn test_overrun_is_a_soft_stop_keeping_delivered_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with_capacity(&dir, 10_000);
        // 60 clean samples, then 40 more flagged with an overrun
        let mut source = ScriptedSource::new(&[(60, false), (40, true)]);
        let stop = AtomicBool::new(false);
        let mut stats = StatsSampler::new(None);
        let reason = run_capture(&mut source, &mut store, &stop, &mut stats);
        assert!(matches!(reason, StopReason::Overrun));
        // Both blocks kept: 100 samples = 400 bytes
        assert_eq!(store.written(), 400);
        store.finalize().unwrap();
        assert_eq!(
            dir.path().join("capture.iq").metadata().unwrap().len(),
            400
        );
    }

    #[test]
    fn test_stop_flag_halts_before_next_receive() {
        static STOP: AtomicBool = AtomicBool::new(false);
        STOP.store(false, Ordering::Relaxed);
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with_capacity(&dir, 10_000);
        let mut source = ScriptedSource::new(&[(50, false), (50, false)]);
        source.stop_after = Some((1, &STOP));
        let mut stats = StatsSampler::new(None);
        let reason = run_capture(&mut source, &mut store, &STOP, &mut stats);
        assert!(matches!(reason, StopReason::UserStop));
        // Only the block delivered before the flag was set
        assert_eq!(store.written(), 200);
        assert_eq!(store.written() % BYTES_PER_SAMPLE, 0);
    }

    #[test]
    fn test_receive_error_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with_capacity(&dir, 10_000);
        let mut source = ScriptedSource::new(&[(25, false)]);
        let stop = AtomicBool::new(false);
        let mut stats = StatsSampler::new(None);
        let reason = run_capture(&mut source, &mut store, &stop, &mut stats);
        assert!(matches!(reason, StopReason::SourceError(_)));
        // The clean block before the failure is kept
        assert_eq!(store.written(), 100);
    }
}
