//! Lock-free hand-off of sample buffers to the audio thread
//!
//! Two SPSC rings run in opposite directions: new buffers travel to the
//! audio thread, replaced buffers travel back so their memory is released
//! on the control side instead of inside the render callback.

use std::sync::Arc;

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::SampleBuffer;

/// Control-thread end
pub struct SampleBufferSender {
    to_audio: HeapProd<Arc<SampleBuffer>>,
    retired: HeapCons<Arc<SampleBuffer>>,
}

/// Audio-thread end
pub struct SampleBufferReceiver {
    from_control: HeapCons<Arc<SampleBuffer>>,
    retire: HeapProd<Arc<SampleBuffer>>,
}

/// Create a connected sender/receiver pair holding up to `capacity` buffers in flight
pub fn sample_buffer_channel(capacity: usize) -> (SampleBufferSender, SampleBufferReceiver) {
    let capacity = capacity.max(1);
    let (to_audio, from_control) = HeapRb::<Arc<SampleBuffer>>::new(capacity).split();
    // Every delivered buffer can displace one, plus the one playing at the start
    let (retire, retired) = HeapRb::<Arc<SampleBuffer>>::new(capacity + 1).split();
    (
        SampleBufferSender { to_audio, retired },
        SampleBufferReceiver { from_control, retire },
    )
}

impl SampleBufferSender {
    /// Queue a buffer for the audio thread. Gives it back if the ring is full.
    pub fn send(&mut self, buffer: Arc<SampleBuffer>) -> Result<(), Arc<SampleBuffer>> {
        self.collect_retired();
        self.to_audio.try_push(buffer)
    }

    /// Drop buffers the audio thread has finished with; returns how many
    pub fn collect_retired(&mut self) -> usize {
        let mut count = 0;
        while self.retired.try_pop().is_some() {
            count += 1;
        }
        if count > 0 {
            tracing::debug!("Released {} retired sample buffers", count);
        }
        count
    }
}

impl SampleBufferReceiver {
    /// Take the newest pending buffer, retiring any older ones that were skipped
    pub fn try_recv(&mut self) -> Option<Arc<SampleBuffer>> {
        let mut latest = None;
        while let Some(buffer) = self.from_control.try_pop() {
            if let Some(skipped) = latest.replace(buffer) {
                self.retire(skipped);
            }
        }
        latest
    }

    /// Send a replaced buffer back to the control thread. Returns false when
    /// the return ring is full and the buffer had to be dropped here.
    pub fn retire(&mut self, buffer: Arc<SampleBuffer>) -> bool {
        match self.retire.try_push(buffer) {
            Ok(()) => true,
            Err(buffer) => {
                tracing::warn!(
                    frames = buffer.num_frames(),
                    "Retire ring full, releasing sample buffer on the audio thread"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(value: i16) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::new(vec![value; 4], 1, 48000).unwrap())
    }

    #[test]
    fn test_delivers_latest_and_retires_skipped() {
        let (mut tx, mut rx) = sample_buffer_channel(4);
        tx.send(buffer(1)).unwrap();
        tx.send(buffer(2)).unwrap();

        let received = rx.try_recv().unwrap();
        assert_eq!(received.data()[0], 2);
        assert!(rx.try_recv().is_none());
        assert_eq!(tx.collect_retired(), 1);
    }

    #[test]
    fn test_full_ring_returns_buffer() {
        let (mut tx, _rx) = sample_buffer_channel(1);
        tx.send(buffer(1)).unwrap();
        let rejected = tx.send(buffer(2)).unwrap_err();
        assert_eq!(rejected.data()[0], 2);
    }

    #[test]
    fn test_retired_buffer_released_on_sender_side() {
        let (mut tx, mut rx) = sample_buffer_channel(2);
        let original = buffer(7);
        tx.send(Arc::clone(&original)).unwrap();
        let received = rx.try_recv().unwrap();
        rx.retire(received);
        assert_eq!(Arc::strong_count(&original), 2);
        tx.collect_retired();
        assert_eq!(Arc::strong_count(&original), 1);
    }

    #[test]
    fn test_retire_overflow_drops_buffer() {
        // Capacity 1 leaves room for two retired buffers
        let (_tx, mut rx) = sample_buffer_channel(1);
        assert!(rx.retire(buffer(1)));
        assert!(rx.retire(buffer(2)));

        let overflow = buffer(3);
        assert!(!rx.retire(Arc::clone(&overflow)));
        assert_eq!(Arc::strong_count(&overflow), 1);
    }
}
