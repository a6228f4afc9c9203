// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot handoff between the capture worker and the render thread
//!
//! The producer overwrites, the consumer takes. When production outruns
//! rendering, intermediate frames are dropped and only the newest is drawn.

use super::transform::TransformedFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// Latest-wins mailbox holding at most one transformed frame
#[derive(Debug, Default)]
pub struct PendingFrameSlot {
    frame: Mutex<Option<TransformedFrame>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl PendingFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, replacing any frame that was never drained
    ///
    /// Never blocks on frame work and never fails. Returns `true` when an
    /// undrained frame was displaced.
    pub fn publish(&self, frame: TransformedFrame) -> bool {
        let displaced = {
            let mut slot = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, Some(frame))
        };
        self.published.fetch_add(1, Ordering::Relaxed);

        // Dropped outside the lock
        match displaced {
            Some(old) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(sequence = old.sequence, "Overwrote undrained frame");
                true
            }
            None => false,
        }
    }

    /// Take the pending frame, leaving the slot empty
    pub fn drain_and_take(&self) -> Option<TransformedFrame> {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Frames published so far
    pub fn published_frames(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames overwritten before the renderer drained them
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn frame(sequence: u64) -> TransformedFrame {
        TransformedFrame {
            width: 1,
            height: 1,
            pixels: vec![sequence as u8, 0, 0, 255],
            sequence,
        }
    }

    #[test]
    fn test_latest_wins() {
        let slot = PendingFrameSlot::new();
        assert!(!slot.publish(frame(1)));
        assert!(slot.publish(frame(2)));

        assert_eq!(slot.drain_and_take().map(|f| f.sequence), Some(2));
        assert_eq!(slot.drain_and_take(), None);
        assert_eq!(slot.published_frames(), 2);
        assert_eq!(slot.dropped_frames(), 1);
    }

    #[test]
    fn test_empty_slot_drains_none() {
        let slot = PendingFrameSlot::new();
        assert!(slot.drain_and_take().is_none());
        assert_eq!(slot.dropped_frames(), 0);
    }

    #[test]
    fn test_concurrent_publish_and_drain_accounts_for_every_frame() {
        let slot = Arc::new(PendingFrameSlot::new());
        let producer_slot = Arc::clone(&slot);

        let producer = thread::spawn(move || {
            for sequence in 0..1000 {
                producer_slot.publish(frame(sequence));
            }
        });

        let mut drained = Vec::new();
        while !producer.is_finished() {
            if let Some(f) = slot.drain_and_take() {
                drained.push(f.sequence);
            }
        }
        producer.join().unwrap();
        if let Some(f) = slot.drain_and_take() {
            drained.push(f.sequence);
        }

        // Drained frames arrive in publish order and the last one is never lost
        assert!(drained.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(drained.last(), Some(&999));
        assert_eq!(drained.len() as u64 + slot.dropped_frames(), 1000);
    }
}
