//! Dedicated OSC send thread: pre-encoded packets are pushed to a bounded
//! channel from the processing tick, and a dedicated thread drains the channel
//! and performs the actual (possibly blocking) transport write.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::transport::Transport;

/// Send queue capacity shared by both transports.
const SEND_QUEUE_CAPACITY: usize = 256;

pub struct OscSender {
    tx: Sender<Vec<u8>>,
    queue_depth: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl OscSender {
    /// Spawn the sender thread, which owns `transport` for its lifetime.
    pub fn spawn(mut transport: Box<dyn Transport>) -> Self {
        let (tx, rx): (Sender<Vec<u8>>, Receiver<Vec<u8>>) =
            crossbeam_channel::bounded(SEND_QUEUE_CAPACITY);
        let queue_depth = Arc::new(AtomicUsize::new(0));
        let depth_clone = queue_depth.clone();

        let handle = thread::Builder::new()
            .name("sound2osc-osc-sender".into())
            .spawn(move || {
                while let Ok(bytes) = rx.recv() {
                    depth_clone.fetch_sub(1, Ordering::Relaxed);
                    transport.send(&bytes);
                }
            })
            .expect("failed to spawn sound2osc-osc-sender thread");

        Self {
            tx,
            queue_depth,
            handle: Some(handle),
        }
    }

    /// Queue an already-encoded packet. Returns `true` if accepted, `false` if
    /// the queue was full (the caller should drop it and count an overflow).
    pub fn try_send(&self, bytes: Vec<u8>) -> bool {
        match self.tx.try_send(bytes) {
            Ok(()) => {
                self.queue_depth.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!(target: "osc::sender", "send queue full, dropping packet");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Current send-queue depth, for surfacing pressure before
    /// `TransportOverflow` actually fires.
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }
}

impl Drop for OscSender {
    fn drop(&mut self) {
        // Dropping `tx` (implicitly, via struct drop order after this call
        // returns) closes the channel; join to let in-flight sends finish.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingTransport {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, bytes: &[u8]) -> bool {
            self.sent.lock().unwrap().push(bytes.to_vec());
            true
        }
    }

    #[test]
    fn queued_packets_reach_the_transport() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport { sent: sent.clone() };
        let sender = OscSender::spawn(Box::new(transport));

        assert!(sender.try_send(vec![1, 2, 3]));
        drop(sender);

        assert_eq!(sent.lock().unwrap().as_slice(), &[vec![1, 2, 3]]);
    }

    #[test]
    fn queue_depth_tracks_pending_sends() {
        struct StallingTransport;
        impl Transport for StallingTransport {
            fn send(&mut self, _bytes: &[u8]) -> bool {
                std::thread::sleep(std::time::Duration::from_millis(100));
                true
            }
        }
        let sender = OscSender::spawn(Box::new(StallingTransport));
        sender.try_send(vec![1]);
        sender.try_send(vec![2]);
        // The sender thread drains one entry at a time; depth should reflect
        // at least one still-queued packet shortly after submission.
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(sender.queue_depth() >= 1);
    }

    #[test]
    fn a_full_queue_rejects_further_sends_without_blocking() {
        struct StallingTransport;
        impl Transport for StallingTransport {
            fn send(&mut self, _bytes: &[u8]) -> bool {
                std::thread::sleep(std::time::Duration::from_millis(50));
                true
            }
        }
        let sender = OscSender::spawn(Box::new(StallingTransport));
        let mut rejected = false;
        for _ in 0..(SEND_QUEUE_CAPACITY + 8) {
            if !sender.try_send(vec![0]) {
                rejected = true;
                break;
            }
        }
        assert!(rejected, "queue should eventually reject when the drain lags behind");
    }
}
