//! Cooperative cancellation for in-flight response streams.

use tokio::sync::broadcast;

/// Caller-held handle used to stop a live workflow response.
///
/// Cloneable so the UI layer can keep one reference per active stream and
/// signal it from outside the read loop.
#[derive(Debug, Clone)]
pub struct StreamCancelHandle {
    sender: broadcast::Sender<()>,
}

impl StreamCancelHandle {
    pub fn new() -> (Self, StreamCancelReceiver) {
        let (sender, receiver) = broadcast::channel(1);
        (Self { sender }, StreamCancelReceiver { receiver })
    }

    pub fn cancel(&self) {
        let _ = self.sender.send(());
    }
}

/// Receiving side polled by the stream processor at each read iteration.
#[derive(Debug)]
pub struct StreamCancelReceiver {
    receiver: broadcast::Receiver<()>,
}

impl StreamCancelReceiver {
    pub fn is_cancelled(&mut self) -> bool {
        self.receiver.try_recv().is_ok()
    }
}
