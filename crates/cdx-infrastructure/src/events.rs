//! Progress-sink adapters behind [`ProgressSink`].

use cdx_domain::ports::infrastructure::ProgressSink;
use cdx_domain::value_objects::IndexingProgress;
use tokio::sync::mpsc;
use tracing::info;

/// Logs progress updates through tracing.
#[derive(Default)]
pub struct TracingProgressSink;

impl TracingProgressSink {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressSink for TracingProgressSink {
    fn notify(&self, progress: IndexingProgress) {
        info!(
            "[INDEX] {} {}/{} {}",
            progress.stage, progress.current, progress.total, progress.message
        );
    }
}

/// Forwards progress updates over a channel, e.g. to a UI task.
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<IndexingProgress>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IndexingProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn notify(&self, progress: IndexingProgress) {
        // Receiver gone means nobody is listening; drop silently.
        let _ = self.tx.send(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdx_domain::value_objects::IndexingStage;

    #[tokio::test]
    async fn channel_sink_forwards_updates() {
        let (sink, mut rx) = ChannelProgressSink::new();
        sink.notify(IndexingProgress {
            stage: IndexingStage::Scanning,
            current: 0,
            total: 3,
            current_file: None,
            message: "scanning files".to_string(),
        });
        let update = rx.recv().await.unwrap();
        assert_eq!(update.stage, IndexingStage::Scanning);
        assert_eq!(update.total, 3);
    }
}
