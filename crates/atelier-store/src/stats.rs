use std::sync::Arc;

use tokio::sync::mpsc;

use crate::collaborators::StatsSink;

/// Counter increment to be recorded asynchronously
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsEvent {
    Prompt { prompt: String, model: String },
    Tag(String),
}

/// Async statistics recorder that dispatches increments to a background task
///
/// Increments are sent via an unbounded channel so recording never blocks
/// the generation flow. Failures are logged and dropped.
#[derive(Clone)]
pub struct StatsRecorder {
    tx: mpsc::UnboundedSender<StatsEvent>,
}

impl StatsRecorder {
    /// Create a new recorder and spawn its background processing task
    ///
    /// The background task runs until every sender is dropped
    #[must_use]
    pub fn new(sink: Arc<dyn StatsSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(process_events(rx, sink));

        Self { tx }
    }

    /// Enqueue one prompt usage and one increment per tag key
    pub fn record(&self, prompt: &str, model: &str, tag_keys: &[String]) {
        self.send(StatsEvent::Prompt {
            prompt: prompt.to_owned(),
            model: model.to_owned(),
        });
        for tag in tag_keys {
            self.send(StatsEvent::Tag(tag.clone()));
        }
    }

    fn send(&self, event: StatsEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(error = %e, "failed to enqueue stats event, channel closed");
        }
    }
}

impl std::fmt::Debug for StatsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRecorder").finish_non_exhaustive()
    }
}

async fn process_events(mut rx: mpsc::UnboundedReceiver<StatsEvent>, sink: Arc<dyn StatsSink>) {
    while let Some(event) = rx.recv().await {
        let outcome = match &event {
            StatsEvent::Prompt { prompt, model } => sink.increment_prompt_usage(prompt, model).await,
            StatsEvent::Tag(tag) => sink.increment_tag_usage(tag).await,
        };

        if let Err(e) = outcome {
            tracing::warn!(error = %e, event = ?event, "failed to record usage statistics");
        }
    }

    tracing::debug!("stats recorder shutting down");
}
