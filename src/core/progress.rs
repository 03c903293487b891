use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

/// Human-facing notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Stage(String),
    ImageStarted {
        index: usize,
        total: usize,
        name: String,
    },
    ImageAnalysed {
        index: usize,
        total: usize,
        name: String,
    },
    ImageFailed {
        index: usize,
        total: usize,
        name: String,
        error: String,
    },
    RetryScheduled {
        label: String,
        attempt: u32,
        max_attempts: u32,
        wait: Duration,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Stage(message) => write!(f, "{message}"),
            ProgressEvent::ImageStarted { index, total, name } => {
                write!(f, "({index}/{total}) analysing {name}...")
            }
            ProgressEvent::ImageAnalysed { index, total, name } => {
                write!(f, "({index}/{total}) {name} done")
            }
            ProgressEvent::ImageFailed {
                index,
                total,
                name,
                error,
            } => write!(f, "({index}/{total}) {name} failed: {error}"),
            ProgressEvent::RetryScheduled {
                label,
                attempt,
                max_attempts,
                wait,
            } => write!(
                f,
                "{label}: rate limited (attempt {attempt}/{max_attempts}), waiting {}s before retrying",
                wait.as_secs()
            ),
        }
    }
}

/// Sending half handed to the pipeline. The default handle has no receiver
/// and drops every event.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl Progress {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // The display may already be gone once the run is winding down.
            let _ = tx.send(event);
        }
    }

    pub fn stage(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Stage(message.into()));
    }
}

/// Terminal-side consumer: keeps the overall fraction and a bounded tail of
/// timestamped lines.
pub struct ProgressLog {
    pub progress: f64,
    pub logs: Vec<String>,
    pub max_logs: usize,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self {
            progress: 0.0,
            logs: Vec::new(),
            max_logs: 50,
        }
    }

    pub fn set_progress(&mut self, progress: f64) {
        self.progress = progress.clamp(0.0, 1.0);
    }

    /// Records an event and returns the formatted line for printing.
    pub fn record(&mut self, event: &ProgressEvent) -> String {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let mut line = format!("[{timestamp}] {event}");

        match event {
            ProgressEvent::ImageAnalysed { index, total, .. }
            | ProgressEvent::ImageFailed { index, total, .. }
                if *total > 0 =>
            {
                self.set_progress(*index as f64 / *total as f64);
                line.push_str(&format!(" [{:.0}%]", self.progress * 100.0));
            }
            _ => {}
        }

        self.logs.push(line.clone());
        if self.logs.len() > self.max_logs {
            self.logs.remove(0);
        }

        line
    }

    /// Drains `rx` until every sender is dropped, echoing to stderr.
    pub async fn drain(mut self, mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> Self {
        while let Some(event) = rx.recv().await {
            let line = self.record(&event);
            eprintln!("{line}");
        }
        self
    }
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new()
    }
}
