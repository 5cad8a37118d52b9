//! Telemetry producer contract
//!
//! A producer is started only after its single handler slot has been filled,
//! so no delivery can race the registration. Producers run on their own
//! tasks; [`forward_to`] funnels their deliveries into one channel so the
//! coordinator processes them sequentially.

use crate::telemetry::TelemetryEvent;
use fleetmirror_core::error::{MirrorError, Result};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Callback receiving each delivery (one sample or a batch)
pub type SampleHandler = Box<dyn FnMut(TelemetryEvent) + Send + 'static>;

pub trait TelemetryProducer: Send {
    fn name(&self) -> &str;

    /// Fill the handler slot, replacing any previous handler
    fn set_handler(&mut self, handler: SampleHandler);

    /// Begin delivery; fails if no handler is set or already started
    fn start(&mut self) -> Result<()>;
}

/// Handler that forwards every delivery into `tx`
pub fn forward_to(producer: &str, tx: mpsc::UnboundedSender<TelemetryEvent>) -> SampleHandler {
    let producer = producer.to_string();
    Box::new(move |event| {
        if tx.send(event).is_err() {
            tracing::debug!(producer = %producer, "Receiver closed, dropping telemetry");
        }
    })
}

/// Register a forwarding handler on `producer`, then start it
pub fn connect(
    producer: &mut dyn TelemetryProducer,
    tx: mpsc::UnboundedSender<TelemetryEvent>,
) -> Result<()> {
    let handler = forward_to(producer.name(), tx);
    producer.set_handler(handler);
    producer.start()
}

/// Producer fed through an in-process channel
pub struct ChannelProducer {
    name: String,
    rx: Option<mpsc::Receiver<TelemetryEvent>>,
    handler: Option<SampleHandler>,
    task: Option<JoinHandle<()>>,
}

impl ChannelProducer {
    /// Create the producer and the sender used to feed it
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Sender<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let producer = Self {
            name: name.into(),
            rx: Some(rx),
            handler: None,
            task: None,
        };
        (producer, tx)
    }

    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }
}

impl TelemetryProducer for ChannelProducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_handler(&mut self, handler: SampleHandler) {
        self.handler = Some(handler);
    }

    fn start(&mut self) -> Result<()> {
        let mut handler = self.handler.take().ok_or_else(|| {
            MirrorError::InvalidState(format!("producer '{}' has no handler", self.name))
        })?;
        let Some(mut rx) = self.rx.take() else {
            return Err(MirrorError::InvalidState(format!(
                "producer '{}' already started",
                self.name
            )));
        };

        self.task = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handler(event);
            }
        }));
        Ok(())
    }
}

/// Producer replaying a recorded stream, one JSON [`TelemetryEvent`] per line
///
/// The file is opened by [`start`](TelemetryProducer::start), so a missing
/// file fails there. Unparsable lines are logged and skipped. The handler is
/// dropped when the file is exhausted, which closes any channel it forwards to.
pub struct JsonLinesProducer {
    name: String,
    path: PathBuf,
    handler: Option<SampleHandler>,
    task: Option<JoinHandle<()>>,
}

impl JsonLinesProducer {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            handler: None,
            task: None,
        }
    }
}

impl TelemetryProducer for JsonLinesProducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_handler(&mut self, handler: SampleHandler) {
        self.handler = Some(handler);
    }

    fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(MirrorError::InvalidState(format!(
                "producer '{}' already started",
                self.name
            )));
        }
        let file = std::fs::File::open(&self.path)?;
        let mut handler = self.handler.take().ok_or_else(|| {
            MirrorError::InvalidState(format!("producer '{}' has no handler", self.name))
        })?;
        let file = tokio::fs::File::from_std(file);
        let name = self.name.clone();

        self.task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(file).lines();
            let mut line_no = 0usize;
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(producer = %name, "Read failed: {}", e);
                        break;
                    }
                };
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TelemetryEvent>(&line) {
                    Ok(event) => handler(event),
                    Err(e) => tracing::warn!(producer = %name, line_no, "Skipping line: {}", e),
                }
            }
            tracing::debug!(producer = %name, lines = line_no, "Telemetry stream exhausted");
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{Samples, VoltageSample};

    fn voltage(v_id: &str, voltage: f64) -> TelemetryEvent {
        TelemetryEvent::Voltage(Samples::One(VoltageSample {
            v_id: v_id.to_string(),
            voltage,
            recorded_at: None,
        }))
    }

    #[tokio::test]
    async fn test_start_requires_handler() {
        let (mut producer, _tx) = ChannelProducer::new("voltage", 4);
        assert!(matches!(
            producer.start(),
            Err(MirrorError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_channel_producer_forwards_in_order() {
        let (mut producer, tx) = ChannelProducer::new("voltage", 4);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        connect(&mut producer, out_tx).unwrap();
        assert!(producer.is_started());

        tx.send(voltage("A", 12.0)).await.unwrap();
        tx.send(voltage("A", 14.0)).await.unwrap();
        drop(tx);

        assert_eq!(out_rx.recv().await, Some(voltage("A", 12.0)));
        assert_eq!(out_rx.recv().await, Some(voltage("A", 14.0)));
        assert_eq!(out_rx.recv().await, None);
        assert!(producer.start().is_err());
    }

    #[tokio::test]
    async fn test_json_lines_producer_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        std::fs::write(
            &path,
            "{\"producer\":\"voltage\",\"samples\":{\"vID\":\"A\",\"voltage\":12.0}}\n\
             garbage\n\
             {\"producer\":\"voltage\",\"samples\":[{\"vID\":\"A\",\"voltage\":14.0}]}\n",
        )
        .unwrap();

        let mut producer = JsonLinesProducer::new("replay", &path);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        connect(&mut producer, out_tx).unwrap();

        assert_eq!(out_rx.recv().await, Some(voltage("A", 12.0)));
        let second = out_rx.recv().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_json_lines_producer_missing_file_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut producer = JsonLinesProducer::new("replay", dir.path().join("absent.jsonl"));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        let result = connect(&mut producer, out_tx);
        assert!(matches!(result, Err(MirrorError::Io(_))));
        // The rejected handler is still held by the producer, not running
        assert!(out_rx.try_recv().is_err());
        drop(producer);
        assert_eq!(out_rx.recv().await, None);
    }
}
