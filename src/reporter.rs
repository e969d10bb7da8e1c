//! Hand-off of obstacle points to a network reporter on its own thread
//!
//! The mapping tick pushes points into a bounded channel and blocks when it
//! is full. A worker thread drains the channel in batches and performs the
//! blocking report call, so a slow server never stalls more than the
//! channel's worth of points.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, info};
use serde::Serialize;
use thiserror::Error;

use crate::error::FusionError;
use crate::mapper::ObstaclePoint;
use crate::types::ReporterSettings;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered with status {0}")]
    Status(u16),
}

/// Destination for batches of obstacle points
///
/// Runs on the reporter worker thread, so implementations may block.
pub trait Reporter: Send + 'static {
    fn report(&mut self, batch: &[ObstaclePoint]) -> Result<(), ReportError>;
}

/// Producer side of the reporter channel
#[derive(Debug, Clone)]
pub struct PointSink {
    sender: Sender<ObstaclePoint>,
}

impl PointSink {
    /// Queue a point, blocking while the channel is full
    pub fn push(&self, point: ObstaclePoint) -> Result<(), FusionError> {
        self.sender
            .send(point)
            .map_err(|_| FusionError::ReporterClosed)
    }

    /// Points queued and not yet taken by the worker
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

/// Start the reporter worker thread
///
/// The worker exits once every [`PointSink`] clone has been dropped, after
/// reporting any partial batch.
pub fn spawn_reporter<R: Reporter>(
    reporter: R,
    settings: &ReporterSettings,
) -> Result<(PointSink, JoinHandle<()>), FusionError> {
    let (sender, receiver) = channel::bounded(settings.channel_capacity);
    let batch_size = settings.batch_size.max(1);

    let handle = std::thread::Builder::new()
        .name("point-reporter".to_string())
        .spawn(move || run_worker(reporter, receiver, batch_size))?;

    Ok((PointSink { sender }, handle))
}

fn run_worker<R: Reporter>(mut reporter: R, receiver: Receiver<ObstaclePoint>, batch_size: usize) {
    let mut batch = Vec::with_capacity(batch_size);

    for point in receiver.iter() {
        batch.push(point);
        if batch.len() == batch_size {
            deliver(&mut reporter, &batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        deliver(&mut reporter, &batch);
    }
    info!("Reporter worker stopped");
}

/// A failed batch is logged and dropped
fn deliver<R: Reporter>(reporter: &mut R, batch: &[ObstaclePoint]) {
    match reporter.report(batch) {
        Ok(()) => debug!("Reported {} points", batch.len()),
        Err(e) => error!("Dropping {} points: {}", batch.len(), e),
    }
}

#[derive(Debug, Serialize)]
struct CollectRequest<'a> {
    board_id: &'a str,
    spatials: Vec<[f64; 2]>,
    positions: Vec<[f64; 2]>,
}

impl<'a> CollectRequest<'a> {
    fn new(board_id: &'a str, batch: &[ObstaclePoint]) -> Self {
        Self {
            board_id,
            spatials: batch.iter().map(|p| [p.point.x, p.point.y]).collect(),
            positions: batch.iter().map(|p| [p.position.x, p.position.y]).collect(),
        }
    }
}

/// Posts batches as JSON to the collecting server
pub struct HttpReporter {
    client: reqwest::blocking::Client,
    url: String,
    board_id: String,
}

impl HttpReporter {
    /// Must be called outside of an async runtime; the blocking client owns
    /// one internally.
    pub fn new(settings: &ReporterSettings) -> Result<Self, ReportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout_ms.map(Duration::from_millis))
            .build()?;

        Ok(Self {
            client,
            url: collect_url(settings),
            board_id: settings.board_id.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Reporter for HttpReporter {
    fn report(&mut self, batch: &[ObstaclePoint]) -> Result<(), ReportError> {
        let request = CollectRequest::new(&self.board_id, batch);
        let response = self.client.post(&self.url).json(&request).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Status(status.as_u16()));
        }
        Ok(())
    }
}

fn collect_url(settings: &ReporterSettings) -> String {
    let endpoint = settings.endpoint.trim_start_matches('/');
    format!("http://{}:{}/{}", settings.host, settings.port, endpoint)
}
