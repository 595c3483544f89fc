use futures_util::stream::{BoxStream, SelectAll, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::models::OperationProgress;

/// Snapshots of one transfer, starting with the state current at
/// subscription and ending once the transfer reaches a terminal state.
pub struct ProgressStream {
    id: String,
    rx: mpsc::UnboundedReceiver<OperationProgress>,
}

impl ProgressStream {
    pub(crate) fn new(id: String, rx: mpsc::UnboundedReceiver<OperationProgress>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// drain the stream and return the last snapshot seen
    pub async fn finish(mut self) -> Option<OperationProgress> {
        let mut last = None;
        while let Some(snapshot) = self.next().await {
            last = Some(snapshot);
        }
        last
    }
}

impl Stream for ProgressStream {
    type Item = OperationProgress;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Several transfers observed as one: every update from any of them yields
/// the latest snapshot of all of them, in the order they were started.
pub struct BatchProgressStream {
    latest: Vec<OperationProgress>,
    inner: SelectAll<BoxStream<'static, (usize, OperationProgress)>>,
}

impl BatchProgressStream {
    pub(crate) fn new(streams: Vec<(OperationProgress, ProgressStream)>) -> Self {
        let mut latest = Vec::with_capacity(streams.len());
        let mut inner = SelectAll::new();
        for (index, (initial, stream)) in streams.into_iter().enumerate() {
            latest.push(initial);
            inner.push(stream.map(move |snapshot| (index, snapshot)).boxed());
        }
        Self { latest, inner }
    }

    pub fn ids(&self) -> Vec<String> {
        self.latest.iter().map(|p| p.id.clone()).collect()
    }

    /// drain the stream and return the final snapshot of every transfer
    pub async fn finish(mut self) -> Vec<OperationProgress> {
        while self.next().await.is_some() {}
        self.latest
    }
}

impl Stream for BatchProgressStream {
    type Item = Vec<OperationProgress>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some((index, snapshot))) => {
                self.latest[index] = snapshot;
                Poll::Ready(Some(self.latest.clone()))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

const NEW_SAMPLE_WEIGHT: f64 = 0.3;

/// Remaining-time estimate smoothed against the previous one.
#[derive(Debug, Clone, Default)]
pub struct EtaEstimator {
    previous: Option<f64>,
}

impl EtaEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<f64> {
        self.previous
    }

    /// fold in a progress tick and return the estimate in seconds
    pub fn sample(&mut self, transferred: u64, total: u64, elapsed: Duration) -> f64 {
        let elapsed_secs = elapsed.as_secs_f64();
        let fallback = self.previous.unwrap_or(0.0);
        if elapsed_secs <= 0.0 {
            return fallback;
        }

        let throughput = transferred as f64 / elapsed_secs;
        if throughput <= 0.0 || !throughput.is_finite() {
            return fallback;
        }

        let raw = total.saturating_sub(transferred) as f64 / throughput;
        let estimate = match self.previous {
            Some(previous) => NEW_SAMPLE_WEIGHT * raw + (1.0 - NEW_SAMPLE_WEIGHT) * previous,
            None => raw,
        };
        self.previous = Some(estimate);
        estimate
    }
}
