//! Ways to consume a walk: pushed events, a collected list, or a stream.

use std::collections::VecDeque;

use burrow_core::{Entry, WalkError};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::stats::WalkStats;
use crate::walker::{Pulled, Walker};

/// Default channel buffer size for walk events.
pub const WALK_CHANNEL_SIZE: usize = 100;

/// Event sent by a walk running in the background.
#[derive(Debug)]
pub enum WalkEvent {
    /// An accepted entry.
    Data(Entry),
    /// A recoverable error.
    Warn(WalkError),
    /// A fatal error. Nothing follows it.
    Error(WalkError),
    /// The walk completed. Sent exactly once, never after `Error`.
    End,
}

/// Everything a walk produced.
#[derive(Debug)]
pub struct WalkReport {
    /// Accepted entries in emission order.
    pub entries: Vec<Entry>,
    /// Warnings in the order they were raised.
    pub warnings: Vec<WalkError>,
    /// Final counters.
    pub stats: WalkStats,
}

/// Run a walk on a spawned task, sending events through a bounded channel.
///
/// The task pulls batches of the walker's high water mark and waits on the
/// channel when the receiver falls behind. Dropping the receiver cancels the
/// walk, as does cancelling the walker's token; a cancelled walk sends no
/// further events, including `End`.
pub fn start_walk(walker: Walker) -> mpsc::Receiver<WalkEvent> {
    let (tx, rx) = mpsc::channel(WALK_CHANNEL_SIZE);
    tokio::spawn(drive(walker, tx));
    rx
}

/// [`start_walk`] wrapped as a stream.
pub fn event_stream(walker: Walker) -> ReceiverStream<WalkEvent> {
    ReceiverStream::new(start_walk(walker))
}

async fn drive(mut walker: Walker, tx: mpsc::Sender<WalkEvent>) {
    let batch = walker.high_water_mark();
    let token = walker.cancel_token();

    loop {
        let pulled = tokio::select! {
            biased;
            _ = tx.closed() => {
                token.cancel();
                return;
            }
            pulled = walker.request_next(batch) => pulled,
        };
        match pulled {
            Ok(Some(items)) => {
                for item in items {
                    let event = match item {
                        Pulled::Entry(entry) => WalkEvent::Data(entry),
                        Pulled::Warning(err) => WalkEvent::Warn(err),
                    };
                    if token.is_cancelled() || tx.send(event).await.is_err() {
                        token.cancel();
                        return;
                    }
                }
            }
            Ok(None) => {
                if !token.is_cancelled() {
                    let _ = tx.send(WalkEvent::End).await;
                }
                return;
            }
            Err(err) => {
                if !token.is_cancelled() {
                    let _ = tx.send(WalkEvent::Error(err)).await;
                }
                return;
            }
        }
    }
}

impl Walker {
    /// Drain the walk into a list. Warnings are logged and dropped.
    pub async fn collect(self) -> Result<Vec<Entry>, WalkError> {
        Ok(self.collect_report().await?.entries)
    }

    /// Drain the walk, keeping warnings and final counters.
    pub async fn collect_report(mut self) -> Result<WalkReport, WalkError> {
        let batch = self.high_water_mark();
        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        while let Some(items) = self.request_next(batch).await? {
            for item in items {
                match item {
                    Pulled::Entry(entry) => entries.push(entry),
                    Pulled::Warning(err) => {
                        warn!(code = err.code(), path = %err.path().display(), "{err}");
                        warnings.push(err);
                    }
                }
            }
        }

        Ok(WalkReport {
            entries,
            warnings,
            stats: self.stats(),
        })
    }

    /// Consume the walk as a stream, pulling one entry at a time.
    ///
    /// Warnings are logged. A fatal error is yielded once and ends the stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<Entry, WalkError>> {
        stream::unfold(
            (self, VecDeque::new()),
            |(mut walker, mut buffered)| async move {
                loop {
                    if let Some(entry) = buffered.pop_front() {
                        return Some((Ok(entry), (walker, buffered)));
                    }
                    match walker.request_next(1).await {
                        Ok(Some(items)) => {
                            for item in items {
                                match item {
                                    Pulled::Entry(entry) => buffered.push_back(entry),
                                    Pulled::Warning(err) => {
                                        warn!(code = err.code(), path = %err.path().display(), "{err}");
                                    }
                                }
                            }
                        }
                        Ok(None) => return None,
                        Err(err) => return Some((Err(err), (walker, buffered))),
                    }
                }
            },
        )
        .boxed()
    }
}
