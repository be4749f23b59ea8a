//! Hub side: fan out scoring to spokes, fan the candidates back in.
//!
//! The current records are split into contiguous chunks of
//! `ceil(len / worker_count)`. Each chunk, plus a private copy of the whole
//! next collection, goes to exactly one spoke. The hub writes batches and
//! reads responses concurrently, so a spoke never stalls on a full output
//! buffer while the hub is still feeding it.
//!
//! A spoke that fails to launch, breaks its stream or times out keeps
//! whatever match frames it delivered before the fault; the run continues.

use std::sync::Arc;
use std::time::Duration;

use crate::config::CompareOptions;
use crate::similarity::SimilarityCandidate;
use crate::types::Record;

use super::launcher::{SpokeConnection, SpokeLauncher};
use super::messages::{ScoringParams, SpokeRequest, SpokeResponse};
use super::transport::{FrameSink, FrameSource, TransportError};

/// Coordinates parallel scoring across spokes.
#[derive(Clone)]
pub struct MatchHub {
    launcher: Arc<dyn SpokeLauncher>,
    options: CompareOptions,
}

impl std::fmt::Debug for MatchHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchHub")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// How one spoke's run ended.
#[derive(Debug)]
enum SpokeEnd {
    Finished,
    Faulted(TransportError),
}

impl MatchHub {
    /// Create a hub.
    pub fn new(launcher: Arc<dyn SpokeLauncher>, options: CompareOptions) -> Self {
        Self { launcher, options }
    }

    /// Score every (current, next) pair across spokes.
    ///
    /// Candidates from all spokes are concatenated; their order across
    /// spokes is unspecified.
    pub async fn run(&self, current: &[Record], next: &[Record]) -> Vec<SimilarityCandidate> {
        if current.is_empty() || next.is_empty() {
            return Vec::new();
        }

        let workers = self.options.worker_count.max(1);
        let chunk_size = current.len().div_ceil(workers);
        let params = ScoringParams::from(&self.options);

        tracing::info!(
            spokes = current.len().div_ceil(chunk_size),
            chunk_size = chunk_size,
            current = current.len(),
            next = next.len(),
            "fanning out to spokes"
        );

        let mut tasks = Vec::new();
        for (index, chunk) in current.chunks(chunk_size).enumerate() {
            let job = SpokeJob {
                index,
                launcher: Arc::clone(&self.launcher),
                current: chunk.to_vec(),
                next: next.to_vec(),
                params,
                batch_size: self.options.batch_size.max(1),
                timeout: self.options.worker_timeout,
            };
            tasks.push((index, tokio::spawn(job.run())));
        }

        let mut candidates = Vec::new();
        for (index, task) in tasks {
            match task.await {
                Ok(found) => candidates.extend(found),
                Err(e) => tracing::error!(spoke = index, error = %e, "spoke coordinator task failed"),
            }
        }

        tracing::info!(candidates = candidates.len(), "all spokes joined");
        candidates
    }
}

/// Everything one spoke needs, owned.
struct SpokeJob {
    index: usize,
    launcher: Arc<dyn SpokeLauncher>,
    current: Vec<Record>,
    next: Vec<Record>,
    params: ScoringParams,
    batch_size: usize,
    timeout: Option<Duration>,
}

impl SpokeJob {
    async fn run(self) -> Vec<SimilarityCandidate> {
        let index = self.index;
        let SpokeConnection {
            mut sink,
            mut source,
            handle,
        } = match self.launcher.launch(index).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::error!(spoke = index, error = %e, "failed to launch spoke");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        let exchange = async {
            let writer = feed(sink.as_mut(), &self.current, &self.next, self.batch_size, self.params);
            let reader = collect(source.as_mut(), index, &mut found);
            tokio::join!(writer, reader)
        };

        let (written, read) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(outcome) => outcome,
                Err(_) => (Ok(()), SpokeEnd::Faulted(TransportError::TimedOut)),
            },
            None => exchange.await,
        };

        if let Err(e) = written {
            tracing::error!(spoke = index, error = %e, "failed to feed spoke");
        }
        match read {
            SpokeEnd::Finished => {
                tracing::debug!(spoke = index, matches = found.len(), "spoke finished");
            }
            SpokeEnd::Faulted(e) => {
                tracing::error!(
                    spoke = index,
                    error = %e,
                    partial_matches = found.len(),
                    "spoke ended before finishing; keeping partial results"
                );
            }
        }

        drop(sink);
        drop(source);
        handle.terminate(index).await;
        found
    }
}

/// Write every batch, then the end-of-input frame.
///
/// Batches are never empty, so only the final frame has both lists empty.
async fn feed(
    sink: &mut dyn FrameSink<SpokeRequest>,
    current: &[Record],
    next: &[Record],
    batch_size: usize,
    params: ScoringParams,
) -> Result<(), TransportError> {
    for batch in current.chunks(batch_size) {
        sink.send(SpokeRequest::batch(batch.to_vec(), Vec::new())).await?;
    }
    for batch in next.chunks(batch_size) {
        sink.send(SpokeRequest::batch(Vec::new(), batch.to_vec())).await?;
    }
    sink.send(SpokeRequest::end_of_input(params)).await
}

/// Read frames until `finished` or a fault, appending match frames to `found`.
async fn collect(
    source: &mut dyn FrameSource<SpokeResponse>,
    index: usize,
    found: &mut Vec<SimilarityCandidate>,
) -> SpokeEnd {
    loop {
        match source.recv().await {
            Ok(Some(SpokeResponse::Finished { finished: true })) => return SpokeEnd::Finished,
            Ok(Some(SpokeResponse::Finished { finished: false })) => {}
            Ok(Some(SpokeResponse::Info { info })) => {
                tracing::info!(spoke = index, "{info}");
            }
            Ok(Some(SpokeResponse::Match(candidate))) => {
                if !candidate.similarity.is_finite() {
                    tracing::warn!(
                        spoke = index,
                        current_id = %candidate.current_id,
                        next_id = %candidate.next_id,
                        "incomparable pair reported; treating similarity as 0"
                    );
                }
                found.push(SimilarityCandidate::new(
                    candidate.current_id,
                    candidate.next_id,
                    candidate.similarity,
                ));
            }
            Ok(None) => return SpokeEnd::Faulted(TransportError::Closed),
            Err(TransportError::Codec(e)) => {
                tracing::warn!(spoke = index, error = %e, "skipping undecodable frame");
            }
            Err(e) => return SpokeEnd::Faulted(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::launcher::InProcessLauncher;
    use crate::similarity::score_all;
    use crate::types::Value;

    fn records(offset: i64, n: i64) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(offset + i, Value::object("N", [("a", i % 4), ("b", i % 3), ("c", 1)])))
            .collect()
    }

    fn sorted(mut v: Vec<SimilarityCandidate>) -> Vec<SimilarityCandidate> {
        v.sort_by(crate::matching::candidate_order);
        v
    }

    #[tokio::test]
    async fn test_hub_matches_in_process_scoring() {
        let current = records(0, 10);
        let next = records(100, 7);
        let options = CompareOptions::default().with_threshold(0.5).with_workers(3).with_batch_size(2);

        let hub = MatchHub::new(Arc::new(InProcessLauncher::default()), options);
        let parallel = hub.run(&current, &next).await;
        let sequential = score_all(&current, &next, 0.5, None);

        assert_eq!(sorted(parallel), sorted(sequential));
    }

    #[tokio::test]
    async fn test_more_workers_than_records() {
        let current = records(0, 2);
        let next = records(100, 2);
        let options = CompareOptions::default().with_threshold(0.0).with_workers(8);

        let hub = MatchHub::new(Arc::new(InProcessLauncher::default()), options);
        assert_eq!(hub.run(&current, &next).await.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let hub = MatchHub::new(
            Arc::new(InProcessLauncher::default()),
            CompareOptions::default().with_workers(2),
        );
        assert!(hub.run(&[], &records(0, 3)).await.is_empty());
    }
}
