//! Spoke side of the hub/spoke protocol.
//!
//! A spoke buffers batches until the end-of-input frame, scores its current
//! records against all next records and streams back one match frame per
//! qualifying pair, interleaved with progress frames, then `finished`.

use crate::similarity::{format_progress, progress_step, score_row};
use crate::types::Record;

use super::messages::{RequestKind, ScoringParams, SpokeRequest, SpokeResponse};
use super::transport::{FrameSink, FrameSource, TransportError};

/// What a spoke did, returned when it exits cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpokeSummary {
    /// Current records received.
    pub current_values: usize,
    /// Next records received.
    pub next_values: usize,
    /// Match frames sent.
    pub matches: usize,
}

/// Run one spoke to completion.
///
/// Fails with [`TransportError::Closed`] if the input ends before the
/// end-of-input frame, or with whatever error the transport reports.
pub async fn run_spoke<Src, Snk>(mut source: Src, mut sink: Snk) -> Result<SpokeSummary, TransportError>
where
    Src: FrameSource<SpokeRequest>,
    Snk: FrameSink<SpokeResponse>,
{
    let (current, next, params) = receive_inputs(&mut source).await?;

    sink.send(SpokeResponse::info(format!(
        "{} current values and {} next values received",
        current.len(),
        next.len()
    )))
    .await?;

    let total = current.len();
    let step = progress_step(total);
    let mut matches = 0usize;

    for (i, record) in current.iter().enumerate() {
        if i % step == 0 {
            sink.send(SpokeResponse::info(format!("Progress: {}", format_progress(i, total))))
                .await?;
        }

        for candidate in score_row(record, &next, params.threshold, params.property_cap) {
            sink.send(SpokeResponse::Match(candidate)).await?;
            matches += 1;
        }
    }

    sink.send(SpokeResponse::info("Progress: 100%")).await?;
    sink.send(SpokeResponse::finished()).await?;

    tracing::debug!(
        current = total,
        next = next.len(),
        matches = matches,
        "spoke finished"
    );

    Ok(SpokeSummary {
        current_values: total,
        next_values: next.len(),
        matches,
    })
}

async fn receive_inputs<Src>(source: &mut Src) -> Result<(Vec<Record>, Vec<Record>, ScoringParams), TransportError>
where
    Src: FrameSource<SpokeRequest>,
{
    let mut current = Vec::new();
    let mut next = Vec::new();

    loop {
        let Some(request) = source.recv().await? else {
            return Err(TransportError::Closed);
        };
        match request.kind() {
            RequestKind::EndOfInput => return Ok((current, next, request.params())),
            RequestKind::Batch => {
                current.extend(request.current_values);
                next.extend(request.next_values);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::transport::channel;
    use crate::types::{RecordId, Value};

    fn point(x: i64, y: i64, z: i64) -> Value {
        Value::object("Point", [("x", x), ("y", y), ("z", z)])
    }

    async fn drain(mut source: impl FrameSource<SpokeResponse>) -> Vec<SpokeResponse> {
        let mut frames = Vec::new();
        while let Some(frame) = source.recv().await.unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_spoke_protocol() {
        let (mut req_tx, req_rx) = channel(8);
        let (resp_tx, resp_rx) = channel(8);
        let spoke = tokio::spawn(run_spoke(req_rx, resp_tx));

        req_tx
            .send(SpokeRequest::batch(vec![Record::new(1, point(1, 2, 3))], Vec::new()))
            .await
            .unwrap();
        req_tx
            .send(SpokeRequest::batch(
                Vec::new(),
                vec![Record::new(10, point(1, 2, 4)), Record::new(11, point(7, 8, 9))],
            ))
            .await
            .unwrap();
        req_tx
            .send(SpokeRequest::end_of_input(ScoringParams {
                threshold: 0.5,
                property_cap: None,
            }))
            .await
            .unwrap();

        let frames = drain(resp_rx).await;
        let summary = spoke.await.unwrap().unwrap();
        assert_eq!(summary.matches, 1);

        assert_eq!(frames[0], SpokeResponse::info("1 current values and 2 next values received"));
        assert_eq!(frames[1], SpokeResponse::info("Progress: 0.00%"));
        match &frames[2] {
            SpokeResponse::Match(c) => {
                assert_eq!(c.current_id, RecordId::new(1));
                assert_eq!(c.next_id, RecordId::new(10));
            }
            other => panic!("expected match frame, got {other:?}"),
        }
        assert_eq!(frames[3], SpokeResponse::info("Progress: 100%"));
        assert!(frames[4].is_finished());
        assert_eq!(frames.len(), 5);
    }

    #[tokio::test]
    async fn test_spoke_input_closed_early() {
        let (mut req_tx, req_rx) = channel(8);
        let (resp_tx, _resp_rx) = channel(8);
        req_tx
            .send(SpokeRequest::batch(vec![Record::new(1, 1)], Vec::new()))
            .await
            .unwrap();
        drop(req_tx);

        let result = run_spoke(req_rx, resp_tx).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
