//! Scoring orchestrator: the sequential per-row loop behind every analysis endpoint.
//!
//! Flow per batch: build prompt context once → (resume scan) → for each row in
//! input order: skip if already completed, else score → weight → merge → deliver,
//! pacing between model calls.
//!
//! Delivery is either accumulated (`run_batch`, optionally persisted through an
//! [`IncrementalSink`]) or pushed one row at a time over a bounded channel
//! (`run_stream`). A row that fails to score still yields a placeholder result.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::context::PortfolioContext;
use crate::models::scoring::{LlmScoringResult, ScoredResult, ScoringOutcome};
use crate::models::table::{CandidateRow, Table};
use crate::scoring::client::ScoringClient;
use crate::scoring::pacer::RequestPacer;
use crate::scoring::prompts::PromptContext;
use crate::scoring::sink::{CompletedSet, IncrementalSink};
use crate::scoring::weights::{compute_final_score, ScoringWeights};

/// Result of a batch run. `skipped` lists rows found in prior output.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<ScoredResult>,
    pub skipped: Vec<String>,
}

pub struct ScoringOrchestrator {
    client: ScoringClient,
    weights: Arc<ScoringWeights>,
    pacer: RequestPacer,
    identity_column: String,
}

impl ScoringOrchestrator {
    pub fn new(
        client: ScoringClient,
        weights: Arc<ScoringWeights>,
        pacer: RequestPacer,
        identity_column: String,
    ) -> Self {
        Self {
            client,
            weights,
            pacer,
            identity_column,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores one row and merges it with its weighted score.
    /// Failed outcomes are replaced by the error placeholder and logged.
    async fn score_row(&self, row: &CandidateRow, name: &str, ctx: &PromptContext) -> ScoredResult {
        let (report, failure) = match self.client.score(row, ctx).await {
            ScoringOutcome::Scored(report) => (report, None),
            ScoringOutcome::Failed { reason } => {
                warn!("Scoring failed for '{name}': {reason}; emitting placeholder row");
                (
                    LlmScoringResult::error_default(self.weights.dimensions()),
                    Some(reason),
                )
            }
        };
        let final_score = compute_final_score(&report.dimensional_scores, &self.weights);
        ScoredResult::new(row, &report, final_score, failure)
    }

    /// Runs the whole table and returns every newly scored row in input order.
    ///
    /// With a sink, rows already present in its artifact are skipped and each new
    /// result is persisted as soon as it is scored. Sink failures are logged only.
    pub async fn run_batch(
        &self,
        table: &Table,
        context: PortfolioContext<'_>,
        sink: Option<&IncrementalSink>,
    ) -> BatchOutcome {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", %batch_id, rows = table.len());
        self.run_batch_inner(table, context, sink).instrument(span).await
    }

    async fn run_batch_inner(
        &self,
        table: &Table,
        context: PortfolioContext<'_>,
        sink: Option<&IncrementalSink>,
    ) -> BatchOutcome {
        let ctx = PromptContext::from_portfolio(&context);
        let completed = match sink {
            Some(sink) => self.resume_scan(sink).await,
            None => CompletedSet::default(),
        };

        let total = table.len();
        let mut outcome = BatchOutcome::default();
        let mut called = false;

        for (index, row) in table.rows.iter().enumerate() {
            let name = row.display_name(&self.identity_column, index);
            if completed.contains(&name) {
                info!("[{}/{}] Skipping '{name}': already in prior output", index + 1, total);
                outcome.skipped.push(name);
                continue;
            }

            if called {
                self.pacer.wait().await;
            }
            called = true;

            info!("[{}/{}] Scoring '{name}'", index + 1, total);
            let result = self.score_row(row, &name, &ctx).await;
            info!(
                "[{}/{}] '{name}' scored {}",
                index + 1,
                total,
                result.final_weighted_score()
            );

            if let Some(sink) = sink {
                persist(sink, &name, &result).await;
            }
            outcome.results.push(result);
        }

        let failed = outcome.results.iter().filter(|r| r.failure().is_some()).count();
        info!(
            "Batch finished: {} scored ({failed} failed), {} skipped",
            outcome.results.len(),
            outcome.skipped.len()
        );
        outcome
    }

    async fn resume_scan(&self, sink: &IncrementalSink) -> CompletedSet {
        let reader = sink.clone();
        let identity = self.identity_column.clone();
        match tokio::task::spawn_blocking(move || reader.completed_set(&identity)).await {
            Ok(set) => {
                if !set.is_empty() {
                    info!(
                        "Resuming from {}: {} rows already scored",
                        sink.path().display(),
                        set.len()
                    );
                }
                set
            }
            Err(e) => {
                warn!("Resume scan aborted: {e}; starting from scratch");
                CompletedSet::default()
            }
        }
    }

    /// Streams one result per row, in input order, over a bounded channel.
    ///
    /// The producer stops as soon as the receiver is dropped: it checks before
    /// each model call and while waiting out the pacing delay.
    pub fn run_stream(self: Arc<Self>, table: Table, ctx: PromptContext) -> ReceiverStream<ScoredResult> {
        let (tx, rx) = mpsc::channel(1);
        let batch_id = Uuid::new_v4();
        let span = info_span!("stream", %batch_id, rows = table.len());

        tokio::spawn(
            async move {
                let total = table.len();
                for (index, row) in table.rows.iter().enumerate() {
                    if index > 0 {
                        tokio::select! {
                            _ = self.pacer.wait() => {}
                            _ = tx.closed() => {
                                info!("Client disconnected; stopping after {index} of {total} rows");
                                return;
                            }
                        }
                    }
                    if tx.is_closed() {
                        info!("Client disconnected; stopping after {index} of {total} rows");
                        return;
                    }

                    let name = row.display_name(&self.identity_column, index);
                    info!("[{}/{}] Streaming '{name}'", index + 1, total);
                    let result = self.score_row(row, &name, &ctx).await;

                    if tx.send(result).await.is_err() {
                        info!("Client disconnected; dropping result for '{name}'");
                        return;
                    }
                }
                info!("Stream finished: {total} rows");
            }
            .instrument(span),
        );

        ReceiverStream::new(rx)
    }

    /// Re-scores one edited candidate outside any batch: no resume, no pacing.
    pub async fn score_single(&self, candidate: &CandidateRow, context: PortfolioContext<'_>) -> ScoredResult {
        let ctx = PromptContext::from_portfolio(&context);
        let name = candidate.display_name(&self.identity_column, 0);
        info!("Re-scoring '{name}'");
        let result = self.score_row(candidate, &name, &ctx).await;
        info!("'{name}' re-scored {}", result.final_weighted_score());
        result
    }
}

async fn persist(sink: &IncrementalSink, key: &str, result: &ScoredResult) {
    let sink = sink.clone();
    let key = key.to_string();
    let row = result.clone();
    match tokio::task::spawn_blocking(move || sink.append(&key, &row)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Could not persist result incrementally: {e}"),
        Err(e) => warn!("Incremental persist task failed: {e}"),
    }
}
