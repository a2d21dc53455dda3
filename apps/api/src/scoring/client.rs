use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::llm_client::TextCompletion;
use crate::models::scoring::ScoringOutcome;
use crate::models::table::CandidateRow;
use crate::scoring::parser::parse_scoring_response;
use crate::scoring::prompts::{build_scoring_prompt, PromptContext, SCORING_SYSTEM};

/// One model call per candidate: prompt assembly, completion, lenient parse.
///
/// Never returns an error. Transport failures, timeouts and unparseable text all
/// come back as [`ScoringOutcome::Failed`] with the reason attached.
#[derive(Clone)]
pub struct ScoringClient {
    completion: Arc<dyn TextCompletion>,
    timeout: Duration,
}

impl ScoringClient {
    pub fn new(completion: Arc<dyn TextCompletion>, timeout: Duration) -> Self {
        Self {
            completion,
            timeout,
        }
    }

    pub async fn score(&self, candidate: &CandidateRow, ctx: &PromptContext) -> ScoringOutcome {
        let startup_data = match serde_json::to_string_pretty(candidate) {
            Ok(json) => json,
            Err(e) => {
                return ScoringOutcome::Failed {
                    reason: format!("candidate could not be serialized: {e}"),
                }
            }
        };
        let prompt = build_scoring_prompt(&startup_data, ctx);
        debug!("Sending scoring prompt ({} chars)", prompt.len());

        let text = match tokio::time::timeout(
            self.timeout,
            self.completion.complete(&prompt, SCORING_SYSTEM),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Scoring call failed: {e}");
                return ScoringOutcome::Failed {
                    reason: format!("model call failed: {e}"),
                };
            }
            Err(_) => {
                warn!("Scoring call timed out after {:?}", self.timeout);
                return ScoringOutcome::Failed {
                    reason: format!("model call timed out after {:?}", self.timeout),
                };
            }
        };

        match parse_scoring_response(&text) {
            Ok(result) => ScoringOutcome::Scored(result),
            Err(e) => {
                warn!("Discarding model response: {e}");
                ScoringOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
