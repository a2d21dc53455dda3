// All LLM prompt constants for the scoring module.
// Templates use `{placeholder}` markers filled by `build_scoring_prompt`.

use crate::context::summary::{contrast_examples, portfolio_summary};
use crate::context::PortfolioContext;

/// Pipeline stages of the fund, from best to worst outcome.
/// `(status, level out of 10, meaning)`; status names match the portfolio's `Status` column.
pub const STATUS_HIERARCHY: [(&str, u8, &str); 8] = [
    ("Investment", 10, "Best outcome. The startup received investment; this is the end goal."),
    ("Investment committee", 9, "Final stage. Very promising, reached the investment committee."),
    ("Interview UV", 8, "Advanced stage. Passed the initial filters and had a formal interview."),
    ("Reference Checks", 7, "Validation stage. Interesting; references are being checked."),
    ("Reviewing", 5, "Middle stage. Passed initial screening and is under active review."),
    ("Screening", 4, "Early stage. Still being checked against minimum criteria."),
    ("Backlog", 3, "On hold. Not a priority now, but not discarded."),
    ("Rechazo con feed", 1, "Rejected. Did not meet the criteria, feedback was given."),
];

/// System prompt for candidate scoring. Demands JSON-only output.
pub const SCORING_SYSTEM: &str = "You are a world-class venture capital analyst at UTEC Ventures. \
    You evaluate startup applications against the fund's thesis and its historical portfolio. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Scoring prompt template.
pub const SCORING_PROMPT_TEMPLATE: &str = r#"Perform a deep analysis of one candidate startup, using the strategic and historical context below to inform your evaluation. Return a complete report as JSON.

STRATEGIC CONTEXT AND HISTORICAL DATA

1. Investment thesis (our philosophy):
{thesis}

2. Status hierarchy (how we measure success):
{status_hierarchy}

3. Portfolio patterns:
{portfolio_summary}

4. Contrast examples from our history:
{contrast_examples}

5. Full historical portfolio (qualitative), one JSON object per startup we invested in or analysed, including its final 'Status'. Use it to learn which sectors we favour and what success vs. failure looks like in this fund:
{historical_portfolio}
{quantitative_section}
TASK

Analyse the following candidate using ALL of the context above.

Candidate data:
{startup_data}

OUTPUT SCHEMA (return exactly this structure; scores are integers from 0 to 100; text fields are 1-2 concise sentences):
{
  "dimensional_scores": {
    "equipo": <0-100>, "producto": <0-100>, "tesis_utec": <0-100>,
    "oportunidad": <0-100>, "validacion": <0-100>
  },
  "qualitative_analysis": {
    "project_thesis": "The startup's core thesis.",
    "problem": "The problem it addresses.",
    "solution": "Its solution.",
    "key_metrics": "Key metrics reported.",
    "founding_team": "The founding team.",
    "market_and_competition": "Market size and competition."
  },
  "score_justification": {
    "equipo": "Why the 'equipo' score.",
    "tesis_utec": "Why the 'tesis_utec' score, relative to the thesis and the portfolio.",
    "oportunidad": "Why the 'oportunidad' score (market cap, etc.), compared with past cases.",
    "validacion": "Why the 'validacion' score (achievements, traction), based on what has worked historically."
  }
}"#;

const QUANTITATIVE_SECTION_TEMPLATE: &str = r#"
6. Historical portfolio metrics (quantitative), one JSON object per startup:
{quantitative_portfolio}
"#;

/// Context-derived prompt fragments, computed once per batch.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub thesis: String,
    pub status_hierarchy: String,
    pub portfolio_summary: String,
    pub contrast_examples: String,
    pub historical_portfolio: String,
    pub quantitative_portfolio: Option<String>,
}

impl PromptContext {
    pub fn from_portfolio(context: &PortfolioContext<'_>) -> Self {
        Self {
            thesis: context.thesis.to_string(),
            status_hierarchy: render_status_hierarchy(),
            portfolio_summary: portfolio_summary(context.qualitative),
            contrast_examples: contrast_examples(context.qualitative),
            historical_portfolio: context.qualitative.to_records_json(),
            quantitative_portfolio: context.quantitative.map(|t| t.to_records_json()),
        }
    }
}

pub fn render_status_hierarchy() -> String {
    STATUS_HIERARCHY
        .iter()
        .map(|(status, level, meaning)| format!("- {status} (Level {level}/10): {meaning}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fills the scoring template in one pass over the template text, so
/// placeholder-like text inside the thesis, the portfolio or the candidate is
/// copied verbatim and never expanded.
pub fn build_scoring_prompt(startup_data: &str, ctx: &PromptContext) -> String {
    let quantitative_section = ctx
        .quantitative_portfolio
        .as_deref()
        .map(|q| fill_template(QUANTITATIVE_SECTION_TEMPLATE, &[("quantitative_portfolio", q)]))
        .unwrap_or_default();

    fill_template(
        SCORING_PROMPT_TEMPLATE,
        &[
            ("thesis", &ctx.thesis),
            ("status_hierarchy", &ctx.status_hierarchy),
            ("portfolio_summary", &ctx.portfolio_summary),
            ("contrast_examples", &ctx.contrast_examples),
            ("quantitative_section", &quantitative_section),
            ("historical_portfolio", &ctx.historical_portfolio),
            ("startup_data", startup_data),
        ],
    )
}

/// Replaces `{name}` markers found in `template`. Unknown markers and literal
/// braces are kept as they are.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = values.iter().find(|(name, _)| {
            tail[1..].starts_with(name) && tail[1 + name.len()..].starts_with('}')
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 2..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
