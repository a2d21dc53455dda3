//! Portfolio-derived hints computed once per batch and embedded in every prompt.

use crate::models::table::{CandidateRow, Table};

const SECTOR_COLUMN: &str = "Sector";
const STATUS_COLUMN: &str = "Status";
const BEST_STATUSES: [&str; 2] = ["Investment", "Investment committee"];
const REJECTED_MARKER: &str = "Rechazo";

/// "Key industries: a, b, c." over the three most frequent sectors.
/// Ties keep first-seen order.
pub fn portfolio_summary(table: &Table) -> String {
    if !table.has_column(SECTOR_COLUMN) {
        return "No industry pattern could be determined from the portfolio.".to_string();
    }

    let mut counts: Vec<(String, usize)> = Vec::new();
    for sector in table.rows.iter().filter_map(|r| r.text(SECTOR_COLUMN)) {
        match counts.iter_mut().find(|(s, _)| *s == sector) {
            Some((_, n)) => *n += 1,
            None => counts.push((sector, 1)),
        }
    }
    if counts.is_empty() {
        return "No industry pattern could be determined from the portfolio.".to_string();
    }

    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let top: Vec<&str> = counts.iter().take(3).map(|(s, _)| s.as_str()).collect();
    format!("Key industries: {}.", top.join(", "))
}

/// One clear success and one clear rejection from the portfolio, rendered as JSON.
pub fn contrast_examples(table: &Table) -> String {
    if !table.has_column(STATUS_COLUMN) {
        return "No contrast examples available: the portfolio has no 'Status' column.".to_string();
    }

    let best = BEST_STATUSES.iter().find_map(|wanted| {
        table
            .rows
            .iter()
            .find(|r| status_of(r).as_deref() == Some(*wanted))
    });
    let worst = table
        .rows
        .iter()
        .find(|r| status_of(r).is_some_and(|s| s.contains(REJECTED_MARKER)));

    match (best, worst) {
        (Some(best), Some(worst)) => format!(
            "SUCCESS EXAMPLE (reached {}):\n{}\n\nREJECTION EXAMPLE ({}):\n{}",
            status_of(best).unwrap_or_default(),
            to_json(best),
            status_of(worst).unwrap_or_default(),
            to_json(worst),
        ),
        _ => "No clear success/rejection examples were found in the portfolio.".to_string(),
    }
}

fn status_of(row: &CandidateRow) -> Option<String> {
    row.text(STATUS_COLUMN)
}

fn to_json(row: &CandidateRow) -> String {
    serde_json::to_string_pretty(row).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::csv_table::parse_csv;

    fn table(csv: &str) -> Table {
        parse_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_top_three_sectors_by_frequency() {
        let t = table(
            "Nombre,Sector\nA,Edtech\nB,Fintech\nC,Fintech\nD,Agtech\nE,Healthtech\nF,Agtech\nG,Fintech\n",
        );
        assert_eq!(portfolio_summary(&t), "Key industries: Fintech, Agtech, Edtech.");
    }

    #[test]
    fn test_summary_without_sector_column() {
        let t = table("Nombre\nA\n");
        assert!(portfolio_summary(&t).starts_with("No industry pattern"));
    }

    #[test]
    fn test_contrast_prefers_investment_over_committee() {
        let t = table(
            "Nombre,Status\nA,Investment committee\nB,Investment\nC,Rechazo con feed\nD,Rechazo\n",
        );
        let text = contrast_examples(&t);
        assert!(text.contains("reached Investment)"));
        assert!(text.contains("\"B\""));
        assert!(text.contains("\"C\""));
        assert!(!text.contains("\"D\""));
    }

    #[test]
    fn test_contrast_falls_back_to_committee() {
        let t = table("Nombre,Status\nA,Investment committee\nC,Rechazo con feed\n");
        assert!(contrast_examples(&t).contains("reached Investment committee"));
    }

    #[test]
    fn test_contrast_needs_both_examples() {
        let t = table("Nombre,Status\nA,Investment\nB,Screening\n");
        assert!(contrast_examples(&t).starts_with("No clear"));
    }

    #[test]
    fn test_contrast_without_status_column() {
        let t = table("Nombre,Sector\nA,Fintech\n");
        assert!(contrast_examples(&t).contains("no 'Status' column"));
    }
}
