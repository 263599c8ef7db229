//! Text summary builder for CLI output.
//!
//! Lays the rendering surfaces out as plain lines for text mode.

use crate::error::RunError;
use crate::model::RunResponse;
use crate::outcome::Outcome;
use crate::views;
use time::UtcOffset;

const BAR_WIDTH: usize = 20;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build the report for a settled run.
///
/// `response` is absent when the request itself failed; only the headline,
/// the error and the final action are shown then.
pub(crate) fn build_text_summary(
    response: Option<&RunResponse>,
    error: Option<&RunError>,
    outcome: Outcome,
    reauthorize: bool,
    offset: UtcOffset,
) -> TextSummary {
    let mut lines = Vec::new();

    if let Some(e) = error {
        lines.push(format!("Error: {e}"));
        lines.push(String::new());
    }

    let head = views::headline(response, outcome);
    lines.push(head.title.to_string());
    lines.push(head.subtext.to_string());
    lines.push(format!("Outcome: {}", outcome.label()));

    if let Some(r) = response {
        let card = views::summary_card(r, outcome);
        lines.push(String::new());
        lines.push(format!(
            "CI status: {}  Iterations: {}  Fixes applied: {}  Total time: {}",
            card.ci_status, card.iterations, card.fixes_applied, card.elapsed
        ));
        if card.all_attempts_failed {
            lines.push("Every CI attempt failed.".to_string());
        }

        let wh = views::what_happened(r, outcome);
        lines.push(String::new());
        lines.push("What the AI agent did:".to_string());
        lines.extend(wh.bullets.iter().map(|b| format!("  - {b}")));
        if let Some(next) = wh.next_step {
            lines.push(format!("Next step: {next}"));
        }

        lines.push(String::new());
        lines.push("Agent execution flow:".to_string());
        lines.extend(
            views::agent_flow(r)
                .iter()
                .enumerate()
                .map(|(i, s)| format!("  {}. {s}", i + 1)),
        );

        let score = views::score_panel(r, outcome);
        lines.push(String::new());
        lines.push(format!(
            "Score: base {}  speed bonus {}  efficiency penalty {}  final {}",
            score.base, score.speed_bonus, score.efficiency_penalty, score.total
        ));
        lines.push(format!("  [{}] {:.0}%", bar(score.percent), score.percent));
        if score.provisional {
            lines.push("  Score shown is provisional.".to_string());
        }

        let fixes = views::fix_rows(r);
        lines.push(String::new());
        if fixes.is_empty() {
            lines.push("Fixes applied: none".to_string());
        } else {
            lines.push(format!(
                "Fixes applied ({} of {} fixed):",
                crate::metrics::fixed_count(r),
                fixes.len()
            ));
            for f in fixes {
                lines.push(format!(
                    "  {} {}:{} [{}] {}",
                    f.status, f.file, f.line, f.bug_type, f.commit_message
                ));
            }
        }

        let timeline = views::timeline_rows(r, offset);
        if !timeline.is_empty() {
            lines.push(String::new());
            lines.push("CI timeline:".to_string());
            lines.extend(timeline.iter().map(|t| format!("  {t}")));
        }
    }

    let action = views::final_action(response, outcome, reauthorize);
    lines.push(String::new());
    lines.push(action.title.to_string());
    lines.push(action.message.to_string());
    lines.extend(action.checklist.iter().map(|c| format!("  {c}")));
    if let Some(link) = action.pr_link {
        lines.push(format!("Pull request: {link}"));
    }
    if action.reauthorize {
        lines.push(
            "The agent could not push to the repository. Run `heal-client auth login` to authorize GitHub access, then resubmit."
                .to_string(),
        );
    }

    if let Some(r) = response {
        lines.push(String::new());
        lines.push("Repository info:".to_string());
        for (label, value) in views::repository_info(r) {
            let value = if value.is_empty() {
                crate::metrics::PLACEHOLDER.to_string()
            } else {
                value
            };
            lines.push(format!("  {label}: {value}"));
        }
    }

    TextSummary { lines }
}

fn bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}
