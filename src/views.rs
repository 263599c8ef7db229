//! Rendering surfaces for a settled run.
//!
//! Every surface takes the classified [`Outcome`] and branches on it alone; raw
//! response fields are only read as metrics (counts, names, times). This keeps
//! the headline, the summary and the call to action in agreement.

use crate::metrics::{self, IterationUsage, PLACEHOLDER};
use crate::model::{CiTimelineEntry, RunResponse};
use crate::outcome::Outcome;
use time::UtcOffset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: &'static str,
    pub subtext: &'static str,
}

pub fn headline(response: Option<&RunResponse>, outcome: Outcome) -> Headline {
    match outcome {
        Outcome::Error => Headline {
            title: "Run Encountered an Error",
            subtext: "The agent could not complete the run. Check the error message above for details.",
        },
        Outcome::Success => {
            let clean =
                response.is_some_and(|r| r.total_fixes_applied == 0 && r.total_failures == 0);
            Headline {
                title: "CI Fixed Successfully",
                subtext: if clean {
                    "CI passed. No failures were detected."
                } else {
                    "The AI agent analyzed your repository, detected test failures, automatically applied fixes, and re-ran CI until it passed."
                },
            }
        }
        Outcome::PartialFix => Headline {
            title: "CI Did Not Pass",
            subtext: "Initial CI failed. AI applied fixes and pushed them to a branch, but CI still fails.",
        },
        Outcome::Unfixed => Headline {
            title: "CI Did Not Pass",
            subtext: "Initial CI failed. AI attempted automatic fixes.",
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryCard {
    pub ci_status: &'static str,
    pub iterations: IterationUsage,
    pub all_attempts_failed: bool,
    pub fixes_applied: i64,
    pub elapsed: String,
}

pub fn summary_card(r: &RunResponse, outcome: Outcome) -> SummaryCard {
    SummaryCard {
        ci_status: if outcome == Outcome::Success {
            "PASSED"
        } else {
            "FAILED"
        },
        iterations: IterationUsage::of(r),
        all_attempts_failed: metrics::all_attempts_failed(&r.ci_timeline),
        fixes_applied: r.total_fixes_applied,
        elapsed: metrics::format_elapsed(r.total_time_seconds),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatHappened {
    pub bullets: Vec<String>,
    pub next_step: Option<&'static str>,
}

pub fn what_happened(r: &RunResponse, outcome: Outcome) -> WhatHappened {
    match outcome {
        Outcome::Success => WhatHappened {
            bullets: vec![if r.total_fixes_applied > 0 {
                "The agent fixed all issues and tests passed. You can safely merge the pull request."
                    .to_string()
            } else {
                "All tests passed on the first run. No fixes were needed.".to_string()
            }],
            next_step: None,
        },
        Outcome::PartialFix | Outcome::Unfixed => {
            let fixes = r.total_fixes_applied;
            let mut bullets = vec![
                format!(
                    "Your repository had {}",
                    metrics::pluralize(r.total_failures, "failing test", "failing tests")
                ),
                format!(
                    "The agent attempted automated fixes {} times",
                    r.ci_timeline.len()
                ),
                if fixes == 0 {
                    "No fixes were successfully applied and pushed".to_string()
                } else {
                    format!(
                        "{} {} successfully applied and pushed",
                        metrics::pluralize(fixes, "fix", "fixes"),
                        if fixes == 1 { "was" } else { "were" }
                    )
                },
                "Tests still failed after maximum retries".to_string(),
            ];
            if outcome == Outcome::PartialFix {
                bullets.push("A fix branch was created for manual review".to_string());
            }
            WhatHappened {
                bullets,
                next_step: Some(if outcome == Outcome::PartialFix {
                    "Open the pull request and review remaining issues manually."
                } else {
                    "Review the failing tests manually, then resubmit."
                }),
            }
        }
        Outcome::Error => WhatHappened {
            bullets: vec![
                "The agent stopped before finishing; fix counts and branch details may be incomplete."
                    .to_string(),
            ],
            next_step: Some("Resolve the error and submit the run again."),
        },
    }
}

/// Ordered steps the agent performed, reconstructed from the timeline and fixes.
pub fn agent_flow(r: &RunResponse) -> Vec<String> {
    let mut steps = vec!["Cloned repository".to_string()];
    let timeline = &r.ci_timeline;

    if let Some(first) = timeline.first() {
        steps.push(format!("Ran CI tests ({})", attempt_word(first)));
    }
    if r.total_failures > 0 {
        if let Some(fix) = r.fixes.first() {
            let bug = if fix.bug_type.is_empty() {
                "error".to_string()
            } else {
                fix.bug_type.to_lowercase()
            };
            let file = if fix.file.is_empty() { "file" } else { fix.file.as_str() };
            steps.push(format!("Detected {bug} in {file}"));
        }
    }
    if r.total_fixes_applied > 0 {
        steps.push("Applied fix automatically".to_string());
    }
    if timeline.len() > 1 {
        if let Some(last) = timeline.last() {
            steps.push(format!("Re-ran tests ({})", attempt_word(last)));
        }
    }
    steps
}

fn attempt_word(entry: &CiTimelineEntry) -> &'static str {
    if entry.is_passed() {
        "PASSED"
    } else {
        "FAILED"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScorePanel {
    pub base: String,
    pub speed_bonus: String,
    pub efficiency_penalty: String,
    pub total: String,
    pub percent: f64,
    /// Full points require passing CI.
    pub provisional: bool,
}

pub fn score_panel(r: &RunResponse, outcome: Outcome) -> ScorePanel {
    let s = &r.score;
    ScorePanel {
        base: metrics::format_score_value(s.base),
        speed_bonus: format!("+{}", metrics::format_score_value(s.speed_bonus)),
        efficiency_penalty: format!("-{}", metrics::format_score_value(s.efficiency_penalty)),
        total: metrics::format_score_value(s.total),
        percent: metrics::score_percent(s.total),
        provisional: outcome != Outcome::Success,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixRow {
    pub file: String,
    pub bug_type: String,
    pub line: String,
    pub commit_message: String,
    pub status: &'static str,
}

pub fn fix_rows(r: &RunResponse) -> Vec<FixRow> {
    r.fixes
        .iter()
        .map(|f| FixRow {
            file: f.file.clone(),
            bug_type: if f.bug_type.is_empty() {
                PLACEHOLDER.to_string()
            } else {
                f.bug_type.clone()
            },
            line: f
                .line_number
                .map_or_else(|| PLACEHOLDER.to_string(), |n| n.to_string()),
            commit_message: f.commit_message.clone(),
            status: if f.is_fixed() { "✓ Fixed" } else { "✗ Failed" },
        })
        .collect()
}

/// One label per attempt; a pass after the first attempt is marked as following an auto-fix.
pub fn timeline_rows(r: &RunResponse, offset: UtcOffset) -> Vec<String> {
    r.ci_timeline
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut label = metrics::attempt_label(e, offset);
            if e.is_passed() && i > 0 {
                label.push_str(" (After auto-fix)");
            }
            label
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalAction {
    pub title: &'static str,
    pub message: &'static str,
    pub checklist: Vec<String>,
    pub pr_link: Option<String>,
    pub reauthorize: bool,
}

/// Call to action. `reauthorize` comes from the auth-required detector and is
/// only honored for Error.
pub fn final_action(r: Option<&RunResponse>, outcome: Outcome, reauthorize: bool) -> FinalAction {
    let link = || r.and_then(pull_request_link);
    match outcome {
        Outcome::Success => FinalAction {
            title: "All tests passed successfully",
            message: "You can merge the pull request safely.",
            checklist: Vec::new(),
            pr_link: link(),
            reauthorize: false,
        },
        Outcome::PartialFix => FinalAction {
            title: "Action Required",
            message: "Automated fixes could not fully resolve all issues. Open the pull request and fix the remaining issues manually.",
            checklist: vec![
                "✓ Fix branch created".to_string(),
                "✗ Tests still failing".to_string(),
            ],
            pr_link: link(),
            reauthorize: false,
        },
        Outcome::Unfixed => {
            let branch = r.is_some_and(|r| !r.branch_name.trim().is_empty());
            FinalAction {
                title: "Action Required",
                message: "Automated fixes could not resolve the failures. Fix the failing tests manually.",
                checklist: vec![
                    if branch {
                        "✓ Fix branch created".to_string()
                    } else {
                        "✗ Fix branch not created".to_string()
                    },
                    "✗ Tests still failing".to_string(),
                ],
                pr_link: None,
                reauthorize: false,
            }
        }
        Outcome::Error => FinalAction {
            title: "Run Failed",
            message: "Resolve the error and submit the run again.",
            checklist: Vec::new(),
            pr_link: None,
            reauthorize,
        },
    }
}

/// `{repo}/compare/main...{branch}` when there is a branch with at least one fix.
fn pull_request_link(r: &RunResponse) -> Option<String> {
    let repo = r.repo_url.trim().trim_end_matches('/');
    let branch = r.branch_name.trim();
    (!repo.is_empty() && !branch.is_empty() && r.total_fixes_applied > 0)
        .then(|| format!("{repo}/compare/main...{branch}"))
}

pub fn repository_info(r: &RunResponse) -> Vec<(&'static str, String)> {
    vec![
        ("Repo", r.repo_url.clone()),
        ("Branch", r.branch_name.clone()),
        ("Team", r.team_name.clone()),
        ("Team Leader", r.team_leader_name.clone()),
    ]
}
