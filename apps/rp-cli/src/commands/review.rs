// review.rs — Proposal review subcommands: show, apply, reject.
//
// Each invocation is one complete review: the proposal is loaded, diffed
// against the entity store, the reviewer's choices from the command line are
// replayed, and the review is decided. Operation toggles are replayed before
// change toggles, each in the order given, and overrides last.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Subcommand};
use rp_execution::{
    plan, EventDispatcher, ExecutionReport, ExecutionStep, LogSink, ProgressSnapshot,
    ReviewEvent, StepExecutor, StepStatus,
};
use rp_proposal::{Proposal, ProposalReview, ReviewConfig};

use crate::store::JsonEntityStore;

#[derive(Args)]
pub struct ReviewSource {
    /// Proposal JSON file.
    #[arg(long)]
    pub proposal: PathBuf,
    /// Entity store JSON file.
    #[arg(long)]
    pub store: PathBuf,
    /// Proposal kind; selects the entity schema from .rp/review.toml.
    #[arg(long, default_value = "artifacts")]
    pub kind: String,
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// Show a proposal as it would be reviewed.
    Show {
        #[command(flatten)]
        source: ReviewSource,
    },
    /// Accept the proposal (minus skipped items) and execute it.
    Apply {
        #[command(flatten)]
        source: ReviewSource,
        /// Skip an operation by index (cascades to dependent changes).
        #[arg(long = "skip-op", value_name = "N")]
        skip_op: Vec<usize>,
        /// Skip a change by index.
        #[arg(long = "skip-change", value_name = "N")]
        skip_change: Vec<usize>,
        /// Override a proposed field value.
        #[arg(long = "set", value_name = "IDX:FIELD=VALUE")]
        set: Vec<String>,
        /// Event log (defaults to .rp/events.jsonl).
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Reject the whole proposal.
    Reject {
        #[command(flatten)]
        source: ReviewSource,
        /// Reason recorded with the rejection.
        #[arg(long)]
        reason: Option<String>,
        /// Event log (defaults to .rp/events.jsonl).
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

/// Reviewer choices replayed onto a fresh review. Repeating a skip index
/// skips the item once.
#[derive(Debug, Default)]
pub struct ReviewerChoices {
    pub skip_ops: Vec<usize>,
    pub skip_changes: Vec<usize>,
    pub overrides: Vec<(usize, String, String)>,
}

pub fn execute(cmd: &ReviewCommands, project_root: &Path) -> anyhow::Result<()> {
    match cmd {
        ReviewCommands::Show { source } => {
            let (review, _) = open_review(project_root, source)?;
            print!("{}", render_review(&review)?);
            Ok(())
        }
        ReviewCommands::Apply {
            source,
            skip_op,
            skip_change,
            set,
            events,
        } => {
            let choices = ReviewerChoices {
                skip_ops: skip_op.clone(),
                skip_changes: skip_change.clone(),
                overrides: set
                    .iter()
                    .map(|s| parse_override(s))
                    .collect::<anyhow::Result<_>>()?,
            };
            let events = events_path(project_root, events.as_deref());
            let report = apply_review(project_root, source, &choices, &events)?;

            println!();
            for step in &report.steps {
                let status = step.status.to_string();
                match &step.error {
                    Some(error) => println!("  {:<7} {}: {}", status, step.label, error),
                    None => println!("  {:<7} {}", status, step.label),
                }
            }
            if let Some(error) = &report.interim_refresh_error {
                println!("  (group reload before changes failed: {})", error);
            }
            println!();
            println!("{}", report.summary());

            if report.failed() > 0 {
                anyhow::bail!("{} step(s) failed", report.failed());
            }
            Ok(())
        }
        ReviewCommands::Reject {
            source,
            reason,
            events,
        } => {
            let events = events_path(project_root, events.as_deref());
            reject_review(project_root, source, reason.as_deref(), &events)?;
            println!("Proposal rejected.");
            Ok(())
        }
    }
}

fn events_path(project_root: &Path, events: Option<&Path>) -> PathBuf {
    events
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_root.join(".rp").join("events.jsonl"))
}

fn open_review(
    project_root: &Path,
    source: &ReviewSource,
) -> anyhow::Result<(ProposalReview, Arc<JsonEntityStore>)> {
    let config_path = project_root.join(".rp").join("review.toml");
    let config = ReviewConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let schema = config.schema(&source.kind)?.clone();

    let proposal = Proposal::load(&source.proposal)
        .with_context(|| format!("Failed to load proposal {}", source.proposal.display()))?;
    let store = JsonEntityStore::open(&source.store, schema.group_field.clone())
        .with_context(|| format!("Failed to open store {}", source.store.display()))?;

    let review = ProposalReview::new(proposal, schema, store.snapshot());
    Ok((review, Arc::new(store)))
}

/// Parse `IDX:FIELD=VALUE`. The value may be empty and may contain `=`.
pub fn parse_override(spec: &str) -> anyhow::Result<(usize, String, String)> {
    let (idx, rest) = spec
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected IDX:FIELD=VALUE, got '{}'", spec))?;
    let (field, value) = rest
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected IDX:FIELD=VALUE, got '{}'", spec))?;
    let idx = idx
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid change index in '{}'", spec))?;
    let field = field.trim();
    if field.is_empty() {
        anyhow::bail!("missing field name in '{}'", spec);
    }
    Ok((idx, field.to_string(), value.to_string()))
}

fn replay(review: &mut ProposalReview, choices: &ReviewerChoices) -> anyhow::Result<()> {
    for op in first_occurrences(&choices.skip_ops) {
        review.toggle_operation(op)?;
    }
    for change in first_occurrences(&choices.skip_changes) {
        if !review.toggle_change(change)? {
            println!("Change #{} is blocked by an unselected operation; left as is.", change);
        }
    }
    for (idx, field, value) in &choices.overrides {
        review.set_override(*idx, field, value)?;
    }
    Ok(())
}

/// Indices in the order given, each kept once.
fn first_occurrences(indices: &[usize]) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    indices.iter().copied().filter(|idx| seen.insert(*idx)).collect()
}

pub fn render_review(review: &ProposalReview) -> anyhow::Result<String> {
    let proposal = review.proposal();
    let mut out = String::new();

    out.push_str(&format!(
        "Proposal: {}\n",
        proposal.reasoning.as_deref().unwrap_or("(no reasoning given)")
    ));

    if !proposal.operations.is_empty() {
        out.push_str(&format!(
            "\n{} operations ({}):\n",
            capitalize(&review.schema().group_noun),
            proposal.operations.len()
        ));
        for idx in 0..proposal.operations.len() {
            out.push_str(&format!(
                "  {} #{} {}\n",
                checkbox(review.is_operation_selected(idx)),
                idx,
                review.operation_label(idx)?
            ));
        }
    }

    if !proposal.changes.is_empty() {
        out.push_str(&format!("\nChanges ({}):\n", proposal.changes.len()));
        for card in review.change_cards() {
            out.push_str(&format!(
                "  {} #{} {}\n",
                checkbox(card.checked),
                card.index,
                card.label
            ));
            out.push_str(&format!("        {}\n", card.summary));
            if card.blocked {
                out.push_str(&format!(
                    "        blocked by: {}\n",
                    card.blocked_by.join(", ")
                ));
            }
        }
    }

    out.push_str(&format!(
        "\nAccepting would run {} step(s).\n",
        review.planned_step_count()
    ));
    Ok(out)
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        "[x]"
    } else {
        "[ ]"
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn print_progress(steps: &[ExecutionStep]) {
    let snapshot = ProgressSnapshot::of(steps);
    match steps.iter().find(|s| s.status == StepStatus::Running) {
        Some(step) => println!("  [{}] {}", snapshot, step.label),
        None => println!("  [{}]", snapshot),
    }
}

/// Replay the choices, accept, and execute against the store.
pub fn apply_review(
    project_root: &Path,
    source: &ReviewSource,
    choices: &ReviewerChoices,
    events: &Path,
) -> anyhow::Result<ExecutionReport> {
    let (mut review, store) = open_review(project_root, source)?;
    replay(&mut review, choices)?;

    let accepted = review.accept()?;
    let dispatcher = EventDispatcher::new().with_sink(LogSink::new(events));
    dispatcher.dispatch(&ReviewEvent::proposal_accepted(&accepted));

    let plan = plan(&accepted)?;
    println!("Applying {} step(s):", plan.len());

    let executor = StepExecutor::new(store)
        .with_progress(print_progress)
        .with_events(dispatcher);

    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(executor.run(plan)))
}

pub fn reject_review(
    project_root: &Path,
    source: &ReviewSource,
    reason: Option<&str>,
    events: &Path,
) -> anyhow::Result<()> {
    let (mut review, _) = open_review(project_root, source)?;
    review.reject()?;
    EventDispatcher::new()
        .with_sink(LogSink::new(events))
        .dispatch(&ReviewEvent::proposal_rejected(review.review_id(), reason));
    Ok(())
}
