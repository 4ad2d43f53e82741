//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, plan and report rendering, and Unicode symbols.

use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use stackup_lib::execute::{ApplyReport, NodeStatus};
use stackup_lib::plan::{OperationKind, Plan};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const ADD: &str = "+";
  pub const MODIFY: &str = "~";
  pub const REMOVE: &str = "-";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

fn operation_symbol(kind: OperationKind) -> String {
  match kind {
    OperationKind::Create => symbols::ADD
      .if_supports_color(Stream::Stdout, |s| s.green())
      .to_string(),
    OperationKind::Update => symbols::MODIFY
      .if_supports_color(Stream::Stdout, |s| s.yellow())
      .to_string(),
    OperationKind::Delete => symbols::REMOVE
      .if_supports_color(Stream::Stdout, |s| s.red())
      .to_string(),
    OperationKind::NoOp => " ".to_string(),
  }
}

/// One line per operation in execution order; NoOps only when verbose.
pub fn print_plan(plan: &Plan, verbose: bool) {
  for op in &plan.operations {
    if op.kind == OperationKind::NoOp && !verbose {
      continue;
    }
    println!(
      "  {} {} {}",
      operation_symbol(op.kind),
      op.node_id,
      format!("({}, {})", op.resource_kind, op.kind).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
    if verbose {
      for change in &op.changes {
        println!(
          "      {}",
          change.if_supports_color(Stream::Stdout, |s| s.dimmed())
        );
      }
    }
  }

  let summary = plan.summary();
  println!();
  print_stat(
    "Plan",
    &format!(
      "{} to create, {} to update, {} to delete, {} unchanged",
      summary.create, summary.update, summary.delete, summary.noop
    ),
  );
}

fn status_line(status: &NodeStatus) -> String {
  match status {
    NodeStatus::Applied => symbols::SUCCESS
      .if_supports_color(Stream::Stdout, |s| s.green())
      .to_string(),
    NodeStatus::NoOp => symbols::INFO
      .if_supports_color(Stream::Stdout, |s| s.dimmed())
      .to_string(),
    NodeStatus::Failed(_) => symbols::ERROR
      .if_supports_color(Stream::Stdout, |s| s.red())
      .to_string(),
    NodeStatus::Skipped { .. } | NodeStatus::Cancelled => symbols::WARNING
      .if_supports_color(Stream::Stdout, |s| s.yellow())
      .to_string(),
  }
}

fn status_detail(status: &NodeStatus) -> String {
  match status {
    NodeStatus::Applied => "applied".to_string(),
    NodeStatus::NoOp => "unchanged".to_string(),
    NodeStatus::Failed(err) => format!("failed: {}", err),
    NodeStatus::Skipped { failed_dependency } => {
      format!("skipped {} {} failed", symbols::ARROW, failed_dependency)
    }
    NodeStatus::Cancelled => "cancelled".to_string(),
  }
}

/// Terminal status of every node plus totals.
pub fn print_report(report: &ApplyReport) {
  for node in &report.nodes {
    println!(
      "  {} {} {} {}",
      status_line(&node.status),
      node.node_id,
      format!("({}, {})", node.resource_kind, node.operation).if_supports_color(Stream::Stdout, |s| s.dimmed()),
      status_detail(&node.status)
    );
  }

  println!();
  print_stat("Applied", &report.applied().to_string());
  print_stat("Unchanged", &report.noop().to_string());
  if report.failed() > 0 {
    print_stat("Failed", &report.failed().to_string());
  }
  if report.skipped() > 0 {
    print_stat("Skipped", &report.skipped().to_string());
  }
  if report.cancelled() > 0 {
    print_stat("Cancelled", &report.cancelled().to_string());
  }
  print_stat("Duration", &format_duration(report.duration));
}
