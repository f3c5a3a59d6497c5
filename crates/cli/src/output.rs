//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, shortened checksums and human-readable durations.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use imagebuilder_lib::assemble::PersistSummary;
use imagebuilder_lib::context::ApplicationInstanceContext;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
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

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// One-line summary of a persisted instance followed by its packages.
pub fn print_instance_summary(
  verb: &str,
  context: &ApplicationInstanceContext,
  persisted: &PersistSummary,
  elapsed: Duration,
) {
  let instance = &context.instance;
  print_success(&format!(
    "{} {} (instance {}, type {} {})",
    verb,
    instance.application_name,
    instance.instance_version,
    instance.application_type_name,
    instance.application_type_version
  ));
  print_stat(
    "Application package",
    &format!(
      "{} {}",
      context.application_package.rollout_version,
      truncate_hash(&context.application_package.content_checksum.0)
    ),
  );
  for package in &context.service_packages {
    print_stat(
      &format!("Service package {}", package.name),
      &format!("{} {}", package.rollout_version, truncate_hash(&package.content_checksum.0)),
    );
  }
  print_stat("Uploaded", &persisted.uploaded.len().to_string());
  if !persisted.written.is_empty() {
    print_stat("Written", &persisted.written.len().to_string());
  }
  print_stat("Duration", &format_duration(elapsed));
}
