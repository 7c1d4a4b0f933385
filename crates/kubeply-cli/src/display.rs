//! Display formatting for CLI output
//!
//! Progress lines and the spinner go to stderr so that rendered documents on
//! stdout stay machine readable.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use kubeply_kube::{ApplyOutcome, ApplyProgress, ApplySummary, KubeError, WorkloadFailure};
use std::time::Duration;

/// Spinner shown while one manifest is being applied
fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Spinner per manifest, replaced by its outcome line when done
#[derive(Default)]
pub struct SpinnerProgress {
    current: Option<ProgressBar>,
}

impl SpinnerProgress {
    fn clear(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}

impl ApplyProgress for SpinnerProgress {
    fn started(&mut self, name: &str) {
        self.clear();
        self.current = Some(spinner(format!("Applying {name}")));
    }

    fn finished(&mut self, name: &str, outcome: &ApplyOutcome) {
        self.clear();
        eprintln!("{}", outcome_line(name, outcome));
    }

    fn failed(&mut self, _name: &str, _error: &KubeError) {
        self.clear();
    }
}

/// Header printed before a run
pub fn print_header(action: &str, count: usize) {
    eprintln!(
        "{} {} {} manifest(s)",
        style("→").blue().bold(),
        action,
        style(count).yellow()
    );
}

/// One line per applied manifest
pub fn outcome_line(name: &str, outcome: &ApplyOutcome) -> String {
    match outcome {
        ApplyOutcome::Applied => {
            format!("{} {} applied", style("✓").green().bold(), style(name).cyan())
        }
        ApplyOutcome::Replaced => {
            format!("{} {} replaced", style("✓").green().bold(), style(name).cyan())
        }
        ApplyOutcome::Completed => format!(
            "{} {} ran to completion",
            style("✓").green().bold(),
            style(name).cyan()
        ),
        ApplyOutcome::SkippedMissingCrd { kind } => format!(
            "{} {} skipped ({} is not installed)",
            style("⚠").yellow(),
            style(name).cyan(),
            style(kind).yellow()
        ),
    }
}

/// Closing summary line
pub fn print_summary(summary: &ApplySummary) {
    eprintln!();
    eprintln!("{} {}", style("Done:").bold(), summary.summary());
}

/// Container output or job diagnostics for a failed workload
pub fn print_workload_failure(failure: &WorkloadFailure) {
    eprintln!();
    match failure {
        WorkloadFailure::ContainerFailed {
            pod,
            container,
            stdout,
            stderr,
        } => {
            eprintln!(
                "{} container {} of pod {} failed",
                style("✗").red().bold(),
                style(container).cyan(),
                style(pod).cyan()
            );
            print_block("stdout", stdout);
            print_block("stderr", stderr);
        }
        WorkloadFailure::JobFailed {
            job,
            message,
            diagnostics,
        } => {
            eprintln!("{} job {}: {}", style("✗").red().bold(), style(job).cyan(), message);
            if let Some(diagnostics) = diagnostics {
                print_block("diagnostics", diagnostics);
            }
        }
        WorkloadFailure::DeadlineExceeded { job, message } => {
            eprintln!(
                "{} job {} exceeded its deadline: {}",
                style("✗").red().bold(),
                style(job).cyan(),
                message
            );
        }
    }
}

fn print_block(label: &str, text: &str) {
    let text = text.trim_end();
    if text.is_empty() {
        eprintln!("  {} {}", style(format!("{label}:")).dim(), style("(empty)").dim());
        return;
    }
    eprintln!("  {}", style(format!("{label}:")).bold());
    for line in text.lines() {
        eprintln!("    {line}");
    }
}
