// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (updates only), and JSON-lines output modes.

use crate::model::{Container, ContainerReport, UpdateKindType, view};
use serde::Serialize;
use std::io::Write;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Only containers with an available update
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a non-fatal warning on stderr.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => print_json(&mut std::io::stderr(), &JsonEvent::message("warning", message)),
        }
    }

    /// Print the reports of one watcher scan.
    pub fn reports(&self, watcher: &str, reports: &[ContainerReport]) {
        let mut stdout = std::io::stdout().lock();
        self.write_reports(&mut stdout, watcher, reports);
    }

    fn write_reports(&self, out: &mut impl Write, watcher: &str, reports: &[ContainerReport]) {
        match self.mode {
            OutputMode::Normal => {
                let _ = writeln!(out, "{watcher}: {} containers", reports.len());
                for report in reports {
                    let _ = writeln!(out, "  {}", describe(&report.container));
                }
            }
            OutputMode::Quiet => {
                for report in reports.iter().filter(|r| r.container.update_available()) {
                    let _ = writeln!(out, "{}", describe(&report.container));
                }
            }
            OutputMode::Json => {
                for report in reports {
                    print_json(
                        out,
                        &JsonEvent {
                            event: "report",
                            message: None,
                            watcher: Some(watcher),
                            changed: Some(report.changed),
                            container: Some(view(&report.container)),
                            duration_secs: None,
                        },
                    );
                }
            }
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => {
                let mut event = JsonEvent::message("success", message);
                if self.start_time.is_some() {
                    event.duration_secs = Some(self.elapsed_secs());
                }
                print_json(&mut std::io::stdout(), &event);
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => print_json(&mut std::io::stderr(), &JsonEvent::message("error", message)),
        }
    }
}

/// One-line summary: name, running version and what is available.
fn describe(container: &Container) -> String {
    let name = &container.display_name;
    let tag = &container.image.tag.value;
    if let Some(ref error) = container.error {
        return format!("{name} {tag}: error: {}", error.message);
    }
    if !container.update_available() {
        return format!("{name} {tag}: up to date");
    }
    let kind = container.update_kind();
    let local = kind.local_value.as_deref().unwrap_or("?");
    let remote = kind.remote_value.as_deref().unwrap_or("?");
    match (kind.kind, kind.semver_diff) {
        (UpdateKindType::Tag, Some(diff)) => format!("{name} {local} -> {remote} ({diff})"),
        (UpdateKindType::Digest, _) => format!("{name} {tag}: new digest {remote}"),
        _ => format!("{name} {local} -> {remote}"),
    }
}

fn print_json(out: &mut impl Write, event: &JsonEvent<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        let _ = writeln!(out, "{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    watcher: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    changed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

impl<'a> JsonEvent<'a> {
    fn message(event: &'a str, message: &'a str) -> Self {
        Self {
            event,
            message: Some(message),
            watcher: None,
            changed: None,
            container: None,
            duration_secs: None,
        }
    }
}
