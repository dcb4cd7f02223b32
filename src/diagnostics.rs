// ABOUTME: Diagnostics accumulator for components skipped during registration.
// ABOUTME: A registry or watcher that fails to build is left out; the reason is kept here for the user.

use std::fmt;

/// Collects skipped components while a configuration is registered.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a skipped component and log it.
    pub fn skip(&mut self, kind: WarningKind, component: impl Into<String>, reason: impl fmt::Display) {
        let warning = Warning {
            kind,
            component: component.into(),
            message: reason.to_string(),
        };
        tracing::warn!(component = %warning.component, "{kind} skipped: {}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Ids of the skipped components of one kind.
    pub fn skipped(&self, kind: WarningKind) -> Vec<&str> {
        self.warnings
            .iter()
            .filter(|w| w.kind == kind)
            .map(|w| w.component.as_str())
            .collect()
    }
}

/// A component that could not be registered.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    /// Component id, e.g. `hub.private`.
    pub component: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} skipped: {}", self.kind, self.component, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Invalid provider configuration or unknown provider type.
    Registry,
    /// Invalid cron expression, endpoint or TLS material.
    Watcher,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WarningKind::Registry => "registry",
            WarningKind::Watcher => "watcher",
        })
    }
}
