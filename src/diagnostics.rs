use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryLevel {
    Warning,
    /// Recoverable problem: the data is ambiguous and was skipped, the unit continues.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub level: AdvisoryLevel,
    pub message: String,
}

impl Advisory {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: AdvisoryLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: AdvisoryLevel::Error,
            message: message.into(),
        }
    }
}

/// Receives non-fatal advisories raised while resolving metadata.
pub trait DiagnosticSink {
    fn advise(&self, advisory: Advisory);
}

/// Collects advisories so the caller decides how to surface them.
#[derive(Debug, Default)]
pub struct Diagnostics {
    advisories: Mutex<Vec<Advisory>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_advisories(self) -> Vec<Advisory> {
        match self.advisories.into_inner() {
            Ok(advisories) => advisories,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl DiagnosticSink for Diagnostics {
    fn advise(&self, advisory: Advisory) {
        match self.advisories.lock() {
            Ok(mut guard) => guard.push(advisory),
            Err(poisoned) => poisoned.into_inner().push(advisory),
        }
    }
}

/// Forwards advisories to the `tracing` subscriber.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn advise(&self, advisory: Advisory) {
        match advisory.level {
            AdvisoryLevel::Warning => tracing::warn!("{}", advisory.message),
            AdvisoryLevel::Error => tracing::error!("{}", advisory.message),
        }
    }
}

pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn advise(&self, _advisory: Advisory) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_keeps_arrival_order() {
        let diagnostics = Diagnostics::new();
        diagnostics.advise(Advisory::warning("first"));
        diagnostics.advise(Advisory::error("second"));
        let advisories = diagnostics.into_advisories();
        assert_eq!(advisories.len(), 2);
        assert_eq!(advisories[0].message, "first");
        assert_eq!(advisories[1].level, AdvisoryLevel::Error);
    }
}
