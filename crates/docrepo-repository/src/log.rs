//! Diagnostic logging of repository operations.
//!
//! A repository reports each operation to its [`DebugLog`] before
//! dispatching it. The default [`NoopLog`] discards everything; [`TracingLog`]
//! forwards to `tracing` at debug level.

use std::fmt;

use tracing::debug;

/// One operation about to be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLog<'a> {
    pub operation: &'static str,
    pub collection_path: &'a str,
    /// Argument names with their `Debug` rendering.
    pub arguments: Vec<(&'static str, String)>,
}

impl fmt::Display for OperationLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> collection_path: {}",
            self.operation, self.collection_path
        )?;
        for (name, value) in &self.arguments {
            write!(f, " | {}: {}", name, value)?;
        }
        Ok(())
    }
}

/// Sink for operation diagnostics. Never affects control flow.
pub trait DebugLog: Send + Sync {
    /// Whether entries should be built at all. Lets the repository skip
    /// formatting arguments for disabled logs.
    fn enabled(&self) -> bool {
        true
    }

    fn operation(&self, entry: &OperationLog<'_>);
}

/// Discards all entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLog;

impl DebugLog for NoopLog {
    fn enabled(&self) -> bool {
        false
    }

    fn operation(&self, _entry: &OperationLog<'_>) {}
}

/// Emits entries as `tracing` debug events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl DebugLog for TracingLog {
    fn operation(&self, entry: &OperationLog<'_>) {
        debug!(
            target: "docrepo::repository",
            operation = entry.operation,
            collection_path = entry.collection_path,
            "{}",
            entry
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let entry = OperationLog {
            operation: "create",
            collection_path: "users",
            arguments: vec![
                ("entity", "User { name: \"A\" }".to_string()),
                ("id", "None".to_string()),
            ],
        };

        assert_eq!(
            entry.to_string(),
            "create -> collection_path: users | entity: User { name: \"A\" } | id: None"
        );
    }

    #[test]
    fn test_noop_is_disabled() {
        assert!(!NoopLog.enabled());
        assert!(TracingLog.enabled());
    }
}
