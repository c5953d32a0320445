//! Process outcome and task option types for the proctask supervisor
//!
//! This module contains the core data structures describing a supervised
//! process run: the opaque attribution token handed out by the supervisor,
//! the terminal exit record, and the expectation policy that a bounded
//! process task applies to that record.
//!
//! ## Expectation policy
//!
//! A bounded process task succeeds or fails based on a single configured
//! expectation:
//! - `Expect::Code(n)`: the process must exit with code `n`
//! - `Expect::Signal(name)`: the process must be terminated by that signal
//!
//! The default expectation is exit code 0.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Opaque identity of one process attribution.
///
/// Every successful spawn is tagged with a fresh, strictly increasing
/// generation number. Two tokens compare equal only when they refer to the
/// same attribution; a token never identifies a process by PID.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct ProcessToken(pub u64);

impl std::fmt::Display for ProcessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal record of one process run
///
/// At most one of `code` and `signal` is meaningful: a process either exits
/// with a code or is terminated by a signal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessExit {
    /// Process ID, when the backend exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Exit code, if the process exited normally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,

    /// Name of the terminating signal (e.g. "SIGTERM"), if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,

    /// Exit timestamp in RFC3339 format
    pub timestamp: String,
}

/// Expected terminal outcome of a bounded process task
///
/// Serialized untagged so that configuration may carry either a plain exit
/// code (`"expect": 0`) or a signal name (`"expect": "SIGINT"`). Any other
/// JSON shape fails to deserialize.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum Expect {
    /// The process must exit with exactly this code
    Code(i32),
    /// The process must be terminated by exactly this signal
    Signal(String),
}

impl Default for Expect {
    fn default() -> Self {
        Expect::Code(0)
    }
}

impl Expect {
    /// Check whether an exit record satisfies this expectation
    ///
    /// An expected code only matches a real exit code; a process terminated
    /// by a signal never matches `Expect::Code`, and vice versa.
    #[must_use]
    pub fn matches(&self, exit: &ProcessExit) -> bool {
        match self {
            Expect::Code(code) => exit.code == Some(*code),
            Expect::Signal(name) => exit.signal.as_deref() == Some(name.as_str()),
        }
    }
}

/// Options for a bounded process task
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskOptions {
    /// Exit code or signal name that denotes success
    #[serde(default)]
    pub expect: Expect,

    /// Kill the process when the enclosing context disposes early.
    /// When false (default), disposal leaves the process running and the
    /// task still waits for its natural termination.
    #[serde(default)]
    pub kill_on_dispose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit(code: Option<i32>, signal: Option<&str>) -> ProcessExit {
        ProcessExit {
            pid: Some(4242),
            code,
            signal: signal.map(str::to_string),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn expect_defaults_to_code_zero() {
        assert_eq!(Expect::default(), Expect::Code(0));
        assert!(Expect::default().matches(&exit(Some(0), None)));
        assert!(!Expect::default().matches(&exit(Some(1), None)));
        assert!(!Expect::default().matches(&exit(None, Some("SIGINT"))));
    }

    #[test]
    fn expect_signal_ignores_codes() {
        let expect = Expect::Signal("SIGINT".to_string());
        assert!(expect.matches(&exit(None, Some("SIGINT"))));
        assert!(!expect.matches(&exit(None, Some("SIGTERM"))));
        assert!(!expect.matches(&exit(Some(2), None)));
    }

    #[test]
    fn expect_deserializes_from_number_or_string() {
        let from_number: Expect = serde_json::from_str("7").unwrap();
        assert_eq!(from_number, Expect::Code(7));

        let from_string: Expect = serde_json::from_str("\"SIGINT\"").unwrap();
        assert_eq!(from_string, Expect::Signal("SIGINT".to_string()));
    }

    #[test]
    fn expect_rejects_other_json_shapes() {
        assert!(serde_json::from_str::<Expect>("[]").is_err());
        assert!(serde_json::from_str::<Expect>("{}").is_err());
        assert!(serde_json::from_str::<Expect>("true").is_err());
    }

    #[test]
    fn task_options_defaults() {
        let options: TaskOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.expect, Expect::Code(0));
        assert!(!options.kill_on_dispose);

        let options: TaskOptions =
            serde_json::from_str(r#"{"expect": "SIGHUP", "killOnDispose": true}"#).unwrap();
        assert_eq!(options.expect, Expect::Signal("SIGHUP".to_string()));
        assert!(options.kill_on_dispose);
    }

    #[test]
    fn process_exit_serializes_camel_case() {
        let value = serde_json::to_value(exit(Some(0), None)).unwrap();
        assert_eq!(value["code"], 0);
        assert_eq!(value["pid"], 4242);
        assert!(value.get("signal").is_none());
    }
}
