//! Core types shared by the result pipeline.
//!
//! Result records keep any harness fields we don't model in `extra`, so a
//! record survives store → bundle → archive → store without losing data.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ═══════════════════════════════════════════════════════════════════════════════
// Status Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// On-the-wire status: the harness sends numeric codes, bundles carry labels.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Code(u64),
    Label(String),
}

/// Harness-level outcome of a test file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StatusRepr")]
pub enum HarnessStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "NOTRUN")]
    NotRun,
}

impl HarnessStatus {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(HarnessStatus::Ok),
            1 => Some(HarnessStatus::Error),
            2 => Some(HarnessStatus::Timeout),
            3 => Some(HarnessStatus::NotRun),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "OK" => Some(HarnessStatus::Ok),
            "ERROR" => Some(HarnessStatus::Error),
            "TIMEOUT" => Some(HarnessStatus::Timeout),
            "NOTRUN" => Some(HarnessStatus::NotRun),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HarnessStatus::Ok => "OK",
            HarnessStatus::Error => "ERROR",
            HarnessStatus::Timeout => "TIMEOUT",
            HarnessStatus::NotRun => "NOTRUN",
        }
    }
}

impl TryFrom<StatusRepr> for HarnessStatus {
    type Error = String;

    fn try_from(repr: StatusRepr) -> Result<Self, String> {
        match repr {
            StatusRepr::Code(code) => HarnessStatus::from_code(code)
                .ok_or_else(|| format!("unknown harness status code {}", code)),
            StatusRepr::Label(label) => HarnessStatus::from_label(&label)
                .ok_or_else(|| format!("unknown harness status label {:?}", label)),
        }
    }
}

impl fmt::Display for HarnessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single sub-test. Codes 0 and 1 mean PASS/FAIL here,
/// not OK/ERROR as they do at harness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StatusRepr")]
pub enum SubtestStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "NOTRUN")]
    NotRun,
}

impl SubtestStatus {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(SubtestStatus::Pass),
            1 => Some(SubtestStatus::Fail),
            2 => Some(SubtestStatus::Timeout),
            3 => Some(SubtestStatus::NotRun),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "PASS" => Some(SubtestStatus::Pass),
            "FAIL" => Some(SubtestStatus::Fail),
            "TIMEOUT" => Some(SubtestStatus::Timeout),
            "NOTRUN" => Some(SubtestStatus::NotRun),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubtestStatus::Pass => "PASS",
            SubtestStatus::Fail => "FAIL",
            SubtestStatus::Timeout => "TIMEOUT",
            SubtestStatus::NotRun => "NOTRUN",
        }
    }
}

impl TryFrom<StatusRepr> for SubtestStatus {
    type Error = String;

    fn try_from(repr: StatusRepr) -> Result<Self, String> {
        match repr {
            StatusRepr::Code(code) => SubtestStatus::from_code(code)
                .ok_or_else(|| format!("unknown subtest status code {}", code)),
            StatusRepr::Label(label) => SubtestStatus::from_label(&label)
                .ok_or_else(|| format!("unknown subtest status label {:?}", label)),
        }
    }
}

impl fmt::Display for SubtestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Result Records
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtestResult {
    #[serde(default)]
    pub name: String,
    pub status: SubtestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One normalized test result, as stored and as written into bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub test: String,
    pub status: HarnessStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub subtests: Vec<SubtestResult>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultRecord {
    /// API module this result belongs to.
    pub fn api(&self) -> &str {
        api_of(&self.test)
    }
}

/// A record as returned by a [`crate::ResultStore`], carrying the store's row id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub id: String,
    pub record: ResultRecord,
}

/// Persisted per-(token, API) document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiBundle {
    pub results: Vec<ResultRecord>,
}

/// Returns the API module of a test identifier: its first path segment.
///
/// A leading `/` is tolerated: `"/dom/a.html"` and `"dom/a.html"` both yield `"dom"`.
pub fn api_of(test: &str) -> &str {
    let trimmed = test.strip_prefix('/').unwrap_or(test);
    trimmed.split('/').next().unwrap_or("")
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Completed,
    Aborted,
}

/// A test-run session for one browser/device instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_agent: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub status: SessionStatus,
    /// Declared tests, in run order.
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub completed_tests: BTreeSet<String>,
}

impl Session {
    pub fn new(token: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Session {
            token: token.into(),
            user_agent: user_agent.into(),
            path: None,
            types: Vec::new(),
            status: SessionStatus::Pending,
            tests: Vec::new(),
            completed_tests: BTreeSet::new(),
        }
    }

    pub fn with_tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tests = tests.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn test_exists(&self, test: &str) -> bool {
        self.tests.iter().any(|t| t == test)
    }

    pub fn is_test_complete(&self, test: &str) -> bool {
        self.completed_tests.contains(test)
    }

    /// Marks a declared test complete. Returns `false` if it already was.
    pub fn complete_test(&mut self, test: &str) -> bool {
        self.completed_tests.insert(test.to_string())
    }

    pub(crate) fn reopen_test(&mut self, test: &str) {
        self.completed_tests.remove(test);
    }

    /// True when every declared test of `api` is complete.
    ///
    /// An API with no declared tests is never complete.
    pub fn is_api_complete(&self, api: &str) -> bool {
        let mut declared = self.tests.iter().filter(|t| api_of(t) == api).peekable();
        declared.peek().is_some() && declared.all(|t| self.completed_tests.contains(t))
    }

    /// Declared API modules, in first-seen order.
    pub fn apis(&self) -> Vec<&str> {
        let mut apis: Vec<&str> = Vec::new();
        for test in &self.tests {
            let api = api_of(test);
            if !apis.contains(&api) {
                apis.push(api);
            }
        }
        apis
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            user_agent: self.user_agent.clone(),
            path: self.path.clone(),
            types: self.types.clone(),
        }
    }
}

/// Contents of `{root}/{token}/info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_agent: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}
