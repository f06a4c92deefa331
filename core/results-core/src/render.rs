//! Report renderer interface.
//!
//! Rendering HTML is not done here; a renderer turns a directory of
//! per-browser JSON bundles into a report. [`RecordingRenderer`] stands in
//! for a real renderer in tests and dry runs.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use fs_err as fs;

use crate::error::{Result, ResultsError};
use crate::paths::{JsonLocation, COMPARISON_REPORT_FILE, FILTERED_REPORT_FILE};

/// Single-session report: bundles in `input_dir`, HTML into `output_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleReportRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub spec_name: String,
}

/// Multi-session comparison report.
///
/// `reference_dir`, when set, holds the baseline bundle the report is filtered against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiReportRequest {
    pub output_dir: PathBuf,
    pub spec_name: String,
    pub result_locations: Vec<JsonLocation>,
    pub reference_dir: Option<PathBuf>,
}

pub trait ReportRenderer: Send + Sync {
    fn generate_report(&self, request: &SingleReportRequest) -> Result<()>;

    fn generate_multi_report(&self, request: &MultiReportRequest) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    Single(SingleReportRequest),
    Multi(MultiReportRequest),
}

/// Renderer that records every request and writes an empty placeholder report.
#[derive(Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<RenderCall>>,
    failing: AtomicBool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent requests fail after being recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn single_calls(&self) -> Vec<SingleReportRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Single(request) => Some(request),
                RenderCall::Multi(_) => None,
            })
            .collect()
    }

    pub fn multi_calls(&self) -> Vec<MultiReportRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RenderCall::Multi(request) => Some(request),
                RenderCall::Single(_) => None,
            })
            .collect()
    }

    fn record(&self, call: RenderCall, spec_name: &str) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ResultsError::Render {
                spec: spec_name.to_string(),
                details: "renderer configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

impl ReportRenderer for RecordingRenderer {
    fn generate_report(&self, request: &SingleReportRequest) -> Result<()> {
        self.record(RenderCall::Single(request.clone()), &request.spec_name)?;
        let path = request.output_dir.join(COMPARISON_REPORT_FILE);
        fs::write(&path, "").map_err(|e| ResultsError::io("write placeholder report", e))
    }

    fn generate_multi_report(&self, request: &MultiReportRequest) -> Result<()> {
        self.record(RenderCall::Multi(request.clone()), &request.spec_name)?;
        let file = if request.reference_dir.is_some() {
            FILTERED_REPORT_FILE
        } else {
            COMPARISON_REPORT_FILE
        };
        for location in &request.result_locations {
            let copy_name = format!("{}-{}", location.token, location.filename);
            fs::write(request.output_dir.join(copy_name), "")
                .map_err(|e| ResultsError::io("write placeholder result copy", e))?;
        }
        fs::write(request.output_dir.join(file), "")
            .map_err(|e| ResultsError::io("write placeholder report", e))
    }
}
