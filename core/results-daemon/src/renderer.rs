//! Report renderer that shells out to the `wptreport` program.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use results_core::{MultiReportRequest, ReportRenderer, ResultsError, SingleReportRequest};

pub const DEFAULT_PROGRAM: &str = "wptreport";

pub struct WptReportRenderer {
    program: String,
    extra_args: Vec<String>,
}

impl WptReportRenderer {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    pub fn single_args(&self, request: &SingleReportRequest) -> Vec<OsString> {
        let mut args = self.base_args(&request.output_dir, &request.spec_name);
        args.push("--input".into());
        args.push(request.input_dir.clone().into_os_string());
        args.push("--sort".into());
        args.push("true".into());
        args.push("--failures".into());
        args.push("true".into());
        args
    }

    pub fn multi_args(&self, request: &MultiReportRequest) -> Vec<OsString> {
        let mut args = self.base_args(&request.output_dir, &request.spec_name);
        for location in &request.result_locations {
            args.push("--input".into());
            args.push(location.path().into_os_string());
        }
        args.push("--tokenFileName".into());
        args.push("true".into());
        args.push("--pass".into());
        args.push("100".into());
        if let Some(reference_dir) = &request.reference_dir {
            args.push("--ref".into());
            args.push(reference_dir.clone().into_os_string());
        }
        args
    }

    fn base_args(&self, output_dir: &Path, spec_name: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.extra_args.iter().map(OsString::from).collect();
        args.push("--output".into());
        args.push(output_dir.as_os_str().to_owned());
        args.push("--spec".into());
        args.push(spec_name.into());
        args
    }

    fn run(&self, spec_name: &str, args: Vec<OsString>) -> results_core::Result<()> {
        debug!(program = %self.program, spec = %spec_name, "Running report renderer");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|err| ResultsError::Render {
                spec: spec_name.to_string(),
                details: format!("failed to start {}: {}", self.program, err),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ResultsError::Render {
            spec: spec_name.to_string(),
            details: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
        })
    }
}

impl Default for WptReportRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM, Vec::new())
    }
}

impl ReportRenderer for WptReportRenderer {
    fn generate_report(&self, request: &SingleReportRequest) -> results_core::Result<()> {
        self.run(&request.spec_name, self.single_args(request))
    }

    fn generate_multi_report(&self, request: &MultiReportRequest) -> results_core::Result<()> {
        self.run(&request.spec_name, self.multi_args(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use results_core::JsonLocation;
    use std::path::PathBuf;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn single_report_args() {
        let renderer = WptReportRenderer::new("wptreport", vec!["--quiet".to_string()]);
        let args = strings(renderer.single_args(&SingleReportRequest {
            input_dir: PathBuf::from("/r/tok/dom"),
            output_dir: PathBuf::from("/r/tok/dom"),
            spec_name: "dom".to_string(),
        }));
        assert_eq!(
            args,
            vec![
                "--quiet", "--output", "/r/tok/dom", "--spec", "dom", "--input", "/r/tok/dom",
                "--sort", "true", "--failures", "true"
            ]
        );
    }

    #[test]
    fn multi_report_args_list_every_bundle_and_reference() {
        let renderer = WptReportRenderer::default();
        let location = |token: &str| JsonLocation {
            root: PathBuf::from("/r"),
            token: token.to_string(),
            api: "dom".to_string(),
            filename: "CR120.json".to_string(),
        };
        let args = strings(renderer.multi_args(&MultiReportRequest {
            output_dir: PathBuf::from("/r/key/dom"),
            spec_name: "dom".to_string(),
            result_locations: vec![location("a"), location("b")],
            reference_dir: Some(PathBuf::from("/r/ref/dom")),
        }));
        assert_eq!(
            args,
            vec![
                "--output",
                "/r/key/dom",
                "--spec",
                "dom",
                "--input",
                "/r/a/dom/CR120.json",
                "--input",
                "/r/b/dom/CR120.json",
                "--tokenFileName",
                "true",
                "--pass",
                "100",
                "--ref",
                "/r/ref/dom"
            ]
        );
    }

    #[test]
    fn missing_program_is_a_render_error() {
        let renderer = WptReportRenderer::new("wave-results-no-such-renderer", Vec::new());
        let err = renderer
            .generate_report(&SingleReportRequest {
                input_dir: PathBuf::from("/nonexistent"),
                output_dir: PathBuf::from("/nonexistent"),
                spec_name: "dom".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ResultsError::Render { ref spec, .. } if spec == "dom"));
    }
}
