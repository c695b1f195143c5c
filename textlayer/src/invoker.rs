//! External OCR toolchain invocation.
//!
//! Builds the `ocrmypdf` argument list, runs it as a cancellable child
//! process under a wall-clock timeout, and classifies failures via the
//! tool's documented exit codes. Stderr pattern matching exists only as a
//! last-resort fallback for exit codes the table does not cover.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::config::OcrToolConfig;
use crate::error::{OcrJobError, Result};

/// Fixed set of language selectors the deployment ships trained data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum Language {
    #[serde(rename = "eng")]
    Eng,
    #[serde(rename = "chi_sim")]
    ChiSim,
    #[serde(rename = "eng+chi_sim")]
    EngChiSim,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Eng, Language::ChiSim, Language::EngChiSim];

    /// The value passed to the tool's `-l` flag.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Language::Eng => "eng",
            Language::ChiSim => "chi_sim",
            Language::EngChiSim => "eng+chi_sim",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Language::Eng => "English only",
            Language::ChiSim => "Simplified Chinese only",
            Language::EngChiSim => "English and Simplified Chinese",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "eng" => Some(Language::Eng),
            "chi_sim" => Some(Language::ChiSim),
            "eng+chi_sim" => Some(Language::EngChiSim),
            _ => None,
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::EngChiSim
    }
}

/// Options for one invocation, immutable once parsed from the form.
#[derive(Debug, Clone)]
pub struct OcrOptions {
    pub language: Language,
    /// `true` forces reprocessing even where a text layer exists;
    /// `false` skips pages that already carry one. Mutually exclusive
    /// flags on the tool side.
    pub force_ocr: bool,
    pub deskew: bool,
    /// Output-size optimization pass, 0 (none) to 3 (max).
    pub optimize: u8,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: Language::default(),
            force_ocr: false,
            deskew: false,
            optimize: 0,
        }
    }
}

impl OcrOptions {
    /// Out-of-range optimize values clamp to 0 (no optimization).
    pub fn clamp_optimize(value: i64) -> u8 {
        if (0..=3).contains(&value) {
            value as u8
        } else {
            0
        }
    }
}

/// OCRmyPDF exit codes, from `ocrmypdf.exceptions.ExitCode`.
mod exit_code {
    pub const BAD_ARGS: i32 = 1;
    pub const INPUT_FILE: i32 = 2;
    pub const MISSING_DEPENDENCY: i32 = 3;
    pub const ALREADY_DONE_OCR: i32 = 6;
    pub const ENCRYPTED_PDF: i32 = 8;
    pub const INVALID_CONFIG: i32 = 9;
}

enum FailureAction {
    /// The tool refused because a text layer is already present; the
    /// original input is delivered unchanged.
    DeliverOriginal,
    Fail(OcrJobError),
}

fn classify_failure(code: Option<i32>, stderr: &str) -> FailureAction {
    match code {
        Some(exit_code::ALREADY_DONE_OCR) => FailureAction::DeliverOriginal,
        Some(exit_code::INPUT_FILE) => FailureAction::Fail(OcrJobError::CorruptDocument),
        Some(exit_code::MISSING_DEPENDENCY) => FailureAction::Fail(
            OcrJobError::DependencyUnavailable("a required OCR component is missing".to_string()),
        ),
        Some(exit_code::ENCRYPTED_PDF) => FailureAction::Fail(OcrJobError::EncryptedInput),
        Some(exit_code::BAD_ARGS) | Some(exit_code::INVALID_CONFIG) => FailureAction::Fail(
            OcrJobError::BadParameters("the OCR tool rejected the given options".to_string()),
        ),
        // Last resort: pattern-match stderr for codes outside the table.
        _ => {
            if stderr.contains("PriorOcrFound") {
                FailureAction::DeliverOriginal
            } else if stderr.contains("EncryptedPdf") || stderr.contains("password") {
                FailureAction::Fail(OcrJobError::EncryptedInput)
            } else {
                FailureAction::Fail(OcrJobError::ToolExecutionFailed)
            }
        }
    }
}

fn truncate_lossy(bytes: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.chars().take(max).collect()
}

/// Toolchain version strings reported by the health endpoint. `None`
/// means the component could not be executed.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ToolchainVersions {
    pub ocrmypdf: Option<String>,
    pub tesseract: Option<String>,
}

impl ToolchainVersions {
    pub fn is_available(&self) -> bool {
        self.ocrmypdf.is_some()
    }
}

#[derive(Clone)]
pub struct OcrInvoker {
    config: OcrToolConfig,
}

impl OcrInvoker {
    pub fn new(config: &OcrToolConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn build_args(&self, input: &Path, output: &Path, options: &OcrOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-l".into(),
            options.language.as_arg().into(),
            "--jobs".into(),
            self.config.jobs.to_string().into(),
        ];
        if options.force_ocr {
            args.push("--force-ocr".into());
        } else {
            args.push("--skip-text".into());
        }
        if options.deskew {
            args.push("--deskew".into());
        }
        if options.optimize > 0 {
            args.push("--optimize".into());
            args.push(options.optimize.to_string().into());
        }
        args.push(input.as_os_str().to_os_string());
        args.push(output.as_os_str().to_os_string());
        args
    }

    /// Runs one OCR job. On success the output path holds the processed
    /// PDF; when the tool reports a pre-existing text layer, the input is
    /// copied byte-for-byte so the caller always receives a usable file.
    pub async fn invoke(&self, input: &Path, output: &Path, options: &OcrOptions) -> Result<()> {
        let args = self.build_args(input, output, options);
        tracing::info!(
            binary = %self.config.binary,
            language = options.language.as_arg(),
            force_ocr = options.force_ocr,
            deskew = options.deskew,
            optimize = options.optimize,
            "Invoking OCR toolchain"
        );

        let mut cmd = Command::new(&self.config.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let result = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result,
            Err(_) => {
                // Dropping the output future kills the child via
                // kill_on_drop; the workspace is still released by its guard.
                tracing::error!(
                    seconds = self.config.timeout_secs,
                    "OCR invocation exceeded wall-clock timeout"
                );
                return Err(OcrJobError::TimeoutExceeded {
                    seconds: self.config.timeout_secs,
                });
            }
        };

        let out = result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrJobError::DependencyUnavailable(format!(
                    "{} is not installed or not on PATH",
                    self.config.binary
                ))
            } else {
                OcrJobError::InternalUnexpected(format!(
                    "failed to spawn {}: {e}",
                    self.config.binary
                ))
            }
        })?;

        if out.status.success() {
            if !output.exists() {
                tracing::error!("OCR toolchain exited successfully but produced no output file");
                return Err(OcrJobError::OutputMissing);
            }
            return Ok(());
        }

        let stderr = truncate_lossy(&out.stderr, 1000);
        tracing::error!(
            exit_code = ?out.status.code(),
            stderr = %stderr,
            stdout = %truncate_lossy(&out.stdout, 1000),
            "OCR toolchain failed"
        );

        match classify_failure(out.status.code(), &stderr) {
            FailureAction::DeliverOriginal => {
                tracing::info!("Text layer already present; delivering original input unchanged");
                tokio::fs::copy(input, output).await?;
                Ok(())
            }
            FailureAction::Fail(err) => Err(err),
        }
    }

    /// Diagnostic collaborator check: reports version strings for the OCR
    /// tool and its recognition engine. Bounded so a wedged binary cannot
    /// stall the health endpoint.
    pub async fn probe(&self) -> ToolchainVersions {
        ToolchainVersions {
            ocrmypdf: probe_version(&self.config.binary).await,
            tesseract: probe_version("tesseract").await,
        }
    }
}

async fn probe_version(binary: &str) -> Option<String> {
    let mut cmd = Command::new(binary);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let out = tokio::time::timeout(Duration::from_secs(5), cmd.output())
        .await
        .ok()?
        .ok()?;
    if !out.status.success() {
        return None;
    }

    // Some tools print the version banner on stderr instead of stdout.
    let text = if out.stdout.is_empty() {
        String::from_utf8_lossy(&out.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&out.stdout).into_owned()
    };
    let first_line = text.lines().next()?.trim();
    if first_line.is_empty() {
        None
    } else {
        Some(first_line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcrToolConfig;

    fn tool_config(binary: &str, timeout_secs: u64) -> OcrToolConfig {
        OcrToolConfig {
            binary: binary.to_string(),
            jobs: 1,
            timeout_secs,
            temp_root: None,
        }
    }

    #[test]
    fn test_optimize_clamps_out_of_range_to_zero() {
        assert_eq!(OcrOptions::clamp_optimize(-1), 0);
        assert_eq!(OcrOptions::clamp_optimize(0), 0);
        assert_eq!(OcrOptions::clamp_optimize(2), 2);
        assert_eq!(OcrOptions::clamp_optimize(3), 3);
        assert_eq!(OcrOptions::clamp_optimize(4), 0);
        assert_eq!(OcrOptions::clamp_optimize(99), 0);
    }

    #[test]
    fn test_language_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::parse(lang.as_arg()), Some(lang));
        }
        assert_eq!(Language::parse("deu"), None);
        assert_eq!(Language::default(), Language::EngChiSim);
    }

    #[test]
    fn test_build_args_defaults_to_skip_text() {
        let invoker = OcrInvoker::new(&tool_config("ocrmypdf", 600));
        let args = invoker.build_args(
            Path::new("/w/in.pdf"),
            Path::new("/w/out.pdf"),
            &OcrOptions::default(),
        );
        assert!(args.contains(&OsString::from("--skip-text")));
        assert!(!args.contains(&OsString::from("--force-ocr")));
        assert!(!args.contains(&OsString::from("--optimize")));
        assert_eq!(args.last(), Some(&OsString::from("/w/out.pdf")));
    }

    #[test]
    fn test_build_args_force_and_deskew_and_optimize() {
        let invoker = OcrInvoker::new(&tool_config("ocrmypdf", 600));
        let options = OcrOptions {
            language: Language::Eng,
            force_ocr: true,
            deskew: true,
            optimize: 2,
        };
        let args = invoker.build_args(Path::new("in.pdf"), Path::new("out.pdf"), &options);
        assert!(args.contains(&OsString::from("--force-ocr")));
        assert!(!args.contains(&OsString::from("--skip-text")));
        assert!(args.contains(&OsString::from("--deskew")));
        let pos = args
            .iter()
            .position(|a| a == &OsString::from("--optimize"))
            .unwrap();
        assert_eq!(args[pos + 1], OsString::from("2"));
    }

    #[test]
    fn test_exit_code_classification() {
        assert!(matches!(
            classify_failure(Some(2), ""),
            FailureAction::Fail(OcrJobError::CorruptDocument)
        ));
        assert!(matches!(
            classify_failure(Some(3), ""),
            FailureAction::Fail(OcrJobError::DependencyUnavailable(_))
        ));
        assert!(matches!(
            classify_failure(Some(6), ""),
            FailureAction::DeliverOriginal
        ));
        assert!(matches!(
            classify_failure(Some(8), ""),
            FailureAction::Fail(OcrJobError::EncryptedInput)
        ));
        assert!(matches!(
            classify_failure(Some(1), ""),
            FailureAction::Fail(OcrJobError::BadParameters(_))
        ));
        assert!(matches!(
            classify_failure(Some(15), ""),
            FailureAction::Fail(OcrJobError::ToolExecutionFailed)
        ));
        assert!(matches!(
            classify_failure(None, ""),
            FailureAction::Fail(OcrJobError::ToolExecutionFailed)
        ));
    }

    #[test]
    fn test_stderr_fallback_classification() {
        assert!(matches!(
            classify_failure(Some(15), "ocrmypdf.exceptions.PriorOcrFoundError: ..."),
            FailureAction::DeliverOriginal
        ));
        assert!(matches!(
            classify_failure(Some(15), "this file requires a password"),
            FailureAction::Fail(OcrJobError::EncryptedInput)
        ));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        // Copies the second-to-last argument (input) to the last (output).
        const COPY_TOOL: &str = r#"prev=""; last=""
for a in "$@"; do prev="$last"; last="$a"; done
cp "$prev" "$last""#;

        #[tokio::test]
        async fn test_invoke_success_produces_output() {
            let dir = tempfile::tempdir().unwrap();
            let tool = write_script(dir.path(), "fake-ocrmypdf", COPY_TOOL);
            let input = dir.path().join("in.pdf");
            let output = dir.path().join("out.pdf");
            std::fs::write(&input, b"%PDF-1.5 payload").unwrap();

            let invoker = OcrInvoker::new(&tool_config(tool.to_str().unwrap(), 30));
            invoker
                .invoke(&input, &output, &OcrOptions::default())
                .await
                .unwrap();
            assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.5 payload");
        }

        #[tokio::test]
        async fn test_invoke_prior_ocr_delivers_original() {
            let dir = tempfile::tempdir().unwrap();
            let tool = write_script(dir.path(), "fake-ocrmypdf", "exit 6");
            let input = dir.path().join("in.pdf");
            let output = dir.path().join("out.pdf");
            std::fs::write(&input, b"already has a text layer").unwrap();

            let invoker = OcrInvoker::new(&tool_config(tool.to_str().unwrap(), 30));
            invoker
                .invoke(&input, &output, &OcrOptions::default())
                .await
                .unwrap();
            assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());
        }

        #[tokio::test]
        async fn test_invoke_encrypted_exit_code() {
            let dir = tempfile::tempdir().unwrap();
            let tool = write_script(dir.path(), "fake-ocrmypdf", "exit 8");
            let input = dir.path().join("in.pdf");
            std::fs::write(&input, b"x").unwrap();

            let invoker = OcrInvoker::new(&tool_config(tool.to_str().unwrap(), 30));
            let err = invoker
                .invoke(&input, &dir.path().join("out.pdf"), &OcrOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, OcrJobError::EncryptedInput));
        }

        #[tokio::test]
        async fn test_invoke_timeout_kills_child() {
            let dir = tempfile::tempdir().unwrap();
            let tool = write_script(dir.path(), "fake-ocrmypdf", "sleep 30");
            let input = dir.path().join("in.pdf");
            std::fs::write(&input, b"x").unwrap();

            let invoker = OcrInvoker::new(&tool_config(tool.to_str().unwrap(), 1));
            let err = invoker
                .invoke(&input, &dir.path().join("out.pdf"), &OcrOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, OcrJobError::TimeoutExceeded { seconds: 1 }));
        }

        #[tokio::test]
        async fn test_invoke_success_without_output_is_output_missing() {
            let dir = tempfile::tempdir().unwrap();
            let tool = write_script(dir.path(), "fake-ocrmypdf", "exit 0");
            let input = dir.path().join("in.pdf");
            std::fs::write(&input, b"x").unwrap();

            let invoker = OcrInvoker::new(&tool_config(tool.to_str().unwrap(), 30));
            let err = invoker
                .invoke(&input, &dir.path().join("out.pdf"), &OcrOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, OcrJobError::OutputMissing));
        }

        #[tokio::test]
        async fn test_missing_binary_is_dependency_unavailable() {
            let dir = tempfile::tempdir().unwrap();
            let input = dir.path().join("in.pdf");
            std::fs::write(&input, b"x").unwrap();

            let invoker =
                OcrInvoker::new(&tool_config("/nonexistent/textlayer-ocr-binary", 30));
            let err = invoker
                .invoke(&input, &dir.path().join("out.pdf"), &OcrOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, OcrJobError::DependencyUnavailable(_)));
        }

        #[tokio::test]
        async fn test_probe_reports_version_line() {
            let dir = tempfile::tempdir().unwrap();
            let tool = write_script(
                dir.path(),
                "fake-ocrmypdf",
                r#"if [ "$1" = "--version" ]; then echo "16.4.0"; exit 0; fi
exit 1"#,
            );
            let invoker = OcrInvoker::new(&tool_config(tool.to_str().unwrap(), 30));
            let versions = invoker.probe().await;
            assert_eq!(versions.ocrmypdf.as_deref(), Some("16.4.0"));
            assert!(versions.is_available());
        }
    }
}
