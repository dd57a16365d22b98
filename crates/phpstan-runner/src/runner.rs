//! PHPStan process runner.

use crate::config::AnalyzerConfig;
use crate::output::{parse_output, AnalysisReport};
use crate::{AnalyzerError, AnalyzerResult};
use camino::{Utf8Path, Utf8PathBuf};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Runs `phpstan analyse` on generated files.
#[derive(Debug, Clone)]
pub struct PhpstanRunner {
    workspace: Utf8PathBuf,
    config: AnalyzerConfig,
    binary: PathBuf,
}

impl PhpstanRunner {
    /// Create a runner, locating the PHPStan executable.
    pub fn new(workspace: &Utf8Path, config: AnalyzerConfig) -> AnalyzerResult<Self> {
        let binary = find_phpstan(workspace, &config)?;
        Ok(Self::with_binary(workspace, config, binary))
    }

    /// Create a runner for a known executable.
    pub fn with_binary(workspace: &Utf8Path, config: AnalyzerConfig, binary: PathBuf) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            config,
            binary,
        }
    }

    /// The PHPStan executable in use.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments for one `analyse` run.
    pub fn command_args(&self, files: &[PathBuf], autoload_file: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "analyse".into(),
            "--error-format=json".into(),
            "--no-progress".into(),
            "--no-interaction".into(),
        ];
        if let Some(configuration) = self.config.configuration_file(&self.workspace) {
            args.push("--configuration".into());
            args.push(configuration.into_std_path_buf().into());
        }
        if let Some(level) = &self.config.level {
            args.push(format!("--level={level}").into());
        }
        if let Some(limit) = &self.config.memory_limit {
            args.push(format!("--memory-limit={limit}").into());
        }
        args.push("--autoload-file".into());
        args.push(autoload_file.into());
        args.extend(self.config.args.iter().map(OsString::from));
        args.push("--".into());
        args.extend(files.iter().map(|file| file.as_os_str().to_os_string()));
        args
    }

    /// Analyse `files`, loading `autoload_file` first.
    pub async fn analyse(
        &self,
        files: &[PathBuf],
        autoload_file: &Path,
    ) -> AnalyzerResult<AnalysisReport> {
        if files.is_empty() {
            return Ok(AnalysisReport::default());
        }
        let args = self.command_args(files, autoload_file);
        tracing::debug!(binary = %self.binary.display(), ?args, "running PHPStan");

        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&self.workspace)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|source| AnalyzerError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(status = ?output.status.code(), stdout = stdout.len(), "PHPStan finished");

        if !stdout.contains('{') {
            return Err(AnalyzerError::NoReport {
                status: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(parse_output(&stdout)?)
    }
}

/// The configured binary, then `vendor/bin/phpstan`, then `phpstan` on `PATH`.
fn find_phpstan(workspace: &Utf8Path, config: &AnalyzerConfig) -> AnalyzerResult<PathBuf> {
    if let Some(binary) = &config.binary {
        return Ok(workspace.join(binary).into_std_path_buf());
    }
    let local = workspace.join("vendor/bin/phpstan");
    if local.exists() {
        return Ok(local.into_std_path_buf());
    }
    which::which("phpstan").map_err(|_| AnalyzerError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_command_args() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let config = AnalyzerConfig {
            level: Some("max".to_string()),
            memory_limit: None,
            args: vec!["--xdebug".to_string()],
            ..Default::default()
        };
        let runner = PhpstanRunner::with_binary(&root, config, PathBuf::from("phpstan"));
        let args = runner.command_args(
            &[PathBuf::from("/tmp/a-blade-compiled.php")],
            Path::new("/tmp/bladecheck-loop.php"),
        );
        assert_eq!(
            strings(&args),
            vec![
                "analyse",
                "--error-format=json",
                "--no-progress",
                "--no-interaction",
                "--level=max",
                "--autoload-file",
                "/tmp/bladecheck-loop.php",
                "--xdebug",
                "--",
                "/tmp/a-blade-compiled.php",
            ]
        );
    }

    #[test]
    fn test_configured_binary() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(root.join("phpstan.neon"), "").unwrap();
        let config = AnalyzerConfig {
            binary: Some("tools/phpstan".into()),
            ..Default::default()
        };
        let runner = PhpstanRunner::new(&root, config).unwrap();
        assert_eq!(runner.binary(), root.join("tools/phpstan").as_std_path());

        let args = strings(&runner.command_args(&[], Path::new("stub.php")));
        assert_eq!(args[4], "--configuration");
        assert_eq!(args[5], root.join("phpstan.neon").as_str());
    }

    #[tokio::test]
    async fn test_no_files_skips_process() {
        let runner = PhpstanRunner::with_binary(
            Utf8Path::new("/nonexistent"),
            AnalyzerConfig::default(),
            PathBuf::from("/nonexistent/phpstan"),
        );
        let report = runner.analyse(&[], Path::new("stub.php")).await.unwrap();
        assert_eq!(report, AnalysisReport::default());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let runner = PhpstanRunner::with_binary(
            Utf8Path::new("/"),
            AnalyzerConfig::default(),
            PathBuf::from("/nonexistent/phpstan"),
        );
        let err = runner
            .analyse(&[PathBuf::from("a.php")], Path::new("stub.php"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Spawn { .. }));
    }
}
