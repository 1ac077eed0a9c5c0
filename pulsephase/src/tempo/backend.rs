//! Running the external fit program.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use super::scratch::ScratchGuard;
use crate::error::{PredictError, PredictResult};

/// File in the working directory that receives the program's diagnostics.
pub const DIAGNOSTICS_FILE: &str = ".stderr";

/// Something that runs a fit in a locked working directory.
///
/// Implementations leave any diagnostic output in [`DIAGNOSTICS_FILE`]
/// inside the working directory; callers treat a non-empty diagnostics
/// file as failure.
pub trait FitBackend {
    /// Run with `arguments`, feeding `input` on standard input.
    fn run(&self, workdir: &ScratchGuard<'_>, arguments: &[String], input: &str) -> PredictResult<()>;
}

/// Invokes the `tempo` program.
///
/// Standard output is discarded and standard error is captured in
/// [`DIAGNOSTICS_FILE`]. A failed spawn or a non-zero exit status is
/// reported as a failed system operation; nothing is retried.
#[derive(Debug, Clone)]
pub struct TempoCommand {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl Default for TempoCommand {
    fn default() -> Self {
        Self::new("tempo")
    }
}

impl TempoCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the generator's own, e.g. a script path when
    /// `program` is an interpreter.
    pub fn with_leading_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl FitBackend for TempoCommand {
    fn run(&self, workdir: &ScratchGuard<'_>, arguments: &[String], input: &str) -> PredictResult<()> {
        let diagnostics_path = workdir.file(DIAGNOSTICS_FILE);
        let diagnostics = File::create(&diagnostics_path)
            .map_err(|e| PredictError::io("TempoCommand::run", diagnostics_path.display(), e))?;

        info!(
            program = %self.program.display(),
            args = ?arguments,
            dir = %workdir.path().display(),
            "Running fit program"
        );

        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(arguments)
            .current_dir(workdir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(diagnostics))
            .spawn()
            .map_err(|e| {
                PredictError::failed_sys(
                    "TempoCommand::run",
                    format!("cannot start {}: {}", self.program.display(), e),
                )
                .with_source(e)
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                drop(stdin);
                // reap the child before reporting
                if let Err(kill) = child.kill() {
                    warn!(error = %kill, "Cannot stop fit program");
                }
                let _ = child.wait();
                return Err(PredictError::io("TempoCommand::run", "standard input", e));
            }
        }

        let status = child
            .wait()
            .map_err(|e| PredictError::io("TempoCommand::run", self.program.display(), e))?;
        debug!(%status, "Fit program finished");

        if !status.success() {
            return Err(PredictError::failed_sys(
                "TempoCommand::run",
                format!("{} exited with {}", self.program.display(), status),
            ));
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tempo::ScratchDir;

    #[test]
    fn test_runs_in_working_directory_with_input() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(temp.path());
        let guard = scratch.lock().unwrap();

        let backend = TempoCommand::new("sh").with_leading_args(["-c", "cat > received.txt; echo \"$0\" > args.txt"]);
        backend
            .run(&guard, &["-z".to_string()], " 58000 58001\n")
            .unwrap();

        assert_eq!(guard.read_file("received.txt").unwrap().as_deref(), Some(" 58000 58001\n"));
        assert_eq!(guard.read_file("args.txt").unwrap().as_deref(), Some("-z\n"));
        assert_eq!(guard.read_file(DIAGNOSTICS_FILE).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_stderr_is_captured() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(temp.path());
        let guard = scratch.lock().unwrap();

        let backend = TempoCommand::new("sh").with_leading_args(["-c", "echo 'no clock file' >&2"]);
        backend.run(&guard, &[], "").unwrap();
        assert_eq!(
            guard.read_file(DIAGNOSTICS_FILE).unwrap().as_deref(),
            Some("no clock file\n")
        );
    }

    #[test]
    fn test_nonzero_exit_is_failed_sys() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(temp.path());
        let guard = scratch.lock().unwrap();

        let err = TempoCommand::new("sh")
            .with_leading_args(["-c", "exit 3"])
            .run(&guard, &[], "")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedSys);
    }

    #[test]
    fn test_closed_input_stops_program() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(temp.path());
        let guard = scratch.lock().unwrap();

        // more input than a pipe buffers, to a program that never reads it
        let input = " 58000 58001\n".repeat(100_000);
        let started = std::time::Instant::now();
        let err = TempoCommand::new("sh")
            .with_leading_args(["-c", "exec 0<&-; sleep 30"])
            .run(&guard, &[], &input)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedSys);
        assert!(err.message().contains("standard input"));
        assert!(started.elapsed() < std::time::Duration::from_secs(20));
    }

    #[test]
    fn test_missing_program_is_failed_sys() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(temp.path());
        let guard = scratch.lock().unwrap();

        let err = TempoCommand::new(temp.path().join("no-such-tempo"))
            .run(&guard, &[], "")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedSys);
    }
}
