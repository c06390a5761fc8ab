//! Running external programs with a deadline.
use std::{
    fmt::Display,
    process::{Command, ExitStatus, Stdio},
    time::Duration,
};

#[derive(Debug)]
pub enum CommandError {
    /// The program could not be started (usually: not found)
    Spawn { program: String, error: std::io::Error },
    /// The program (or something holding its output open) outlived the deadline
    Timeout { program: String, timeout: Duration },
    /// The program exited unsuccessfully
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    Io { program: String, error: std::io::Error },
}

impl Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CommandError::*;
        match self {
            Spawn { program, error } => write!(f, "failed to run {}: {}", program, error),
            Timeout { program, timeout } => write!(
                f,
                "{} did not finish within {:.1}s",
                program,
                timeout.as_secs_f64()
            ),
            Failed {
                program,
                status,
                stderr,
            } => {
                write!(f, "{} failed with {}", program, status)?;
                if !stderr.is_empty() {
                    write!(f, "\n{}", stderr.trim_end())?;
                }
                Ok(())
            }
            Io { program, error } => write!(f, "failed to read output of {}: {}", program, error),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Spawn { error, .. } | CommandError::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Run `cmd` to completion and return its stdout.
///
/// The deadline covers both the exit of the program and reading its output to the end, so a
/// background process that keeps the pipes open counts as a timeout.  The child is killed when
/// the deadline passes.  A non-zero exit status is an error carrying whatever the program wrote
/// to stderr.
pub fn output_with_timeout(cmd: Command, timeout: Duration) -> Result<Vec<u8>, CommandError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    tracing::debug!(%program, args = ?cmd.get_args().collect::<Vec<_>>(), ?timeout, "running");

    let io_error = |error: std::io::Error| CommandError::Io {
        program: program.clone(),
        error,
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(io_error)?;

    let mut cmd = tokio::process::Command::from(cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = rt.block_on(async {
        let child = cmd.spawn().map_err(|error| CommandError::Spawn {
            program: program.clone(),
            error,
        })?;
        // Dropping the timed-out future drops the child, which kills it.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(io_error),
            Err(_) => Err(CommandError::Timeout {
                program: program.clone(),
                timeout,
            }),
        }
    })?;

    if !output.status.success() {
        return Err(CommandError::Failed {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    tracing::debug!(%program, bytes = output.stdout.len(), "finished");
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut c = Command::new("sh");
        c.args(&["-c", script]);
        c
    }

    #[test]
    fn captures_stdout() {
        let out = output_with_timeout(sh("echo hello"), Duration::from_secs(5)).unwrap();
        assert_eq!(out, b"hello\n");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let err = output_with_timeout(sh("echo oops >&2; exit 3"), Duration::from_secs(5))
            .unwrap_err();
        match &err {
            CommandError::Failed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "oops\n");
            }
            e => panic!("unexpected error: {:?}", e),
        }
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn slow_command_times_out() {
        let start = Instant::now();
        let err = output_with_timeout(sh("sleep 5"), Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }), "{:?}", err);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn background_process_holding_stdout_times_out() {
        let start = Instant::now();
        let err = output_with_timeout(sh("sleep 6 & echo hi"), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }), "{:?}", err);
        assert!(start.elapsed() < Duration::from_secs(3), "{:?}", start.elapsed());
    }

    #[test]
    fn missing_program() {
        let err = output_with_timeout(
            Command::new("/nonexistent/slurm-account-usage-test"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }), "{:?}", err);
    }
}
