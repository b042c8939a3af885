use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use log::warn;

use crate::error::{Result, ShaderError};

const READ_BUFFER_SIZE: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_millis(5);
/// how long output is still collected once the child has been killed
const DRAIN_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed or ended by a signal
    pub exit_code: Option<i32>,
    /// stdout and stderr, interleaved as written
    pub captured: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs external programs on behalf of the compile driver.
pub trait ProcessRunner: Sync {
    fn run(&self, program: &Path, args: &[String], timeout: Option<Duration>)
    -> Result<ProcessOutput>;
}

/// Spawns a real child process with stdout and stderr sharing one pipe.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessRunner;

impl ProcessRunner for OsProcessRunner {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput> {
        let spawn_error = |source| ShaderError::Spawn {
            program: program.to_path_buf(),
            source,
        };

        let (mut reader, writer) = std::io::pipe().map_err(spawn_error)?;
        let error_writer = writer.try_clone().map_err(spawn_error)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(error_writer);

        let mut child = command.spawn().map_err(spawn_error)?;
        // the command holds the parent's copies of the write end;
        // the reader only sees EOF once they are closed
        drop(command);

        // grandchildren may inherit the write end and keep the pipe open after
        // the child exits, so the reader is detached and only waited on until a deadline
        let (sender, receiver) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buffer = [0; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        if sender.send(buffer[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });

        let started = Instant::now();
        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child.try_wait().map_err(spawn_error)? {
                break status;
            }

            if timeout.is_some_and(|timeout| started.elapsed() >= timeout) {
                warn!("{} timed out, killing it", program.display());
                timed_out = true;
                // the child may exit between try_wait and kill
                let _ = child.kill();
                break child.wait().map_err(spawn_error)?;
            }

            std::thread::sleep(POLL_INTERVAL);
        };

        let grace = Instant::now() + DRAIN_GRACE;
        let drain_deadline = match timeout {
            _ if timed_out => Some(grace),
            Some(timeout) => Some((started + timeout).max(grace)),
            None => None,
        };
        let captured = collect_output(&receiver, drain_deadline);

        Ok(ProcessOutput {
            exit_code: status.code(),
            captured: String::from_utf8_lossy(&captured).into_owned(),
            timed_out,
        })
    }
}

/// Collects chunks until the reader hangs up, or until the deadline passes.
fn collect_output(receiver: &Receiver<Vec<u8>>, deadline: Option<Instant>) -> Vec<u8> {
    let mut captured = vec![];
    loop {
        let chunk = match deadline {
            None => receiver.recv().ok(),
            Some(deadline) => receiver
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .ok(),
        };

        match chunk {
            Some(chunk) => captured.extend_from_slice(&chunk),
            None => break,
        }
    }
    captured
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Option<Duration>) -> ProcessOutput {
        let args = vec!["-c".to_string(), script.to_string()];
        OsProcessRunner
            .run(Path::new("sh"), &args, timeout)
            .unwrap()
    }

    #[test]
    fn silent_success() {
        let output = sh("exit 0", None);
        assert!(output.success());
        assert_eq!(output.captured, "");
    }

    #[test]
    fn captures_stdout_and_stderr() {
        let output = sh("echo out; echo err 1>&2; exit 3", None);
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert!(output.captured.contains("out\n"));
        assert!(output.captured.contains("err\n"));
    }

    #[test]
    fn kills_after_timeout() {
        let output = sh("sleep 5", Some(Duration::from_millis(100)));
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[test]
    fn timeout_is_not_held_up_by_grandchildren() {
        // `sleep` runs as a child of the shell and keeps the pipe open after the shell is killed
        let started = Instant::now();
        let output = sh("sleep 4; true", Some(Duration::from_millis(100)));

        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn background_processes_do_not_outlive_the_timeout() {
        let started = Instant::now();
        let output = sh("sleep 4 & echo done", Some(Duration::from_millis(500)));

        assert!(!output.timed_out);
        assert_eq!(output.exit_code, Some(0));
        assert!(output.captured.contains("done"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn missing_program() {
        let err = OsProcessRunner
            .run(Path::new("definitely-not-a-shader-compiler"), &[], None)
            .unwrap_err();
        assert!(matches!(err, ShaderError::Spawn { .. }));
    }
}
