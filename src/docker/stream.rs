use std::io::BufRead;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};

use crate::error::RunError;

use super::types::{LogLine, StreamEnd};

/// Follow a container's log stream and return a channel of its lines.
///
/// The caller receives [`LogLine::Stdout`]/[`LogLine::Stderr`] as they
/// arrive, followed by exactly one [`LogLine::Done`] once the container has
/// exited and the stream closed. There is deliberately no timeout: the model
/// run's wall-clock duration is the model's concern.
pub(super) fn follow_logs(binary: &str, container: &str) -> Result<Receiver<LogLine>, RunError> {
    let mut child = Command::new(binary)
        .args(["logs", "--follow", container])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let (tx, rx) = mpsc::channel();
    let binary = binary.to_string();
    let container = container.to_string();

    std::thread::spawn(move || {
        // One reader thread per pipe; both feed the single ordered channel.
        let tx_out = tx.clone();
        let stdout_handle = std::thread::spawn(move || {
            let reader = std::io::BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    // Receiver may be dropped — ignore send errors.
                    Ok(l) => {
                        let _ = tx_out.send(LogLine::Stdout(l));
                    }
                    Err(_) => break,
                }
            }
        });

        let tx_err = tx.clone();
        let stderr_handle = std::thread::spawn(move || {
            let reader = std::io::BufReader::new(stderr);
            for line in reader.lines() {
                match line {
                    Ok(l) => {
                        let _ = tx_err.send(LogLine::Stderr(l));
                    }
                    Err(_) => break,
                }
            }
        });

        let _ = stdout_handle.join();
        let _ = stderr_handle.join();
        let followed_ok = child.wait().map(|s| s.success()).unwrap_or(false);

        let exit_code = if followed_ok {
            container_exit_code(&binary, &container)
        } else {
            None
        };
        let _ = tx.send(LogLine::Done(StreamEnd { exit_code }));
    });

    Ok(rx)
}

/// Exit code of a stopped container, if it can still be inspected.
fn container_exit_code(binary: &str, container: &str) -> Option<i32> {
    let output = Command::new(binary)
        .args(["inspect", "--format", "{{.State.ExitCode}}", container])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}
