//! xz decoding: `xzcat` fast path and the in-process fallback.

use std::fs::File;
use std::io::{self, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// In-process decoder. Handles concatenated streams the same way `xzcat` does.
pub(super) fn in_process(file: File) -> xz2::read::XzDecoder<File> {
    xz2::read::XzDecoder::new_multi_decoder(file)
}

/// Decompressed bytes read from an `xzcat` child fed with the image file.
///
/// Reaching end of stream waits for the child and turns a non-zero exit into an error
/// carrying whatever the tool printed on stderr, so truncated or corrupt input is not
/// mistaken for a short image. Dropping the stream early closes the pipe and reaps the
/// child on a background thread, killing it if it does not exit within the reap timeout.
pub(super) struct XzcatStream {
    program: String,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    child: Option<Child>,
    reap_timeout: Duration,
}

impl XzcatStream {
    pub(super) fn spawn(program: &str, file: &File, reap_timeout: Duration) -> io::Result<Self> {
        let stdin = file.try_clone()?;
        let mut child = Command::new(program)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} pipes were not captured", program),
            ));
        };
        log::debug!("spawned {} (pid {})", program, child.id());
        Ok(Self {
            program: program.to_string(),
            stdout: Some(stdout),
            stderr: Some(drain(stderr)),
            child: Some(child),
            reap_timeout,
        })
    }

    fn finish(&mut self) -> io::Result<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = match child.wait_timeout(self.reap_timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} did not exit after end of stream", self.program),
                ));
            }
            Err(err) => {
                reap_in_background(child, self.program.clone(), self.reap_timeout);
                return Err(err);
            }
        };
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let stderr = stderr.trim();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", self.program, status)
            } else {
                format!("{} exited with {}: {}", self.program, status, stderr)
            };
            return Err(io::Error::new(io::ErrorKind::InvalidData, message));
        }
        Ok(())
    }
}

impl Read for XzcatStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(0);
        };
        let n = stdout.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.finish()?;
        }
        Ok(n)
    }
}

impl Drop for XzcatStream {
    fn drop(&mut self) {
        // Close our end first so a child blocked on a full pipe sees EPIPE and exits.
        self.stdout = None;
        if let Some(child) = self.child.take() {
            reap_in_background(child, self.program.clone(), self.reap_timeout);
        }
    }
}

/// Collect stderr on a helper thread so a chatty child cannot stall on a full pipe.
fn drain(mut stderr: ChildStderr) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    })
}

fn reap_in_background(mut child: Child, program: String, timeout: Duration) {
    let pid = child.id();
    let spawned = thread::Builder::new()
        .name(format!("{}-reaper", program))
        .spawn(move || match child.wait_timeout(timeout) {
            Ok(Some(status)) => log::debug!("{} (pid {}) exited with {}", program, pid, status),
            Ok(None) => {
                log::warn!(
                    "{} (pid {}) still running {}s after close, killing it",
                    program,
                    pid,
                    timeout.as_secs()
                );
                let _ = child.kill();
                let _ = child.wait();
            }
            Err(err) => log::warn!("failed to wait for {} (pid {}): {}", program, pid, err),
        });
    if let Err(err) = spawned {
        log::warn!("could not start reaper for pid {}: {}", pid, err);
    }
}
