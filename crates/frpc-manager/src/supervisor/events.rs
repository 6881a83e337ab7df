//! Events emitted by a running frpc process and the tasks that produce them.
//!
//! Each spawned process gets one watcher task owning the [`Child`] and one
//! pump task per output stream. They only send [`ProcessEvent`]s; the
//! supervisor's event loop is the single place that applies them.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::logs::LogSource;

/// How long the watcher waits for buffered output after the process exits.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of output from one of the process's streams.
    Output { source: LogSource, chunk: String },
    /// The process ended.
    Exited {
        pid: u32,
        code: Option<i32>,
        signal: Option<String>,
    },
    /// The OS reported an error for the process.
    Failed { pid: u32, message: String },
}

/// Requests the supervisor can send to a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Polite termination (SIGTERM on Unix).
    Terminate,
    /// Forced kill.
    Kill,
}

/// Read `reader` line by line and forward each line as an output event.
pub(crate) async fn pump_output<R>(reader: R, source: LogSource, events: mpsc::Sender<ProcessEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let chunk = String::from_utf8_lossy(&buf).into_owned();
                trace!("frpc {}: {}", source, chunk.trim_end());
                if events
                    .send(ProcessEvent::Output { source, chunk })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                debug!("frpc {} reader stopped: {:?}", source, e);
                break;
            }
        }
    }
}

/// Own `child` until it exits, applying stop requests along the way.
///
/// Always finishes with exactly one [`ProcessEvent::Exited`] for `pid`.
pub(crate) async fn watch_process(
    mut child: Child,
    pid: u32,
    mut control: mpsc::UnboundedReceiver<StopSignal>,
    pumps: Vec<JoinHandle<()>>,
    events: mpsc::Sender<ProcessEvent>,
) {
    enum Wake {
        Exited(io::Result<ExitStatus>),
        Stop(StopSignal),
    }

    let status = loop {
        let wake = tokio::select! {
            status = child.wait() => Wake::Exited(status),
            Some(signal) = control.recv() => Wake::Stop(signal),
        };
        match wake {
            Wake::Exited(status) => break status,
            Wake::Stop(signal) => {
                if let Err(e) = send_signal(&mut child, pid, signal) {
                    warn!("Failed to signal frpc (PID {}): {:?}", pid, e);
                    let _ = events
                        .send(ProcessEvent::Failed {
                            pid,
                            message: e.to_string(),
                        })
                        .await;
                }
            }
        }
    };

    for pump in pumps {
        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, pump).await.is_err() {
            debug!("frpc (PID {}) output still open after exit", pid);
        }
    }

    let (code, signal) = match status {
        Ok(status) => exit_parts(status),
        Err(e) => {
            warn!("Error waiting for frpc (PID {}): {:?}", pid, e);
            let _ = events
                .send(ProcessEvent::Failed {
                    pid,
                    message: e.to_string(),
                })
                .await;
            (None, None)
        }
    };
    let _ = events.send(ProcessEvent::Exited { pid, code, signal }).await;
}

#[cfg(unix)]
fn send_signal(child: &mut Child, pid: u32, signal: StopSignal) -> io::Result<()> {
    match signal {
        StopSignal::Terminate => {
            let pid = libc::pid_t::try_from(pid).map_err(io::Error::other)?;
            // SAFETY: kill(2) has no memory-safety preconditions.
            let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
            if rc == 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
        StopSignal::Kill => child.start_kill(),
    }
}

#[cfg(not(unix))]
fn send_signal(child: &mut Child, _pid: u32, _signal: StopSignal) -> io::Result<()> {
    child.start_kill()
}

fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<String>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        (status.code(), status.signal().map(signal_name))
    }
    #[cfg(not(unix))]
    {
        (status.code(), None)
    }
}

/// Conventional name for a Unix signal number.
#[cfg(unix)]
pub(crate) fn signal_name(signal: i32) -> String {
    let name = match signal {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGILL => "SIGILL",
        libc::SIGABRT => "SIGABRT",
        libc::SIGFPE => "SIGFPE",
        libc::SIGKILL => "SIGKILL",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGALRM => "SIGALRM",
        libc::SIGTERM => "SIGTERM",
        libc::SIGUSR1 => "SIGUSR1",
        libc::SIGUSR2 => "SIGUSR2",
        other => return format!("SIG{other}"),
    };
    name.to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    #[test]
    fn test_signal_name() {
        assert_eq!(signal_name(libc::SIGTERM), "SIGTERM");
        assert_eq!(signal_name(libc::SIGKILL), "SIGKILL");
        assert_eq!(signal_name(200), "SIG200");
    }

    #[tokio::test]
    async fn test_pump_forwards_lines() {
        let (tx, mut rx) = mpsc::channel(16);
        let input: &[u8] = b"one\ntwo\npartial";
        pump_output(input, LogSource::Stderr, tx).await;

        let mut chunks = Vec::new();
        while let Some(event) = rx.recv().await {
            chunks.push(event);
        }
        assert_eq!(
            chunks,
            vec![
                ProcessEvent::Output {
                    source: LogSource::Stderr,
                    chunk: "one\n".to_string()
                },
                ProcessEvent::Output {
                    source: LogSource::Stderr,
                    chunk: "two\n".to_string()
                },
                ProcessEvent::Output {
                    source: LogSource::Stderr,
                    chunk: "partial".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_watch_reports_exit_code() {
        let child = Command::new("sh")
            .args(["-c", "exit 3"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        let (_control_tx, control_rx) = mpsc::unbounded_channel();
        let (tx, mut rx) = mpsc::channel(16);

        watch_process(child, pid, control_rx, Vec::new(), tx).await;

        assert_eq!(
            rx.recv().await,
            Some(ProcessEvent::Exited {
                pid,
                code: Some(3),
                signal: None
            })
        );
    }

    #[tokio::test]
    async fn test_watch_terminates_on_request() {
        let child = Command::new("sleep")
            .arg("60")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (tx, mut rx) = mpsc::channel(16);

        control_tx.send(StopSignal::Terminate).unwrap();
        watch_process(child, pid, control_rx, Vec::new(), tx).await;

        assert_eq!(
            rx.recv().await,
            Some(ProcessEvent::Exited {
                pid,
                code: None,
                signal: Some("SIGTERM".to_string())
            })
        );
    }

    #[tokio::test]
    async fn test_watch_ignores_closed_control_channel() {
        let child = Command::new("sh")
            .args(["-c", "sleep 0.2; exit 0"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        let (control_tx, control_rx) = mpsc::unbounded_channel::<StopSignal>();
        drop(control_tx);
        let (tx, mut rx) = mpsc::channel(16);

        watch_process(child, pid, control_rx, Vec::new(), tx).await;

        assert_eq!(
            rx.recv().await,
            Some(ProcessEvent::Exited {
                pid,
                code: Some(0),
                signal: None
            })
        );
    }
}
