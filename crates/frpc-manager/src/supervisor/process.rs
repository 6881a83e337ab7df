//! Lifecycle management for the single frpc process.
//!
//! The supervisor owns at most one running process. `start` materializes the
//! persisted configuration and spawns frpc; `stop` only requests termination.
//! Exit, error and output events arrive asynchronously and are applied by one
//! event loop, so callers poll [`Supervisor::status`] to observe them.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::process::Command;
use tokio::sync::{Mutex, mpsc};

use super::error::SupervisorError;
use super::events::{ProcessEvent, StopSignal, pump_output, watch_process};
use super::logs::{LogBuffer, LogSource, MAX_LOG_LINES};
use super::status::{ErrorRecord, ExitRecord, ProcessStatus, StatusWithConnection};
use crate::config::{ConfigOverrides, ConfigStore};
use crate::materialize::GeneratedFiles;
use crate::probe::{self, ConnectionProbeResult, DEFAULT_PROBE_TIMEOUT};

/// Capacity of the channel carrying process events to the event loop.
const EVENT_BUFFER_SIZE: usize = 1024;

/// Interval between checks while waiting for the process to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settings for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Executable used when the document does not name one.
    pub default_executable: Option<String>,
    /// Where the generated renderings are written.
    pub generated: GeneratedFiles,
    /// Maximum number of retained log lines.
    pub log_capacity: usize,
    /// Time allowed for the server reachability probe.
    pub probe_timeout: Duration,
    /// How long `shutdown` waits after SIGTERM before killing.
    pub shutdown_grace: Duration,
}

impl SupervisorConfig {
    pub fn new(generated: GeneratedFiles) -> Self {
        Self {
            default_executable: None,
            generated,
            log_capacity: MAX_LOG_LINES,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            shutdown_grace: Duration::from_secs(5),
        }
    }

    pub fn with_default_executable(mut self, path: Option<String>) -> Self {
        self.default_executable = path.filter(|p| !p.trim().is_empty());
        self
    }
}

/// The running process as seen by the supervisor.
#[derive(Debug)]
struct ManagedProcess {
    pid: u32,
    started_at: DateTime<Utc>,
    control: mpsc::UnboundedSender<StopSignal>,
}

#[derive(Debug)]
struct SupervisorState {
    process: Option<ManagedProcess>,
    last_exit: Option<ExitRecord>,
    last_error: Option<ErrorRecord>,
    logs: LogBuffer,
}

impl SupervisorState {
    fn new(log_capacity: usize) -> Self {
        Self {
            process: None,
            last_exit: None,
            last_error: None,
            logs: LogBuffer::new(log_capacity),
        }
    }

    fn snapshot(&self) -> ProcessStatus {
        ProcessStatus {
            running: self.process.is_some(),
            pid: self.process.as_ref().map(|p| p.pid),
            started_at: self.process.as_ref().map(|p| p.started_at),
            last_exit: self.last_exit.clone(),
            last_error: self.last_error.clone(),
            logs: self.logs.snapshot(),
        }
    }

    fn record_error(&mut self, message: String) {
        self.logs
            .append(LogSource::System, &format!("frpc process error: {message}"));
        self.last_error = Some(ErrorRecord {
            message,
            timestamp: Utc::now(),
        });
    }

    /// Forward `signal` to the watcher of the running process, if any.
    fn request_stop(&mut self, signal: StopSignal) {
        let Some(process) = self.process.as_ref() else {
            return;
        };
        let pid = process.pid;
        if process.control.send(signal).is_err() {
            warn!("frpc (PID {}) watcher is gone, cannot deliver {:?}", pid, signal);
            return;
        }
        let line = match signal {
            StopSignal::Terminate => "Sent termination signal to frpc",
            StopSignal::Kill => "Sent kill signal to frpc",
        };
        info!("{} (PID {})", line, pid);
        self.logs.append(LogSource::System, line);
    }

    fn apply(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Output { source, chunk } => self.logs.append(source, &chunk),
            ProcessEvent::Failed { pid, message } => {
                error!("frpc (PID {}) error: {}", pid, message);
                self.record_error(message);
            }
            ProcessEvent::Exited { pid, code, signal } => {
                info!(
                    "frpc (PID {}) exited with code {:?} signal {:?}",
                    pid, code, signal
                );
                self.logs.append(
                    LogSource::System,
                    &format!(
                        "frpc exited with code {} signal {}",
                        code.map_or_else(|| "null".to_string(), |c| c.to_string()),
                        signal.as_deref().unwrap_or("null")
                    ),
                );
                self.last_exit = Some(ExitRecord {
                    exit_code: code,
                    signal,
                    timestamp: Utc::now(),
                });
                if self.process.as_ref().is_some_and(|p| p.pid == pid) {
                    self.process = None;
                } else {
                    debug!("Exit event for PID {} does not own the slot", pid);
                }
            }
        }
    }
}

/// Supervisor for a single frpc process.
///
/// Cloning is cheap; clones share the same process slot and history.
#[derive(Clone)]
pub struct Supervisor {
    state: Arc<Mutex<SupervisorState>>,
    store: Arc<dyn ConfigStore>,
    config: Arc<SupervisorConfig>,
    events: mpsc::Sender<ProcessEvent>,
}

impl Supervisor {
    /// Create a supervisor and start its event loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(store: Arc<dyn ConfigStore>, config: SupervisorConfig) -> Self {
        let state = Arc::new(Mutex::new(SupervisorState::new(config.log_capacity)));
        let (events, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        tokio::spawn(run_event_loop(Arc::clone(&state), rx));
        Self {
            state,
            store,
            config: Arc::new(config),
            events,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub fn generated_files(&self) -> &GeneratedFiles {
        &self.config.generated
    }

    /// Materialize the configuration and spawn frpc.
    ///
    /// `overrides`, when given, are merged into the persisted document and
    /// saved before anything else happens. Spawn failures are recorded in the
    /// returned status rather than returned as errors.
    pub async fn start(
        &self,
        overrides: Option<ConfigOverrides>,
    ) -> Result<ProcessStatus, SupervisorError> {
        let mut state = self.state.lock().await;
        if let Some(process) = state.process.as_ref() {
            return Err(SupervisorError::AlreadyRunning { pid: process.pid });
        }

        let base = self.store.load().await?;
        let doc = match overrides {
            Some(overrides) => self.store.save(overrides.apply_to(base)).await?,
            None => base,
        };
        doc.validate().map_err(SupervisorError::Configuration)?;

        let executable = doc
            .executable()
            .or(self.config.default_executable.as_deref())
            .map(str::to_string)
            .ok_or_else(|| {
                SupervisorError::Configuration("frpc executable path is not configured".to_string())
            })?;

        let files = &self.config.generated;
        files
            .write(&doc)
            .await
            .map_err(SupervisorError::Materialize)?;

        info!(
            "Starting frpc ({}) with config {}",
            executable,
            files.ini_path.display()
        );
        state.logs.append(
            LogSource::System,
            &format!(
                "Starting frpc ({}) with config {}",
                executable,
                files.ini_path.display()
            ),
        );

        let mut cmd = Command::new(&executable);
        cmd.arg("-c")
            .arg(&files.ini_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir(&executable) {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn frpc ({}): {:?}", executable, e);
                state.record_error(e.to_string());
                return Ok(state.snapshot());
            }
        };
        let Some(pid) = child.id() else {
            state.record_error("frpc exited before a PID was assigned".to_string());
            return Ok(state.snapshot());
        };

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_output(
                stdout,
                LogSource::Stdout,
                self.events.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_output(
                stderr,
                LogSource::Stderr,
                self.events.clone(),
            )));
        }

        let (control, control_rx) = mpsc::unbounded_channel();
        tokio::spawn(watch_process(
            child,
            pid,
            control_rx,
            pumps,
            self.events.clone(),
        ));

        state.process = Some(ManagedProcess {
            pid,
            started_at: Utc::now(),
            control,
        });
        info!("frpc spawned with PID {}", pid);
        Ok(state.snapshot())
    }

    /// Request termination of the running process.
    ///
    /// Returns immediately; the process is cleared once its exit is observed.
    pub async fn stop(&self) -> ProcessStatus {
        let mut state = self.state.lock().await;
        state.request_stop(StopSignal::Terminate);
        state.snapshot()
    }

    pub async fn status(&self) -> ProcessStatus {
        self.state.lock().await.snapshot()
    }

    /// Status plus a fresh probe of the server in the persisted configuration.
    pub async fn status_with_connection(&self) -> StatusWithConnection {
        let status = self.status().await;
        let server_connection = match self.store.load().await {
            Ok(doc) => probe::probe_config(&doc, self.config.probe_timeout).await,
            Err(e) => {
                warn!("Cannot load config for server probe: {}", e);
                ConnectionProbeResult::failed(e.to_string())
            }
        };
        StatusWithConnection {
            status,
            server_connection,
        }
    }

    pub async fn clear_logs(&self) -> ProcessStatus {
        let mut state = self.state.lock().await;
        state.logs.clear();
        state.snapshot()
    }

    /// Stop the process and wait for its exit, killing it after the grace period.
    pub async fn shutdown(&self) -> ProcessStatus {
        if !self.status().await.running {
            return self.status().await;
        }

        self.stop().await;
        if self.wait_for_exit(self.config.shutdown_grace).await {
            return self.status().await;
        }

        warn!(
            "frpc did not exit within {:?}, killing it",
            self.config.shutdown_grace
        );
        self.state.lock().await.request_stop(StopSignal::Kill);
        if !self.wait_for_exit(Duration::from_secs(5)).await {
            warn!("Timeout waiting for frpc to exit after kill");
        }
        self.status().await
    }

    /// Wait until no process is running. Returns `false` on timeout.
    pub async fn wait_for_exit(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            if !self.status_running().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    async fn status_running(&self) -> bool {
        self.state.lock().await.process.is_some()
    }
}

async fn run_event_loop(state: Arc<Mutex<SupervisorState>>, mut rx: mpsc::Receiver<ProcessEvent>) {
    while let Some(event) = rx.recv().await {
        state.lock().await.apply(event);
    }
    debug!("Supervisor event loop ended");
}

/// Directory containing the executable, if the path names one.
fn working_dir(executable: &str) -> Option<PathBuf> {
    Path::new(executable)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
}
