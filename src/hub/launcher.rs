//! Spoke launchers.
//!
//! A launcher starts one spoke and hands back both halves of its transport.
//! [`InProcessLauncher`] runs the spoke on a blocking thread over bounded
//! channels; [`ProcessLauncher`] runs it as a child process speaking
//! newline-delimited JSON over stdin/stdout.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::messages::{SpokeRequest, SpokeResponse};
use super::spoke::{run_spoke, SpokeSummary};
use super::transport::{channel, FrameSink, FrameSource, LineSink, LineSource, TransportError};

/// Frames buffered per direction for in-process spokes.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Argument that switches the `heap_compare` binary into spoke mode.
pub const SPOKE_SUBCOMMAND: &str = "spoke";

/// Whatever keeps a running spoke alive.
#[derive(Debug)]
pub enum SpokeHandle {
    /// Spoke running as a task in this process.
    Task(JoinHandle<Result<SpokeSummary, TransportError>>),
    /// Spoke running as a child process.
    Process(Child),
    /// Nothing to clean up.
    Detached,
}

/// A launched spoke: both transport halves plus its handle.
pub struct SpokeConnection {
    /// Hub → spoke frames.
    pub sink: Box<dyn FrameSink<SpokeRequest>>,
    /// Spoke → hub frames.
    pub source: Box<dyn FrameSource<SpokeResponse>>,
    /// Lifetime handle.
    pub handle: SpokeHandle,
}

impl std::fmt::Debug for SpokeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpokeConnection")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl SpokeConnection {
    /// Bundle a connection.
    pub fn new(
        sink: Box<dyn FrameSink<SpokeRequest>>,
        source: Box<dyn FrameSource<SpokeResponse>>,
        handle: SpokeHandle,
    ) -> Self {
        Self { sink, source, handle }
    }
}

impl SpokeHandle {
    /// Stop the spoke.
    ///
    /// Transport halves must be dropped first. A task spoke then fails its
    /// next send and exits on its own; a child process is killed and reaped.
    pub async fn terminate(self, index: usize) {
        match self {
            SpokeHandle::Task(handle) => {
                if handle.is_finished() {
                    match handle.await {
                        Ok(Ok(summary)) => tracing::debug!(spoke = index, matches = summary.matches, "spoke exited"),
                        Ok(Err(e)) => tracing::debug!(spoke = index, error = %e, "spoke exited with transport error"),
                        Err(e) => tracing::error!(spoke = index, error = %e, "spoke task failed"),
                    }
                }
            }
            SpokeHandle::Process(mut child) => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(spoke = index, error = %e, "spoke process already gone");
                }
                match child.wait().await {
                    Ok(status) => tracing::debug!(spoke = index, status = %status, "spoke process reaped"),
                    Err(e) => tracing::error!(spoke = index, error = %e, "failed to reap spoke process"),
                }
            }
            SpokeHandle::Detached => {}
        }
    }
}

/// Starts spokes for the hub.
#[async_trait]
pub trait SpokeLauncher: Send + Sync {
    /// Start spoke number `index`.
    async fn launch(&self, index: usize) -> Result<SpokeConnection, TransportError>;
}

/// Runs spokes on tokio's blocking pool over bounded channels.
#[derive(Debug, Clone)]
pub struct InProcessLauncher {
    capacity: usize,
}

impl Default for InProcessLauncher {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl InProcessLauncher {
    /// Launcher with a custom per-direction channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl SpokeLauncher for InProcessLauncher {
    async fn launch(&self, index: usize) -> Result<SpokeConnection, TransportError> {
        let runtime = Handle::try_current().map_err(|e| TransportError::Spawn(e.to_string()))?;
        let (request_sink, request_source) = channel::<SpokeRequest>(self.capacity);
        let (response_sink, response_source) = channel::<SpokeResponse>(self.capacity);

        // Scoring is CPU-bound; keep it off the async workers.
        let handle = tokio::task::spawn_blocking(move || {
            runtime.block_on(run_spoke(request_source, response_sink))
        });
        tracing::debug!(spoke = index, "in-process spoke started");

        Ok(SpokeConnection::new(
            Box::new(request_sink),
            Box::new(response_source),
            SpokeHandle::Task(handle),
        ))
    }
}

/// Runs each spoke as a child process.
///
/// The child must speak the protocol as newline-delimited JSON on
/// stdin/stdout; `heap_compare spoke` does.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessLauncher {
    /// Launch `program spoke`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![OsString::from(SPOKE_SUBCOMMAND)],
        }
    }

    /// Launch the running executable in spoke mode.
    pub fn current_exe() -> Result<Self, TransportError> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Replace the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl SpokeLauncher for ProcessLauncher {
    async fn launch(&self, index: usize) -> Result<SpokeConnection, TransportError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Spawn(format!("{}: {e}", self.program.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("spoke stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("spoke stdout not captured".to_string()))?;

        tracing::debug!(spoke = index, pid = child.id(), "spoke process started");

        Ok(SpokeConnection::new(
            Box::new(LineSink::new(stdin)),
            Box::new(LineSource::new(BufReader::new(stdout))),
            SpokeHandle::Process(child),
        ))
    }
}
