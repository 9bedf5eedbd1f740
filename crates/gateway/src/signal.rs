//! Cross-process "desired state changed" signal.
//!
//! The control process connects to the bot's Unix socket and writes one JSON
//! event per line. The listener only raises a [`DesiredStateFlag`]; the bot's
//! periodic tick picks it up, so any number of signals between two ticks
//! collapse into one reconciliation pass.

use std::{
    io,
    os::unix::fs::FileTypeExt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    serde::{Deserialize, Serialize},
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::{UnixListener, UnixStream},
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::error::{Error, Result};

/// Process-wide "membership changed, reconcile soon" flag.
#[derive(Debug, Clone, Default)]
pub struct DesiredStateFlag(Arc<AtomicBool>);

impl DesiredStateFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Read and clear the flag.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Events accepted on the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlEvent {
    RecheckDesiredState,
}

/// Bound control socket of the bot process.
///
/// The socket file is removed when the listener is dropped.
pub struct SignalListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SignalListener {
    /// Bind `path`, replacing a stale socket left by a previous run.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        prepare_socket(&path).map_err(|source| Error::socket(&path, source))?;
        let listener = UnixListener::bind(&path).map_err(|source| Error::socket(&path, source))?;
        info!(path = %path.display(), "control socket listening");
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the accept loop on its own task until `shutdown` fires.
    pub fn spawn(self, flag: DesiredStateFlag, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(flag, shutdown))
    }

    pub async fn run(self, flag: DesiredStateFlag, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        tokio::spawn(read_events(stream, flag.clone()));
                    },
                    Err(error) => warn!(error = %error, "control socket accept failed"),
                },
            }
        }
        debug!(path = %self.path.display(), "control socket listener stopped");
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %error, "control socket cleanup failed");
        }
    }
}

/// Make `path` bindable. A socket nobody answers on is stale and removed; a
/// live socket or any other file is left alone and reported.
fn prepare_socket(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(error),
    };
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a socket",
        ));
    }
    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            "another bot is already listening",
        ));
    }
    info!(path = %path.display(), "removing stale control socket");
    std::fs::remove_file(path)
}

async fn read_events(stream: UnixStream, flag: DesiredStateFlag) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => handle_line(&line, &flag),
            Ok(None) => break,
            Err(error) => {
                warn!(error = %error, "control connection read failed");
                break;
            },
        }
    }
}

fn handle_line(line: &str, flag: &DesiredStateFlag) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<ControlEvent>(line) {
        Ok(ControlEvent::RecheckDesiredState) => {
            flag.raise();
            debug!("desired state recheck requested");
        },
        Err(error) => warn!(error = %error, "dropping malformed control event"),
    }
}

/// Delivers recheck events to the bot process, if one is configured.
#[derive(Debug, Clone, Default)]
pub struct SignalRaiser {
    target: Option<PathBuf>,
}

impl SignalRaiser {
    /// `None` makes [`raise`](Self::raise) a no-op.
    pub fn new(target: Option<PathBuf>) -> Self {
        Self { target }
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// Send one recheck event. Returns `false` when no target is configured.
    pub async fn raise(&self) -> Result<bool> {
        let Some(path) = self.target.as_deref() else {
            debug!("no control socket configured, recheck not delivered");
            return Ok(false);
        };
        let mut line = serde_json::to_string(&ControlEvent::RecheckDesiredState)?;
        line.push('\n');

        let mut stream = UnixStream::connect(path)
            .await
            .map_err(|source| Error::socket(path, source))?;
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|source| Error::socket(path, source))?;
        stream
            .shutdown()
            .await
            .map_err(|source| Error::socket(path, source))?;

        info!(path = %path.display(), "recheck signal delivered");
        Ok(true)
    }
}
