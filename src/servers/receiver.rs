//! UNIX socket listener for VCAM producers.
//!
//! Connections are served one at a time: the next `accept` only happens once
//! the current session has terminated.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UnixListener;

use crate::config::ReceiverConfig;
use crate::session::{Reporter, Session, SessionEnd};

/// Pause after a failed `accept` (e.g. EMFILE) before trying again.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct Receiver {
    listener: UnixListener,
    path: PathBuf,
    read_chunk_size: usize,
}

impl Receiver {
    /// Bind the listening socket described by `config`.
    pub fn bind(config: &ReceiverConfig) -> Result<Self> {
        config.validate()?;
        let path = config.socket_path.clone();

        if config.remove_stale_socket {
            remove_socket_file(&path)
                .with_context(|| format!("Cannot remove stale socket: {}", path.display()))?;
        }

        let listener = UnixListener::bind(&path)
            .with_context(|| format!("Cannot bind socket: {}", path.display()))?;
        tracing::info!("[receiver] [listening] path={}", path.display());

        Ok(Self {
            listener,
            path,
            read_chunk_size: config.read_chunk_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve connections until `shutdown` resolves. Returns the number of sessions served.
    ///
    /// A session that ends in a fault never stops the loop; neither does a
    /// failed `accept`. Shutdown is only observed between sessions.
    pub async fn serve<P, F>(&self, reporter: &mut P, shutdown: F) -> u64
    where
        P: Reporter + ?Sized,
        F: Future,
    {
        tokio::pin!(shutdown);
        let mut sessions: u64 = 0;

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            let stream = match accepted {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    tracing::warn!("[receiver] [accept_failed] {}", e);
                    if !retry_pause(shutdown.as_mut()).await {
                        break;
                    }
                    continue;
                }
            };

            sessions += 1;
            let outcome = Session::with_chunk_size(stream, self.read_chunk_size)
                .run(reporter)
                .await;
            match &outcome.end {
                SessionEnd::Disconnected(_) => tracing::debug!(
                    "[receiver] [session_closed] session={} frames={}",
                    sessions,
                    outcome.frames
                ),
                SessionEnd::Faulted(err) => tracing::debug!(
                    "[receiver] [session_dropped] session={} frames={} reason={}",
                    sessions,
                    outcome.frames,
                    err
                ),
            }
        }

        tracing::info!("[receiver] [stopped] sessions={}", sessions);
        sessions
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        if let Err(e) = remove_socket_file(&self.path) {
            tracing::warn!("[receiver] [cleanup_failed] path={} {}", self.path.display(), e);
        }
    }
}

/// Sleep for [`ACCEPT_RETRY_DELAY`]. Returns false if `shutdown` fired first.
async fn retry_pause<F: Future>(shutdown: Pin<&mut F>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown => false,
        _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => true,
    }
}

fn remove_socket_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
