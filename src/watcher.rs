//! Polling file watcher based on content digests.
//!
//! A `HashWatcher` owns one file. A single background task sleeps for the poll
//! interval, re-hashes the file, and when the SHA-256 digest differs from the
//! stored one it updates the digest and awaits every registered listener in
//! registration order. Read failures while polling are logged and skipped, so
//! a briefly unreadable file never reports a change.
//!
//! Stopping only cancels the sleep between polls. A notification that is
//! already running completes, which lets a listener stop and restart the
//! watcher from inside its own callback.

use std::fs::File;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use sha2::{Digest as _, Sha256};
use tokio::sync::watch;

use crate::error::HashError;

/// SHA-256 digest of a file's content.
pub type Digest = [u8; 32];

/// Callback awaited on the watcher task after a change is detected.
pub type ChangeListener = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Watches a single file for content changes.
///
/// Cloning is cheap and every clone controls the same watcher.
#[derive(Clone)]
pub struct HashWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    path: PathBuf,
    interval: Duration,
    digest: Mutex<Digest>,
    listeners: RwLock<Vec<ChangeListener>>,
    /// Cancellation sender of the current polling task, `None` while stopped
    run: Mutex<Option<watch::Sender<bool>>>,
}

impl HashWatcher {
    /// Create a watcher, hashing the file immediately.
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Result<Self, HashError> {
        let path = path.into();
        let digest = hash_file(&path)?;
        Ok(Self {
            inner: Arc::new(WatcherInner {
                path,
                interval,
                digest: Mutex::new(digest),
                listeners: RwLock::new(Vec::new()),
                run: Mutex::new(None),
            }),
        })
    }

    /// Register a listener. Listeners run in registration order.
    pub fn add_listener<F, Fut>(&self, listener: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener: ChangeListener = Arc::new(move || listener().boxed());
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Start polling. Does nothing if already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut run = self.inner.run.lock().unwrap_or_else(PoisonError::into_inner);
        if run.is_some() {
            return;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        *run = Some(cancel_tx);

        tracing::info!(
            path = %self.inner.path.display(),
            interval_ms = self.inner.interval.as_millis() as u64,
            "Watching file for changes"
        );
        tokio::spawn(poll_loop(Arc::clone(&self.inner), cancel_rx));
    }

    /// Stop polling. Does nothing if already stopped.
    ///
    /// Returns without waiting for the polling task, so it is safe to call
    /// from a listener.
    pub fn stop(&self) {
        let cancel = self
            .inner
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            let _ = cancel.send(true);
            tracing::info!(path = %self.inner.path.display(), "Stopped watching file");
        }
    }

    /// Whether a polling task is active.
    pub fn is_running(&self) -> bool {
        self.inner
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Digest of the file as of the last successful check.
    pub fn digest(&self) -> Digest {
        *self.inner.digest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-hash the file now and notify listeners if it changed.
    ///
    /// Returns whether a change was detected.
    pub async fn check(&self) -> Result<bool, HashError> {
        self.inner.check().await
    }
}

impl std::fmt::Debug for HashWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashWatcher")
            .field("path", &self.inner.path)
            .field("interval", &self.inner.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

impl WatcherInner {
    async fn check(&self) -> Result<bool, HashError> {
        let path = self.path.clone();
        let new_digest = tokio::task::spawn_blocking(move || hash_file(&path))
            .await
            .map_err(|_| HashError::Task {
                path: self.path.clone(),
            })??;

        let changed = {
            let mut digest = self.digest.lock().unwrap_or_else(PoisonError::into_inner);
            if *digest == new_digest {
                false
            } else {
                *digest = new_digest;
                true
            }
        };

        if changed {
            tracing::info!(path = %self.path.display(), "File change detected");
            let listeners = self
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for listener in listeners {
                listener().await;
            }
        }

        Ok(changed)
    }
}

async fn poll_loop(inner: Arc<WatcherInner>, mut cancel: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = tokio::time::sleep(inner.interval) => {}
        }
        if *cancel.borrow() {
            break;
        }

        if let Err(e) = inner.check().await {
            tracing::warn!(error = %e, "Skipping file check");
        }
    }
    tracing::debug!(path = %inner.path.display(), "Watcher task exited");
}

/// Compute the SHA-256 digest of a file's content.
pub fn hash_file(path: &Path) -> Result<Digest, HashError> {
    let to_error = |source| HashError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(to_error)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(to_error)?;
    Ok(hasher.finalize().into())
}
