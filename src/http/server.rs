//! HTTPS server lifecycle.
//!
//! A [`WebServer`] owns the listeners, the TLS context and the keystore
//! watcher. `start`, `stop` and `restart` are serialized by one async mutex,
//! so transitions never interleave. Every start builds a fresh TLS context
//! from the current keystore contents and binds fresh sockets; every stop
//! stops the watcher first, then drains the listeners within the configured
//! grace period.
//!
//! The watcher's change listener restarts the server, provided it is still
//! running once the lifecycle lock is held; a change noticed while `stop` was
//! in progress is dropped. If that restart fails,
//! for example because the replacement keystore is malformed, the failure is
//! logged and the server is forced into [`ServerState::Stopped`] rather than
//! serving with a stale context.

use std::fmt;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::RedirectConfig;
use crate::error::{BindError, ServerError};
use crate::http::error_body::ErrorBody;
use crate::http::listener::{create_reusable_listener, resolve};
use crate::http::redirect::create_redirect_router;
use crate::http::tls::load_tls_config;
use crate::routes::{create_router, RouteTable, Routes};
use crate::watcher::HashWatcher;

/// Lifecycle state of a [`WebServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Stopped => write!(f, "STOPPED"),
            ServerState::Starting => write!(f, "STARTING"),
            ServerState::Running => write!(f, "RUNNING"),
        }
    }
}

/// Everything a start needs, fixed at build time.
#[derive(Clone)]
pub(crate) struct ServerSettings {
    pub keystore: PathBuf,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub shutdown_grace: Duration,
    pub poll_interval: Duration,
    pub redirect: Option<RedirectConfig>,
}

impl fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSettings")
            .field("keystore", &self.keystore)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("poll_interval", &self.poll_interval)
            .field("redirect", &self.redirect)
            .finish_non_exhaustive()
    }
}

/// An HTTPS server that restarts itself when its keystore changes.
///
/// Cloning is cheap; every clone controls the same server. Must be used from
/// within a Tokio runtime.
#[derive(Clone)]
pub struct WebServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    settings: ServerSettings,
    routes: Arc<RouteTable>,
    watcher: HashWatcher,
    lifecycle: Mutex<Lifecycle>,
    state: watch::Sender<ServerState>,
}

enum Lifecycle {
    Stopped,
    Running(RunningServer),
}

/// Listeners of one run, swapped out as a whole on restart.
struct RunningServer {
    https: ServingListener,
    redirect: Option<ServingListener>,
}

struct ServingListener {
    addr: SocketAddr,
    handle: Handle,
    task: JoinHandle<()>,
}

impl WebServer {
    /// Hash the keystore and register the restart listener.
    ///
    /// Fails if the keystore cannot be hashed. Nothing is bound until
    /// [`start`](Self::start).
    pub(crate) fn new(
        settings: ServerSettings,
        routes: &Routes,
        error_body: &ErrorBody,
    ) -> Result<Self, ServerError> {
        let watcher = HashWatcher::new(&settings.keystore, settings.poll_interval)?;
        let routes = Arc::new(RouteTable::new(routes, error_body));
        let (state, _) = watch::channel(ServerState::Stopped);

        let inner = Arc::new(ServerInner {
            settings,
            routes,
            watcher,
            lifecycle: Mutex::new(Lifecycle::Stopped),
            state,
        });

        // Weak so the watcher does not keep a dropped server alive
        let server = Arc::downgrade(&inner);
        inner.watcher.add_listener(move || {
            let server = server.clone();
            async move {
                if let Some(inner) = server.upgrade() {
                    WebServer { inner }.on_keystore_changed().await;
                }
            }
        });

        Ok(Self { inner })
    }

    /// Bind the listeners and start serving. Does nothing if running.
    ///
    /// On failure nothing stays bound and the server is `Stopped`.
    pub async fn start(&self) -> Result<(), ServerError> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        self.start_locked(&mut lifecycle).await
    }

    /// Stop serving. Does nothing if stopped.
    ///
    /// In-flight requests get the shutdown grace period to finish before
    /// their connections are closed.
    pub async fn stop(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        self.stop_locked(&mut lifecycle).await;
    }

    /// Stop, then start with a freshly loaded keystore.
    ///
    /// If the start fails the server is left `Stopped` and the error returned.
    pub async fn restart(&self) -> Result<(), ServerError> {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        tracing::info!("Restarting server");
        self.stop_locked(&mut lifecycle).await;
        self.start_locked(&mut lifecycle).await
    }

    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.inner.state.subscribe()
    }

    /// Bound HTTPS address, `None` while stopped.
    ///
    /// Waits for any transition in progress.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.inner.lifecycle.lock().await {
            Lifecycle::Running(running) => Some(running.https.addr),
            Lifecycle::Stopped => None,
        }
    }

    /// Bound HTTP redirect address, `None` while stopped or when no redirect
    /// listener is configured.
    pub async fn redirect_addr(&self) -> Option<SocketAddr> {
        match &*self.inner.lifecycle.lock().await {
            Lifecycle::Running(running) => running.redirect.as_ref().map(|r| r.addr),
            Lifecycle::Stopped => None,
        }
    }

    /// Route prefixes, longest first.
    pub fn routes(&self) -> Vec<String> {
        self.inner.routes.prefixes().map(str::to_string).collect()
    }

    pub fn keystore_watcher(&self) -> &HashWatcher {
        &self.inner.watcher
    }

    /// Restart for a keystore change, but only if still running once the
    /// lifecycle lock is held. A notification that was in flight while the
    /// user stopped the server must not bring it back up.
    async fn on_keystore_changed(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        let keystore = self.inner.settings.keystore.display();
        if !matches!(*lifecycle, Lifecycle::Running(_)) {
            tracing::debug!(%keystore, "Keystore changed while stopped, not restarting");
            return;
        }

        tracing::info!(%keystore, "Keystore changed, restarting server");
        self.stop_locked(&mut lifecycle).await;
        if let Err(e) = self.start_locked(&mut lifecycle).await {
            // start_locked leaves the server stopped with the watcher off
            tracing::error!(error = %e, "Restart failed, server stopped");
        }
    }

    async fn start_locked(&self, lifecycle: &mut Lifecycle) -> Result<(), ServerError> {
        if matches!(lifecycle, Lifecycle::Running(_)) {
            return Ok(());
        }

        self.inner.state.send_replace(ServerState::Starting);
        match self.launch().await {
            Ok(running) => {
                tracing::info!(
                    addr = %running.https.addr,
                    redirect = ?running.redirect.as_ref().map(|r| r.addr),
                    "Server started"
                );
                *lifecycle = Lifecycle::Running(running);
                self.inner.watcher.start();
                self.inner.state.send_replace(ServerState::Running);
                Ok(())
            }
            Err(e) => {
                self.inner.state.send_replace(ServerState::Stopped);
                Err(e)
            }
        }
    }

    async fn stop_locked(&self, lifecycle: &mut Lifecycle) {
        let running = match std::mem::replace(lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(running) => running,
            Lifecycle::Stopped => return,
        };

        self.inner.watcher.stop();
        let addr = running.https.addr;
        running.shutdown(self.inner.settings.shutdown_grace).await;
        self.inner.state.send_replace(ServerState::Stopped);
        tracing::info!(%addr, "Server stopped");
    }

    /// Build the TLS context and bind every socket, then spawn the serving
    /// tasks. Sockets bound before a failure are dropped with the error.
    async fn launch(&self) -> Result<RunningServer, ServerError> {
        let settings = &self.inner.settings;

        let tls = load_tls_config(&settings.keystore, &settings.password)?;

        let https_listener = bind(&settings.host, settings.port).await?;
        let redirect_listener = match &settings.redirect {
            Some(redirect) => Some((
                bind(&settings.host, redirect.port).await?,
                redirect.domain.as_str(),
            )),
            None => None,
        };

        let https = ServingListener::https(
            https_listener,
            tls,
            create_router(Arc::clone(&self.inner.routes)),
        );
        let redirect = redirect_listener.map(|((listener, addr), domain)| {
            ServingListener::http((listener, addr), create_redirect_router(domain))
        });

        Ok(RunningServer { https, redirect })
    }
}

impl fmt::Debug for WebServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebServer")
            .field("settings", &self.inner.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for ServerInner {
    fn drop(&mut self) {
        self.watcher.stop();
        if let Lifecycle::Running(running) = self.lifecycle.get_mut() {
            running.https.handle.shutdown();
            if let Some(redirect) = &running.redirect {
                redirect.handle.shutdown();
            }
        }
    }
}

async fn bind(host: &str, port: u16) -> Result<(TcpListener, SocketAddr), BindError> {
    let requested = resolve(host, port).await?;
    let listener = create_reusable_listener(requested)?;
    let addr = listener
        .local_addr()
        .map_err(|source| BindError::Bind {
            addr: requested,
            source,
        })?;
    Ok((listener, addr))
}

impl ServingListener {
    fn https((listener, addr): (TcpListener, SocketAddr), tls: RustlsConfig, router: Router) -> Self {
        let handle = Handle::new();
        let server = axum_server::tls_rustls::from_tcp_rustls(listener, tls).handle(handle.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = server.serve(router.into_make_service()).await {
                tracing::error!(error = %e, %addr, "HTTPS listener failed");
            }
        });
        Self { addr, handle, task }
    }

    fn http((listener, addr): (TcpListener, SocketAddr), router: Router) -> Self {
        let handle = Handle::new();
        let server = axum_server::from_tcp(listener).handle(handle.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = server.serve(router.into_make_service()).await {
                tracing::error!(error = %e, %addr, "HTTP redirect listener failed");
            }
        });
        Self { addr, handle, task }
    }

    async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, addr = %self.addr, "Listener task ended abnormally");
        }
    }
}

impl RunningServer {
    /// Stop accepting on every listener at once, then wait for each to drain.
    async fn shutdown(self, grace: Duration) {
        let listeners: Vec<_> = std::iter::once(self.https).chain(self.redirect).collect();
        for listener in &listeners {
            listener.handle.graceful_shutdown(Some(grace));
        }
        for listener in listeners {
            listener.join().await;
        }
    }
}
