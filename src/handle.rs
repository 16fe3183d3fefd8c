//! Server lifecycle.
//!
//! A [`ServerHandle`] owns the accept loop of one listening socket. Every
//! accepted connection runs in a task tracked by the loop, so destroying the
//! handle closes the listener and drops all open connections at once.

use axum::{body::Body, Router};
use hyper::{body::Incoming, Request};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use std::net::SocketAddr;
use tokio::{
    net::TcpListener,
    task::{JoinHandle, JoinSet},
};
use tower::ServiceExt;

/// A running HTTP server that can be force-destroyed
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Starts serving `router` on `listener`. Must be called inside a tokio runtime.
    pub fn spawn(listener: TcpListener, router: Router) -> std::io::Result<Self> {
        let addr = listener.local_addr()?;
        let task = tokio::spawn(accept_loop(listener, router));
        Ok(Self {
            addr,
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Closes the listener and every open connection without draining.
    ///
    /// Returns once the listening socket has been released.
    pub async fn destroy(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            tracing::debug!(addr = %self.addr, "server destroyed");
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, router: Router) {
    // Dropping the set aborts every connection task with it.
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let service = router
                        .clone()
                        .map_request(|request: Request<Incoming>| request.map(Body::new));
                    connections.spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = TowerToHyperService::new(service);
                        if let Err(e) = Builder::new(TokioExecutor::new())
                            .serve_connection_with_upgrades(io, service)
                            .await
                        {
                            tracing::debug!(%peer, "connection error: {e}");
                        }
                    });
                }
                Err(e) => tracing::warn!("failed to accept connection: {e}"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}
