//! Static file server the guest installer fetches its answer files from.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{CONTENT_LENGTH, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

/// Running file server. Serves until [`FileServer::stop`] is called or the
/// value is dropped.
pub struct FileServer {
    addr: SocketAddr,
    root: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl FileServer {
    /// Serve `root` on an already bound listener. Must be called from
    /// within a tokio runtime.
    pub fn start(root: PathBuf, listener: std::net::TcpListener) -> BuildResult<Self> {
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        let listener = tokio::net::TcpListener::from_std(listener)
            .map_err(|e| BuildError::Network(format!("Error starting HTTP server: {}", e)))?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let shared_root: Arc<Path> = Arc::from(root.as_path());

        let handle = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            loop {
                let (stream, peer) = tokio::select! {
                    _ = &mut shutdown_rx => break,
                    Some(_) = connections.join_next(), if !connections.is_empty() => continue,
                    accepted = listener.accept() => match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!("HTTP accept failed: {}", e);
                            continue;
                        }
                    },
                };

                let root = Arc::clone(&shared_root);
                connections.spawn(async move {
                    let service = service_fn(move |req| serve(Arc::clone(&root), req));
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        tracing::debug!(%peer, "HTTP connection ended with error: {}", e);
                    }
                });
            }
            // Open keep-alive connections end with the server.
            connections.shutdown().await;
            tracing::debug!(%addr, "HTTP server stopped");
        });

        tracing::info!(%addr, root = %root.display(), "HTTP server started");
        Ok(Self {
            addr,
            root,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop accepting connections, close open ones and wait for the accept
    /// loop to exit.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("HTTP server task failed: {}", e);
            }
        }
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Map a request path onto a file below `root`. Paths escaping the root
/// resolve to nothing.
pub fn resolve_request_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

async fn serve(root: Arc<Path>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = if method != Method::GET && method != Method::HEAD {
        status(StatusCode::METHOD_NOT_ALLOWED)
    } else {
        match resolve_request_path(&root, &path) {
            None => status(StatusCode::NOT_FOUND),
            Some(file) => match tokio::fs::read(&file).await {
                Ok(contents) => {
                    let len = contents.len();
                    let body = if method == Method::HEAD {
                        Bytes::new()
                    } else {
                        Bytes::from(contents)
                    };
                    let mut resp = Response::new(Full::new(body));
                    resp.headers_mut()
                        .insert(CONTENT_LENGTH, HeaderValue::from(len));
                    resp
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => status(StatusCode::NOT_FOUND),
                Err(e) => {
                    tracing::debug!(file = %file.display(), "HTTP read failed: {}", e);
                    // Directories and unreadable files.
                    status(StatusCode::NOT_FOUND)
                }
            },
        }
    };

    tracing::debug!(%method, %path, status = %response.status(), "HTTP request");
    Ok(response)
}

fn status(code: StatusCode) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(
        code.canonical_reason().unwrap_or_default(),
    )));
    *resp.status_mut() = code;
    resp
}
