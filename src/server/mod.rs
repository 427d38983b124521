//! HTTP listeners
//!
//! Both the probe server and the maintenance server run the same accept
//! loop: hyper http1 connections, one task each, until shutdown.

pub mod maintenance;
pub mod probe;

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics::metrics;

pub use maintenance::MaintenanceRoutes;
pub use probe::ProbeRoutes;

pub type HttpResponse = Response<Full<Bytes>>;

/// Plain-text response
pub fn text(status: StatusCode, body: impl Into<String>) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body.into())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// JSON response; serialization failure becomes a 500
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub fn not_found() -> HttpResponse {
    text(StatusCode::NOT_FOUND, "Not Found")
}

/// Path split into its non-empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Metric label for a path: its first segment only
fn route_label(path: &str) -> String {
    match segments(path).first() {
        Some(first) => format!("/{}", first),
        None => "/".to_string(),
    }
}

/// Serve connections until shutdown
///
/// The handler receives the method, the path and the caller's address.
pub async fn serve<H, F>(
    listener: TcpListener,
    name: &'static str,
    shutdown: CancellationToken,
    handler: H,
) -> anyhow::Result<()>
where
    H: Fn(Method, String, SocketAddr) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = HttpResponse> + Send + 'static,
{
    info!(server = name, addr = %listener.local_addr()?, "Listening");

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!(server = name, "Server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(v) => v,
                Err(e) => {
                    error!(server = name, error = %e, "Failed to accept connection");
                    continue;
                }
            }
        };

        let handler = handler.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                let label = route_label(req.uri().path());
                let fut = handler(req.method().clone(), req.uri().path().to_string(), peer);
                async move {
                    let started = Instant::now();
                    let response = fut.await;
                    metrics().record_http_request(
                        &label,
                        response.status().as_u16(),
                        started.elapsed().as_secs_f64(),
                    );
                    Ok::<_, Infallible>(response)
                }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(server = name, peer = %peer, error = %e, "Connection error");
            }
        });
    }
}
