use std::time::Instant;

use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use tracing::{info, warn};

/// Logs one line per request once the response is ready.
pub async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let latency = started.elapsed();

    if status.is_server_error() {
        warn!("{} {} -> {} in {:?}", method, uri, status.as_u16(), latency);
    } else {
        info!("{} {} -> {} in {:?}", method, uri, status.as_u16(), latency);
    }

    response
}
