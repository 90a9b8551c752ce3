use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, state::AppState};

pub async fn enforce_trusted_hosts(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok());

    if host_allowed(&state.config.trusted_hosts, host) {
        return next.run(request).await;
    }

    tracing::warn!(host = host.unwrap_or_default(), "Rejected untrusted host");
    AppError::BadRequest("Invalid host header.".to_string()).into_response()
}

/// Matches the host (port stripped) against exact names, `*.suffix`
/// wildcards or a bare `*`.
fn host_allowed(trusted_hosts: &[String], host: Option<&str>) -> bool {
    if trusted_hosts.iter().any(|item| item.trim() == "*") {
        return true;
    }
    let Some(host) = host.map(strip_port).filter(|value| !value.is_empty()) else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    trusted_hosts.iter().any(|pattern| {
        let pattern = pattern.trim().to_ascii_lowercase();
        match pattern.strip_prefix("*.") {
            Some(suffix) => host.ends_with(&format!(".{suffix}")),
            None => host == pattern,
        }
    })
}

fn strip_port(host: &str) -> &str {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[') {
        // [::1]:8000
        return rest.split(']').next().unwrap_or_default();
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|ch| ch.is_ascii_digit()) => name,
        _ => host,
    }
}
