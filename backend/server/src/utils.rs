use std::net::SocketAddr;

use axum::http::HeaderMap;

pub const UNKNOWN_CLIENT: &str = "unknown";
pub const CONFIRMED_PATH: &str = "/waitlist/confirmed";
pub const ERROR_PATH: &str = "/waitlist/error";

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Best-effort client identity for rate limiting.
///
/// Peer address first, then the first hop of `X-Forwarded-For`, then a shared sentinel.
pub fn client_key(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(peer) = peer {
        return peer.ip().to_string();
    }

    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Small absolute numbers are hidden: anything under `minimum` shows as 0.
pub fn display_count(raw: u64, minimum: u64) -> u64 {
    if raw >= minimum { raw } else { 0 }
}

/// Position shown in emails. Missing or zero reads as #1.
pub fn email_position(position: Option<u32>) -> u32 {
    position.filter(|p| *p > 0).unwrap_or(1)
}

pub fn confirmation_url(site_url: &str, token: &str) -> String {
    format!(
        "{site_url}/api/waitlist/confirm?{}",
        encode_query(&[("token", token)])
    )
}

pub fn referral_url(site_url: &str, referral_code: &str) -> String {
    format!("{site_url}?{}", encode_query(&[("ref", referral_code)]))
}

/// `/waitlist/confirmed`, with `position` and `code` only when present.
pub fn confirmed_redirect(position: Option<u32>, referral_code: Option<&str>) -> String {
    let position = position.filter(|p| *p > 0).map(|p| p.to_string());

    let mut params = Vec::new();
    if let Some(position) = position.as_deref() {
        params.push(("position", position));
    }
    if let Some(code) = referral_code.filter(|code| !code.is_empty()) {
        params.push(("code", code));
    }

    format!("{CONFIRMED_PATH}?{}", encode_query(&params))
}

pub fn error_redirect(reason: &str) -> String {
    format!("{ERROR_PATH}?{}", encode_query(&[("reason", reason)]))
}

fn encode_query(params: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(params).unwrap_or_default()
}
