//! Blocking HTTP plumbing shared by the providers.

use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use std::time::Duration;

use super::provider::DataError;
use crate::domain::ProviderId;

pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Build the one client a provider keeps for the life of the process.
///
/// `timeout` of `None` keeps reqwest's blocking default.
pub(crate) fn build_client(
    provider: ProviderId,
    timeout: Option<Duration>,
) -> Result<Client, DataError> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder.build().map_err(|e| DataError::ProviderUnavailable {
        provider,
        reason: format!("failed to build HTTP client: {e}"),
    })
}

/// Parse a configured base URL, rejecting ones that cannot take path segments.
pub(crate) fn parse_base_url(provider: ProviderId, base: &str) -> Result<Url, DataError> {
    let url = Url::parse(base).map_err(|e| DataError::ProviderUnavailable {
        provider,
        reason: format!("invalid base URL '{base}': {e}"),
    })?;
    if url.cannot_be_a_base() {
        return Err(DataError::ProviderUnavailable {
            provider,
            reason: format!("base URL '{base}' cannot hold a path"),
        });
    }
    Ok(url)
}

/// Append path segments to a base URL. `Url` percent-encodes each segment,
/// including any `/` inside it.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // Base URLs are checked by `parse_base_url`, so they can hold a path.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Map a non-success status to a structured error; pass successes through.
pub(crate) fn check_status(
    provider: ProviderId,
    instrument: &str,
    resp: Response,
) -> Result<Response, DataError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(match status {
        StatusCode::NOT_FOUND => DataError::SymbolNotFound {
            symbol: instrument.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            DataError::RateLimited { retry_after_secs }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DataError::ProviderUnavailable {
            provider,
            reason: format!("HTTP {status}: credentials rejected or access blocked"),
        },
        _ => DataError::Http {
            provider,
            status: status.as_u16(),
        },
    })
}

/// Map a transport error. Deadline expiry becomes a one-attempt
/// [`DataError::FetchTimeout`] so the retry wrapper can recognise it.
pub(crate) fn map_send_error(label: &str, e: reqwest::Error) -> DataError {
    if e.is_timeout() {
        DataError::FetchTimeout {
            label: label.to_string(),
            attempts: 1,
        }
    } else if e.is_decode() {
        DataError::ResponseFormatChanged(format!("failed to parse response for {label}: {e}"))
    } else {
        DataError::NetworkUnreachable(format!("{label}: {e}"))
    }
}
