//! Closed error taxonomy for the relay and the classifier that feeds it.

use std::{error::Error, fmt};

use crate::normalize::NormalizeError;
use crate::upstream::{TransportError, UpstreamResponse};

/// Upstream error bodies are cut to this many bytes before reaching the caller.
pub const MAX_ERROR_BODY_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayErrorKind {
    UpstreamUnreachable,
    UpstreamHttpError,
    MalformedUpstreamPayload,
    UnknownOperation,
    InvalidArguments,
}

impl RelayErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpstreamUnreachable => "upstream_unreachable",
            Self::UpstreamHttpError => "upstream_http_error",
            Self::MalformedUpstreamPayload => "malformed_upstream_payload",
            Self::UnknownOperation => "unknown_operation",
            Self::InvalidArguments => "invalid_arguments",
        }
    }

    /// Caller errors are fixable by changing the request.
    #[must_use]
    pub const fn is_caller_error(self) -> bool {
        matches!(self, Self::UnknownOperation | Self::InvalidArguments)
    }
}

impl fmt::Display for RelayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure surfaced to the caller of `list_aggs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayError {
    kind: RelayErrorKind,
    message: String,
    upstream_status: Option<u16>,
}

impl RelayError {
    pub fn invalid_arguments(detail: impl fmt::Display) -> Self {
        Self {
            kind: RelayErrorKind::InvalidArguments,
            message: format!("Invalid arguments: {detail}"),
            upstream_status: None,
        }
    }

    pub fn unknown_operation(operation: &str) -> Self {
        Self {
            kind: RelayErrorKind::UnknownOperation,
            message: format!("Unknown tool: {operation}"),
            upstream_status: None,
        }
    }

    pub fn upstream_unreachable(base_url: &str, err: &TransportError) -> Self {
        Self {
            kind: RelayErrorKind::UpstreamUnreachable,
            message: format!("Error calling upstream at {base_url}: {err}"),
            upstream_status: None,
        }
    }

    pub fn upstream_http(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        Self {
            kind: RelayErrorKind::UpstreamHttpError,
            message: format!(
                "HTTP Error {status}: {}",
                bounded(&text, MAX_ERROR_BODY_BYTES)
            ),
            upstream_status: Some(status),
        }
    }

    pub fn malformed(detail: impl fmt::Display) -> Self {
        Self {
            kind: RelayErrorKind::MalformedUpstreamPayload,
            message: format!("Malformed upstream payload: {detail}"),
            upstream_status: None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> RelayErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn upstream_status(&self) -> Option<u16> {
        self.upstream_status
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for RelayError {}

impl From<NormalizeError> for RelayError {
    fn from(err: NormalizeError) -> Self {
        Self::malformed(err)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err)
    }
}

/// Splits an upstream outcome into a body worth normalizing or a classified error.
///
/// # Errors
/// Returns `UpstreamUnreachable` for transport failures and `UpstreamHttpError`
/// for any non-2xx status.
pub fn classify_response(
    base_url: &str,
    outcome: Result<UpstreamResponse, TransportError>,
) -> Result<Vec<u8>, RelayError> {
    let response = outcome.map_err(|err| RelayError::upstream_unreachable(base_url, &err))?;
    if !response.is_success() {
        return Err(RelayError::upstream_http(response.status, &response.body));
    }
    Ok(response.body)
}

fn bounded(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
