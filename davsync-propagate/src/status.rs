use davsync_core::DavError;
use reqwest::StatusCode;

use crate::item::Status;

/// Maps an HTTP status to a terminal job status. `ignored` is a status the
/// caller treats as success (404 on DELETE, 405 on MKCOL).
pub fn classify_http(status: StatusCode, ignored: Option<StatusCode>) -> Status {
    if status.is_success() || Some(status) == ignored {
        return Status::Success;
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
            Status::FatalError(reason(status))
        }
        StatusCode::PRECONDITION_FAILED => Status::SoftError(reason(status)),
        status if status.is_redirection() => Status::SoftError(reason(status)),
        status => Status::NormalError(reason(status)),
    }
}

/// Maps a failed transport dispatch to a terminal job status. Connection
/// setup failures (lookup, connect, timeout) are fatal: nothing else in this
/// run will reach the server either.
pub fn classify_transport(err: &reqwest::Error) -> Status {
    if err.is_timeout() || err.is_connect() {
        Status::FatalError(err.to_string())
    } else if err.is_redirect() {
        Status::SoftError(err.to_string())
    } else {
        Status::NormalError(err.to_string())
    }
}

pub fn classify_dav_error(err: &DavError) -> Status {
    match err {
        DavError::Request(inner) => classify_transport(inner),
        DavError::Url(inner) => Status::NormalError(inner.to_string()),
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string())
}
