//! HTTP plumbing shared by the chain adapter.
//!
//! Every request the adapter makes disables redirects (a redirected paid
//! request could leak the payment header to another origin) and runs
//! under an explicit deadline whose expiry maps to an operation-specific
//! error kind.

use std::time::Duration;

use payfetch::adapter::CapturedResponse;
use payfetch::error::{Error, ErrorKind};

/// Builds the adapter's HTTP client: no redirects, no ambient timeout
/// (deadlines are applied per operation).
pub(crate) fn build_client() -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|err| Error::bad_config(format!("failed to build HTTP client: {err}")))
}

/// Sends a request under a deadline.
///
/// Transport failures map to `endpoint-unreachable`; the deadline firing
/// maps to `timeout_kind` with a message naming the operation and the
/// elapsed seconds.
pub(crate) async fn send_with_deadline(
    request: reqwest::RequestBuilder,
    secs: u64,
    operation: &str,
    timeout_kind: ErrorKind,
) -> Result<reqwest::Response, Error> {
    match tokio::time::timeout(Duration::from_secs(secs), request.send()).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) => Err(Error::new(
            ErrorKind::EndpointUnreachable,
            format!("{operation} request failed: {err}"),
        )),
        Err(_) => Err(Error::new(
            timeout_kind,
            format!("{operation} timed out after {secs} s"),
        )),
    }
}

/// Buffers a response into a [`CapturedResponse`].
pub(crate) async fn capture(response: reqwest::Response) -> Result<CapturedResponse, Error> {
    let url = response.url().to_string();
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|err| {
            Error::new(
                ErrorKind::EndpointUnreachable,
                format!("failed reading response body: {err}"),
            )
        })?
        .to_vec();
    Ok(CapturedResponse {
        url,
        status,
        headers,
        body,
    })
}
