//! Response wrapper that keeps the normalized data next to the raw exchange.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful response from a resource request.
///
/// Alongside the normalized `data`, it keeps the raw body, status code,
/// headers and latency of the HTTP exchange.
///
/// # Examples
///
/// ```no_run
/// use qcrest::{ConnectionInfo, QueryOptions};
///
/// # async fn example() -> Result<(), qcrest::Error> {
/// let mut client = qcrest::create()?;
/// client
///     .login(&ConnectionInfo::new("https://alm.example.com/qcbin", "alice", "secret")
///         .with_domain("DEFAULT")
///         .with_project("Demo"))
///     .await?;
///
/// let response = client.get("defects", Some(&QueryOptions::new().page_size(10)))?.await?;
///
/// if let Some(records) = response.data.as_records() {
///     println!("{} of {} defects", records.len(), records.total_results);
/// }
/// println!("Request took {:?}", response.latency);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The normalized response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from sending the request to receiving the full body.
    pub latency: Duration,

    /// The fully scoped URL that was requested.
    pub url: String,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        url: String,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            url,
        }
    }

    /// Returns a header value by name, if present and visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
