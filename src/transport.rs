//! The HTTP capability the client sends its requests through.
//!
//! Requests and responses are plain data. [`ReqwestTransport`] is the
//! default implementation; tests and embedders can supply their own
//! [`Transport`] through [`ClientBuilder::transport`](crate::ClientBuilder::transport).

use crate::{Error, Result};
use http::header::{HeaderName, HeaderValue, ACCEPT, SET_COOKIE};
use http::{HeaderMap, Method, StatusCode};

/// Username and password attached as HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// The user name.
    pub user: String,
    /// The password.
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A single outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Optional request body.
    pub body: Option<String>,
    /// Credentials for transports that support basic authentication.
    pub basic_auth: Option<BasicAuth>,
}

impl HttpRequest {
    /// Creates a request with no headers, body or credentials.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            basic_auth: None,
        }
    }

    /// Sets the `cookie` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie is not a valid header value.
    pub fn with_cookie(mut self, cookie: &str) -> Result<Self> {
        let value = HeaderValue::try_from(cookie)
            .map_err(|e| Error::ConfigurationError(format!("Invalid cookie value: {}", e)))?;
        self.headers.insert(http::header::COOKIE, value);
        Ok(self)
    }

    /// Attaches basic authentication credentials.
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            user: user.into(),
            password: password.into(),
        });
        self
    }
}

/// The response to an [`HttpRequest`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The status code.
    pub status: StatusCode,
    /// Response headers; `set-cookie` may appear several times.
    pub headers: HeaderMap,
    /// The response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// All `set-cookie` values, joined with `;`.
    ///
    /// Values that are not valid UTF-8 are decoded lossily rather than dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use qcrest::transport::HttpResponse;
    /// use http::{header::SET_COOKIE, StatusCode};
    ///
    /// let mut response = HttpResponse::new(StatusCode::OK, "");
    /// response.headers.append(SET_COOKIE, "LWSSO_COOKIE_KEY=abc; Path=/".parse().unwrap());
    /// response.headers.append(SET_COOKIE, "QCSession=xyz".parse().unwrap());
    ///
    /// assert_eq!(response.joined_cookies(), "LWSSO_COOKIE_KEY=abc; Path=/;QCSession=xyz");
    /// ```
    pub fn joined_cookies(&self) -> String {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|value| match value.to_str() {
                Ok(cookie) => cookie.to_string(),
                Err(_) => {
                    tracing::warn!("set-cookie value is not visible ASCII, decoding lossily");
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Performs one HTTP round trip.
///
/// Implementations send exactly one request per call and must not follow
/// redirects or retry on their own.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the server's response, whatever its status.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a `reqwest::Client`.
///
/// Requests without an `accept` header ask for JSON.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport that does not follow redirects.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::ConfigurationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

fn insert_default_accept(headers: &mut HeaderMap) {
    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut headers = request.headers;
        insert_default_accept(&mut headers);

        let mut builder = self
            .http_client
            .request(request.method, &request.url)
            .headers(headers);

        if let Some(auth) = request.basic_auth {
            builder = builder.basic_auth(auth.user, Some(auth.password));
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Parses a header name/value pair, mapping failures to configuration errors.
pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joined_cookies_empty() {
        let response = HttpResponse::new(StatusCode::OK, "");
        assert_eq!(response.joined_cookies(), "");
    }

    #[test]
    fn test_joined_cookies_keeps_non_ascii_values() {
        let mut response = HttpResponse::new(StatusCode::OK, "");
        response
            .headers
            .append(SET_COOKIE, HeaderValue::from_bytes(b"ALM_USER=j\xc3\xb6rg").unwrap());
        response
            .headers
            .append(SET_COOKIE, HeaderValue::from_bytes(b"LEGACY=caf\xe9").unwrap());
        response
            .headers
            .append(SET_COOKIE, HeaderValue::from_static("QCSession=xyz"));

        assert_eq!(
            response.joined_cookies(),
            "ALM_USER=j\u{f6}rg;LEGACY=caf\u{fffd};QCSession=xyz"
        );
    }

    #[test]
    fn test_default_accept_only_when_missing() {
        let mut headers = HeaderMap::new();
        insert_default_accept(&mut headers);
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/xml"));
        insert_default_accept(&mut headers);
        assert_eq!(headers.get_all(ACCEPT).iter().count(), 1);
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/xml");
    }

    #[test]
    fn test_basic_auth_debug_redacts_password() {
        let request = HttpRequest::new(Method::GET, "http://host").with_basic_auth("alice", "s3cret");
        let debug = format!("{:?}", request);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_with_cookie_rejects_newlines() {
        let result = HttpRequest::new(Method::GET, "http://host").with_cookie("a=b\nc");
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_parse_header() {
        assert!(parse_header("x-test", "value").is_ok());
        assert!(parse_header("bad header", "value").is_err());
    }
}
