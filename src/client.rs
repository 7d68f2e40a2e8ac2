//! The session-aware client.
//!
//! [`Client`] is the main entry point: create one, call [`Client::login`]
//! once, then issue scoped requests with [`Client::get`]. Use
//! [`ClientBuilder`] to plug in a custom [`Transport`] or add default
//! headers.

use crate::{
    normalize::{normalize_body, Payload},
    session::{ConnectionInfo, Session},
    transport::{parse_header, HttpRequest, HttpResponse, ReqwestTransport, Transport},
    url_builder::build_url,
    Error, QueryOptions, Response, Result,
};
use http::{HeaderMap, Method, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// A client for the session-authenticated REST API.
///
/// A new client is unauthenticated. After a successful [`login`](Client::login)
/// it carries the session cookie and scopes every request to the domain and
/// project given at login. There is no logout; create a new client instead.
///
/// Concurrent [`get`](Client::get) calls only read the session and are safe.
/// `login` takes `&mut self`, so it cannot race with them.
///
/// # Examples
///
/// ```no_run
/// use qcrest::{ConnectionInfo, QueryOptions};
///
/// # async fn example() -> Result<(), qcrest::Error> {
/// let mut client = qcrest::create()?;
///
/// let info = ConnectionInfo::new("https://alm.example.com/qcbin/", "alice", "secret")
///     .with_domain("DEFAULT")
///     .with_project("Demo");
/// client.login(&info).await?;
///
/// let options = QueryOptions::new().page_size(25).fields(["id", "name", "status"]);
/// let response = client.get("/defects", Some(&options))?.await?;
///
/// for record in response.data.as_records().into_iter().flatten() {
///     println!("{} {:?}", record.entity_type(), record.get("name"));
/// }
/// # Ok(())
/// # }
/// ```
pub struct Client {
    transport: Arc<dyn Transport>,
    session: Session,
}

impl Client {
    /// Creates an unauthenticated client over the default transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Logs in and opens a site session.
    ///
    /// On success the client is authenticated and holds the combined
    /// cookies of both handshake steps.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`] if the server URL is empty or unparseable.
    /// * [`Error::InvalidAuthentication`] if the credentials are rejected
    ///   (401) or the server answers with any other unexpected status; in
    ///   the latter case the raw body is attached. The client stays
    ///   unauthenticated.
    /// * [`Error::SessionEstablishment`] if the session endpoint does not
    ///   answer `201 Created`. The client is nevertheless left
    ///   authenticated with the cookies from the first step.
    /// * [`Error::Network`] if the transport fails.
    pub async fn login(&mut self, info: &ConnectionInfo) -> Result<()> {
        self.session.login(self.transport.as_ref(), info).await
    }

    /// Fetches `path`, scoped to the session's domain and project.
    ///
    /// The authentication check and URL construction happen immediately;
    /// the returned future performs the request. No request is sent if this
    /// returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAuthentication`] right away when called
    /// before a successful login. The future resolves to
    /// [`Error::RequestFailed`] for any status other than `200 OK`, and to
    /// [`Error::DeserializationFailed`] if the body is a malformed entity
    /// collection. Bodies that are neither JSON nor XML come back as
    /// [`Payload::Text`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(client: &qcrest::Client) -> Result<(), qcrest::Error> {
    /// let response = client.get("defects/42", None)?.await?;
    /// println!("{}", response.raw_body);
    /// # Ok(())
    /// # }
    /// ```
    pub fn get(
        &self,
        path: &str,
        options: Option<&QueryOptions>,
    ) -> Result<impl Future<Output = Result<Response<Payload>>> + Send + '_> {
        self.verify_authenticated()?;

        let url = build_url(
            self.session.root_url.as_deref().unwrap_or_default(),
            self.session.domain.as_deref(),
            self.session.project.as_deref(),
            path,
            options,
        );
        let request = HttpRequest::new(Method::GET, url)
            .with_cookie(self.session.cookie.as_deref().unwrap_or_default())?;

        Ok(self.execute(request))
    }

    fn verify_authenticated(&self) -> Result<()> {
        if self.session.is_authenticated {
            Ok(())
        } else {
            Err(Error::not_logged_in())
        }
    }

    async fn execute(&self, request: HttpRequest) -> Result<Response<Payload>> {
        let url = request.url.clone();
        tracing::debug!(method = %request.method, url = %url, "Executing HTTP request");

        let start_time = Instant::now();
        let response = self.transport.send(request).await?;
        let latency = start_time.elapsed();

        tracing::info!(
            status = response.status.as_u16(),
            latency_ms = latency.as_millis(),
            "Received HTTP response"
        );

        self.parse_response(response, latency, url)
    }

    fn parse_response(
        &self,
        response: HttpResponse,
        latency: std::time::Duration,
        url: String,
    ) -> Result<Response<Payload>> {
        let HttpResponse {
            status,
            headers,
            body,
        } = response;

        if status != StatusCode::OK {
            tracing::warn!(
                status = status.as_u16(),
                url = %url,
                response = %body,
                "Request failed"
            );
            return Err(Error::RequestFailed {
                status,
                raw_response: body,
                url,
            });
        }

        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());

        let data = normalize_body(&body, content_type).map_err(|e| {
            tracing::error!(
                error = %e,
                raw_response = %body,
                "Failed to deserialize response"
            );
            Error::DeserializationFailed {
                raw_response: body.clone(),
                serde_error: e.to_string(),
                status,
            }
        })?;

        Ok(Response::new(data, body, status, headers, latency, url))
    }

    /// Returns `true` once the authentication step of [`login`](Client::login) has succeeded.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated
    }

    /// The normalized server root, set by [`login`](Client::login).
    pub fn root_url(&self) -> Option<&str> {
        self.session.root_url.as_deref()
    }

    /// The domain requests are scoped to.
    pub fn domain(&self) -> Option<&str> {
        self.session.domain.as_deref()
    }

    /// The project requests are scoped to, when a domain is also set.
    pub fn project(&self) -> Option<&str> {
        self.session.project.as_deref()
    }

    /// The accumulated session cookie sent with every request.
    pub fn session_cookie(&self) -> Option<&str> {
        self.session.cookie.as_deref()
    }

    /// The connection details of the last login attempt.
    pub fn connection_info(&self) -> Option<&ConnectionInfo> {
        self.session.connection_info.as_ref()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("is_authenticated", &self.session.is_authenticated)
            .field("root_url", &self.session.root_url)
            .field("domain", &self.session.domain)
            .field("project", &self.session.project)
            .finish_non_exhaustive()
    }
}

/// Adds a fixed set of headers to every request before handing it on.
struct DefaultHeaders {
    inner: Arc<dyn Transport>,
    headers: HeaderMap,
}

#[async_trait::async_trait]
impl Transport for DefaultHeaders {
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        for (name, value) in &self.headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }
        self.inner.send(request).await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// Every client it builds starts unauthenticated.
///
/// # Examples
///
/// ```no_run
/// use qcrest::ClientBuilder;
///
/// # fn example() -> Result<(), qcrest::Error> {
/// let client = ClientBuilder::new()
///     .user_agent("defect-sync/1.0")?
///     .default_header("x-qc-rest-client", "true")?
///     .build()?;
/// assert!(!client.is_authenticated());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    default_headers: HeaderMap,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends requests through `transport` instead of the default `reqwest` one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Adds a header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the `user-agent` header for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid header value.
    pub fn user_agent(self, user_agent: impl AsRef<str>) -> Result<Self> {
        self.default_header(http::header::USER_AGENT.as_str(), user_agent)
    }

    /// Builds the configured, unauthenticated `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP client cannot be built.
    pub fn build(self) -> Result<Client> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let transport: Arc<dyn Transport> = if self.default_headers.is_empty() {
            transport
        } else {
            Arc::new(DefaultHeaders {
                inner: transport,
                headers: self.default_headers,
            })
        };

        Ok(Client {
            transport,
            session: Session::default(),
        })
    }
}
