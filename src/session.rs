//! Connection details and the login handshake.
//!
//! Logging in is a two step exchange:
//!
//! 1. `GET {root}/authentication-point/authenticate` with basic credentials.
//!    A `200 OK` carries the authentication cookies.
//! 2. `POST {root}/rest/site-session` presenting those cookies. A
//!    `201 Created` carries the session cookies, which are appended.
//!
//! The combined cookie string is the session credential sent with every
//! resource request afterwards.

use crate::transport::{HttpRequest, Transport};
use crate::url_builder::trim_slash;
use crate::{Error, Result};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const AUTHENTICATE_PATH: &str = "/authentication-point/authenticate";
const SITE_SESSION_PATH: &str = "/rest/site-session";

/// Where and as whom to log in.
///
/// Deserializable, so it can be read straight from an application's own
/// configuration file.
///
/// # Examples
///
/// ```
/// use qcrest::ConnectionInfo;
///
/// let info = ConnectionInfo::new("https://alm.example.com/qcbin/", "alice", "secret")
///     .with_domain("DEFAULT")
///     .with_project("Demo");
///
/// assert_eq!(info.domain.as_deref(), Some("DEFAULT"));
/// assert!(!format!("{:?}", info).contains("secret"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Server root, e.g. `https://alm.example.com/qcbin`. Surrounding slashes are ignored.
    pub server: String,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
    /// Domain that scopes resource URLs.
    #[serde(default)]
    pub domain: Option<String>,
    /// Project within the domain. Ignored when no domain is set.
    #[serde(default)]
    pub project: Option<String>,
}

impl ConnectionInfo {
    /// Creates connection details without a domain or project.
    pub fn new(
        server: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
            password: password.into(),
            domain: None,
            project: None,
        }
    }

    /// Sets the domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

impl std::fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("server", &self.server)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .field("project", &self.project)
            .finish()
    }
}

/// Authentication state of one client.
///
/// Starts unauthenticated and is only changed by [`Session::login`].
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) is_authenticated: bool,
    pub(crate) root_url: Option<String>,
    pub(crate) domain: Option<String>,
    pub(crate) project: Option<String>,
    pub(crate) cookie: Option<String>,
    pub(crate) connection_info: Option<ConnectionInfo>,
}

impl Session {
    /// Runs the two-step handshake against `info.server`.
    ///
    /// The session is marked authenticated as soon as step one succeeds, so
    /// a failure to open the site session still leaves it authenticated.
    pub(crate) async fn login(&mut self, transport: &dyn Transport, info: &ConnectionInfo) -> Result<()> {
        let root_url = trim_slash(&info.server).to_string();
        if root_url.is_empty() {
            return Err(Error::InvalidArgument("Server url is empty".to_string()));
        }
        url::Url::parse(&root_url)
            .map_err(|e| Error::InvalidArgument(format!("Server url {:?} is invalid: {}", root_url, e)))?;

        self.root_url = Some(root_url.clone());
        self.domain = info.domain.clone();
        self.project = info.project.clone();
        self.connection_info = Some(info.clone());

        let url = format!("{}{}", root_url, AUTHENTICATE_PATH);
        tracing::debug!(method = "GET", url = %url, user = %info.user, "Authenticating");

        let start_time = Instant::now();
        let request = HttpRequest::new(Method::GET, url).with_basic_auth(&info.user, &info.password);
        let response = transport.send(request).await?;

        tracing::info!(
            status = response.status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "Received authentication response"
        );

        match response.status {
            StatusCode::OK => {
                self.is_authenticated = true;
                self.cookie = Some(response.joined_cookies());
                self.start_session(transport, &root_url).await
            }
            StatusCode::UNAUTHORIZED => {
                self.is_authenticated = false;
                tracing::warn!(user = %info.user, root_url = %root_url, "Credentials rejected");
                Err(Error::InvalidAuthentication {
                    message: format!(
                        "Failed to authenticate '{}' against {}, please verify username and password are correct",
                        info.user, root_url
                    ),
                    response: None,
                })
            }
            status => {
                self.is_authenticated = false;
                tracing::error!(
                    status = status.as_u16(),
                    response = %response.body,
                    "Unexpected authentication response"
                );
                Err(Error::InvalidAuthentication {
                    message: format!(
                        "Failed to authenticate '{}' against {}: status code {}",
                        info.user,
                        root_url,
                        status.as_u16()
                    ),
                    response: Some(response.body),
                })
            }
        }
    }

    async fn start_session(&mut self, transport: &dyn Transport, root_url: &str) -> Result<()> {
        let url = format!("{}{}", root_url, SITE_SESSION_PATH);
        tracing::debug!(method = "POST", url = %url, "Starting site session");

        let auth_cookie = self.cookie.clone().unwrap_or_default();
        let request = HttpRequest::new(Method::POST, url).with_cookie(&auth_cookie)?;
        let response = transport.send(request).await?;

        if response.status != StatusCode::CREATED {
            tracing::error!(
                status = response.status.as_u16(),
                response = %response.body,
                "Site session could not be started"
            );
            return Err(Error::SessionEstablishment {
                status: response.status,
            });
        }

        self.cookie = Some(format!("{};{}", auth_cookie, response.joined_cookies()));
        tracing::info!(root_url = %root_url, "Logged in");

        Ok(())
    }
}
