//! Error types for session and resource calls.
//!
//! Every failure keeps the details a caller needs to diagnose it: the HTTP
//! status, the raw body the server sent back and, for resource calls, the
//! exact URL that was requested.

use http::StatusCode;

/// The main error type for this crate.
///
/// # Examples
///
/// ```no_run
/// use qcrest::{ConnectionInfo, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let mut client = qcrest::create()?;
/// let info = ConnectionInfo::new("https://alm.example.com/qcbin/", "alice", "secret");
///
/// match client.login(&info).await {
///     Ok(()) => println!("logged in"),
///     Err(Error::InvalidAuthentication { message, .. }) => eprintln!("{}", message),
///     Err(Error::SessionEstablishment { status }) => {
///         eprintln!("session could not be opened: {}", status)
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The caller passed malformed input, such as options that are not an object.
    ///
    /// Raised before any request is sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The credentials were rejected, or a call required a login that never happened.
    ///
    /// # Fields
    ///
    /// * `message` - Human readable description, naming the user and server where known
    /// * `response` - The raw body of an unexpected authentication response
    #[error("{message}")]
    InvalidAuthentication {
        /// Description of the failure
        message: String,
        /// Raw response body kept for diagnostics
        response: Option<String>,
    },

    /// Authentication succeeded but the server refused to open a session.
    #[error("Session start failed, status code {status}")]
    SessionEstablishment {
        /// The status returned by the session endpoint
        status: StatusCode,
    },

    /// A resource request returned something other than `200 OK`.
    ///
    /// # Fields
    ///
    /// * `status` - The HTTP status code
    /// * `raw_response` - The raw response body
    /// * `url` - The fully scoped URL that was requested
    #[error("Failed to process url {url} (status {status}): {raw_response}")]
    RequestFailed {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The requested URL
        url: String,
    },

    /// A `200 OK` body claimed to be an entity collection, in JSON or XML,
    /// without having the expected shape.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A network-level error occurred (connection refused, DNS failure, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The client was configured with invalid values, such as a bad header.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl Error {
    pub(crate) fn not_logged_in() -> Self {
        Error::InvalidAuthentication {
            message: "Not yet logged in, please call login to authenticate.".to_string(),
            response: None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    ///
    /// # Examples
    ///
    /// ```
    /// use qcrest::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::SessionEstablishment { status: StatusCode::FORBIDDEN };
    /// assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    ///
    /// let err = Error::InvalidArgument("options".to_string());
    /// assert_eq!(err.status(), None);
    /// ```
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::SessionEstablishment { status } => Some(*status),
            Error::RequestFailed { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::RequestFailed { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            Error::InvalidAuthentication { response, .. } => response.as_deref(),
            _ => None,
        }
    }

    /// Returns the requested URL for failed resource calls.
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::RequestFailed { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
