//! # qcrest - a client for the Quality Center / ALM REST API
//!
//! qcrest handles the session lifecycle of the ALM REST API: the two-step
//! login handshake, carrying the session cookie, scoping every request to a
//! domain and project, and flattening the API's verbose entity envelopes
//! into simple records.
//!
//! ## Quick Start
//!
//! ```no_run
//! use qcrest::{ConnectionInfo, QueryOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), qcrest::Error> {
//!     let mut client = qcrest::create()?;
//!
//!     client
//!         .login(
//!             &ConnectionInfo::new("https://alm.example.com/qcbin", "alice", "secret")
//!                 .with_domain("DEFAULT")
//!                 .with_project("Demo"),
//!         )
//!         .await?;
//!
//!     // GET {root}/rest/domains/DEFAULT/projects/Demo/defects?page-size=10&fields=id,name
//!     let options = QueryOptions::new().page_size(10).fields(["id", "name"]);
//!     let response = client.get("defects", Some(&options))?.await?;
//!
//!     if let Some(defects) = response.data.as_records() {
//!         println!("{} defects in total", defects.total_results);
//!         for defect in defects {
//!             println!("{:?}: {:?}", defect.get("id"), defect.get("name"));
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Calling [`Client::get`] before logging in fails immediately, without a
//! request being sent. Everything else is reported through the returned
//! future:
//!
//! ```no_run
//! use qcrest::Error;
//!
//! # async fn example(client: &qcrest::Client) -> Result<(), Error> {
//! match client.get("defects/1", None)?.await {
//!     Ok(response) => println!("Success: {:?}", response.data),
//!     Err(Error::RequestFailed { status, url, raw_response }) => {
//!         eprintln!("{} returned {}: {}", url, status, raw_response);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod normalize;
mod options;
mod response;
mod session;
pub mod transport;
pub mod url_builder;

pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};
pub use normalize::{Payload, Record, RecordSet};
pub use options::QueryOptions;
pub use response::Response;
pub use session::ConnectionInfo;
pub use transport::Transport;

/// Creates a new, unauthenticated client over the default transport.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn create() -> Result<Client> {
    Client::builder().build()
}
