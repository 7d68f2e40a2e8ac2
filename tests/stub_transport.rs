//! Tests against a scripted in-memory transport that records every request.

use http::{header::SET_COOKIE, HeaderValue, Method, StatusCode};
use qcrest::transport::{HttpRequest, HttpResponse};
use qcrest::{Client, ConnectionInfo, Error, QueryOptions, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    fn with_responses(responses: impl IntoIterator<Item = HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> qcrest::Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted response left"))
    }
}

fn response_with_cookies(status: StatusCode, cookies: &[&'static str]) -> HttpResponse {
    let mut response = HttpResponse::new(status, "");
    for cookie in cookies {
        response
            .headers
            .append(SET_COOKIE, HeaderValue::from_static(cookie));
    }
    response
}

fn client_over(transport: &Arc<RecordingTransport>) -> Client {
    Client::builder()
        .transport(transport.clone())
        .build()
        .unwrap()
}

fn info() -> ConnectionInfo {
    ConnectionInfo::new("/http://alm.local/qcbin/", "bob", "pw")
        .with_domain("D")
        .with_project("P")
}

#[test]
fn test_get_before_login_fails_without_network() {
    let transport = RecordingTransport::with_responses([]);
    let client = client_over(&transport);

    match client.get("/defects", None) {
        Err(Error::InvalidAuthentication { message, .. }) => {
            assert!(message.contains("Not yet logged in"))
        }
        Err(e) => panic!("Expected InvalidAuthentication, got {:?}", e),
        Ok(_) => panic!("Expected get to fail before login"),
    }

    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_get_after_rejected_login_fails_without_network() {
    let transport = RecordingTransport::with_responses([HttpResponse::new(
        StatusCode::UNAUTHORIZED,
        "",
    )]);
    let mut client = client_over(&transport);

    assert!(client.login(&info()).await.is_err());
    assert!(client.get("/defects", None).is_err());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_handshake_order_and_requests() {
    let transport = RecordingTransport::with_responses([
        response_with_cookies(StatusCode::OK, &["A=1", "B=2"]),
        response_with_cookies(StatusCode::CREATED, &["C=3"]),
        HttpResponse::new(StatusCode::OK, r#"{"TotalResults":"0","entities":[]}"#),
    ]);
    let mut client = client_over(&transport);

    client.login(&info()).await.unwrap();
    assert_eq!(client.root_url(), Some("http://alm.local/qcbin"));
    assert_eq!(client.session_cookie(), Some("A=1;B=2;C=3"));

    let options = QueryOptions::new().page_size(10).fields(["a", "b"]);
    let response = client.get("/x", Some(&options)).unwrap().await.unwrap();
    let records = response.data.into_records().unwrap();
    assert!(records.is_empty());
    assert_eq!(records.total_results, 0);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);

    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(requests[0].url, "http://alm.local/qcbin/authentication-point/authenticate");
    let auth = requests[0].basic_auth.as_ref().unwrap();
    assert_eq!((auth.user.as_str(), auth.password.as_str()), ("bob", "pw"));

    assert_eq!(requests[1].method, Method::POST);
    assert_eq!(requests[1].url, "http://alm.local/qcbin/rest/site-session");
    assert_eq!(requests[1].headers.get("cookie").unwrap(), "A=1;B=2");
    assert!(requests[1].basic_auth.is_none());

    assert_eq!(requests[2].method, Method::GET);
    assert_eq!(
        requests[2].url,
        "http://alm.local/qcbin/rest/domains/D/projects/P/x?page-size=10&fields=a,b"
    );
    assert_eq!(requests[2].headers.get("cookie").unwrap(), "A=1;B=2;C=3");
}

#[tokio::test]
async fn test_session_failure_stops_after_two_requests() {
    let transport = RecordingTransport::with_responses([
        response_with_cookies(StatusCode::OK, &["A=1"]),
        HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
    ]);
    let mut client = client_over(&transport);

    let result = client.login(&info()).await;

    assert!(matches!(
        result,
        Err(Error::SessionEstablishment { status }) if status == StatusCode::INTERNAL_SERVER_ERROR
    ));
    assert!(client.is_authenticated());
    assert_eq!(client.session_cookie(), Some("A=1"));
    assert_eq!(transport.requests().len(), 2);
}
