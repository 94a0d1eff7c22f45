//! Exposes an in-process fake of the aggregation job service for use in integration tests.
//!
//! ```
//! use aggregation_test::server::{Reply, TestServer};
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    server.script("job-1", [Reply::in_progress(), Reply::finished("SUCCESS", 0)]);
//!    let url = server.url("/");
//!    // point the client at the URL...
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};

/// Default `request_received_at` of scripted replies.
pub const RECEIVED_AT: &str = "2022-09-16T05:36:37.904Z";
/// Default `request_updated_at` of scripted replies, ten minutes after [`RECEIVED_AT`].
pub const UPDATED_AT: &str = "2022-09-16T05:46:37.904Z";

/// A canned response of the fake job service.
#[derive(Clone, Debug)]
pub struct Reply {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The JSON body.
    pub body: Value,
}

impl Reply {
    /// A job that has been received but not started.
    pub fn received() -> Self {
        Self::with_status("RECEIVED")
    }

    /// A job that is still being processed.
    pub fn in_progress() -> Self {
        Self::with_status("IN_PROGRESS")
    }

    /// A finished job with the given return code and a single error count entry.
    pub fn finished(return_code: &str, error_count: u64) -> Self {
        Self::finished_between(return_code, error_count, RECEIVED_AT, UPDATED_AT)
    }

    /// A finished job with explicit timestamps.
    pub fn finished_between(
        return_code: &str,
        error_count: u64,
        received_at: &str,
        updated_at: &str,
    ) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({
                "job_status": "FINISHED",
                "request_received_at": received_at,
                "request_updated_at": updated_at,
                "result_info": {
                    "return_code": return_code,
                    "error_summary": {"error_counts": [{"count": error_count}]},
                },
            }),
        }
    }

    /// An error response with the given status.
    pub fn error(status: StatusCode) -> Self {
        Self {
            status,
            body: json!({"error": "Something went wrong"}),
        }
    }

    fn with_status(job_status: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({
                "job_status": job_status,
                "request_received_at": RECEIVED_AT,
                "request_updated_at": RECEIVED_AT,
            }),
        }
    }
}

/// A request as received by the fake job service.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// The HTTP method.
    pub method: Method,
    /// The request path.
    pub path: String,
    /// The raw query string, if any.
    pub query: Option<String>,
    /// All request headers.
    pub headers: HeaderMap,
    /// The raw request body.
    pub body: String,
}

impl RecordedRequest {
    /// Returns the value of a header as string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[derive(Debug)]
struct Inner {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Mutex<Reply>,
    create_reply: Mutex<Reply>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Inner {
    /// Pops the next scripted reply for a job, repeating the last one once the script runs out.
    fn next_reply(&self, job_request_id: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(job_request_id) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) => script.front().cloned().unwrap(),
            None => self.fallback.lock().unwrap().clone(),
        }
    }

    fn record(&self, method: Method, uri: &Uri, headers: HeaderMap, body: String) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            headers,
            body,
        });
    }
}

/// An in-process fake job service for use in integration tests.
///
/// `getJob` replies are scripted per job request ID. Jobs without a script get the fallback
/// reply, which defaults to a `404`. `createJob` accepts every job with `202` unless configured
/// otherwise. The server listens on a random available port on localhost.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    inner: Arc<Inner>,
}

impl TestServer {
    /// Starts a new fake job service.
    pub async fn new() -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let inner = Arc::new(Inner {
            scripts: Mutex::default(),
            fallback: Mutex::new(Reply {
                status: StatusCode::NOT_FOUND,
                body: json!({"error": "job not found"}),
            }),
            create_reply: Mutex::new(Reply {
                status: StatusCode::ACCEPTED,
                body: json!({}),
            }),
            requests: Mutex::default(),
        });

        let app = Router::new()
            .route("/stage/v1alpha/getJob", get(get_job))
            .route("/stage/v1alpha/createJob", post(create_job))
            .with_state(inner.clone());

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            inner,
        }
    }

    /// Sets the sequence of `getJob` replies for one job.
    ///
    /// Replies are returned in order; the last one is repeated for all further requests.
    pub fn script(&self, job_request_id: &str, replies: impl IntoIterator<Item = Reply>) {
        let replies: VecDeque<_> = replies.into_iter().collect();
        assert!(!replies.is_empty(), "a script needs at least one reply");
        self.inner
            .scripts
            .lock()
            .unwrap()
            .insert(job_request_id.to_owned(), replies);
    }

    /// Sets the `getJob` reply for all jobs without a script.
    pub fn fallback(&self, reply: Reply) {
        *self.inner.fallback.lock().unwrap() = reply;
    }

    /// Sets the reply to all `createJob` requests.
    pub fn create_reply(&self, reply: Reply) {
        *self.inner.create_reply.lock().unwrap() = reply;
    }

    /// Returns all requests received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    /// Returns the `job_request_id` query parameter of all `getJob` requests, in order.
    pub fn polled_jobs(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|request| request.query.as_deref())
            .filter_map(|query| query.strip_prefix("job_request_id="))
            .map(str::to_owned)
            .collect()
    }

    /// Returns the address the server listens on, as `localhost:<port>`.
    pub fn host(&self) -> String {
        format!("localhost:{}", self.socket.port())
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn get_job(
    State(inner): State<Arc<Inner>>,
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    inner.record(method, &uri, headers, String::new());

    let job_request_id = query
        .as_deref()
        .and_then(|query| query.strip_prefix("job_request_id="))
        .unwrap_or_default();
    let reply = inner.next_reply(job_request_id);

    (reply.status, axum::Json(reply.body)).into_response()
}

async fn create_job(
    State(inner): State<Arc<Inner>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    inner.record(method, &uri, headers, body);

    let reply = inner.create_reply.lock().unwrap().clone();
    (reply.status, axum::Json(reply.body)).into_response()
}
