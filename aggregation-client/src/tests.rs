use aggregation_test::server::{Reply, TestServer};
use chrono::{TimeZone, Utc};

use super::*;

fn session(server: &TestServer) -> Session {
    let client = Client::builder().build().unwrap();
    client
        .session(Endpoint {
            base_url: server.url("/"),
            host: server.host(),
            region: "us-east-1".into(),
            service: "execute-api".into(),
            credentials: Credentials::new("access", "secret"),
        })
        .unwrap()
}

#[tokio::test]
async fn gets_finished_job() {
    aggregation_test::tracing::init();
    let server = TestServer::new().await;
    server.script("job-1", [Reply::finished("SUCCESS", 0)]);

    let response = session(&server).get_job("job-1").send().await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    let record = response.record.unwrap();
    assert_eq!(record.job_status, JobStatus::Finished);
    assert_eq!(record.return_code, "SUCCESS");
    assert_eq!(record.error_count, 0);
    assert_eq!(
        record.received_at,
        Utc.with_ymd_and_hms(2022, 9, 16, 5, 36, 37).unwrap() + chrono::Duration::milliseconds(904)
    );
    assert_eq!(
        record.finished_at - record.received_at,
        chrono::Duration::minutes(10)
    );
}

#[tokio::test]
async fn signs_get_job_requests() {
    let server = TestServer::new().await;
    server.script("job-1", [Reply::in_progress()]);

    session(&server).get_job("job-1").send().await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, reqwest::Method::GET);
    assert_eq!(request.path, "/stage/v1alpha/getJob");
    assert_eq!(request.query.as_deref(), Some("job_request_id=job-1"));

    let authorization = request.header("authorization").unwrap();
    assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=access/"));
    assert!(authorization.contains("/us-east-1/execute-api/aws4_request, "));
    assert!(authorization.contains("SignedHeaders=host;x-amz-date, "));
    assert_eq!(request.header("x-amz-date").map(str::len), Some(16));
    assert_eq!(request.header("x-amz-content-sha256"), None);
}

#[tokio::test]
async fn error_status_has_no_record() {
    let server = TestServer::new().await;
    server.script("job-1", [Reply::error(StatusCode::BAD_REQUEST)]);

    let response = session(&server).get_job("job-1").send().await.unwrap();

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.record, None);
}

#[tokio::test]
async fn non_standard_error_status_has_no_record() {
    let server = TestServer::new().await;
    let status = StatusCode::from_u16(600).unwrap();
    server.script("job-1", [Reply::error(status)]);

    let response = session(&server).get_job("job-1").send().await.unwrap();

    assert_eq!(response.status, status);
    assert_eq!(response.record, None);
}

#[test]
fn error_statuses() {
    assert!(!crate::client::is_error_status(StatusCode::OK));
    assert!(!crate::client::is_error_status(StatusCode::PERMANENT_REDIRECT));
    assert!(crate::client::is_error_status(StatusCode::BAD_REQUEST));
    assert!(crate::client::is_error_status(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(crate::client::is_error_status(StatusCode::from_u16(600).unwrap()));
    assert!(crate::client::is_error_status(StatusCode::from_u16(999).unwrap()));

    let response = CreateJobResponse {
        status: StatusCode::from_u16(700).unwrap(),
    };
    assert!(!response.is_accepted());
}

#[tokio::test]
async fn unknown_job_is_an_error_status() {
    let server = TestServer::new().await;

    let response = session(&server).get_job("missing").send().await.unwrap();

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.record, None);
}

#[tokio::test]
async fn invalid_status_body_fails() {
    let server = TestServer::new().await;
    server.script(
        "job-1",
        [Reply {
            status: StatusCode::OK,
            body: serde_json::json!({"job_status": "FINISHED"}),
        }],
    );

    let result = session(&server).get_job("job-1").send().await;
    assert!(matches!(result, Err(Error::Reqwest(_))));
}

#[tokio::test]
async fn creates_signed_job() {
    let server = TestServer::new().await;

    let request = CreateJobRequest {
        job_request_id: "job-1".into(),
        input_data_blob_prefix: Some("input".into()),
        input_data_bucket_name: Some("bucket".into()),
        output_data_blob_prefix: "output-data/job-1/output".into(),
        output_data_bucket_name: Some("bucket".into()),
        postback_url: "fizz.com/api/buzz".into(),
        job_parameters: JobParameters {
            attribution_report_to: Some("https://example.com".into()),
            debug_run: Some("false".into()),
            ..Default::default()
        },
    };
    let response = session(&server).create_job(&request).send().await.unwrap();
    assert!(response.is_accepted());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let recorded = &requests[0];
    assert_eq!(recorded.method, reqwest::Method::POST);
    assert_eq!(recorded.path, "/stage/v1alpha/createJob");
    assert_eq!(recorded.header("content-type"), Some("application/json"));
    assert_eq!(
        recorded.header("x-amz-content-sha256"),
        Some(auth::payload_hash(recorded.body.as_bytes()).as_str())
    );
    assert!(
        recorded
            .header("authorization")
            .unwrap()
            .contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date, ")
    );

    let sent: CreateJobRequest = serde_json::from_str(&recorded.body).unwrap();
    assert_eq!(sent, request);
}

#[tokio::test]
async fn rejected_job_is_not_accepted() {
    let server = TestServer::new().await;
    server.create_reply(Reply::error(StatusCode::INTERNAL_SERVER_ERROR));

    let request = CreateJobRequest {
        job_request_id: "job-1".into(),
        input_data_blob_prefix: None,
        input_data_bucket_name: None,
        output_data_blob_prefix: "output-data/job-1/summary.avro".into(),
        output_data_bucket_name: None,
        postback_url: "fizz.com/api/buzz".into(),
        job_parameters: JobParameters::default(),
    };
    let response = session(&server).create_job(&request).send().await.unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.is_accepted());
}

#[test]
fn rejects_invalid_base_url() {
    let client = Client::builder().build().unwrap();
    let result = client.session(Endpoint {
        base_url: "foo.bar".into(),
        host: "foo.bar".into(),
        region: "us-east-1".into(),
        service: "execute-api".into(),
        credentials: Credentials::new("access", "secret"),
    });

    assert!(matches!(result, Err(Error::InvalidUrl { .. })));
}
