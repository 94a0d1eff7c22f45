use std::time::Duration;

use aggregation_client::{Client, CreateJobRequest, StatusCode};
use aggregation_test::server::{Reply, TestServer};
use loadtest::config::Poll;
use loadtest::trigger::JobTemplate;
use loadtest::{BatchInput, Checker, Error, TriggerInput, trigger, trigger_all};

fn input(server: &TestServer, num_requests: usize) -> TriggerInput {
    TriggerInput {
        access_key: "access".into(),
        secret_key: "secret".into(),
        host: server.host(),
        base_url: server.url("/"),
        region: "us-east-1".into(),
        service: "execute-api".into(),
        num_requests,
        time_between_requests: Duration::from_millis(10),
        job: JobTemplate {
            attribution_report_to: Some("https://example.com".into()),
            input_data_bucket_name: Some("aggregation-service-load-testing".into()),
            output_data_blob_prefix: Some("summary.avro".into()),
            debug_run: Some("true".into()),
            ..Default::default()
        },
    }
}

fn client() -> Client {
    Client::builder().build().unwrap()
}

#[tokio::test]
async fn creates_jobs() {
    aggregation_test::tracing::init();
    let server = TestServer::new().await;

    let report = trigger(&client(), input(&server, 3)).await.unwrap();

    assert_eq!(report.success, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.job_request_ids.len(), 3);
    assert_eq!(report.host, server.host());
    assert_eq!(report.region, "us-east-1");

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    for (request, id) in requests.iter().zip(&report.job_request_ids) {
        assert_eq!(request.path, "/stage/v1alpha/createJob");
        assert!(request.header("authorization").is_some());
        assert!(request.header("x-amz-content-sha256").is_some());

        let sent: CreateJobRequest = serde_json::from_str(&request.body).unwrap();
        assert_eq!(&sent.job_request_id, id);
        assert_eq!(
            sent.output_data_blob_prefix,
            format!("output-data/{id}/summary.avro")
        );
        assert_eq!(sent.postback_url, "fizz.com/api/buzz");
        assert_eq!(sent.job_parameters.debug_run.as_deref(), Some("true"));
    }
}

#[tokio::test]
async fn counts_rejected_jobs() {
    let server = TestServer::new().await;
    server.create_reply(Reply::error(StatusCode::BAD_REQUEST));

    let report = trigger(&client(), input(&server, 2)).await.unwrap();

    assert_eq!(report.success, 0);
    assert_eq!(report.failed, 2);
    assert!(report.job_request_ids.is_empty());
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn invalid_input_sends_nothing() {
    let server = TestServer::new().await;
    let valid = input(&server, 1);
    let invalid = TriggerInput {
        host: String::new(),
        ..input(&server, 1)
    };

    let result = trigger_all(&client(), vec![valid, invalid]).await;

    let Err(Error::InvalidInput { index, missing }) = result else {
        panic!("expected invalid input");
    };
    assert_eq!(index, 1);
    assert_eq!(missing, ["host"]);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn trigger_output_feeds_check() {
    let server = TestServer::new().await;
    let client = client();

    let reports = trigger_all(&client, vec![input(&server, 2), input(&server, 1)])
        .await
        .unwrap();
    assert_eq!(reports.len(), 2);

    for id in reports.iter().flat_map(|report| &report.job_request_ids) {
        server.script(id, [Reply::in_progress(), Reply::finished("SUCCESS", 0)]);
    }

    // round trip through JSON, the same way the command line passes results on
    let json = serde_json::to_string(&reports).unwrap();
    let batches: Vec<BatchInput> = serde_json::from_str(&json).unwrap();

    let checker = Checker::new(
        Poll {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        },
        1,
    );
    let report = checker.run(&client, batches).await.unwrap().report();

    assert_eq!(report.total_jobs, 3);
    assert_eq!(report.success_jobs, 3);
    assert_eq!(report.average_job_completion_time, Some(600.0));
}
