use redrelay::client::{ApiClient, ClientError, WorkflowKind, WorkflowSubmission};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    body: String,
}

struct MockExecutorServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockExecutorServer {
    fn start<F>(expected_requests: usize, responder: F) -> Self
    where
        F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let requests_for_thread = Arc::clone(&requests);
        let responder = Arc::new(responder);

        let handle = thread::spawn(move || {
            for _ in 0..expected_requests {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

                let mut request_line = String::new();
                reader
                    .read_line(&mut request_line)
                    .expect("read request line");
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or("GET").to_string();
                let path = parts.next().unwrap_or("/").to_string();

                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).expect("read header");
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    let lower = line.to_ascii_lowercase();
                    if lower.starts_with("content-length:") {
                        content_length = line
                            .split_once(':')
                            .map(|(_, v)| v.trim().parse::<usize>().unwrap_or(0))
                            .unwrap_or(0);
                    }
                }

                let mut body = vec![0_u8; content_length];
                if content_length > 0 {
                    reader.read_exact(&mut body).expect("read body");
                }
                let body = String::from_utf8_lossy(&body).to_string();

                requests_for_thread
                    .lock()
                    .expect("lock requests")
                    .push(RecordedRequest {
                        method: method.clone(),
                        path: path.clone(),
                        body,
                    });

                let (status, response_body) = responder(&method, &path);
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response_body.len(),
                    response_body
                );
                stream
                    .write_all(response.as_bytes())
                    .expect("write response");
            }
        });

        Self {
            base_url: format!("http://{addr}/api"),
            requests,
            handle: Some(handle),
        }
    }

    fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("join mock server");
        }
        self.requests.lock().expect("lock requests").clone()
    }
}

#[test]
fn execute_tool_posts_the_resolved_payload_and_normalizes_output() {
    let server = MockExecutorServer::start(1, |_, _| {
        (200, r#"{"success":true,"output":"22/tcp open"}"#.to_string())
    });
    let client = ApiClient::with_base(server.base_url.clone());

    let outcome = client.execute_tool("nmap", "  example.com ").expect("outcome");
    assert!(outcome.success);
    assert_eq!(outcome.output, "22/tcp open");

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/api/execute");
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).expect("json body");
    assert_eq!(body["tool"], "nmap");
    // Targets are trimmed before dispatch.
    assert_eq!(body["target"], "example.com");
}

#[test]
fn result_field_and_raw_body_fallbacks_apply_in_order() {
    let server = MockExecutorServer::start(2, |_, path| {
        assert_eq!(path, "/api/execute");
        (200, r#"{"result":{"ports":[80,443]}}"#.to_string())
    });
    let client = ApiClient::with_base(server.base_url.clone());

    let outcome = client.execute_tool("port_scan", "example.com").expect("outcome");
    assert!(outcome.success);
    assert!(outcome.output.contains("443"));

    let outcome = client.execute_tool("whois", "example.com").expect("outcome");
    assert!(outcome.output.contains("ports"));
    server.finish();
}

#[test]
fn non_2xx_responses_become_failed_outcomes() {
    let server =
        MockExecutorServer::start(1, |_, _| (500, r#"{"detail":"boom"}"#.to_string()));
    let client = ApiClient::with_base(server.base_url.clone());

    let outcome = client.execute_tool("vuln_scan", "example.com").expect("outcome");
    assert!(!outcome.success);
    assert!(outcome.output.contains("vuln_scan failed"));
    server.finish();
}

#[test]
fn remote_reported_failure_keeps_the_success_flag() {
    let server = MockExecutorServer::start(1, |_, _| {
        (
            200,
            r#"{"success":false,"output":"target unreachable"}"#.to_string(),
        )
    });
    let client = ApiClient::with_base(server.base_url.clone());

    let outcome = client.execute_tool("web_crawl", "example.com").expect("outcome");
    assert!(!outcome.success);
    assert_eq!(outcome.output, "target unreachable");
    server.finish();
}

#[test]
fn workflow_submission_decodes_acceptance_and_inline_results() {
    let server = MockExecutorServer::start(2, |_, path| {
        assert_eq!(path, "/api/workflow");
        (200, r#"{"workflow_id":"wf-7"}"#.to_string())
    });
    let client = ApiClient::with_base(server.base_url.clone());

    let submission = client
        .submit_workflow("scan", "example.com", WorkflowKind::Full)
        .expect("submission");
    assert_eq!(
        submission,
        WorkflowSubmission::Accepted {
            workflow_id: "wf-7".to_string()
        }
    );

    let submission = client
        .submit_workflow("scan", "example.com", WorkflowKind::ReconOnly)
        .expect("submission");
    assert!(matches!(submission, WorkflowSubmission::Accepted { .. }));

    let requests = server.finish();
    let body: serde_json::Value = serde_json::from_str(&requests[1].body).expect("json body");
    assert_eq!(body["workflow_type"], "recon_only");
    assert_eq!(body["objective"], "scan");
}

#[test]
fn inline_workflow_results_are_decoded_without_an_id() {
    let server = MockExecutorServer::start(1, |_, _| {
        (
            200,
            r#"{"history":[{"agent":"Recon","action":"scan","result":"ok","timestamp":"t1"}],"agents_used":1,"timestamp":"t2"}"#
                .to_string(),
        )
    });
    let client = ApiClient::with_base(server.base_url.clone());

    let submission = client
        .submit_workflow("scan", "example.com", WorkflowKind::Full)
        .expect("submission");
    let WorkflowSubmission::Completed(result) = submission else {
        panic!("expected an inline result");
    };
    assert_eq!(result.agents_used, 1);
    assert_eq!(result.history[0].agent, "Recon");
    server.finish();
}

#[test]
fn agents_status_round_trips_the_descriptor_fields() {
    let server = MockExecutorServer::start(1, |method, path| {
        assert_eq!(method, "GET");
        assert_eq!(path, "/api/agents/status");
        (
            200,
            r#"{"ai_enabled":true,"agents":[{"name":"Recon","model":"gemini-2.0-flash","memory_size":3,"ai_enabled":true}]}"#
                .to_string(),
        )
    });
    let client = ApiClient::with_base(server.base_url.clone());

    let status = client.fetch_agents_status().expect("status");
    assert!(status.ai_enabled);
    assert_eq!(status.agents.len(), 1);
    assert_eq!(status.agents[0].name, "Recon");
    assert_eq!(status.agents[0].memory_size, 3);
    server.finish();
}

#[test]
fn clear_history_issues_a_delete() {
    let server = MockExecutorServer::start(1, |method, path| {
        assert_eq!(method, "DELETE");
        assert_eq!(path, "/api/history");
        (200, r#"{"success":true}"#.to_string())
    });
    let client = ApiClient::with_base(server.base_url.clone());
    client.clear_remote_history().expect("clear");
    server.finish();
}

#[test]
fn malformed_json_in_a_decoded_endpoint_is_a_decode_error() {
    let server = MockExecutorServer::start(1, |_, _| (200, "not json".to_string()));
    let client = ApiClient::with_base(server.base_url.clone());
    let err = client.fetch_agents_status().expect_err("decode failure");
    assert!(matches!(err, ClientError::Decode(_)));
    server.finish();
}
