//! End-to-end pipeline tests over an in-memory transport.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use courier_client::{
    CancellationToken, Client, ClientBuilder, ClientError, Interceptor, RequestConfig, Response,
    ResponseBody, TransportBody, TransportRequest, TransportResponse, transport_fn,
};
use futures::StreamExt;
use http::StatusCode;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Instant;

/// Route `tracing` output through the test harness.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Copy)]
enum Step {
    Status(u16),
    Fail,
    Hang,
    /// Headers arrive, the body never finishes.
    Stall,
}

/// Replays `steps` in order, then answers 200. Records when each attempt
/// started.
#[derive(Clone, Default)]
struct Script {
    steps: Arc<Mutex<VecDeque<Step>>>,
    starts: Arc<Mutex<Vec<Instant>>>,
}

impl Script {
    fn new(steps: &[Step]) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.iter().copied().collect())),
            starts: Arc::default(),
        }
    }

    fn client(&self, configure: impl FnOnce(ClientBuilder) -> ClientBuilder) -> Client {
        let script = self.clone();
        let transport = transport_fn(move |request: TransportRequest| {
            script.starts.lock().push(Instant::now());
            let step = script.steps.lock().pop_front().unwrap_or(Step::Status(200));
            async move {
                match step {
                    Step::Status(code) => {
                        let status = StatusCode::from_u16(code).unwrap();
                        let body = json!({"status": code, "url": request.url});
                        Ok(TransportResponse::new(
                            status,
                            TransportBody::full(Bytes::from(body.to_string())),
                        )
                        .with_header("content-type", "application/json"))
                    }
                    Step::Fail => Err(ClientError::network("connection reset")),
                    Step::Hang => {
                        request.cancellation.cancelled().await;
                        Err(ClientError::Aborted)
                    }
                    Step::Stall => {
                        let body = futures::stream::iter(vec![Ok(Bytes::from_static(b"{\"par"))])
                            .chain(futures::stream::pending());
                        Ok(TransportResponse::new(
                            StatusCode::OK,
                            TransportBody::streaming(body),
                        ))
                    }
                }
            }
        });
        configure(Client::builder().base_url("http://api.test").transport(transport))
            .build()
            .unwrap()
    }

    fn attempts(&self) -> usize {
        self.starts.lock().len()
    }

    fn gaps(&self) -> Vec<Duration> {
        self.starts.lock().windows(2).map(|w| w[1] - w[0]).collect()
    }
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test(start_paused = true)]
async fn retries_with_doubling_backoff() {
    init_tracing();
    let script = Script::new(&[Step::Fail, Step::Fail]);
    let client = script.client(|b| b.retry(3).retry_delay(Duration::from_millis(100)));

    let response = client.get("/flaky").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(script.attempts(), 3);
    assert_eq!(
        script.gaps(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test(start_paused = true)]
async fn default_retry_delay_is_one_second() {
    let script = Script::new(&[Step::Status(502)]);
    let client = script.client(|b| b.retry(1));

    client.get("/x").await.unwrap();
    assert_eq!(script.gaps(), vec![Duration::from_secs(1)]);
}

#[tokio::test(start_paused = true)]
async fn not_found_is_returned_without_retry() {
    let script = Script::new(&[Step::Status(404)]);
    let client = script.client(|b| b.retry(3));

    let response = client.get("/missing").await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.status_text(), "Not Found");
    assert_eq!(script.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn final_server_error_is_a_response() {
    let script = Script::new(&[Step::Status(503), Step::Status(503), Step::Status(503)]);
    let client = script.client(|b| b.retry(2).retry_delay(Duration::from_millis(10)));

    let response = client.get("/down").await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body().as_json().unwrap()["status"], 503);
    assert_eq!(script.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn network_error_after_budget_is_raised() {
    let script = Script::new(&[Step::Fail, Step::Fail]);
    let client = script.client(|b| b.retry(1).retry_delay(Duration::from_millis(10)));

    let err = client.get("/x").await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    assert_eq!(script.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn timed_out_attempt_is_retried() {
    let script = Script::new(&[Step::Hang]);
    let client = script.client(|b| {
        b.timeout(Duration::from_millis(50))
            .retry(1)
            .retry_delay(Duration::from_millis(100))
    });

    let response = client.get("/slow").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(script.gaps(), vec![Duration::from_millis(150)]);
}

#[tokio::test(start_paused = true)]
async fn stalled_body_times_out_and_is_retried() {
    let script = Script::new(&[Step::Stall]);
    let client = script.client(|b| {
        b.timeout(Duration::from_millis(50))
            .retry(1)
            .retry_delay(Duration::from_millis(100))
    });

    let response = client.get("/slow-body").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_json().unwrap()["status"], 200);
    assert_eq!(script.gaps(), vec![Duration::from_millis(150)]);
}

#[tokio::test(start_paused = true)]
async fn stalled_body_without_budget_is_a_timeout() {
    let script = Script::new(&[Step::Stall]);
    let client = script.client(|b| b.timeout(Duration::from_millis(50)));

    let err = client.get("/slow-body").await.unwrap_err();

    assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(50)));
    assert_eq!(script.attempts(), 1);
    assert_eq!(client.pending_calls(), 0);
    assert_eq!(client.gate().active(), 0);
}

#[tokio::test(start_paused = true)]
async fn caller_cancellation_is_never_retried() {
    let script = Script::new(&[Step::Hang, Step::Hang, Step::Hang]);
    let client = script.client(|b| b.retry(5));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = client
        .execute(RequestConfig::get("/x").cancellation(token))
        .await
        .unwrap_err();

    assert!(err.is_abort());
    assert_eq!(script.attempts(), 1);
    assert_eq!(client.pending_calls(), 0);
}

// ============================================================================
// Concurrency gate
// ============================================================================

#[tokio::test(start_paused = true)]
async fn gate_admits_in_arrival_order() {
    init_tracing();
    let order = Arc::new(Mutex::new(Vec::new()));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let transport = {
        let order = order.clone();
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        transport_fn(move |request: TransportRequest| {
            order.lock().push(request.url.clone());
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            let in_flight = in_flight.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(TransportResponse::new(StatusCode::OK, TransportBody::empty()))
            }
        })
    };
    let client = Client::builder()
        .base_url("http://api.test")
        .max_concurrent(2)
        .transport(transport)
        .build()
        .unwrap();

    let mut tasks = Vec::new();
    for name in ["a", "b", "c", "d", "e"] {
        let client = client.clone();
        tasks.push(tokio::spawn(async move { client.get(format!("/{name}")).await }));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(client.gate().active(), 2);
    assert_eq!(client.gate().waiting(), 3);

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().status(), StatusCode::OK);
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(
        *order.lock(),
        ["a", "b", "c", "d", "e"].map(|n| format!("http://api.test/{n}"))
    );
    assert_eq!(client.gate().active(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_waiter_leaves_the_queue() {
    let script = Script::new(&[Step::Hang]);
    let client = script.client(|b| b.max_concurrent(1));

    let busy = tokio::spawn({
        let client = client.clone();
        async move { client.get("/busy").await }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;

    let token = CancellationToken::new();
    let queued = tokio::spawn({
        let client = client.clone();
        let token = token.clone();
        async move {
            client
                .execute(RequestConfig::get("/queued").cancellation(token))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(client.gate().waiting(), 1);

    token.cancel();
    assert!(queued.await.unwrap().unwrap_err().is_abort());
    assert_eq!(client.gate().waiting(), 0);
    assert_eq!(script.attempts(), 1);

    client.cancel_all();
    assert!(busy.await.unwrap().unwrap_err().is_abort());
    assert_eq!(client.gate().active(), 0);
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cache_entry_expires_after_ttl() {
    init_tracing();
    let script = Script::new(&[]);
    let client = script.client(|b| b.cache(true).cache_time(Duration::from_secs(1)));

    client.get("/users").await.unwrap();
    tokio::time::sleep(Duration::from_millis(999)).await;
    let hit = client.get("/users").await.unwrap();
    assert!(hit.is_cached());
    assert_eq!(script.attempts(), 1);

    tokio::time::sleep(Duration::from_millis(1)).await;
    let miss = client.get("/users").await.unwrap();
    assert!(!miss.is_cached());
    assert_eq!(script.attempts(), 2);
}

#[tokio::test]
async fn derived_keys_ignore_member_order() {
    let script = Script::new(&[]);
    let client = script.client(|b| b.cache(true));

    let first = RequestConfig::post("/search")
        .param("b", 2)
        .param("a", 1)
        .json(json!({"q": "rust", "limit": 10}));
    let second = RequestConfig::post("/search")
        .param("a", 1)
        .param("b", 2)
        .json(json!({"limit": 10, "q": "rust"}));

    client.execute(first).await.unwrap();
    assert!(client.execute(second).await.unwrap().is_cached());
    assert_eq!(script.attempts(), 1);

    client.execute(RequestConfig::post("/search").param("a", 2)).await.unwrap();
    assert_eq!(script.attempts(), 2);
}

#[tokio::test]
async fn error_statuses_are_cached_too() {
    let script = Script::new(&[Step::Status(404)]);
    let client = script.client(|b| b.cache(true));

    let miss = client.get("/gone").await.unwrap();
    assert_eq!(miss.status(), StatusCode::NOT_FOUND);
    assert!(!miss.is_cached());

    let hit = client.get("/gone").await.unwrap();
    assert!(hit.is_cached());
    assert_eq!(hit.body(), miss.body());
    assert_eq!(hit.body().as_json().unwrap()["status"], 404);
    assert_eq!(script.attempts(), 1);
}

#[tokio::test]
async fn caching_is_opt_in() {
    let script = Script::new(&[]);
    let client = script.client(|b| b);

    client.get("/a").await.unwrap();
    client.get("/a").await.unwrap();
    assert_eq!(script.attempts(), 2);
    assert!(client.cache().is_empty());
}

// ============================================================================
// Interceptors
// ============================================================================

fn append_tag(tag: &'static str) -> Interceptor<RequestConfig> {
    Interceptor::new().success(move |mut config: RequestConfig| async move {
        let trail = config
            .get_headers()
            .get("x-trail")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        config
            .headers_mut()
            .insert("x-trail", format!("{trail}{tag}").parse().unwrap());
        Ok(config)
    })
}

#[tokio::test]
async fn request_interceptors_compose_in_order() {
    let script = Script::new(&[]);
    let client = script.client(|b| b);

    let first = client.interceptors().request.register(append_tag("1"));
    client.interceptors().request.register(append_tag("2"));

    let response = client.get("/x").await.unwrap();
    assert_eq!(response.config().get_headers()["x-trail"], "12");

    assert!(client.interceptors().request.unregister(first));
    let response = client.get("/x").await.unwrap();
    assert_eq!(response.config().get_headers()["x-trail"], "2");

    let third = client.interceptors().request.register(append_tag("3"));
    assert_ne!(third, first);
    let response = client.get("/x").await.unwrap();
    assert_eq!(response.config().get_headers()["x-trail"], "23");
}

#[tokio::test]
async fn response_interceptors_see_errors_and_may_recover() {
    let script = Script::new(&[Step::Fail]);
    let client = script.client(|b| b);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    client.interceptors().response.register(
        Interceptor::<Response>::new().failure(move |err: ClientError| {
            log.lock().push(err.to_string());
            async move { Err(err) }
        }),
    );
    client.interceptors().response.register(
        Interceptor::<Response>::new().failure(|_err: ClientError| async {
            Ok(Response::new(StatusCode::OK, ResponseBody::Text("stale".into())))
        }),
    );

    let response = client.get("/x").await.unwrap();
    assert_eq!(response.text(), "stale");
    assert_eq!(seen.lock().len(), 1);
    assert!(seen.lock()[0].contains("connection reset"));
}

#[tokio::test]
async fn response_interceptor_can_raise() {
    let script = Script::new(&[Step::Status(401)]);
    let client = script.client(|b| b);
    client.interceptors().response.register(
        Interceptor::<Response>::new()
            .success(|response: Response| async move { response.error_for_status() }),
    );

    let err = client.get("/private").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(Debug, Deserialize, PartialEq)]
struct Delta {
    text: String,
}

fn streaming_client(chunks: &'static [&'static str]) -> Client {
    Client::builder()
        .base_url("http://api.test")
        .transport(transport_fn(move |_request: TransportRequest| async move {
            let body = futures::stream::iter(
                chunks
                    .iter()
                    .map(|chunk| Ok::<_, ClientError>(Bytes::from_static(chunk.as_bytes()))),
            );
            Ok(TransportResponse::new(StatusCode::OK, TransportBody::streaming(body))
                .with_header("content-type", "text/event-stream"))
        }))
        .build()
        .unwrap()
}

#[tokio::test]
async fn stream_stops_at_sentinel() {
    let client = streaming_client(&[
        "data: {\"text\":\"a\"}\n\n",
        "data: [DONE]\n",
        "data: {\"text\":\"b\"}\n",
    ]);

    let response = client.stream::<Delta>(RequestConfig::get("/events")).await.unwrap();
    assert_eq!(response.headers()["content-type"], "text/event-stream");

    let events: Vec<Delta> = response
        .into_events()
        .map(|event| event.unwrap())
        .collect()
        .await;
    assert_eq!(events, vec![Delta { text: "a".into() }]);
}

#[tokio::test]
async fn stream_skips_malformed_lines() {
    let client = streaming_client(&["data: {bad json\n", "data: {\"text\":\"ok\"}\n"]);

    let mut events = client
        .stream::<Delta>(RequestConfig::get("/events"))
        .await
        .unwrap()
        .into_events();

    assert_eq!(events.next().await.unwrap().unwrap(), Delta { text: "ok".into() });
    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn stream_mixes_sse_and_ndjson() {
    let client = streaming_client(&["{\"n\":1}\r\ndata: {\"n\"", ":2}\n\n{\"n\":3}"]);

    let events: Vec<Value> = client
        .stream_json(RequestConfig::get("/events"))
        .await
        .unwrap()
        .into_events()
        .map(|event| event.unwrap())
        .collect()
        .await;
    assert_eq!(events, vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
}
