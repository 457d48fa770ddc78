use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use riconferme_engine::{
    params, ApiError, CookieJar, CookieStore, Method, ReqwestTransport, RequestEngine,
    TransportErrorKind, TransportSettings,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

mod support;
use support::ReplayTransport;

fn fast_settings() -> TransportSettings {
    TransportSettings {
        request_timeout: Duration::from_millis(200),
        ..TransportSettings::default()
    }
}

fn engine_for(server: &MockServer) -> RequestEngine {
    let transport = ReqwestTransport::new(fast_settings()).expect("client builds");
    RequestEngine::new(format!("{}/w/api.php", server.uri()), Arc::new(transport))
}

/// Delays only the first `slow` requests past the client timeout.
struct SlowThenFast {
    slow: usize,
    seen: AtomicUsize,
}

impl Respond for SlowThenFast {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.seen.fetch_add(1, Ordering::SeqCst);
        let template = ResponseTemplate::new(200).set_body_json(json!({"query": {"ok": true}}));
        if n < self.slow {
            template.set_delay(Duration::from_millis(1500))
        } else {
            template
        }
    }
}

#[tokio::test]
async fn get_requests_carry_format_parameters_and_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "query"))
        .and(query_param("format", "json"))
        .and(query_param("formatversion", "2"))
        .and(header("cookie", "session=abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "UserName=Bot; path=/; secure")
                .set_body_json(json!({"query": {"general": {}}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let mut jar = CookieJar::new();
    jar.store("session", "abc");

    let body = engine
        .execute_single(&mut jar, Method::Get, &params([("action", "query")]))
        .await
        .expect("request ok");

    assert_eq!(body["query"]["general"], json!({}));
    assert_eq!(jar.get("UserName"), Some("Bot"));
    let received = server.received_requests().await.unwrap();
    assert!(!received[0].url.query().unwrap_or_default().contains("maxlag"));
}

#[tokio::test]
async fn post_requests_add_maxlag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/w/api.php"))
        .and(body_string_contains("action=edit"))
        .and(body_string_contains("maxlag=5"))
        .and(body_string_contains("text=a+b%26c"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"edit": {"result": "Success"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let mut jar = CookieJar::new();
    engine
        .execute_single(
            &mut jar,
            Method::Post,
            &params([("action", "edit"), ("text", "a b&c")]),
        )
        .await
        .expect("post ok");
}

#[tokio::test]
async fn basic_client_still_reaches_the_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/w/api.php"))
        .and(body_string_contains("action=edit"))
        .and(header("cookie", "session=abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"edit": {"result": "Success"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::basic().expect("default client builds");
    let engine = RequestEngine::new(format!("{}/w/api.php", server.uri()), Arc::new(transport));
    let mut jar = CookieJar::new();
    jar.store("session", "abc");
    let body = engine
        .execute_single(&mut jar, Method::Post, &params([("action", "edit")]))
        .await
        .expect("post ok");
    assert_eq!(body["edit"]["result"], "Success");
}

#[tokio::test]
async fn timeout_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(SlowThenFast {
            slow: 1,
            seen: AtomicUsize::new(0),
        })
        .expect(2)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let body = engine
        .execute_single(&mut CookieJar::new(), Method::Get, &params([("action", "query")]))
        .await
        .expect("second attempt succeeds");
    assert_eq!(body["query"]["ok"], true);
}

#[tokio::test]
async fn second_timeout_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(SlowThenFast {
            slow: 2,
            seen: AtomicUsize::new(0),
        })
        .expect(2)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let err = engine
        .execute_single(&mut CookieJar::new(), Method::Get, &params([("action", "query")]))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "unexpected error {err:?}");
}

#[tokio::test]
async fn http_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let err = engine
        .execute_single(&mut CookieJar::new(), Method::Get, &params([("action", "query")]))
        .await
        .unwrap_err();
    match err {
        ApiError::Transport(err) => assert_eq!(err.kind, TransportErrorKind::HttpStatus(503)),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn api_error_and_invalid_json_are_classified() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_json(json!({"error": {"code": "protectedpage", "info": "locked"}}));
    transport.push(Ok(riconferme_engine::HttpResponse::json("<html>")));
    let engine = RequestEngine::new("https://it.example.org/w/api.php", transport.clone());
    let mut jar = CookieJar::new();

    let protected = engine
        .execute_single(&mut jar, Method::Post, &params([("action", "edit")]))
        .await;
    assert_eq!(protected, Err(ApiError::ProtectedPage("locked".into())));

    let garbled = engine
        .execute_single(&mut jar, Method::Get, &params([("action", "query")]))
        .await;
    assert!(matches!(garbled, Err(ApiError::UnexpectedResponse(_))));
}

#[tokio::test]
async fn continuation_merges_into_original_parameters() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_json(json!({
        "continue": {"aufrom": "Carol", "continue": "-||"},
        "query": {"allusers": [{"name": "Alice"}, {"name": "Bob"}]}
    }));
    transport.push_json(json!({
        "query": {"allusers": [{"name": "Carol"}]}
    }));
    let engine = RequestEngine::new("https://it.example.org/w/api.php", transport.clone());
    let mut jar = CookieJar::new();

    let results = engine
        .execute_as_query(
            &mut jar,
            params([("action", "query"), ("list", "allusers"), ("augroup", "sysop"), ("aulimit", "max")]),
        )
        .unwrap();
    let names: Vec<String> = results
        .collect_all()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u["name"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(names, ["Alice", "Bob", "Carol"]);
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].param("aufrom"), None);
    assert_eq!(requests[1].param("aufrom"), Some("Carol"));
    assert_eq!(requests[1].param("augroup"), Some("sysop"));
    assert_eq!(requests[1].param("continue"), Some("-||"));
}

#[tokio::test]
async fn numeric_limit_stops_continuation() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_json(json!({
        "continue": {"rvcontinue": "123", "continue": "||"},
        "query": {"pages": [{"title": "P", "revisions": [{"revid": 1}]}]}
    }));
    let engine = RequestEngine::new("https://it.example.org/w/api.php", transport.clone());
    let mut jar = CookieJar::new();

    let pages = engine
        .execute_as_query(
            &mut jar,
            params([("action", "query"), ("prop", "revisions"), ("titles", "P"), ("rvlimit", "1")]),
        )
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert_eq!(pages.len(), 1);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn only_queries_can_continue() {
    let engine = RequestEngine::new("https://it.example.org/w/api.php", Arc::new(ReplayTransport::new()));
    let mut jar = CookieJar::new();
    let err = engine
        .execute_as_query(&mut jar, params([("action", "edit")]))
        .err();
    assert_eq!(err, Some(ApiError::NotAQuery("edit".into())));
}
