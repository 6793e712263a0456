//! HTTP feed adapter against a local mock upstream.

use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use shopwatch::config::schema::HttpConfig;
use shopwatch::resilience::{build_http_client, RetryPolicy};
use shopwatch::sources::{FeedShape, HttpJsonSource, SourceAdapter, SourceError};

mod common;
use common::start_programmable_backend;

fn source(addr: std::net::SocketAddr, shape: FeedShape) -> HttpJsonSource {
    let client = build_http_client(&HttpConfig::default()).unwrap();
    let url = url::Url::parse(&format!("http://{addr}/feed")).unwrap();
    HttpJsonSource::new("test.feed", client, url, shape).with_retry(RetryPolicy::new(4, 1, 5))
}

#[tokio::test]
async fn test_retries_through_transient_503() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = start_programmable_backend(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                (503, r#"{"error":"busy"}"#.to_string())
            } else {
                (200, json!({"data": [{"method": "MBWay"}, {"method": "ATM"}]}).to_string())
            }
        }
    })
    .await;

    let rows = source(addr, FeedShape::Data).fetch().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = start_programmable_backend(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { (404, r#"{"error":"missing"}"#.to_string()) }
    })
    .await;

    let err = source(addr, FeedShape::Data).fetch().await.unwrap_err();
    assert_eq!(err, SourceError::Status(404));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gives_up_after_four_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = start_programmable_backend(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { (502, String::new()) }
    })
    .await;

    let err = source(addr, FeedShape::ListOrItems).fetch().await.unwrap_err();
    assert_eq!(err, SourceError::Status(502));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let addr = start_programmable_backend(|| async { (200, "<html>maintenance</html>".to_string()) }).await;

    let err = source(addr, FeedShape::Data).fetch().await.unwrap_err();
    assert!(matches!(err, SourceError::Malformed(_)));
}

#[tokio::test]
async fn test_severity_buckets_feed() {
    let addr = start_programmable_backend(|| async {
        let body = json!({
            "warning": [{"id_product": 10, "days_out_of_stock": 40}],
            "critical": [{"id_product": 11, "days_out_of_stock": 90}]
        });
        (200, body.to_string())
    })
    .await;

    let rows = source(addr, FeedShape::SeverityBuckets).fetch().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["severity"], "critical");
}

#[tokio::test]
async fn test_unreachable_upstream_is_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = build_http_client(&HttpConfig::default()).unwrap();
    let url = url::Url::parse(&format!("http://{addr}/feed")).unwrap();
    let err = HttpJsonSource::new("test.feed", client, url, FeedShape::Data)
        .with_retry(RetryPolicy::none())
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Transport(_)));
}
