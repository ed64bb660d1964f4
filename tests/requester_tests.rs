//! Tests for the rate-limited requester against a local HTTP stub, and for
//! proxy installation through the exchange profile.

mod support;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use url::Url;
use venuekit::config::{ConfigStore, FeaturesConfig, FeaturesEnabledConfig, FeaturesSupportedConfig};
use venuekit::error::Error;
use venuekit::exchange::Exchange;
use venuekit::market::MarketDataCache;
use venuekit::request::{RateLimit, RequestSpec, Requester};
use venuekit::testkit::config;
use venuekit::testkit::exchange::{defaults, MockExchange};

use support::mock_config;

/// Serve `status`/`body` to every connection and forward each raw request.
async fn serve(status: &'static str, body: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), rx)
}

fn unlimited(name: &str) -> Requester {
    Requester::new(name, RateLimit::unlimited(), RateLimit::unlimited())
}

#[tokio::test]
async fn successful_request_returns_body_and_sends_user_agent() {
    let (base, mut requests) = serve("200 OK", r#"{"last":"42.5"}"#).await;
    let requester = unlimited("Mock");
    requester.set_user_agent("venuekit-test/1.0");

    let value: serde_json::Value = requester
        .send_json(false, RequestSpec::get(format!("{base}/ticker")))
        .await
        .unwrap();

    assert_eq!(value["last"], "42.5");
    let raw = requests.recv().await.unwrap().to_lowercase();
    assert!(raw.starts_with("get /ticker"));
    assert!(raw.contains("user-agent: venuekit-test/1.0"));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (base, _requests) = serve("503 Service Unavailable", "maintenance").await;
    let requester = unlimited("Mock");

    let err = requester
        .send(false, RequestSpec::get(format!("{base}/ticker")))
        .await
        .unwrap_err();

    match &err {
        Error::Status { status, body, .. } => {
            assert_eq!(*status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _held = socket;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    let requester = unlimited("Mock");
    requester.set_timeout(Duration::from_millis(50));

    let err = requester
        .send(false, RequestSpec::get(format!("http://{addr}/slow")))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn excess_requests_wait_for_the_next_window() {
    let (base, _requests) = serve("200 OK", "{}").await;
    let started = Instant::now();
    let requester = Requester::new(
        "Mock",
        RateLimit::unlimited(),
        RateLimit::new(Duration::from_millis(300), 2),
    );

    for _ in 0..3 {
        requester
            .send(false, RequestSpec::get(format!("{base}/ping")))
            .await
            .unwrap();
    }

    assert!(started.elapsed() >= Duration::from_millis(300));
    // The authenticated bucket is independent and unlimited.
    assert!(requester.authenticated_limit().is_unlimited());
}

#[tokio::test]
async fn request_timeout_covers_the_token_wait() {
    let (base, _requests) = serve("200 OK", "{}").await;
    let requester = Requester::new(
        "Mock",
        RateLimit::new(Duration::from_secs(60), 1),
        RateLimit::unlimited(),
    );
    requester.set_timeout(Duration::from_millis(100));

    requester
        .send(true, RequestSpec::get(format!("{base}/balance")))
        .await
        .unwrap();
    let err = requester
        .send(true, RequestSpec::get(format!("{base}/balance")))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
}

fn websocket_exchange() -> (Arc<MockExchange>, venuekit::config::ExchangeConfig) {
    let mut config = mock_config("BTC_USD", "BTC_USD");
    config.features = Some(FeaturesConfig {
        supports: FeaturesSupportedConfig {
            rest: true,
            websocket: true,
            ..Default::default()
        },
        enabled: FeaturesEnabledConfig {
            auto_pair_updates: false,
            websocket: true,
        },
    });
    let store = config::store([config.clone()]);
    let exchange = MockExchange::with_defaults(
        defaults().supports(FeaturesSupportedConfig {
            rest: true,
            websocket: true,
            ..Default::default()
        }),
        Arc::new(MarketDataCache::new()),
        store as Arc<dyn ConfigStore>,
    );
    (Arc::new(exchange), config)
}

#[tokio::test]
async fn proxy_is_installed_on_http_and_websocket_together() {
    let (exchange, config) = websocket_exchange();
    exchange.setup(&config).await.unwrap();
    let proxy = Url::parse("http://127.0.0.1:3128").unwrap();

    exchange.set_client_proxy_address(proxy.as_str()).unwrap();

    assert_eq!(exchange.profile().requester().proxy(), Some(proxy.clone()));
    assert_eq!(exchange.websocket().unwrap().proxy(), Some(proxy));
}

#[tokio::test]
async fn rejected_proxy_changes_nothing() {
    let (exchange, config) = websocket_exchange();
    exchange.setup(&config).await.unwrap();
    let first = Url::parse("http://127.0.0.1:3128").unwrap();
    exchange.set_client_proxy_address(first.as_str()).unwrap();

    // Accepted by the HTTP client but not by the websocket tunnel.
    let err = exchange
        .set_client_proxy_address("https://127.0.0.1:8443")
        .unwrap_err();

    assert!(matches!(err, Error::Proxy(_)));
    assert_eq!(exchange.profile().requester().proxy(), Some(first.clone()));
    assert_eq!(exchange.websocket().unwrap().proxy(), Some(first));
}

#[tokio::test]
async fn proxy_from_config_is_applied_during_setup() {
    let (exchange, mut config) = websocket_exchange();
    config.proxy_address = "http://10.0.0.1:8080".into();

    exchange.setup(&config).await.unwrap();

    assert_eq!(
        exchange.profile().requester().proxy().map(|u| u.to_string()),
        Some("http://10.0.0.1:8080/".to_string())
    );
}

#[test]
fn concurrent_proxy_changes_leave_both_transports_on_one_proxy() {
    let (exchange, config) = websocket_exchange();
    exchange.profile().setup_defaults(&config).unwrap();
    let profile = exchange.profile();

    for round in 0..20u16 {
        let first = format!("http://127.0.0.1:{}", 20000 + round * 2);
        let second = format!("http://127.0.0.1:{}", 20001 + round * 2);
        let barrier = Barrier::new(2);
        thread::scope(|scope| {
            for address in [&first, &second] {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    profile.set_client_proxy_address(address).unwrap();
                });
            }
        });

        let http = profile.requester().proxy();
        assert!(http.is_some());
        assert_eq!(http, exchange.websocket().unwrap().proxy(), "round {round}");
    }
}
