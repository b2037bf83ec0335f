use std::io;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use spotboard::{
    app_router, log_app_bind, log_app_start, log_source_selected, refresh_board, BoardConfig,
    BoardState, InMemoryPriceSource, LoggingConfig, PriceCache, PriceSource,
};
use tower::util::ServiceExt;
use tracing::dispatcher::with_default;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

/// Clonable in-memory sink handed to the fmt subscriber; every clone appends
/// to the same buffer.
#[derive(Clone, Default)]
struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    fn contents(&self) -> String {
        let bytes = self.bytes.lock().expect("log buffer should not be poisoned");
        String::from_utf8_lossy(&bytes).to_string()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .expect("log buffer should not be poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> LogBuffer {
        self.clone()
    }
}

fn capture_logs(max_level: Level, f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_max_level(max_level)
        .with_writer(buffer.clone())
        .finish();

    with_default(&tracing::Dispatch::new(subscriber), f);
    buffer.contents()
}

fn no_backoff() -> BoardConfig {
    BoardConfig {
        retry_backoff_ms: 0,
        ..BoardConfig::default()
    }
}

#[test]
fn server_lifecycle_helpers_emit_baseline_events() {
    let logs = capture_logs(Level::INFO, || {
        let cfg = LoggingConfig::default();
        log_app_start(&cfg);
        log_source_selected("demo", "SPOTBOARD_USE_DEMO");
        log_app_bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080));
    });

    assert!(logs.contains("\"event\":\"app.start\""));
    assert!(logs.contains("\"event\":\"source.selected\""));
    assert!(logs.contains("\"event\":\"app.bind\""));
}

#[test]
fn board_refresh_logs_start_and_finish() {
    let logs = capture_logs(Level::INFO, || {
        let source = InMemoryPriceSource::demo();
        let state = BoardState::new();
        refresh_board(&state, &source, 9, &no_backoff());
    });

    assert!(logs.contains("\"event\":\"board.refresh.start\""));
    assert!(logs.contains("\"event\":\"board.refresh.finish\""));
}

#[test]
fn exhausted_board_retries_log_retry_and_error_events() {
    let logs = capture_logs(Level::INFO, || {
        let source = InMemoryPriceSource::demo().with_failure("PL", "down");
        let state = BoardState::new();
        refresh_board(&state, &source, 9, &no_backoff());
    });

    assert!(logs.contains("\"event\":\"board.refresh.retry\""));
    assert!(logs.contains("\"event\":\"board.refresh.error\""));
}

#[test]
fn proxy_route_emits_request_and_upstream_error_events() {
    let logs = capture_logs(Level::INFO, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("single-thread runtime should build");

        rt.block_on(async {
            let source: Arc<dyn PriceSource> =
                Arc::new(InMemoryPriceSource::new().with_failure("AT", "boom"));
            let app = app_router(
                source,
                Arc::new(PriceCache::new(std::time::Duration::from_secs(60))),
                Arc::new(BoardState::new()),
            );

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/api/proxy-price?bzn=AT")
                        .body(Body::empty())
                        .expect("request should build"),
                )
                .await
                .expect("proxy request should complete");

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        });
    });

    assert!(logs.contains("\"event\":\"proxy.request\""));
    assert!(logs.contains("\"event\":\"proxy.upstream_error\""));
}

#[test]
fn board_route_emits_http_request_event() {
    let logs = capture_logs(Level::INFO, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("single-thread runtime should build");

        rt.block_on(async {
            let app = app_router(
                Arc::new(InMemoryPriceSource::demo()),
                Arc::new(PriceCache::new(std::time::Duration::from_secs(60))),
                Arc::new(BoardState::new()),
            );

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/api/regions/latest")
                        .body(Body::empty())
                        .expect("request should build"),
                )
                .await
                .expect("board request should complete");

            assert_eq!(response.status(), StatusCode::OK);
        });
    });

    assert!(logs.contains("\"event\":\"http.board.request\""));
}
