use std::{net::SocketAddr, sync::Arc, time::Duration};

use spotboard::{
    app_router, init_logging, log_app_bind, log_app_start, log_source_selected,
    spawn_board_refresher, upstream_config_from_env, BoardConfig, BoardState, EnergyChartsSource,
    InMemoryPriceSource, LoggingConfig, PriceCache, PriceSource,
};

const CACHE_TTL_MS: u64 = 5 * 60 * 1_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = LoggingConfig::from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let addr: SocketAddr = std::env::var("SPOTBOARD_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let source = source_from_env()?;
    let cache = Arc::new(PriceCache::new(Duration::from_millis(CACHE_TTL_MS)));
    let board = Arc::new(BoardState::new());

    let _refresher = spawn_board_refresher(
        Arc::clone(&board),
        Arc::clone(&source),
        BoardConfig::default(),
    );

    let app = app_router(source, cache, board);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn source_from_env() -> Result<Arc<dyn PriceSource>, Box<dyn std::error::Error>> {
    let force_demo = std::env::var("SPOTBOARD_USE_DEMO")
        .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if force_demo {
        log_source_selected("demo", "SPOTBOARD_USE_DEMO");
        return Ok(Arc::new(InMemoryPriceSource::demo()));
    }

    let cfg = upstream_config_from_env();
    log_source_selected("energy_charts", "default");
    Ok(Arc::new(EnergyChartsSource::new(&cfg)?))
}
