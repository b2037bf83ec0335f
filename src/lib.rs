//! Spotboard core crate.
//!
//! Day-ahead electricity price dashboard:
//! - static bidding-zone registry
//! - aggregation pipeline (latest price, daily stats, hourly averages)
//! - read-through proxy to the upstream price API with an explicit TTL cache
//! - axum server rendering the list and detail views

mod board;
mod cache;
mod observability;
mod pricing;
mod regions;
mod server;
mod upstream;

pub use board::{
    current_hour_of_day, fetch_board_rows, fetch_board_rows_with_retry, refresh_board,
    spawn_board_refresher, BoardConfig, BoardState, BoardView, RegionPriceRow,
};
pub use cache::PriceCache;
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_source_selected, LogFormat, LoggingConfig,
    LoggingInitError,
};
pub use pricing::{
    aggregate_daily, aggregate_hourly, round2, select_latest, validate_range, DailyStats,
    HourlyAverage, PriceSeries, RangeError,
};
pub use regions::{find_region, Region, ALL_REGIONS};
pub use server::{app_router, render_index_html};
pub use upstream::{
    upstream_config_from_env, EnergyChartsSource, InMemoryPriceSource, PriceRequest, PriceSource,
    UpstreamConfig, UpstreamError, ENERGY_CHARTS_PRICE_URL,
};
