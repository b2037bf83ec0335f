//! Blocking client for the day-ahead price API (energy-charts).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::observability::{env_flag, env_nonempty};
use crate::pricing::PriceSeries;
use crate::regions::ALL_REGIONS;

pub const ENERGY_CHARTS_PRICE_URL: &str = "https://api.energy-charts.info/price";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub price_url: String,
    pub timeout_ms: u64,
    /// The upstream has served an expired certificate for extended periods;
    /// this keeps the relay usable against it. `SPOTBOARD_UPSTREAM_STRICT_TLS`
    /// restores default transport trust.
    pub accept_invalid_certs: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            price_url: ENERGY_CHARTS_PRICE_URL.to_string(),
            timeout_ms: 10_000,
            accept_invalid_certs: true,
        }
    }
}

pub fn upstream_config_from_env() -> UpstreamConfig {
    let defaults = UpstreamConfig::default();
    UpstreamConfig {
        price_url: env_nonempty("SPOTBOARD_UPSTREAM_URL").unwrap_or(defaults.price_url),
        timeout_ms: env_nonempty("SPOTBOARD_UPSTREAM_TIMEOUT_MS")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.timeout_ms),
        accept_invalid_certs: env_flag("SPOTBOARD_UPSTREAM_STRICT_TLS")
            .map(|strict| !strict)
            .unwrap_or(defaults.accept_invalid_certs),
    }
}

/// Parameters forwarded verbatim to the upstream. Omitted dates mean "today"
/// upstream-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceRequest {
    pub region_code: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl PriceRequest {
    pub fn latest(region_code: impl Into<String>) -> Self {
        Self {
            region_code: region_code.into(),
            start: None,
            end: None,
        }
    }

    pub fn range(region_code: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            region_code: region_code.into(),
            start: Some(start),
            end: Some(end),
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP client build error: {0}")]
    ClientBuild(String),
    #[error("HTTP request failed for {url}: {message}")]
    Request { url: String, message: String },
    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

/// Seam between the HTTP handlers and the upstream. Implementations are
/// blocking; handlers bridge through `spawn_blocking`.
pub trait PriceSource: Send + Sync + 'static {
    fn fetch_prices(&self, req: &PriceRequest) -> Result<PriceSeries, UpstreamError>;
}

pub struct EnergyChartsSource {
    client: reqwest::blocking::Client,
    price_url: String,
}

impl EnergyChartsSource {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, UpstreamError> {
        if cfg.accept_invalid_certs {
            warn!(
                component = "upstream",
                event = "upstream.tls_override",
                url = %cfg.price_url,
                "certificate validation disabled for the upstream price API"
            );
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .build()
            .map_err(|err| UpstreamError::ClientBuild(err.to_string()))?;

        Ok(Self {
            client,
            price_url: cfg.price_url.clone(),
        })
    }
}

impl PriceSource for EnergyChartsSource {
    fn fetch_prices(&self, req: &PriceRequest) -> Result<PriceSeries, UpstreamError> {
        let query = build_query(req);
        debug!(
            component = "upstream",
            event = "upstream.request",
            region = %req.region_code,
            url = %self.price_url
        );

        let response = self
            .client
            .get(&self.price_url)
            .query(&query)
            .send()
            .map_err(|err| UpstreamError::Request {
                url: self.price_url.clone(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: self.price_url.clone(),
                status: status.as_u16(),
            });
        }

        response
            .json::<PriceSeries>()
            .map_err(|err| UpstreamError::Decode(err.to_string()))
    }
}

fn build_query(req: &PriceRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![("bzn", req.region_code.clone())];
    if let Some(start) = req.start {
        query.push(("start", start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = req.end {
        query.push(("end", end.format("%Y-%m-%d").to_string()));
    }
    query
}

/// Canned source for tests and the demo server mode; keyed by region code
/// only, dates are ignored.
#[derive(Default)]
pub struct InMemoryPriceSource {
    responses: Mutex<HashMap<String, Result<PriceSeries, String>>>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(self, region_code: &str, series: PriceSeries) -> Self {
        self.responses
            .lock()
            .expect("canned response lock should not be poisoned")
            .insert(region_code.to_string(), Ok(series));
        self
    }

    pub fn with_failure(self, region_code: &str, message: &str) -> Self {
        self.responses
            .lock()
            .expect("canned response lock should not be poisoned")
            .insert(region_code.to_string(), Err(message.to_string()));
        self
    }

    /// One synthetic day of prices per registered region.
    pub fn demo() -> Self {
        let mut source = Self::new();
        for (idx, region) in ALL_REGIONS.iter().enumerate() {
            source = source.with_series(region.code, demo_series(idx));
        }
        source
    }
}

impl PriceSource for InMemoryPriceSource {
    fn fetch_prices(&self, req: &PriceRequest) -> Result<PriceSeries, UpstreamError> {
        let guard = self
            .responses
            .lock()
            .expect("canned response lock should not be poisoned");
        match guard.get(&req.region_code) {
            Some(Ok(series)) => Ok(series.clone()),
            Some(Err(message)) => Err(UpstreamError::Request {
                url: format!("memory://{}", req.region_code),
                message: message.clone(),
            }),
            None => Err(UpstreamError::Request {
                url: format!("memory://{}", req.region_code),
                message: "no canned series for region".to_string(),
            }),
        }
    }
}

fn demo_series(region_index: usize) -> PriceSeries {
    let midnight = chrono::Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight should exist")
        .and_utc()
        .timestamp();

    let base = 60.0 + region_index as f64 * 3.0;
    let price = (0..24)
        .map(|hour: i64| Some(base + (hour - 12).abs() as f64 * 2.5))
        .collect();

    PriceSeries {
        unix_seconds: (0..24).map(|hour| midnight + hour * 3_600).collect(),
        price,
        unit: "EUR/MWh".to_string(),
        license_info: "CC BY 4.0 (https://creativecommons.org/licenses/by/4.0/)".to_string(),
        deprecated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_forwards_region_and_optional_dates_verbatim() {
        let bare = build_query(&PriceRequest::latest("DE-LU"));
        assert_eq!(bare, vec![("bzn", "DE-LU".to_string())]);

        let start = NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2024, 5, 3).expect("valid date");
        let ranged = build_query(&PriceRequest::range("FR", start, end));
        assert_eq!(
            ranged,
            vec![
                ("bzn", "FR".to_string()),
                ("start", "2024-05-01".to_string()),
                ("end", "2024-05-03".to_string()),
            ]
        );
    }

    #[test]
    fn in_memory_source_returns_canned_series_and_failures() {
        let source = InMemoryPriceSource::demo().with_failure("FR", "simulated outage");

        let series = source
            .fetch_prices(&PriceRequest::latest("AT"))
            .expect("demo series for AT");
        assert_eq!(series.price.len(), 24);
        assert_eq!(series.unit, "EUR/MWh");

        let err = source
            .fetch_prices(&PriceRequest::latest("FR"))
            .expect_err("canned failure should surface");
        assert!(matches!(err, UpstreamError::Request { .. }));

        let missing = source
            .fetch_prices(&PriceRequest::latest("XX"))
            .expect_err("unknown region has no canned series");
        assert!(matches!(missing, UpstreamError::Request { .. }));
    }

    #[test]
    fn default_config_keeps_cert_override_on() {
        let cfg = UpstreamConfig::default();
        assert!(cfg.accept_invalid_certs);
        assert_eq!(cfg.price_url, ENERGY_CHARTS_PRICE_URL);
    }
}
