//! HTTP surface: the proxy relay, JSON view endpoints, and the two
//! server-rendered pages (region list, region detail).

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::board::{BoardState, BoardView};
use crate::cache::PriceCache;
use crate::pricing::{
    aggregate_daily, aggregate_hourly, select_latest, validate_range, DailyStats, HourlyAverage,
    PriceSeries,
};
use crate::regions::{find_region, Region, ALL_REGIONS};
use crate::upstream::{PriceRequest, PriceSource};

/// Days of history shown by default on the detail page's range views.
const DEFAULT_RANGE_DAYS: u64 = 10;

#[derive(Clone)]
struct AppState {
    source: Arc<dyn PriceSource>,
    cache: Arc<PriceCache>,
    board: Arc<BoardState>,
}

pub fn app_router(
    source: Arc<dyn PriceSource>,
    cache: Arc<PriceCache>,
    board: Arc<BoardState>,
) -> Router {
    Router::new()
        .route("/", get(get_index_html))
        .route("/region/{code}", get(get_region_html))
        .route("/api/proxy-price", get(get_proxy_price))
        .route("/api/regions", get(get_regions))
        .route("/api/regions/latest", get(get_latest_board))
        .route("/api/region/{code}/day", get(get_region_day))
        .route("/api/region/{code}/daily-stats", get(get_region_daily_stats))
        .route(
            "/api/region/{code}/hourly-averages",
            get(get_region_hourly_averages),
        )
        .with_state(AppState {
            source,
            cache,
            board,
        })
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    bzn: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DayQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Serialize)]
struct DayPricesBody {
    code: String,
    date: String,
    unit: String,
    prices: Vec<Option<f64>>,
}

#[derive(Debug, Serialize)]
struct DailyStatsBody {
    code: String,
    start: String,
    end: String,
    unit: String,
    days: Vec<DailyStats>,
}

#[derive(Debug, Serialize)]
struct HourlyAveragesBody {
    code: String,
    start: String,
    end: String,
    unit: String,
    hours: Vec<HourlyAverage>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
        .into_response()
}

fn parse_date(raw: &str, param: &str) -> Result<NaiveDate, Response> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid {param} date '{raw}', expected yyyy-MM-dd"),
        )
    })
}

/// Read-through fetch: cache first, then the blocking upstream client on a
/// worker thread. Upstream failures collapse into the fixed relay envelope.
async fn fetch_series(state: &AppState, req: PriceRequest) -> Result<PriceSeries, Response> {
    if let Some(series) = state.cache.get(&req) {
        return Ok(series);
    }

    let source = Arc::clone(&state.source);
    let fetch_req = req.clone();
    let joined = tokio::task::spawn_blocking(move || source.fetch_prices(&fetch_req)).await;

    match joined {
        Ok(Ok(series)) => {
            state.cache.insert(req, series.clone());
            Ok(series)
        }
        Ok(Err(err)) => {
            warn!(
                component = "server",
                event = "proxy.upstream_error",
                region = %req.region_code,
                error = %err
            );
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch region data",
            ))
        }
        Err(join_err) => {
            warn!(
                component = "server",
                event = "proxy.worker_error",
                region = %req.region_code,
                error = %join_err
            );
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch region data",
            ))
        }
    }
}

/// The relay: parameters go upstream verbatim. No registry check and no
/// range validation on this path.
async fn get_proxy_price(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Response {
    let Some(bzn) = query.bzn.filter(|raw| !raw.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing required parameter: bzn");
    };

    let start = match &query.start {
        Some(raw) => match parse_date(raw, "start") {
            Ok(date) => Some(date),
            Err(response) => return response,
        },
        None => None,
    };
    let end = match &query.end {
        Some(raw) => match parse_date(raw, "end") {
            Ok(date) => Some(date),
            Err(response) => return response,
        },
        None => None,
    };

    info!(
        component = "server",
        event = "proxy.request",
        region = %bzn,
        has_range = start.is_some() || end.is_some()
    );

    let req = PriceRequest {
        region_code: bzn,
        start,
        end,
    };
    match fetch_series(&state, req).await {
        Ok(series) => Json(series).into_response(),
        Err(response) => response,
    }
}

async fn get_regions() -> Json<Vec<Region>> {
    Json(ALL_REGIONS.to_vec())
}

async fn get_latest_board(State(state): State<AppState>) -> Json<BoardView> {
    info!(component = "server", event = "http.board.request");
    Json(state.board.view())
}

fn resolve_region(code: &str) -> Result<&'static Region, Response> {
    find_region(code)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("unknown region code '{code}'")))
}

fn resolve_range(query: &RangeQuery, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), Response> {
    let end = match &query.end {
        Some(raw) => parse_date(raw, "end")?,
        None => today,
    };
    let start = match &query.start {
        Some(raw) => parse_date(raw, "start")?,
        None => end
            .checked_sub_days(Days::new(DEFAULT_RANGE_DAYS))
            .unwrap_or(end),
    };

    validate_range(start, end, today)
        .map_err(|reason| error_response(StatusCode::UNPROCESSABLE_ENTITY, reason.to_string()))?;
    Ok((start, end))
}

async fn get_region_day(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<DayQuery>,
) -> Response {
    let region = match resolve_region(&code) {
        Ok(region) => region,
        Err(response) => return response,
    };

    let today = chrono::Local::now().date_naive();
    let date = match &query.date {
        Some(raw) => match parse_date(raw, "date") {
            Ok(date) => date,
            Err(response) => return response,
        },
        None => today,
    };
    if let Err(reason) = validate_range(date, date, today) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, reason.to_string());
    }

    match fetch_series(&state, PriceRequest::range(region.code, date, date)).await {
        Ok(series) => Json(DayPricesBody {
            code: region.code.to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            unit: series.unit,
            prices: series.price,
        })
        .into_response(),
        Err(response) => response,
    }
}

async fn get_region_daily_stats(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Response {
    let region = match resolve_region(&code) {
        Ok(region) => region,
        Err(response) => return response,
    };
    let today = chrono::Local::now().date_naive();
    let (start, end) = match resolve_range(&query, today) {
        Ok(range) => range,
        Err(response) => return response,
    };

    match fetch_series(&state, PriceRequest::range(region.code, start, end)).await {
        Ok(series) => Json(DailyStatsBody {
            code: region.code.to_string(),
            start: start.format("%Y-%m-%d").to_string(),
            end: end.format("%Y-%m-%d").to_string(),
            unit: series.unit,
            days: aggregate_daily(&series.price, start, end),
        })
        .into_response(),
        Err(response) => response,
    }
}

async fn get_region_hourly_averages(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Response {
    let region = match resolve_region(&code) {
        Ok(region) => region,
        Err(response) => return response,
    };
    let today = chrono::Local::now().date_naive();
    let (start, end) = match resolve_range(&query, today) {
        Ok(range) => range,
        Err(response) => return response,
    };

    match fetch_series(&state, PriceRequest::range(region.code, start, end)).await {
        Ok(series) => Json(HourlyAveragesBody {
            code: region.code.to_string(),
            start: start.format("%Y-%m-%d").to_string(),
            end: end.format("%Y-%m-%d").to_string(),
            unit: series.unit,
            hours: aggregate_hourly(&series.price),
        })
        .into_response(),
        Err(response) => response,
    }
}

async fn get_index_html(State(state): State<AppState>) -> Html<String> {
    Html(render_index_html(&state.board.view()))
}

async fn get_region_html(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    let region = match find_region(&code) {
        Some(region) => region,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Html(render_message_page("Unknown region code.")),
            )
                .into_response()
        }
    };

    let today = chrono::Local::now().date_naive();
    let start = today
        .checked_sub_days(Days::new(DEFAULT_RANGE_DAYS))
        .unwrap_or(today);

    let day_series = fetch_series(&state, PriceRequest::range(region.code, today, today)).await;
    let range_series = fetch_series(&state, PriceRequest::range(region.code, start, today)).await;

    let (day_series, range_series) = match (day_series, range_series) {
        (Ok(day), Ok(range)) => (day, range),
        _ => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_message_page(
                    "Error loading region details. Please try again later.",
                )),
            )
                .into_response()
        }
    };

    let daily = aggregate_daily(&range_series.price, start, today);
    let hourly = aggregate_hourly(&range_series.price);
    Html(render_region_html(
        region,
        today,
        (start, today),
        &day_series,
        &daily,
        &hourly,
    ))
    .into_response()
}

pub fn render_index_html(view: &BoardView) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>Electricity Prices by Region</title>\n");
    out.push_str(PAGE_STYLE);
    out.push_str("</head><body><main class=\"shell\">\n");
    out.push_str("<section class=\"hero\"><h1>Electricity Prices by Region</h1>");
    out.push_str("<div class=\"hero-meta\"><span>Day-ahead prices, one row per bidding zone</span></div></section>\n");

    match view {
        BoardView::Pending => {
            out.push_str("<p class=\"note\">Loading data, please wait...</p>");
        }
        BoardView::Failed { message } => {
            out.push_str("<p class=\"error\">Error loading data. Please try again later.</p>");
            out.push_str(&format!(
                "<p class=\"note\">{}</p>",
                escape_html(message)
            ));
        }
        BoardView::Ready { rows } => {
            out.push_str("<section class=\"card\"><table id=\"region-table\">\n");
            out.push_str(
                "<thead><tr><th>Region Name</th><th>Region Code</th><th>Current Price (EUR/MWh)</th></tr></thead><tbody>\n",
            );
            for row in rows {
                out.push_str("<tr><td><a href=\"/region/");
                out.push_str(&escape_html(&row.code));
                out.push_str("\">");
                out.push_str(&escape_html(&row.name));
                out.push_str("</a></td><td>");
                out.push_str(&escape_html(&row.code));
                out.push_str("</td><td class=\"num\">");
                out.push_str(&format_price(row.price));
                out.push_str("</td></tr>\n");
            }
            out.push_str("</tbody></table></section>");
        }
    }

    out.push_str("</main></body></html>\n");
    out
}

fn render_region_html(
    region: &Region,
    today: NaiveDate,
    range: (NaiveDate, NaiveDate),
    day_series: &PriceSeries,
    daily: &[DailyStats],
    hourly: &[HourlyAverage],
) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(&format!(
        "<title>{} - Detailed prices</title>\n",
        escape_html(region.name)
    ));
    out.push_str(PAGE_STYLE);
    out.push_str("</head><body><main class=\"shell\">\n");
    out.push_str("<p><a href=\"/\">&larr; Back to Main Page</a></p>");
    out.push_str(&format!(
        "<section class=\"hero\"><h1>{} - Detailed prices</h1><div class=\"hero-meta\"><span>Unit: {}</span></div></section>\n",
        escape_html(region.name),
        escape_html(&day_series.unit)
    ));

    out.push_str(&format!(
        "<section class=\"card\"><h2>Daily Prices ({})</h2>",
        today.format("%Y-%m-%d")
    ));
    let latest = select_latest(&day_series.price, crate::board::current_hour_of_day());
    out.push_str(&format!(
        "<p class=\"note\">Current price: {}</p>",
        format_price(latest)
    ));
    out.push_str("<table><thead><tr><th>Hour</th><th>Price</th></tr></thead><tbody>");
    if day_series.price.is_empty() {
        out.push_str("<tr><td colspan=\"2\">No data available for the selected date.</td></tr>");
    }
    for (hour, price) in day_series.price.iter().enumerate() {
        out.push_str(&format!(
            "<tr><td>{hour}:00</td><td class=\"num\">{}</td></tr>",
            format_price(*price)
        ));
    }
    out.push_str("</tbody></table></section>");

    out.push_str(&format!(
        "<section class=\"card\"><h2>Highs/Lows/Averages ({} to {})</h2>",
        range.0.format("%Y-%m-%d"),
        range.1.format("%Y-%m-%d")
    ));
    if daily.is_empty() {
        out.push_str("<p class=\"note\">No data available for the selected date range.</p>");
    } else {
        out.push_str(
            "<table><thead><tr><th>Date</th><th>Max</th><th>Min</th><th>Average</th></tr></thead><tbody>",
        );
        for day in daily {
            out.push_str(&format!(
                "<tr><td>{}</td><td class=\"num\">{:.2}</td><td class=\"num\">{:.2}</td><td class=\"num\">{:.2}</td></tr>",
                escape_html(&day.date),
                day.max,
                day.min,
                day.avg
            ));
        }
        out.push_str("</tbody></table>");
    }
    out.push_str("</section>");

    out.push_str("<section class=\"card\"><h2>Hourly Averages</h2>");
    out.push_str("<table><thead><tr><th>Hour</th><th>Avg Price</th></tr></thead><tbody>");
    for entry in hourly {
        out.push_str(&format!(
            "<tr><td>{}</td><td class=\"num\">{}</td></tr>",
            escape_html(&entry.hour),
            if entry.avg_price.is_nan() {
                "-".to_string()
            } else {
                format!("{:.2}", entry.avg_price)
            }
        ));
    }
    out.push_str("</tbody></table></section>");

    out.push_str("</main></body></html>\n");
    out
}

fn render_message_page(message: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">{}</head><body><main class=\"shell\"><p class=\"error\">{}</p><p><a href=\"/\">&larr; Back to Main Page</a></p></main></body></html>\n",
        PAGE_STYLE,
        escape_html(message)
    )
}

const PAGE_STYLE: &str = "<style>body{margin:0;font-family:\"Segoe UI\",sans-serif;background:#f4f6f8;color:#182026}.shell{max-width:900px;margin:0 auto;padding:24px 18px}.hero{background:#14343f;color:#f7fbfc;border-radius:12px;padding:16px 20px}.hero h1{margin:0 0 6px;font-size:1.5rem}.hero-meta{font-size:.9rem;color:#dcebf0}.card{margin-top:16px;background:#fff;border:1px solid #d7dce1;border-radius:12px;padding:12px 16px}table{width:100%;border-collapse:collapse}th{text-align:left;background:#14343f;color:#f2f7f9;padding:8px}td{padding:7px 8px;border-bottom:1px solid #d7dce1}.num{text-align:right}.note{color:#5f6a73}.error{color:#b3261e;font-weight:600}</style>\n";

fn format_price(price: Option<f64>) -> String {
    match price {
        Some(value) if !value.is_nan() => format!("{value:.2}"),
        _ => "-".to_string(),
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
