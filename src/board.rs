//! Latest-price board backing the region list view.
//!
//! A refresh issues one independent upstream request per registered region
//! and joins them all; a single failing region fails the whole refresh. The
//! published snapshot carries a refresh sequence number so a slow, stale
//! refresh can never overwrite a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pricing::select_latest;
use crate::regions::ALL_REGIONS;
use crate::upstream::{PriceRequest, PriceSource, UpstreamError};

/// One region list row: latest-hour price (noon fallback) or no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPriceRow {
    pub code: String,
    pub name: String,
    pub price: Option<f64>,
    pub unit: String,
}

/// What the list view renders: still loading, a full table, or an error
/// banner. There is no partial-table state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BoardView {
    Pending,
    Ready { rows: Vec<RegionPriceRow> },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Retries of the whole list fetch, not of individual region requests.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub refresh_interval_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff_ms: 200,
            refresh_interval_ms: 60_000,
        }
    }
}

/// Wall-clock hour used to pick the "current" price from a day series.
pub fn current_hour_of_day() -> usize {
    chrono::Local::now().hour() as usize
}

/// One request per region, all regions in flight at once, join-all.
pub fn fetch_board_rows(
    source: &dyn PriceSource,
    hour_of_day: usize,
) -> Result<Vec<RegionPriceRow>, UpstreamError> {
    let results: Vec<Result<RegionPriceRow, UpstreamError>> = thread::scope(|scope| {
        let handles: Vec<_> = ALL_REGIONS
            .iter()
            .map(|region| {
                scope.spawn(move || -> Result<RegionPriceRow, UpstreamError> {
                    let series = source.fetch_prices(&PriceRequest::latest(region.code))?;
                    Ok(RegionPriceRow {
                        code: region.code.to_string(),
                        name: region.name.to_string(),
                        price: select_latest(&series.price, hour_of_day),
                        unit: series.unit,
                    })
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("region fetch thread should not panic"))
            .collect()
    });

    results.into_iter().collect()
}

pub fn fetch_board_rows_with_retry(
    source: &dyn PriceSource,
    hour_of_day: usize,
    cfg: &BoardConfig,
) -> Result<Vec<RegionPriceRow>, UpstreamError> {
    let mut attempt: u32 = 0;
    loop {
        match fetch_board_rows(source, hour_of_day) {
            Ok(rows) => return Ok(rows),
            Err(err) if attempt >= cfg.max_retries => return Err(err),
            Err(err) => {
                attempt = attempt.saturating_add(1);
                warn!(
                    component = "board",
                    event = "board.refresh.retry",
                    attempt,
                    max_retries = cfg.max_retries,
                    error = %err
                );
                let shift = attempt.saturating_sub(1).min(10);
                let sleep_ms = cfg.retry_backoff_ms.saturating_mul(1u64 << shift);
                thread::sleep(std::time::Duration::from_millis(sleep_ms));
            }
        }
    }
}

struct VersionedView {
    seq: u64,
    view: BoardView,
}

/// Shared board state with monotonic refresh sequencing.
pub struct BoardState {
    inner: RwLock<VersionedView>,
    next_seq: AtomicU64,
}

impl BoardState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(VersionedView {
                seq: 0,
                view: BoardView::Pending,
            }),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Issues the sequence number for a refresh about to start.
    pub fn begin_refresh(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Applies a refresh result unless something newer already landed.
    pub fn publish(&self, seq: u64, view: BoardView) -> bool {
        let mut guard = self
            .inner
            .write()
            .expect("board state lock should not be poisoned");
        if seq < guard.seq {
            warn!(
                component = "board",
                event = "board.publish.stale",
                seq,
                current_seq = guard.seq
            );
            return false;
        }
        guard.seq = seq;
        guard.view = view;
        true
    }

    pub fn view(&self) -> BoardView {
        self.inner
            .read()
            .expect("board state lock should not be poisoned")
            .view
            .clone()
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new()
    }
}

/// One refresh cycle: fetch with list-level retries, publish the outcome.
pub fn refresh_board(
    state: &BoardState,
    source: &dyn PriceSource,
    hour_of_day: usize,
    cfg: &BoardConfig,
) {
    let seq = state.begin_refresh();
    info!(
        component = "board",
        event = "board.refresh.start",
        seq,
        regions = ALL_REGIONS.len()
    );

    match fetch_board_rows_with_retry(source, hour_of_day, cfg) {
        Ok(rows) => {
            let row_count = rows.len();
            let applied = state.publish(seq, BoardView::Ready { rows });
            info!(
                component = "board",
                event = "board.refresh.finish",
                seq,
                rows = row_count,
                applied
            );
        }
        Err(err) => {
            state.publish(
                seq,
                BoardView::Failed {
                    message: err.to_string(),
                },
            );
            warn!(
                component = "board",
                event = "board.refresh.error",
                seq,
                error = %err
            );
        }
    }
}

/// Background refresher thread driving the list view.
pub fn spawn_board_refresher(
    state: Arc<BoardState>,
    source: Arc<dyn PriceSource>,
    cfg: BoardConfig,
) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        refresh_board(&state, source.as_ref(), current_hour_of_day(), &cfg);
        thread::sleep(std::time::Duration::from_millis(cfg.refresh_interval_ms));
    })
}
