use crate::{LocationSymbol, ShipId, TradeGoodSymbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Deserialize, Serialize, Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    Fueling,
    Buying,
    Flying,
    Selling,
    Done,
    Failed,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum TradingRunEvent {
    StateChanged {
        ship_id: ShipId,
        from: RunState,
        to: RunState,
    },
    Fueled {
        ship_id: ShipId,
        units: u32,
        total: i64,
    },
    Purchased {
        ship_id: ShipId,
        good: TradeGoodSymbol,
        quantity: u32,
        total: i64,
    },
    FlightPlanned {
        ship_id: ShipId,
        destination: LocationSymbol,
        flight_time_secs: u64,
    },
    FlightProgress {
        ship_id: ShipId,
        destination: LocationSymbol,
        remaining_secs: u64,
    },
    Sold {
        ship_id: ShipId,
        good: TradeGoodSymbol,
        quantity: u32,
        total: i64,
    },
    Completed(TradingRunReport),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TradingRunReport {
    pub ship_id: ShipId,
    pub origin: LocationSymbol,
    pub destination: LocationSymbol,
    pub good: TradeGoodSymbol,
    pub quantity: u32,
    pub purchase_total: i64,
    pub sale_total: i64,
    /// Spent on fuel before departure. Not part of `net_profit`.
    pub fuel_total: i64,
    pub net_profit: i64,
    /// Credits reported by the final sell order.
    pub credits: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of several consecutive runs of one ship.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TradingLoopSummary {
    pub ship_id: ShipId,
    pub runs_completed: u32,
    pub total_profit: i64,
    pub elapsed_secs: u64,
    pub profit_per_hour: i64,
}

impl TradingLoopSummary {
    pub fn new(ship_id: ShipId, reports: &[TradingRunReport], elapsed_secs: u64) -> Self {
        let total_profit = reports.iter().map(|report| report.net_profit).sum();
        let profit_per_hour = if elapsed_secs == 0 {
            0
        } else {
            total_profit * 3600 / elapsed_secs as i64
        };

        TradingLoopSummary {
            ship_id,
            runs_completed: reports.len() as u32,
            total_profit,
            elapsed_secs,
            profit_per_hour,
        }
    }
}
