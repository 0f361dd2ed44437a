use crate::{MarketSnapshot, TradeError, TradeGoodSymbol};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How one good compares between the market it is bought at and the market it is sold at.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketComparison {
    pub good: TradeGoodSymbol,
    pub purchase_price_per_unit: i64,
    pub sell_price_per_unit: i64,
    /// volume per unit at the buying market
    pub volume_per_unit: u32,
    pub quantity_available: u32,
    pub profit: i64,
    pub profit_per_volume: OrderedFloat<f64>,
}

/// Joins two snapshots on the good symbol.
///
/// Goods listed at only one of the markets are dropped. Unprofitable goods are kept, so the result
/// can be negative across the board. The result follows the quote order of `from_market`.
pub fn compare_markets(from_market: &MarketSnapshot, to_market: &MarketSnapshot) -> Result<Vec<MarketComparison>, TradeError> {
    let sell_quotes: HashMap<&TradeGoodSymbol, _> = to_market.quotes().iter().map(|quote| (&quote.symbol, quote)).collect();

    from_market
        .quotes()
        .iter()
        .filter_map(|purchase_quote| sell_quotes.get(&purchase_quote.symbol).map(|sell_quote| (purchase_quote, *sell_quote)))
        .map(|(purchase_quote, sell_quote)| {
            let volume_per_unit = match purchase_quote.volume_per_unit {
                Some(volume) if volume > 0 => volume,
                _ => {
                    return Err(TradeError::Data(format!(
                        "{} at {} has no usable volume per unit ({:?})",
                        purchase_quote.symbol, from_market.location, purchase_quote.volume_per_unit
                    )))
                }
            };

            let profit = sell_quote.sell_price_per_unit - purchase_quote.purchase_price_per_unit;

            Ok(MarketComparison {
                good: purchase_quote.symbol.clone(),
                purchase_price_per_unit: purchase_quote.purchase_price_per_unit,
                sell_price_per_unit: sell_quote.sell_price_per_unit,
                volume_per_unit,
                quantity_available: purchase_quote.quantity_available,
                profit,
                profit_per_volume: OrderedFloat(profit as f64 / volume_per_unit as f64),
            })
        })
        .collect::<Result<Vec<_>, _>>()
}

/// The good with the highest profit per volume. On a tie the earlier good in the comparison wins.
pub fn best_good_to_buy(from_market: &MarketSnapshot, to_market: &MarketSnapshot) -> Result<MarketComparison, TradeError> {
    let comparisons = compare_markets(from_market, to_market)?;

    comparisons
        .into_iter()
        .reduce(|best, candidate| {
            if candidate.profit_per_volume > best.profit_per_volume {
                candidate
            } else {
                best
            }
        })
        .ok_or_else(|| TradeError::NoViableTrade(format!("{} and {} have no goods in common", from_market.location, to_market.location)))
}

/// Whole units of a good that fit into `capacity`.
pub fn how_much_to_buy(volume_per_unit: u32, capacity: u32) -> u32 {
    if volume_per_unit == 0 {
        return 0;
    }
    capacity / volume_per_unit
}
