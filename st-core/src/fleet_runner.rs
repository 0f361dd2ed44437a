use crate::trading_run::{TradeTarget, TradingRunError, TradingRunner};
use itertools::Itertools;
use st_domain::{LocationSymbol, RunState, ShipId, TradingLoopSummary, TradingRunReport};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{event, Instrument, Level};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeRoute {
    /// Back and forth between two locations.
    Shuttle(LocationSymbol, LocationSymbol),
    /// Every run sells at the most profitable of these locations.
    BestOf(Vec<LocationSymbol>),
}

impl TradeRoute {
    /// A ship that is at neither end of a shuttle starts with the first one.
    pub fn next_target(&self, current_location: Option<&LocationSymbol>) -> TradeTarget {
        match self {
            TradeRoute::Shuttle(first, second) => {
                if current_location == Some(first) {
                    TradeTarget::Destination(second.clone())
                } else {
                    TradeTarget::Destination(first.clone())
                }
            }
            TradeRoute::BestOf(candidates) => TradeTarget::BestOf(candidates.clone()),
        }
    }
}

/// Performs up to `runs` consecutive trading runs with one ship.
///
/// A cancellation ends the loop with the runs finished so far, also when it interrupts a run.
pub async fn run_trading_loop(
    runner: &TradingRunner,
    ship_id: &ShipId,
    runs: u32,
    route: &TradeRoute,
    cancellation_token: &CancellationToken,
) -> Result<TradingLoopSummary, TradingRunError> {
    let start = Instant::now();
    let mut ship = runner.ship_operations(ship_id).await?;
    let mut reports: Vec<TradingRunReport> = Vec::with_capacity(runs as usize);

    for run in 1..=runs {
        if cancellation_token.is_cancelled() {
            event!(Level::INFO, "{}: stopping after {} runs", ship_id, reports.len());
            break;
        }

        let total_so_far: i64 = reports.iter().map(|report| report.net_profit).sum();
        event!(Level::INFO, "{}: trading run {} of {}, profit so far {}", ship_id, run, runs, total_so_far);

        let target = route.next_target(ship.current_location());
        let report = match runner.run(&mut ship, &target, cancellation_token).await {
            Ok(report) => report,
            Err(TradingRunError::Cancelled { state }) => {
                event!(Level::INFO, "{}: run {} cancelled while {}, keeping {} finished runs", ship_id, run, state, reports.len());
                break;
            }
            Err(err) => return Err(err),
        };
        reports.push(report);

        ship.refresh().await.map_err(|source| TradingRunError::Failed {
            state: RunState::Idle,
            source,
        })?;
    }

    let summary = TradingLoopSummary::new(ship_id.clone(), &reports, start.elapsed().as_secs());
    event!(
        Level::INFO,
        "{}: {} runs made {} in {}s ({} per hour)",
        ship_id,
        summary.runs_completed,
        summary.total_profit,
        summary.elapsed_secs,
        summary.profit_per_hour
    );

    Ok(summary)
}

/// Trades with every ship in its own task. Ships are started `stagger_delay` apart.
///
/// Each ship id must appear only once. Ships not yet started when the token is cancelled are left out of the result.
pub async fn run_fleet(
    runner: TradingRunner,
    ship_ids: Vec<ShipId>,
    runs: u32,
    route: TradeRoute,
    cancellation_token: CancellationToken,
) -> Vec<(ShipId, Result<TradingLoopSummary, TradingRunError>)> {
    let stagger_delay = runner.config().stagger_delay;
    let mut ship_tasks = JoinSet::new();

    for (idx, ship_id) in ship_ids.into_iter().enumerate() {
        if idx > 0 {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    event!(Level::INFO, "fleet start cancelled, {} is not started", ship_id);
                    break;
                }
                _ = tokio::time::sleep(stagger_delay) => {}
            }
        }

        let runner = runner.clone();
        let route = route.clone();
        let cancellation_token = cancellation_token.clone();
        let span = tracing::info_span!("ship", ship_id = %ship_id);

        ship_tasks.spawn(
            async move {
                let result = run_trading_loop(&runner, &ship_id, runs, &route, &cancellation_token).await;
                (ship_id, result)
            }
            .instrument(span),
        );
    }

    let mut results = vec![];
    while let Some(joined) = ship_tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(err) => event!(Level::ERROR, "ship task ended abnormally: {}", err),
        }
    }

    results.into_iter().sorted_by(|(a, _), (b, _)| a.cmp(b)).collect_vec()
}
