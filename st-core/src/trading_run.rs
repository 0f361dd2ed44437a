use crate::configuration::TradingConfig;
use crate::ship::ShipOperations;
use crate::st_client::{ApiError, StClientTrait};
use chrono::Utc;
use itertools::Itertools;
use st_domain::{
    how_much_to_buy, FlightPlan, LocationRegistry, LocationSymbol, MarketSnapshot, RunState, ShipId, TradeError, TradeGoodSymbol, TradePlanner, TradeProposal,
    TradingRunEvent, TradingRunReport,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradingRunError {
    #[error(transparent)]
    Trade(#[from] TradeError),

    #[error("trading run failed while {state}: {source}")]
    Failed { state: RunState, source: ApiError },

    #[error("trading run cancelled while {state}")]
    Cancelled { state: RunState },
}

fn failed_in(state: RunState) -> impl FnOnce(ApiError) -> TradingRunError {
    move |source| TradingRunError::Failed { state, source }
}

/// Where a run sells its cargo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeTarget {
    Destination(LocationSymbol),
    /// The most profitable of these markets, see [`TradePlanner::best_route`].
    BestOf(Vec<LocationSymbol>),
}

struct RunStateTracker {
    ship_id: ShipId,
    state: RunState,
    events: Option<Sender<TradingRunEvent>>,
}

impl RunStateTracker {
    async fn transition(&mut self, to: RunState) {
        let from = self.state;
        self.state = to;
        event!(Level::INFO, "{}: {} -> {}", self.ship_id, from, to);
        self.emit(TradingRunEvent::StateChanged {
            ship_id: self.ship_id.clone(),
            from,
            to,
        })
        .await;
    }

    async fn emit(&self, trading_run_event: TradingRunEvent) {
        if let Some(events) = &self.events {
            if events.send(trading_run_event).await.is_err() {
                event!(Level::DEBUG, "trading run observer of {} is gone", self.ship_id);
            }
        }
    }
}

/// Runs buy, fly and sell cycles. Cheap to clone, all ships of a fleet share one runner.
#[derive(Debug, Clone)]
pub struct TradingRunner {
    client: Arc<dyn StClientTrait>,
    registry: Arc<LocationRegistry>,
    config: TradingConfig,
    events: Option<Sender<TradingRunEvent>>,
}

impl TradingRunner {
    pub fn new(client: Arc<dyn StClientTrait>, registry: Arc<LocationRegistry>, config: TradingConfig) -> Self {
        TradingRunner {
            client,
            registry,
            config,
            events: None,
        }
    }

    pub fn with_events(self, events: Sender<TradingRunEvent>) -> Self {
        TradingRunner { events: Some(events), ..self }
    }

    pub fn client(&self) -> Arc<dyn StClientTrait> {
        Arc::clone(&self.client)
    }

    pub fn registry(&self) -> &LocationRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub async fn ship_operations(&self, ship_id: &ShipId) -> Result<ShipOperations, TradingRunError> {
        let response = self.client.get_ship(ship_id).await.map_err(failed_in(RunState::Idle))?;
        Ok(ShipOperations::new(response.ship, self.client()))
    }

    /// One complete trading run. `ship` is kept up to date with every order, also when the run fails halfway.
    pub async fn run(
        &self,
        ship: &mut ShipOperations,
        target: &TradeTarget,
        cancellation_token: &CancellationToken,
    ) -> Result<TradingRunReport, TradingRunError> {
        let mut tracker = RunStateTracker {
            ship_id: ship.id.clone(),
            state: RunState::Idle,
            events: self.events.clone(),
        };

        match self.execute(ship, target, cancellation_token, &mut tracker).await {
            Ok(report) => Ok(report),
            Err(err) => {
                event!(Level::ERROR, "trading run of {} aborted: {}", ship.id, err);
                tracker.transition(RunState::Failed).await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        ship: &mut ShipOperations,
        target: &TradeTarget,
        cancellation_token: &CancellationToken,
        tracker: &mut RunStateTracker,
    ) -> Result<TradingRunReport, TradingRunError> {
        let started_at = Utc::now();
        let origin = ship
            .current_location()
            .cloned()
            .ok_or_else(|| TradeError::Data(format!("ship {} is in transit and cannot trade", ship.id)))?;

        let fuel_total = self.refuel_if_necessary(ship, tracker).await?;

        tracker.transition(RunState::Buying).await;
        let (proposal, volume_per_unit) = self.plan(ship, &origin, target).await?;

        // the plan only reserves room for the fuel of the leg, fuel already on board takes space as well
        let units_to_buy = u32::min(proposal.units_to_buy, how_much_to_buy(volume_per_unit, ship.space_available));
        if units_to_buy == 0 {
            return Err(TradeError::NoViableTrade(format!("no room left in the hold of {} for {}", ship.id, proposal.good)).into());
        }
        if units_to_buy < proposal.units_to_buy {
            event!(
                Level::INFO,
                "{}: hold only fits {} of the planned {} units of {}",
                ship.id,
                units_to_buy,
                proposal.units_to_buy,
                proposal.good
            );
        }

        event!(
            Level::INFO,
            "{}: buying {} x {} for {} to sell at {}, expected profit {}",
            ship.id,
            units_to_buy,
            proposal.good,
            proposal.unit_cost * units_to_buy as i64,
            proposal.destination,
            proposal.expected_profit
        );
        let purchase = ship
            .purchase_trade_good(units_to_buy, &proposal.good)
            .await
            .map_err(failed_in(RunState::Buying))?;
        tracker
            .emit(TradingRunEvent::Purchased {
                ship_id: ship.id.clone(),
                good: purchase.order.good.clone(),
                quantity: purchase.order.quantity,
                total: purchase.order.total,
            })
            .await;

        tracker.transition(RunState::Flying).await;
        let destination = self.registry.resolve(&proposal.destination)?.clone();
        let flight_plan = ship.fly_to(&destination).await.map_err(failed_in(RunState::Flying))?;
        tracker
            .emit(TradingRunEvent::FlightPlanned {
                ship_id: ship.id.clone(),
                destination: destination.symbol.clone(),
                flight_time_secs: flight_plan.time_remaining_in_seconds,
            })
            .await;
        self.wait_for_arrival(&flight_plan, cancellation_token, tracker).await?;

        tracker.transition(RunState::Selling).await;
        ship.refresh().await.map_err(failed_in(RunState::Selling))?;
        let sale = ship
            .sell_trade_good(purchase.order.quantity, &purchase.order.good)
            .await
            .map_err(failed_in(RunState::Selling))?;
        tracker
            .emit(TradingRunEvent::Sold {
                ship_id: ship.id.clone(),
                good: sale.order.good.clone(),
                quantity: sale.order.quantity,
                total: sale.order.total,
            })
            .await;

        tracker.transition(RunState::Done).await;
        let report = TradingRunReport {
            ship_id: ship.id.clone(),
            origin,
            destination: destination.symbol,
            good: purchase.order.good,
            quantity: purchase.order.quantity,
            purchase_total: purchase.order.total,
            sale_total: sale.order.total,
            fuel_total,
            net_profit: sale.order.total - purchase.order.total,
            credits: sale.credits,
            started_at,
            finished_at: Utc::now(),
        };
        event!(
            Level::INFO,
            "{}: sold {} x {} at {} for a profit of {}",
            report.ship_id,
            report.quantity,
            report.good,
            report.destination,
            report.net_profit
        );
        tracker.emit(TradingRunEvent::Completed(report.clone())).await;

        Ok(report)
    }

    async fn refuel_if_necessary(&self, ship: &mut ShipOperations, tracker: &mut RunStateTracker) -> Result<i64, TradingRunError> {
        let fuel_level = ship.fuel_level();
        if fuel_level >= self.config.fuel_reserve {
            return Ok(0);
        }

        tracker.transition(RunState::Fueling).await;
        let units = self.config.fuel_reserve - fuel_level;
        let response = ship
            .purchase_trade_good(units, &TradeGoodSymbol::fuel())
            .await
            .map_err(failed_in(RunState::Fueling))?;
        tracker
            .emit(TradingRunEvent::Fueled {
                ship_id: ship.id.clone(),
                units,
                total: response.order.total,
            })
            .await;

        Ok(response.order.total)
    }

    /// The proposal together with the volume one unit of its good takes up.
    async fn plan(&self, ship: &ShipOperations, origin: &LocationSymbol, target: &TradeTarget) -> Result<(TradeProposal, u32), TradingRunError> {
        let planner = TradePlanner::new(&self.registry);
        let origin_market = self.fetch_market(origin).await?;

        let proposal = match target {
            TradeTarget::Destination(destination) => {
                let destination_market = self.fetch_market(destination).await?;
                planner.plan_purchase(ship, destination, &origin_market, &destination_market)?
            }
            TradeTarget::BestOf(candidates) => {
                let mut candidate_markets = Vec::with_capacity(candidates.len());
                for candidate in candidates.iter().filter(|candidate| *candidate != origin) {
                    candidate_markets.push(self.fetch_market(candidate).await?);
                }
                let (_, proposal) = planner.best_route(ship, &origin_market, &candidate_markets.iter().collect_vec())?;
                proposal
            }
        };

        let volume_per_unit = origin_market
            .quote(&proposal.good)
            .and_then(|quote| quote.volume_per_unit)
            .ok_or_else(|| TradeError::Data(format!("{} lost the volume of {}", origin, proposal.good)))?;

        Ok((proposal, volume_per_unit))
    }

    async fn fetch_market(&self, location: &LocationSymbol) -> Result<MarketSnapshot, TradingRunError> {
        let response = self.client.get_market(location).await.map_err(failed_in(RunState::Buying))?;
        Ok(response.into_snapshot(Utc::now())?)
    }

    async fn wait_for_arrival(
        &self,
        flight_plan: &FlightPlan,
        cancellation_token: &CancellationToken,
        tracker: &mut RunStateTracker,
    ) -> Result<(), TradingRunError> {
        let tick = if self.config.progress_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.config.progress_interval
        };
        let mut remaining = Duration::from_secs(flight_plan.time_remaining_in_seconds);
        event!(
            Level::INFO,
            "{}: flying to {}, arriving in {}s",
            flight_plan.ship_id,
            flight_plan.destination,
            remaining.as_secs()
        );

        while !remaining.is_zero() {
            let step = remaining.min(tick);
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    return Err(TradingRunError::Cancelled { state: tracker.state });
                }
                _ = tokio::time::sleep(step) => {}
            }
            remaining -= step;
            tracker
                .emit(TradingRunEvent::FlightProgress {
                    ship_id: flight_plan.ship_id.clone(),
                    destination: flight_plan.destination.clone(),
                    remaining_secs: remaining.as_secs(),
                })
                .await;
        }

        Ok(())
    }
}
