use crate::trading::{best_good_to_buy, how_much_to_buy};
use crate::{LocationRegistry, LocationSymbol, MarketSnapshot, Ship, ShipClass, TradeError, TradeProposal};
use tracing::{event, Level};

/// Fuel burnt on a leg of `distance`, including the hull surcharge.
pub fn fuel_usage(class: &ShipClass, distance: u32) -> u32 {
    (9.0 / 37.0 * distance as f64 + 4.0 + class.fuel_surcharge() as f64).round() as u32
}

#[derive(Debug, Clone, Copy)]
pub struct TradePlanner<'a> {
    registry: &'a LocationRegistry,
}

impl<'a> TradePlanner<'a> {
    pub fn new(registry: &'a LocationRegistry) -> Self {
        TradePlanner { registry }
    }

    pub fn registry(&self) -> &'a LocationRegistry {
        self.registry
    }

    pub fn distance(&self, ship: &Ship, destination: &LocationSymbol) -> Result<u32, TradeError> {
        let destination = self.registry.resolve(destination)?;
        ship.distance_to(destination)
            .ok_or_else(|| TradeError::Data(format!("ship {} is in transit and has no position", ship.id)))
    }

    pub fn fuel_required(&self, ship: &Ship, destination: &LocationSymbol) -> Result<u32, TradeError> {
        let distance = self.distance(ship, destination)?;
        Ok(fuel_usage(&ship.class, distance))
    }

    /// What to buy at the ship's current market to sell at `destination`.
    ///
    /// Cargo space reserved for the fuel of the leg is not available for goods.
    pub fn plan_purchase(
        &self,
        ship: &Ship,
        destination: &LocationSymbol,
        from_market: &MarketSnapshot,
        to_market: &MarketSnapshot,
    ) -> Result<TradeProposal, TradeError> {
        let fuel_required = self.fuel_required(ship, destination)?;
        let origin = ship
            .current_location()
            .ok_or_else(|| TradeError::Data(format!("ship {} is in transit", ship.id)))?;

        if &from_market.location != origin {
            return Err(TradeError::Data(format!(
                "ship {} is at {} but the buying market is {}",
                ship.id, origin, from_market.location
            )));
        }
        if &to_market.location != destination {
            return Err(TradeError::Data(format!("market {} does not belong to destination {}", to_market.location, destination)));
        }

        let best = best_good_to_buy(from_market, to_market)?;

        let usable_cargo = ship.max_cargo.saturating_sub(fuel_required);
        let units_to_buy = how_much_to_buy(best.volume_per_unit, usable_cargo);
        if units_to_buy == 0 {
            return Err(TradeError::NoViableTrade(format!(
                "{} units of volume left after {} fuel, one unit of {} needs {}",
                usable_cargo, fuel_required, best.good, best.volume_per_unit
            )));
        }

        Ok(TradeProposal {
            good: best.good,
            unit_cost: best.purchase_price_per_unit,
            units_to_buy,
            total_cost: units_to_buy as i64 * best.purchase_price_per_unit,
            expected_profit: units_to_buy as i64 * best.profit,
            profit_per_volume: best.profit_per_volume,
            fuel_required,
            origin: origin.clone(),
            destination: destination.clone(),
        })
    }

    /// The most profitable destination among `candidates`. The first one wins a tie.
    ///
    /// Candidates without a viable trade are skipped, any other error aborts the selection.
    pub fn best_route(
        &self,
        ship: &Ship,
        origin_market: &MarketSnapshot,
        candidates: &[&MarketSnapshot],
    ) -> Result<(LocationSymbol, TradeProposal), TradeError> {
        let mut best: Option<TradeProposal> = None;

        for candidate in candidates.iter().filter(|candidate| !ship.is_at(&candidate.location)) {
            match self.plan_purchase(ship, &candidate.location, origin_market, candidate) {
                Ok(proposal) => {
                    event!(
                        Level::DEBUG,
                        "{} -> {}: {} x {} for an expected profit of {}",
                        proposal.origin,
                        proposal.destination,
                        proposal.units_to_buy,
                        proposal.good,
                        proposal.expected_profit
                    );
                    if best.as_ref().map_or(true, |current| proposal.expected_profit > current.expected_profit) {
                        best = Some(proposal);
                    }
                }
                Err(TradeError::NoViableTrade(reason)) => {
                    event!(Level::DEBUG, "skipping {}: {}", candidate.location, reason);
                }
                Err(err) => return Err(err),
            }
        }

        best.map(|proposal| (proposal.destination.clone(), proposal)).ok_or_else(|| {
            TradeError::NoRoute(format!(
                "none of {} candidate markets offers a trade from {}",
                candidates.len(),
                origin_market.location
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_objects::TestObjects;
    use crate::TradeGoodSymbol;
    use ordered_float::OrderedFloat;

    fn symbol(s: &str) -> LocationSymbol {
        LocationSymbol(s.to_string())
    }

    #[test]
    fn test_fuel_usage() {
        assert_eq!(fuel_usage(&ShipClass::MkI, 0), 4);
        assert_eq!(fuel_usage(&ShipClass::MkI, 4), 5);
        assert_eq!(fuel_usage(&ShipClass::MkI, 25), 10);
        assert_eq!(fuel_usage(&ShipClass::MkII, 25), 12);
        assert_eq!(fuel_usage(&ShipClass::MkIII, 25), 14);
        assert_eq!(fuel_usage(&ShipClass::Unknown, 25), 10);
    }

    #[test]
    fn test_plan_purchase_fills_hold_minus_fuel() {
        let registry = TestObjects::registry();
        let planner = TradePlanner::new(&registry);
        let ship = TestObjects::ship_at(&registry, "OE-PM", 100);
        let from = TestObjects::market("OE-PM", &[("FUEL", 10, 8, 1), ("ORE", 5, 3, 2)]);
        let to = TestObjects::market("OE-CR", &[("ORE", 12, 9, 2)]);

        let proposal = planner.plan_purchase(&ship, &symbol("OE-CR"), &from, &to).unwrap();

        assert_eq!(
            proposal,
            TradeProposal {
                good: TradeGoodSymbol("ORE".to_string()),
                unit_cost: 5,
                units_to_buy: 45,
                total_cost: 225,
                expected_profit: 180,
                profit_per_volume: OrderedFloat(2.0),
                fuel_required: 10,
                origin: symbol("OE-PM"),
                destination: symbol("OE-CR"),
            }
        );
    }

    #[test]
    fn test_plan_purchase_is_idempotent() {
        let registry = TestObjects::registry();
        let planner = TradePlanner::new(&registry);
        let ship = TestObjects::ship_at(&registry, "OE-PM", 300);
        let from = TestObjects::market("OE-PM", &[("METALS", 4, 3, 1), ("ORE", 5, 3, 2), ("RESEARCH", 300, 250, 3)]);
        let to = TestObjects::market("OE-KO", &[("METALS", 9, 8, 1), ("ORE", 12, 9, 2), ("RESEARCH", 400, 390, 3)]);

        let first = planner.plan_purchase(&ship, &symbol("OE-KO"), &from, &to).unwrap();
        let second = planner.plan_purchase(&ship, &symbol("OE-KO"), &from, &to).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_planned_cargo_fits_next_to_fuel() {
        let registry = TestObjects::registry();
        let planner = TradePlanner::new(&registry);
        let from = TestObjects::market("OE-PM", &[("ORE", 5, 3, 3), ("CHEMICALS", 12, 10, 7)]);
        let to = TestObjects::market("OE-KO", &[("ORE", 12, 9, 3), ("CHEMICALS", 60, 55, 7)]);

        for max_cargo in [50, 100, 101, 299, 300, 1000] {
            let ship = TestObjects::ship_at(&registry, "OE-PM", max_cargo);
            let proposal = planner.plan_purchase(&ship, &symbol("OE-KO"), &from, &to).unwrap();
            let volume = from.quote(&proposal.good).and_then(|quote| quote.volume_per_unit).unwrap();

            assert!(proposal.units_to_buy * volume <= max_cargo - proposal.fuel_required);
            assert!((proposal.units_to_buy + 1) * volume > max_cargo - proposal.fuel_required);
        }
    }

    #[test]
    fn test_plan_purchase_without_room_is_no_viable_trade() {
        let registry = TestObjects::registry();
        let planner = TradePlanner::new(&registry);
        let ship = TestObjects::ship_at(&registry, "OE-PM", 11);
        let from = TestObjects::market("OE-PM", &[("ORE", 5, 3, 2)]);
        let to = TestObjects::market("OE-CR", &[("ORE", 12, 9, 2)]);

        assert!(matches!(
            planner.plan_purchase(&ship, &symbol("OE-CR"), &from, &to),
            Err(TradeError::NoViableTrade(_))
        ));
    }

    #[test]
    fn test_plan_purchase_rejects_bad_input() {
        let registry = TestObjects::registry();
        let planner = TradePlanner::new(&registry);
        let ship = TestObjects::ship_at(&registry, "OE-PM", 100);
        let from = TestObjects::market("OE-PM", &[("ORE", 5, 3, 2)]);
        let to = TestObjects::market("OE-CR", &[("ORE", 12, 9, 2)]);

        let unknown = planner.plan_purchase(&ship, &symbol("OE-NOWHERE"), &from, &to);
        let in_transit = planner.plan_purchase(&TestObjects::ship_in_transit(100), &symbol("OE-CR"), &from, &to);
        let wrong_origin = planner.plan_purchase(&ship, &symbol("OE-CR"), &to, &to);
        let wrong_destination = planner.plan_purchase(&ship, &symbol("OE-KO"), &from, &to);

        assert!(matches!(unknown, Err(TradeError::Data(_))));
        assert!(matches!(in_transit, Err(TradeError::Data(_))));
        assert!(matches!(wrong_origin, Err(TradeError::Data(_))));
        assert!(matches!(wrong_destination, Err(TradeError::Data(_))));
    }

    #[test]
    fn test_best_route_picks_highest_expected_profit() {
        let registry = TestObjects::registry();
        let planner = TradePlanner::new(&registry);
        let ship = TestObjects::ship_at(&registry, "OE-PM", 100);
        let origin = TestObjects::market("OE-PM", &[("ORE", 5, 3, 2), ("METALS", 4, 3, 1)]);
        let tritus = TestObjects::market("OE-PM-TR", &[("ORE", 7, 6, 2)]);
        let carth = TestObjects::market("OE-CR", &[("METALS", 9, 8, 1)]);
        let kobol = TestObjects::market("OE-KO", &[("SHIP_PARTS", 90, 80, 5)]);

        let (destination, proposal) = planner.best_route(&ship, &origin, &[&tritus, &kobol, &carth]).unwrap();

        assert_eq!(destination, symbol("OE-CR"));
        assert_eq!(proposal.good, TradeGoodSymbol("METALS".to_string()));
        assert_eq!(proposal.expected_profit, 90 * 4);
    }

    #[test]
    fn test_best_route_skips_current_location() {
        let registry = TestObjects::registry();
        let planner = TradePlanner::new(&registry);
        let ship = TestObjects::ship_at(&registry, "OE-PM", 100);
        let origin = TestObjects::market("OE-PM", &[("ORE", 5, 3, 2)]);
        let same_place = TestObjects::market("OE-PM", &[("ORE", 500, 300, 2)]);
        let carth = TestObjects::market("OE-CR", &[("ORE", 7, 6, 2)]);

        let (destination, _) = planner.best_route(&ship, &origin, &[&same_place, &carth]).unwrap();

        assert_eq!(destination, symbol("OE-CR"));
    }

    #[test]
    fn test_best_route_without_candidates_is_no_route() {
        let registry = TestObjects::registry();
        let planner = TradePlanner::new(&registry);
        let ship = TestObjects::ship_at(&registry, "OE-PM", 100);
        let origin = TestObjects::market("OE-PM", &[("ORE", 5, 3, 2)]);
        let nothing_in_common = TestObjects::market("OE-CR", &[("METALS", 9, 8, 1)]);

        assert!(matches!(planner.best_route(&ship, &origin, &[]), Err(TradeError::NoRoute(_))));
        assert!(matches!(planner.best_route(&ship, &origin, &[&nothing_in_common]), Err(TradeError::NoRoute(_))));
    }

    #[test]
    fn test_best_route_propagates_data_errors() {
        let registry = TestObjects::registry();
        let planner = TradePlanner::new(&registry);
        let ship = TestObjects::ship_at(&registry, "OE-PM", 100);
        let origin = TestObjects::market("OE-PM", &[("ORE", 5, 3, 2)]);
        let carth = TestObjects::market("OE-CR", &[("ORE", 7, 6, 2)]);
        let unknown = TestObjects::market("OE-NOWHERE", &[("ORE", 70, 60, 2)]);

        assert!(matches!(planner.best_route(&ship, &origin, &[&carth, &unknown]), Err(TradeError::Data(_))));
    }
}
