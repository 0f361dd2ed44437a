use crate::st_client::{ApiError, StClientTrait};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use itertools::Itertools;
use st_domain::{
    fuel_usage, AvailableShipsResponse, BuyShipResponse, CargoItem, FlightPlan, FlightPlanResponse, GetMarketResponse, GetShipResponse, GetUserResponse,
    ListLocationsResponse, ListShipsResponse, Loan, LocationRegistry, LocationSymbol, MarketQuote, MarketSnapshot, Marketplace, Order, OrderResponse,
    RequestLoanResponse, ScrapShipResponse, Ship, ShipClass, ShipId, ShipListing, ShipPosition, StatusResponse, SystemSymbol, TradeGoodSymbol, User,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A deterministic stand-in for the game. Flights land immediately, only the reported flight time is simulated.
#[derive(Debug)]
pub struct InMemoryUniverse {
    pub username: String,
    pub credits: i64,
    pub ships: HashMap<ShipId, Ship>,
    pub marketplaces: HashMap<LocationSymbol, Vec<MarketQuote>>,
    pub registry: LocationRegistry,
    pub flight_plans: Vec<FlightPlan>,
    pub orders: Vec<Order>,
    pub loans: Vec<Loan>,
    pub shipyard: Vec<ShipListing>,
    pub seconds_per_distance: u64,
}

pub const STARTUP_LOAN: &str = "STARTUP";
const STARTUP_LOAN_AMOUNT: i64 = 200_000;
const STARTUP_LOAN_REPAYMENT: i64 = 280_000;

fn bad_request(message: String) -> ApiError {
    ApiError::RemoteOperation { code: 400, message }
}

fn not_found(message: String) -> ApiError {
    ApiError::RemoteOperation { code: 404, message }
}

impl InMemoryUniverse {
    pub fn new(username: &str, credits: i64, registry: LocationRegistry) -> Self {
        InMemoryUniverse {
            username: username.to_string(),
            credits,
            ships: HashMap::new(),
            marketplaces: HashMap::new(),
            registry,
            flight_plans: vec![],
            orders: vec![],
            loans: vec![],
            shipyard: vec![],
            seconds_per_distance: 2,
        }
    }

    pub fn with_ship(mut self, ship: Ship) -> Self {
        self.ships.insert(ship.id.clone(), ship);
        self
    }

    pub fn with_market(mut self, snapshot: MarketSnapshot) -> Self {
        self.marketplaces.insert(snapshot.location.clone(), snapshot.quotes().to_vec());
        self
    }

    pub fn with_shipyard(mut self, listing: ShipListing) -> Self {
        self.shipyard.push(listing);
        self
    }

    fn docked_ship(&mut self, ship_id: &ShipId) -> Result<&mut Ship, ApiError> {
        let ship = self.ships.get_mut(ship_id).ok_or_else(|| not_found(format!("Ship {ship_id} not found")))?;
        if ship.is_in_transit() {
            return Err(bad_request(format!("Ship {ship_id} is still in transit")));
        }
        Ok(ship)
    }

    fn quote_at(&self, location: &LocationSymbol, good: &TradeGoodSymbol) -> Result<MarketQuote, ApiError> {
        self.marketplaces
            .get(location)
            .and_then(|quotes| quotes.iter().find(|quote| &quote.symbol == good))
            .cloned()
            .ok_or_else(|| bad_request(format!("{good} is not traded at {location}")))
    }

    pub fn perform_purchase(&mut self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError> {
        let location = self
            .docked_ship(ship_id)?
            .current_location()
            .cloned()
            .ok_or_else(|| bad_request(format!("Ship {ship_id} is not docked")))?;
        let quote = self.quote_at(&location, good)?;

        if quote.quantity_available < quantity {
            return Err(bad_request(format!("Only {} units of {good} available", quote.quantity_available)));
        }
        let total = quote.purchase_price_per_unit * quantity as i64;
        if total > self.credits {
            return Err(bad_request(format!("Not enough credits: required {total}, available {}", self.credits)));
        }
        let volume = quote.volume_per_unit.unwrap_or(1) * quantity;

        let ship = self.docked_ship(ship_id)?;
        if volume > ship.space_available {
            return Err(bad_request(format!("Ship {ship_id} has {} space available, the order needs {volume}", ship.space_available)));
        }
        add_cargo(ship, good, quantity, volume);
        let ship = ship.clone();

        self.credits -= total;
        if let Some(quotes) = self.marketplaces.get_mut(&location) {
            quotes
                .iter_mut()
                .filter(|q| &q.symbol == good)
                .for_each(|q| q.quantity_available -= quantity);
        }

        Ok(self.record_order(good, quantity, quote.purchase_price_per_unit, total, ship))
    }

    pub fn perform_sale(&mut self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError> {
        let location = self
            .docked_ship(ship_id)?
            .current_location()
            .cloned()
            .ok_or_else(|| bad_request(format!("Ship {ship_id} is not docked")))?;
        let quote = self.quote_at(&location, good)?;

        let ship = self.docked_ship(ship_id)?;
        if ship.quantity_of(good) < quantity {
            return Err(bad_request(format!("Ship {ship_id} carries only {} units of {good}", ship.quantity_of(good))));
        }
        remove_cargo(ship, good, quantity);
        let ship = ship.clone();

        let total = quote.sell_price_per_unit * quantity as i64;
        self.credits += total;

        Ok(self.record_order(good, quantity, quote.sell_price_per_unit, total, ship))
    }

    pub fn perform_flight(&mut self, ship_id: &ShipId, destination: &LocationSymbol) -> Result<FlightPlanResponse, ApiError> {
        let target = self
            .registry
            .get(destination)
            .cloned()
            .ok_or_else(|| bad_request(format!("Unknown destination {destination}")))?;
        let seconds_per_distance = self.seconds_per_distance;
        let flight_number = self.flight_plans.len() + 1;

        let ship = self.docked_ship(ship_id)?;
        let departure = ship.current_location().cloned().ok_or_else(|| bad_request(format!("Ship {ship_id} is not docked")))?;
        if &departure == destination {
            return Err(bad_request(format!("Ship {ship_id} is already at {destination}")));
        }

        let distance = ship.distance_to(&target).unwrap_or_default();
        let fuel_consumed = fuel_usage(&ship.class, distance);
        if ship.fuel_level() < fuel_consumed {
            return Err(bad_request(format!("Ship {ship_id} needs {fuel_consumed} fuel, has {}", ship.fuel_level())));
        }
        remove_cargo(ship, &TradeGoodSymbol::fuel(), fuel_consumed);
        ship.update_location(&target);

        let time_remaining_in_seconds = u64::max(1, distance as u64 * seconds_per_distance);
        let flight_plan = FlightPlan {
            id: format!("flight-{flight_number}"),
            ship_id: ship_id.clone(),
            departure,
            destination: destination.clone(),
            distance: Some(distance),
            fuel_consumed: Some(fuel_consumed),
            fuel_remaining: Some(ship.fuel_level()),
            time_remaining_in_seconds,
            arrives_at: Some(Utc::now() + TimeDelta::seconds(time_remaining_in_seconds as i64)),
        };
        self.flight_plans.push(flight_plan.clone());

        Ok(FlightPlanResponse { flight_plan })
    }

    /// One outstanding loan at a time.
    pub fn perform_loan_request(&mut self, loan_type: &str) -> Result<RequestLoanResponse, ApiError> {
        if loan_type != STARTUP_LOAN {
            return Err(bad_request(format!("Unknown loan type {loan_type}")));
        }
        if self.loans.iter().any(|loan| loan.status == "CURRENT") {
            return Err(bad_request("User already has an outstanding loan".to_string()));
        }

        let loan = Loan {
            id: format!("loan-{}", self.loans.len() + 1),
            due: Some(Utc::now() + TimeDelta::days(2)),
            repayment_amount: STARTUP_LOAN_REPAYMENT,
            status: "CURRENT".to_string(),
            loan_type: loan_type.to_string(),
        };
        self.loans.push(loan.clone());
        self.credits += STARTUP_LOAN_AMOUNT;

        Ok(RequestLoanResponse { credits: self.credits, loan })
    }

    pub fn perform_ship_purchase(&mut self, location: &LocationSymbol, ship_type: &str) -> Result<BuyShipResponse, ApiError> {
        let listing = self
            .shipyard
            .iter()
            .find(|listing| listing.ship_type == ship_type)
            .cloned()
            .ok_or_else(|| bad_request(format!("Ship type {ship_type} is not for sale")))?;
        let price = listing
            .price_at(location)
            .ok_or_else(|| bad_request(format!("{ship_type} is not sold at {location}")))?;
        if price > self.credits {
            return Err(bad_request(format!("Not enough credits: required {price}, available {}", self.credits)));
        }
        let shipyard_location = self.registry.get(location).cloned().ok_or_else(|| not_found(format!("Location {location} not found")))?;

        let id = (self.ships.len() + 1..)
            .map(|n| ShipId(format!("ship-{n}")))
            .find(|id| !self.ships.contains_key(id))
            .unwrap_or_else(|| ShipId(format!("ship-{}", Utc::now().timestamp_micros())));
        let ship = Ship {
            id: id.clone(),
            manufacturer: listing.manufacturer,
            class: listing.class,
            ship_type: listing.ship_type,
            position: ShipPosition::Docked {
                location: shipyard_location.symbol,
                x: shipyard_location.x,
                y: shipyard_location.y,
            },
            speed: listing.speed,
            plating: listing.plating,
            weapons: listing.weapons,
            max_cargo: listing.max_cargo,
            space_available: listing.max_cargo,
            cargo: vec![],
        };
        self.ships.insert(id, ship.clone());
        self.credits -= price;

        Ok(BuyShipResponse { credits: self.credits, ship })
    }

    /// Scrapping returns a quarter of what the ship type costs at the local shipyard.
    pub fn perform_scrap(&mut self, ship_id: &ShipId) -> Result<ScrapShipResponse, ApiError> {
        let ship = self.docked_ship(ship_id)?;
        let location = ship.current_location().cloned().ok_or_else(|| bad_request(format!("Ship {ship_id} is not docked")))?;
        let ship_type = ship.ship_type.clone();

        if !self.shipyard.iter().any(|listing| listing.price_at(&location).is_some()) {
            return Err(bad_request(format!("There is no shipyard at {location}")));
        }
        let value = self
            .shipyard
            .iter()
            .find(|listing| listing.ship_type == ship_type)
            .and_then(|listing| listing.price_at(&location))
            .map(|price| price / 4)
            .unwrap_or_default();

        self.ships.remove(ship_id);
        self.credits += value;

        Ok(ScrapShipResponse {
            success: format!("Ship scrapped for {value} credits"),
        })
    }

    fn record_order(&mut self, good: &TradeGoodSymbol, quantity: u32, price_per_unit: i64, total: i64, ship: Ship) -> OrderResponse {
        let order = Order {
            good: good.clone(),
            quantity,
            price_per_unit,
            total,
        };
        self.orders.push(order.clone());

        OrderResponse {
            credits: self.credits,
            order,
            ship,
        }
    }
}

fn add_cargo(ship: &mut Ship, good: &TradeGoodSymbol, quantity: u32, volume: u32) {
    let mut cargo = ship.cargo.clone();
    match cargo.iter_mut().find(|item| &item.good == good) {
        Some(item) => {
            item.quantity += quantity;
            item.total_volume += volume;
        }
        None => cargo.push(CargoItem {
            good: good.clone(),
            quantity,
            total_volume: volume,
        }),
    }
    let space_available = ship.space_available - volume;
    ship.update_cargo(cargo, space_available);
}

fn remove_cargo(ship: &mut Ship, good: &TradeGoodSymbol, quantity: u32) {
    let mut freed = 0;
    let cargo = ship
        .cargo
        .iter()
        .cloned()
        .filter_map(|item| {
            if &item.good != good {
                return Some(item);
            }
            let volume_per_unit = if item.quantity == 0 { 0 } else { item.total_volume / item.quantity };
            let remaining = item.quantity - quantity;
            freed = item.total_volume - remaining * volume_per_unit;
            (remaining > 0).then(|| CargoItem {
                quantity: remaining,
                total_volume: remaining * volume_per_unit,
                ..item
            })
        })
        .collect_vec();
    let space_available = ship.space_available + freed;
    ship.update_cargo(cargo, space_available);
}

#[derive(Debug, Clone)]
pub struct InMemoryUniverseClient {
    pub universe: Arc<RwLock<InMemoryUniverse>>,
}

impl InMemoryUniverseClient {
    pub fn new(universe: InMemoryUniverse) -> Self {
        InMemoryUniverseClient {
            universe: Arc::new(RwLock::new(universe)),
        }
    }

    pub fn clone_universe_handle(&self) -> Arc<RwLock<InMemoryUniverse>> {
        Arc::clone(&self.universe)
    }
}

#[async_trait]
impl StClientTrait for InMemoryUniverseClient {
    async fn get_status(&self) -> Result<StatusResponse, ApiError> {
        Ok(StatusResponse {
            status: "spacetraders is currently online and available to play".to_string(),
        })
    }

    async fn get_user(&self) -> Result<GetUserResponse, ApiError> {
        let guard = self.universe.read().await;
        Ok(GetUserResponse {
            user: User {
                username: guard.username.clone(),
                credits: guard.credits,
                ships: guard.ships.values().cloned().sorted_by_key(|ship| ship.id.clone()).collect_vec(),
                loans: guard.loans.clone(),
            },
        })
    }

    async fn get_ship(&self, ship_id: &ShipId) -> Result<GetShipResponse, ApiError> {
        let guard = self.universe.read().await;
        guard
            .ships
            .get(ship_id)
            .cloned()
            .map(|ship| GetShipResponse { ship })
            .ok_or_else(|| not_found(format!("Ship {ship_id} not found")))
    }

    async fn get_ships(&self) -> Result<ListShipsResponse, ApiError> {
        let guard = self.universe.read().await;
        Ok(ListShipsResponse {
            ships: guard.ships.values().cloned().sorted_by_key(|ship| ship.id.clone()).collect_vec(),
        })
    }

    async fn get_available_ships(&self, class: Option<ShipClass>) -> Result<AvailableShipsResponse, ApiError> {
        let guard = self.universe.read().await;
        Ok(AvailableShipsResponse {
            ships: guard
                .shipyard
                .iter()
                .filter(|listing| class.map_or(true, |class| listing.class == class))
                .cloned()
                .collect_vec(),
        })
    }

    async fn buy_ship(&self, location: &LocationSymbol, ship_type: &str) -> Result<BuyShipResponse, ApiError> {
        let mut guard = self.universe.write().await;
        guard.perform_ship_purchase(location, ship_type)
    }

    async fn scrap_ship(&self, ship_id: &ShipId) -> Result<ScrapShipResponse, ApiError> {
        let mut guard = self.universe.write().await;
        guard.perform_scrap(ship_id)
    }

    async fn request_loan(&self, loan_type: &str) -> Result<RequestLoanResponse, ApiError> {
        let mut guard = self.universe.write().await;
        guard.perform_loan_request(loan_type)
    }

    async fn get_market(&self, location: &LocationSymbol) -> Result<GetMarketResponse, ApiError> {
        let guard = self.universe.read().await;
        guard
            .marketplaces
            .get(location)
            .cloned()
            .map(|marketplace| GetMarketResponse {
                location: Marketplace {
                    symbol: location.clone(),
                    marketplace,
                },
            })
            .ok_or_else(|| not_found(format!("No marketplace at {location}")))
    }

    async fn get_system_locations(&self, system_symbol: &SystemSymbol) -> Result<ListLocationsResponse, ApiError> {
        let guard = self.universe.read().await;
        Ok(ListLocationsResponse {
            locations: guard.registry.locations_in_system(system_symbol).into_iter().cloned().collect_vec(),
        })
    }

    async fn place_buy_order(&self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError> {
        let mut guard = self.universe.write().await;
        guard.perform_purchase(ship_id, good, quantity)
    }

    async fn place_sell_order(&self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError> {
        let mut guard = self.universe.write().await;
        guard.perform_sale(ship_id, good, quantity)
    }

    async fn submit_flight_plan(&self, ship_id: &ShipId, destination: &LocationSymbol) -> Result<FlightPlanResponse, ApiError> {
        let mut guard = self.universe.write().await;
        guard.perform_flight(ship_id, destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_objects::{jackshaw_listing, trading_client, STARTING_CREDITS};
    use st_domain::test_objects::TestObjects;

    fn universe() -> InMemoryUniverse {
        let registry = TestObjects::registry();
        let ship = TestObjects::with_cargo(TestObjects::ship_at(&registry, "OE-PM", 100), &[("FUEL", 20, 20)]);
        InMemoryUniverse::new("JimHawkins", 1_000, registry)
            .with_ship(ship)
            .with_market(TestObjects::market("OE-PM", &[("FUEL", 2, 1, 1), ("ORE", 5, 3, 2)]))
            .with_market(TestObjects::market("OE-CR", &[("ORE", 12, 9, 2)]))
    }

    #[test]
    fn test_purchase_updates_cargo_and_credits() {
        let mut universe = universe();
        let ship_id = ShipId("ship-1".to_string());

        let response = universe.perform_purchase(&ship_id, &TradeGoodSymbol("ORE".to_string()), 10).unwrap();

        assert_eq!(response.credits, 950);
        assert_eq!(response.order.total, 50);
        assert_eq!(response.ship.space_available, 60);
        assert_eq!(response.ship.quantity_of(&TradeGoodSymbol("ORE".to_string())), 10);
    }

    #[test]
    fn test_purchase_beyond_hold_is_rejected() {
        let mut universe = universe();
        let ship_id = ShipId("ship-1".to_string());

        let result = universe.perform_purchase(&ship_id, &TradeGoodSymbol("ORE".to_string()), 41);

        assert!(matches!(result, Err(ApiError::RemoteOperation { code: 400, .. })));
        assert_eq!(universe.credits, 1_000);
    }

    #[test]
    fn test_flight_burns_fuel_and_moves_ship() {
        let mut universe = universe();
        let ship_id = ShipId("ship-1".to_string());

        let response = universe.perform_flight(&ship_id, &LocationSymbol("OE-CR".to_string())).unwrap();

        let ship = &universe.ships[&ship_id];
        assert_eq!(response.flight_plan.fuel_consumed, Some(10));
        assert_eq!(response.flight_plan.time_remaining_in_seconds, 50);
        assert_eq!(ship.fuel_level(), 10);
        assert_eq!(ship.space_available, 90);
        assert!(ship.is_at(&LocationSymbol("OE-CR".to_string())));
    }

    #[tokio::test]
    async fn test_loan_pays_for_a_new_ship() {
        let client = trading_client(20);
        let ship_type = jackshaw_listing().ship_type;
        let shipyard = LocationSymbol("OE-PM-TR".to_string());

        let too_poor = client.buy_ship(&shipyard, &ship_type).await;
        assert!(matches!(too_poor, Err(ApiError::RemoteOperation { code: 400, .. })));

        let loan = client.request_loan(STARTUP_LOAN).await.unwrap();
        assert_eq!(loan.credits, STARTING_CREDITS + 200_000);
        assert_eq!(loan.loan.repayment_amount, 280_000);
        assert!(client.request_loan(STARTUP_LOAN).await.is_err());

        let bought = client.buy_ship(&shipyard, &ship_type).await.unwrap();
        assert_eq!(bought.credits, STARTING_CREDITS + 200_000 - 21_125);
        assert_eq!(bought.ship.id, ShipId("ship-2".to_string()));
        assert!(bought.ship.is_at(&shipyard));
        assert_eq!(bought.ship.space_available, 50);

        let user = client.get_user().await.unwrap().user;
        assert_eq!(user.loans.len(), 1);
        assert_eq!(client.get_ships().await.unwrap().ships.len(), 2);
    }

    #[tokio::test]
    async fn test_ship_can_only_be_scrapped_at_a_shipyard() {
        let client = trading_client(20);
        let ship_id = ShipId("ship-1".to_string());

        let at_prime = client.scrap_ship(&ship_id).await;
        assert!(matches!(at_prime, Err(ApiError::RemoteOperation { code: 400, .. })));

        client.submit_flight_plan(&ship_id, &LocationSymbol("OE-PM-TR".to_string())).await.unwrap();
        let scrapped = client.scrap_ship(&ship_id).await.unwrap();

        assert!(scrapped.success.contains("scrapped"));
        assert!(matches!(client.get_ship(&ship_id).await, Err(ApiError::RemoteOperation { code: 404, .. })));
    }

    #[tokio::test]
    async fn test_available_ships_filter_by_class() {
        let client = trading_client(20);

        assert_eq!(client.get_available_ships(None).await.unwrap().ships, vec![jackshaw_listing()]);
        assert!(client.get_available_ships(Some(ShipClass::MkIII)).await.unwrap().ships.is_empty());
    }

    #[test]
    fn test_sale_frees_space() {
        let mut universe = universe();
        let ship_id = ShipId("ship-1".to_string());
        let ore = TradeGoodSymbol("ORE".to_string());

        universe.perform_purchase(&ship_id, &ore, 10).unwrap();
        universe.perform_flight(&ship_id, &LocationSymbol("OE-CR".to_string())).unwrap();
        let response = universe.perform_sale(&ship_id, &ore, 10).unwrap();

        assert_eq!(response.order.total, 90);
        assert_eq!(response.credits, 1_040);
        assert_eq!(response.ship.quantity_of(&ore), 0);
        assert_eq!(response.ship.space_available, 90);
    }
}
