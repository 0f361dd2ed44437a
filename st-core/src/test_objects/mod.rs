use crate::in_memory_universe::{InMemoryUniverse, InMemoryUniverseClient};
use crate::st_client::{ApiError, StClientTrait};
use async_trait::async_trait;
use mockall::mock;
use st_domain::test_objects::TestObjects;
use st_domain::{
    AvailableShipsResponse, BuyShipResponse, FlightPlanResponse, GetMarketResponse, GetShipResponse, GetUserResponse, ListLocationsResponse,
    ListShipsResponse, LocationSymbol, OrderResponse, PurchaseLocation, RequestLoanResponse, ScrapShipResponse, ShipClass, ShipId, ShipListing,
    StatusResponse, SystemSymbol, TradeGoodSymbol,
};

mock! {
    #[derive(Debug)]
    pub StClient {}

    #[async_trait]
    impl StClientTrait for StClient {
        async fn get_status(&self) -> Result<StatusResponse, ApiError> {}

        async fn get_user(&self) -> Result<GetUserResponse, ApiError> {}

        async fn get_ship(&self, ship_id: &ShipId) -> Result<GetShipResponse, ApiError> {}

        async fn get_ships(&self) -> Result<ListShipsResponse, ApiError> {}

        async fn get_available_ships(&self, class: Option<ShipClass>) -> Result<AvailableShipsResponse, ApiError> {}

        async fn buy_ship(&self, location: &LocationSymbol, ship_type: &str) -> Result<BuyShipResponse, ApiError> {}

        async fn scrap_ship(&self, ship_id: &ShipId) -> Result<ScrapShipResponse, ApiError> {}

        async fn request_loan(&self, loan_type: &str) -> Result<RequestLoanResponse, ApiError> {}

        async fn get_market(&self, location: &LocationSymbol) -> Result<GetMarketResponse, ApiError> {}

        async fn get_system_locations(&self, system_symbol: &SystemSymbol) -> Result<ListLocationsResponse, ApiError> {}

        async fn place_buy_order(&self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError> {}

        async fn place_sell_order(&self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError> {}

        async fn submit_flight_plan(&self, ship_id: &ShipId, destination: &LocationSymbol) -> Result<FlightPlanResponse, ApiError> {}
    }
}

pub const STARTING_CREDITS: i64 = 10_000;

/// `ship-1` docked at `OE-PM` with a hold of 100 and the given fuel on board.
///
/// ORE is bought at `OE-PM` for 5 and sells for 9 at `OE-CR` and for 6 at `OE-PM-TR`. METALS go the other way.
pub fn trading_universe(fuel_on_board: u32) -> InMemoryUniverse {
    let registry = TestObjects::registry();
    let ship = TestObjects::ship_at(&registry, "OE-PM", 100);
    let ship = if fuel_on_board > 0 {
        TestObjects::with_cargo(ship, &[("FUEL", fuel_on_board, fuel_on_board)])
    } else {
        ship
    };

    InMemoryUniverse::new("JimHawkins", STARTING_CREDITS, registry)
        .with_ship(ship)
        .with_market(TestObjects::market("OE-PM", &[("FUEL", 2, 1, 1), ("ORE", 5, 3, 2), ("METALS", 9, 8, 1)]))
        .with_market(TestObjects::market("OE-PM-TR", &[("FUEL", 2, 1, 1), ("ORE", 7, 6, 2), ("METALS", 4, 3, 1)]))
        .with_market(TestObjects::market("OE-CR", &[("FUEL", 3, 2, 1), ("ORE", 12, 9, 2)]))
        .with_market(TestObjects::market("OE-KO", &[("SHIP_PARTS", 90, 80, 5)]))
        .with_shipyard(jackshaw_listing())
}

/// A small freighter, sold only at the `OE-PM-TR` shipyard.
pub fn jackshaw_listing() -> ShipListing {
    ShipListing {
        ship_type: "JW-MK-I".to_string(),
        class: ShipClass::MkI,
        manufacturer: "Jackshaw".to_string(),
        max_cargo: 50,
        speed: 3,
        plating: 5,
        weapons: 5,
        purchase_locations: vec![PurchaseLocation {
            location: LocationSymbol("OE-PM-TR".to_string()),
            price: 21_125,
        }],
    }
}

pub fn trading_client(fuel_on_board: u32) -> InMemoryUniverseClient {
    InMemoryUniverseClient::new(trading_universe(fuel_on_board))
}
