use crate::st_client::{ApiError, StClientTrait};
use st_domain::{FlightPlan, Location, OrderResponse, Ship, TradeGoodSymbol};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A ship together with the client that commands it. Every successful command updates `ship` in place.
#[derive(Clone, Debug)]
pub struct ShipOperations {
    pub ship: Ship,
    client: Arc<dyn StClientTrait>,
}

impl PartialEq for ShipOperations {
    fn eq(&self, other: &Self) -> bool {
        self.ship.eq(&other.ship)
    }
}

impl ShipOperations {
    pub fn new(ship: Ship, client: Arc<dyn StClientTrait>) -> Self {
        ShipOperations { ship, client }
    }

    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let response = self.client.get_ship(&self.ship.id).await?;
        self.ship = response.ship;
        Ok(())
    }

    pub async fn purchase_trade_good(&mut self, quantity: u32, trade_good: &TradeGoodSymbol) -> Result<OrderResponse, ApiError> {
        let response = self.client.place_buy_order(&self.ship.id, trade_good, quantity).await?;
        self.apply_order(&response);
        Ok(response)
    }

    pub async fn sell_trade_good(&mut self, quantity: u32, trade_good: &TradeGoodSymbol) -> Result<OrderResponse, ApiError> {
        let response = self.client.place_sell_order(&self.ship.id, trade_good, quantity).await?;
        self.apply_order(&response);
        Ok(response)
    }

    pub async fn fly_to(&mut self, destination: &Location) -> Result<FlightPlan, ApiError> {
        let response = self.client.submit_flight_plan(&self.ship.id, &destination.symbol).await?;
        self.ship.mark_in_transit();
        Ok(response.flight_plan)
    }

    fn apply_order(&mut self, response: &OrderResponse) {
        self.ship.update_cargo(response.ship.cargo.clone(), response.ship.space_available);
    }
}

impl Deref for ShipOperations {
    type Target = Ship;

    fn deref(&self) -> &Self::Target {
        &self.ship
    }
}

impl DerefMut for ShipOperations {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ship
    }
}
