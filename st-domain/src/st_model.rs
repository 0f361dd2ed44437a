use crate::errors::TradeError;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use strum_macros::Display;

pub const FUEL: &str = "FUEL";

/// Location value the game reports for a ship that is between two locations.
pub const IN_TRANSIT: &str = "IN-TRANSIT";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct SystemSymbol(pub String);

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct LocationSymbol(pub String);

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ShipId(pub String);

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct TradeGoodSymbol(pub String);

impl LocationSymbol {
    /// `OE-PM-TR` belongs to system `OE`.
    pub fn system_symbol(&self) -> SystemSymbol {
        let system = self.0.split('-').next().unwrap_or_default();
        SystemSymbol(system.to_string())
    }
}

impl TradeGoodSymbol {
    pub fn fuel() -> Self {
        TradeGoodSymbol(FUEL.to_string())
    }

    pub fn is_fuel(&self) -> bool {
        self.0 == FUEL
    }
}

impl Display for SystemSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for LocationSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for ShipId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for TradeGoodSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub symbol: LocationSymbol,
    #[serde(default)]
    pub name: String,
    pub x: i64,
    pub y: i64,
    #[serde(rename = "type", default)]
    pub location_type: Option<String>,
}

impl Location {
    pub fn system_symbol(&self) -> SystemSymbol {
        self.symbol.system_symbol()
    }

    pub fn distance_to(&self, other: &Location) -> u32 {
        distance_to(self.x, self.y, other.x, other.y)
    }
}

pub fn distance_to(from_x: i64, from_y: i64, to_x: i64, to_y: i64) -> u32 {
    let dx = (to_x - from_x) as f64;
    let dy = (to_y - from_y) as f64;
    (dx * dx + dy * dy).sqrt().round() as u32
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash, Display)]
pub enum ShipClass {
    #[serde(rename = "MK-I")]
    #[strum(serialize = "MK-I")]
    MkI,
    #[serde(rename = "MK-II")]
    #[strum(serialize = "MK-II")]
    MkII,
    #[serde(rename = "MK-III")]
    #[strum(serialize = "MK-III")]
    MkIII,
    #[serde(other)]
    Unknown,
}

impl ShipClass {
    /// Extra fuel a hull of this tier burns on every leg.
    pub fn fuel_surcharge(&self) -> u32 {
        match self {
            ShipClass::MkII => 2,
            ShipClass::MkIII => 4,
            ShipClass::MkI | ShipClass::Unknown => 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CargoItem {
    pub good: TradeGoodSymbol,
    pub quantity: u32,
    pub total_volume: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShipPosition {
    Docked { location: LocationSymbol, x: i64, y: i64 },
    InTransit,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(try_from = "ShipPayload", into = "ShipPayload")]
pub struct Ship {
    pub id: ShipId,
    pub manufacturer: String,
    pub class: ShipClass,
    pub ship_type: String,
    pub position: ShipPosition,
    pub speed: u32,
    pub plating: u32,
    pub weapons: u32,
    pub max_cargo: u32,
    pub space_available: u32,
    pub cargo: Vec<CargoItem>,
}

/// Wire shape of a ship. Only used at the (de)serialization boundary.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
struct ShipPayload {
    id: ShipId,
    #[serde(default)]
    manufacturer: String,
    class: ShipClass,
    #[serde(rename = "type")]
    ship_type: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    x: Option<i64>,
    #[serde(default)]
    y: Option<i64>,
    #[serde(default)]
    speed: u32,
    #[serde(default)]
    plating: u32,
    #[serde(default)]
    weapons: u32,
    max_cargo: u32,
    space_available: u32,
    #[serde(default)]
    cargo: Vec<CargoItem>,
}

impl TryFrom<ShipPayload> for Ship {
    type Error = TradeError;

    fn try_from(payload: ShipPayload) -> Result<Self, Self::Error> {
        let position = match payload.location {
            None => ShipPosition::InTransit,
            Some(location) if location == IN_TRANSIT => ShipPosition::InTransit,
            Some(location) => match (payload.x, payload.y) {
                (Some(x), Some(y)) => ShipPosition::Docked {
                    location: LocationSymbol(location),
                    x,
                    y,
                },
                _ => {
                    return Err(TradeError::Data(format!(
                        "ship {} is at {} but reports no coordinates",
                        payload.id, location
                    )))
                }
            },
        };

        let ship = Ship {
            id: payload.id,
            manufacturer: payload.manufacturer,
            class: payload.class,
            ship_type: payload.ship_type,
            position,
            speed: payload.speed,
            plating: payload.plating,
            weapons: payload.weapons,
            max_cargo: payload.max_cargo,
            space_available: payload.space_available,
            cargo: payload.cargo,
        };

        if ship.used_volume() > ship.max_cargo {
            return Err(TradeError::Data(format!(
                "ship {} carries {} volume but holds at most {}",
                ship.id,
                ship.used_volume(),
                ship.max_cargo
            )));
        }
        if ship.space_available != ship.expected_space_available() {
            return Err(TradeError::Data(format!(
                "ship {} reports {} space available, its cargo leaves {}",
                ship.id,
                ship.space_available,
                ship.expected_space_available()
            )));
        }

        Ok(ship)
    }
}

impl From<Ship> for ShipPayload {
    fn from(ship: Ship) -> Self {
        let (location, x, y) = match ship.position {
            ShipPosition::Docked { location, x, y } => (Some(location.0), Some(x), Some(y)),
            ShipPosition::InTransit => (None, None, None),
        };
        ShipPayload {
            id: ship.id,
            manufacturer: ship.manufacturer,
            class: ship.class,
            ship_type: ship.ship_type,
            location,
            x,
            y,
            speed: ship.speed,
            plating: ship.plating,
            weapons: ship.weapons,
            max_cargo: ship.max_cargo,
            space_available: ship.space_available,
            cargo: ship.cargo,
        }
    }
}

impl Ship {
    pub fn current_location(&self) -> Option<&LocationSymbol> {
        match &self.position {
            ShipPosition::Docked { location, .. } => Some(location),
            ShipPosition::InTransit => None,
        }
    }

    pub fn coordinates(&self) -> Option<(i64, i64)> {
        match &self.position {
            ShipPosition::Docked { x, y, .. } => Some((*x, *y)),
            ShipPosition::InTransit => None,
        }
    }

    pub fn is_in_transit(&self) -> bool {
        self.position == ShipPosition::InTransit
    }

    pub fn is_at(&self, location: &LocationSymbol) -> bool {
        self.current_location() == Some(location)
    }

    pub fn fuel_level(&self) -> u32 {
        self.quantity_of(&TradeGoodSymbol::fuel())
    }

    pub fn quantity_of(&self, good: &TradeGoodSymbol) -> u32 {
        self.cargo.iter().filter(|item| &item.good == good).map(|item| item.quantity).sum()
    }

    /// Everything in the hold except fuel.
    pub fn cargo_to_sell(&self) -> Vec<&CargoItem> {
        self.cargo.iter().filter(|item| !item.good.is_fuel()).collect_vec()
    }

    pub fn used_volume(&self) -> u32 {
        self.cargo.iter().map(|item| item.total_volume).sum()
    }

    pub fn expected_space_available(&self) -> u32 {
        self.max_cargo.saturating_sub(self.used_volume())
    }

    pub fn update_cargo(&mut self, cargo: Vec<CargoItem>, space_available: u32) {
        self.cargo = cargo;
        self.space_available = space_available;
    }

    pub fn update_location(&mut self, location: &Location) {
        self.position = ShipPosition::Docked {
            location: location.symbol.clone(),
            x: location.x,
            y: location.y,
        };
    }

    pub fn mark_in_transit(&mut self) {
        self.position = ShipPosition::InTransit;
    }

    pub fn distance_to(&self, location: &Location) -> Option<u32> {
        self.coordinates().map(|(x, y)| distance_to(x, y, location.x, location.y))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuote {
    pub symbol: TradeGoodSymbol,
    #[serde(default)]
    pub volume_per_unit: Option<u32>,
    #[serde(default)]
    pub price_per_unit: Option<i64>,
    #[serde(default)]
    pub spread: Option<i64>,
    pub purchase_price_per_unit: i64,
    pub sell_price_per_unit: i64,
    #[serde(default)]
    pub quantity_available: u32,
}

/// All quotes observable at one location at one instant. Holds at most one quote per good.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(try_from = "MarketSnapshotPayload", into = "MarketSnapshotPayload")]
pub struct MarketSnapshot {
    pub location: LocationSymbol,
    pub observed_at: DateTime<Utc>,
    quotes: Vec<MarketQuote>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
struct MarketSnapshotPayload {
    location: LocationSymbol,
    observed_at: DateTime<Utc>,
    quotes: Vec<MarketQuote>,
}

impl TryFrom<MarketSnapshotPayload> for MarketSnapshot {
    type Error = TradeError;

    fn try_from(payload: MarketSnapshotPayload) -> Result<Self, Self::Error> {
        MarketSnapshot::new(payload.location, payload.observed_at, payload.quotes)
    }
}

impl From<MarketSnapshot> for MarketSnapshotPayload {
    fn from(snapshot: MarketSnapshot) -> Self {
        MarketSnapshotPayload {
            location: snapshot.location,
            observed_at: snapshot.observed_at,
            quotes: snapshot.quotes,
        }
    }
}

impl MarketSnapshot {
    pub fn new(location: LocationSymbol, observed_at: DateTime<Utc>, quotes: Vec<MarketQuote>) -> Result<Self, TradeError> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = quotes.iter().find(|quote| !seen.insert(&quote.symbol)) {
            return Err(TradeError::Data(format!("market at {} lists {} more than once", location, duplicate.symbol)));
        }

        Ok(MarketSnapshot {
            location,
            observed_at,
            quotes,
        })
    }

    pub fn quotes(&self) -> &[MarketQuote] {
        &self.quotes
    }

    pub fn quote(&self, good: &TradeGoodSymbol) -> Option<&MarketQuote> {
        self.quotes.iter().find(|quote| &quote.symbol == good)
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn to_observations(&self) -> Vec<MarketObservation> {
        self.quotes
            .iter()
            .map(|quote| MarketObservation {
                observed_at: self.observed_at,
                location: self.location.clone(),
                symbol: quote.symbol.clone(),
                volume_per_unit: quote.volume_per_unit,
                price_per_unit: quote.price_per_unit,
                purchase_price_per_unit: quote.purchase_price_per_unit,
                sell_price_per_unit: quote.sell_price_per_unit,
                quantity_available: quote.quantity_available,
            })
            .collect_vec()
    }
}

/// One (location, good) row of a snapshot as it is handed to a sink. The spread is not kept.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct MarketObservation {
    pub observed_at: DateTime<Utc>,
    pub location: LocationSymbol,
    pub symbol: TradeGoodSymbol,
    pub volume_per_unit: Option<u32>,
    pub price_per_unit: Option<i64>,
    pub purchase_price_per_unit: i64,
    pub sell_price_per_unit: i64,
    pub quantity_available: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TradeProposal {
    pub good: TradeGoodSymbol,
    pub unit_cost: i64,
    pub units_to_buy: u32,
    pub total_cost: i64,
    pub expected_profit: i64,
    pub profit_per_volume: OrderedFloat<f64>,
    pub fuel_required: u32,
    pub origin: LocationSymbol,
    pub destination: LocationSymbol,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: String,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    pub repayment_amount: i64,
    pub status: String,
    #[serde(rename = "type")]
    pub loan_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub credits: i64,
    #[serde(default)]
    pub ships: Vec<Ship>,
    #[serde(default)]
    pub loans: Vec<Loan>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetUserResponse {
    pub user: User,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetShipResponse {
    pub ship: Ship,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Marketplace {
    pub symbol: LocationSymbol,
    pub marketplace: Vec<MarketQuote>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetMarketResponse {
    pub location: Marketplace,
}

impl GetMarketResponse {
    pub fn into_snapshot(self, observed_at: DateTime<Utc>) -> Result<MarketSnapshot, TradeError> {
        MarketSnapshot::new(self.location.symbol, observed_at, self.location.marketplace)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestLoanResponse {
    pub credits: i64,
    pub loan: Loan,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListShipsResponse {
    pub ships: Vec<Ship>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuyShipResponse {
    pub credits: i64,
    pub ship: Ship,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapShipResponse {
    pub success: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLocation {
    pub location: LocationSymbol,
    pub price: i64,
}

/// A ship type on offer at the shipyards of the game.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShipListing {
    #[serde(rename = "type")]
    pub ship_type: String,
    pub class: ShipClass,
    #[serde(default)]
    pub manufacturer: String,
    pub max_cargo: u32,
    #[serde(default)]
    pub speed: u32,
    #[serde(default)]
    pub plating: u32,
    #[serde(default)]
    pub weapons: u32,
    #[serde(default)]
    pub purchase_locations: Vec<PurchaseLocation>,
}

impl ShipListing {
    pub fn price_at(&self, location: &LocationSymbol) -> Option<i64> {
        self.purchase_locations
            .iter()
            .find(|purchase_location| &purchase_location.location == location)
            .map(|purchase_location| purchase_location.price)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableShipsResponse {
    pub ships: Vec<ShipListing>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListLocationsResponse {
    pub locations: Vec<Location>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub good: TradeGoodSymbol,
    pub quantity: u32,
    pub price_per_unit: i64,
    pub total: i64,
}

/// Response of a purchase or sell order. The embedded ship is the state right after the order.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub credits: i64,
    pub order: Order,
    pub ship: Ship,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightPlan {
    pub id: String,
    pub ship_id: ShipId,
    pub departure: LocationSymbol,
    pub destination: LocationSymbol,
    #[serde(default)]
    pub distance: Option<u32>,
    #[serde(default)]
    pub fuel_consumed: Option<u32>,
    #[serde(default)]
    pub fuel_remaining: Option<u32>,
    pub time_remaining_in_seconds: u64,
    #[serde(default)]
    pub arrives_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightPlanResponse {
    pub flight_plan: FlightPlan,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteErrorBody {
    pub code: u32,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteErrorResponse {
    pub error: RemoteErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCKED_SHIP: &str = r#"{"id":"cknoj34cd6480541ds6mlnvsxh2","manufacturer":"Gravager","class":"MK-I","type":"GR-MK-I","location":"OE-PM","x":20,"y":-25,"speed":1,"plating":10,"weapons":5,"maxCargo":100,"spaceAvailable":5,"cargo":[{"good":"SHIP_PLATING","quantity":47,"totalVolume":94},{"good":"FUEL","quantity":1,"totalVolume":1}]}"#;

    const TRANSIT_SHIP: &str = r#"{"id":"cknoj34cd6480541ds6mlnvsxh2","manufacturer":"Gravager","class":"MK-I","type":"GR-MK-I","location":"IN-TRANSIT","x":null,"y":null,"speed":1,"plating":10,"weapons":5,"maxCargo":100,"spaceAvailable":5,"cargo":[{"good":"SHIP_PLATING","quantity":47,"totalVolume":94},{"good":"FUEL","quantity":1,"totalVolume":1}]}"#;

    #[test]
    fn test_decode_docked_ship() {
        let ship: Ship = serde_json::from_str(DOCKED_SHIP).unwrap();

        assert_eq!(ship.current_location(), Some(&LocationSymbol("OE-PM".to_string())));
        assert_eq!(ship.coordinates(), Some((20, -25)));
        assert_eq!(ship.class, ShipClass::MkI);
        assert_eq!(ship.fuel_level(), 1);
        assert_eq!(ship.used_volume(), 95);
        assert_eq!(ship.expected_space_available(), ship.space_available);
    }

    #[test]
    fn test_decode_ship_in_transit() {
        let ship: Ship = serde_json::from_str(TRANSIT_SHIP).unwrap();

        assert!(ship.is_in_transit());
        assert_eq!(ship.coordinates(), None);
    }

    #[test]
    fn test_ship_without_location_is_in_transit() {
        let json = r#"{"id":"s1","class":"MK-II","type":"GR-MK-II","maxCargo":100,"spaceAvailable":100,"cargo":[],"unknownField":true}"#;
        let ship: Ship = serde_json::from_str(json).unwrap();

        assert!(ship.is_in_transit());
        assert_eq!(ship.class, ShipClass::MkII);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let json = r#"{"id":"s1","class":"MK-I","type":"GR-MK-I","location":"OE-PM","x":1,"y":2,"spaceAvailable":5}"#;
        let result: Result<Ship, _> = serde_json::from_str(json);

        assert!(result.unwrap_err().to_string().contains("maxCargo"));
    }

    #[test]
    fn test_docked_ship_without_coordinates_fails() {
        let json = r#"{"id":"s1","class":"MK-I","type":"GR-MK-I","location":"OE-PM","maxCargo":100,"spaceAvailable":100}"#;
        let result: Result<Ship, _> = serde_json::from_str(json);

        assert!(result.unwrap_err().to_string().contains("reports no coordinates"));
    }

    #[test]
    fn test_overloaded_ship_is_rejected() {
        let json = r#"{"id":"s1","class":"MK-I","type":"GR-MK-I","location":"OE-PM","x":0,"y":0,"maxCargo":10,"spaceAvailable":0,"cargo":[{"good":"ORE","quantity":6,"totalVolume":12}]}"#;
        let result: Result<Ship, _> = serde_json::from_str(json);

        assert!(result.is_err());
    }

    #[test]
    fn test_space_available_must_match_cargo() {
        let json = r#"{"id":"s1","class":"MK-I","type":"GR-MK-I","location":"OE-PM","x":0,"y":0,"maxCargo":100,"spaceAvailable":100,"cargo":[{"good":"ORE","quantity":6,"totalVolume":12}]}"#;
        let result: Result<Ship, _> = serde_json::from_str(json);

        assert!(result.unwrap_err().to_string().contains("reports 100 space available, its cargo leaves 88"));
    }

    #[test]
    fn test_cargo_to_sell_excludes_fuel() {
        let ship: Ship = serde_json::from_str(DOCKED_SHIP).unwrap();

        let goods = ship.cargo_to_sell().iter().map(|item| item.good.0.clone()).collect_vec();

        assert_eq!(goods, vec!["SHIP_PLATING".to_string()]);
    }

    #[test]
    fn test_update_cargo_and_location() {
        let mut ship: Ship = serde_json::from_str(DOCKED_SHIP).unwrap();
        let new_cargo = vec![
            CargoItem {
                good: TradeGoodSymbol("SHIP_PLATING".to_string()),
                quantity: 47,
                total_volume: 94,
            },
            CargoItem {
                good: TradeGoodSymbol("RESEARCH".to_string()),
                quantity: 1,
                total_volume: 2,
            },
            CargoItem {
                good: TradeGoodSymbol::fuel(),
                quantity: 1,
                total_volume: 1,
            },
        ];

        ship.update_cargo(new_cargo, 97);
        assert_eq!(ship.space_available, 97);
        assert_eq!(ship.cargo.len(), 3);

        let tritus = Location {
            symbol: LocationSymbol("OE-PM-TR".to_string()),
            name: "Tritus".to_string(),
            x: 23,
            y: -28,
            location_type: Some("MOON".to_string()),
        };
        ship.update_location(&tritus);
        assert_eq!(ship.coordinates(), Some((23, -28)));
        assert!(ship.is_at(&tritus.symbol));
        assert_eq!(ship.distance_to(&tritus), Some(0));
    }

    #[test]
    fn test_ship_round_trips_through_wire_shape() {
        let ship: Ship = serde_json::from_str(DOCKED_SHIP).unwrap();
        let json = serde_json::to_string(&ship).unwrap();

        assert!(json.contains(r#""location":"OE-PM""#));
        assert_eq!(serde_json::from_str::<Ship>(&json).unwrap(), ship);
    }

    #[test]
    fn test_system_symbol_is_symbol_prefix() {
        assert_eq!(LocationSymbol("OE-PM-TR".to_string()).system_symbol(), SystemSymbol("OE".to_string()));
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance_to(20, -25, 23, -28), 4);
        assert_eq!(distance_to(0, 0, 0, 0), 0);
    }

    #[test]
    fn test_snapshot_rejects_duplicate_goods() {
        let quote = MarketQuote {
            symbol: TradeGoodSymbol("ORE".to_string()),
            volume_per_unit: Some(1),
            price_per_unit: None,
            spread: None,
            purchase_price_per_unit: 1,
            sell_price_per_unit: 1,
            quantity_available: 1,
        };

        let result = MarketSnapshot::new(LocationSymbol("OE-PM".to_string()), Utc::now(), vec![quote.clone(), quote]);

        assert!(matches!(result, Err(TradeError::Data(_))));
    }

    #[test]
    fn test_decoded_snapshot_rejects_duplicate_goods() {
        let quote = r#"{"symbol":"ORE","volumePerUnit":2,"purchasePricePerUnit":5,"sellPricePerUnit":3,"quantityAvailable":10}"#;
        let json = format!(r#"{{"location":"OE-PM","observedAt":"2021-05-01T12:00:00Z","quotes":[{quote},{quote}]}}"#);

        let result: Result<MarketSnapshot, _> = serde_json::from_str(&json);
        assert!(result.unwrap_err().to_string().contains("lists ORE more than once"));

        let single = format!(r#"{{"location":"OE-PM","observedAt":"2021-05-01T12:00:00Z","quotes":[{quote}]}}"#);
        let snapshot: MarketSnapshot = serde_json::from_str(&single).unwrap();
        assert_eq!(snapshot.quotes().len(), 1);
        assert_eq!(serde_json::from_str::<MarketSnapshot>(&serde_json::to_string(&snapshot).unwrap()).unwrap(), snapshot);
    }

    #[test]
    fn test_decode_available_ships() {
        let json = r#"{"ships":[{"class":"MK-I","manufacturer":"Jackshaw","maxCargo":50,"plating":5,"purchaseLocations":[{"location":"OE-PM-TR","price":21125}],"speed":3,"type":"JW-MK-I","weapons":5}]}"#;

        let response: AvailableShipsResponse = serde_json::from_str(json).unwrap();

        let listing = &response.ships[0];
        assert_eq!(listing.ship_type, "JW-MK-I");
        assert_eq!(listing.class, ShipClass::MkI);
        assert_eq!(listing.price_at(&LocationSymbol("OE-PM-TR".to_string())), Some(21125));
        assert_eq!(listing.price_at(&LocationSymbol("OE-PM".to_string())), None);
    }

    #[test]
    fn test_decode_get_market_response() {
        let json = r#"{"location":{"symbol":"OE-PM","type":"PLANET","name":"Prime","x":20,"y":-25,"marketplace":[{"symbol":"METALS","volumePerUnit":1,"pricePerUnit":4,"spread":1,"purchasePricePerUnit":5,"sellPricePerUnit":3,"quantityAvailable":14022}]}}"#;

        let response: GetMarketResponse = serde_json::from_str(json).unwrap();
        let snapshot = response.into_snapshot(Utc::now()).unwrap();
        let observations = snapshot.to_observations();

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].location, LocationSymbol("OE-PM".to_string()));
        assert_eq!(observations[0].purchase_price_per_unit, 5);
    }
}
