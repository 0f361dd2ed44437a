use crate::{
    CargoItem, GetMarketResponse, Location, LocationRegistry, LocationSymbol, MarketQuote, MarketSnapshot, Marketplace, Ship, ShipClass, ShipId, ShipPosition,
    TradeGoodSymbol,
};
use chrono::{DateTime, TimeZone, Utc};
use itertools::Itertools;

pub struct TestObjects;

impl TestObjects {
    pub fn observed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 5, 1, 12, 0, 0).unwrap()
    }

    pub fn location(symbol: &str, x: i64, y: i64) -> Location {
        Location {
            symbol: LocationSymbol(symbol.to_string()),
            name: symbol.to_string(),
            x,
            y,
            location_type: Some("PLANET".to_string()),
        }
    }

    /// `OE-PM` to `OE-PM-TR` is 4 units, `OE-PM` to `OE-CR` is 25 units.
    pub fn registry() -> LocationRegistry {
        LocationRegistry::new(vec![
            Self::location("OE-PM", 20, -25),
            Self::location("OE-PM-TR", 23, -28),
            Self::location("OE-CR", 20, 0),
            Self::location("OE-KO", -48, 12),
            Self::location("XV-BN", 100, 100),
        ])
    }

    /// One quote per `(symbol, purchase price, sell price, volume per unit)`.
    pub fn market(location: &str, goods: &[(&str, i64, i64, u32)]) -> MarketSnapshot {
        let quotes = goods
            .iter()
            .map(|(symbol, purchase, sell, volume)| MarketQuote {
                symbol: TradeGoodSymbol(symbol.to_string()),
                volume_per_unit: Some(*volume),
                price_per_unit: Some((purchase + sell) / 2),
                spread: Some((purchase - sell).abs() / 2),
                purchase_price_per_unit: *purchase,
                sell_price_per_unit: *sell,
                quantity_available: 10_000,
            })
            .collect_vec();

        MarketSnapshot::new(LocationSymbol(location.to_string()), Self::observed_at(), quotes).expect("test markets list every good once")
    }

    pub fn market_response(location: &str, goods: &[(&str, i64, i64, u32)]) -> GetMarketResponse {
        let snapshot = Self::market(location, goods);
        GetMarketResponse {
            location: Marketplace {
                symbol: snapshot.location.clone(),
                marketplace: snapshot.quotes().to_vec(),
            },
        }
    }

    pub fn without_volume(snapshot: MarketSnapshot, good: &str) -> MarketSnapshot {
        let quotes = snapshot
            .quotes()
            .iter()
            .cloned()
            .map(|quote| {
                if quote.symbol.0 == good {
                    MarketQuote {
                        volume_per_unit: None,
                        ..quote
                    }
                } else {
                    quote
                }
            })
            .collect_vec();

        MarketSnapshot::new(snapshot.location, snapshot.observed_at, quotes).expect("test markets list every good once")
    }

    pub fn ship_at(registry: &LocationRegistry, location: &str, max_cargo: u32) -> Ship {
        let location = registry.resolve(&LocationSymbol(location.to_string())).expect("test location is registered");

        Ship {
            id: ShipId("ship-1".to_string()),
            manufacturer: "Gravager".to_string(),
            class: ShipClass::MkI,
            ship_type: "GR-MK-I".to_string(),
            position: ShipPosition::Docked {
                location: location.symbol.clone(),
                x: location.x,
                y: location.y,
            },
            speed: 1,
            plating: 10,
            weapons: 5,
            max_cargo,
            space_available: max_cargo,
            cargo: vec![],
        }
    }

    pub fn with_cargo(ship: Ship, cargo: &[(&str, u32, u32)]) -> Ship {
        let cargo = cargo
            .iter()
            .map(|(good, quantity, total_volume)| CargoItem {
                good: TradeGoodSymbol(good.to_string()),
                quantity: *quantity,
                total_volume: *total_volume,
            })
            .collect_vec();
        let used: u32 = cargo.iter().map(|item| item.total_volume).sum();

        Ship {
            space_available: ship.max_cargo.saturating_sub(used),
            cargo,
            ..ship
        }
    }

    pub fn ship_in_transit(max_cargo: u32) -> Ship {
        let mut ship = Self::ship_at(&Self::registry(), "OE-PM", max_cargo);
        ship.mark_in_transit();
        ship
    }
}
