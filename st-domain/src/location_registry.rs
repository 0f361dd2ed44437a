use crate::{Location, LocationSymbol, Ship, SystemSymbol, TradeError};
use itertools::Itertools;
use std::collections::HashMap;

/// Static locations of the game, loaded once at startup and shared read-only between ship runs.
#[derive(Debug, Clone, Default)]
pub struct LocationRegistry {
    locations: HashMap<LocationSymbol, Location>,
}

impl LocationRegistry {
    pub fn new(locations: impl IntoIterator<Item = Location>) -> Self {
        let locations = locations.into_iter().map(|location| (location.symbol.clone(), location)).collect();
        LocationRegistry { locations }
    }

    /// Expects a json array of locations.
    pub fn from_json(json: &str) -> Result<Self, TradeError> {
        let locations: Vec<Location> = serde_json::from_str(json).map_err(|e| TradeError::Data(format!("invalid location data: {e}")))?;
        Ok(Self::new(locations))
    }

    pub fn get(&self, symbol: &LocationSymbol) -> Option<&Location> {
        self.locations.get(symbol)
    }

    pub fn resolve(&self, symbol: &LocationSymbol) -> Result<&Location, TradeError> {
        self.get(symbol).ok_or_else(|| TradeError::Data(format!("unknown location {symbol}")))
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn locations(&self) -> Vec<&Location> {
        self.locations.values().sorted_by_key(|location| &location.symbol).collect_vec()
    }

    pub fn locations_in_system(&self, system_symbol: &SystemSymbol) -> Vec<&Location> {
        self.locations()
            .into_iter()
            .filter(|location| &location.system_symbol() == system_symbol)
            .collect_vec()
    }

    /// Nearest location other than the one the ship is docked at. `None` while the ship is in transit.
    pub fn closest_to(&self, ship: &Ship) -> Option<(&Location, u32)> {
        let current_location = ship.current_location()?;

        self.locations()
            .into_iter()
            .filter(|location| &location.symbol != current_location)
            .filter_map(|location| ship.distance_to(location).map(|distance| (location, distance)))
            .min_by_key(|(_, distance)| *distance)
    }
}
