use crate::st_client::StClientTrait;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use st_domain::{LocationSymbol, MarketObservation, TradeGoodSymbol};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{event, Level};

#[async_trait]
pub trait MarketObservationSink: Send + Sync + Debug {
    /// Returns how many of the observations were stored.
    async fn insert_observations(&self, observations: Vec<MarketObservation>) -> Result<usize>;
}

type ObservationKey = (LocationSymbol, TradeGoodSymbol, DateTime<Utc>);

#[derive(Debug, Default)]
struct InMemoryObservations {
    keys: HashSet<ObservationKey>,
    rows: Vec<MarketObservation>,
}

/// Keeps every observation once per (location, good, time).
#[derive(Debug, Default)]
pub struct InMemoryMarketObservationSink {
    observations: RwLock<InMemoryObservations>,
}

impl InMemoryMarketObservationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn observations(&self) -> Vec<MarketObservation> {
        self.observations.read().await.rows.clone()
    }
}

#[async_trait]
impl MarketObservationSink for InMemoryMarketObservationSink {
    async fn insert_observations(&self, observations: Vec<MarketObservation>) -> Result<usize> {
        let mut guard = self.observations.write().await;
        let total = observations.len();

        let mut stored = 0;
        for observation in observations {
            let key = (observation.location.clone(), observation.symbol.clone(), observation.observed_at);
            if guard.keys.insert(key) {
                guard.rows.push(observation);
                stored += 1;
            }
        }

        if stored < total {
            event!(Level::WARN, "{} of {} observations already exist and were not added", total - stored, total);
        }
        Ok(stored)
    }
}

#[derive(Debug, Clone)]
pub struct MarketTracker {
    client: Arc<dyn StClientTrait>,
    sink: Arc<dyn MarketObservationSink>,
}

impl MarketTracker {
    pub fn new(client: Arc<dyn StClientTrait>, sink: Arc<dyn MarketObservationSink>) -> Self {
        MarketTracker { client, sink }
    }

    /// Observes every location once. A location that fails is logged and skipped.
    pub async fn track_once(&self, locations: &[LocationSymbol]) -> Result<usize> {
        let mut stored = 0;

        for location in locations {
            let snapshot = match self.client.get_market(location).await {
                Ok(response) => response.into_snapshot(Utc::now())?,
                Err(err) => {
                    event!(Level::WARN, "could not observe the market at {}: {}", location, err);
                    continue;
                }
            };

            let observations = snapshot.to_observations();
            event!(Level::INFO, "adding {} records of {}", observations.len(), location);
            stored += self.sink.insert_observations(observations).await?;
        }

        Ok(stored)
    }

    pub async fn track_periodically(&self, locations: &[LocationSymbol], interval: Duration, cancellation_token: &CancellationToken) -> Result<usize> {
        event!(
            Level::INFO,
            "tracking {} every {:?}",
            locations.iter().map(|location| location.0.as_str()).join(", "),
            interval
        );
        let mut ticker = tokio::time::interval(interval);
        let mut stored = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    event!(Level::INFO, "market tracking stopped after storing {} observations", stored);
                    return Ok(stored);
                }
                _ = ticker.tick() => {
                    stored += self.track_once(locations).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::st_client::ApiError;
    use crate::test_objects::{trading_client, MockStClient};
    use st_domain::test_objects::TestObjects;
    use tracing_test::traced_test;

    fn symbol(s: &str) -> LocationSymbol {
        LocationSymbol(s.to_string())
    }

    #[tokio::test]
    #[traced_test]
    async fn test_sink_rejects_duplicates() {
        let sink = InMemoryMarketObservationSink::new();
        let observations = TestObjects::market("OE-PM", &[("FUEL", 2, 1, 1), ("ORE", 5, 3, 2)]).to_observations();

        assert_eq!(sink.insert_observations(observations.clone()).await.unwrap(), 2);
        assert_eq!(sink.insert_observations(observations).await.unwrap(), 0);

        assert_eq!(sink.observations().await.len(), 2);
        assert!(logs_contain("2 of 2 observations already exist"));
    }

    #[tokio::test]
    async fn test_track_once_stores_every_quote() {
        let sink = Arc::new(InMemoryMarketObservationSink::new());
        let tracker = MarketTracker::new(Arc::new(trading_client(20)), sink.clone());

        let stored = tracker.track_once(&[symbol("OE-PM"), symbol("OE-CR")]).await.unwrap();

        assert_eq!(stored, 5);
        let observations = sink.observations().await;
        assert!(observations.iter().any(|o| o.location == symbol("OE-CR") && o.symbol == TradeGoodSymbol("ORE".to_string())));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unreachable_market_is_skipped() {
        let mut mock_client = MockStClient::new();
        mock_client.expect_get_market().returning(|location| match location.0.as_str() {
            "OE-PM" => Ok(TestObjects::market_response("OE-PM", &[("ORE", 5, 3, 2)])),
            _ => Err(ApiError::RemoteOperation {
                code: 404,
                message: "Marketplace not found.".to_string(),
            }),
        });
        let sink = Arc::new(InMemoryMarketObservationSink::new());
        let tracker = MarketTracker::new(Arc::new(mock_client), sink.clone());

        let stored = tracker.track_once(&[symbol("OE-NOWHERE"), symbol("OE-PM")]).await.unwrap();

        assert_eq!(stored, 1);
        assert!(logs_contain("could not observe the market at OE-NOWHERE"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_tracking_until_cancelled() {
        let mut mock_client = MockStClient::new();
        // ticks at 0s, 60s and 120s
        mock_client
            .expect_get_market()
            .times(3)
            .returning(|_| Ok(TestObjects::market_response("OE-CR", &[("FUEL", 3, 2, 1), ("ORE", 12, 9, 2)])));
        let sink = Arc::new(InMemoryMarketObservationSink::new());
        let tracker = MarketTracker::new(Arc::new(mock_client), sink.clone());
        let cancellation_token = CancellationToken::new();

        let stopper = cancellation_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(150)).await;
            stopper.cancel();
        });

        let stored = tracker
            .track_periodically(&[symbol("OE-CR")], Duration::from_secs(60), &cancellation_token)
            .await
            .unwrap();

        // two goods on each of the three ticks
        assert_eq!(stored, 6);
        assert_eq!(sink.observations().await.len(), 6);
    }
}
