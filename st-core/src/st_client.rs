use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use st_domain::{
    AvailableShipsResponse, BuyShipResponse, FlightPlanResponse, GetMarketResponse, GetShipResponse, GetUserResponse, ListLocationsResponse,
    ListShipsResponse, LocationSymbol, OrderResponse, RemoteErrorResponse, RequestLoanResponse, ScrapShipResponse, ShipClass, ShipId, StatusResponse,
    SystemSymbol, TradeGoodSymbol,
};
use std::fmt::Debug;
use thiserror::Error;

/// Error code the game uses for throttled requests.
pub const THROTTLED: u32 = 42901;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("remote operation failed with code {code}: {message}")]
    RemoteOperation { code: u32, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("error decoding response at '{path}': {message}. Response body was: '{body}'")]
    Decode { path: String, message: String, body: String },
}

impl ApiError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, ApiError::RemoteOperation { code, .. } if *code == THROTTLED)
    }

    fn from_error_response(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<RemoteErrorResponse>(body) {
            Ok(response) => ApiError::RemoteOperation {
                code: response.error.code,
                message: response.error.message,
            },
            Err(_) => ApiError::RemoteOperation {
                code: status.as_u16() as u32,
                message: body.to_string(),
            },
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let deserializer = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(deserializer).map_err(|e| ApiError::Decode {
        path: e.path().to_string(),
        message: e.inner().to_string(),
        body: body.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct StClient {
    pub client: ClientWithMiddleware,
    base_url: String,
    username: String,
}

impl StClient {
    pub fn new(client: ClientWithMiddleware, base_url: &str, username: &str) -> Self {
        StClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn user_url(&self, path: &str) -> String {
        self.url(&format!("users/{}/{}", self.username, path))
    }

    async fn make_api_call<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        let resp = request.send().await.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ApiError::Transport(format!("Failed to get response body: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::from_error_response(status, &body));
        }

        decode(&body)
    }
}

#[async_trait]
impl StClientTrait for StClient {
    async fn get_status(&self) -> Result<StatusResponse, ApiError> {
        Self::make_api_call(self.client.get(self.url("game/status"))).await
    }

    async fn get_user(&self) -> Result<GetUserResponse, ApiError> {
        Self::make_api_call(self.client.get(self.url(&format!("users/{}", self.username)))).await
    }

    async fn get_ship(&self, ship_id: &ShipId) -> Result<GetShipResponse, ApiError> {
        Self::make_api_call(self.client.get(self.user_url(&format!("ships/{}", ship_id.0)))).await
    }

    async fn get_ships(&self) -> Result<ListShipsResponse, ApiError> {
        Self::make_api_call(self.client.get(self.user_url("ships"))).await
    }

    async fn get_available_ships(&self, class: Option<ShipClass>) -> Result<AvailableShipsResponse, ApiError> {
        let query_param_list = class.map(|class| vec![("class", class.to_string())]).unwrap_or_default();
        Self::make_api_call(self.client.get(self.url("game/ships")).query(&query_param_list)).await
    }

    async fn buy_ship(&self, location: &LocationSymbol, ship_type: &str) -> Result<BuyShipResponse, ApiError> {
        let query_param_list = [("location", location.0.clone()), ("type", ship_type.to_string())];
        Self::make_api_call(self.client.post(self.user_url("ships")).query(&query_param_list)).await
    }

    async fn scrap_ship(&self, ship_id: &ShipId) -> Result<ScrapShipResponse, ApiError> {
        Self::make_api_call(self.client.delete(self.user_url(&format!("ships/{}", ship_id.0)))).await
    }

    async fn request_loan(&self, loan_type: &str) -> Result<RequestLoanResponse, ApiError> {
        let query_param_list = [("type", loan_type.to_string())];
        Self::make_api_call(self.client.post(self.user_url("loans")).query(&query_param_list)).await
    }

    async fn get_market(&self, location: &LocationSymbol) -> Result<GetMarketResponse, ApiError> {
        Self::make_api_call(self.client.get(self.url(&format!("game/locations/{}/marketplace", location.0)))).await
    }

    async fn get_system_locations(&self, system_symbol: &SystemSymbol) -> Result<ListLocationsResponse, ApiError> {
        Self::make_api_call(self.client.get(self.url(&format!("game/systems/{}/locations", system_symbol.0)))).await
    }

    async fn place_buy_order(&self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError> {
        let query_param_list = [("shipId", ship_id.0.clone()), ("good", good.0.clone()), ("quantity", quantity.to_string())];
        Self::make_api_call(self.client.post(self.user_url("purchase-orders")).query(&query_param_list)).await
    }

    async fn place_sell_order(&self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError> {
        let query_param_list = [("shipId", ship_id.0.clone()), ("good", good.0.clone()), ("quantity", quantity.to_string())];
        Self::make_api_call(self.client.post(self.user_url("sell-orders")).query(&query_param_list)).await
    }

    async fn submit_flight_plan(&self, ship_id: &ShipId, destination: &LocationSymbol) -> Result<FlightPlanResponse, ApiError> {
        let query_param_list = [("shipId", ship_id.0.clone()), ("destination", destination.0.clone())];
        Self::make_api_call(self.client.post(self.user_url("flight-plans")).query(&query_param_list)).await
    }
}

#[async_trait]
pub trait StClientTrait: Send + Sync + Debug {
    async fn get_status(&self) -> Result<StatusResponse, ApiError>;

    async fn get_user(&self) -> Result<GetUserResponse, ApiError>;

    async fn get_ship(&self, ship_id: &ShipId) -> Result<GetShipResponse, ApiError>;

    async fn get_ships(&self) -> Result<ListShipsResponse, ApiError>;

    /// Ship types on sale, optionally only those of one class.
    async fn get_available_ships(&self, class: Option<ShipClass>) -> Result<AvailableShipsResponse, ApiError>;

    async fn buy_ship(&self, location: &LocationSymbol, ship_type: &str) -> Result<BuyShipResponse, ApiError>;

    /// Only possible at a location with a shipyard.
    async fn scrap_ship(&self, ship_id: &ShipId) -> Result<ScrapShipResponse, ApiError>;

    async fn request_loan(&self, loan_type: &str) -> Result<RequestLoanResponse, ApiError>;

    async fn get_market(&self, location: &LocationSymbol) -> Result<GetMarketResponse, ApiError>;

    async fn get_system_locations(&self, system_symbol: &SystemSymbol) -> Result<ListLocationsResponse, ApiError>;

    async fn place_buy_order(&self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError>;

    async fn place_sell_order(&self, ship_id: &ShipId, good: &TradeGoodSymbol, quantity: u32) -> Result<OrderResponse, ApiError>;

    async fn submit_flight_plan(&self, ship_id: &ShipId, destination: &LocationSymbol) -> Result<FlightPlanResponse, ApiError>;
}
