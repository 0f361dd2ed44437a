use anyhow::Context;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use http::Extensions;
use reqwest::{Client, Request, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{default_on_request_failure, default_on_request_success, Jitter, RetryTransientMiddleware, Retryable, RetryableStrategy};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{event, Level};

const REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(2) {
    Some(limit) => limit,
    None => unreachable!(),
};

/// Retries of a throttled or otherwise transient request, each one after the same fixed pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: 5,
            backoff: Duration::from_secs(10),
        }
    }
}

pub fn create_client(maybe_bearer_token: Option<String>, retry_settings: RetrySettings) -> anyhow::Result<ClientWithMiddleware> {
    let reqwest_client = Client::builder().build().context("Failed to build http client")?;

    let limiter = RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND));
    let rate_limiting_middleware = RateLimitingMiddleware { limiter: Arc::new(limiter) };

    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(retry_settings.backoff, retry_settings.backoff)
        .jitter(Jitter::None)
        .build_with_max_retries(retry_settings.max_retries);

    let client_builder = ClientBuilder::new(reqwest_client)
        .with(RetryTransientMiddleware::new_with_policy_and_strategy(retry_policy, GameRetryStrategy))
        .with(ErrorLoggingMiddleware)
        .with(rate_limiting_middleware);

    let client = match maybe_bearer_token {
        None => client_builder.build(),
        Some(token) => client_builder.with(AuthenticatedHeaderMiddleware::new(token)).build(),
    };
    Ok(client)
}

/// On top of the usual transient failures (429 throttling, 5xx, connection errors) the game
/// answers 409 while a previous request for the same ship is still being processed.
pub struct GameRetryStrategy;

impl RetryableStrategy for GameRetryStrategy {
    fn handle(&self, res: &Result<Response, reqwest_middleware::Error>) -> Option<Retryable> {
        match res {
            Ok(response) if response.status() == StatusCode::CONFLICT => Some(Retryable::Transient),
            Ok(response) => default_on_request_success(response),
            Err(error) => default_on_request_failure(error),
        }
    }
}

struct AuthenticatedHeaderMiddleware {
    bearer_token: String,
}

impl AuthenticatedHeaderMiddleware {
    pub fn new(bearer_token: String) -> Self {
        Self { bearer_token }
    }
}

#[async_trait::async_trait]
impl Middleware for AuthenticatedHeaderMiddleware {
    async fn handle(&self, mut req: Request, extensions: &mut Extensions, next: Next<'_>) -> reqwest_middleware::Result<Response> {
        let header_value = format!("Bearer {}", self.bearer_token)
            .parse()
            .map_err(|e| reqwest_middleware::Error::Middleware(anyhow::anyhow!("invalid bearer token: {e}")))?;
        req.headers_mut().insert(reqwest::header::AUTHORIZATION, header_value);

        next.run(req, extensions).await
    }
}

struct RateLimitingMiddleware {
    limiter: Arc<DefaultDirectRateLimiter>,
}

#[async_trait::async_trait]
impl Middleware for RateLimitingMiddleware {
    async fn handle(&self, req: Request, extensions: &mut Extensions, next: Next<'_>) -> reqwest_middleware::Result<Response> {
        self.limiter.until_ready().await;
        next.run(req, extensions).await
    }
}

pub struct ErrorLoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for ErrorLoggingMiddleware {
    async fn handle(&self, req: Request, extensions: &mut Extensions, next: Next<'_>) -> reqwest_middleware::Result<Response> {
        let start = Instant::now();
        let method = req.method().clone();
        let url = req.url().clone();

        let result = next.run(req, extensions).await;

        let duration = start.elapsed();

        match &result {
            Ok(resp) if !resp.status().is_success() => {
                let status = resp.status();

                match status {
                    StatusCode::TOO_MANY_REQUESTS | StatusCode::CONFLICT => {
                        event!(
                            Level::DEBUG,
                            "Request throttled {} {} - Status: {}, Duration: {:?}. Retrying.",
                            method,
                            url,
                            status,
                            duration
                        )
                    }
                    _ => event!(Level::ERROR, "Request failed: {} {} - Status: {}, Duration: {:?}", method, url, status, duration),
                }
            }
            Err(e) => {
                event!(Level::ERROR, "Request error: {} {} - Error: {}, Duration: {:?}", method, url, e, duration);
            }
            _ => {
                event!(Level::DEBUG, "Request succeeded: {} {} - Duration: {:?}", method, url, duration);
            }
        }

        result
    }
}
