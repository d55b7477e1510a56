//! HTTP client for the remote payment processor.
//!
//! Holds are created in manual-capture mode. All calls carry a bounded
//! timeout and run behind a circuit breaker; no local lock is held while a
//! call is in flight.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::ports::{GatewayError, GatewayResult, HoldReceipt, HoldState, PaymentGateway};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

#[derive(Debug, Serialize)]
struct CreateHoldRequest<'a> {
    amount: &'a BigDecimal,
    currency: &'a str,
    capture_mode: &'static str,
    metadata: HoldMetadata,
}

#[derive(Debug, Serialize)]
struct HoldMetadata {
    booking_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct HoldResponse {
    hold_id: String,
    client_secret: String,
    status: HoldState,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
pub struct ProcessorClient {
    client: Client,
    base_url: String,
    api_key: String,
    circuit_breaker: Breaker,
}

impl ProcessorClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(30), Duration::from_secs(60));
        let policy = failure_policy::consecutive_failures(5, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        ProcessorClient {
            client,
            base_url,
            api_key,
            circuit_breaker,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> GatewayResult<reqwest::Response> {
        let request = request.bearer_auth(&self.api_key);

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request.send().await.map_err(|e| {
                    // Network-level failures are transient by definition.
                    GatewayError::Transient(e.to_string())
                })?;

                let status = response.status();
                if status.is_server_error() {
                    return Err(GatewayError::Transient(format!(
                        "processor returned {status}"
                    )));
                }
                if status.is_client_error() {
                    let message = response
                        .json::<ErrorResponse>()
                        .await
                        .map(|e| e.error)
                        .unwrap_or_else(|_| status.to_string());
                    return Err(match status {
                        StatusCode::TOO_MANY_REQUESTS => GatewayError::Transient(message),
                        _ => GatewayError::Declined(message),
                    });
                }
                Ok(response)
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(FailsafeError::Rejected) => Err(GatewayError::Transient(
                "processor circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn hold_response(&self, response: reqwest::Response) -> GatewayResult<HoldResponse> {
        response
            .json::<HoldResponse>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for ProcessorClient {
    async fn create_hold(
        &self,
        amount: &BigDecimal,
        currency: &str,
        booking_id: Uuid,
    ) -> GatewayResult<HoldReceipt> {
        let body = CreateHoldRequest {
            amount,
            currency,
            capture_mode: "manual",
            metadata: HoldMetadata { booking_id },
        };

        let response = self
            .send(
                self.client
                    .post(self.url("/v1/holds"))
                    // Retries of the same booking's hold request collapse at
                    // the processor.
                    .header("Idempotency-Key", booking_id.to_string())
                    .json(&body),
            )
            .await?;

        let hold = self.hold_response(response).await?;
        tracing::info!(hold_id = %hold.hold_id, %booking_id, "created processor hold");
        Ok(HoldReceipt {
            hold_id: hold.hold_id,
            client_secret: hold.client_secret,
        })
    }

    async fn capture_hold(&self, hold_id: &str) -> GatewayResult<()> {
        self.send(
            self.client
                .post(self.url(&format!("/v1/holds/{hold_id}/capture"))),
        )
        .await?;
        tracing::info!(%hold_id, "captured processor hold");
        Ok(())
    }

    async fn cancel_hold(&self, hold_id: &str) -> GatewayResult<()> {
        self.send(
            self.client
                .post(self.url(&format!("/v1/holds/{hold_id}/cancel"))),
        )
        .await?;
        tracing::info!(%hold_id, "cancelled processor hold");
        Ok(())
    }

    async fn refund(&self, hold_id: &str) -> GatewayResult<()> {
        self.send(
            self.client
                .post(self.url(&format!("/v1/holds/{hold_id}/refund"))),
        )
        .await?;
        tracing::info!(%hold_id, "refunded captured hold");
        Ok(())
    }

    async fn retrieve_hold(&self, hold_id: &str) -> GatewayResult<(HoldReceipt, HoldState)> {
        let response = self
            .send(self.client.get(self.url(&format!("/v1/holds/{hold_id}"))))
            .await?;

        let hold = self.hold_response(response).await?;
        Ok((
            HoldReceipt {
                hold_id: hold.hold_id,
                client_secret: hold.client_secret,
            },
            hold.status,
        ))
    }
}
