use crate::core::source::{ApiEnvelope, FetchError, STATUS_SOFT_ERROR, WalletSource};
use crate::core::tracker::RequestTracker;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://quaiscan.io/api";

// QuaiscanProvider implementation for WalletSource
pub struct QuaiscanProvider {
    base_url: String,
    client: reqwest::Client,
    tracker: Arc<RequestTracker>,
}

impl QuaiscanProvider {
    pub fn new(base_url: &str, tracker: Arc<RequestTracker>) -> Self {
        QuaiscanProvider {
            base_url: base_url.to_string(),
            client: reqwest::Client::new(),
            tracker,
        }
    }

    /// Performs one API call. Every call is recorded on the tracker; a
    /// `status: "0"` body is logged as a soft error and still returned.
    #[instrument(name = "QuaiscanCall", skip(self))]
    pub async fn call(&self, params: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = Url::parse_with_params(&self.base_url, params)
            .map_err(|e| FetchError::Network(format!("Invalid URL {}: {e}", self.base_url)))?;
        let query = url.query().map(|q| format!("?{q}")).unwrap_or_default();

        self.tracker.record_attempt(&query);
        let start = Instant::now();

        let result = self.dispatch(url, start).await;
        if let Err(e) = &result {
            self.tracker.record_failure(&e.to_string());
        }
        result
    }

    async fn dispatch(&self, url: Url, start: Instant) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        self.tracker.record_success(status.as_u16(), start.elapsed());
        debug!(status = %status, "Received Quaiscan response");

        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        if body.get("status").and_then(Value::as_str) == Some(STATUS_SOFT_ERROR) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            self.tracker.record_soft_error(message);
        }

        Ok(body)
    }

    async fn call_envelope(&self, params: &[(&str, &str)]) -> Result<ApiEnvelope, FetchError> {
        let body = self.call(params).await?;
        serde_json::from_value(body)
            .map_err(|e| self.decode_failure(FetchError::Decode(e.to_string())))
    }

    /// A body that arrived but cannot be interpreted is a hard failure too.
    fn decode_failure(&self, error: FetchError) -> FetchError {
        self.tracker.record_failure(&error.to_string());
        error
    }
}

#[async_trait]
impl WalletSource for QuaiscanProvider {
    async fn fetch_balance(&self, address: &str) -> Result<ApiEnvelope, FetchError> {
        self.call_envelope(&[
            ("module", "account"),
            ("action", "balance"),
            ("address", address),
        ])
        .await
    }

    async fn fetch_transactions(
        &self,
        address: &str,
        page: u32,
        offset: u32,
    ) -> Result<ApiEnvelope, FetchError> {
        let page = page.to_string();
        let offset = offset.to_string();
        let envelope = self
            .call_envelope(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("startblock", "0"),
                ("endblock", "99999999"),
                ("page", &page),
                ("offset", &offset),
                ("sort", "desc"),
            ])
            .await?;
        envelope.transactions().map_err(|e| self.decode_failure(e))?;
        Ok(envelope)
    }
}
