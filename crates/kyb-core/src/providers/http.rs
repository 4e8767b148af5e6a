//! JSON-over-HTTP providers.
//!
//! Endpoints, relative to `base_url`:
//! - `GET  /business/{registration_number}`
//! - `GET  /directors/{registration_number}`
//! - `POST /sanctions/screen`  `{ "business_name", "directors": [..] }`
//! - `POST /risk/score`        `{ "business", "directors", "sanctions" }`
//!
//! The `reqwest::Client` is injected so callers control pooling, TLS and client-level timeouts.
//! Responses are normalised and validated in [`super::normalize`].

use super::normalize;
use super::{BusinessVerifier, DirectorRetriever, RiskScorer, SanctionsScreener};
use crate::error::{FetchFailure, Provider};
use crate::records::{
    BusinessRecord, DirectorListing, DirectorSet, RiskAssessment, SanctionsResult,
};
use reqwest::StatusCode;
use serde_json::Value;

#[derive(Clone)]
pub struct HttpProviders {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProviders {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send and read a JSON body. 404 is handed back to the caller; other non-success statuses
    /// are failures (4xx rejected, 5xx unreachable).
    async fn send(
        &self,
        provider: Provider,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, Value), FetchFailure> {
        let res = request
            .send()
            .await
            .map_err(|e| FetchFailure::unreachable(provider, e.to_string()))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| FetchFailure::unreachable(provider, e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Ok((status, Value::Null));
        }
        if status.is_client_error() {
            return Err(FetchFailure::Rejected {
                provider,
                reason: format!("{}: {}", status.as_u16(), text.trim()),
            });
        }
        if !status.is_success() {
            return Err(FetchFailure::unreachable(
                provider,
                format!("upstream status {}", status.as_u16()),
            ));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| FetchFailure::malformed(provider, format!("invalid JSON: {e}")))?;
        tracing::debug!(target: "kyb::providers", provider = %provider, status = status.as_u16(), "provider responded");
        Ok((status, body))
    }

    fn not_found_is_failure(provider: Provider, path: &str) -> FetchFailure {
        FetchFailure::Rejected {
            provider,
            reason: format!("404 for {path}"),
        }
    }
}

#[async_trait::async_trait]
impl BusinessVerifier for HttpProviders {
    async fn verify(&self, registration_number: &str) -> Result<BusinessRecord, FetchFailure> {
        let url = self.url(&format!("business/{registration_number}"));
        let (status, body) = self
            .send(Provider::BusinessVerifier, self.client.get(&url))
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(BusinessRecord::not_found(registration_number));
        }
        normalize::business_from_value(&body, registration_number)
    }
}

#[async_trait::async_trait]
impl DirectorRetriever for HttpProviders {
    async fn get_directors(
        &self,
        registration_number: &str,
    ) -> Result<DirectorListing, FetchFailure> {
        let path = format!("directors/{registration_number}");
        let (status, body) = self
            .send(Provider::DirectorRetriever, self.client.get(self.url(&path)))
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(Self::not_found_is_failure(Provider::DirectorRetriever, &path));
        }
        normalize::directors_from_value(&body)
    }
}

#[async_trait::async_trait]
impl SanctionsScreener for HttpProviders {
    async fn screen(
        &self,
        business_name: &str,
        director_names: &[String],
    ) -> Result<SanctionsResult, FetchFailure> {
        let path = "sanctions/screen";
        let payload = serde_json::json!({
            "business_name": business_name,
            "directors": director_names,
        });
        let (status, body) = self
            .send(
                Provider::SanctionsScreener,
                self.client.post(self.url(path)).json(&payload),
            )
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(Self::not_found_is_failure(Provider::SanctionsScreener, path));
        }
        normalize::sanctions_from_value(&body)
    }
}

#[async_trait::async_trait]
impl RiskScorer for HttpProviders {
    async fn score(
        &self,
        business: &BusinessRecord,
        directors: &DirectorSet,
        sanctions: &SanctionsResult,
    ) -> Result<RiskAssessment, FetchFailure> {
        let path = "risk/score";
        let payload = serde_json::json!({
            "business": business,
            "directors": directors,
            "sanctions": sanctions,
        });
        let (status, body) = self
            .send(Provider::RiskScorer, self.client.post(self.url(path)).json(&payload))
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(Self::not_found_is_failure(Provider::RiskScorer, path));
        }
        normalize::risk_from_value(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slashes() {
        let providers = HttpProviders::new(reqwest::Client::new(), "http://registry.local/");
        assert_eq!(
            providers.url("/business/00445790"),
            "http://registry.local/business/00445790"
        );
        assert_eq!(providers.url("risk/score"), "http://registry.local/risk/score");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_failure() {
        let providers = HttpProviders::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let err = providers.verify("00445790").await.unwrap_err();
        assert!(matches!(
            err,
            FetchFailure::Unreachable { provider: Provider::BusinessVerifier, .. }
        ));
    }
}
