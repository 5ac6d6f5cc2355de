//! HTTP client for the headless browser sidecar.
//!
//! The sidecar owns the browser processes and the page scripts; this side
//! only speaks its JSON protocol and maps replies onto extraction signals.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use farewatch_core::extraction::{
    Browser, BrowserLauncher, CarOffer, ExtractionError, ExtractionPage, LaunchError, QuoteSet,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BrowserStatus {
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    html: String,
}

#[derive(Debug, Default, Deserialize)]
struct Failure {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct Navigate<'a> {
    url: &'a str,
}

/// Outcome of one extraction as reported by the sidecar
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ExtractionReply<T> {
    Ok { data: T },
    NoResults,
    StaleDate,
    Error { message: String },
}

impl<T> ExtractionReply<T> {
    fn into_result(self) -> Result<T, ExtractionError> {
        match self {
            ExtractionReply::Ok { data } => Ok(data),
            ExtractionReply::NoResults => Err(ExtractionError::NoResults),
            ExtractionReply::StaleDate => Err(ExtractionError::StaleDate),
            ExtractionReply::Error { message } => Err(ExtractionError::Fault(message)),
        }
    }
}

fn fault(e: reqwest::Error) -> ExtractionError {
    ExtractionError::Fault(format!("sidecar request failed: {}", e))
}

struct SidecarClient {
    http: Client,
    base: String,
}

impl SidecarClient {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    async fn delete(&self, path: &str) -> Result<(), reqwest::Error> {
        self.http
            .delete(self.endpoint(path))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn extract<T: DeserializeOwned>(&self, path: &str, url: &str) -> Result<T, ExtractionError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(&Navigate { url })
            .send()
            .await
            .map_err(fault)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Fault(format!("sidecar returned {}: {}", status, body)));
        }

        let reply: ExtractionReply<T> = response.json().await.map_err(fault)?;
        reply.into_result()
    }
}

/// Launches browsers inside the sidecar
pub struct SidecarLauncher {
    client: Arc<SidecarClient>,
}

impl SidecarLauncher {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(request_timeout).build()?;
        let client = SidecarClient {
            http,
            base: base_url.trim_end_matches('/').to_string(),
        };
        Ok(Self { client: Arc::new(client) })
    }
}

#[async_trait]
impl BrowserLauncher for SidecarLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, LaunchError> {
        let response = self
            .client
            .http
            .post(self.client.endpoint("browsers"))
            .send()
            .await
            .map_err(|e| LaunchError::Failed(format!("sidecar unreachable: {}", e)))?;

        let status = response.status();
        // 503 with `launch_failed` when the browser binary cannot start
        if !status.is_success() {
            let failure: Failure = response.json().await.unwrap_or_default();
            return Err(LaunchError::Failed(format!(
                "{} {} {}",
                status, failure.error, failure.message
            )));
        }

        let created: Created = response
            .json()
            .await
            .map_err(|e| LaunchError::Failed(format!("unexpected launch reply: {}", e)))?;
        debug!(browser_id = %created.id, "Sidecar browser launched");

        Ok(Arc::new(SidecarBrowser {
            client: self.client.clone(),
            id: created.id,
        }))
    }
}

struct SidecarBrowser {
    client: Arc<SidecarClient>,
    id: String,
}

#[async_trait]
impl Browser for SidecarBrowser {
    async fn is_connected(&self) -> bool {
        let response = self
            .client
            .http
            .get(self.client.endpoint(&format!("browsers/{}", self.id)))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => response
                .json::<BrowserStatus>()
                .await
                .map(|s| s.connected)
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn new_page(&self) -> Result<Box<dyn ExtractionPage>, ExtractionError> {
        let created: Created = self
            .client
            .http
            .post(self.client.endpoint(&format!("browsers/{}/pages", self.id)))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fault)?
            .json()
            .await
            .map_err(fault)?;

        Ok(Box::new(SidecarPage {
            client: self.client.clone(),
            id: created.id,
            closed: false,
        }))
    }

    async fn close(&self) {
        if let Err(e) = self.client.delete(&format!("browsers/{}", self.id)).await {
            warn!(browser_id = %self.id, "Failed to close browser: {}", e);
        }
    }
}

struct SidecarPage {
    client: Arc<SidecarClient>,
    id: String,
    closed: bool,
}

#[async_trait]
impl ExtractionPage for SidecarPage {
    async fn extract_flights(&mut self, url: &str) -> Result<QuoteSet, ExtractionError> {
        self.client
            .extract(&format!("pages/{}/flights", self.id), url)
            .await
    }

    async fn extract_car_offer(&mut self, url: &str) -> Result<CarOffer, ExtractionError> {
        self.client.extract(&format!("pages/{}/car", self.id), url).await
    }

    async fn snapshot(&mut self) -> Result<String, ExtractionError> {
        let snapshot: Snapshot = self
            .client
            .http
            .get(self.client.endpoint(&format!("pages/{}/snapshot", self.id)))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fault)?
            .json()
            .await
            .map_err(fault)?;
        Ok(snapshot.html)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.client.delete(&format!("pages/{}", self.id)).await {
            warn!(page_id = %self.id, "Failed to close page: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_reply_carries_quotes() {
        let json = r#"{
            "status": "ok",
            "data": {
                "quotes": [{
                    "departure_time": "06:15", "arrival_time": "07:20", "duration": "1 h 5 min",
                    "airline": "GOL", "stops_label": "Sem escalas", "price": 312, "emissions": "61 kg CO2e",
                    "stop_details": [{"airport": "BSB", "airport_name": "Brasília", "duration": "1 h"}]
                }],
                "origin": "São Paulo", "destination": "Rio de Janeiro", "date": "qui., 12 de jun."
            }
        }"#;
        let reply: ExtractionReply<QuoteSet> = serde_json::from_str(json).unwrap();
        let set = reply.into_result().unwrap();
        assert_eq!(set.lowest_price(), Some(312));
        assert_eq!(set.quotes[0].stop_details[0].airport, "BSB");
    }

    #[test]
    fn test_signal_replies_map_to_errors() {
        let stale: ExtractionReply<QuoteSet> = serde_json::from_str(r#"{"status": "stale_date"}"#).unwrap();
        assert_eq!(stale.into_result().unwrap_err(), ExtractionError::StaleDate);

        let empty: ExtractionReply<CarOffer> = serde_json::from_str(r#"{"status": "no_results"}"#).unwrap();
        assert_eq!(empty.into_result().unwrap_err(), ExtractionError::NoResults);

        let broken: ExtractionReply<QuoteSet> =
            serde_json::from_str(r#"{"status": "error", "message": "selector [role=main] not found"}"#).unwrap();
        assert_eq!(
            broken.into_result().unwrap_err(),
            ExtractionError::Fault("selector [role=main] not found".to_string())
        );
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let launcher = SidecarLauncher::new("http://sidecar:3100/", Duration::from_secs(5)).unwrap();
        assert_eq!(launcher.client.endpoint("browsers"), "http://sidecar:3100/browsers");
        assert_eq!(launcher.client.endpoint("/pages/7/car"), "http://sidecar:3100/pages/7/car");
    }
}
