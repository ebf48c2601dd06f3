use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[async_trait]
pub trait PlacesLookup: Send + Sync {
    async fn nearby(&self, latitude: f64, longitude: f64, radius_m: u32) -> anyhow::Result<Vec<PlaceCandidate>>;
}

/// Places provider reached over HTTP.
///
/// Expects `GET {endpoint}?lat=..&lng=..&radius=..` to answer
/// `{ "places": [PlaceCandidate] }`.
pub struct HttpPlacesLookup {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    places: Vec<PlaceCandidate>,
}

impl HttpPlacesLookup {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl PlacesLookup for HttpPlacesLookup {
    async fn nearby(&self, latitude: f64, longitude: f64, radius_m: u32) -> anyhow::Result<Vec<PlaceCandidate>> {
        let mut request = self.client.get(&self.endpoint).query(&[
            ("lat", latitude.to_string()),
            ("lng", longitude.to_string()),
            ("radius", radius_m.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("places API error ({status}): {body}");
        }

        let parsed: PlacesResponse = response.json().await?;
        tracing::debug!(count = parsed.places.len(), "places lookup finished");
        Ok(parsed.places)
    }
}
