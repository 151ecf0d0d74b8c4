//! HTTP catalog client
//!
//! Search by "artist title", take the first hit, then fetch its audio
//! features. Requests are rate limited with a token bucket.

use super::filename::parse_filename;
use super::{EnrichmentError, EnrichmentSource};
use crate::config::EnrichmentConfig;
use crate::models::{Enrichment, Track};
use async_trait::async_trait;
use chrono::Utc;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Search response: `{tracks: {items: [...]}}`
#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: SearchPage,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<CatalogTrack>,
}

#[derive(Debug, Deserialize)]
struct CatalogTrack {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AudioFeatures {
    energy: Option<f64>,
    danceability: Option<f64>,
    valence: Option<f64>,
    loudness: Option<f64>,
    key: Option<i32>,
}

pub struct CatalogClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl CatalogClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        requests_per_second: u32,
    ) -> Result<Self, EnrichmentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        let per_second = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            EnrichmentError::Config("requests_per_second must be at least 1".to_string())
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        Self::new(
            config.base_url.clone(),
            config.api_token.clone(),
            config.requests_per_second,
        )
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, EnrichmentError> {
        self.rate_limiter.until_ready().await;

        let mut request = self.client.get(url).query(query);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    async fn search(&self, query: &str) -> Result<Option<CatalogTrack>, EnrichmentError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .get(&url, &[("q", query), ("type", "track"), ("limit", "5")])
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Status { status, message });
        }

        let page: SearchResponse = response.json().await?;
        Ok(page.tracks.items.into_iter().next())
    }

    async fn audio_features(&self, id: &str) -> Result<Option<AudioFeatures>, EnrichmentError> {
        let url = format!("{}/audio-features/{}", self.base_url, id);
        let response = self.get(&url, &[]).await?;

        match response.status() {
            // Catalog knows the track but has no analysis for it
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.json().await?)),
            s => Err(EnrichmentError::Status {
                status: s.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl EnrichmentSource for CatalogClient {
    async fn lookup(&self, track: &Track) -> Result<Option<Enrichment>, EnrichmentError> {
        let Some(query) = parse_filename(&track.filename).query() else {
            return Ok(None);
        };

        let Some(hit) = self.search(&query).await? else {
            debug!(track_id = %track.id, query = %query, "No catalog match");
            return Ok(None);
        };

        let Some(features) = self.audio_features(&hit.id).await? else {
            return Ok(None);
        };

        debug!(
            track_id = %track.id,
            external_id = %hit.id,
            name = hit.name.as_deref().unwrap_or(""),
            "Catalog match"
        );

        Ok(Some(Enrichment {
            external_id: hit.id,
            energy: features.energy,
            danceability: features.danceability,
            valence: features.valence,
            loudness: features.loudness,
            key: features.key,
            enriched_at: Utc::now(),
        }))
    }
}
