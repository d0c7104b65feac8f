//! Remote track catalog.
//!
//! `CatalogProvider` is the seam the session core searches through;
//! `DeezerCatalog` talks to the public Deezer API over HTTP.
//!
//! ```text
//!   GET {base}/search?q=artist:"<text>"     → hits (no release date)
//!   GET {base}/track/{id}   × N, buffered    → release_date per hit
//! ```
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use preview_proto::config::CatalogConfig;
use preview_proto::protocol::TrackRecord;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::CatalogError;

/// Deezer's "no data" error code, returned for searches that match nothing.
const DEEZER_NO_DATA: u32 = 800;

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// All tracks whose artist matches `artist`, in provider order.
    async fn search(&self, artist: &str) -> Result<Vec<TrackRecord>, CatalogError>;
}

// ── wire format ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<DeezerTrack>,
    #[serde(default)]
    error: Option<DeezerError>,
}

#[derive(Debug, Deserialize)]
struct DeezerTrack {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<u32>,
    #[serde(default)]
    preview: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    artist: Option<DeezerArtist>,
    #[serde(default)]
    album: Option<DeezerAlbum>,
    #[serde(default)]
    error: Option<DeezerError>,
}

#[derive(Debug, Deserialize)]
struct DeezerArtist {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeezerAlbum {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeezerError {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<u32>,
}

impl DeezerError {
    fn describe(&self) -> String {
        format!(
            "{} (code {}): {}",
            self.kind.as_deref().unwrap_or("error"),
            self.code.map_or_else(|| "?".to_string(), |c| c.to_string()),
            self.message.as_deref().unwrap_or("")
        )
    }
}

impl DeezerTrack {
    fn into_record(self) -> TrackRecord {
        TrackRecord {
            title: self.title,
            artist_name: self.artist.and_then(|a| a.name),
            album_title: self.album.and_then(|a| a.title),
            duration_seconds: self.duration,
            release_date: self.release_date.filter(|d| !d.is_empty()),
            // Deezer sends "" for tracks without a preview.
            preview_url: self.preview.filter(|p| !p.is_empty()),
        }
    }
}

// ── client ────────────────────────────────────────────────────────────────────

pub struct DeezerCatalog {
    client: reqwest::Client,
    base_url: String,
    hydrate_release_dates: bool,
    hydrate_concurrency: usize,
}

impl DeezerCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CatalogError::Unexpected(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            hydrate_release_dates: config.hydrate_release_dates,
            hydrate_concurrency: config.hydrate_concurrency.max(1),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let body = resp.text().await.map_err(classify)?;
        serde_json::from_str(&body)
            .map_err(|e| CatalogError::Unexpected(format!("malformed response from {}: {}", url, e)))
    }

    /// Fetch one track to learn its release date.  Failures only leave the
    /// record without a date.
    async fn release_date(&self, id: Option<u64>) -> Option<String> {
        let id = id?;
        let url = format!("{}/track/{}", self.base_url, id);
        match self.get_json::<DeezerTrack>(&url, &[]).await {
            Ok(track) => {
                if let Some(err) = track.error {
                    warn!("DeezerCatalog: track {} lookup failed: {}", id, err.describe());
                    return None;
                }
                track.release_date.filter(|d| !d.is_empty())
            }
            Err(e) => {
                warn!("DeezerCatalog: track {} lookup failed: {}", id, e);
                None
            }
        }
    }
}

#[async_trait]
impl CatalogProvider for DeezerCatalog {
    async fn search(&self, artist: &str) -> Result<Vec<TrackRecord>, CatalogError> {
        let url = format!("{}/search", self.base_url);
        let q = format!("artist:\"{}\"", artist);
        debug!("DeezerCatalog: GET {} q={}", url, q);

        let page: SearchPage = self.get_json(&url, &[("q", q)]).await?;

        if let Some(err) = page.error {
            if err.code == Some(DEEZER_NO_DATA) {
                debug!("DeezerCatalog: no data for {:?}", artist);
                return Ok(Vec::new());
            }
            return Err(CatalogError::Unexpected(err.describe()));
        }

        let mut tracks = page.data;
        info!("DeezerCatalog: {} hits for {:?}", tracks.len(), artist);

        if self.hydrate_release_dates {
            let ids: Vec<Option<u64>> = tracks
                .iter()
                .map(|t| if t.release_date.is_some() { None } else { t.id })
                .collect();
            let dates: Vec<Option<String>> = stream::iter(ids)
                .map(|id| self.release_date(id))
                .buffered(self.hydrate_concurrency)
                .collect()
                .await;
            for (track, date) in tracks.iter_mut().zip(dates) {
                if date.is_some() {
                    track.release_date = date;
                }
            }
        }

        Ok(tracks.into_iter().map(DeezerTrack::into_record).collect())
    }
}

fn classify(err: reqwest::Error) -> CatalogError {
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        CatalogError::Network(err.to_string())
    } else {
        CatalogError::Unexpected(err.to_string())
    }
}

fn classify_status(status: StatusCode) -> CatalogError {
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            CatalogError::Network(format!("HTTP {}", status))
        }
        _ => CatalogError::Unexpected(format!("HTTP {}", status)),
    }
}
