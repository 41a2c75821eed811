//! Room catalog source.
//!
//! The catalog is a plain `GET /api/rooms` returning
//! `[{"room_id": "...", "users": [...]}]`. Callers treat it as best-effort.

use std::{future::Future, time::Duration};

use roomlink_proto::{EndpointConfig, RoomSummary};
use thiserror::Error;

/// Catalog fetch errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Request could not be sent or the body could not be decoded.
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("catalog endpoint returned status {0}")]
    Status(u16),
}

/// Something that can list rooms.
pub trait CatalogSource {
    /// Fetch the current room list.
    fn fetch_rooms(&self) -> impl Future<Output = Result<Vec<RoomSummary>, CatalogError>> + Send;
}

/// Catalog fetched over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    url: String,
}

impl HttpCatalog {
    /// Catalog for the server at `endpoint`. Requests taking longer than
    /// `timeout` fail with [`CatalogError::Request`].
    pub fn new(endpoint: &EndpointConfig, timeout: Duration) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: endpoint.rooms_url() })
    }

    /// URL requested by [`CatalogSource::fetch_rooms`].
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CatalogSource for HttpCatalog {
    async fn fetch_rooms(&self) -> Result<Vec<RoomSummary>, CatalogError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}
