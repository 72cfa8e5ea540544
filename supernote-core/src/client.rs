use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::listing::{ListingParseError, RemoteEntry, parse_listing};

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("listing {url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("unable to parse listing {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ListingParseError,
    },
}

impl ListingError {
    /// True when the device could not be reached at all, as opposed to
    /// answering with something unexpected.
    pub fn is_connectivity(&self) -> bool {
        match self {
            ListingError::Request(err) => err.is_connect() || err.is_timeout(),
            _ => false,
        }
    }

    pub fn parse_error(&self) -> Option<&ListingParseError> {
        match self {
            ListingError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Reads directory listings from the device's browse-and-access pages.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone, Default)]
pub struct ListingClient {
    http: Client,
}

impl ListingClient {
    pub fn new() -> Self {
        Self::with_http(Client::new())
    }

    pub fn with_http(http: Client) -> Self {
        Self { http }
    }

    pub async fn read_directory(&self, url: &str) -> Result<Vec<RemoteEntry>, ListingError> {
        let parsed = Url::parse(url)?;
        let response = self.http.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::Status {
                url: url.to_string(),
                status,
            });
        }
        let html = response.text().await?;
        parse_listing(&html).map_err(|source| ListingError::Parse {
            url: url.to_string(),
            source,
        })
    }
}
