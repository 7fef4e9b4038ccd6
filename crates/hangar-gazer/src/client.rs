use reqwest::blocking::Client;
use serde::Deserialize;

use crate::event::UpstreamEvent;

/// A package-and-versions entry from the full-catalogue endpoint, used for
/// periodic reconciliation against ORACLE's view of the world.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueEntry {
    pub package: String,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    events_url: String,
    catalogue_url: String,
}

impl UpstreamClient {
    pub fn new(events_url: impl Into<String>, catalogue_url: impl Into<String>) -> reqwest::Result<UpstreamClient> {
        let http = Client::builder()
            .user_agent(format!("hangar-gazer/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(UpstreamClient {
            http,
            events_url: events_url.into(),
            catalogue_url: catalogue_url.into(),
        })
    }

    /// Fetch every event with `serial` strictly greater than `since`, in
    /// ascending order.
    pub fn fetch_events(&self, since: i64) -> reqwest::Result<Vec<UpstreamEvent>> {
        self.http
            .get(&self.events_url)
            .query(&[("since", since)])
            .send()?
            .error_for_status()?
            .json()
    }

    /// Fetch the entire upstream catalogue for a full reconciliation pass.
    pub fn fetch_catalogue(&self) -> reqwest::Result<Vec<CatalogueEntry>> {
        self.http
            .get(&self.catalogue_url)
            .send()?
            .error_for_status()?
            .json()
    }
}
