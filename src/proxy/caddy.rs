// ABOUTME: Caddy admin API client for the route's upstream list.
// ABOUTME: GET reads the list, PATCH replaces it atomically.

use async_trait::async_trait;

use super::{ProxyAdmin, ProxyError, Upstream};
use crate::config::ProxyConfig;
use crate::http::{HttpClient, split_url};

pub struct CaddyAdmin {
    client: HttpClient,
    address: String,
    path: String,
}

impl CaddyAdmin {
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let (address, base) = split_url(&config.admin_url)?;
        Ok(Self {
            client: HttpClient::new(config.timeout),
            address,
            path: format!("{}{}", base, config.upstream_path),
        })
    }

    fn rejected(&self, method: &'static str, status: u16, body: String) -> ProxyError {
        ProxyError::Rejected {
            method,
            path: self.path.clone(),
            status,
            body,
        }
    }
}

#[async_trait]
impl ProxyAdmin for CaddyAdmin {
    async fn upstreams(&self) -> Result<Vec<Upstream>, ProxyError> {
        let response = self.client.get(&self.address, &self.path).await?;
        if !response.is_success() {
            return Err(self.rejected("GET", response.status, response.text()));
        }
        // An unset path reads back as `null`.
        let upstreams: Option<Vec<Upstream>> = response.json()?;
        Ok(upstreams.unwrap_or_default())
    }

    async fn set_upstreams(&self, upstreams: &[Upstream]) -> Result<(), ProxyError> {
        let response = self
            .client
            .patch_json(&self.address, &self.path, &upstreams)
            .await?;
        if !response.is_success() {
            return Err(self.rejected("PATCH", response.status, response.text()));
        }
        Ok(())
    }
}
