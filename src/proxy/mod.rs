// ABOUTME: Reverse-proxy admin seam used for blue/green traffic cutover.
// ABOUTME: Routing to the upstream already in place is a no-op.

mod caddy;

pub use caddy::CaddyAdmin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::HttpError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("proxy admin API unreachable: {0}")]
    Http(#[from] HttpError),

    #[error("proxy admin API rejected {method} {path}: HTTP {status}: {body}")]
    Rejected {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },
}

/// One upstream entry of a route, as the admin API represents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    pub dial: String,
}

impl Upstream {
    pub fn new(dial: impl Into<String>) -> Self {
        Self { dial: dial.into() }
    }

    /// Port of the dial target, if it has one.
    pub fn port(&self) -> Option<u16> {
        self.dial.rsplit_once(':').and_then(|(_, p)| p.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteChange {
    Unchanged,
    Switched { previous: Vec<Upstream> },
}

#[async_trait]
pub trait ProxyAdmin: Send + Sync {
    async fn upstreams(&self) -> Result<Vec<Upstream>, ProxyError>;

    /// Replace the route's upstream list in one request.
    async fn set_upstreams(&self, upstreams: &[Upstream]) -> Result<(), ProxyError>;

    /// Point the route at exactly `dial`, skipping the patch if it already is.
    async fn route_to(&self, dial: &str) -> Result<RouteChange, ProxyError> {
        let current = self.upstreams().await?;
        let target = vec![Upstream::new(dial)];
        if current == target {
            tracing::debug!(%dial, "proxy already routes to target");
            return Ok(RouteChange::Unchanged);
        }

        self.set_upstreams(&target).await?;
        tracing::info!(%dial, "proxy upstream switched");
        Ok(RouteChange::Switched { previous: current })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_port() {
        assert_eq!(Upstream::new("127.0.0.1:8001").port(), Some(8001));
        assert_eq!(Upstream::new("app").port(), None);
    }

    #[test]
    fn upstream_wire_format() {
        let json = serde_json::to_string(&[Upstream::new("10.0.0.5:8002")]).unwrap();
        assert_eq!(json, r#"[{"dial":"10.0.0.5:8002"}]"#);
    }
}
