// ABOUTME: Capability discovery through an OpenAPI-style document.
// ABOUTME: Confirms the service registered at least the expected number of routes.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::config::ApiSpecConfig;
use crate::http::{HttpClient, HttpError};

#[derive(Debug, thiserror::Error)]
pub enum ApiSpecError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("{path} lists {found} routes, expected at least {expected}")]
    TooFewRoutes {
        path: String,
        found: usize,
        expected: usize,
    },
}

#[derive(Deserialize)]
struct ApiDocument {
    #[serde(default)]
    paths: BTreeMap<String, serde_json::Value>,
}

/// Fetch the document and return the number of registered routes.
pub async fn check_routes(
    client: &HttpClient,
    address: &str,
    config: &ApiSpecConfig,
) -> Result<usize, ApiSpecError> {
    let response = client.get(address, &config.path).await?;
    if !response.is_success() {
        return Err(ApiSpecError::Status {
            path: config.path.clone(),
            status: response.status,
        });
    }

    let document: ApiDocument = response.json()?;
    let found = document.paths.len();
    // Zero routes is never acceptable, whatever the configured minimum.
    let expected = config.min_routes.max(1);
    if found < expected {
        return Err(ApiSpecError::TooFewRoutes {
            path: config.path.clone(),
            found,
            expected,
        });
    }
    Ok(found)
}
