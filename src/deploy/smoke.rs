// ABOUTME: HTTP smoke suite run directly against a freshly started instance.
// ABOUTME: Every check runs; the report lists which ones failed and why.

use serde::Serialize;

use crate::config::SmokeCheck;
use crate::http::HttpClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmokeCheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl SmokeCheckResult {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: "ok".to_string(),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SmokeReport {
    pub results: Vec<SmokeCheckResult>,
}

impl SmokeReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SmokeCheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn summary(&self) -> String {
        let passed = self.results.iter().filter(|r| r.passed).count();
        format!("{}/{} smoke checks passed", passed, self.results.len())
    }
}

/// Run `checks` against `address` in order.
pub async fn run_checks<'c>(
    client: &HttpClient,
    address: &str,
    checks: impl IntoIterator<Item = &'c SmokeCheck>,
) -> SmokeReport {
    let mut results = Vec::new();

    for check in checks {
        let result = match client.get(address, &check.path).await {
            Err(e) => SmokeCheckResult::fail(&check.name, e.to_string()),
            Ok(response) if response.status != check.expect_status => SmokeCheckResult::fail(
                &check.name,
                format!(
                    "GET {} returned HTTP {}, expected {}",
                    check.path, response.status, check.expect_status
                ),
            ),
            Ok(response) => match &check.contains {
                Some(needle) if !response.text().contains(needle.as_str()) => {
                    SmokeCheckResult::fail(
                        &check.name,
                        format!("GET {} body does not contain {:?}", check.path, needle),
                    )
                }
                _ => SmokeCheckResult::pass(&check.name),
            },
        };
        tracing::debug!(check = %result.name, passed = result.passed, "smoke check");
        results.push(result);
    }

    SmokeReport { results }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_suite_passes() {
        let report = SmokeReport::default();
        assert!(report.passed());
        assert_eq!(report.summary(), "0/0 smoke checks passed");
    }

    #[test]
    fn failures_are_listed_in_order() {
        let report = SmokeReport {
            results: vec![
                SmokeCheckResult::fail("a", "HTTP 500"),
                SmokeCheckResult::pass("b"),
                SmokeCheckResult::fail("c", "timeout"),
            ],
        };
        assert!(!report.passed());
        let names: Vec<&str> = report.failures().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(report.summary(), "1/3 smoke checks passed");
    }

    #[tokio::test]
    async fn unreachable_instance_fails_every_check() {
        let checks = vec![SmokeCheck {
            name: "root".to_string(),
            path: "/".to_string(),
            expect_status: 200,
            contains: None,
            critical: true,
        }];
        let client = HttpClient::new(std::time::Duration::from_millis(500));
        let report = run_checks(&client, "127.0.0.1:1", &checks).await;
        assert!(!report.passed());
    }
}
