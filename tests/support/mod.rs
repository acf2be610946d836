// ABOUTME: Test support utilities.
// ABOUTME: Fakes for the runtime, proxy and git plus a harness wiring them into a Platform.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

pub mod fakes;
pub mod http_stub;

use std::sync::{Arc, Once};
use tempfile::TempDir;

use releasegate::config::Config;
use releasegate::deploy::{
    DeploymentLock, DeploymentRecorder, GateRunner, Platform, RollbackManager, Verdict,
};
use releasegate::types::TagName;

use fakes::{FakeProxy, FakeRuntime, FakeVcs};
use http_stub::StubServer;

pub const COMMIT_V1: &str = "1111111aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const COMMIT_V2: &str = "2222222bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const COMMIT_V3: &str = "3333333ccccccccccccccccccccccccccccccccc";

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("releasegate=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Config for the test service with slot ports pointing at the stubs and
/// timings short enough for tests.
pub fn test_config(blue: u16, green: u16) -> Config {
    Config::from_yaml(&format!(
        r#"
service: shop
image: registry.example.com/shop
environment: production
slots:
  container_port: 8000
  blue: {blue}
  green: {green}
healthcheck:
  path: /health
  interval: 10ms
  max_interval: 20ms
  timeout: 1s
  retries: 2
  start_period: 0s
  deadline: 2s
rollback:
  health_deadline: 2s
  retries: 2
  start_period: 0s
smoke:
  timeout: 1s
  checks:
    - name: home
      path: /
      contains: shop
    - name: search
      path: /search
      critical: false
cleanup:
  grace_period: 0s
stop:
  timeout: 1s
"#
    ))
    .unwrap()
}

/// A platform backed by fakes, with one HTTP stub per slot.
pub struct Harness {
    pub dir: TempDir,
    pub runtime: Arc<FakeRuntime>,
    pub proxy: Arc<FakeProxy>,
    pub vcs: Arc<FakeVcs>,
    pub blue: StubServer,
    pub green: StubServer,
    pub platform: Platform,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        init_tracing();
        let blue = StubServer::healthy().await;
        let green = StubServer::healthy().await;
        let mut config = test_config(blue.port, green.port);
        adjust(&mut config);

        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::new());
        let proxy = Arc::new(FakeProxy::new());
        let vcs = Arc::new(FakeVcs::at(COMMIT_V1));
        vcs.tag("v1.0.0", COMMIT_V1);
        vcs.tag("v1.1.0", COMMIT_V2);
        vcs.tag("v1.2.0", COMMIT_V3);

        let platform = Platform::new(
            config,
            dir.path(),
            runtime.clone(),
            proxy.clone(),
            vcs.clone(),
        );

        Self {
            dir,
            runtime,
            proxy,
            vcs,
            blue,
            green,
            platform,
        }
    }

    pub fn recorder(&self) -> DeploymentRecorder {
        self.platform.recorder()
    }

    pub fn lock(&self, operation: &str) -> DeploymentLock {
        DeploymentLock::acquire(&self.platform.state_dir(), operation, false).unwrap()
    }

    /// Check out the tag's commit and run the forward pipeline under the lock.
    pub async fn run(&self, tag: &str, commit: &str) -> Verdict {
        self.vcs.checkout(commit);
        let lock = self.lock("run");
        let verdict = GateRunner::new(&self.platform, &())
            .run(&tag_name(tag), &lock)
            .await
            .unwrap();
        lock.release().unwrap();
        verdict
    }

    pub async fn rollback(&self, tag: &str) -> Verdict {
        let lock = self.lock("rollback");
        let verdict = RollbackManager::new(&self.platform, &())
            .rollback(&tag_name(tag), &lock)
            .await
            .unwrap();
        lock.release().unwrap();
        verdict
    }
}

pub fn tag_name(tag: &str) -> TagName {
    TagName::parse(tag).unwrap()
}
