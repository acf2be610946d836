// ABOUTME: The collaborators a pipeline run talks to, bundled with the active config.
// ABOUTME: Runtime, proxy and version control sit behind trait objects so tests can fake them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::record::DeploymentRecorder;
use super::service::ServiceController;
use crate::config::{Config, HealthcheckConfig};
use crate::error::Result;
use crate::health::HealthProbe;
use crate::proxy::{CaddyAdmin, ProxyAdmin};
use crate::runtime::{BollardRuntime, ServiceRuntime, detect_local};
use crate::types::{ImageRef, TagName};
use crate::vcs::{GitCli, ReleaseTagStore, Vcs};

use super::context::Profile;

pub struct Platform {
    pub config: Config,
    pub workspace: PathBuf,
    pub runtime: Arc<dyn ServiceRuntime>,
    pub proxy: Arc<dyn ProxyAdmin>,
    pub vcs: Arc<dyn Vcs>,
}

impl Platform {
    pub fn new(
        config: Config,
        workspace: impl Into<PathBuf>,
        runtime: Arc<dyn ServiceRuntime>,
        proxy: Arc<dyn ProxyAdmin>,
        vcs: Arc<dyn Vcs>,
    ) -> Self {
        Self {
            config,
            workspace: workspace.into(),
            runtime,
            proxy,
            vcs,
        }
    }

    /// Wire up the real collaborators: local container runtime, proxy admin
    /// API from config, and git in the workspace.
    pub async fn connect(config: Config, workspace: &Path) -> Result<Self> {
        let info = detect_local(&config.runtime).map_err(crate::runtime::RuntimeError::from)?;
        let runtime = BollardRuntime::connect(&info).await?;
        let proxy = CaddyAdmin::new(&config.proxy)
            .map_err(|e| crate::error::Error::InvalidConfig(e.to_string()))?;
        let vcs = GitCli::new(workspace);

        Ok(Self::new(
            config,
            workspace,
            Arc::new(runtime),
            Arc::new(proxy),
            Arc::new(vcs),
        ))
    }

    /// `<workspace>/<state_dir>/<environment>`
    pub fn state_dir(&self) -> PathBuf {
        self.config.environment_state_dir(&self.workspace)
    }

    pub fn recorder(&self) -> DeploymentRecorder {
        DeploymentRecorder::new(self.state_dir())
    }

    pub fn controller(&self) -> ServiceController<'_> {
        ServiceController::new(self)
    }

    pub fn tags(&self) -> ReleaseTagStore<'_> {
        ReleaseTagStore::new(self.vcs.as_ref())
    }

    pub fn healthcheck(&self, profile: Profile) -> HealthcheckConfig {
        match profile {
            Profile::Forward => self.config.healthcheck.clone(),
            Profile::Rollback => self.config.healthcheck.for_rollback(&self.config.rollback),
        }
    }

    pub fn probe(&self, profile: Profile) -> HealthProbe {
        HealthProbe::new(self.healthcheck(profile))
    }

    /// The image a release runs: the configured repository tagged with the release.
    pub fn image_for(&self, tag: &TagName) -> ImageRef {
        self.config.image.with_tag(tag.as_str())
    }
}
