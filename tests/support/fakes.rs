// ABOUTME: In-memory stand-ins for the container runtime, proxy admin API and git.
// ABOUTME: Each fake records enough state for tests to assert on what the pipeline did.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use releasegate::proxy::{ProxyAdmin, ProxyError, Upstream};
use releasegate::runtime::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps,
    ContainerState, ContainerSummary, HealthState, ImageError, ImageOps, LogError, LogLine,
    LogLineStream, LogOps, LogOptions, LogStream,
};
use releasegate::types::{CommitHash, ContainerId, ImageId, ImageRef, TagName};
use releasegate::vcs::{ReleaseTag, Vcs, VcsError};

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub health: Option<HealthState>,
    pub restart_count: u32,
    pub labels: HashMap<String, String>,
}

#[derive(Default)]
struct RuntimeState {
    next_id: u32,
    containers: Vec<FakeContainer>,
    images: HashSet<String>,
    logs: HashMap<String, Vec<String>>,
    created: u32,
    stop_signals: Vec<Option<String>>,
    exit_on_start: HashSet<String>,
    fail_pull: bool,
}

/// Container runtime kept entirely in memory.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image(&self, reference: &str) {
        self.state.lock().images.insert(reference.to_string());
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.state.lock().images.contains(reference)
    }

    pub fn fail_pulls(&self) {
        self.state.lock().fail_pull = true;
    }

    /// Containers created from `image` exit as soon as they are started.
    pub fn crash_on_start(&self, image: &str) {
        self.state.lock().exit_on_start.insert(image.to_string());
    }

    /// Log lines returned for every container created from now on.
    pub fn set_logs(&self, name: &str, lines: &[&str]) {
        self.state
            .lock()
            .logs
            .insert(name.to_string(), lines.iter().map(|s| s.to_string()).collect());
    }

    pub fn containers(&self) -> Vec<FakeContainer> {
        self.state.lock().containers.clone()
    }

    pub fn running(&self) -> Vec<FakeContainer> {
        self.containers()
            .into_iter()
            .filter(|c| c.state == ContainerState::Running)
            .collect()
    }

    pub fn created_count(&self) -> u32 {
        self.state.lock().created
    }

    pub fn stop_signals(&self) -> Vec<Option<String>> {
        self.state.lock().stop_signals.clone()
    }

    /// Place a running container directly, bypassing the pipeline.
    pub fn insert_running(&self, name: &str, labels: &[(&str, &str)]) -> ContainerId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = ContainerId::new(format!("manual{:04}", state.next_id));
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: name.to_string(),
            image: "manual".to_string(),
            state: ContainerState::Running,
            health: None,
            restart_count: 0,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        id
    }

    /// Force a container into `state`, as if it crashed or was stopped by hand.
    pub fn set_state(&self, id: &ContainerId, new_state: ContainerState) {
        if let Some(c) = self.state.lock().containers.iter_mut().find(|c| &c.id == id) {
            c.state = new_state;
        }
    }

    pub fn set_health(&self, name: &str, health: HealthState, restarts: u32) {
        for c in self.state.lock().containers.iter_mut().filter(|c| c.name == name) {
            c.health = Some(health);
            c.restart_count = restarts;
        }
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        if state.containers.iter().any(|c| c.name == config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }
        state.next_id += 1;
        state.created += 1;
        let id = ContainerId::new(format!("{:012x}", state.next_id));
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: config.name.clone(),
            image: config.image.to_string(),
            state: ContainerState::Created,
            health: None,
            restart_count: 0,
            labels: config.labels.clone(),
        });
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let crashes = state.exit_on_start.clone();
        let container = state
            .containers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        container.state = if crashes.contains(&container.image) {
            ContainerState::Exited
        } else {
            ContainerState::Running
        };
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
        signal: Option<&str>,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        state.stop_signals.push(signal.map(str::to_string));
        let container = state
            .containers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        container.state = ContainerState::Exited;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let before = state.containers.len();
        state.containers.retain(|c| &c.id != id);
        if state.containers.len() == before {
            return Err(ContainerError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let state = self.state.lock();
        let c = state
            .containers
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        Ok(ContainerInfo {
            id: c.id.clone(),
            name: c.name.clone(),
            image: c.image.clone(),
            state: c.state,
            health: c.health,
            restart_count: c.restart_count,
            started_at: Some(Utc::now()),
            labels: c.labels.clone(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        Ok(self
            .state
            .lock()
            .containers
            .iter()
            .filter(|c| filters.matches(&c.labels))
            .filter(|c| filters.all || c.state == ContainerState::Running)
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                state: c.state,
                labels: c.labels.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        if state.fail_pull {
            return Err(ImageError::PullFailed(reference.to_string()));
        }
        state.images.insert(reference.to_string());
        Ok(())
    }

    async fn image_id(&self, reference: &ImageRef) -> Result<Option<ImageId>, ImageError> {
        let name = reference.to_string();
        Ok(self
            .state
            .lock()
            .images
            .contains(&name)
            .then(|| ImageId::new(format!("sha256:{}", name.len()))))
    }
}

#[async_trait]
impl LogOps for FakeRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        _opts: &LogOptions,
    ) -> Result<LogLineStream, LogError> {
        let state = self.state.lock();
        let container = state
            .containers
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| LogError::ContainerNotFound(id.to_string()))?;
        let lines = state.logs.get(&container.name).cloned().unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(lines.into_iter().map(
            |content| {
                Ok(LogLine {
                    content,
                    stream: LogStream::Stdout,
                })
            },
        ))))
    }
}

/// Proxy admin API holding a single upstream list.
#[derive(Default)]
pub struct FakeProxy {
    upstreams: Mutex<Vec<Upstream>>,
    switches: Mutex<u32>,
    reject_writes: Mutex<bool>,
}

impl FakeProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dials(&self) -> Vec<String> {
        self.upstreams.lock().iter().map(|u| u.dial.clone()).collect()
    }

    pub fn point_at(&self, dial: &str) {
        *self.upstreams.lock() = vec![Upstream::new(dial)];
    }

    pub fn switches(&self) -> u32 {
        *self.switches.lock()
    }

    pub fn reject_writes(&self) {
        *self.reject_writes.lock() = true;
    }
}

#[async_trait]
impl ProxyAdmin for FakeProxy {
    async fn upstreams(&self) -> Result<Vec<Upstream>, ProxyError> {
        Ok(self.upstreams.lock().clone())
    }

    async fn set_upstreams(&self, upstreams: &[Upstream]) -> Result<(), ProxyError> {
        if *self.reject_writes.lock() {
            return Err(ProxyError::Rejected {
                method: "PATCH",
                path: "/upstreams".to_string(),
                status: 500,
                body: "admin API disabled".to_string(),
            });
        }
        *self.upstreams.lock() = upstreams.to_vec();
        *self.switches.lock() += 1;
        Ok(())
    }
}

/// Version control with a movable HEAD and an in-memory tag table.
pub struct FakeVcs {
    head: Mutex<CommitHash>,
    dirty: Mutex<Vec<PathBuf>>,
    tags: Mutex<HashMap<String, ReleaseTag>>,
}

impl FakeVcs {
    pub fn at(commit: &str) -> Self {
        Self {
            head: Mutex::new(commit_hash(commit)),
            dirty: Mutex::new(Vec::new()),
            tags: Mutex::new(HashMap::new()),
        }
    }

    pub fn checkout(&self, commit: &str) {
        *self.head.lock() = commit_hash(commit);
    }

    pub fn tag(&self, name: &str, commit: &str) {
        let name = TagName::parse(name).unwrap();
        self.tags.lock().insert(
            name.to_string(),
            ReleaseTag {
                name,
                commit: commit_hash(commit),
                message: "release".to_string(),
                creator: "ci".to_string(),
                created_at: Utc::now(),
            },
        );
    }

    pub fn set_dirty(&self, paths: &[&str]) {
        *self.dirty.lock() = paths.iter().map(PathBuf::from).collect();
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn head_commit(&self) -> Result<CommitHash, VcsError> {
        Ok(self.head.lock().clone())
    }

    async fn uncommitted_paths(&self) -> Result<Vec<PathBuf>, VcsError> {
        Ok(self.dirty.lock().clone())
    }

    async fn read_tag(&self, tag: &TagName) -> Result<Option<ReleaseTag>, VcsError> {
        Ok(self.tags.lock().get(tag.as_str()).cloned())
    }

    async fn write_tag(
        &self,
        tag: &TagName,
        commit: &CommitHash,
        message: &str,
    ) -> Result<(), VcsError> {
        self.tags.lock().insert(
            tag.to_string(),
            ReleaseTag {
                name: tag.clone(),
                commit: commit.clone(),
                message: message.to_string(),
                creator: "test".to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }
}

pub fn commit_hash(commit: &str) -> CommitHash {
    CommitHash::new(commit).unwrap()
}
