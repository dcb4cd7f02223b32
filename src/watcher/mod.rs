// ABOUTME: Docker watcher: schedules scans, resolves every watched container against its registry
// ABOUTME: and reconciles the results with the container store, emitting one report per container.

mod candidates;
mod config;
mod error;
pub mod labels;
mod schedule;

pub use candidates::select_candidates;
pub use config::{DEFAULT_CRON, WatcherConfig};
pub use error::WatcherError;
pub use schedule::ScanSchedule;

use crate::event::EventBus;
use crate::model::{
    Container, ContainerReport, ContainerResult, ErrorDetail, Image, ImageDigest, ImageRegistry,
    ImageTag, UNKNOWN_REGISTRY,
};
use crate::registry::{RegistryError, RegistrySet};
use crate::runtime::{
    BollardRuntime, ContainerEvent, ContainerFilters, ContainerSummary, DaemonVersion,
    RuntimeError, RuntimeErrorKind, WatchRuntime,
};
use crate::store::{ContainerQuery, ContainerStore};
use crate::tag;
use crate::types::{ImageId, ImageReference};
use futures::StreamExt;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Watcher type; the first half of a watcher id.
pub const WATCHER_KIND: &str = "docker";

/// Tag assumed when an image reference carries none.
const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Initializing,
    Idle,
    Scanning,
    Deregistering,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WatcherState::Stopped => "stopped",
            WatcherState::Initializing => "initializing",
            WatcherState::Idle => "idle",
            WatcherState::Scanning => "scanning",
            WatcherState::Deregistering => "deregistering",
        })
    }
}

/// What started a scheduled scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    Cron,
    Startup,
    Event,
}

impl fmt::Display for ScanTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScanTrigger::Cron => "cron",
            ScanTrigger::Startup => "startup",
            ScanTrigger::Event => "event",
        })
    }
}

/// One monitored container runtime and its scan schedule.
pub struct Watcher {
    name: String,
    config: WatcherConfig,
    schedule: ScanSchedule,
    runtime: Arc<dyn WatchRuntime>,
    registries: Arc<RegistrySet>,
    store: Arc<dyn ContainerStore>,
    events: EventBus,
    /// Held by scheduled scans only.
    scan_lock: tokio::sync::Mutex<()>,
    state: Mutex<WatcherState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    retired: AtomicBool,
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    pub fn new(
        name: &str,
        config: WatcherConfig,
        runtime: Arc<dyn WatchRuntime>,
        registries: Arc<RegistrySet>,
        store: Arc<dyn ContainerStore>,
        events: EventBus,
    ) -> Result<Self, WatcherError> {
        let schedule = ScanSchedule::parse(&config.cron)?;
        Ok(Self {
            name: name.to_string(),
            config,
            schedule,
            runtime,
            registries,
            store,
            events,
            scan_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(WatcherState::Stopped),
            tasks: Mutex::new(Vec::new()),
            retired: AtomicBool::new(false),
        })
    }

    /// Watcher talking to the runtime its configuration points at.
    pub fn connect(
        name: &str,
        config: WatcherConfig,
        registries: Arc<RegistrySet>,
        store: Arc<dyn ContainerStore>,
        events: EventBus,
    ) -> Result<Self, WatcherError> {
        let endpoint = config.endpoint()?;
        let runtime = BollardRuntime::connect(&endpoint)?;
        tracing::debug!(watcher = %name, %endpoint, "runtime client created");
        Self::new(name, config, Arc::new(runtime), registries, store, events)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `docker.<name>`.
    pub fn id(&self) -> String {
        format!("{WATCHER_KIND}.{}", self.name)
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn state(&self) -> WatcherState {
        *self.state.lock()
    }

    pub fn runtime(&self) -> &Arc<dyn WatchRuntime> {
        &self.runtime
    }

    fn set_state(&self, state: WatcherState) -> WatcherState {
        std::mem::replace(&mut *self.state.lock(), state)
    }

    /// Start the cron schedule, the optional startup scan and the event listener.
    pub fn start(self: &Arc<Self>) {
        if self.state() != WatcherState::Stopped {
            tracing::warn!(watcher = %self.id(), state = %self.state(), "watcher already started");
            return;
        }
        self.set_state(WatcherState::Initializing);
        self.retired.store(false, Ordering::SeqCst);
        tracing::info!(
            watcher = %self.id(),
            cron = %self.schedule.expression(),
            "Cron scheduled"
        );

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(Arc::clone(self).log_probe()));
        tasks.push(tokio::spawn(Arc::clone(self).run_schedule()));

        let store_empty = self
            .store
            .get_containers(&ContainerQuery::watcher(&self.name))
            .is_empty();
        if self.config.watchatstart || store_empty {
            let watcher = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                tokio::time::sleep(watcher.config.startdelay).await;
                watcher.watch_from_schedule(ScanTrigger::Startup).await;
            }));
        }

        if self.config.watchevents {
            let watcher = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                tokio::time::sleep(watcher.config.startdelay).await;
                watcher.listen_events().await;
            }));
        }
        drop(tasks);
        self.set_state(WatcherState::Idle);
    }

    /// Stop scheduling scans.
    ///
    /// Pending timers and the event listener are cancelled; a scan already in
    /// flight runs to completion but its results are neither stored nor published.
    pub fn deregister(&self) {
        self.set_state(WatcherState::Deregistering);
        self.retired.store(true, Ordering::SeqCst);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        tracing::info!(watcher = %self.id(), "watcher deregistered");
        self.set_state(WatcherState::Stopped);
    }

    /// Ask the daemon for its version.
    pub async fn probe(&self) -> Result<DaemonVersion, RuntimeError> {
        self.runtime
            .version()
            .await
            .map_err(|source| RuntimeError::Probe {
                endpoint: self.endpoint_label(),
                source,
            })
    }

    fn endpoint_label(&self) -> String {
        self.config
            .endpoint()
            .map(|endpoint| endpoint.to_string())
            .unwrap_or_else(|_| self.id())
    }

    async fn log_probe(self: Arc<Self>) {
        match self.probe().await {
            Ok(version) => {
                tracing::info!(watcher = %self.id(), daemon = %version, "runtime reachable");
            }
            Err(e) if e.kind() == RuntimeErrorKind::Unreachable => {
                tracing::warn!(watcher = %self.id(), "runtime unreachable, scans will fail until it is back ({e})");
            }
            Err(e) => tracing::warn!(watcher = %self.id(), "{e}"),
        }
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    async fn run_schedule(self: Arc<Self>) {
        loop {
            let Some(delay) = self.schedule.until_next() else {
                tracing::warn!(watcher = %self.id(), cron = %self.schedule.expression(), "cron expression never fires again");
                return;
            };
            tokio::time::sleep(delay).await;
            self.watch_from_schedule(ScanTrigger::Cron).await;
        }
    }

    /// Scheduled scan; skipped when another scheduled scan is still running.
    pub async fn watch_from_schedule(&self, trigger: ScanTrigger) -> Option<Vec<ContainerReport>> {
        let Ok(_guard) = self.scan_lock.try_lock() else {
            tracing::warn!(watcher = %self.id(), %trigger, "previous scan still running; skipping this one");
            return None;
        };
        tracing::info!(watcher = %self.id(), %trigger, "Cron started ({})", self.schedule.expression());

        let reports = self.watch().await;
        let errors = reports
            .iter()
            .filter(|r| r.container.error.is_some())
            .count();
        let updates = reports
            .iter()
            .filter(|r| r.container.update_available())
            .count();
        tracing::info!(
            watcher = %self.id(),
            "Cron finished ({} containers watched, {errors} errors, {updates} available updates)",
            reports.len()
        );
        Some(reports)
    }

    /// Scan every watched container once and return one report per container.
    ///
    /// Listing failures are logged and yield no reports; per-container
    /// failures end up in that container's `error`.
    pub async fn watch(&self) -> Vec<ContainerReport> {
        let id = self.id();
        let previous = self.set_state(WatcherState::Scanning);
        self.events.watcher_start(&id);

        let containers = match self.get_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                tracing::warn!(watcher = %id, "Error when trying to get the list of the containers to watch ({e})");
                Vec::new()
            }
        };

        let reports = join_all(containers.into_iter().map(|c| self.watch_container(c))).await;

        if !self.is_retired() {
            self.events.container_reports(&reports);
        }
        self.events.watcher_stop(&id);

        let mut state = self.state.lock();
        if *state == WatcherState::Scanning {
            *state = previous;
        }
        reports
    }

    /// Look up the newest version of one container and record the outcome.
    pub async fn watch_container(&self, mut container: Container) -> ContainerReport {
        let full_name = container.full_name();
        container.result = None;
        container.error = None;
        tracing::debug!(container = %full_name, "Start watching");

        match self.find_new_version(&mut container).await {
            Ok(result) => container.result = Some(result),
            Err(e) => {
                tracing::warn!(container = %full_name, "Error when processing ({e})");
                container.error = Some(ErrorDetail {
                    message: e.to_string(),
                });
            }
        }

        if self.is_retired() {
            tracing::debug!(container = %full_name, "watcher deregistered during scan; discarding result");
            return ContainerReport {
                container,
                changed: false,
            };
        }
        let report = self.map_to_report(container);
        self.events.container_report(&report);
        report
    }

    /// Newest tag and remote digest for `container`.
    ///
    /// When digest watching is on, the local digest on `container.image` is
    /// refreshed too: from the registry for v2 manifests, from the local image
    /// id for manifests that resolve to a config digest.
    pub async fn find_new_version(&self, container: &mut Container) -> Result<ContainerResult, WatcherError> {
        let registry_name = container.image.registry.name.clone();
        let registry = self
            .registries
            .get(&registry_name)
            .ok_or(RegistryError::Unsupported(registry_name))?;

        let mut result = ContainerResult {
            tag: Some(container.image.tag.value.clone()),
            ..Default::default()
        };

        let tags = registry.get_tags(&container.image).await?;
        let candidates = select_candidates(container, &tags)?;
        tracing::debug!(container = %container.full_name(), ?candidates, "tag candidates");

        if container.image.digest.watch_enabled
            && let Some(repo_digest) = container.image.digest.repo_digest.clone()
        {
            // With a newer tag available, compare against that tag's digest.
            let mut lookup = container.image.clone();
            if let Some(candidate) = candidates.first() {
                lookup.tag.value = candidate.clone();
            }

            let remote = registry.get_image_manifest_digest(&lookup, None).await?;
            result.digest = remote.digest;

            container.image.digest.value = if remote.version == 2 {
                registry
                    .get_image_manifest_digest(&lookup, Some(&repo_digest))
                    .await?
                    .digest
            } else {
                // The image id is the digest of its config.
                Some(container.image.id.as_str().to_string()).filter(|id| !id.is_empty())
            };
        }

        if let Some(candidate) = candidates.into_iter().next() {
            result.tag = Some(candidate);
        }
        Ok(result)
    }

    /// Watched containers of the runtime, built from the store when already known.
    ///
    /// Stored containers of this watcher that are no longer listed are deleted.
    pub async fn get_containers(&self) -> Result<Vec<Container>, WatcherError> {
        let filters = ContainerFilters {
            all: self.config.watchall,
            ..Default::default()
        };
        let summaries: Vec<ContainerSummary> = self
            .runtime
            .list_containers(&filters)
            .await?
            .into_iter()
            .filter(|summary| {
                labels::is_container_to_watch(
                    labels::get(&summary.labels, labels::WATCH),
                    self.config.watchbydefault,
                )
            })
            .collect();

        let built = join_all(summaries.into_iter().map(|summary| async move {
            let id = summary.id.clone();
            (id, self.build_container(summary).await)
        }))
        .await;

        let mut containers = Vec::new();
        // Containers that failed to build stay in the store until they can be rebuilt.
        let mut keep = HashSet::new();
        for (id, outcome) in built {
            match outcome {
                Ok(Some(container)) => {
                    keep.insert(id);
                    containers.push(container);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(watcher = %self.id(), container_id = %id, "cannot inspect container image ({e})");
                    keep.insert(id);
                }
            }
        }

        if !self.is_retired() {
            self.prune(&keep);
        }
        Ok(containers)
    }

    fn prune(&self, keep: &HashSet<crate::types::ContainerId>) {
        for stale in self
            .store
            .get_containers(&ContainerQuery::watcher(&self.name))
            .into_iter()
            .filter(|c| !keep.contains(&c.id))
        {
            tracing::info!(container = %stale.full_name(), "container no longer present; removing it");
            self.store.delete_container(&stale.id);
        }
    }

    /// Container record for one listed container; `None` when it cannot be tracked.
    async fn build_container(&self, summary: ContainerSummary) -> Result<Option<Container>, WatcherError> {
        if let Some(stored) = self.store.get_container(&summary.id)
            && stored.error.is_none()
        {
            tracing::debug!(container = %stored.full_name(), "Container already in store");
            return Ok(Some(stored));
        }

        let details = self.runtime.inspect_image(&summary.image).await?;

        let reference = if summary.image.contains("sha256:") {
            match details.repo_tags.first() {
                Some(repo_tag) => repo_tag.clone(),
                None => {
                    tracing::warn!(watcher = %self.id(), image = %summary.image, "Cannot get a reliable tag for this image");
                    return Ok(None);
                }
            }
        } else {
            summary.image.clone()
        };
        let parsed = ImageReference::parse(&reference).map_err(|source| {
            WatcherError::ImageReference {
                reference: reference.clone(),
                source,
            }
        })?;

        let label = |name: &str| labels::get(&summary.labels, name).map(str::to_string);
        let transform_tags = label(labels::TAG_TRANSFORM);
        let tag_name = parsed.tag().unwrap_or(DEFAULT_TAG).to_string();
        let is_semver = tag::parse(&tag::transform(transform_tags.as_deref(), &tag_name)).is_some();
        let watch_digest = labels::is_digest_to_watch(
            labels::get(&summary.labels, labels::WATCH_DIGEST),
            is_semver,
        );
        if !is_semver && !watch_digest {
            tracing::warn!(
                watcher = %self.id(),
                container = %summary.name,
                "Image is not a semver and digest watching is disabled so no update will be reported; \
                 enable digest watching for this container or exclude it from being watched"
            );
        }

        let image = self.registries.normalize(Image {
            id: ImageId::new(details.id.clone()),
            registry: ImageRegistry {
                name: UNKNOWN_REGISTRY.to_string(),
                url: parsed.domain().unwrap_or_default().to_string(),
            },
            name: parsed.path().to_string(),
            tag: ImageTag {
                value: tag_name.clone(),
                is_semver,
            },
            digest: ImageDigest {
                watch_enabled: watch_digest,
                value: None,
                repo_digest: details.repo_digest().map(str::to_string),
            },
            architecture: details.architecture.clone(),
            os: details.os.clone(),
            variant: details.variant.clone(),
            created_at: details.created.clone(),
        });
        if image.registry.name == UNKNOWN_REGISTRY {
            tracing::warn!(
                container = %summary.name,
                registry_url = %image.registry.url,
                "no registry provider matches this image"
            );
        }

        let container = Container {
            id: summary.id.clone(),
            name: summary.name.clone(),
            display_name: label(labels::DISPLAY_NAME).unwrap_or_default(),
            display_icon: label(labels::DISPLAY_ICON).unwrap_or_default(),
            status: summary.state.clone(),
            watcher: self.name.clone(),
            include_tags: label(labels::TAG_INCLUDE),
            exclude_tags: label(labels::TAG_EXCLUDE),
            transform_tags,
            link_template: label(labels::LINK_TEMPLATE),
            trigger_include: label(labels::TRIGGER_INCLUDE),
            trigger_exclude: label(labels::TRIGGER_EXCLUDE),
            image,
            result: Some(ContainerResult {
                tag: Some(tag_name),
                ..Default::default()
            }),
            error: None,
            labels: summary.labels.into_iter().collect(),
        };
        Ok(Some(container))
    }

    /// Store the scanned container and decide whether it is a change worth reporting.
    fn map_to_report(&self, container: Container) -> ContainerReport {
        let full_name = container.full_name();
        let previous = self.store.get_container(&container.id);

        let (outcome, changed_from) = match previous {
            None => {
                tracing::debug!(container = %full_name, "Container watched for the first time");
                (self.store.insert_container(container.clone()), None)
            }
            Some(previous) => (self.store.update_container(container.clone()), Some(previous)),
        };

        match outcome {
            Ok(stored) => {
                let changed = match changed_from {
                    None => true,
                    Some(ref previous) => {
                        stored.result_changed(Some(previous)) && stored.update_available()
                    }
                };
                ContainerReport {
                    container: stored,
                    changed,
                }
            }
            Err(e) => {
                tracing::warn!(container = %full_name, "cannot store container ({e})");
                let mut container = container;
                container.error = Some(ErrorDetail {
                    message: e.to_string(),
                });
                ContainerReport {
                    container,
                    changed: false,
                }
            }
        }
    }

    async fn listen_events(self: Arc<Self>) {
        tracing::debug!(watcher = %self.id(), "listening to container events");
        let mut stream = match self.runtime.container_events().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(watcher = %self.id(), "Unable to listen to container events ({e})");
                return;
            }
        };

        let mut deadline: Option<Instant> = None;
        loop {
            let pending = deadline;
            let debounce = async move {
                match pending {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                next = stream.next() => match next {
                    Some(Ok(event)) if event.is_structural() => {
                        tracing::debug!(watcher = %self.id(), action = %event.action, container_id = %event.container_id, "container set changed");
                        deadline = Some(Instant::now() + self.config.debounce);
                    }
                    Some(Ok(event)) => self.on_container_event(&event).await,
                    Some(Err(e)) => {
                        tracing::warn!(watcher = %self.id(), "container event stream failed ({e})");
                        break;
                    }
                    None => {
                        tracing::debug!(watcher = %self.id(), "container event stream closed");
                        break;
                    }
                },
                () = debounce => {
                    deadline = None;
                    let watcher = Arc::clone(&self);
                    tokio::spawn(async move {
                        watcher.watch_from_schedule(ScanTrigger::Event).await;
                    });
                }
            }
        }
    }

    /// Refresh the stored status of a container after a state transition.
    pub async fn on_container_event(&self, event: &ContainerEvent) {
        let details = match self.runtime.inspect_container(&event.container_id).await {
            Ok(details) => details,
            Err(e) => {
                tracing::debug!(watcher = %self.id(), container_id = event.container_id.short(), "Unable to get container details ({e})");
                return;
            }
        };
        let Some(mut stored) = self.store.get_container(&event.container_id) else {
            return;
        };
        if stored.status == details.status {
            return;
        }
        let old_status = std::mem::replace(&mut stored.status, details.status);
        let full_name = stored.full_name();
        let new_status = stored.status.clone();
        match self.store.update_container(stored) {
            Ok(_) => {
                tracing::info!(container = %full_name, "Status changed from {old_status} to {new_status}");
            }
            Err(e) => tracing::warn!(container = %full_name, "cannot update container status ({e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::model::{UpdateKindType, fixtures};
    use crate::registry::fixture::FixtureTransport;
    use crate::registry::{Method, RegistryClient, RegistryResponse, create_registry};
    use crate::runtime::ImageDetails;
    use crate::runtime::fake::FakeRuntime;
    use crate::store::MemoryStore;
    use crate::tag::SemverDiff;
    use crate::types::ContainerId;
    use std::time::Duration;

    const TAGS_URL: &str = "https://registry.test/v2/org/app/tags/list?n=1000";
    const MANIFEST_URL: &str = "https://registry.test/v2/org/app/manifests";
    const LIST_TYPE: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
    const MANIFEST_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

    struct Harness {
        runtime: Arc<FakeRuntime>,
        transport: Arc<FixtureTransport>,
        store: Arc<MemoryStore>,
        events: EventBus,
        watcher: Arc<Watcher>,
    }

    fn harness(config: WatcherConfig) -> Harness {
        let runtime = Arc::new(FakeRuntime::new());
        let transport = Arc::new(FixtureTransport::new());
        let registries = Arc::new(RegistrySet::new());
        let client = RegistryClient::new(transport.clone());
        let value = serde_yaml::from_str("url: https://registry.test").unwrap();
        registries.register(create_registry("custom", "test", &value, client).unwrap());
        let events = EventBus::new();
        let store = Arc::new(MemoryStore::new(events.clone()));
        let watcher = Arc::new(
            Watcher::new(
                "local",
                config,
                runtime.clone(),
                registries,
                store.clone(),
                events.clone(),
            )
            .unwrap(),
        );
        Harness {
            runtime,
            transport,
            store,
            events,
            watcher,
        }
    }

    fn image(id: &str, repo_digest: Option<&str>) -> ImageDetails {
        ImageDetails {
            id: id.to_string(),
            repo_tags: vec!["registry.test/org/app:1.0.0".to_string()],
            repo_digests: repo_digest
                .map(|d| vec![format!("registry.test/org/app@{d}")])
                .unwrap_or_default(),
            architecture: "amd64".to_string(),
            os: "linux".to_string(),
            variant: None,
            created: Some("2024-03-01T10:00:00.123456789Z".to_string()),
        }
    }

    fn tags(list: &[&str]) -> serde_json::Value {
        serde_json::json!({ "name": "org/app", "tags": list })
    }

    fn manifest_list(platform_digest: &str) -> RegistryResponse {
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": LIST_TYPE,
            "manifests": [
                {"mediaType": MANIFEST_TYPE, "digest": platform_digest, "platform": {"architecture": "amd64", "os": "linux"}},
                {"mediaType": MANIFEST_TYPE, "digest": "sha256:arm", "platform": {"architecture": "arm", "os": "linux", "variant": "v7"}}
            ]
        });
        RegistryResponse::new(200).with_body(body.to_string())
    }

    fn semver_app(h: &Harness) {
        h.runtime
            .add_container("c1", "app", "registry.test/org/app:1.0.0", &[]);
        h.runtime
            .add_image("registry.test/org/app:1.0.0", image("sha256:img1", None));
        h.transport.on_json(TAGS_URL, tags(&["1.0.0", "1.1.0", "2.0.0"]));
    }

    #[tokio::test]
    async fn first_scan_reports_a_major_update() {
        let h = harness(WatcherConfig::default());
        semver_app(&h);
        let mut rx = h.events.subscribe();

        let reports = h.watcher.watch().await;

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert!(report.changed);
        let container = &report.container;
        assert_eq!(container.watcher, "local");
        assert_eq!(container.image.registry.name, "custom.test");
        assert_eq!(container.image.registry.url, "https://registry.test/v2");
        assert_eq!(container.image.name, "org/app");
        assert_eq!(container.result.as_ref().unwrap().tag.as_deref(), Some("2.0.0"));
        assert!(container.error.is_none());
        assert!(container.update_available());
        let kind = container.update_kind();
        assert_eq!(kind.kind, UpdateKindType::Tag);
        assert_eq!(kind.semver_diff, Some(SemverDiff::Major));

        let names: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "watcher-start",
                "container-added",
                "container-report",
                "container-reports",
                "watcher-stop"
            ]
        );
        assert_eq!(h.watcher.state(), WatcherState::Stopped);
    }

    #[tokio::test]
    async fn unchanged_remote_is_not_reported_as_changed() {
        let h = harness(WatcherConfig::default());
        semver_app(&h);

        assert!(h.watcher.watch().await[0].changed);
        let second = h.watcher.watch().await;

        assert_eq!(second.len(), 1);
        assert!(!second[0].changed);
        assert!(second[0].container.update_available());
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn new_remote_tag_is_reported_once() {
        let h = harness(WatcherConfig::default());
        semver_app(&h);
        h.watcher.watch().await;

        h.transport
            .on_json(TAGS_URL, tags(&["1.0.0", "1.1.0", "2.0.0", "2.1.0"]));
        let report = h.watcher.watch().await.remove(0);
        assert!(report.changed);
        assert_eq!(
            report.container.result.unwrap().tag.as_deref(),
            Some("2.1.0")
        );
        assert!(!h.watcher.watch().await[0].changed);
    }

    #[tokio::test]
    async fn vanished_containers_are_removed_once() {
        let h = harness(WatcherConfig::default());
        semver_app(&h);
        h.watcher.watch().await;
        let mut rx = h.events.subscribe();

        h.runtime.remove_container("c1");
        assert!(h.watcher.watch().await.is_empty());
        assert!(h.watcher.watch().await.is_empty());

        assert!(h.store.is_empty());
        let removals = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|event| matches!(event, Event::ContainerRemoved(_)))
            .count();
        assert_eq!(removals, 1);
    }

    #[tokio::test]
    async fn listing_failure_yields_no_reports() {
        let h = harness(WatcherConfig::default());
        semver_app(&h);
        h.watcher.watch().await;

        *h.runtime.fail_listing.lock() = true;
        assert!(h.watcher.watch().await.is_empty());
        // Nothing is pruned when the runtime cannot be listed.
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn registry_failures_are_kept_on_the_container() {
        let h = harness(WatcherConfig::default());
        h.runtime
            .add_container("c1", "app", "registry.test/org/app:1.0.0", &[]);
        h.runtime
            .add_image("registry.test/org/app:1.0.0", image("sha256:img1", None));

        let report = h.watcher.watch().await.remove(0);
        let message = report.container.error.unwrap().message;
        assert!(message.contains("HTTP 404"), "{message}");
        assert!(report.container.result.is_none());

        // The failed container is rebuilt and the error cleared once the registry answers.
        h.transport.on_json(TAGS_URL, tags(&["1.0.0", "1.0.1"]));
        let report = h.watcher.watch().await.remove(0);
        assert!(report.container.error.is_none());
        assert!(report.changed);
        assert_eq!(report.container.update_kind().semver_diff, Some(SemverDiff::Patch));
    }

    #[tokio::test]
    async fn unknown_registries_are_reported_per_container() {
        let h = harness(WatcherConfig::default());
        h.runtime
            .add_container("c1", "db", "quay.example/org/db:1.0.0", &[]);
        h.runtime
            .add_image("quay.example/org/db:1.0.0", image("sha256:img1", None));

        let report = h.watcher.watch().await.remove(0);
        assert_eq!(report.container.image.registry.name, UNKNOWN_REGISTRY);
        assert_eq!(
            report.container.error.unwrap().message,
            "Unsupported Registry unknown"
        );
    }

    #[tokio::test]
    async fn digest_watch_compares_platform_digests() {
        let h = harness(WatcherConfig::default());
        h.runtime
            .add_container("c1", "app", "registry.test/org/app:latest", &[]);
        h.runtime.add_image(
            "registry.test/org/app:latest",
            image("sha256:img1", Some("sha256:local-list")),
        );
        h.transport.on_json(TAGS_URL, tags(&["latest", "1.0.0"]));
        h.transport
            .on(Method::Get, &format!("{MANIFEST_URL}/latest"), manifest_list("sha256:new-amd64"));
        h.transport.on(
            Method::Head,
            &format!("{MANIFEST_URL}/sha256:new-amd64"),
            RegistryResponse::new(200).with_header("Docker-Content-Digest", "sha256:remote"),
        );
        h.transport.on(
            Method::Get,
            &format!("{MANIFEST_URL}/sha256:local-list"),
            manifest_list("sha256:old-amd64"),
        );
        h.transport.on(
            Method::Head,
            &format!("{MANIFEST_URL}/sha256:old-amd64"),
            RegistryResponse::new(200).with_header("Docker-Content-Digest", "sha256:running"),
        );

        let report = h.watcher.watch().await.remove(0);
        let container = report.container;
        assert!(container.error.is_none(), "{:?}", container.error);
        assert!(container.image.digest.watch_enabled);
        assert!(!container.image.tag.is_semver);
        assert_eq!(container.image.digest.value.as_deref(), Some("sha256:running"));
        let result = container.result.as_ref().unwrap();
        assert_eq!(result.tag.as_deref(), Some("latest"));
        assert_eq!(result.digest.as_deref(), Some("sha256:remote"));
        assert!(container.update_available());
        assert_eq!(container.update_kind().kind, UpdateKindType::Digest);
    }

    #[tokio::test]
    async fn single_manifests_compare_the_config_digest_with_the_image_id() {
        let h = harness(WatcherConfig::default());
        h.runtime
            .add_container("c1", "app", "registry.test/org/app:latest", &[]);
        h.runtime.add_image(
            "registry.test/org/app:latest",
            image("sha256:old", Some("sha256:local-manifest")),
        );
        h.transport.on_json(TAGS_URL, tags(&["latest"]));
        let single = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": MANIFEST_TYPE,
            "config": {"mediaType": "application/vnd.docker.container.image.v1+json", "digest": "sha256:new"}
        });
        h.transport.on_json(&format!("{MANIFEST_URL}/latest"), single);

        let container = h.watcher.watch().await.remove(0).container;

        assert!(container.error.is_none(), "{:?}", container.error);
        assert_eq!(container.image.digest.value.as_deref(), Some("sha256:old"));
        assert_eq!(
            container.result.as_ref().unwrap().digest.as_deref(),
            Some("sha256:new")
        );
        assert!(container.update_available());
        assert_eq!(container.update_kind().kind, UpdateKindType::Digest);
        // The local side needs no second manifest lookup.
        assert!(
            h.transport
                .requests()
                .iter()
                .all(|r| !r.url.ends_with("sha256:local-manifest"))
        );
    }

    #[tokio::test]
    async fn bare_image_ids_fall_back_to_repo_tags() {
        let h = harness(WatcherConfig::default());
        semver_app(&h);
        h.runtime.add_container("c2", "orphan", "sha256:deadbeef", &[]);
        h.runtime.add_image(
            "sha256:deadbeef",
            ImageDetails {
                repo_tags: Vec::new(),
                ..image("sha256:deadbeef", None)
            },
        );
        h.runtime.add_container("c3", "pinned", "sha256:cafe", &[]);
        h.runtime.add_image("sha256:cafe", image("sha256:cafe", None));

        let reports = h.watcher.watch().await;
        let mut names: Vec<&str> = reports.iter().map(|r| r.container.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["app", "pinned"]);
        let pinned = reports.iter().find(|r| r.container.name == "pinned").unwrap();
        assert_eq!(pinned.container.image.tag.value, "1.0.0");
    }

    #[tokio::test]
    async fn labels_select_and_shape_containers() {
        let h = harness(WatcherConfig {
            watchbydefault: false,
            ..Default::default()
        });
        h.runtime.add_container(
            "c1",
            "app",
            "registry.test/org/app:1.0.0",
            &[
                (labels::WATCH, "true"),
                (labels::TAG_INCLUDE, r"^1\."),
                (labels::DISPLAY_NAME, "My App"),
            ],
        );
        h.runtime
            .add_container("c2", "ignored", "registry.test/org/app:1.0.0", &[]);
        h.runtime
            .add_image("registry.test/org/app:1.0.0", image("sha256:img1", None));
        h.transport.on_json(TAGS_URL, tags(&["1.0.0", "1.1.0", "2.0.0"]));

        let reports = h.watcher.watch().await;
        assert_eq!(reports.len(), 1);
        let container = &reports[0].container;
        assert_eq!(container.display_name, "My App");
        assert_eq!(container.include_tags.as_deref(), Some(r"^1\."));
        assert_eq!(container.result.as_ref().unwrap().tag.as_deref(), Some("1.1.0"));
        assert_eq!(container.update_kind().semver_diff, Some(SemverDiff::Minor));
    }

    #[tokio::test]
    async fn invalid_tag_filters_are_per_container_errors() {
        let h = harness(WatcherConfig::default());
        h.runtime.add_container(
            "c1",
            "app",
            "registry.test/org/app:1.0.0",
            &[(labels::TAG_INCLUDE, "(")],
        );
        h.runtime
            .add_image("registry.test/org/app:1.0.0", image("sha256:img1", None));
        h.transport.on_json(TAGS_URL, tags(&["1.0.0"]));

        let report = h.watcher.watch().await.remove(0);
        assert!(report.container.error.unwrap().message.contains("invalid tag filter"));
    }

    #[tokio::test]
    async fn status_events_update_only_the_status() {
        let h = harness(WatcherConfig::default());
        semver_app(&h);
        h.watcher.watch().await;
        let requests = h.transport.requests().len();

        h.runtime.set_state("c1", "exited");
        h.watcher
            .on_container_event(&ContainerEvent {
                action: "die".to_string(),
                container_id: ContainerId::new("c1"),
            })
            .await;

        let stored = h.store.get_container(&ContainerId::new("c1")).unwrap();
        assert_eq!(stored.status, "exited");
        assert_eq!(h.transport.requests().len(), requests);
    }

    #[tokio::test]
    async fn overlapping_scheduled_scans_are_skipped() {
        let h = harness(WatcherConfig::default());
        semver_app(&h);

        let guard = h.watcher.scan_lock.lock().await;
        assert!(h.watcher.watch_from_schedule(ScanTrigger::Cron).await.is_none());
        drop(guard);

        let reports = h.watcher.watch_from_schedule(ScanTrigger::Cron).await.unwrap();
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn create_events_trigger_a_debounced_scan() {
        let h = harness(WatcherConfig {
            watchatstart: false,
            debounce: Duration::from_millis(50),
            startdelay: Duration::ZERO,
            ..Default::default()
        });
        semver_app(&h);
        // A stored container keeps the startup scan from running.
        h.store
            .insert_container(fixtures::container("other", "1.0.0"))
            .unwrap();
        let sender = h.runtime.event_sender();
        let mut rx = h.events.subscribe();

        h.watcher.start();
        assert_eq!(h.watcher.state(), WatcherState::Idle);
        for _ in 0..3 {
            sender
                .send(ContainerEvent {
                    action: "create".to_string(),
                    container_id: ContainerId::new("c1"),
                })
                .unwrap();
        }

        let batch = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(Event::ContainerReports(reports)) = rx.recv().await {
                    return reports;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(batch.len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let extra = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|event| matches!(event, Event::WatcherStart { .. }))
            .count();
        assert_eq!(extra, 0, "burst of events must coalesce into one scan");

        h.watcher.deregister();
        assert_eq!(h.watcher.state(), WatcherState::Stopped);
    }

    #[tokio::test]
    async fn startup_scan_runs_when_the_store_is_empty() {
        let h = harness(WatcherConfig {
            watchatstart: false,
            watchevents: false,
            startdelay: Duration::from_millis(10),
            ..Default::default()
        });
        semver_app(&h);
        let mut rx = h.events.subscribe();

        h.watcher.start();
        let started = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(Event::WatcherStop { watcher }) = rx.recv().await {
                    return watcher;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(started, "docker.local");
        assert_eq!(h.store.len(), 1);
        h.watcher.deregister();
    }

    #[test]
    fn invalid_cron_is_rejected_at_construction() {
        let runtime = Arc::new(FakeRuntime::new());
        let events = EventBus::new();
        let result = Watcher::new(
            "local",
            WatcherConfig {
                cron: "not a cron".to_string(),
                ..Default::default()
            },
            runtime,
            Arc::new(RegistrySet::new()),
            Arc::new(MemoryStore::new(events.clone())),
            events,
        );
        assert!(matches!(result, Err(WatcherError::InvalidCron { .. })));
    }

    #[tokio::test]
    async fn probe_reports_the_daemon_version() {
        let h = harness(WatcherConfig::default());
        let version = h.watcher.probe().await.unwrap();
        assert_eq!(version.to_string(), "fake (API 1.45, linux/amd64)");

        *h.runtime.fail_listing.lock() = true;
        let err = h.watcher.probe().await.unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::Unreachable);
        assert!(err.to_string().contains("unix:///var/run/docker.sock"), "got: {err}");
    }
}
