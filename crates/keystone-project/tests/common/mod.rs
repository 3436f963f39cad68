//! In-memory collaborators and a harness over a temporary directory.
//!
//! The fake filesystem answers existence and read queries from the real
//! temporary directory and records every watch-related call.

#![allow(dead_code)]

use async_trait::async_trait;
use keystone_core::config::ManagerConfig;
use keystone_core::error::{KeystoneError, Result};
use keystone_core::lock::ProcessingLock;
use keystone_core::project::{
    ConfigSource, LoadedProjectConfig, ManifestDefinition, ProjectConfig, ProjectConfigMeta,
    ProjectDefinition,
};
use keystone_core::traits::{
    ConfigLoader, FileAllocator, MemoryFs, VcsClient, VcsProvider, WorkerHandle, WorkerPool,
};
use keystone_core::worker::{WorkerKind, WorkerMessage};
use keystone_project::{Collaborators, ProjectManager};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchCall {
    pub directory: PathBuf,
    pub focus: Option<PathBuf>,
    pub partial: bool,
}

#[derive(Default)]
pub struct FakeFs {
    lock: ProcessingLock,
    pub watches: Mutex<Vec<WatchCall>>,
    pub closed: Mutex<Vec<PathBuf>>,
    pub unwatched: Mutex<Vec<PathBuf>>,
    manifests: Mutex<BTreeMap<PathBuf, Arc<ManifestDefinition>>>,
}

impl FakeFs {
    /// Make `def` the owned manifest of every path below its directory.
    pub fn add_manifest(&self, def: Arc<ManifestDefinition>) {
        self.manifests.lock().insert(def.directory.clone(), def);
    }

    pub fn watch_count(&self, directory: &Path) -> usize {
        self.watches
            .lock()
            .iter()
            .filter(|call| call.directory == directory)
            .count()
    }
}

fn walk(directory: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(directory) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, out);
        } else {
            out.push(path);
        }
    }
}

#[async_trait]
impl MemoryFs for FakeFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn exists_hard(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn watch(&self, directory: &Path, focus: Option<&Path>, partial: bool) -> Result<()> {
        self.watches.lock().push(WatchCall {
            directory: directory.to_path_buf(),
            focus: focus.map(Path::to_path_buf),
            partial,
        });
        Ok(())
    }

    fn unwatch(&self, directory: &Path) {
        self.unwatched.lock().push(directory.to_path_buf());
    }

    fn close(&self, directory: &Path) {
        self.closed.lock().push(directory.to_path_buf());
    }

    fn glob(&self, directory: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        walk(directory, &mut paths);
        paths.sort();
        paths
    }

    fn get_owned_manifest(&self, path: &Path) -> Option<Arc<ManifestDefinition>> {
        let manifests = self.manifests.lock();
        path.ancestors().find_map(|dir| manifests.get(dir).cloned())
    }

    fn get_partial_manifest(
        &self,
        def: &ManifestDefinition,
        project: &ProjectDefinition,
    ) -> serde_json::Value {
        json!({"name": def.name(), "project": project.id})
    }

    fn processing_lock(&self) -> &ProcessingLock {
        &self.lock
    }
}

/// Reads JSON configs from disk.
///
/// A dedicated config is the project config itself plus an optional
/// `dependencies` list of files relative to the project directory. A package
/// manifest carries the project config under its `keystone` field.
#[derive(Default)]
pub struct FakeLoader {
    pub loads: AtomicUsize,
    pub delay: Mutex<Option<Duration>>,
}

impl FakeLoader {
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigLoader for FakeLoader {
    async fn load_complete_project_config(
        &self,
        directory: &Path,
        config_path: &Path,
    ) -> Result<LoadedProjectConfig> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let content = tokio::fs::read_to_string(config_path).await?;
        let mut value: serde_json::Value = serde_json::from_str(&content)?;
        if config_path.file_name().is_some_and(|name| name == "package.json") {
            value = value
                .get("keystone")
                .cloned()
                .ok_or_else(|| KeystoneError::config("package.json without keystone field"))?;
        }

        let config: ProjectConfig = serde_json::from_value(value.clone())?;
        let config_dependencies = value
            .get("dependencies")
            .and_then(|deps| deps.as_array())
            .map(|deps| {
                deps.iter()
                    .filter_map(|dep| dep.as_str())
                    .map(|dep| directory.join(dep))
                    .collect()
            })
            .unwrap_or_default();

        let consumer = ConfigSource::new(config_path, value);
        Ok(LoadedProjectConfig {
            config,
            meta: ProjectConfigMeta {
                project_directory: directory.to_path_buf(),
                config_path: Some(config_path.to_path_buf()),
                config_dependencies,
                config_cache_keys: BTreeMap::from([(
                    "config".to_string(),
                    content.len().to_string(),
                )]),
                consumers_chain: vec![consumer.clone()],
                consumer,
            },
        })
    }
}

#[derive(Default)]
pub struct FakeAllocator {
    pub evicted: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl FileAllocator for FakeAllocator {
    async fn evict(&self, path: &Path, _reason: &str) -> Result<()> {
        self.evicted.lock().push(path.to_path_buf());
        Ok(())
    }
}

pub struct FakeWorker {
    kind: WorkerKind,
    pub fail: AtomicBool,
    pub sent: Mutex<Vec<WorkerMessage>>,
    pub called: Mutex<Vec<WorkerMessage>>,
}

impl FakeWorker {
    pub fn new(kind: WorkerKind) -> Self {
        Self {
            kind,
            fail: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            called: Mutex::new(Vec::new()),
        }
    }

    pub fn called_names(&self) -> Vec<&'static str> {
        self.called.lock().iter().map(WorkerMessage::name).collect()
    }

    pub fn sent_names(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(WorkerMessage::name).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        self.called.lock().clear();
    }
}

#[async_trait]
impl WorkerHandle for FakeWorker {
    fn kind(&self) -> WorkerKind {
        self.kind
    }

    fn send(&self, message: WorkerMessage) -> Result<()> {
        self.sent.lock().push(message);
        Ok(())
    }

    async fn call(&self, message: WorkerMessage) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(KeystoneError::worker(format!("{} rejected", message.name())));
        }
        self.called.lock().push(message);
        Ok(())
    }
}

pub struct FakePool {
    pub workers: Vec<Arc<FakeWorker>>,
}

impl WorkerPool for FakePool {
    fn workers(&self) -> Vec<Arc<dyn WorkerHandle>> {
        self.workers
            .iter()
            .map(|worker| Arc::clone(worker) as Arc<dyn WorkerHandle>)
            .collect()
    }
}

pub struct FakeVcsClient {
    root: PathBuf,
}

impl VcsClient for FakeVcsClient {
    fn root(&self) -> &Path {
        &self.root
    }
}

#[derive(Default)]
pub struct FakeVcs {
    pub repositories: Mutex<HashSet<PathBuf>>,
}

#[async_trait]
impl VcsProvider for FakeVcs {
    async fn client_for(&self, root: &Path) -> Option<Arc<dyn VcsClient>> {
        if self.repositories.lock().contains(root) {
            Some(Arc::new(FakeVcsClient {
                root: root.to_path_buf(),
            }))
        } else {
            None
        }
    }
}

pub struct Harness {
    pub temp: TempDir,
    pub root: PathBuf,
    pub fs: Arc<FakeFs>,
    pub loader: Arc<FakeLoader>,
    pub allocator: Arc<FakeAllocator>,
    pub processor: Arc<FakeWorker>,
    pub script_runner: Arc<FakeWorker>,
    pub vcs: Arc<FakeVcs>,
    pub manager: Arc<ProjectManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut ManagerConfig)) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_path_buf();

        let mut config = ManagerConfig {
            sensitive_directories: Vec::new(),
            vendor_path: root.join("vendor"),
            virtual_modules_path: root.join("virtual"),
            ..ManagerConfig::default()
        };
        customize(&mut config);

        let fs = Arc::new(FakeFs::default());
        let loader = Arc::new(FakeLoader::default());
        let allocator = Arc::new(FakeAllocator::default());
        let processor = Arc::new(FakeWorker::new(WorkerKind::Processor));
        let script_runner = Arc::new(FakeWorker::new(WorkerKind::ScriptRunner));
        let vcs = Arc::new(FakeVcs::default());

        let manager = Arc::new(ProjectManager::new(
            config,
            Collaborators {
                fs: fs.clone(),
                loader: loader.clone(),
                allocator: allocator.clone(),
                workers: Arc::new(FakePool {
                    workers: vec![processor.clone(), script_runner.clone()],
                }),
                vcs: vcs.clone(),
            },
        ));

        Self {
            temp,
            root,
            fs,
            loader,
            allocator,
            processor,
            script_runner,
            vcs,
            manager,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Write `<dir>/.config/keystone.json`.
    pub fn write_config(&self, dir: &str, config: serde_json::Value) -> PathBuf {
        let relative = if dir.is_empty() {
            ".config/keystone.json".to_string()
        } else {
            format!("{}/.config/keystone.json", dir)
        };
        self.write(&relative, &config.to_string())
    }

    pub fn remove(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        std::fs::remove_file(&path).unwrap();
        path
    }

    /// Standard layout: `repo` named "app" with a nested `repo/pkg` named "pkg".
    pub fn nested_repo(&self) {
        self.write_config("repo", json!({"name": "app"}));
        self.write_config("repo/pkg", json!({"name": "pkg"}));
        self.write("repo/src/main.ts", "");
        self.write("repo/pkg/src/a.ts", "");
    }

    pub fn manifest(&self, id: u64, relative_dir: &str, name: Option<&str>) -> Arc<ManifestDefinition> {
        use keystone_core::id::ManifestId;
        use keystone_core::project::{Manifest, ManifestName};

        let directory = self.path(relative_dir);
        let name = match name {
            Some(name) => match name.strip_prefix('@').and_then(|n| n.split_once('/')) {
                Some((scope, package)) => ManifestName::scoped(scope, package),
                None => ManifestName::new(name),
            },
            None => ManifestName::default(),
        };
        Arc::new(ManifestDefinition {
            id: ManifestId::new(id),
            path: directory.join("package.json"),
            directory,
            manifest: Manifest {
                name,
                version: Some("1.0.0".to_string()),
            },
        })
    }
}
