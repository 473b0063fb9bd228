//! The top-level wiring: owns the four concurrent registries (handlers,
//! mounts, archive-original-ids, storable cache) plus the settings path,
//! and is the single construction point the spec's "global mutable state"
//! design note asks for: one init routine, cooperative single-entry
//! guard, explicit reset seam for tests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::handler::content_addressed::{
    ImmutableCidHandler, InMemoryCasClient, MutableNameHandler,
};
use crate::handler::http::HttpHandler;
use crate::handler::local::LocalDirHandler;
use crate::handler::memory::MemoryHandler;
use crate::handler::{ProtocolHandler, BUILTIN_SCHEMES};
use crate::mount::settings::Settings;
use crate::mount::MountedEntry;
use crate::storable::{Storable, StorableId};

/// Owns every piece of process-wide state described in spec §3/§5.
///
/// Construct one per process (or one per test, via [`Registry::for_test`]).
pub struct Registry {
    pub(crate) handlers: DashMap<String, Arc<dyn ProtocolHandler>>,
    pub(crate) builtin_schemes: HashSet<String>,
    /// Native root id of each browsable built-in, populated lazily the
    /// first time its root is materialized; the alias engine only
    /// substitutes a built-in root once it has been seen.
    pub(crate) builtin_roots: DashMap<String, StorableId>,
    pub(crate) mounts: DashMap<String, MountedEntry>,
    pub(crate) original_to_scheme: DashMap<String, String>,
    pub(crate) cache: DashMap<String, Storable>,
    pub(crate) settings_path: PathBuf,
    /// Serializes mount-table composite mutations (mount/unmount/rename),
    /// matching spec §5's "tool-level mutual exclusion" requirement.
    pub(crate) mutation_lock: AsyncMutex<()>,
    init_guard: AsyncMutex<bool>,
}

impl Registry {
    /// Builds a registry with the fixed built-in scheme set installed,
    /// persisting mount configuration at `settings_path`.
    pub fn new(settings_path: PathBuf) -> Self {
        let handlers: DashMap<String, Arc<dyn ProtocolHandler>> = DashMap::new();
        let cas_client = Arc::new(InMemoryCasClient::new());

        handlers.insert("local-file".to_string(), Arc::new(LocalDirHandler::new("local-file", "/")));
        handlers.insert("mfs".to_string(), Arc::new(LocalDirHandler::new("mfs", "/")));
        handlers.insert("memory".to_string(), Arc::new(MemoryHandler::new()));
        handlers.insert("http".to_string(), Arc::new(HttpHandler::new("http")));
        handlers.insert("https".to_string(), Arc::new(HttpHandler::new("https")));
        handlers.insert(
            "immutable-cid".to_string(),
            Arc::new(ImmutableCidHandler::new(cas_client.clone())),
        );
        handlers.insert("mutable-name".to_string(), Arc::new(MutableNameHandler::new(cas_client)));

        Self {
            handlers,
            builtin_schemes: BUILTIN_SCHEMES.iter().map(|s| s.to_string()).collect(),
            builtin_roots: DashMap::new(),
            mounts: DashMap::new(),
            original_to_scheme: DashMap::new(),
            cache: DashMap::new(),
            settings_path,
            mutation_lock: AsyncMutex::new(()),
            init_guard: AsyncMutex::new(false),
        }
    }

    /// A registry rooted under a throwaway directory with no persisted
    /// settings; the "explicit reset seam" spec §9 requires for tests.
    #[cfg(any(test, feature = "test-util"))]
    pub fn for_test(settings_path: PathBuf) -> Self {
        Self::new(settings_path)
    }

    /// Also mounts `mfs`/`local-file` at a given directory instead of `/`,
    /// which every non-trivial test needs so it never touches real `/`.
    pub fn with_roots(settings_path: PathBuf, local_file_root: PathBuf, mfs_root: PathBuf) -> Self {
        let mut registry = Self::new(settings_path);
        registry
            .handlers
            .insert("local-file".to_string(), Arc::new(LocalDirHandler::new("local-file", local_file_root)));
        registry.handlers.insert("mfs".to_string(), Arc::new(LocalDirHandler::new("mfs", mfs_root)));
        registry
    }

    pub fn is_builtin(&self, scheme: &str) -> bool {
        self.builtin_schemes.contains(scheme)
    }

    pub fn handler_for(&self, scheme: &str) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers.get(scheme).map(|h| h.clone())
    }

    pub fn known_schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        schemes.sort();
        schemes
    }

    /// Double-checked single-entry guard: runs `init` at most once across
    /// concurrent callers.
    pub async fn ensure_initialized<F, Fut>(&self, init: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let mut guard = self.init_guard.lock().await;
        if *guard {
            return;
        }
        init().await;
        *guard = true;
    }

    pub(crate) fn settings(&self) -> Settings {
        Settings::load(&self.settings_path).unwrap_or_default()
    }

    pub(crate) fn save_settings(&self, settings: &Settings) -> crate::error::CoreResult<()> {
        settings.save(&self.settings_path)
    }
}
