// src/resolver/remote.rs
//! Remote bundle resolver with a content-addressed local mirror.
//!
//! The bundle origin publishes an index (`ocabundles.json`) mapping
//! identifiers to bundle files and their sha256. [`RemoteOcaBundleResolver`]
//! keeps a local copy of every indexed file, named by its hash, and brings it
//! up to date with [`RemoteOcaBundleResolver::check_for_updates`]:
//!
//! 1. the index is fetched; an unchanged ETag ends the cycle
//! 2. the old and new index are diffed by content hash
//! 3. new hashes are downloaded, dropped hashes are deleted, concurrently
//! 4. ETag, cache data file and index body are persisted
//!
//! Network failures never surface to the caller: the resolver falls back to
//! the last persisted index and keeps serving cached bundles. Bundles are
//! parsed lazily on first resolution and kept in memory, keyed by index
//! identifier and content hash.

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::models::bundle::{OverlayBundle, RawOverlayBundle};
use crate::models::identifiers::Identifiers;
use crate::models::index::{BundleIndex, BundleIndexEntry, CacheDataFile};
use crate::resolver::accessor::{OcaBundle, ResolverOptions};
use crate::resolver::default::{BundleData, DefaultOcaBundleResolver, OcaBundleResolver};
use crate::resolver::sync::{diff_indexes, QueueReport, SyncOperation};
use crate::storage::file_cache::FileCache;
use crate::utils::color::generate_color;
use crate::utils::cred_def::unqualified_identifier;
use crate::utils::crypto::{sha256_hex, validate_content_hash};
use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, error, info, warn};
use reqwest::header::ETAG;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Where the synchronization engine is in its cycle.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No sync has run in this process yet
    Cold,
    /// A `check_for_updates` call is in flight
    Checking,
    /// The last sync finished
    Idle,
}

/// Result of one `check_for_updates` call.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", content = "report", rename_all = "lowercase")]
pub enum SyncOutcome {
    /// Index fetch failed; the local index was reloaded if present
    Unreachable,
    /// ETag matched; only retried operations (if any) ran
    Unchanged(QueueReport),
    /// Index changed and the cache was reconciled
    Updated(QueueReport),
}

/// Engine switches, taken from [`ResolverConfig`].
#[derive(Debug, Clone, Copy, Default)]
struct SyncSettings {
    weak_etag_comparison: bool,
    verify_content_hash: bool,
    retry_failed_operations: bool,
    preload: bool,
}

type HydratedBundles = HashMap<String, (String, Arc<OverlayBundle>)>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Strips the weak marker and quotes from an ETag.
fn opaque_tag(etag: &str) -> &str {
    etag.trim()
        .strip_prefix("W/")
        .unwrap_or_else(|| etag.trim())
        .trim_matches('"')
}

/// Resolver backed by a remote index and a local file cache.
pub struct RemoteOcaBundleResolver {
    /// Static bundles, consulted for identifiers the index does not know
    defaults: DefaultOcaBundleResolver,
    client: Client,
    base_url: String,
    index_file_name: String,
    cache_data_file_name: String,
    cache: FileCache,
    settings: SyncSettings,
    index: RwLock<Arc<BundleIndex>>,
    index_file_etag: RwLock<Option<String>>,
    hydrated: RwLock<HydratedBundles>,
    pending: Mutex<Vec<SyncOperation>>,
    state: RwLock<SyncState>,
    /// Serializes sync cycles; resolution never waits on it
    sync_lock: tokio::sync::Mutex<()>,
}

impl RemoteOcaBundleResolver {
    /// Creates a resolver for the configured origin and cache directory.
    ///
    /// Nothing is fetched or read yet; call [`Self::load_local_index`] for an
    /// offline start and [`Self::check_for_updates`] to synchronize.
    ///
    /// # Errors
    /// Returns an HTTP error if the client cannot be built.
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            defaults: DefaultOcaBundleResolver::empty(config.resolver_options()),
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            index_file_name: config.index_file_name.clone(),
            cache_data_file_name: config.cache_data_file_name.clone(),
            cache: FileCache::new(config.cache_dir.clone()),
            settings: SyncSettings {
                weak_etag_comparison: config.weak_etag_comparison,
                verify_content_hash: config.verify_content_hash,
                retry_failed_operations: config.retry_failed_operations,
                preload: config.preload,
            },
            index: RwLock::new(Arc::new(BundleIndex::default())),
            index_file_etag: RwLock::new(None),
            hydrated: RwLock::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            state: RwLock::new(SyncState::Cold),
            sync_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Registers static bundles used for identifiers missing from the index.
    pub fn with_bundles(mut self, bundles: impl IntoIterator<Item = (String, BundleData)>) -> Self {
        let options = self.defaults.options().clone();
        self.defaults = DefaultOcaBundleResolver::new(bundles, options);
        self
    }

    /// Snapshot of the current index.
    pub fn index(&self) -> Arc<BundleIndex> {
        read(&self.index).clone()
    }

    pub fn index_file_etag(&self) -> Option<String> {
        read(&self.index_file_etag).clone()
    }

    pub fn sync_state(&self) -> SyncState {
        *read(&self.state)
    }

    /// Operations waiting for the next cycle (only with retries enabled).
    pub fn pending_operations(&self) -> Vec<SyncOperation> {
        lock(&self.pending).clone()
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Loads the last persisted index into memory.
    ///
    /// # Returns
    /// `true` if a local index was found and loaded
    pub async fn load_local_index(&self) -> Result<bool> {
        match self.cache.retrieve_json::<BundleIndex>(&self.index_file_name).await? {
            Some(index) => {
                info!("Loaded local bundle index with {} entries", index.len());
                self.replace_index(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fetches the remote index and reconciles the local cache with it.
    ///
    /// Never fails: network and storage problems are logged and reported
    /// through the returned [`SyncOutcome`].
    pub async fn check_for_updates(&self) -> SyncOutcome {
        let _cycle = self.sync_lock.lock().await;
        *write(&self.state) = SyncState::Checking;

        let outcome = self.synchronize().await;
        match &outcome {
            SyncOutcome::Unreachable => warn!("Bundle origin unreachable, serving local cache"),
            SyncOutcome::Unchanged(report) => {
                info!("Bundle index unchanged ({} retried operations)", report.total())
            }
            SyncOutcome::Updated(report) => info!(
                "Bundle index updated: {} operations succeeded, {} failed",
                report.succeeded.len(),
                report.failed.len()
            ),
        }

        if self.settings.preload && outcome != SyncOutcome::Unreachable {
            let hydrated = self.preload_bundles().await;
            debug!("Preloaded {} bundles", hydrated);
        }

        *write(&self.state) = SyncState::Idle;
        outcome
    }

    /// Parses every indexed bundle present in the local cache.
    ///
    /// # Returns
    /// Number of index entries with a parsed bundle in memory
    pub async fn preload_bundles(&self) -> usize {
        let index = self.index();
        let tasks = index.iter().map(|(identifier, entry)| async move {
            match self.hydrate(identifier, entry, identifier).await {
                Ok(_) => true,
                Err(e) => {
                    debug!("Could not preload bundle {}: {}", identifier, e);
                    false
                }
            }
        });
        join_all(tasks).await.into_iter().filter(|loaded| *loaded).count()
    }

    async fn synchronize(&self) -> SyncOutcome {
        if let Err(e) = self.cache.ensure_dir().await {
            error!("Could not create bundle cache directory: {}", e);
        }
        if self.index_file_etag().is_none() {
            self.load_cache_data().await;
        }
        if self.index().is_empty() {
            self.reload_local_index().await;
        }

        let (body, etag) = match self.fetch_index().await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("Failed to fetch bundle index: {}", e);
                self.reload_local_index().await;
                return SyncOutcome::Unreachable;
            }
        };
        let fetched: BundleIndex = match serde_json::from_slice(&body) {
            Ok(index) => index,
            Err(e) => {
                warn!("Fetched bundle index is malformed: {}", e);
                self.reload_local_index().await;
                return SyncOutcome::Unreachable;
            }
        };

        let unchanged = match (self.index_file_etag(), etag.as_deref()) {
            (Some(held), Some(fetched_etag)) => self.etags_match(&held, fetched_etag),
            _ => false,
        };
        if unchanged {
            self.replace_index(fetched);
            let report = self.run_queue(Vec::new()).await;
            return SyncOutcome::Unchanged(report);
        }

        let previous = self.index();
        let operations = diff_indexes(&previous, &fetched);
        debug!("Index diff produced {} operations", operations.len());
        self.replace_index(fetched);
        match etag {
            Some(etag) => self.store_index_file_etag(etag).await,
            None => warn!("Bundle index response carries no ETag"),
        }

        let report = self.run_queue(operations).await;
        if let Err(e) = self.cache.store_data(&self.index_file_name, &body).await {
            error!("Failed to persist bundle index: {}", e);
        }
        SyncOutcome::Updated(report)
    }

    fn etags_match(&self, held: &str, fetched: &str) -> bool {
        if self.settings.weak_etag_comparison {
            opaque_tag(held) == opaque_tag(fetched)
        } else {
            held == fetched
        }
    }

    fn replace_index(&self, index: BundleIndex) {
        *write(&self.index) = Arc::new(index);
    }

    async fn reload_local_index(&self) {
        if let Err(e) = self.load_local_index().await {
            warn!("Failed to load local bundle index: {}", e);
        }
    }

    async fn load_cache_data(&self) {
        match self
            .cache
            .retrieve_json::<CacheDataFile>(&self.cache_data_file_name)
            .await
        {
            Ok(Some(data)) => {
                debug!("Loaded index ETag {} from {}", data.index_file_etag, data.updated_at);
                *write(&self.index_file_etag) = Some(data.index_file_etag);
            }
            Ok(None) => debug!("No cache data file yet"),
            Err(e) => warn!("Failed to read cache data file: {}", e),
        }
    }

    async fn store_index_file_etag(&self, etag: String) {
        let data = CacheDataFile::observed(etag.clone());
        *write(&self.index_file_etag) = Some(etag);
        if let Err(e) = self.cache.store_json(&self.cache_data_file_name, &data).await {
            error!("Failed to persist cache data file: {}", e);
        }
    }

    /// Runs `operations` (after any pending retries) concurrently.
    async fn run_queue(&self, operations: Vec<SyncOperation>) -> QueueReport {
        let index = self.index();
        let mut queue = Vec::new();
        if self.settings.retry_failed_operations {
            let pending = std::mem::take(&mut *lock(&self.pending));
            // Retries the index has since made moot are dropped
            queue.extend(pending.into_iter().filter(|operation| match operation {
                SyncOperation::Add(hash) => index.path_for_hash(hash).is_some(),
                SyncOperation::Remove(hash) => index.path_for_hash(hash).is_none(),
            }));
        }
        for operation in operations {
            if !queue.contains(&operation) {
                queue.push(operation);
            }
        }

        let tasks = queue.into_iter().map(|operation| {
            let index = Arc::clone(&index);
            async move {
                let result = self.execute(&index, &operation).await;
                (operation, result)
            }
        });

        let mut report = QueueReport::default();
        let mut retries = Vec::new();
        for (operation, result) in join_all(tasks).await {
            match result {
                Ok(()) => report.succeeded.push(operation),
                Err(e) => {
                    warn!("Cache operation {} failed: {}", operation, e);
                    // A malformed hash fails the same way every time
                    if !matches!(e, Error::InvalidContentHash(_)) {
                        retries.push(operation.clone());
                    }
                    report.failed.push(operation);
                }
            }
        }
        if self.settings.retry_failed_operations {
            *lock(&self.pending) = retries;
        }
        report
    }

    async fn execute(&self, index: &BundleIndex, operation: &SyncOperation) -> Result<()> {
        // Hashes name files in the cache directory
        validate_content_hash(operation.hash())?;
        match operation {
            SyncOperation::Add(hash) => {
                let path = index
                    .path_for_hash(hash)
                    .ok_or_else(|| Error::UnknownContentHash(hash.clone()))?;
                let body = self.fetch(path).await?;
                if self.settings.verify_content_hash {
                    let actual = sha256_hex(&body);
                    if !actual.eq_ignore_ascii_case(hash) {
                        return Err(Error::ContentHashMismatch {
                            expected: hash.clone(),
                            actual,
                        });
                    }
                }
                self.cache.store_data(hash, &body).await
            }
            SyncOperation::Remove(hash) => {
                if !self.cache.remove(hash).await? {
                    debug!("Bundle file {} already gone", hash);
                }
                write(&self.hydrated).retain(|_, (cached_hash, _)| cached_hash != hash);
                Ok(())
            }
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url_for(path);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_index(&self) -> Result<(Vec<u8>, Option<String>)> {
        let url = self.url_for(&self.index_file_name);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
            });
        }
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let body = response.bytes().await?.to_vec();
        Ok((body, etag))
    }

    /// Index key for `identifiers`: credential definition, its unqualified
    /// form, schema, its unqualified form, then template.
    fn find_index_entry(
        index: &BundleIndex,
        identifiers: &Identifiers,
    ) -> Option<(String, BundleIndexEntry)> {
        let qualified_and_legacy = |id: Option<&str>| -> Vec<String> {
            id.map(|id| {
                let mut keys = vec![id.to_string()];
                keys.extend(unqualified_identifier(id));
                keys
            })
            .unwrap_or_default()
        };
        let mut candidates = qualified_and_legacy(identifiers.credential_definition_id.as_deref());
        candidates.extend(qualified_and_legacy(identifiers.schema_id.as_deref()));
        candidates.extend(identifiers.template_id.clone());

        candidates
            .into_iter()
            .find_map(|key| index.get(&key).cloned().map(|entry| (key, entry)))
    }

    /// Returns the parsed bundle for an index entry, reading the cache file
    /// on first use.
    async fn hydrate(
        &self,
        key: &str,
        entry: &BundleIndexEntry,
        credential_definition_id: &str,
    ) -> Result<Arc<OverlayBundle>> {
        let cached = read(&self.hydrated)
            .get(key)
            .filter(|(hash, _)| *hash == entry.sha256)
            .map(|(_, bundle)| Arc::clone(bundle));
        if let Some(bundle) = cached {
            return Ok(bundle);
        }

        validate_content_hash(&entry.sha256)?;
        let bytes = self
            .cache
            .retrieve_data(&entry.sha256)
            .await?
            .ok_or_else(|| Error::MissingCacheEntry(entry.sha256.clone()))?;
        let documents: Vec<RawOverlayBundle> = serde_json::from_slice(&bytes)?;
        let raw = documents
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmptyBundle(key.to_string()))?;

        let mut bundle = OverlayBundle::new(credential_definition_id, raw)?;
        if !bundle.has_branding() {
            bundle = bundle.with_fallback_branding(&generate_color(credential_definition_id));
        }
        let bundle = Arc::new(bundle);
        write(&self.hydrated).insert(key.to_string(), (entry.sha256.clone(), Arc::clone(&bundle)));
        Ok(bundle)
    }
}

#[async_trait]
impl OcaBundleResolver for RemoteOcaBundleResolver {
    fn options(&self) -> &ResolverOptions {
        self.defaults.options()
    }

    async fn resolve(&self, identifiers: &Identifiers, language: Option<&str>) -> Option<OcaBundle> {
        let index = self.index();
        let Some((key, entry)) = Self::find_index_entry(&index, identifiers) else {
            return self.defaults.resolve(identifiers, language).await;
        };

        let credential_definition_id = identifiers
            .credential_definition_id
            .as_deref()
            .unwrap_or_default();
        match self.hydrate(&key, &entry, credential_definition_id).await {
            Ok(bundle) => Some(OcaBundle::new(bundle, self.options().for_language(language))),
            Err(e) => {
                warn!("Could not load bundle {} for {}: {}", entry.sha256, key, e);
                None
            }
        }
    }
}
