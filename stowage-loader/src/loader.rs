use crate::consumer::AssetConsumer;
use crate::decode::{decode_payload, LoadedAsset};
use crate::error::{LoadError, LoadResult};
use crate::resources::{localized_key, LanguageSelection, ResourceRegistry};
use crossbeam_channel::{Receiver, Sender};
use std::time::{Duration, Instant};
use stowage_base::{
    AssetKind, AssetLocation, CancelToken, FetchGeneration, HashMap, LoadHandle, LoadState,
    StoreRoots,
};
use url::Url;

//
// Request description
//

/// Where a request's bytes come from
#[derive(Clone, Debug, PartialEq)]
pub enum RequestSource {
    /// A path or URL interpreted according to the location, fetched through `LoaderIO`
    Location {
        location: AssetLocation,
        path: String,
    },
    /// A key into the in-process `ResourceRegistry`, optionally under a language folder
    Resource {
        path: String,
        language: Option<LanguageSelection>,
    },
}

impl RequestSource {
    pub fn location(
        location: AssetLocation,
        path: impl Into<String>,
    ) -> Self {
        RequestSource::Location {
            location,
            path: path.into(),
        }
    }

    pub fn resource(
        path: impl Into<String>,
        language: Option<LanguageSelection>,
    ) -> Self {
        RequestSource::Resource {
            path: path.into(),
            language,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            RequestSource::Location { path, .. } => path,
            RequestSource::Resource { path, .. } => path,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequestDesc {
    pub source: RequestSource,
    pub kind: AssetKind,
    // Falls back to the loader's default when unset
    pub timeout: Option<Duration>,
    // Creating or re-enabling the request starts a load
    pub load_on_enable: bool,
    // Keep the raw bytes of the last successful fetch so they can be saved
    pub retain_payload: bool,
}

impl RequestDesc {
    pub fn new(
        source: RequestSource,
        kind: AssetKind,
    ) -> Self {
        RequestDesc {
            source,
            kind,
            timeout: None,
            load_on_enable: true,
            retain_payload: false,
        }
    }

    pub fn with_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_load_on_enable(
        mut self,
        load_on_enable: bool,
    ) -> Self {
        self.load_on_enable = load_on_enable;
        self
    }

    pub fn with_retained_payload(mut self) -> Self {
        self.retain_payload = true;
        self
    }
}

//
// Interface for IO
//
// The loader hands a FetchRequest to LoaderIO and gets LoaderEvents back through a channel. IO may
// run on other threads, but all state changes happen in Loader::update() on the host thread.
//

#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub load_handle: LoadHandle,
    pub generation: FetchGeneration,
    pub url: Url,
    pub timeout: Duration,
    pub cancel: CancelToken,
}

// The raw bytes of a finished fetch
pub struct FetchPayload {
    pub data: Vec<u8>,
}

impl std::fmt::Debug for FetchPayload {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("FetchPayload")
            .field("data_length", &self.data.len())
            .finish()
    }
}

#[derive(Debug)]
pub enum LoaderEvent {
    // Sent by IO as bytes arrive, progress is in [0, 1]
    FetchProgress {
        load_handle: LoadHandle,
        generation: FetchGeneration,
        progress: f32,
    },
    // Sent by IO when a fetch succeeds or fails. Ok(None) means the source confirmed there is
    // nothing at that path.
    FetchComplete {
        load_handle: LoadHandle,
        generation: FetchGeneration,
        result: LoadResult<Option<FetchPayload>>,
    },
}

/// A data source the loader fetches from
pub trait LoaderIO: Send + Sync {
    /// Start fetching. The result must be sent as a `LoaderEvent::FetchComplete` carrying the same
    /// handle and generation, unless the cancel token is set first.
    fn request_fetch(
        &self,
        request: FetchRequest,
    );
}

/// Hands out assets synchronously, skipping IO. Tooling uses this for assets it already holds.
pub trait DirectResolver {
    fn resolve(
        &self,
        source: &RequestSource,
        kind: AssetKind,
    ) -> Option<LoadedAsset>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    // A fetch is in flight, the consumer is applied when it finishes
    Deferred,
    // The request does not exist
    Ignored,
}

/// Information about a request at the time it was retrieved
#[derive(Debug, Clone)]
pub struct LoadInfo {
    pub source: RequestSource,
    pub kind: AssetKind,
    pub load_state: LoadState,
    pub active: bool,
    pub progress: Option<f32>,
    pub asset_name: Option<String>,
}

//
// Per-request bookkeeping
//

struct InFlightFetch {
    generation: FetchGeneration,
    cancel: CancelToken,
    started_at: Instant,
    timeout: Duration,
    progress: f32,
    // URL or resource key, used to name the decoded asset
    source_name: String,
}

struct RequestInfo {
    desc: RequestDesc,
    consumer: Box<dyn AssetConsumer>,
    active: bool,
    load_state: LoadState,
    // Generation of the most recently started fetch
    generation: FetchGeneration,
    in_flight: Option<InFlightFetch>,
    asset: Option<LoadedAsset>,
    payload: Option<Vec<u8>>,
    last_error: Option<LoadError>,
    apply_pending: bool,
    was_saved: bool,
}

impl RequestInfo {
    // Abandons the current fetch without firing anything. Returns true if one was in flight.
    fn abort_fetch(&mut self) -> bool {
        match self.in_flight.take() {
            Some(fetch) => {
                fetch.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn replace_asset(
        &mut self,
        asset: Option<LoadedAsset>,
    ) {
        if let Some(old) = std::mem::replace(&mut self.asset, asset) {
            self.consumer.release_asset(old);
        }
    }

    // Back to Idle with nothing owned. Safe to call repeatedly.
    fn release(&mut self) {
        self.abort_fetch();
        self.apply_pending = false;
        self.replace_asset(None);
        self.payload = None;
        self.last_error = None;
        self.load_state = LoadState::Idle;
    }

    // Completion notifications, in order: final progress, loaded, then any deferred apply
    fn notify_finished(
        &mut self,
        success: bool,
    ) {
        self.consumer.on_loading(1.0);
        self.consumer.on_loaded(success);
        if self.apply_pending {
            self.apply_pending = false;
            self.consumer.apply_asset(self.asset.as_ref());
        }
    }

    fn fail(
        &mut self,
        load_handle: LoadHandle,
        source_name: &str,
        error: LoadError,
    ) {
        log::warn!(
            "Failed to load {:?} from {}: {}",
            load_handle,
            source_name,
            error
        );
        self.last_error = Some(error);
        self.load_state = LoadState::Failed;
    }
}

/// Drives every request through its load states. Only mutated from the host thread, IO reports
/// back through the event channel and is picked up by `update()`.
pub struct Loader {
    // Starts at 1 because 0 is the null handle
    next_handle_index: u64,
    requests: HashMap<LoadHandle, RequestInfo>,

    roots: StoreRoots,
    default_timeout: Duration,

    // The data source we fetch locations from
    loader_io: Box<dyn LoaderIO>,
    resources: ResourceRegistry,
    direct_resolver: Option<Box<dyn DirectResolver>>,

    events_tx: Sender<LoaderEvent>,
    events_rx: Receiver<LoaderEvent>,
}

impl Loader {
    pub fn new(
        loader_io: Box<dyn LoaderIO>,
        events_tx: Sender<LoaderEvent>,
        events_rx: Receiver<LoaderEvent>,
        roots: StoreRoots,
        default_timeout: Duration,
    ) -> Self {
        Loader {
            next_handle_index: 1,
            requests: Default::default(),
            roots,
            default_timeout,
            loader_io,
            resources: Default::default(),
            direct_resolver: None,
            events_tx,
            events_rx,
        }
    }

    pub fn roots(&self) -> &StoreRoots {
        &self.roots
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    pub fn set_direct_resolver(
        &mut self,
        resolver: Option<Box<dyn DirectResolver>>,
    ) {
        self.direct_resolver = resolver;
    }

    /// Registers a request. Creating a request counts as enabling its owner, so it starts loading
    /// right away when `load_on_enable` is set.
    pub fn create_request(
        &mut self,
        desc: RequestDesc,
        consumer: Box<dyn AssetConsumer>,
    ) -> LoadHandle {
        let load_handle = LoadHandle(self.next_handle_index);
        self.next_handle_index += 1;

        log::debug!(
            "Allocate load handle {:?} for {:?} as {}",
            load_handle,
            desc.source,
            desc.kind.name()
        );

        let load_on_enable = desc.load_on_enable;
        self.requests.insert(
            load_handle,
            RequestInfo {
                desc,
                consumer,
                active: true,
                load_state: LoadState::Idle,
                generation: FetchGeneration::default(),
                in_flight: None,
                asset: None,
                payload: None,
                last_error: None,
                apply_pending: false,
                was_saved: false,
            },
        );

        if load_on_enable {
            self.load(load_handle);
        }

        load_handle
    }

    /// Starts loading. Returns true when loading has started (or the asset was resolved directly),
    /// not when it has finished. Returns false without firing anything if the request is inactive,
    /// has no path, or the path can't be turned into a URL.
    pub fn load(
        &mut self,
        load_handle: LoadHandle,
    ) -> bool {
        let info = match self.requests.get_mut(&load_handle) {
            Some(info) => info,
            None => {
                log::warn!("load called for unknown request {:?}", load_handle);
                return false;
            }
        };

        if !info.active {
            log::debug!("load {:?} ignored, owner is not active", load_handle);
            info.last_error = Some(LoadError::Inactive);
            return false;
        }

        // Starting a new load always supersedes the previous fetch
        if info.abort_fetch() {
            log::debug!("load {:?} superseded the fetch in flight", load_handle);
        }
        info.last_error = None;
        info.load_state = if info.asset.is_some() {
            LoadState::Loaded
        } else {
            LoadState::Idle
        };

        if let Some(resolver) = &self.direct_resolver {
            if let Some(asset) = resolver.resolve(&info.desc.source, info.desc.kind) {
                log::debug!("load {:?} resolved directly to {}", load_handle, asset.name);
                info.replace_asset(Some(asset));
                info.payload = None;
                info.load_state = LoadState::Loaded;
                info.notify_finished(true);
                return true;
            }
        }

        let source = info.desc.source.clone();
        if source.path().is_empty() {
            log::debug!("load {:?} ignored, no path configured", load_handle);
            info.last_error = Some(LoadError::EmptyPath);
            return false;
        }

        let generation = info.generation.next();
        let timeout = info.desc.timeout.unwrap_or(self.default_timeout);
        let cancel = CancelToken::new();

        match source {
            RequestSource::Location { location, path } => {
                let url = match self.roots.resolve_url(location, &path) {
                    Ok(url) => url,
                    Err(e) => {
                        log::warn!("Could not load {:?}: {}", load_handle, e);
                        info.last_error = Some(e.into());
                        return false;
                    }
                };

                log::debug!("request_fetch {:?} {}", load_handle, url);
                info.generation = generation;
                info.in_flight = Some(InFlightFetch {
                    generation,
                    cancel: cancel.clone(),
                    started_at: Instant::now(),
                    timeout,
                    progress: 0.0,
                    source_name: url.to_string(),
                });
                info.load_state = LoadState::Loading;

                self.loader_io.request_fetch(FetchRequest {
                    load_handle,
                    generation,
                    url,
                    timeout,
                    cancel,
                });
            }
            RequestSource::Resource { path, language } => {
                let key = localized_key(&path, language.and_then(|l| l.resolve()));
                let payload = self
                    .resources
                    .get(&key)
                    .map(|data| FetchPayload { data: data.to_vec() });
                log::debug!(
                    "request resource {:?} {} (present: {})",
                    load_handle,
                    key,
                    payload.is_some()
                );

                info.generation = generation;
                info.in_flight = Some(InFlightFetch {
                    generation,
                    cancel,
                    started_at: Instant::now(),
                    timeout,
                    progress: 0.0,
                    source_name: key,
                });
                info.load_state = LoadState::Loading;

                // Resolves on the next tick, like any other fetch
                let _ = self.events_tx.send(LoaderEvent::FetchComplete {
                    load_handle,
                    generation,
                    result: Ok(payload),
                });
            }
        }

        true
    }

    /// Cancels any fetch and releases the asset. Calling it again does nothing.
    pub fn unload(
        &mut self,
        load_handle: LoadHandle,
    ) {
        if let Some(info) = self.requests.get_mut(&load_handle) {
            log::debug!("unload {:?}", load_handle);
            info.release();
        }
    }

    /// Hands the current asset to the consumer, or once the fetch in flight finishes
    pub fn apply(
        &mut self,
        load_handle: LoadHandle,
    ) -> ApplyOutcome {
        let info = match self.requests.get_mut(&load_handle) {
            Some(info) => info,
            None => return ApplyOutcome::Ignored,
        };

        if info.in_flight.is_some() {
            info.apply_pending = true;
            ApplyOutcome::Deferred
        } else {
            info.consumer.apply_asset(info.asset.as_ref());
            ApplyOutcome::Applied
        }
    }

    pub fn load_and_apply(
        &mut self,
        load_handle: LoadHandle,
    ) -> bool {
        if self.load(load_handle) {
            self.apply(load_handle);
            true
        } else {
            false
        }
    }

    /// Disabling aborts the fetch silently and releases the asset. Enabling loads again if the
    /// request isn't already loaded.
    pub fn set_active(
        &mut self,
        load_handle: LoadHandle,
        active: bool,
    ) {
        let should_load = match self.requests.get_mut(&load_handle) {
            Some(info) if info.active != active => {
                info.active = active;
                if active {
                    log::debug!("enable {:?}", load_handle);
                    info.desc.load_on_enable && info.load_state != LoadState::Loaded
                } else {
                    log::debug!("disable {:?}", load_handle);
                    info.release();
                    false
                }
            }
            _ => false,
        };

        if should_load {
            self.load(load_handle);
        }
    }

    /// Points the request somewhere else. Refused while a fetch is in flight.
    pub fn set_source(
        &mut self,
        load_handle: LoadHandle,
        source: RequestSource,
    ) -> bool {
        match self.requests.get_mut(&load_handle) {
            Some(info) if info.in_flight.is_some() => {
                log::warn!(
                    "Can't change the source of {:?} while it is loading",
                    load_handle
                );
                false
            }
            Some(info) => {
                info.desc.source = source;
                true
            }
            None => false,
        }
    }

    /// Writes the bytes of the last successful fetch to a file. Requires `retain_payload`. The
    /// bundled store is read-only and never written.
    pub fn save(
        &mut self,
        load_handle: LoadHandle,
        location: AssetLocation,
        path: &str,
    ) -> bool {
        let info = match self.requests.get_mut(&load_handle) {
            Some(info) => info,
            None => return false,
        };

        if path.is_empty() {
            log::warn!("Can't save {:?}, no path given", load_handle);
            return false;
        }

        if location == AssetLocation::BundledStore {
            log::warn!("Can't save {:?}, the bundled store is read-only", load_handle);
            return false;
        }

        let payload = match &info.payload {
            Some(payload) => payload,
            None => {
                log::warn!("Can't save {:?}, no payload is retained", load_handle);
                return false;
            }
        };

        let file_path = match self.roots.resolve_path(location, path) {
            Ok(file_path) => file_path,
            Err(e) => {
                log::warn!("Can't save {:?}: {}", load_handle, e);
                return false;
            }
        };

        if let Some(parent) = file_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Can't save {:?} to {:?}: {}", load_handle, file_path, e);
                return false;
            }
        }

        match std::fs::write(&file_path, payload) {
            Ok(()) => {
                log::debug!("saved {:?} to {:?}", load_handle, file_path);
                info.was_saved = true;
                true
            }
            Err(e) => {
                log::warn!("Can't save {:?} to {:?}: {}", load_handle, file_path, e);
                false
            }
        }
    }

    /// Removes the request, aborting its fetch without callbacks and releasing its asset
    pub fn destroy(
        &mut self,
        load_handle: LoadHandle,
    ) {
        if let Some(mut info) = self.requests.remove(&load_handle) {
            log::debug!("destroy {:?}", load_handle);
            info.release();
        }
    }

    /// One cooperative tick: apply IO results, expire fetches that ran too long, then report
    /// progress for everything still in flight
    #[profiling::function]
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    pub(crate) fn update_at(
        &mut self,
        now: Instant,
    ) {
        while let Ok(loader_event) = self.events_rx.try_recv() {
            log::trace!("handle event {:?}", loader_event);
            match loader_event {
                LoaderEvent::FetchProgress {
                    load_handle,
                    generation,
                    progress,
                } => self.handle_fetch_progress(load_handle, generation, progress),
                LoaderEvent::FetchComplete {
                    load_handle,
                    generation,
                    result,
                } => self.handle_fetch_complete(load_handle, generation, result),
            }
        }

        self.expire_timed_out_fetches(now);

        for info in self.requests.values_mut() {
            if let Some(fetch) = &info.in_flight {
                let progress = fetch.progress;
                info.consumer.on_loading(progress);
            }
        }
    }

    // Returns the request only if the event belongs to its current fetch
    fn current_fetch_request(
        &mut self,
        load_handle: LoadHandle,
        generation: FetchGeneration,
    ) -> Option<&mut RequestInfo> {
        let info = self.requests.get_mut(&load_handle)?;
        let is_current =
            matches!(&info.in_flight, Some(fetch) if fetch.generation == generation);
        if is_current {
            Some(info)
        } else {
            log::trace!(
                "dropping stale event for {:?} generation {:?}",
                load_handle,
                generation
            );
            None
        }
    }

    fn handle_fetch_progress(
        &mut self,
        load_handle: LoadHandle,
        generation: FetchGeneration,
        progress: f32,
    ) {
        if let Some(info) = self.current_fetch_request(load_handle, generation) {
            if let Some(fetch) = &mut info.in_flight {
                fetch.progress = progress.clamp(0.0, 1.0);
            }
        }
    }

    fn handle_fetch_complete(
        &mut self,
        load_handle: LoadHandle,
        generation: FetchGeneration,
        result: LoadResult<Option<FetchPayload>>,
    ) {
        let info = match self.current_fetch_request(load_handle, generation) {
            Some(info) => info,
            None => return,
        };

        // The fetch is over whatever happens next
        let fetch = match info.in_flight.take() {
            Some(fetch) => fetch,
            None => return,
        };

        let success = match result {
            Ok(Some(payload)) => {
                let retained = if info.desc.retain_payload {
                    Some(payload.data.clone())
                } else {
                    None
                };

                match decode_payload(info.desc.kind, &fetch.source_name, payload.data) {
                    Ok(asset) => {
                        log::debug!(
                            "loaded {:?} {} as {}",
                            load_handle,
                            fetch.source_name,
                            info.desc.kind.name()
                        );
                        info.replace_asset(Some(asset));
                        info.payload = retained;
                        info.load_state = LoadState::Loaded;
                        true
                    }
                    Err(e) => {
                        info.fail(load_handle, &fetch.source_name, e);
                        false
                    }
                }
            }
            Ok(None) => {
                log::debug!(
                    "loaded {:?}, nothing exists at {}",
                    load_handle,
                    fetch.source_name
                );
                info.replace_asset(None);
                info.payload = None;
                info.load_state = LoadState::Loaded;
                true
            }
            Err(e) => {
                info.fail(load_handle, &fetch.source_name, e);
                false
            }
        };

        info.notify_finished(success);
    }

    fn expire_timed_out_fetches(
        &mut self,
        now: Instant,
    ) {
        let expired: Vec<LoadHandle> = self
            .requests
            .iter()
            .filter_map(|(load_handle, info)| {
                let fetch = info.in_flight.as_ref()?;
                if now.saturating_duration_since(fetch.started_at) >= fetch.timeout {
                    Some(*load_handle)
                } else {
                    None
                }
            })
            .collect();

        for load_handle in expired {
            if let Some(info) = self.requests.get_mut(&load_handle) {
                if let Some(fetch) = info.in_flight.take() {
                    fetch.cancel.cancel();
                    info.fail(load_handle, &fetch.source_name, LoadError::Timeout(fetch.timeout));
                    info.notify_finished(false);
                }
            }
        }
    }

    //
    // Queries
    //

    pub fn load_state(
        &self,
        load_handle: LoadHandle,
    ) -> LoadState {
        self.requests
            .get(&load_handle)
            .map(|info| info.load_state)
            .unwrap_or_default()
    }

    pub fn was_loaded(
        &self,
        load_handle: LoadHandle,
    ) -> bool {
        self.load_state(load_handle) == LoadState::Loaded
    }

    pub fn was_saved(
        &self,
        load_handle: LoadHandle,
    ) -> bool {
        self.requests
            .get(&load_handle)
            .map(|info| info.was_saved)
            .unwrap_or(false)
    }

    pub fn is_loading(
        &self,
        load_handle: LoadHandle,
    ) -> bool {
        self.load_state(load_handle) == LoadState::Loading
    }

    pub fn is_active(
        &self,
        load_handle: LoadHandle,
    ) -> bool {
        self.requests
            .get(&load_handle)
            .map(|info| info.active)
            .unwrap_or(false)
    }

    pub fn progress(
        &self,
        load_handle: LoadHandle,
    ) -> Option<f32> {
        self.requests
            .get(&load_handle)?
            .in_flight
            .as_ref()
            .map(|fetch| fetch.progress)
    }

    pub fn asset(
        &self,
        load_handle: LoadHandle,
    ) -> Option<&LoadedAsset> {
        self.requests.get(&load_handle)?.asset.as_ref()
    }

    pub fn last_error(
        &self,
        load_handle: LoadHandle,
    ) -> Option<&LoadError> {
        self.requests.get(&load_handle)?.last_error.as_ref()
    }

    /// Returns handles to all requests that currently exist
    pub fn active_requests(&self) -> Vec<LoadHandle> {
        let mut handles: Vec<_> = self.requests.keys().copied().collect();
        handles.sort();
        handles
    }

    pub fn get_load_info(
        &self,
        load_handle: LoadHandle,
    ) -> Option<LoadInfo> {
        let info = self.requests.get(&load_handle)?;
        Some(LoadInfo {
            source: info.desc.source.clone(),
            kind: info.desc.kind,
            load_state: info.load_state,
            active: info.active,
            progress: info.in_flight.as_ref().map(|fetch| fetch.progress),
            asset_name: info.asset.as_ref().map(|asset| asset.name.clone()),
        })
    }
}
