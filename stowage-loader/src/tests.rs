use crate::decode::decode_payload;
use crate::decode::tests::png_bytes;
use crate::loader::{
    DirectResolver, FetchPayload, FetchRequest, LoaderEvent, LoaderIO, RequestDesc, RequestSource,
};
use crate::{
    ApplyOutcome, AssetConsumer, AssetManager, LoadError, LoadErrorCategory, LoadResult,
    LoadedAsset, LoaderConfig, RequestHandle,
};
use crossbeam_channel::Sender;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stowage_base::{AssetKind, AssetLocation, BufferContent, LoadState, StoreRoots};

const IMAGE_URL: &str = "http://x/y.png";

// Records fetches instead of performing them, the test completes them by hand
#[derive(Default, Clone)]
struct MockLoaderIO {
    fetches: Arc<Mutex<Vec<FetchRequest>>>,
}

impl LoaderIO for MockLoaderIO {
    fn request_fetch(
        &self,
        request: FetchRequest,
    ) {
        self.fetches.lock().unwrap().push(request);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ConsumerEvent {
    Loading(f32),
    Loaded(bool),
    Applied(Option<String>),
    Released(String),
}

#[derive(Default, Clone)]
struct RecordingConsumer {
    events: Rc<RefCell<Vec<ConsumerEvent>>>,
}

impl RecordingConsumer {
    fn take_events(&self) -> Vec<ConsumerEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl AssetConsumer for RecordingConsumer {
    fn apply_asset(
        &mut self,
        asset: Option<&LoadedAsset>,
    ) {
        self.events
            .borrow_mut()
            .push(ConsumerEvent::Applied(asset.map(|x| x.name.clone())));
    }

    fn on_loading(
        &mut self,
        progress: f32,
    ) {
        self.events
            .borrow_mut()
            .push(ConsumerEvent::Loading(progress));
    }

    fn on_loaded(
        &mut self,
        success: bool,
    ) {
        self.events.borrow_mut().push(ConsumerEvent::Loaded(success));
    }

    fn release_asset(
        &mut self,
        asset: LoadedAsset,
    ) {
        self.events
            .borrow_mut()
            .push(ConsumerEvent::Released(asset.name));
    }
}

// Hands out a 3x5 texture for one path, as tooling holding the asset in memory would
struct HeldTextureResolver {
    path: &'static str,
}

impl DirectResolver for HeldTextureResolver {
    fn resolve(
        &self,
        source: &RequestSource,
        kind: AssetKind,
    ) -> Option<LoadedAsset> {
        if source.path() != self.path {
            return None;
        }

        decode_payload(kind, source.path(), png_bytes(3, 5)).ok()
    }
}

struct TestHarness {
    manager: AssetManager,
    io: MockLoaderIO,
    events_tx: Sender<LoaderEvent>,
    _dir: tempfile::TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = LoaderConfig::with_roots(StoreRoots::new(
            dir.path().join("persistent"),
            dir.path().join("bundled"),
            dir.path().join("install"),
        ));

        let io = MockLoaderIO::default();
        let mut captured_tx = None;
        let manager = AssetManager::with_loader_io(config, |_, events_tx| {
            captured_tx = Some(events_tx);
            let loader_io: Box<dyn LoaderIO> = Box::new(io.clone());
            Ok(loader_io)
        })
        .unwrap();

        TestHarness {
            manager,
            io,
            events_tx: captured_tx.unwrap(),
            _dir: dir,
        }
    }

    fn request(
        &mut self,
        desc: RequestDesc,
    ) -> (RequestHandle, RecordingConsumer) {
        let consumer = RecordingConsumer::default();
        let handle = self
            .manager
            .create_request(desc, Box::new(consumer.clone()));
        (handle, consumer)
    }

    fn fetches(&self) -> Vec<FetchRequest> {
        self.io.fetches.lock().unwrap().clone()
    }

    fn last_fetch(&self) -> FetchRequest {
        self.fetches().last().cloned().unwrap()
    }

    fn complete(
        &self,
        fetch: &FetchRequest,
        result: LoadResult<Option<Vec<u8>>>,
    ) {
        self.events_tx
            .send(LoaderEvent::FetchComplete {
                load_handle: fetch.load_handle,
                generation: fetch.generation,
                result: result.map(|data| data.map(|data| FetchPayload { data })),
            })
            .unwrap();
    }
}

fn image_desc() -> RequestDesc {
    RequestDesc::new(
        RequestSource::location(AssetLocation::PathOrUrl, IMAGE_URL),
        AssetKind::Texture,
    )
}

fn text_resource_desc(language: Option<crate::LanguageSelection>) -> RequestDesc {
    RequestDesc::new(
        RequestSource::resource("ui/title.txt", language),
        AssetKind::TextBuffer(BufferContent::Text),
    )
}

#[test]
fn load_texture_over_http() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());

    // Creating the request starts the load
    assert_eq!(harness.manager.load_state(&handle), LoadState::Loading);
    let fetch = harness.last_fetch();
    assert_eq!(fetch.url.as_str(), IMAGE_URL);
    assert_eq!(fetch.timeout, Duration::from_secs(30));

    harness.manager.update();
    assert_eq!(consumer.take_events(), vec![ConsumerEvent::Loading(0.0)]);

    harness.complete(&fetch, Ok(Some(png_bytes(4, 2))));
    harness.manager.update();

    assert!(harness.manager.was_loaded(&handle));
    let texture = harness.manager.asset(&handle).unwrap().texture().unwrap();
    assert_eq!((texture.width, texture.height), (4, 2));
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(true)]
    );

    // Nothing further once the load has finished
    harness.manager.update();
    assert!(consumer.take_events().is_empty());
}

#[test]
fn progress_is_reported_every_tick() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());
    let fetch = harness.last_fetch();

    harness
        .events_tx
        .send(LoaderEvent::FetchProgress {
            load_handle: fetch.load_handle,
            generation: fetch.generation,
            progress: 0.5,
        })
        .unwrap();
    harness.manager.update();
    harness.manager.update();

    assert_eq!(harness.manager.progress(&handle), Some(0.5));
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(0.5), ConsumerEvent::Loading(0.5)]
    );
}

#[test]
fn load_info_tracks_the_request() {
    let mut harness = TestHarness::new();
    let (handle, _consumer) = harness.request(image_desc());
    let fetch = harness.last_fetch();

    let info = harness
        .manager
        .loader()
        .get_load_info(handle.load_handle())
        .unwrap();
    assert_eq!(
        info.source,
        RequestSource::location(AssetLocation::PathOrUrl, IMAGE_URL)
    );
    assert_eq!(info.kind, AssetKind::Texture);
    assert_eq!(info.load_state, LoadState::Loading);
    assert!(info.active);
    assert_eq!(info.progress, Some(0.0));
    assert_eq!(info.asset_name, None);

    harness.complete(&fetch, Ok(Some(png_bytes(4, 2))));
    harness.manager.update();

    let info = harness
        .manager
        .loader()
        .get_load_info(handle.load_handle())
        .unwrap();
    assert_eq!(info.load_state, LoadState::Loaded);
    assert_eq!(info.progress, None);
    assert_eq!(info.asset_name.as_deref(), Some("y"));

    let load_handle = handle.load_handle();
    drop(handle);
    harness.manager.update();
    assert!(harness.manager.loader().get_load_info(load_handle).is_none());
}

#[test]
fn failed_load_can_be_retried() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());

    harness.complete(&harness.last_fetch(), Err(LoadError::HttpStatus(404)));
    harness.manager.update();

    assert_eq!(harness.manager.load_state(&handle), LoadState::Failed);
    assert_eq!(
        harness.manager.last_error(&handle).unwrap().category(),
        LoadErrorCategory::Transport
    );
    assert!(harness.manager.asset(&handle).is_none());
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(false)]
    );

    // Retrying clears the failure
    assert!(harness.manager.load(&handle));
    assert!(harness.manager.last_error(&handle).is_none());
    assert_eq!(harness.manager.load_state(&handle), LoadState::Loading);
    assert_eq!(harness.fetches().len(), 2);

    harness.complete(&harness.last_fetch(), Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    assert!(harness.manager.was_loaded(&handle));
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(true)]
    );
}

#[test]
fn undecodable_payload_fails() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());

    harness.complete(&harness.last_fetch(), Ok(Some(b"not an image".to_vec())));
    harness.manager.update();

    assert_eq!(harness.manager.load_state(&handle), LoadState::Failed);
    assert_eq!(
        harness.manager.last_error(&handle).unwrap().category(),
        LoadErrorCategory::Decode
    );
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(false)]
    );
}

#[test]
fn reload_discards_the_superseded_fetch() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());
    let first = harness.last_fetch();

    assert!(harness.manager.load(&handle));
    let second = harness.last_fetch();
    assert!(first.cancel.is_cancelled());
    assert!(!second.cancel.is_cancelled());
    assert_ne!(first.generation, second.generation);

    // The stale result arrives first and must not win
    harness.complete(&first, Ok(Some(png_bytes(1, 1))));
    harness.complete(&second, Ok(Some(png_bytes(2, 2))));
    harness.manager.update();

    let texture = harness.manager.asset(&handle).unwrap().texture().unwrap();
    assert_eq!((texture.width, texture.height), (2, 2));
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(true)]
    );
}

#[test]
fn failed_reload_keeps_the_previous_asset() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());
    harness.complete(&harness.last_fetch(), Ok(Some(png_bytes(1, 1))));
    harness.manager.update();

    assert!(harness.manager.load(&handle));
    harness.complete(&harness.last_fetch(), Err(LoadError::HttpStatus(500)));
    harness.manager.update();

    assert_eq!(harness.manager.load_state(&handle), LoadState::Failed);
    assert!(harness.manager.asset(&handle).is_some());
    assert!(!consumer
        .take_events()
        .iter()
        .any(|event| matches!(event, ConsumerEvent::Released(_))));
}

#[test]
fn replaced_asset_is_released() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());
    harness.complete(&harness.last_fetch(), Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    consumer.take_events();

    assert!(harness.manager.load(&handle));
    harness.complete(&harness.last_fetch(), Ok(Some(png_bytes(2, 2))));
    harness.manager.update();

    assert_eq!(
        consumer.take_events(),
        vec![
            ConsumerEvent::Released("y".to_string()),
            ConsumerEvent::Loading(1.0),
            ConsumerEvent::Loaded(true)
        ]
    );
}

#[test]
fn unload_releases_exactly_once() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());
    harness.complete(&harness.last_fetch(), Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    consumer.take_events();

    harness.manager.unload(&handle);
    assert_eq!(harness.manager.load_state(&handle), LoadState::Idle);
    assert!(harness.manager.asset(&handle).is_none());
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Released("y".to_string())]
    );

    harness.manager.unload(&handle);
    assert!(consumer.take_events().is_empty());
}

#[test]
fn unload_while_loading_is_silent() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());
    let fetch = harness.last_fetch();

    harness.manager.unload(&handle);
    assert!(fetch.cancel.is_cancelled());

    harness.complete(&fetch, Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    assert_eq!(harness.manager.load_state(&handle), LoadState::Idle);
    assert!(consumer.take_events().is_empty());
}

#[test]
fn empty_path_is_rejected_without_events() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(RequestDesc::new(
        RequestSource::location(AssetLocation::PathOrUrl, ""),
        AssetKind::Texture,
    ));

    assert!(!harness.manager.load(&handle));
    harness.manager.update();

    assert!(harness.fetches().is_empty());
    assert_eq!(harness.manager.load_state(&handle), LoadState::Idle);
    assert!(matches!(
        harness.manager.last_error(&handle),
        Some(LoadError::EmptyPath)
    ));
    assert!(consumer.take_events().is_empty());
}

#[test]
fn malformed_url_is_rejected_without_io() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(
        RequestDesc::new(
            RequestSource::location(AssetLocation::PathOrUrl, "http://"),
            AssetKind::Texture,
        )
        .with_load_on_enable(false),
    );

    assert!(!harness.manager.load(&handle));
    harness.manager.update();

    assert!(harness.fetches().is_empty());
    assert_eq!(harness.manager.load_state(&handle), LoadState::Idle);
    assert_eq!(
        harness.manager.last_error(&handle).unwrap().category(),
        LoadErrorCategory::MalformedLocation
    );
    assert!(consumer.take_events().is_empty());
}

#[test]
fn relative_paths_resolve_against_store_roots() {
    let mut harness = TestHarness::new();
    let (_handle, _consumer) = harness.request(RequestDesc::new(
        RequestSource::location(AssetLocation::BundledStore, "textures\\grass.png"),
        AssetKind::Texture,
    ));

    let fetch = harness.last_fetch();
    assert_eq!(fetch.url.scheme(), "file");
    assert!(fetch.url.path().ends_with("/bundled/textures/grass.png"));
}

#[test]
fn apply_waits_for_the_fetch_in_flight() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());

    assert_eq!(harness.manager.apply(&handle), ApplyOutcome::Deferred);
    assert!(consumer.take_events().is_empty());

    harness.complete(&harness.last_fetch(), Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    assert_eq!(
        consumer.take_events(),
        vec![
            ConsumerEvent::Loading(1.0),
            ConsumerEvent::Loaded(true),
            ConsumerEvent::Applied(Some("y".to_string()))
        ]
    );

    // With nothing in flight the asset is applied right away
    assert_eq!(harness.manager.apply(&handle), ApplyOutcome::Applied);
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Applied(Some("y".to_string()))]
    );
}

#[test]
fn deferred_apply_still_runs_after_failure() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc().with_load_on_enable(false));

    assert!(harness.manager.load_and_apply(&handle));
    harness.complete(&harness.last_fetch(), Err(LoadError::HttpError("reset".into())));
    harness.manager.update();

    assert_eq!(
        consumer.take_events(),
        vec![
            ConsumerEvent::Loading(1.0),
            ConsumerEvent::Loaded(false),
            ConsumerEvent::Applied(None)
        ]
    );
}

#[test]
fn load_on_enable_off_waits_for_an_explicit_load() {
    let mut harness = TestHarness::new();
    let (handle, _consumer) = harness.request(image_desc().with_load_on_enable(false));

    assert!(harness.fetches().is_empty());
    assert_eq!(harness.manager.load_state(&handle), LoadState::Idle);
    assert!(harness.manager.load(&handle));
    assert_eq!(harness.fetches().len(), 1);
}

#[test]
fn disable_aborts_and_enable_reloads() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());
    let first = harness.last_fetch();
    assert_eq!(harness.manager.apply(&handle), ApplyOutcome::Deferred);

    harness.manager.set_active(&handle, false);
    assert!(first.cancel.is_cancelled());
    assert_eq!(harness.manager.load_state(&handle), LoadState::Idle);

    // A late result and the dropped apply both stay silent
    harness.complete(&first, Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    assert!(consumer.take_events().is_empty());

    assert!(!harness.manager.load(&handle));
    assert!(matches!(
        harness.manager.last_error(&handle),
        Some(LoadError::Inactive)
    ));

    harness.manager.set_active(&handle, true);
    assert_eq!(harness.fetches().len(), 2);
    harness.complete(&harness.last_fetch(), Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    assert!(harness.manager.was_loaded(&handle));
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(true)]
    );
}

#[test]
fn source_is_locked_while_loading() {
    let mut harness = TestHarness::new();
    let (handle, _consumer) = harness.request(image_desc());
    let other = RequestSource::location(AssetLocation::PathOrUrl, "http://x/z.png");

    assert!(!harness.manager.set_source(&handle, other.clone()));

    harness.complete(&harness.last_fetch(), Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    assert!(harness.manager.set_source(&handle, other));
    assert!(harness.manager.load(&handle));
    assert_eq!(harness.last_fetch().url.as_str(), "http://x/z.png");
}

#[test]
fn zero_timeout_fails_on_the_next_tick() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc().with_timeout(Duration::ZERO));
    let fetch = harness.last_fetch();

    harness.manager.update();

    assert!(fetch.cancel.is_cancelled());
    assert_eq!(harness.manager.load_state(&handle), LoadState::Failed);
    assert!(matches!(
        harness.manager.last_error(&handle),
        Some(LoadError::Timeout(_))
    ));
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(false)]
    );

    // Too late
    harness.complete(&fetch, Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    assert_eq!(harness.manager.load_state(&handle), LoadState::Failed);
    assert!(consumer.take_events().is_empty());
}

#[test]
fn dropping_the_handle_destroys_the_request() {
    let mut harness = TestHarness::new();
    let (loaded, loaded_consumer) = harness.request(image_desc());
    harness.complete(&harness.last_fetch(), Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    loaded_consumer.take_events();

    let (loading, loading_consumer) = harness.request(image_desc());
    let in_flight = harness.last_fetch();
    assert_eq!(harness.manager.loader().active_requests().len(), 2);

    drop(loaded);
    drop(loading);
    harness.complete(&in_flight, Ok(Some(png_bytes(1, 1))));
    harness.manager.update();

    assert!(harness.manager.loader().active_requests().is_empty());
    assert!(in_flight.cancel.is_cancelled());
    assert_eq!(
        loaded_consumer.take_events(),
        vec![ConsumerEvent::Released("y".to_string())]
    );
    assert!(loading_consumer.take_events().is_empty());
}

#[test]
fn missing_resource_loads_as_empty() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(text_resource_desc(None));

    // Resources resolve on the next tick without touching IO
    assert!(harness.manager.is_loading(&handle));
    harness.manager.update();

    assert!(harness.fetches().is_empty());
    assert!(harness.manager.was_loaded(&handle));
    assert!(harness.manager.asset(&handle).is_none());
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(true)]
    );
}

#[test]
fn resources_follow_the_selected_language() {
    let mut harness = TestHarness::new();
    harness
        .manager
        .resources_mut()
        .insert("ui/title.txt", b"hello".to_vec());
    harness
        .manager
        .resources_mut()
        .insert("Japanese/ui/title.txt", "こんにちは".as_bytes().to_vec());

    let (neutral, _) = harness.request(text_resource_desc(None));
    let (japanese, _) = harness.request(text_resource_desc(Some(
        crate::LanguageSelection::Explicit(crate::Language::Japanese),
    )));
    let (french, _) = harness.request(text_resource_desc(Some(
        crate::LanguageSelection::Explicit(crate::Language::French),
    )));
    harness.manager.update();

    let text = |handle: &RequestHandle| {
        harness
            .manager
            .asset(handle)
            .and_then(|asset| asset.text())
            .map(|text| text.to_string())
    };
    assert_eq!(text(&neutral).as_deref(), Some("hello"));
    assert_eq!(text(&japanese).as_deref(), Some("こんにちは"));
    // No French copy exists
    assert!(harness.manager.was_loaded(&french));
    assert_eq!(text(&french), None);
}

#[test]
fn save_writes_the_fetched_bytes() {
    let mut harness = TestHarness::new();
    let bytes = png_bytes(2, 2);

    let (plain, _) = harness.request(image_desc());
    harness.complete(&harness.last_fetch(), Ok(Some(bytes.clone())));
    let (retained, _) = harness.request(image_desc().with_retained_payload());
    harness.complete(&harness.last_fetch(), Ok(Some(bytes.clone())));
    harness.manager.update();

    assert!(!harness
        .manager
        .save(&plain, AssetLocation::PersistentStore, "cache/y.png"));
    assert!(!harness.manager.was_saved(&plain));

    assert!(!harness
        .manager
        .save(&retained, AssetLocation::BundledStore, "cache/y.png"));
    assert!(!harness.manager.was_saved(&retained));
    let bundled_path = harness
        .manager
        .loader()
        .roots()
        .resolve_path(AssetLocation::BundledStore, "cache/y.png")
        .unwrap();
    assert!(!bundled_path.exists());

    assert!(harness
        .manager
        .save(&retained, AssetLocation::PersistentStore, "cache/y.png"));
    assert!(harness.manager.was_saved(&retained));

    let path = harness
        .manager
        .loader()
        .roots()
        .resolve_path(AssetLocation::PersistentStore, "cache/y.png")
        .unwrap();
    assert_eq!(std::fs::read(path).unwrap(), bytes);
}

#[test]
fn direct_resolution_skips_io() {
    let mut harness = TestHarness::new();
    harness
        .manager
        .set_direct_resolver(Some(Box::new(HeldTextureResolver { path: IMAGE_URL })));
    let (handle, consumer) = harness.request(image_desc());

    // Resolved during creation, before any update
    assert!(harness.fetches().is_empty());
    assert!(harness.manager.was_loaded(&handle));
    let texture = harness.manager.asset(&handle).unwrap().texture().unwrap();
    assert_eq!((texture.width, texture.height), (3, 5));
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(true)]
    );
}

#[test]
fn direct_resolution_supersedes_the_fetch_in_flight() {
    let mut harness = TestHarness::new();
    let (handle, consumer) = harness.request(image_desc());
    let in_flight = harness.last_fetch();

    harness
        .manager
        .set_direct_resolver(Some(Box::new(HeldTextureResolver { path: IMAGE_URL })));
    assert!(harness.manager.load(&handle));

    assert!(in_flight.cancel.is_cancelled());
    assert_eq!(harness.fetches().len(), 1);
    assert!(harness.manager.was_loaded(&handle));
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(true)]
    );

    // The abandoned fetch finishing later changes nothing
    harness.complete(&in_flight, Ok(Some(png_bytes(1, 1))));
    harness.manager.update();
    assert!(consumer.take_events().is_empty());
    let texture = harness.manager.asset(&handle).unwrap().texture().unwrap();
    assert_eq!((texture.width, texture.height), (3, 5));
}

#[test]
fn undecodable_resource_fails() {
    let mut harness = TestHarness::new();
    harness
        .manager
        .resources_mut()
        .insert("ui/title.txt", vec![0xFF, 0xFE, 0xFD]);
    let (handle, consumer) = harness.request(text_resource_desc(None));
    harness.manager.update();

    assert_eq!(harness.manager.load_state(&handle), LoadState::Failed);
    assert!(harness.manager.asset(&handle).is_none());
    assert_eq!(
        harness.manager.last_error(&handle).unwrap().category(),
        LoadErrorCategory::Decode
    );
    assert_eq!(
        consumer.take_events(),
        vec![ConsumerEvent::Loading(1.0), ConsumerEvent::Loaded(false)]
    );
}
