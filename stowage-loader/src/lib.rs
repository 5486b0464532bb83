pub mod bundle;
pub mod config;
pub mod consumer;
pub mod decode;
pub mod error;
mod fetch_io;
pub mod loader;
pub mod resources;

#[cfg(feature = "preview")]
pub mod preview;

#[cfg(test)]
mod tests;

pub use crate::bundle::AssetBundle;
pub use crate::config::LoaderConfig;
pub use crate::consumer::{AssetConsumer, DetachedConsumer};
pub use crate::decode::{
    AssetData, AudioClip, AudioFormat, LoadedAsset, Sprite, SpriteRect, Texture,
};
pub use crate::error::{LoadError, LoadErrorCategory, LoadResult};
pub use crate::fetch_io::DefaultLoaderIO;
pub use crate::loader::{
    ApplyOutcome, DirectResolver, FetchPayload, FetchRequest, LoadInfo, Loader, LoaderEvent,
    LoaderIO, RequestDesc, RequestSource,
};
pub use crate::resources::{system_language, Language, LanguageSelection, ResourceRegistry};
pub use stowage_base::{AssetKind, AssetLocation, BufferContent, LoadHandle, LoadState, StoreRoots};

use crossbeam_channel::{Receiver, Sender};

// Requests are owned by a RequestHandle on the application side. Dropping the handle can happen
// anywhere, so it only queues a RefOp and the loader tears the request down on its next update.
#[derive(Debug)]
pub enum RefOp {
    Destroy(LoadHandle),
}

pub fn process_ref_ops(
    loader: &mut Loader,
    rx: &Receiver<RefOp>,
) {
    while let Ok(ref_op) = rx.try_recv() {
        match ref_op {
            RefOp::Destroy(load_handle) => loader.destroy(load_handle),
        }
    }
}

/// Owns one request. The request is destroyed on the next `update()` after this is dropped, its
/// fetch abandoned without callbacks and its asset released.
#[derive(Debug)]
pub struct RequestHandle {
    load_handle: LoadHandle,
    ref_op_tx: Sender<RefOp>,
}

impl RequestHandle {
    pub fn load_handle(&self) -> LoadHandle {
        self.load_handle
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        // The manager may already be gone, in which case there is nothing to clean up
        let _ = self.ref_op_tx.send(RefOp::Destroy(self.load_handle));
    }
}

pub struct AssetManager {
    loader: Loader,
    ref_op_tx: Sender<RefOp>,
    ref_op_rx: Receiver<RefOp>,
}

impl AssetManager {
    pub fn new(config: LoaderConfig) -> LoadResult<Self> {
        Self::with_loader_io(config, |config, loader_events_tx| {
            let loader_io: Box<dyn LoaderIO> =
                Box::new(DefaultLoaderIO::new(config, loader_events_tx)?);
            Ok(loader_io)
        })
    }

    /// Builds a manager around a custom data source. The closure receives the sender IO must
    /// report its `LoaderEvent`s on.
    pub fn with_loader_io<F>(
        config: LoaderConfig,
        create_loader_io: F,
    ) -> LoadResult<Self>
    where
        F: FnOnce(&LoaderConfig, Sender<LoaderEvent>) -> LoadResult<Box<dyn LoaderIO>>,
    {
        let (ref_op_tx, ref_op_rx) = crossbeam_channel::unbounded();
        let (loader_events_tx, loader_events_rx) = crossbeam_channel::unbounded();

        let loader_io = create_loader_io(&config, loader_events_tx.clone())?;
        let loader = Loader::new(
            loader_io,
            loader_events_tx,
            loader_events_rx,
            config.roots.clone(),
            config.fetch_timeout(),
        );

        log::info!(
            "Asset manager for {} ready, persistent store at {:?}",
            config.application_name,
            config.roots.persistent_root
        );

        Ok(AssetManager {
            loader,
            ref_op_tx,
            ref_op_rx,
        })
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut Loader {
        &mut self.loader
    }

    pub fn resources(&self) -> &ResourceRegistry {
        self.loader.resources()
    }

    pub fn resources_mut(&mut self) -> &mut ResourceRegistry {
        self.loader.resources_mut()
    }

    pub fn set_direct_resolver(
        &mut self,
        resolver: Option<Box<dyn DirectResolver>>,
    ) {
        self.loader.set_direct_resolver(resolver);
    }

    pub fn create_request(
        &mut self,
        desc: RequestDesc,
        consumer: Box<dyn AssetConsumer>,
    ) -> RequestHandle {
        let load_handle = self.loader.create_request(desc, consumer);
        RequestHandle {
            load_handle,
            ref_op_tx: self.ref_op_tx.clone(),
        }
    }

    pub fn load(
        &mut self,
        handle: &RequestHandle,
    ) -> bool {
        self.loader.load(handle.load_handle)
    }

    pub fn unload(
        &mut self,
        handle: &RequestHandle,
    ) {
        self.loader.unload(handle.load_handle)
    }

    pub fn apply(
        &mut self,
        handle: &RequestHandle,
    ) -> ApplyOutcome {
        self.loader.apply(handle.load_handle)
    }

    pub fn load_and_apply(
        &mut self,
        handle: &RequestHandle,
    ) -> bool {
        self.loader.load_and_apply(handle.load_handle)
    }

    pub fn set_active(
        &mut self,
        handle: &RequestHandle,
        active: bool,
    ) {
        self.loader.set_active(handle.load_handle, active)
    }

    pub fn set_source(
        &mut self,
        handle: &RequestHandle,
        source: RequestSource,
    ) -> bool {
        self.loader.set_source(handle.load_handle, source)
    }

    pub fn save(
        &mut self,
        handle: &RequestHandle,
        location: AssetLocation,
        path: &str,
    ) -> bool {
        self.loader.save(handle.load_handle, location, path)
    }

    pub fn load_state(
        &self,
        handle: &RequestHandle,
    ) -> LoadState {
        self.loader.load_state(handle.load_handle)
    }

    pub fn was_loaded(
        &self,
        handle: &RequestHandle,
    ) -> bool {
        self.loader.was_loaded(handle.load_handle)
    }

    pub fn was_saved(
        &self,
        handle: &RequestHandle,
    ) -> bool {
        self.loader.was_saved(handle.load_handle)
    }

    pub fn is_loading(
        &self,
        handle: &RequestHandle,
    ) -> bool {
        self.loader.is_loading(handle.load_handle)
    }

    pub fn progress(
        &self,
        handle: &RequestHandle,
    ) -> Option<f32> {
        self.loader.progress(handle.load_handle)
    }

    pub fn asset(
        &self,
        handle: &RequestHandle,
    ) -> Option<&LoadedAsset> {
        self.loader.asset(handle.load_handle)
    }

    pub fn last_error(
        &self,
        handle: &RequestHandle,
    ) -> Option<&LoadError> {
        self.loader.last_error(handle.load_handle)
    }

    /// Call once per frame on the thread that owns the manager. All consumer callbacks happen in
    /// here.
    #[profiling::function]
    pub fn update(&mut self) {
        process_ref_ops(&mut self.loader, &self.ref_op_rx);
        self.loader.update();
    }
}
