use crate::decode::LoadedAsset;

/// Application side of a request. The loader calls these on the thread that drives
/// [`AssetManager::update`](crate::AssetManager::update), never from IO threads.
pub trait AssetConsumer {
    /// Binds the asset to whatever presents it. `None` when nothing is loaded, or when a resource
    /// load confirmed the resource does not exist.
    fn apply_asset(
        &mut self,
        asset: Option<&LoadedAsset>,
    );

    /// Fired every tick while a fetch is in flight, then once more with 1.0 when it finishes
    fn on_loading(
        &mut self,
        _progress: f32,
    ) {
    }

    /// Fired once for each `load()` that started a fetch
    fn on_loaded(
        &mut self,
        _success: bool,
    ) {
    }

    /// Receives an asset the request no longer owns, because it was replaced, unloaded, or the
    /// owner went away. Each asset is passed here exactly once.
    fn release_asset(
        &mut self,
        asset: LoadedAsset,
    ) {
        log::trace!("release asset {}", asset.name);
    }
}

/// Consumer for requests whose asset is only read back through the manager
pub struct DetachedConsumer;

impl AssetConsumer for DetachedConsumer {
    fn apply_asset(
        &mut self,
        _asset: Option<&LoadedAsset>,
    ) {
    }
}
