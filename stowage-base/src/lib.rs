pub mod b3f;
pub mod handle;
pub mod location;

mod asset_kind;
pub use asset_kind::{AssetKind, BufferContent};

pub use handle::{CancelToken, FetchGeneration, LoadHandle, LoadState};
pub use location::{AssetLocation, LocationError, StoreRoots};

/// Default hashmap for stowage. Request lookups never see untrusted keys, so skip the secure hash.
pub type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
