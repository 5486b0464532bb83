#[cfg(feature = "stowage-base")]
pub use stowage_base as base;

#[cfg(feature = "stowage-loader")]
pub use stowage_loader as loader;
