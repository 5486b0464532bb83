//! Blocking helpers for tools that want to show an asset right away, for example an inspector
//! preview. Nothing here returns an error, problems come back as messages to display.

use crate::decode::{decode_payload, LoadedAsset};
use crate::loader::{DirectResolver, RequestSource};
use crate::{AssetManager, RequestHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stowage_base::{AssetKind, HashMap, LoadState};

const PREVIEW_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewMessage {
    Info(String),
    Warning(String),
}

#[derive(Debug, Clone)]
pub struct PreviewOutcome {
    pub load_state: LoadState,
    pub messages: Vec<PreviewMessage>,
}

impl PreviewOutcome {
    pub fn has_warnings(&self) -> bool {
        self.messages
            .iter()
            .any(|message| matches!(message, PreviewMessage::Warning(_)))
    }
}

/// Starts a load and pumps `update()` until it finishes or `timeout` passes
pub fn preview_load(
    manager: &mut AssetManager,
    handle: &RequestHandle,
    timeout: Duration,
) -> PreviewOutcome {
    let mut messages = Vec::default();

    if !manager.load(handle) {
        let reason = manager
            .last_error(handle)
            .map(|e| e.to_string())
            .unwrap_or_else(|| "the load did not start".to_string());
        messages.push(PreviewMessage::Warning(format!(
            "Nothing to preview: {}",
            reason
        )));
        return PreviewOutcome {
            load_state: manager.load_state(handle),
            messages,
        };
    }

    let deadline = Instant::now() + timeout;
    while manager.is_loading(handle) {
        manager.update();
        if !manager.is_loading(handle) {
            break;
        }

        if Instant::now() >= deadline {
            messages.push(PreviewMessage::Warning(format!(
                "Still loading after {:.1}s, the preview will update when it finishes",
                timeout.as_secs_f32()
            )));
            break;
        }
        std::thread::sleep(PREVIEW_POLL_INTERVAL);
    }

    let load_state = manager.load_state(handle);
    match load_state {
        LoadState::Loaded => match manager.asset(handle) {
            Some(asset) => messages.push(PreviewMessage::Info(format!("Loaded {}", asset.name))),
            None => messages.push(PreviewMessage::Info(
                "Loaded, but nothing exists at that path".to_string(),
            )),
        },
        LoadState::Failed => {
            let reason = manager
                .last_error(handle)
                .map(|e| e.to_string())
                .unwrap_or_default();
            messages.push(PreviewMessage::Warning(format!("Load failed: {}", reason)));
        }
        LoadState::Idle | LoadState::Loading => {}
    }

    PreviewOutcome {
        load_state,
        messages,
    }
}

/// Resolves requests to bytes the tool already holds, keyed by request path. The bytes are decoded
/// for every request, so each request owns its own asset.
#[derive(Default)]
pub struct InMemoryDirectResolver {
    entries: HashMap<String, Arc<[u8]>>,
}

impl InMemoryDirectResolver {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(
        &mut self,
        path: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) {
        self.entries.insert(path.into(), data.into());
    }

    pub fn remove(
        &mut self,
        path: &str,
    ) -> bool {
        self.entries.remove(path).is_some()
    }
}

impl DirectResolver for InMemoryDirectResolver {
    fn resolve(
        &self,
        source: &RequestSource,
        kind: AssetKind,
    ) -> Option<LoadedAsset> {
        let data = self.entries.get(source.path())?;
        match decode_payload(kind, source.path(), data.to_vec()) {
            Ok(asset) => Some(asset),
            Err(e) => {
                // Fall through to a normal load
                log::warn!("Held data for {} did not decode: {}", source.path(), e);
                None
            }
        }
    }
}
