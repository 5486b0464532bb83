use serde::{Deserialize, Serialize};

/// What a text buffer keeps after a fetch
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum BufferContent {
    /// Decode the payload as UTF-8 text
    Text,
    /// Keep the raw bytes
    Bytes,
}

/// The declared type a request decodes its payload into. This is fixed when the request is created.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Texture,
    Sprite,
    AudioClip,
    AssetBundle,
    TextBuffer(BufferContent),
    /// Anything else, the payload is kept as-is
    Generic,
}

impl AssetKind {
    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Texture => "Texture",
            AssetKind::Sprite => "Sprite",
            AssetKind::AudioClip => "AudioClip",
            AssetKind::AssetBundle => "AssetBundle",
            AssetKind::TextBuffer(BufferContent::Text) => "TextBuffer(Text)",
            AssetKind::TextBuffer(BufferContent::Bytes) => "TextBuffer(Bytes)",
            AssetKind::Generic => "Generic",
        }
    }
}
