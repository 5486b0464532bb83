use crate::bundle::AssetBundle;
use crate::error::{LoadError, LoadResult};
use stowage_base::{AssetKind, BufferContent};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const SPRITE_CENTER_PIVOT: [f32; 2] = [0.5, 0.5];

/// RGBA8 pixels, row-major
#[derive(Clone, PartialEq, Eq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl std::fmt::Debug for Texture {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpriteRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub texture: Texture,
    pub rect: SpriteRect,
    pub pivot: [f32; 2],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Ogg,
    Flac,
    Mp3,
}

/// Encoded audio. The container is identified but samples are left for the audio backend to decode.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub format: AudioFormat,
    // Only known for formats whose header we parse
    pub channels: Option<u16>,
    pub sample_rate: Option<u32>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for AudioClip {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("AudioClip")
            .field("format", &self.format)
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("data_length", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug)]
pub enum AssetData {
    Texture(Texture),
    Sprite(Sprite),
    AudioClip(AudioClip),
    AssetBundle(AssetBundle),
    Text(String),
    Bytes(Vec<u8>),
}

/// A decoded asset. Owned by exactly one request.
#[derive(Debug)]
pub struct LoadedAsset {
    pub name: String,
    pub data: AssetData,
}

impl LoadedAsset {
    pub fn texture(&self) -> Option<&Texture> {
        match &self.data {
            AssetData::Texture(texture) => Some(texture),
            AssetData::Sprite(sprite) => Some(&sprite.texture),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.data {
            AssetData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.data {
            AssetData::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Turns a fetched payload into the asset type the request declared.
///
/// `source` is the path or URL the payload came from. It names the asset and serves as a format
/// hint when the content itself is ambiguous.
#[profiling::function]
pub fn decode_payload(
    kind: AssetKind,
    source: &str,
    bytes: Vec<u8>,
) -> LoadResult<LoadedAsset> {
    let data = match kind {
        AssetKind::Texture => AssetData::Texture(decode_texture(&bytes)?),
        AssetKind::Sprite => {
            let texture = decode_texture(&bytes)?;
            let rect = SpriteRect {
                x: 0.0,
                y: 0.0,
                width: texture.width as f32,
                height: texture.height as f32,
            };
            AssetData::Sprite(Sprite {
                texture,
                rect,
                pivot: SPRITE_CENTER_PIVOT,
            })
        }
        AssetKind::AudioClip => AssetData::AudioClip(decode_audio_clip(source, bytes)?),
        AssetKind::AssetBundle => AssetData::AssetBundle(AssetBundle::open(bytes)?),
        AssetKind::TextBuffer(BufferContent::Text) => AssetData::Text(decode_text(bytes)?),
        AssetKind::TextBuffer(BufferContent::Bytes) | AssetKind::Generic => AssetData::Bytes(bytes),
    };

    Ok(LoadedAsset {
        name: asset_name_from_source(source),
        data,
    })
}

/// File name of a path or URL without its extension. Query strings and fragments are ignored.
pub fn asset_name_from_source(source: &str) -> String {
    let without_query = source
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let file_name = without_query
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name[..dot].to_string(),
        _ => file_name.to_string(),
    }
}

fn decode_texture(bytes: &[u8]) -> LoadResult<Texture> {
    let image = image::load_from_memory(bytes)?.into_rgba8();
    Ok(Texture {
        width: image.width(),
        height: image.height(),
        pixels: image.into_raw(),
    })
}

fn decode_text(mut bytes: Vec<u8>) -> LoadResult<String> {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }

    String::from_utf8(bytes)
        .map_err(|e| LoadError::DecodeError(format!("text is not UTF-8: {}", e)))
}

fn detect_audio_format(
    source: &str,
    bytes: &[u8],
) -> Option<AudioFormat> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some(AudioFormat::Wav);
    }
    if bytes.starts_with(b"OggS") {
        return Some(AudioFormat::Ogg);
    }
    if bytes.starts_with(b"fLaC") {
        return Some(AudioFormat::Flac);
    }
    // ID3 tag, or a bare MPEG frame sync
    let mpeg_frame_sync = bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0;
    if bytes.starts_with(b"ID3") || mpeg_frame_sync {
        return Some(AudioFormat::Mp3);
    }

    let without_query = source
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let extension = without_query.rsplit('.').next()?.to_ascii_lowercase();
    match extension.as_str() {
        "wav" | "wave" => Some(AudioFormat::Wav),
        "ogg" | "oga" => Some(AudioFormat::Ogg),
        "flac" => Some(AudioFormat::Flac),
        "mp3" => Some(AudioFormat::Mp3),
        _ => None,
    }
}

fn decode_audio_clip(
    source: &str,
    bytes: Vec<u8>,
) -> LoadResult<AudioClip> {
    let format = detect_audio_format(source, &bytes).ok_or_else(|| {
        LoadError::DecodeError(format!("could not identify audio format of {}", source))
    })?;

    let (channels, sample_rate) = match format {
        AudioFormat::Wav => {
            let (channels, sample_rate) = read_wav_format(&bytes)?;
            (Some(channels), Some(sample_rate))
        }
        _ => (None, None),
    };

    Ok(AudioClip {
        format,
        channels,
        sample_rate,
        bytes,
    })
}

// Walks the RIFF chunks looking for "fmt "
fn read_wav_format(bytes: &[u8]) -> LoadResult<(u16, u32)> {
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let chunk_id = &bytes[offset..offset + 4];
        let chunk_size = u32::from_le_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]) as usize;
        let body = offset + 8;

        if chunk_id == b"fmt " {
            if chunk_size < 16 || body + 16 > bytes.len() {
                return Err("WAV fmt chunk is truncated".into());
            }
            let channels = u16::from_le_bytes([bytes[body + 2], bytes[body + 3]]);
            let sample_rate = u32::from_le_bytes([
                bytes[body + 4],
                bytes[body + 5],
                bytes[body + 6],
                bytes[body + 7],
            ]);
            return Ok((channels, sample_rate));
        }

        // Chunks are padded to even sizes
        offset = body + chunk_size + (chunk_size & 1);
    }

    Err("WAV data has no fmt chunk".into())
}
