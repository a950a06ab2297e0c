//! The in-memory representation of loaded assets. The binary layouts of models, animations
//! and collision meshes belong to their respective parsers, down here they are opaque blobs
//! that made it through an [`decoder::AssetDecoder`]. Textures are the exception, as they have
//! to be decoded to pixels to be packed into the atlas.

use std::fmt::{Display, Formatter};

pub mod decoder;
pub mod handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Model,
    Texture,
    Animation,
    Collision,
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssetKind::Model => "model",
            AssetKind::Texture => "texture",
            AssetKind::Animation => "animation",
            AssetKind::Collision => "collision",
        };
        f.write_str(name)
    }
}

/// A payload that has been validated by the decoder, but is otherwise kept as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub name: String,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }
}

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub transparent: bool,
}

impl DecodedTexture {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let transparent = pixels.chunks_exact(4).any(|texel| texel[3] < u8::MAX);
        Self {
            width,
            height,
            pixels,
            transparent,
        }
    }
}

/// The result of a loader job's work, waiting to be applied to the registry.
#[derive(Debug)]
pub enum Payload {
    Model(Blob),
    Texture(DecodedTexture),
    Animation(Blob),
    Collision(Blob),
}

impl Payload {
    pub fn kind(&self) -> AssetKind {
        match self {
            Payload::Model(_) => AssetKind::Model,
            Payload::Texture(_) => AssetKind::Texture,
            Payload::Animation(_) => AssetKind::Animation,
            Payload::Collision(_) => AssetKind::Collision,
        }
    }
}
