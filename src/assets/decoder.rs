use thiserror::Error;

use crate::assets::{AssetKind, Blob, DecodedTexture, Payload};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("The file contains no data")]
    EmptySource,

    #[error("The file is violating the expected format, because: {0}")]
    FormatError(String),

    #[error(transparent)]
    ImageError(#[from] image::ImageError),
}

/// Turns the raw bytes of an asset into something the registry can store. Decoders run on the
/// worker threads, so they must not reach into any shared engine state.
pub trait AssetDecoder: Send + Sync {
    fn decode(&self, kind: AssetKind, name: &str, bytes: Vec<u8>) -> Result<Payload, DecodeError>;
}

/// Keeps models, animations and collisions as opaque blobs and decodes textures with the
/// `image` crate.
#[derive(Default)]
pub struct BlobDecoder;

impl AssetDecoder for BlobDecoder {
    fn decode(&self, kind: AssetKind, name: &str, bytes: Vec<u8>) -> Result<Payload, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::EmptySource);
        }

        Ok(match kind {
            AssetKind::Texture => Payload::Texture(decode_image(&bytes)?),
            AssetKind::Model => Payload::Model(Blob::new(name, bytes)),
            AssetKind::Animation => Payload::Animation(Blob::new(name, bytes)),
            AssetKind::Collision => Payload::Collision(Blob::new(name, bytes)),
        })
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<DecodedTexture, DecodeError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::FormatError(format!("image is {}x{}", width, height)));
    }

    Ok(DecodedTexture::from_rgba(width, height, image.into_raw()))
}
