//! Asset resolution and loading for the classic RenderWare games: a case-insensitive view
//! over loose files and `.img` containers, background decoding on a worker pool and packing
//! of textures into atlas pages.

pub mod assets;
pub mod data;
pub mod io;
pub mod jobs;
pub mod rendering;
pub mod settings;

#[cfg(test)]
mod test_utils;
