pub mod error;
pub mod img;
pub mod manifest;
pub mod path;
pub mod registry;
