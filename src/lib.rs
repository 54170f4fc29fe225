

#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,

    missing_copy_implementations,
    missing_debug_implementations,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    trivial_numeric_casts,
    redundant_semicolon
)]

#![forbid(unsafe_code)]


pub mod io; // public to allow for custom attribute byte parsing
pub mod error;
pub mod math;

pub mod bitio;
pub mod m32;
pub mod huffman;
pub mod predictors;

pub mod element;
pub mod compression;
pub mod tile;
pub mod store;
pub mod cache;
pub mod spec_file;
pub mod file;

/// Re-exports of the types commonly required to open, create, and use a
/// raster file.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::element::{ElementType, ElementSpec};
    pub use crate::spec_file::{FileSpecification, CoordinateSystem, GeometryType};
    pub use crate::compression::CodecRegistry;
    pub use crate::cache::CacheSize;
    pub use crate::file::{GvrsFile, OpenMode};
}
