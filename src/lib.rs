#![allow(non_snake_case, non_upper_case_globals)]

//! IFS container codec: header/manifest/data-blob handling, the folder/file
//! tree model, texture decode/encode, AVSLZ compression, and cross-IFS
//! "super" reference resolution.

pub mod archive;
pub mod bytecursor;
pub mod cache;
pub mod container;
pub mod error;
pub mod lz77;
pub mod name;
pub mod options;
pub mod pixel;
pub mod tree;
pub mod xmldoc;

pub use archive::Archive;
pub use cache::CachePolicy;
pub use container::Container;
pub use error::IfsError;
pub use options::{ExtractOptions, RepackOptions};
pub use tree::super_ref::SuperPolicy;
