//! facesort — copy every photo that contains a given person's face.
//!
//! A run encodes the face in a reference image, scans a dataset folder and
//! copies each image holding a face within the distance tolerance into an
//! output folder. See [`sorter::copy_images_with_face`].

pub mod config;
pub mod discovery;
pub mod logging;
pub mod sorter;

pub use config::{Config, ConfigError};
pub use sorter::{copy_images_with_face, SortError, SortOptions, SortReport};
