//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / probe** | `image::load_from_memory`, `ImageReader::into_dimensions` |
//! | **Container checks** | custom walkers (PNG chunks + CRC, JPEG markers, GIF, TIFF, WebP) |
//! | **Resize / crop** | `resize_exact` (Lanczos3) + `crop_imm`, anchored geometry |
//! | **Adjust / reflect / transpose** | per-pixel blends, `imageops` flips and rotations |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for resize and crop geometry (unit testable)
//! - **Parameters**: Data structures describing stage parameters
//! - **Structure**: Byte-level container validation
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;
pub mod structure;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{CropBox, GeometryError, ResizePlan};
pub use params::{Adjustment, Crop, OutputFormat, Quality, Reflection, Resize, TransposeMethod};
pub use rust_backend::RustBackend;
