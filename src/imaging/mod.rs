//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Decode / encode** | `image` crate (JPEG, PNG, BMP, GIF), [`wbmp`] |
//! | **Resize** | Lanczos3, exact width, height derived from aspect ratio |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;
pub mod wbmp;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{scaled_dimensions, scaled_height};
pub use operations::{
    PlannedVariant, VariantRequest, VariantStatus, create_variants, get_dimensions, plan_variants,
};
pub use params::{OutputFormat, ResizeParams, ResizeTarget};
pub use rust_backend::RustBackend;
