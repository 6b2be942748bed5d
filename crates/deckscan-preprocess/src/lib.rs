//! # deckscan-preprocess
//!
//! Turns an untrusted upload into a sanitised image and a deterministic,
//! ordered ladder of OCR variants.

mod denoise;
mod sanitize;
mod variants;

pub use sanitize::{sanitize, SanitizeError};
pub use variants::{variant_ladder, Variant};
