//! Generation backends for recurchat.
//!
//! All backends implement the `recurchat_core::Backend` trait.
//! The registry maps model identifiers to loaded backends.

#[cfg(feature = "local")]
pub mod local;
pub mod openai_compat;
pub mod registry;

#[cfg(feature = "local")]
pub use local::LocalBackend;
pub use openai_compat::OpenAiCompatBackend;
pub use registry::{build_from_config, BackendRegistry};
