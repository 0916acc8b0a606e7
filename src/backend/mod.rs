//! GPU backend abstraction.
//!
//! The frame graph is backend agnostic: everything it needs from the driver
//! is expressed by the [`RenderBackend`] trait and the descriptor types in
//! [`types`].

pub mod traits;
pub mod types;

pub use traits::*;
pub use types::*;
