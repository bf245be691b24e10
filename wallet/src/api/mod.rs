//! HTTP surface for the rendering layer
//!
//! The entire contract offered to a renderer: read the snapshot, trigger
//! the faucet. Formatting and unit conversion stay on the rendering side.

pub mod handlers;
pub mod server;
pub mod types;
