//! Mock teth node
//!
//! A WebSocket JSON-RPC server over an in-memory chain, for wallet
//! integration tests and local development. Tests link this crate and drive
//! the chain state directly; the binary serves a seeded chain.

pub mod rpc;
pub mod server;
pub mod state;

pub use server::{run_server, MockNode};
pub use state::{ChainState, MockBlock, WEI_PER_TETH};
