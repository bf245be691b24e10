//! Node connection layer
//!
//! - JSON-RPC wire types and quantity parsing
//! - WebSocket transport with multiplexed calls and observable state

mod protocol;
mod transport;

pub use protocol::{parse_quantity, BlockRecord, BlockSelector};
pub use transport::{ChainTransport, Connection, ConnectionState};
