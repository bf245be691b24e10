//! JSON-RPC wire format of the teth node.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[serde(default)]
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Parse a chain quantity: a 0x-prefixed hex string, a bare decimal string,
/// or a plain JSON number.
pub fn parse_quantity(value: &Value) -> Result<u128, String> {
    match value {
        Value::String(s) => {
            if let Some(hex) = s.strip_prefix("0x") {
                u128::from_str_radix(hex, 16).map_err(|e| format!("bad hex quantity {}: {}", s, e))
            } else {
                s.parse::<u128>()
                    .map_err(|e| format!("bad decimal quantity {}: {}", s, e))
            }
        }
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| format!("bad numeric quantity {}", n)),
        other => Err(format!("expected quantity, got {}", other)),
    }
}

/// Which block to ask the node for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSelector {
    Latest,
    Number(u64),
}

impl BlockSelector {
    pub(crate) fn to_param(self) -> String {
        match self {
            BlockSelector::Latest => "latest".to_string(),
            BlockSelector::Number(n) => format!("0x{:x}", n),
        }
    }
}

/// One block as kept in the trailing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub number: u64,
    /// Seconds since epoch
    pub timestamp: u64,
    pub tx_count: usize,
    pub hash: String,
}

impl BlockRecord {
    /// Decode the node's block object. Transactions arrive as an array of
    /// hashes; only their count is kept.
    pub(crate) fn from_rpc(value: &Value) -> Result<Self, String> {
        let obj = value.as_object().ok_or("expected block object")?;

        let number = parse_quantity(obj.get("number").ok_or("missing block number")?)?;
        let number = u64::try_from(number).map_err(|_| format!("block number {} out of range", number))?;

        let timestamp = parse_quantity(obj.get("timestamp").ok_or("missing timestamp")?)?;
        let timestamp =
            u64::try_from(timestamp).map_err(|_| format!("timestamp {} out of range", timestamp))?;

        let tx_count = obj
            .get("transactions")
            .and_then(|t| t.as_array())
            .map(|a| a.len())
            .unwrap_or(0);

        let hash = obj
            .get("hash")
            .and_then(|h| h.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            number,
            timestamp,
            tx_count,
            hash,
        })
    }
}
