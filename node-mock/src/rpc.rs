//! JSON-RPC dispatch over the mock chain.
//!
//! Serves the methods the wallet client uses: `eth_getBalance`,
//! `eth_getBlockByNumber`, `teth_topAccounts` and `teth_faucet`. Quantities
//! are encoded as 0x-hex strings, block objects carry their transactions as
//! an array of hashes.

use serde_json::{json, Value};

use crate::state::{ChainState, MockBlock};

const DEFAULT_TOP_LIMIT: usize = 5;

fn encode_quantity(amount: u128) -> String {
    format!("0x{:x}", amount)
}

fn encode_block(block: &MockBlock) -> Value {
    let transactions: Vec<String> = (0..block.tx_count)
        .map(|i| format!("0x{:064x}", u128::from(block.number) << 16 | i as u128))
        .collect();
    json!({
        "number": encode_quantity(block.number.into()),
        "timestamp": encode_quantity(block.timestamp.into()),
        "hash": block.hash,
        "transactions": transactions,
    })
}

fn result_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

/// Handle one request frame and produce the response frame.
pub fn dispatch(chain: &ChainState, text: &str) -> Value {
    let request: Value = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(_) => return error_response(Value::Null, -32700, "parse error"),
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let Some(method) = request.get("method").and_then(|m| m.as_str()) else {
        return error_response(id, -32600, "invalid request");
    };
    let params = request.get("params").cloned().unwrap_or(json!([]));

    chain.record_call(method);
    log::debug!("serving {} {}", method, params);

    match method {
        "eth_getBalance" => {
            let Some(address) = params.get(0).and_then(|p| p.as_str()) else {
                return error_response(id, -32602, "expected [address, block]");
            };
            result_response(id, json!(encode_quantity(chain.balance(address))))
        }
        "eth_getBlockByNumber" => {
            let Some(selector) = params.get(0).and_then(|p| p.as_str()) else {
                return error_response(id, -32602, "expected [numberOrTag, fullTxs]");
            };
            let block = if selector == "latest" {
                chain.latest_block()
            } else {
                match u64::from_str_radix(selector.trim_start_matches("0x"), 16) {
                    Ok(number) => chain.block_by_number(number),
                    Err(_) => return error_response(id, -32602, "bad block number"),
                }
            };
            match block {
                Some(block) => result_response(id, encode_block(&block)),
                None => result_response(id, Value::Null),
            }
        }
        "teth_topAccounts" => {
            if chain.malformed_top_accounts() {
                return result_response(id, json!("service degraded"));
            }
            let rows: Vec<Value> = chain
                .top_accounts(DEFAULT_TOP_LIMIT)
                .into_iter()
                .map(|(address, amount)| json!([address, encode_quantity(amount)]))
                .collect();
            result_response(id, json!(rows))
        }
        "teth_faucet" => {
            let Some(address) = params.get(0).and_then(|p| p.as_str()) else {
                return error_response(id, -32602, "expected [address]");
            };
            match chain.faucet(address) {
                Ok(balance) => result_response(id, json!(encode_quantity(balance))),
                Err(reason) => error_response(id, -32000, reason),
            }
        }
        _ => error_response(id, -32601, "method not found"),
    }
}
