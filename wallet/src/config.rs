/// Wallet configuration from environment variables
///
/// Controls the node endpoint, refresh cadence and the shape of the derived
/// views. Defaults match a locally running teth node.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// How the sync loop reacts to a dead connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Never reconnect; the first connection is the only one.
    None,
    /// Retry with a fixed minimum delay between attempts.
    FixedDelay(Duration),
    /// Retry with exponentially growing delays, capped at `max`.
    Backoff { base: Duration, max: Duration },
}

const BACKOFF_BASE: Duration = Duration::from_secs(2);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

impl ReconnectPolicy {
    /// Minimum delay before the attempt following `failures` consecutive
    /// failed ones. `None` means no further attempt is allowed.
    pub fn delay_before(&self, failures: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::None => None,
            ReconnectPolicy::FixedDelay(delay) => Some(*delay),
            ReconnectPolicy::Backoff { base, max } => {
                Some(base.saturating_mul(1 << failures.min(6)).min(*max))
            }
        }
    }

    /// Parse "none", "fixed:<ms>" or "backoff".
    fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        if value == "none" {
            return Some(ReconnectPolicy::None);
        }
        if value == "backoff" {
            return Some(ReconnectPolicy::Backoff {
                base: BACKOFF_BASE,
                max: BACKOFF_MAX,
            });
        }
        if let Some(ms) = value.strip_prefix("fixed:") {
            return ms
                .parse::<u64>()
                .ok()
                .map(|ms| ReconnectPolicy::FixedDelay(Duration::from_millis(ms)));
        }
        None
    }
}

#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// WebSocket endpoint of the teth node
    pub node_ws_url: String,
    /// Directory holding the persisted account slot
    pub data_dir: PathBuf,
    /// Interval between refresh cycles
    pub refresh_interval: Duration,
    /// Number of blocks kept in the trailing window (latest included)
    pub block_window: usize,
    /// Number of entries kept in the richest-accounts ranking
    pub top_accounts: usize,
    /// Reconnect behavior after the connection drops
    pub reconnect: ReconnectPolicy,
}

impl WalletConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `NODE_WS_URL`: node endpoint (default `ws://localhost:8546`)
    /// - `WALLET_DATA_DIR`: account storage directory (default `./wallet-data`)
    /// - `REFRESH_INTERVAL_MS`: refresh cadence (default 2000)
    /// - `BLOCK_WINDOW`: trailing block window size (default 7)
    /// - `TOP_ACCOUNTS`: ranking length (default 5)
    /// - `RECONNECT_POLICY`: `none`, `fixed:<ms>` or `backoff` (default `backoff`)
    pub fn from_env() -> Self {
        let node_ws_url = env::var("NODE_WS_URL").unwrap_or_else(|_| {
            log::info!("Node endpoint: ws://localhost:8546 (default)");
            "ws://localhost:8546".to_string()
        });

        let data_dir = env::var("WALLET_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./wallet-data"));

        let refresh_interval = env::var("REFRESH_INTERVAL_MS")
            .ok()
            .and_then(|ms| ms.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(2000));

        let block_window = env::var("BLOCK_WINDOW")
            .ok()
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(7);

        let top_accounts = env::var("TOP_ACCOUNTS")
            .ok()
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(5);

        let reconnect = match env::var("RECONNECT_POLICY") {
            Ok(raw) => ReconnectPolicy::parse(&raw).unwrap_or_else(|| {
                log::warn!("Unknown RECONNECT_POLICY '{}', using backoff", raw);
                ReconnectPolicy::Backoff {
                    base: BACKOFF_BASE,
                    max: BACKOFF_MAX,
                }
            }),
            Err(_) => ReconnectPolicy::Backoff {
                base: BACKOFF_BASE,
                max: BACKOFF_MAX,
            },
        };

        Self {
            node_ws_url,
            data_dir,
            refresh_interval,
            block_window,
            top_accounts,
            reconnect,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            node_ws_url: "ws://localhost:8546".to_string(),
            data_dir: PathBuf::from("./wallet-data"),
            refresh_interval: Duration::from_millis(2000),
            block_window: 7,
            top_accounts: 5,
            reconnect: ReconnectPolicy::Backoff {
                base: BACKOFF_BASE,
                max: BACKOFF_MAX,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WalletConfig::default();
        assert_eq!(config.node_ws_url, "ws://localhost:8546");
        assert_eq!(config.block_window, 7);
        assert_eq!(config.top_accounts, 5);
    }

    #[test]
    fn test_parse_reconnect_policy() {
        assert_eq!(ReconnectPolicy::parse("none"), Some(ReconnectPolicy::None));
        assert_eq!(
            ReconnectPolicy::parse("fixed:500"),
            Some(ReconnectPolicy::FixedDelay(Duration::from_millis(500)))
        );
        assert!(matches!(
            ReconnectPolicy::parse("backoff"),
            Some(ReconnectPolicy::Backoff { .. })
        ));
        assert_eq!(ReconnectPolicy::parse("sometimes"), None);
    }

    #[test]
    fn test_backoff_delay_caps() {
        let policy = ReconnectPolicy::Backoff {
            base: Duration::from_secs(2),
            max: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_before(0), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_before(1), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_before(10), Some(Duration::from_secs(60)));
        assert_eq!(ReconnectPolicy::None.delay_before(0), None);
    }
}
