use crate::Error;
use std::time::Duration;

/// Configuration parameters, most important the node endpoint and the window geometry
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(clap::Parser))]
#[cfg_attr(feature = "cli", command(author, version, about))]
pub struct Config {
    /// JSON-RPC endpoint of the node (eg. `https://eth.getblock.io/mainnet/`)
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub url: String,

    /// Api key sent in the `x-api-key` header of every request
    #[cfg_attr(feature = "cli", arg(long, env = "BLOCKS_WINDOW_API_KEY"))]
    pub api_key: Option<String>,

    /// Number of window start positions to evaluate, going back from the head block
    #[cfg_attr(feature = "cli", arg(short, long, default_value = "3"))]
    pub depth_count: u64,

    /// Number of consecutive blocks in a window
    #[cfg_attr(feature = "cli", arg(short, long, default_value = "100"))]
    pub window_size: u64,

    /// Number of threads summing transaction values
    #[cfg_attr(feature = "cli", arg(long, default_value = "3"))]
    pub workers: usize,

    /// Number of threads fetching blocks concurrently, keep 1 if the node doesn't tolerate
    /// parallel requests from the same client
    #[cfg_attr(feature = "cli", arg(long, default_value = "1"))]
    pub fetchers: usize,

    /// Size of the channel used to pass blocks from fetchers to workers
    #[cfg_attr(feature = "cli", arg(short, long, default_value = "0"))]
    pub channels_size: usize,

    /// Timeout of a single request to the node, in seconds
    #[cfg_attr(feature = "cli", arg(long, default_value = "30"))]
    pub timeout_secs: u64,
}

impl Config {
    /// Creates a config with `url` and defaults parameters
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            depth_count: 3,
            window_size: 100,
            workers: 3,
            fetchers: 1,
            channels_size: 0,
            timeout_secs: 30,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Number of blocks to fetch: `window_size + depth_count - 1`
    pub fn total_count(&self) -> Result<u64, Error> {
        self.validate()?;
        self.window_size
            .checked_add(self.depth_count - 1)
            .ok_or_else(|| Error::InvalidConfig("window_size + depth_count overflows".into()))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.depth_count == 0 {
            return Err(Error::InvalidConfig("depth_count must be at least 1".into()));
        }
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".into()));
        }
        if self.fetchers == 0 {
            return Err(Error::InvalidConfig("fetchers must be at least 1".into()));
        }
        Ok(())
    }
}
