use std::fmt;

/// The remote call an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `eth_blockNumber`
    HeadLookup,

    /// `eth_getBlockByNumber` for the contained block number
    BlockFetch(u64),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::HeadLookup => write!(f, "head block lookup"),
            Operation::BlockFetch(number) => write!(f, "fetch of block {:#x}", number),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network failure during {operation}: {source}")]
    Network {
        operation: Operation,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("protocol failure during {operation}: {reason}")]
    Protocol { operation: Operation, reason: String },

    #[error("block {block_number:#x} tx #{tx_index}: cannot parse value {value:?}")]
    ValueParse {
        block_number: u64,
        tx_index: usize,
        value: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("pipeline failure: {0}")]
    Pipeline(String),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub(crate) fn network<E>(operation: Operation, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Network {
            operation,
            source: Box::new(source),
        }
    }

    pub(crate) fn protocol<S: Into<String>>(operation: Operation, reason: S) -> Self {
        Error::Protocol {
            operation,
            reason: reason.into(),
        }
    }
}
