use crate::window::WindowResult;
use crate::Error;
use num_bigint::BigUint;
use std::fmt;

/// The final answer: the first block of the heaviest window and the window total value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub block_number: u64,
    pub total_value: BigUint,
}

impl Report {
    /// `window.start_index` is an offset going back from `head`
    pub fn new(head: u64, window: WindowResult) -> Result<Self, Error> {
        let block_number = u64::try_from(window.start_index)
            .ok()
            .and_then(|offset| head.checked_sub(offset))
            .ok_or_else(|| {
                Error::Pipeline(format!(
                    "window start {} is below block 0 from head {:#x}",
                    window.start_index, head
                ))
            })?;
        Ok(Report {
            block_number,
            total_value: window.total,
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block number: {:#x}, total transactions value: {}",
            self.block_number, self.total_value
        )
    }
}
