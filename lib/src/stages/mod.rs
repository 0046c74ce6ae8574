mod fetch;
mod sum;

pub use fetch::{Fetch, FetchedBlock};
pub use sum::{parse_value, Sum};
