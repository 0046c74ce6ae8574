use crate::Error;
use num_bigint::BigUint;
use num_traits::Zero;

/// The heaviest window: offset of its first block and sum of its block totals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowResult {
    pub start_index: usize,
    pub total: BigUint,
}

/// Iterates `(start_index, sum)` of every `window_size` long window of `totals`, keeping a
/// running sum instead of summing each window
#[derive(Debug)]
pub struct WindowSums<'a> {
    totals: &'a [BigUint],
    window_size: usize,
    next: usize,
    sum: BigUint,
}

impl<'a> WindowSums<'a> {
    pub fn new(totals: &'a [BigUint], window_size: usize) -> Result<Self, Error> {
        if window_size == 0 || window_size > totals.len() {
            return Err(Error::InvalidConfig(format!(
                "window of {} blocks over {} totals",
                window_size,
                totals.len()
            )));
        }
        Ok(WindowSums {
            totals,
            window_size,
            next: 0,
            sum: BigUint::zero(),
        })
    }
}

impl<'a> Iterator for WindowSums<'a> {
    type Item = (usize, BigUint);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.totals.len() {
            let i = self.next;
            self.next += 1;
            self.sum += &self.totals[i];
            if i >= self.window_size {
                // was added `window_size` steps ago, can't underflow
                self.sum -= &self.totals[i - self.window_size];
            }
            if i + 1 >= self.window_size {
                return Some((i + 1 - self.window_size, self.sum.clone()));
            }
        }
        None
    }
}

/// Find the `window_size` long window with the maximum sum.
///
/// Ties are resolved in favour of the window found last, the one with the highest start index.
pub fn max_window(totals: &[BigUint], window_size: usize) -> Result<WindowResult, Error> {
    let mut best = WindowResult {
        start_index: 0,
        total: BigUint::zero(),
    };
    for (start_index, sum) in WindowSums::new(totals, window_size)? {
        if sum >= best.total {
            best = WindowResult {
                start_index,
                total: sum,
            };
        }
    }
    Ok(best)
}
