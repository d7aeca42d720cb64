//! Progress observers injected by the caller.
//!
//! Both are invoked synchronously on the calling thread. Closures implement
//! them directly, so `&mut |page, total| ...` works wherever an observer is
//! expected.

use haulout_core::ForkOutcome;

/// Notified after each page that leads to another page request.
pub trait HarvestObserver {
    fn page_done(&mut self, page_index: usize, total_items: usize);
}

impl<F> HarvestObserver for F
where
    F: FnMut(usize, usize),
{
    fn page_done(&mut self, page_index: usize, total_items: usize) {
        self(page_index, total_items)
    }
}

/// Notified after each repository outcome is appended to the ledger.
/// `position` is 1-based.
pub trait ForkObserver {
    fn item_done(&mut self, position: usize, total: usize, outcome: &ForkOutcome);
}

impl<F> ForkObserver for F
where
    F: FnMut(usize, usize, &ForkOutcome),
{
    fn item_done(&mut self, position: usize, total: usize, outcome: &ForkOutcome) {
        self(position, total, outcome)
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl HarvestObserver for Silent {
    fn page_done(&mut self, _page_index: usize, _total_items: usize) {}
}

impl ForkObserver for Silent {
    fn item_done(&mut self, _position: usize, _total: usize, _outcome: &ForkOutcome) {}
}
