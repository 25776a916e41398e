//! The shared shape of every algorithm's output: a tabular view with one row
//! per vertex and a single column. Each algorithm still returns its own
//! tagged result type (so that, e.g., `ConnectedComponentsResult` and
//! `ShortestPathsResult` remain distinguishable at the type level), but they
//! all implement this trait uniformly.

pub trait TableView {
    fn row_count(&self) -> usize;

    fn column_count(&self) -> usize {
        1
    }
}
