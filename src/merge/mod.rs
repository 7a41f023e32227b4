pub mod archive;
pub mod consolidate;
pub mod table;

pub use consolidate::{Consolidator, MergeSummary};
pub use table::{FRAGMENT_PREFIX, Table, TableKind};
