//! Directory listing module - metadata, sorting, reading, streaming, and the sorted view.

pub(crate) mod metadata;
pub(crate) mod reading;
pub(crate) mod sorting;
pub(crate) mod streaming;
pub(crate) mod view;

pub use metadata::EntryMetadata;
pub use reading::{DirectoryStream, list_directory};
pub use sorting::{SortDirection, SortKey, compare_entries, sort_entries};
pub use streaming::{Population, PopulationState, spawn_population};
pub use view::{
    EntryCounts, InsertOutcome, RemoveOutcome, RenameOutcome, SortedEntryView, UpdateOutcome, ViewChange,
};

#[cfg(test)]
mod sorting_test;
