//! Sort keys and the total order used by the sorted view.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::file_system::listing::metadata::EntryMetadata;

// ============================================================================
// Sorting configuration
// ============================================================================

/// Column to sort entries by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Type,
    Modified,
}

/// Sort direction (ascending or descending).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

// ============================================================================
// Sorting logic
// ============================================================================

/// Compares two strings using natural (alphanumeric) sort, case-insensitive.
fn compare_names_natural(a: &str, b: &str) -> Ordering {
    alphanumeric_sort::compare_str(a.to_lowercase(), b.to_lowercase())
}

/// Compares two entries under `key` and `direction`.
///
/// Directories always come first, whatever the key or direction. Ties on the key fall
/// back to natural case-insensitive name, then to the raw name, so the order is total
/// and binary search over a sorted view is well-defined.
pub fn compare_entries(a: &EntryMetadata, b: &EntryMetadata, key: SortKey, direction: SortDirection) -> Ordering {
    match (a.is_directory, b.is_directory) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let primary = match key {
        SortKey::Name => Ordering::Equal,
        SortKey::Size => a.size.cmp(&b.size),
        SortKey::Type => compare_names_natural(&a.type_label, &b.type_label),
        SortKey::Modified => a.modified_at.cmp(&b.modified_at),
    };

    let ordering = primary
        .then_with(|| compare_names_natural(&a.name, &b.name))
        .then_with(|| a.name.cmp(&b.name));

    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Sorts entries by the given key and direction. Directories always come first.
pub fn sort_entries(entries: &mut [EntryMetadata], key: SortKey, direction: SortDirection) {
    entries.sort_by(|a, b| compare_entries(a, b, key, direction));
}
