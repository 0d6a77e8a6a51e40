//! Tests for entry ordering

use super::metadata::EntryMetadata;
use super::sorting::{SortDirection, SortKey, compare_entries, sort_entries};
use std::cmp::Ordering;
use std::path::PathBuf;

fn make_entry(name: &str, is_directory: bool, size: u64, modified_at: u64) -> EntryMetadata {
    EntryMetadata {
        path: PathBuf::from(format!("/dir/{}", name)),
        name: name.to_string(),
        is_directory,
        is_symlink: false,
        size,
        modified_at,
        type_label: super::metadata::type_label_for(name, is_directory),
        degraded: false,
    }
}

fn names(entries: &[EntryMetadata]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

fn scenario() -> Vec<EntryMetadata> {
    vec![
        make_entry("B.txt", false, 100, 30),
        make_entry("a_folder", true, 0, 10),
        make_entry("A.txt", false, 50, 20),
    ]
}

#[test]
fn default_sort_is_directories_first_then_case_insensitive_name() {
    let mut entries = scenario();
    sort_entries(&mut entries, SortKey::Name, SortDirection::Ascending);
    assert_eq!(names(&entries), vec!["a_folder", "A.txt", "B.txt"]);
}

#[test]
fn size_ascending() {
    let mut entries = scenario();
    sort_entries(&mut entries, SortKey::Size, SortDirection::Ascending);
    assert_eq!(names(&entries), vec!["a_folder", "A.txt", "B.txt"]);
    assert_eq!(entries.iter().map(|e| e.size).collect::<Vec<_>>(), vec![0, 50, 100]);
}

#[test]
fn descending_keeps_directories_first() {
    let mut entries = scenario();
    entries.push(make_entry("z_folder", true, 0, 5));
    sort_entries(&mut entries, SortKey::Name, SortDirection::Descending);
    assert_eq!(names(&entries), vec!["z_folder", "a_folder", "B.txt", "A.txt"]);

    sort_entries(&mut entries, SortKey::Size, SortDirection::Descending);
    assert!(entries[0].is_directory && entries[1].is_directory);
    assert_eq!(names(&entries[2..]), vec!["B.txt", "A.txt"]);
}

#[test]
fn modified_and_type_keys() {
    let mut entries = vec![
        make_entry("late.rs", false, 1, 300),
        make_entry("early.txt", false, 1, 100),
        make_entry("middle.md", false, 1, 200),
    ];
    sort_entries(&mut entries, SortKey::Modified, SortDirection::Ascending);
    assert_eq!(names(&entries), vec!["early.txt", "middle.md", "late.rs"]);

    sort_entries(&mut entries, SortKey::Type, SortDirection::Ascending);
    assert_eq!(names(&entries), vec!["middle.md", "late.rs", "early.txt"]);
}

#[test]
fn ties_fall_back_to_name() {
    let mut entries = vec![
        make_entry("c.txt", false, 10, 0),
        make_entry("A.txt", false, 10, 0),
        make_entry("b.txt", false, 10, 0),
    ];
    sort_entries(&mut entries, SortKey::Size, SortDirection::Ascending);
    assert_eq!(names(&entries), vec!["A.txt", "b.txt", "c.txt"]);
}

#[test]
fn natural_number_ordering() {
    let mut entries = vec![
        make_entry("img_10.png", false, 0, 0),
        make_entry("img_2.png", false, 0, 0),
        make_entry("img_1.png", false, 0, 0),
    ];
    sort_entries(&mut entries, SortKey::Name, SortDirection::Ascending);
    assert_eq!(names(&entries), vec!["img_1.png", "img_2.png", "img_10.png"]);
}

#[test]
fn case_only_difference_is_still_ordered() {
    let upper = make_entry("README", false, 0, 0);
    let lower = make_entry("readme", false, 0, 0);
    let ordering = compare_entries(&upper, &lower, SortKey::Name, SortDirection::Ascending);
    assert_ne!(ordering, Ordering::Equal);
    assert_eq!(
        compare_entries(&lower, &upper, SortKey::Name, SortDirection::Ascending),
        ordering.reverse()
    );
}
