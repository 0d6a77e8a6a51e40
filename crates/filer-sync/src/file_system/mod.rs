//! File system module - listing, sorting, the sorted view, and the change watcher.

pub mod listing;
pub mod watcher;

#[cfg(test)]
mod watcher_test;
