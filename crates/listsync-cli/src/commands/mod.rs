pub mod collections;
pub mod common;
pub mod completions;
pub mod delete;
pub mod fields;
pub mod items;
pub mod sync;
