//! Volume enumeration, capacity selection, and payload storage.

pub mod enumerate;
pub mod select;
pub mod store;
