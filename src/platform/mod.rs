//! OS abstraction layer for mount and free-space queries.

pub mod pal;
