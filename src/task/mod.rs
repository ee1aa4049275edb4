//! Background-thread plumbing shared by the map implementations.

pub(crate) mod sweeper;
