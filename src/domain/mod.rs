//! Domain types and the ports the application layer talks through.

pub mod contestant;
pub mod ports;
pub mod pricing;
pub mod vote;
