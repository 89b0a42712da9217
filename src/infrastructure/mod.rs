//! Adapters behind the domain ports: storage backends, the checkout stand-in
//! and the purchase notifier.

pub mod gateway;
pub mod in_memory;
pub mod notifier;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
