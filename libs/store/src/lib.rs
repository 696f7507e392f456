//! # imgreap-store
//!
//! Access to the local image store.
//!
//! ## Modules
//!
//! - `store`: the narrow [`ImageStore`] interface used by the rest of imgreap
//! - `docker`: Docker Engine API implementation over the daemon's Unix socket
//! - `memory`: in-memory implementation with failure injection, for tests
//! - `inventory`: reads and merges the images of the requested repositories
//! - `usage`: collects image ids referenced by containers

pub mod docker;
pub mod inventory;
pub mod memory;
pub mod usage;

mod error;
mod store;

pub use docker::DockerStore;
pub use error::StoreError;
pub use inventory::read_inventory;
pub use memory::{MemoryStore, StoreCall};
pub use store::ImageStore;
pub use usage::read_usage;
