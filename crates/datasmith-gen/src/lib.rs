//! Generator registry and populator for DataSmith.
//!
//! Turns per-column generator specs into validated, uniqueness-respecting
//! row batches, and paginates the resulting packets for the protocol layer.

pub mod caps;
pub mod datasets;
pub mod paginate;
pub mod populate;
pub mod progress;
pub mod provider;
pub mod registry;

pub use paginate::Populator;
pub use populate::build_packets;
pub use progress::{JobStatus, Progress, SharedProgress};
pub use provider::FakeProvider;
pub use registry::GenError;
