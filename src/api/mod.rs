pub mod client;
pub mod transport;

pub use client::{MutationOutcome, SchoolClient};
pub use transport::{HttpTransport, Transport};
