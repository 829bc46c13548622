//! Client side of the clinic appointment engine: the HTTP [`client`] and the
//! notification [`poller`] used by the `clinic` binary.

pub mod client;
pub mod poller;


pub use client::{ApiClient, ApiConfig, ClientError, Transitioned};
pub use poller::{NotificationSource, PollingSession};
