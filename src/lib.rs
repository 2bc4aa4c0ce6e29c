//! fibhook - FIB forwarding accelerator and neighbor snooper
//!
//! Two ingress hooks run on every frame received on an attached interface:
//! the forwarding engine resolves the packet against the FIB and redirects
//! it with rewritten Ethernet addresses, and the neighbor snooper publishes
//! IP to MAC bindings seen in ARP and Neighbor Advertisements.

pub mod capture;
pub mod config;
pub mod dataplane;
pub mod error;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, Result};
