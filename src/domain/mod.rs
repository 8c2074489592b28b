//! Domain value objects
//!
//! Validated network primitives shared by the local facts model and the
//! NetBox record model. Keeping both sides on the same value objects makes
//! identity comparisons canonical (a MAC compares equal regardless of the
//! separator or case a collector or the API happened to emit).

pub mod network;

pub use network::{Cidr, Duplex, MacAddress, Mtu, NetworkError, VlanId};
