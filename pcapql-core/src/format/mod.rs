//! Display formatting helpers.

mod address;

pub use address::{detect_address_column, format_ipv4, format_mac, format_mac_u64, AddressKind};
