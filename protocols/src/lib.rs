//! Wire-format decoding used by listening discoverers.

pub mod mdns;
