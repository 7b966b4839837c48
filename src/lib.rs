#![doc = include_str!(concat!("../", std::env!("CARGO_PKG_README")))]
pub mod core;
