//! End-to-end bag tests
//!
//! Every test writes a bag through `BagWriter`, closes it, and reads it back
//! through a fresh `BagReader` on each archive backend.
//!
//! Run with: cargo test --test bag_roundtrip

#[path = "../common/mod.rs"]
mod common;

mod decoding;
mod lifecycle;
mod roundtrip;
mod selections;
mod synchronization;
