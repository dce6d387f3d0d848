//! Exactly-once mark claims.
//!
//! Each region carries a [`MarkBitmap`]; setting an object's bit is the claim
//! that makes one worker responsible for visiting its body.

pub mod bitmap;

pub use bitmap::MarkBitmap;
