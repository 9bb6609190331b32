//! TCP (MBAP) framing

/// MBAP header encoding and stream parsing
pub mod frame;
