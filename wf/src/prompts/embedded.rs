//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

/// Free-text coaching instruction template
pub const COACH: &str = include_str!("../../prompts/coach.pmt");

/// Structured-output extraction instruction template
pub const STRUCTURED: &str = include_str!("../../prompts/structured.pmt");
