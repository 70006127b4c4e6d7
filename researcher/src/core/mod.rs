//! Deterministic, pure logic shared by the research loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod citations;
pub mod quality;
pub mod types;
