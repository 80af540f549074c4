//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the library:
//! - Math types and operations
//! - Typed handles for registries
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod math;
