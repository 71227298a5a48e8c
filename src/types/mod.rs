//! Core type definitions for the unillm library.
//!
//! This module contains the unified message model shared by every provider:
//! messages, content blocks, canonical tool calls and tool schemas.

pub mod content;
pub mod messages;
pub mod tools;

// Re-export commonly used types
pub use content::*;
pub use messages::*;
pub use tools::*;
