//! Linux framebuffer capture backend.

pub mod info;
pub mod mirror;
pub mod projection;
