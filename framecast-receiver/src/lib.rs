//! # framecast-receiver: consuming endpoint
//!
//! Listens for one producer at a time, splits the byte stream back into
//! frames, optionally checks that each payload decodes as an image, and
//! optionally writes every frame to disk as `frame-NNNNNN.<ext>`.

pub mod config;
pub mod service;
