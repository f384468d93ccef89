//! # framecast-sender: producing endpoint
//!
//! Captures a fixed screen region, encodes each capture as PNG or JPEG and
//! streams it to one receiver as length-prefixed frames until interrupted,
//! until stdin closes (optional), or until any stage fails.
//!
//! The binary is a thin shell: configuration lives in [`config`], session
//! wiring in [`service`], and everything protocol-related in
//! `framecast-core`.

pub mod config;
pub mod service;
