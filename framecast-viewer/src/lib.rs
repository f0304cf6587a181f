//! # framecast-viewer
//!
//! Listens for a `framecast-sender`, decodes the JPEG frames it streams
//! and hands them to a headless sink: a periodically refreshed snapshot
//! file or a counting null sink.

pub mod config;
pub mod service;
pub mod sink;
