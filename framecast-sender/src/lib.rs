//! # framecast-sender: frame streaming client
//!
//! Captures frames from a source, JPEG-encodes them at an adaptively
//! controlled quality and streams them over TCP to a `framecast-viewer`.
//!
//! The built-in source is a synthetic test pattern; any
//! [`FrameSource`](framecast_core::FrameSource) can be streamed through
//! [`SenderService::run_with_source`](service::SenderService::run_with_source).

pub mod config;
pub mod service;
