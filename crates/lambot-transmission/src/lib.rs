//! # Lambot Transmission
//!
//! Session-authenticated RPC client for the Transmission torrent daemon.
//!
//! This crate provides:
//! - The request/response wire envelope (`torrent-get` and friends)
//! - Session bootstrap via the `X-Transmission-Session-Id` handshake
//! - A retrying `post` with fixed backoff under one shared deadline

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod protocol;
pub mod session;

pub use error::TransmissionError;
pub use protocol::{Request, Torrent, TorrentArguments, decode_response};
pub use session::{RetryPolicy, Session};
