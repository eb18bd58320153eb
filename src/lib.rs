//! # HEARTH Protocol
//!
//! **H**ome **E**nvironment **A**nalytics & **R**emote **T**elemetry **H**ub
//!
//! HEARTH is the query side of a UDP telemetry protocol for home-automation
//! hubs: small sensor-data queries go out, encrypted (and optionally
//! bzip2-compressed) sensor catalogs and time series come back. It provides:
//!
//! - **Confidentiality**: ChaCha20 stream encryption with a per-message
//!   nonce, obfuscated on the wire by a self-inverse transform
//! - **Compactness**: fixed-layout little-endian binary messages, queries
//!   of 2 or 12 bytes
//! - **Resilience**: bounded resend on silence, one fresh socket per call
//! - **Simplicity**: a pre-shared 32-byte key, no handshake or negotiation
//!
//! The protocol carries no authentication tag; see [`crypto`] for the
//! security model.
//!
//! ## Feature Flags
//!
//! - `transport` (default): UDP transport and the [`channel`] layer
//!   (requires tokio)
//!
//! ## Modules
//!
//! - [`core`]: constants and error types (always included)
//! - [`crypto`]: ChaCha20 cipher and nonce handling (always included)
//! - [`codec`]: query and response wire formats (always included)
//! - [`transport`]: retrying UDP exchange (requires `transport`)
//! - [`channel`]: the [`SecureChannel`] query API (requires `transport`)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hearth_protocol::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ChannelError> {
//!     let channel = SecureChannel::builder("192.168.1.40:5000".parse().unwrap())
//!         .key(&[0x42; 32])
//!         .compression(Compression::Bzip2)
//!         .build()?;
//!
//!     match channel.send(&Query::ListSensors).await? {
//!         Response::SensorCatalog(sensors) => {
//!             for sensor in sensors {
//!                 println!("{:3} {} @ {}", sensor.id, sensor.data_type, sensor.location);
//!             }
//!         }
//!         other => println!("unexpected reply: {other:?}"),
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Cipher and nonce handling (always included)
pub mod crypto;

// Wire formats (always included)
pub mod codec;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Channel API (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod channel;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::codec::{
        DateOffset, OffsetUnit, Query, Response, Sensor, SeriesStart, TimeSeriesQuery,
    };
    pub use crate::core::{CipherError, CodecError};
    pub use crate::crypto::{ChaCha20, Nonce};

    #[cfg(feature = "transport")]
    pub use crate::channel::{ChannelBuilder, Compression, SecureChannel};
    #[cfg(feature = "transport")]
    pub use crate::core::{ChannelError, TransportError};
    #[cfg(feature = "transport")]
    pub use crate::transport::{RetryPolicy, RetryingTransport};
}

// Re-export commonly used items at crate root
pub use codec::{Query, Response};

#[cfg(feature = "transport")]
pub use channel::{Compression, SecureChannel};
