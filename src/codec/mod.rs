//! HEARTH Protocol - Message Codec
//!
//! Variant-tagged binary encoding of queries and responses. Every message
//! starts with a discriminator byte; all multi-byte integers are
//! little-endian. Dates are packed `yyyymmdd` and times `hhmmss`, both as
//! `i32`.
//!
//! Decoding is a pure function over a byte cursor ([`ByteReader`]) and fails
//! with a structured [`crate::core::CodecError`] rather than truncating
//! silently. Some reply layouts are ambiguous on their own (a sensor catalog
//! and a last-values reply both lead with the `0` ok-byte), so response
//! decoding takes the originating query as context.

mod query;
mod reader;
mod response;

pub use query::{DateOffset, OffsetUnit, Query, SeriesStart, TimeSeriesQuery};
pub use reader::ByteReader;
pub use response::{
    Aggregate, ChannelKey, DatedAggregate, DatedSamples, LastReading, Response, Sample, Sensor,
};
