//! Response decoding (and the symmetric encoding used by tooling and tests).
//!
//! Replies come in four shapes plus an error variant. A catalog reply and a
//! last-values reply both start with the `0` ok-byte and cannot be told apart
//! from their bytes, so [`Response::decode`] takes the originating [`Query`].
//!
//! Measurement channels are keyed by fixed 4-byte ASCII codes (`temp`,
//! `humi`, ...) with no length prefix; readings are fixed-point `i32`s whose
//! scale is a property of the channel, not of the wire format.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::{
    CHANNEL_KEY_SIZE, CodecError, RESPONSE_AGGREGATED, RESPONSE_ERROR, RESPONSE_OK,
    TYPE_CODE_SIZE,
};

use super::{ByteReader, Query};

/// Fixed 4-byte ASCII measurement-channel key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelKey([u8; CHANNEL_KEY_SIZE]);

impl ChannelKey {
    /// Build a key from a short ASCII name, space-padded to 4 bytes.
    pub fn new(name: &str) -> Result<Self, CodecError> {
        if !name.is_ascii() {
            return Err(CodecError::NotAscii);
        }
        if name.is_empty() || name.len() > CHANNEL_KEY_SIZE {
            return Err(CodecError::StringTooLong(name.len()));
        }
        let mut bytes = [b' '; CHANNEL_KEY_SIZE];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self(bytes))
    }

    /// Wrap raw wire bytes.
    pub fn from_bytes(bytes: [u8; CHANNEL_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// The raw 4 wire bytes.
    pub fn as_bytes(&self) -> &[u8; CHANNEL_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = String::from_utf8_lossy(&self.0);
        write!(f, "{}", name.trim_end())
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    /// Sensor id, the key used by every series reply.
    pub id: u8,
    /// 3-character data-type code (`env`, `ele`, ...).
    pub data_type: String,
    /// Human-readable location name.
    pub location: String,
    /// 3-character location-type code.
    pub location_type: String,
}

/// One timestamped reading across a sensor's channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Time of day, packed `hhmmss`.
    pub time: i32,
    /// Fixed-point reading per channel.
    pub values: BTreeMap<ChannelKey, i32>,
}

/// All samples for one sensor on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedSamples {
    /// Date, packed `yyyymmdd`.
    pub date: i32,
    /// Readings in hub order (ascending time).
    pub samples: Vec<Sample>,
}

/// Min/avg/max triple of fixed-point readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    /// Daily minimum.
    pub min: i32,
    /// Daily average.
    pub avg: i32,
    /// Daily maximum.
    pub max: i32,
}

/// Per-day aggregate for one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedAggregate {
    /// Date, packed `yyyymmdd`.
    pub date: i32,
    /// Aggregates per channel.
    pub values: BTreeMap<ChannelKey, Aggregate>,
}

/// A sensor's most recent reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastReading {
    /// Date of the reading, packed `yyyymmdd`.
    pub date: i32,
    /// The reading itself.
    pub sample: Sample,
}

/// A typed reply from the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Catalog of known sensors (reply to [`Query::ListSensors`]).
    SensorCatalog(Vec<Sensor>),
    /// Unaggregated series per sensor (reply to a short-span
    /// [`Query::TimeSeries`]).
    RawSeries(BTreeMap<u8, Vec<DatedSamples>>),
    /// Daily aggregates per sensor (reply to a long-span
    /// [`Query::TimeSeries`]).
    AggregatedSeries(BTreeMap<u8, Vec<DatedAggregate>>),
    /// Most recent reading per sensor (reply to [`Query::LastValues`]).
    LastValues(BTreeMap<u8, LastReading>),
    /// Hub-reported failure with its message.
    Error(String),
}

impl Response {
    /// Decode a plaintext reply body, using the query that produced it to
    /// disambiguate layouts that share the ok-byte.
    pub fn decode(buf: &[u8], query: &Query) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(buf);
        let discriminator = reader.read_u8()?;
        if discriminator == RESPONSE_ERROR {
            // Remaining bytes are the hub's message, verbatim.
            let raw = reader.read_bytes(reader.remaining())?;
            return Ok(Response::Error(String::from_utf8_lossy(raw).into_owned()));
        }

        match query {
            Query::ListSensors => {
                if discriminator != RESPONSE_OK {
                    return Err(CodecError::UnknownDiscriminator(discriminator));
                }
                decode_catalog(&mut reader)
            }
            Query::LastValues { .. } => {
                if discriminator != RESPONSE_OK {
                    return Err(CodecError::UnknownDiscriminator(discriminator));
                }
                decode_last_values(&mut reader)
            }
            Query::TimeSeries(_) => match discriminator {
                RESPONSE_OK => decode_raw_series(&mut reader),
                RESPONSE_AGGREGATED => decode_aggregated_series(&mut reader),
                other => Err(CodecError::UnknownDiscriminator(other)),
            },
        }
    }

    /// Encode to the plaintext wire layout.
    ///
    /// The client never sends responses; the encoder exists for mock hubs
    /// and keeps every decoder honest through round-trip tests.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        match self {
            Response::SensorCatalog(sensors) => {
                out.push(RESPONSE_OK);
                out.push(checked_u8(sensors.len())?);
                for sensor in sensors {
                    out.push(sensor.id);
                    write_type_code(&mut out, &sensor.data_type)?;
                    write_string(&mut out, &sensor.location)?;
                    write_type_code(&mut out, &sensor.location_type)?;
                }
            }
            Response::RawSeries(by_sensor) => {
                out.push(RESPONSE_OK);
                for (id, records) in by_sensor {
                    out.push(*id);
                    out.extend_from_slice(&checked_u16(records.len())?.to_le_bytes());
                    for record in records {
                        out.extend_from_slice(&record.date.to_le_bytes());
                        out.extend_from_slice(&(record.samples.len() as i32).to_le_bytes());
                        for sample in &record.samples {
                            write_sample(&mut out, sample)?;
                        }
                    }
                }
            }
            Response::AggregatedSeries(by_sensor) => {
                out.push(RESPONSE_AGGREGATED);
                for (id, records) in by_sensor {
                    out.push(*id);
                    out.extend_from_slice(&checked_u16(records.len())?.to_le_bytes());
                    for record in records {
                        out.extend_from_slice(&record.date.to_le_bytes());
                        out.push(checked_u8(record.values.len())?);
                        for (key, aggregate) in &record.values {
                            out.extend_from_slice(key.as_bytes());
                            out.extend_from_slice(&aggregate.min.to_le_bytes());
                            out.extend_from_slice(&aggregate.avg.to_le_bytes());
                            out.extend_from_slice(&aggregate.max.to_le_bytes());
                        }
                    }
                }
            }
            Response::LastValues(by_sensor) => {
                out.push(RESPONSE_OK);
                out.push(checked_u8(by_sensor.len())?);
                for (id, reading) in by_sensor {
                    out.push(*id);
                    out.extend_from_slice(&reading.date.to_le_bytes());
                    write_sample(&mut out, &reading.sample)?;
                }
            }
            Response::Error(message) => {
                out.push(RESPONSE_ERROR);
                out.extend_from_slice(message.as_bytes());
            }
        }
        Ok(out)
    }
}

fn decode_catalog(reader: &mut ByteReader<'_>) -> Result<Response, CodecError> {
    let count = reader.read_u8()?;
    let mut sensors = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = reader.read_u8()?;
        let data_type = read_type_code(reader)?;
        let location_len = reader.read_u8()?;
        let location = String::from_utf8(reader.read_bytes(location_len as usize)?.to_vec())
            .map_err(|_| CodecError::InvalidUtf8)?;
        let location_type = read_type_code(reader)?;
        sensors.push(Sensor {
            id,
            data_type,
            location,
            location_type,
        });
    }
    reader.expect_end()?;
    Ok(Response::SensorCatalog(sensors))
}

// Smallest wire size of each repeated element. Count fields arrive from
// unauthenticated plaintext, so preallocation is capped by what the buffer
// could actually hold; an overstated count then fails in the element reads
// with `UnexpectedEof` instead of allocating for the claim.
const MIN_SAMPLE_SIZE: usize = 5;
const MIN_RAW_RECORD_SIZE: usize = 8;
const MIN_AGG_RECORD_SIZE: usize = 5;

fn decode_raw_series(reader: &mut ByteReader<'_>) -> Result<Response, CodecError> {
    let mut by_sensor = BTreeMap::new();
    while reader.has_remaining() {
        let id = reader.read_u8()?;
        let record_count = reader.read_u16()?;
        let mut records = Vec::with_capacity(
            (record_count as usize).min(reader.remaining() / MIN_RAW_RECORD_SIZE),
        );
        for _ in 0..record_count {
            let date = reader.read_i32()?;
            let sample_count = reader.read_i32()?;
            if sample_count < 0 {
                return Err(CodecError::InvalidCount(sample_count.into()));
            }
            let mut samples = Vec::with_capacity(
                (sample_count as usize).min(reader.remaining() / MIN_SAMPLE_SIZE),
            );
            for _ in 0..sample_count {
                samples.push(read_sample(reader)?);
            }
            records.push(DatedSamples { date, samples });
        }
        by_sensor.insert(id, records);
    }
    Ok(Response::RawSeries(by_sensor))
}

fn decode_aggregated_series(reader: &mut ByteReader<'_>) -> Result<Response, CodecError> {
    let mut by_sensor = BTreeMap::new();
    while reader.has_remaining() {
        let id = reader.read_u8()?;
        let record_count = reader.read_u16()?;
        let mut records = Vec::with_capacity(
            (record_count as usize).min(reader.remaining() / MIN_AGG_RECORD_SIZE),
        );
        for _ in 0..record_count {
            let date = reader.read_i32()?;
            let value_count = reader.read_u8()?;
            let mut values = BTreeMap::new();
            for _ in 0..value_count {
                let key = ChannelKey::from_bytes(reader.read_array()?);
                let min = reader.read_i32()?;
                let avg = reader.read_i32()?;
                let max = reader.read_i32()?;
                values.insert(key, Aggregate { min, avg, max });
            }
            records.push(DatedAggregate { date, values });
        }
        by_sensor.insert(id, records);
    }
    Ok(Response::AggregatedSeries(by_sensor))
}

fn decode_last_values(reader: &mut ByteReader<'_>) -> Result<Response, CodecError> {
    let count = reader.read_u8()?;
    let mut by_sensor = BTreeMap::new();
    for _ in 0..count {
        let id = reader.read_u8()?;
        let date = reader.read_i32()?;
        let sample = read_sample(reader)?;
        by_sensor.insert(id, LastReading { date, sample });
    }
    reader.expect_end()?;
    Ok(Response::LastValues(by_sensor))
}

fn read_sample(reader: &mut ByteReader<'_>) -> Result<Sample, CodecError> {
    let value_count = reader.read_u8()?;
    let time = reader.read_i32()?;
    let mut values = BTreeMap::new();
    for _ in 0..value_count {
        let key = ChannelKey::from_bytes(reader.read_array()?);
        let value = reader.read_i32()?;
        values.insert(key, value);
    }
    Ok(Sample { time, values })
}

fn write_sample(out: &mut Vec<u8>, sample: &Sample) -> Result<(), CodecError> {
    out.push(checked_u8(sample.values.len())?);
    out.extend_from_slice(&sample.time.to_le_bytes());
    for (key, value) in &sample.values {
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

fn read_type_code(reader: &mut ByteReader<'_>) -> Result<String, CodecError> {
    let bytes = reader.read_bytes(TYPE_CODE_SIZE)?;
    if !bytes.is_ascii() {
        return Err(CodecError::NotAscii);
    }
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}

fn write_type_code(out: &mut Vec<u8>, code: &str) -> Result<(), CodecError> {
    if code.len() < TYPE_CODE_SIZE {
        return Err(CodecError::DataTypeTooShort(code.len()));
    }
    if !code.is_ascii() {
        return Err(CodecError::NotAscii);
    }
    out.extend_from_slice(&code.as_bytes()[..TYPE_CODE_SIZE]);
    Ok(())
}

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<(), CodecError> {
    let len = checked_u8(value.len())?;
    out.push(len);
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn checked_u8(len: usize) -> Result<u8, CodecError> {
    u8::try_from(len).map_err(|_| CodecError::InvalidCount(len as i64))
}

fn checked_u16(len: usize) -> Result<u16, CodecError> {
    u16::try_from(len).map_err(|_| CodecError::InvalidCount(len as i64))
}
