//! Query encoding.
//!
//! Three commands exist in this protocol generation:
//!
//! ```text
//! ListSensors:  [0x00, 0x00]
//! LastValues:   [0x01, days]
//! TimeSeries:   [0x02][max_points:u16][code:3][start:i32][period:2]   (12 bytes)
//! ```
//!
//! `start` is either a non-negative packed `yyyymmdd` date or, for a relative
//! start of `n` units back, the negative value `(-n << 8) | unit`. The
//! 2-byte period is `[magnitude, unit]`, or all zeros for "up to now".

use crate::core::{
    CodecError, QUERY_LAST_VALUES, QUERY_LIST_SENSORS, QUERY_TIME_SERIES,
    TIME_SERIES_QUERY_SIZE, TYPE_CODE_SIZE,
};

use super::ByteReader;

/// Offset units, fixed for this protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OffsetUnit {
    /// Calendar days.
    Day = 0,
    /// Calendar months.
    Month = 1,
    /// Calendar years.
    Year = 2,
}

impl OffsetUnit {
    /// Parse a unit from its wire byte.
    pub fn from_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0 => Ok(Self::Day),
            1 => Ok(Self::Month),
            2 => Ok(Self::Year),
            other => Err(CodecError::UnknownOffsetUnit(other)),
        }
    }

    /// The wire byte for this unit.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A relative span: `amount` whole `unit`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateOffset {
    /// Magnitude, 1..=255.
    pub amount: u8,
    /// Unit of the magnitude.
    pub unit: OffsetUnit,
}

/// Where a time series starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStart {
    /// Absolute date, packed `yyyymmdd` (non-negative).
    Date(i32),
    /// Relative to now, counting backwards.
    Offset(DateOffset),
}

/// Parameters of a time-series query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeriesQuery {
    /// Cap on returned points per sensor; 0 means "no cap".
    pub max_points: u16,
    /// Sensor data-type code, at least 3 ASCII characters (the wire carries
    /// the first 3).
    pub data_type: String,
    /// Start of the series.
    pub start: SeriesStart,
    /// Length of the series; `None` means "until now". The hub decides
    /// raw-vs-aggregated from the span, so the reply shape depends on this.
    pub period: Option<DateOffset>,
}

/// A typed query to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Fetch the sensor catalog.
    ListSensors,
    /// Fetch each sensor's most recent reading, looking back `days` days.
    LastValues {
        /// How many days back to search.
        days: u8,
    },
    /// Fetch a series of readings.
    TimeSeries(TimeSeriesQuery),
}

impl Query {
    /// The leading discriminator byte for this variant.
    pub fn discriminator(&self) -> u8 {
        match self {
            Query::ListSensors => QUERY_LIST_SENSORS,
            Query::LastValues { .. } => QUERY_LAST_VALUES,
            Query::TimeSeries(_) => QUERY_TIME_SERIES,
        }
    }

    /// Encode to wire bytes.
    ///
    /// Field validation happens here, before any I/O: a data-type code
    /// shorter than 3 characters or containing non-ASCII bytes is rejected
    /// with a [`CodecError`].
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Query::ListSensors => Ok(vec![QUERY_LIST_SENSORS, 0]),
            Query::LastValues { days } => Ok(vec![QUERY_LAST_VALUES, *days]),
            Query::TimeSeries(series) => series.encode(),
        }
    }

    /// Decode wire bytes back into a query.
    ///
    /// The client never receives queries; this exists for tooling and for
    /// exactness tests against the encoder.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(buf);
        let query = match reader.read_u8()? {
            QUERY_LIST_SENSORS => {
                reader.read_u8()?;
                Query::ListSensors
            }
            QUERY_LAST_VALUES => Query::LastValues {
                days: reader.read_u8()?,
            },
            QUERY_TIME_SERIES => Query::TimeSeries(TimeSeriesQuery::decode(&mut reader)?),
            other => return Err(CodecError::UnknownDiscriminator(other)),
        };
        reader.expect_end()?;
        Ok(query)
    }
}

impl TimeSeriesQuery {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        if self.data_type.len() < TYPE_CODE_SIZE {
            return Err(CodecError::DataTypeTooShort(self.data_type.len()));
        }
        if !self.data_type.is_ascii() {
            return Err(CodecError::NotAscii);
        }

        let mut out = Vec::with_capacity(TIME_SERIES_QUERY_SIZE);
        out.push(QUERY_TIME_SERIES);
        out.extend_from_slice(&self.max_points.to_le_bytes());
        out.extend_from_slice(&self.data_type.as_bytes()[..TYPE_CODE_SIZE]);

        let start = match self.start {
            SeriesStart::Date(date) => date,
            SeriesStart::Offset(offset) => {
                (-(i32::from(offset.amount)) << 8) | i32::from(offset.unit.as_byte())
            }
        };
        out.extend_from_slice(&start.to_le_bytes());

        match self.period {
            Some(period) => {
                out.push(period.amount);
                out.push(period.unit.as_byte());
            }
            None => out.extend_from_slice(&0u16.to_le_bytes()),
        }
        Ok(out)
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let max_points = reader.read_u16()?;
        let code = reader.read_bytes(TYPE_CODE_SIZE)?;
        if !code.is_ascii() {
            return Err(CodecError::NotAscii);
        }
        let data_type = String::from_utf8(code.to_vec()).map_err(|_| CodecError::InvalidUtf8)?;

        let raw_start = reader.read_i32()?;
        let start = if raw_start >= 0 {
            SeriesStart::Date(raw_start)
        } else {
            // Arithmetic shift undoes `(-n << 8) | unit`.
            SeriesStart::Offset(DateOffset {
                amount: (-(raw_start >> 8)) as u8,
                unit: OffsetUnit::from_byte((raw_start & 0xFF) as u8)?,
            })
        };

        let amount = reader.read_u8()?;
        let unit = reader.read_u8()?;
        let period = if amount == 0 && unit == 0 {
            None
        } else {
            Some(DateOffset {
                amount,
                unit: OffsetUnit::from_byte(unit)?,
            })
        };

        Ok(Self {
            max_points,
            data_type,
            start,
            period,
        })
    }
}
