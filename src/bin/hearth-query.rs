//! One-shot command-line client for a HEARTH hub.
//!
//! ```text
//! hearth-query <key-file> <host> <port> <query>
//! ```
//!
//! where `<query>` is one of:
//!
//! - `sensors`
//! - `last_data_from=N` (readings from the last N days)
//! - `dataType=env&startDate=-7d&maxPoints=100&period=1d`
//!
//! `startDate` is either a `yyyymmdd` date or a `-Nd`/`-Nm`/`-Ny` offset
//! from today; `period` is a `Nd`/`Nm`/`Ny` span ending at `startDate`.
//! The key file holds the raw 32-byte shared key.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use hearth_protocol::channel::{Compression, SecureChannel};
use hearth_protocol::codec::{
    ChannelKey, DateOffset, OffsetUnit, Query, Response, SeriesStart, TimeSeriesQuery,
};

const USAGE: &str = "usage: hearth-query <key-file> <host> <port> <query>\n\
    queries:\n\
    \x20 sensors\n\
    \x20 last_data_from=<days>\n\
    \x20 dataType=<code>&startDate=<yyyymmdd|-Nd|-Nm|-Ny>[&maxPoints=<n>][&period=<Nd|Nm|Ny>]";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("hearth-query: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [key_file, host, port, query_text] = args.as_slice() else {
        return Err(USAGE.to_string());
    };

    let key = std::fs::read(key_file).map_err(|e| format!("cannot read {key_file}: {e}"))?;
    let port: u16 = port.parse().map_err(|_| format!("invalid port: {port}"))?;
    let addr = resolve(host, port).await?;
    let query = parse_query(query_text)?;

    let channel = SecureChannel::builder(addr)
        .key(&key)
        .compression(Compression::Bzip2)
        .recv_timeout(Duration::from_secs(2))
        .build()
        .map_err(|e| e.to_string())?;

    let response = channel.send(&query).await.map_err(|e| e.to_string())?;
    print_response(&response);
    Ok(())
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, String> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| format!("cannot resolve {host}: {e}"))?
        .next()
        .ok_or_else(|| format!("no address found for {host}"))
}

fn parse_query(text: &str) -> Result<Query, String> {
    if text == "sensors" {
        return Ok(Query::ListSensors);
    }
    if let Some(days) = text.strip_prefix("last_data_from=") {
        let days = days
            .parse()
            .map_err(|_| format!("invalid day count: {days}"))?;
        return Ok(Query::LastValues { days });
    }

    let mut data_type = None;
    let mut start = None;
    let mut max_points = 100u16;
    let mut period = None;
    for pair in text.split('&') {
        let Some((name, value)) = pair.split_once('=') else {
            return Err(format!("malformed parameter: {pair}"));
        };
        match name {
            "dataType" => data_type = Some(value.to_string()),
            "startDate" => start = Some(parse_start(value)?),
            "maxPoints" => {
                max_points = value
                    .parse()
                    .map_err(|_| format!("invalid maxPoints: {value}"))?;
            }
            "period" => period = Some(parse_offset(value)?),
            _ => return Err(format!("unknown parameter: {name}")),
        }
    }
    let (Some(data_type), Some(start)) = (data_type, start) else {
        return Err("a series query needs both dataType and startDate".to_string());
    };
    Ok(Query::TimeSeries(TimeSeriesQuery {
        max_points,
        data_type,
        start,
        period,
    }))
}

fn parse_start(value: &str) -> Result<SeriesStart, String> {
    if let Some(offset) = value.strip_prefix('-') {
        return Ok(SeriesStart::Offset(parse_offset(offset)?));
    }
    let date: i32 = value
        .parse()
        .map_err(|_| format!("invalid date: {value}"))?;
    Ok(SeriesStart::Date(date))
}

/// Parse an `Nd`/`Nm`/`Ny` span (sign already stripped by the caller).
fn parse_offset(value: &str) -> Result<DateOffset, String> {
    let (amount, unit) = value.split_at(value.len().saturating_sub(1));
    let unit = match unit {
        "d" => OffsetUnit::Day,
        "m" => OffsetUnit::Month,
        "y" => OffsetUnit::Year,
        other => return Err(format!("unknown offset unit: {other:?} (use d, m or y)")),
    };
    let amount = amount
        .parse()
        .map_err(|_| format!("invalid offset amount: {amount}"))?;
    Ok(DateOffset { amount, unit })
}

fn print_response(response: &Response) {
    match response {
        Response::SensorCatalog(sensors) => {
            for s in sensors {
                println!(
                    "{:3}  {}  {:<20} [{}]",
                    s.id, s.data_type, s.location, s.location_type
                );
            }
        }
        Response::LastValues(by_sensor) => {
            for (id, reading) in by_sensor {
                print!("{:3}  {} {}", id, fmt_date(reading.date), fmt_time(reading.sample.time));
                print_values(&reading.sample.values);
                println!();
            }
        }
        Response::RawSeries(by_sensor) => {
            for (id, days) in by_sensor {
                println!("sensor {id}:");
                for day in days {
                    for sample in &day.samples {
                        print!("  {} {}", fmt_date(day.date), fmt_time(sample.time));
                        print_values(&sample.values);
                        println!();
                    }
                }
            }
        }
        Response::AggregatedSeries(by_sensor) => {
            for (id, days) in by_sensor {
                println!("sensor {id}:");
                for day in days {
                    print!("  {}", fmt_date(day.date));
                    for (key, agg) in &day.values {
                        print!("  {}={}/{}/{}", key, agg.min, agg.avg, agg.max);
                    }
                    println!();
                }
            }
        }
        Response::Error(message) => println!("hub error: {message}"),
    }
}

fn print_values(values: &std::collections::BTreeMap<ChannelKey, i32>) {
    for (key, value) in values {
        print!("  {key}={value}");
    }
}

fn fmt_date(packed: i32) -> String {
    format!("{:04}-{:02}-{:02}", packed / 10000, packed / 100 % 100, packed % 100)
}

fn fmt_time(packed: i32) -> String {
    format!("{:02}:{:02}:{:02}", packed / 10000, packed / 100 % 100, packed % 100)
}
