//! CSV serialization of a reading window
//!
//! One row per reading. The header is `timestamp`, then every sensor key
//! observed anywhere in the window (sorted), then `anomalies`. Missing or
//! null values become empty cells; the anomalies cell is the reading's tag
//! list semicolon-joined.

use crate::error::Result;
use crate::model::Reading;
use crate::pipeline;
use chrono::SecondsFormat;
use std::io::Write;

pub fn write_csv<W: Write>(writer: W, readings: &[Reading]) -> Result<()> {
    let keys = pipeline::sensor_key_union(readings);

    let mut out = csv::Writer::from_writer(writer);
    let mut header = Vec::with_capacity(keys.len() + 2);
    header.push("timestamp".to_string());
    header.extend(keys.iter().cloned());
    header.push("anomalies".to_string());
    out.write_record(&header)?;

    for reading in readings {
        let mut row = Vec::with_capacity(header.len());
        row.push(
            reading
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        for key in &keys {
            row.push(
                reading
                    .value(key)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        row.push(reading.anomalies.join(";"));
        out.write_record(&row)?;
    }
    out.flush()?;
    Ok(())
}

/// Render the window as CSV bytes
pub fn csv_bytes(readings: &[Reading]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(&mut buf, readings)?;
    Ok(buf)
}
