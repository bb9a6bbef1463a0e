//! CSV parser for GPS probe exports.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::debug;

use crate::ingest::RawProbe;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decodes probe rows from CSV bytes, gunzipping them first if needed.
///
/// A row that cannot be decoded at all still yields an (empty) probe so
/// that validation counts it; only an unreadable stream is an error.
///
/// # Errors
///
/// Returns an error if the gzip stream is corrupt or the header row
/// cannot be read.
pub fn parse_probes(bytes: &[u8]) -> Result<Vec<RawProbe>> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut decoded)
            .context("failed to decompress gzip probe data")?;
        parse_csv(decoded.as_slice())
    } else {
        parse_csv(bytes)
    }
}

fn parse_csv<R: Read>(reader: R) -> Result<Vec<RawProbe>> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    rdr.headers().context("failed to read CSV header row")?;

    let mut probes = Vec::new();
    let mut undecodable = 0usize;

    for (line, result) in rdr.deserialize::<RawProbe>().enumerate() {
        match result {
            Ok(probe) => probes.push(probe),
            Err(e) => {
                undecodable += 1;
                debug!(line = line + 2, error = %e, "Undecodable probe row");
                probes.push(RawProbe::default());
            }
        }
    }

    debug!(rows = probes.len(), undecodable, "Probe CSV decoded");
    Ok(probes)
}
