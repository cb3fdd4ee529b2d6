//! CSV traces of resolved cases.
//!
//! One row per case, so two runs with the same scenario and seed can be
//! diffed line by line.

use crate::{CmId, MedicateData, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One resolved case
#[derive(Clone, Debug, PartialEq)]
pub struct CaseRecord {
    pub case: u64,
    /// Random substream the case drew from
    pub stream: u64,
    pub state: u32,
    pub age_years: f64,
    pub final_id: CmId,
    pub masked_id: CmId,
    pub medications: Vec<MedicateData>,
}

/// Flat CSV row format
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    case: u64,
    stream: u64,
    state: String,
    age_years: f64,
    final_id: String,
    masked_id: String,
    /// `drug:qty@time` entries separated by `;`
    medications: String,
}

impl From<&CaseRecord> for CsvRow {
    fn from(record: &CaseRecord) -> Self {
        let medications = record
            .medications
            .iter()
            .map(|m| match m.duration_hours {
                Some(d) => format!("{}:{}@{}+{}", m.drug, m.qty, m.time_hours, d),
                None => format!("{}:{}@{}", m.drug, m.qty, m.time_hours),
            })
            .collect::<Vec<_>>()
            .join(";");

        CsvRow {
            case: record.case,
            stream: record.stream,
            state: format!("{:#x}", record.state),
            age_years: record.age_years,
            final_id: record.final_id.to_string(),
            masked_id: record.masked_id.to_string(),
            medications,
        }
    }
}

impl TryFrom<CsvRow> for CaseRecord {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let medications = row
            .medications
            .split(';')
            .filter(|s| !s.is_empty())
            .map(parse_medication)
            .collect::<Result<Vec<_>>>()?;

        Ok(CaseRecord {
            case: row.case,
            stream: row.stream,
            state: parse_hex(&row.state)?,
            age_years: row.age_years,
            final_id: CmId(parse_hex(&row.final_id)?),
            masked_id: CmId(parse_hex(&row.masked_id)?),
            medications,
        })
    }
}

fn parse_hex(s: &str) -> Result<u32> {
    let digits = s.trim_start_matches("0x");
    u32::from_str_radix(digits, 16)
        .map_err(|e| crate::Error::Other(format!("Invalid hex value '{}': {}", s, e)))
}

fn parse_medication(s: &str) -> Result<MedicateData> {
    let invalid = || crate::Error::Other(format!("Invalid medication entry '{}'", s));
    let (drug, rest) = s.split_once(':').ok_or_else(invalid)?;
    let (qty, timing) = rest.split_once('@').ok_or_else(invalid)?;
    let (time, duration) = match timing.split_once('+') {
        Some((time, duration)) => (time, Some(duration)),
        None => (timing, None),
    };

    Ok(MedicateData {
        drug: drug.to_string(),
        qty: qty.parse().map_err(|_| invalid())?,
        time_hours: time.parse().map_err(|_| invalid())?,
        duration_hours: duration
            .map(|d| d.parse().map_err(|_| invalid()))
            .transpose()?,
    })
}

/// Write records to a CSV file (overwrites)
pub fn write_csv(path: &Path, records: &[CaseRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;

    tracing::info!("Wrote {} case records to {:?}", records.len(), path);
    Ok(())
}

/// Read records back from a CSV trace
pub fn read_csv(path: &Path) -> Result<Vec<CaseRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut records = Vec::new();

    for row in reader.deserialize::<CsvRow>() {
        records.push(CaseRecord::try_from(row?)?);
    }

    tracing::debug!("Read {} case records from {:?}", records.len(), path);
    Ok(records)
}
