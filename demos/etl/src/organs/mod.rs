//! The ETL pipeline's organs, one module per pipeline stage.
//!
//! `ETL_START` -> `RAW_DATA_LOADED` -> `DATA_CLEANED` -> `DATA_TRANSFORMED` -> `ETL_COMPLETE`.

mod clean_data;
mod export_summary;
mod extract_csv;
mod transform_data;

pub use clean_data::CleanData;
pub use export_summary::ExportSummary;
pub use extract_csv::ExtractCsv;
pub use transform_data::TransformData;

use serde_json::{Map, Value};

/// Build a JSON payload object from `(key, value)` pairs, in order.
pub(crate) fn payload(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
