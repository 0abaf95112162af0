//! Building records from command-line flags.

use anyhow::{bail, Context, Result};
use groupstore_core::Record;
use serde_json::Value;

/// Entity content given as `--json` and/or repeated `--field KEY=VALUE`.
#[derive(clap::Args, Debug, Default)]
pub struct FieldArgs {
    /// Entity as a JSON object, e.g. '{"name":"A"}'
    #[arg(long, value_name = "OBJECT")]
    json: Option<String>,

    /// Field assignment; VALUE is parsed as JSON, falling back to a plain string
    #[arg(short = 'f', long = "field", value_name = "KEY=VALUE")]
    fields: Vec<String>,
}

impl FieldArgs {
    /// `--field` values are applied on top of `--json`.
    pub fn into_record(self) -> Result<Record> {
        let mut record = match self.json {
            Some(raw) => {
                let value: Value =
                    serde_json::from_str(&raw).context("--json is not valid JSON")?;
                if !value.is_object() {
                    bail!("--json must be a JSON object");
                }
                Record::from_json(value)?
            }
            None => Record::new(),
        };

        for assignment in &self.fields {
            let (key, value) = parse_assignment(assignment)?;
            record.set(key, value);
        }

        Ok(record)
    }
}

fn parse_assignment(raw: &str) -> Result<(&str, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("expected KEY=VALUE, got {:?}", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("empty key in {:?}", raw);
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    if key == "id" && value.as_i64().is_none() {
        bail!("id must be an integer, got {:?}", value);
    }
    Ok((key, value))
}
