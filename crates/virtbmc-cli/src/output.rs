//! Table rendering for command output.

use serde_json::Value;
use tabled::{Table, Tabled};

use crate::types::BmcRecord;

/// One row of the `list` table.
#[derive(Debug, Tabled)]
pub struct BmcRow {
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "ACTIVE")]
    pub active: bool,
    #[tabled(rename = "ADDRESS")]
    pub address: String,
    #[tabled(rename = "PORT")]
    pub port: u16,
    #[tabled(rename = "USERNAME")]
    pub username: String,
    #[tabled(rename = "PASSWORD")]
    pub password: String,
    #[tabled(rename = "DRIVER")]
    pub driver: String,
}

impl From<&BmcRecord> for BmcRow {
    fn from(bmc: &BmcRecord) -> Self {
        Self {
            name: bmc.name.clone(),
            active: bmc.active,
            address: bmc.address.clone(),
            port: bmc.port,
            username: bmc.username.clone(),
            password: bmc.password.clone(),
            driver: bmc.driver.clone(),
        }
    }
}

/// One row of the `show` table.
#[derive(Debug, Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl PropertyRow {
    fn new(property: &str, value: impl ToString) -> Self {
        Self {
            property: property.to_string(),
            value: value.to_string(),
        }
    }
}

/// Render every config as one table, one row per BMC.
#[must_use]
pub fn bmc_table(bmcs: &[BmcRecord]) -> String {
    let rows: Vec<BmcRow> = bmcs.iter().map(BmcRow::from).collect();
    Table::new(rows).to_string()
}

/// Render a single config as property/value pairs.
///
/// Common settings come first, then driver settings sorted by key.
#[must_use]
pub fn property_table(bmc: &BmcRecord) -> String {
    let mut rows = vec![
        PropertyRow::new("name", &bmc.name),
        PropertyRow::new("driver", &bmc.driver),
        PropertyRow::new("active", bmc.active),
        PropertyRow::new("address", &bmc.address),
        PropertyRow::new("port", bmc.port),
        PropertyRow::new("username", &bmc.username),
        PropertyRow::new("password", &bmc.password),
    ];

    let mut extra: Vec<_> = bmc.extra.iter().collect();
    extra.sort_by(|a, b| a.0.cmp(b.0));
    rows.extend(
        extra
            .into_iter()
            .map(|(key, value)| PropertyRow::new(key, display_value(value))),
    );

    Table::new(rows).to_string()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
