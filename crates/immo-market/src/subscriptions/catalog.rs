//! Plan catalog import from the admin CSV export.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::billing::BillingCycle;
use super::plan::{PlanCap, PlanId, ResourceCaps, SubscriptionPlan};

#[derive(Debug, thiserror::Error)]
pub enum PlanImportError {
    #[error("failed to read plan catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid plan catalog CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {field} must be a non-negative integer or -1, found {value}")]
    InvalidCap {
        row: usize,
        field: &'static str,
        value: i64,
    },
    #[error("row {row}: {source}")]
    InvalidCycle {
        row: usize,
        source: super::billing::UnknownBillingCycle,
    },
    #[error("duplicate plan id '{0}'")]
    DuplicatePlan(String),
}

#[derive(Debug, Deserialize)]
struct PlanRow {
    id: String,
    name: String,
    price: u32,
    billing_cycle: String,
    max_properties: i64,
    max_agencies: i64,
    max_leases: i64,
    max_users: i64,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    is_free: bool,
}

fn default_true() -> bool {
    true
}

pub struct PlanCatalogImporter;

impl PlanCatalogImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<SubscriptionPlan>, PlanImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Billing cycles are parsed strictly here so a typo in the export is caught
    /// instead of silently billing monthly.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<SubscriptionPlan>, PlanImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut plans: Vec<SubscriptionPlan> = Vec::new();
        for (index, row) in csv_reader.deserialize::<PlanRow>().enumerate() {
            let row = row?;
            let line = index + 2;

            if plans.iter().any(|plan| plan.id.0 == row.id) {
                return Err(PlanImportError::DuplicatePlan(row.id));
            }

            let billing_cycle = BillingCycle::try_from_label(&row.billing_cycle)
                .map_err(|source| PlanImportError::InvalidCycle { row: line, source })?;

            let caps = ResourceCaps {
                max_properties: cap(line, "max_properties", row.max_properties)?,
                max_agencies: cap(line, "max_agencies", row.max_agencies)?,
                max_leases: cap(line, "max_leases", row.max_leases)?,
                max_users: cap(line, "max_users", row.max_users)?,
            };

            plans.push(SubscriptionPlan {
                id: PlanId(row.id),
                name: row.name,
                price: row.price,
                billing_cycle,
                caps,
                features: Vec::new(),
                is_active: row.is_active,
                is_free: row.is_free,
            });
        }

        Ok(plans)
    }
}

fn cap(row: usize, field: &'static str, value: i64) -> Result<PlanCap, PlanImportError> {
    PlanCap::from_raw(value).ok_or(PlanImportError::InvalidCap { row, field, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str =
        "id,name,price,billing_cycle,max_properties,max_agencies,max_leases,max_users,is_active,is_free\n";

    #[test]
    fn imports_plans_with_unlimited_caps() {
        let csv = format!(
            "{HEADER}free,Free,0,monthly,1,1,2,1,true,true\nelite,Elite,90000,yearly,-1,-1,-1,25,true,false\n"
        );
        let plans = PlanCatalogImporter::from_reader(Cursor::new(csv)).expect("imports");
        assert_eq!(plans.len(), 2);
        assert!(plans[0].is_free_tier());
        assert_eq!(plans[1].billing_cycle, BillingCycle::Yearly);
        assert!(plans[1].caps.max_leases.is_unlimited());
        assert_eq!(plans[1].caps.max_users, PlanCap::Limited(25));
    }

    #[test]
    fn rejects_unknown_cycle_with_row_number() {
        let csv = format!("{HEADER}pro,Pro,15000,fortnightly,10,1,20,3,true,false\n");
        let err = PlanCatalogImporter::from_reader(Cursor::new(csv)).expect_err("cycle rejected");
        assert!(matches!(err, PlanImportError::InvalidCycle { row: 2, .. }));
    }

    #[test]
    fn rejects_negative_caps() {
        let csv = format!("{HEADER}pro,Pro,15000,monthly,10,-3,20,3,true,false\n");
        let err = PlanCatalogImporter::from_reader(Cursor::new(csv)).expect_err("cap rejected");
        assert!(matches!(
            err,
            PlanImportError::InvalidCap {
                field: "max_agencies",
                value: -3,
                ..
            }
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let csv = format!(
            "{HEADER}pro,Pro,15000,monthly,10,1,20,3,true,false\npro,Pro 2,16000,monthly,10,1,20,3,true,false\n"
        );
        let err = PlanCatalogImporter::from_reader(Cursor::new(csv)).expect_err("duplicate");
        assert!(matches!(err, PlanImportError::DuplicatePlan(id) if id == "pro"));
    }
}
