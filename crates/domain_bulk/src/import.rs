//! CSV customer import
//!
//! The first row is the header. A `FieldMapping` names, for each customer
//! field, the CSV column it is read from. Each data row is validated with
//! the single-customer creation rules; a bad row is recorded as
//! `Row N: message` and never aborts the batch.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BulkImportId, CompanyId, PackageId, PopId, RouterId, UserId};
use domain_billing::{CustomerType, NewCustomer, Package};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }
}

impl FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImportStatus::Pending),
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "failed" => Ok(ImportStatus::Failed),
            other => Err(format!("unknown import status: {}", other)),
        }
    }
}

/// Record of one import run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkImport {
    pub id: BulkImportId,
    pub company_id: CompanyId,
    pub user_id: Option<UserId>,
    pub file_name: String,
    pub total_records: u32,
    pub success_records: u32,
    pub failed_records: u32,
    pub status: ImportStatus,
    /// Newline-joined per-row messages
    pub error_log: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BulkImport {
    /// A run that has started processing
    pub fn start(company_id: CompanyId, user_id: Option<UserId>, file_name: &str) -> Self {
        Self {
            id: BulkImportId::new_v7(),
            company_id,
            user_id,
            file_name: file_name.to_string(),
            total_records: 0,
            success_records: 0,
            failed_records: 0,
            status: ImportStatus::Processing,
            error_log: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn complete(&mut self, errors: &[String], at: DateTime<Utc>) {
        self.status = ImportStatus::Completed;
        self.error_log = (!errors.is_empty()).then(|| errors.join("\n"));
        self.completed_at = Some(at);
    }

    pub fn fail(&mut self, message: String, at: DateTime<Utc>) {
        self.status = ImportStatus::Failed;
        self.error_log = Some(message);
        self.completed_at = Some(at);
    }

    pub fn errors(&self) -> Vec<&str> {
        self.error_log
            .as_deref()
            .map(|log| log.lines().collect())
            .unwrap_or_default()
    }
}

/// Customer field ⇒ CSV column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(pub HashMap<String, String>);

/// Customer fields an import can populate
pub const IMPORT_FIELDS: &[&str] = &[
    "name",
    "phone",
    "email",
    "username",
    "password",
    "package_id",
    "pop_id",
    "router_id",
    "reseller_id",
    "customer_type",
    "nid",
    "ip_address",
    "mac_address",
    "notes",
    "expiry_date",
];

impl FieldMapping {
    /// Maps every known field to a column of the same name
    pub fn identity() -> Self {
        Self(
            IMPORT_FIELDS
                .iter()
                .map(|f| (f.to_string(), f.to_string()))
                .collect(),
        )
    }

    /// Rejects mappings that name fields an import cannot populate
    pub fn validate(&self) -> Result<(), String> {
        let unknown: Vec<&str> = self
            .0
            .keys()
            .map(String::as_str)
            .filter(|k| !IMPORT_FIELDS.contains(k))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(format!("unknown mapped fields: {}", unknown.join(", ")))
        }
    }

    /// Resolves the mapping against a header row into field ⇒ column index
    pub fn resolve(&self, headers: &csv::StringRecord) -> HashMap<String, usize> {
        self.0
            .iter()
            .filter_map(|(field, column)| {
                headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(column.trim()))
                    .map(|index| (field.clone(), index))
            })
            .collect()
    }
}

/// One data row with its mapped field values
pub struct MappedRow<'a> {
    record: &'a csv::StringRecord,
    columns: &'a HashMap<String, usize>,
}

impl<'a> MappedRow<'a> {
    pub fn new(record: &'a csv::StringRecord, columns: &'a HashMap<String, usize>) -> Self {
        Self { record, columns }
    }

    fn get(&self, field: &str) -> Option<&'a str> {
        self.columns
            .get(field)
            .and_then(|&i| self.record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn text(&self, field: &str) -> String {
        self.get(field).unwrap_or_default().to_string()
    }

    fn opt(&self, field: &str) -> Option<String> {
        self.get(field).map(str::to_string)
    }

    fn parse<T: FromStr>(&self, field: &str) -> Result<Option<T>, String> {
        self.get(field)
            .map(|v| v.parse::<T>().map_err(|_| format!("{}: invalid value '{}'", field, v)))
            .transpose()
    }

    /// Builds the creation request; the package may be given by id or by name
    pub fn to_new_customer(&self, packages: &[Package]) -> Result<NewCustomer, String> {
        let package_id = match self.get("package_id") {
            None => None,
            Some(value) => Some(match PackageId::from_str(value) {
                Ok(id) => id,
                Err(_) => packages
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(value))
                    .map(|p| p.id)
                    .ok_or_else(|| format!("package_id: unknown package '{}'", value))?,
            }),
        };

        Ok(NewCustomer {
            name: self.text("name"),
            phone: self.text("phone"),
            email: self.opt("email"),
            username: self.text("username"),
            password: self.text("password"),
            package_id,
            pop_id: self.parse::<PopId>("pop_id")?,
            router_id: self.parse::<RouterId>("router_id")?,
            reseller_id: self.parse::<UserId>("reseller_id")?,
            customer_type: self.parse::<CustomerType>("customer_type")?,
            nid: self.opt("nid"),
            ip_address: self.opt("ip_address"),
            mac_address: self.opt("mac_address"),
            notes: self.opt("notes"),
            expiry_date: self.parse::<NaiveDate>("expiry_date")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_resolves_case_insensitively() {
        let mut mapping = FieldMapping::default();
        mapping.0.insert("name".into(), "Full Name".into());
        mapping.0.insert("phone".into(), "Mobile".into());
        let headers = csv::StringRecord::from(vec!["mobile", "full name", "extra"]);
        let columns = mapping.resolve(&headers);
        assert_eq!(columns.get("name"), Some(&1));
        assert_eq!(columns.get("phone"), Some(&0));
    }

    #[test]
    fn test_unknown_mapping_field_rejected() {
        let mut mapping = FieldMapping::identity();
        mapping.0.insert("balance".into(), "balance".into());
        assert!(mapping.validate().is_err());
    }

    #[test]
    fn test_row_rejects_unknown_package_name() {
        let headers = csv::StringRecord::from(vec!["name", "username", "package_id"]);
        let columns = FieldMapping::identity().resolve(&headers);
        let record = csv::StringRecord::from(vec!["Rahim", "rahim", "Gold 50"]);
        let err = MappedRow::new(&record, &columns).to_new_customer(&[]).unwrap_err();
        assert!(err.contains("unknown package"));
    }

    #[test]
    fn test_row_maps_blank_cells_to_none() {
        let headers = csv::StringRecord::from(vec!["name", "email", "expiry_date"]);
        let columns = FieldMapping::identity().resolve(&headers);
        let record = csv::StringRecord::from(vec!["Rahim", " ", "2025-04-01"]);
        let req = MappedRow::new(&record, &columns).to_new_customer(&[]).unwrap();
        assert_eq!(req.email, None);
        assert_eq!(req.package_id, None);
        assert_eq!(req.expiry_date, NaiveDate::from_ymd_opt(2025, 4, 1));
    }

    #[test]
    fn test_complete_joins_errors() {
        let mut import = BulkImport::start(CompanyId::new(), None, "customers.csv");
        import.complete(&["Row 2: a".to_string(), "Row 5: b".to_string()], Utc::now());
        assert_eq!(import.status, ImportStatus::Completed);
        assert_eq!(import.error_log.as_deref(), Some("Row 2: a\nRow 5: b"));
        assert_eq!(import.errors(), vec!["Row 2: a", "Row 5: b"]);
    }
}
