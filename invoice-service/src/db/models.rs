//! Database model structs.
//!
//! These are also the JSON shapes of the HTTP API: camelCase field names with
//! the record id exposed as `_id`.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use validator::Validate;

mod lenient;

/// Uploaded file record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub file_url: String,
    pub file_name: String,
    /// Key of the stored blob
    pub pathname: String,
    pub content_type: String,
    pub size: u64,
    /// SHA-256 of the file content (hex)
    pub file_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let size: i64 = row.get(5)?;
        let created_at_str: String = row.get(8)?;
        let updated_at_str: String = row.get(9)?;

        Ok(Self {
            id: row.get(0)?,
            file_url: row.get(1)?,
            file_name: row.get(2)?,
            pathname: row.get(3)?,
            content_type: row.get(4)?,
            size: size.max(0) as u64,
            file_hash: row.get(6)?,
            invoice_id: row.get(7)?,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

/// Seller on an invoice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    #[serde(default, deserialize_with = "lenient::string")]
    #[validate(length(min = 1, message = "vendor.name is required"))]
    pub name: String,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub tax_id: Option<String>,
}

/// One billed line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient::string")]
    #[validate(length(min = 1, message = "lineItems.description is required"))]
    pub description: String,

    #[serde(deserialize_with = "lenient::number")]
    pub unit_price: f64,

    #[serde(deserialize_with = "lenient::number")]
    pub quantity: f64,

    #[serde(deserialize_with = "lenient::number")]
    pub total: f64,
}

/// Invoice header and lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetails {
    #[serde(default, deserialize_with = "lenient::string")]
    #[validate(length(min = 1, message = "invoice.number is required"))]
    pub number: String,

    #[serde(default, deserialize_with = "lenient::string")]
    #[validate(length(min = 1, message = "invoice.date is required"))]
    pub date: String,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub currency: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub subtotal: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub tax_percent: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub po_number: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub po_date: Option<String>,

    #[serde(default, deserialize_with = "lenient::seq")]
    #[validate(nested)]
    pub line_items: Vec<LineItem>,
}

/// The JSON object a model is asked to produce
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ExtractedInvoice {
    #[serde(default)]
    #[validate(nested)]
    pub vendor: Vendor,

    #[serde(default)]
    #[validate(nested)]
    pub invoice: InvoiceDetails,
}

/// Payload for creating an invoice
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    #[serde(default, deserialize_with = "lenient::string")]
    #[validate(length(min = 1, message = "fileUrl is required"))]
    pub file_url: String,

    #[serde(default, deserialize_with = "lenient::string")]
    #[validate(length(min = 1, message = "fileName is required"))]
    pub file_name: String,

    #[serde(default)]
    #[validate(nested)]
    pub vendor: Vendor,

    #[serde(default)]
    #[validate(nested)]
    pub invoice: InvoiceDetails,
}

impl NewInvoice {
    pub fn from_extraction(
        file_url: impl Into<String>,
        file_name: impl Into<String>,
        extracted: ExtractedInvoice,
    ) -> Self {
        Self {
            file_url: file_url.into(),
            file_name: file_name.into(),
            vendor: extracted.vendor,
            invoice: extracted.invoice,
        }
    }
}

/// Update payload. Present top-level keys replace the stored value wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceUpdate {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub file_url: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub file_name: Option<String>,

    #[serde(default)]
    pub vendor: Option<Vendor>,

    #[serde(default)]
    pub invoice: Option<InvoiceDetails>,
}

impl InvoiceUpdate {
    /// Apply the present keys to `invoice` and bump `updated_at`
    pub fn apply_to(self, invoice: &mut Invoice) {
        if let Some(file_url) = self.file_url {
            invoice.file_url = file_url;
        }
        if let Some(file_name) = self.file_name {
            invoice.file_name = file_name;
        }
        if let Some(vendor) = self.vendor {
            invoice.vendor = vendor;
        }
        if let Some(details) = self.invoice {
            invoice.invoice = details;
        }
        invoice.updated_at = now();
    }
}

/// Stored invoice record
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: String,

    #[validate(length(min = 1, message = "fileUrl is required"))]
    pub file_url: String,

    #[validate(length(min = 1, message = "fileName is required"))]
    pub file_name: String,

    #[validate(nested)]
    pub vendor: Vendor,

    #[validate(nested)]
    pub invoice: InvoiceDetails,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Build a new record with a fresh id and timestamps
    pub fn create(new: NewInvoice) -> Self {
        let now = now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_url: new.file_url,
            file_name: new.file_name,
            vendor: new.vendor,
            invoice: new.invoice,
            created_at: now,
            updated_at: now,
        }
    }

    /// Columns: id, file_url, file_name, vendor_name, vendor_address,
    /// vendor_tax_id, invoice_number, invoice_date, currency, subtotal,
    /// tax_percent, total, po_number, po_date, created_at, updated_at
    pub(crate) fn from_row(row: &Row<'_>, line_items: Vec<LineItem>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(14)?;
        let updated_at_str: String = row.get(15)?;

        Ok(Self {
            id: row.get(0)?,
            file_url: row.get(1)?,
            file_name: row.get(2)?,
            vendor: Vendor {
                name: row.get(3)?,
                address: row.get(4)?,
                tax_id: row.get(5)?,
            },
            invoice: InvoiceDetails {
                number: row.get(6)?,
                date: row.get(7)?,
                currency: row.get(8)?,
                subtotal: row.get(9)?,
                tax_percent: row.get(10)?,
                total: row.get(11)?,
                po_number: row.get(12)?,
                po_date: row.get(13)?,
                line_items,
            },
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

/// Current time at the precision timestamps are stored with
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
