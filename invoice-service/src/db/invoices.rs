//! Invoice CRUD operations.
//!
//! Vendor and header fields live in flat columns on `invoices`; line items
//! are rows in `invoice_line_items` ordered by `position`.

use rusqlite::{Connection, OptionalExtension, params};

use super::models::{Invoice, LineItem, format_timestamp};
use super::{Database, is_unique_violation};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

const INVOICE_COLUMNS: &str = "id, file_url, file_name, vendor_name, vendor_address, vendor_tax_id, \
     invoice_number, invoice_date, currency, subtotal, tax_percent, total, po_number, po_date, \
     created_at, updated_at";

impl Database {
    /// Insert a new invoice with its line items
    pub fn insert_invoice(&self, invoice: &Invoice) -> ServiceResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        tx.execute(
            r#"
            INSERT INTO invoices (id, file_url, file_name, vendor_name, vendor_address, vendor_tax_id, invoice_number, invoice_date, currency, subtotal, tax_percent, total, po_number, po_date, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                invoice.id,
                invoice.file_url,
                invoice.file_name,
                invoice.vendor.name,
                invoice.vendor.address,
                invoice.vendor.tax_id,
                invoice.invoice.number,
                invoice.invoice.date,
                invoice.invoice.currency,
                invoice.invoice.subtotal,
                invoice.invoice.tax_percent,
                invoice.invoice.total,
                invoice.invoice.po_number,
                invoice.invoice.po_date,
                format_timestamp(&invoice.created_at),
                format_timestamp(&invoice.updated_at),
            ],
        )
        .map_err(|e| write_error(e, &invoice.file_url))?;

        insert_line_items(&tx, &invoice.id, &invoice.invoice.line_items)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(())
    }

    /// Get an invoice by ID
    pub fn get_invoice(&self, id: &str) -> ServiceResult<Option<Invoice>> {
        let conn = self.conn()?;

        let line_items = load_line_items(&conn, id)?;
        conn.query_row(
            &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS),
            params![id],
            |row| Invoice::from_row(row, line_items),
        )
        .optional()
        .map_err(|e| DatabaseError::Query(e).into())
    }

    /// List invoices, newest first.
    ///
    /// A non-empty `search` matches case-insensitively as a substring of the
    /// vendor name or the invoice number.
    pub fn list_invoices(&self, search: Option<&str>) -> ServiceResult<Vec<Invoice>> {
        let conn = self.conn()?;

        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let mut stmt = if search.is_some() {
            conn.prepare(&format!(
                "SELECT {} FROM invoices \
                 WHERE unicode_lower(vendor_name) LIKE ?1 ESCAPE '\\' \
                    OR unicode_lower(invoice_number) LIKE ?1 ESCAPE '\\' \
                 ORDER BY created_at DESC, rowid DESC",
                INVOICE_COLUMNS
            ))
        } else {
            conn.prepare(&format!(
                "SELECT {} FROM invoices ORDER BY created_at DESC, rowid DESC",
                INVOICE_COLUMNS
            ))
        }
        .map_err(DatabaseError::Query)?;

        let rows = match search {
            Some(term) => stmt.query_map(params![like_pattern(&term.to_lowercase())], invoice_header),
            None => stmt.query_map([], invoice_header),
        }
        .map_err(DatabaseError::Query)?;

        let mut invoices = Vec::new();
        for row in rows {
            invoices.push(row.map_err(DatabaseError::Query)?);
        }

        for invoice in &mut invoices {
            invoice.invoice.line_items = load_line_items(&conn, &invoice.id)?;
        }

        Ok(invoices)
    }

    /// Overwrite a stored invoice (matched by id) including its line items.
    /// Returns false when no invoice has that id.
    pub fn replace_invoice(&self, invoice: &Invoice) -> ServiceResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let rows = tx
            .execute(
                r#"
                UPDATE invoices SET
                    file_url = ?2, file_name = ?3, vendor_name = ?4, vendor_address = ?5,
                    vendor_tax_id = ?6, invoice_number = ?7, invoice_date = ?8, currency = ?9,
                    subtotal = ?10, tax_percent = ?11, total = ?12, po_number = ?13, po_date = ?14,
                    updated_at = ?15
                WHERE id = ?1
                "#,
                params![
                    invoice.id,
                    invoice.file_url,
                    invoice.file_name,
                    invoice.vendor.name,
                    invoice.vendor.address,
                    invoice.vendor.tax_id,
                    invoice.invoice.number,
                    invoice.invoice.date,
                    invoice.invoice.currency,
                    invoice.invoice.subtotal,
                    invoice.invoice.tax_percent,
                    invoice.invoice.total,
                    invoice.invoice.po_number,
                    invoice.invoice.po_date,
                    format_timestamp(&invoice.updated_at),
                ],
            )
            .map_err(|e| write_error(e, &invoice.file_url))?;

        if rows == 0 {
            return Ok(false);
        }

        tx.execute(
            "DELETE FROM invoice_line_items WHERE invoice_id = ?1",
            params![invoice.id],
        )
        .map_err(DatabaseError::Query)?;
        insert_line_items(&tx, &invoice.id, &invoice.invoice.line_items)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(true)
    }

    /// Delete an invoice and its line items, unlinking any file that pointed at it
    pub fn delete_invoice(&self, id: &str) -> ServiceResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let rows = tx
            .execute("DELETE FROM invoices WHERE id = ?1", params![id])
            .map_err(DatabaseError::Query)?;

        tx.execute(
            "UPDATE files SET invoice_id = NULL WHERE invoice_id = ?1",
            params![id],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(rows > 0)
    }
}

fn insert_line_items(conn: &Connection, invoice_id: &str, items: &[LineItem]) -> ServiceResult<()> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO invoice_line_items (invoice_id, position, description, unit_price, quantity, total) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(DatabaseError::Query)?;

    for (position, item) in items.iter().enumerate() {
        stmt.execute(params![
            invoice_id,
            position as i64,
            item.description,
            item.unit_price,
            item.quantity,
            item.total,
        ])
        .map_err(DatabaseError::Query)?;
    }

    Ok(())
}

fn load_line_items(conn: &Connection, invoice_id: &str) -> ServiceResult<Vec<LineItem>> {
    let mut stmt = conn
        .prepare(
            "SELECT description, unit_price, quantity, total FROM invoice_line_items \
             WHERE invoice_id = ?1 ORDER BY position",
        )
        .map_err(DatabaseError::Query)?;

    let rows = stmt
        .query_map(params![invoice_id], |row| {
            Ok(LineItem {
                description: row.get(0)?,
                unit_price: row.get(1)?,
                quantity: row.get(2)?,
                total: row.get(3)?,
            })
        })
        .map_err(DatabaseError::Query)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row.map_err(DatabaseError::Query)?);
    }

    Ok(items)
}

/// Row mapper for listings; line items are loaded afterwards
fn invoice_header(row: &rusqlite::Row<'_>) -> rusqlite::Result<Invoice> {
    Invoice::from_row(row, Vec::new())
}

fn write_error(error: rusqlite::Error, file_url: &str) -> ServiceError {
    if is_unique_violation(&error) {
        ServiceError::InvoiceExists {
            file_url: file_url.to_string(),
        }
    } else {
        DatabaseError::Query(error).into()
    }
}

/// `%term%` with LIKE wildcards in `term` escaped
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
