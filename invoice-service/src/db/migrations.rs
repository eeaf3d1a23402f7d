//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// Called during database initialization; every statement is idempotent.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- Uploaded files
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            file_url TEXT NOT NULL UNIQUE,
            file_name TEXT NOT NULL,
            pathname TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size INTEGER NOT NULL,
            file_hash TEXT NOT NULL,
            invoice_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_files_created ON files(created_at);

        -- Extracted invoices
        CREATE TABLE IF NOT EXISTS invoices (
            id TEXT PRIMARY KEY,
            file_url TEXT NOT NULL UNIQUE,
            file_name TEXT NOT NULL,
            vendor_name TEXT NOT NULL,
            vendor_address TEXT,
            vendor_tax_id TEXT,
            invoice_number TEXT NOT NULL,
            invoice_date TEXT NOT NULL,
            currency TEXT,
            subtotal REAL,
            tax_percent REAL,
            total REAL,
            po_number TEXT,
            po_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_invoices_created ON invoices(created_at);

        -- Invoice lines, kept in document order
        CREATE TABLE IF NOT EXISTS invoice_line_items (
            invoice_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            description TEXT NOT NULL,
            unit_price REAL NOT NULL,
            quantity REAL NOT NULL,
            total REAL NOT NULL,
            PRIMARY KEY (invoice_id, position),
            FOREIGN KEY (invoice_id) REFERENCES invoices(id) ON DELETE CASCADE
        );
        "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: format!("initial schema: {}", e),
    })?;

    Ok(())
}
