//! Invoice CRUD operations.

use tracing::info;
use validator::Validate;

use crate::db::{Invoice, InvoiceUpdate, NewInvoice};
use crate::error::{ServiceError, ServiceResult};
use crate::service::InvoiceService;

impl InvoiceService {
    /// Validate and store a new invoice
    pub fn create_invoice(&self, new: NewInvoice) -> ServiceResult<Invoice> {
        new.validate()?;

        let invoice = Invoice::create(new);
        self.db.insert_invoice(&invoice)?;

        info!(invoice_id = %invoice.id, file_url = %invoice.file_url, "Invoice created");
        Ok(invoice)
    }

    /// List invoices, optionally filtered by vendor name or invoice number
    pub fn list_invoices(&self, query: Option<&str>) -> ServiceResult<Vec<Invoice>> {
        self.db.list_invoices(query)
    }

    pub fn get_invoice(&self, id: &str) -> ServiceResult<Invoice> {
        self.db
            .get_invoice(id)?
            .ok_or_else(|| not_found(id))
    }

    /// Apply an update; present top-level keys replace the stored values
    pub fn update_invoice(&self, id: &str, update: InvoiceUpdate) -> ServiceResult<Invoice> {
        let mut invoice = self.get_invoice(id)?;
        update.apply_to(&mut invoice);
        invoice.validate()?;

        // Gone between read and write
        if !self.db.replace_invoice(&invoice)? {
            return Err(not_found(id));
        }

        info!(invoice_id = %id, "Invoice updated");
        Ok(invoice)
    }

    pub fn delete_invoice(&self, id: &str) -> ServiceResult<()> {
        if !self.db.delete_invoice(id)? {
            return Err(not_found(id));
        }

        info!(invoice_id = %id, "Invoice deleted");
        Ok(())
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::InvoiceNotFound {
        invoice_id: id.to_string(),
    }
}
