//! Registration workflow: open a product's ledger with its registration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use qualitrace_core::{Block, ProductRegistration, Record, SubjectId};

use crate::error::{LedgerError, Result};
use crate::ids::generate_product_id;
use crate::registry::LedgerRegistry;

/// What a manufacturer supplies when registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub manufacturer: String,
    pub category: String,
    pub batch_number: String,
    pub manufacture_date: String,
}

/// A completed registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub product_id: SubjectId,
    /// Block 0 of the product's ledger.
    pub block: Arc<Block>,
}

/// Registers products as the genesis block of a fresh ledger.
#[derive(Debug, Clone)]
pub struct RegistrationWorkflow {
    registry: Arc<LedgerRegistry>,
}

impl RegistrationWorkflow {
    pub fn new(registry: Arc<LedgerRegistry>) -> Self {
        Self { registry }
    }

    /// Register under a freshly generated `PROD-...` identifier.
    pub fn register(&self, details: ProductDetails) -> Result<Registration> {
        let product_id = SubjectId::new(generate_product_id())?;
        self.register_with_id(product_id, details)
    }

    /// Register under a caller-chosen identifier.
    ///
    /// Fails with [`LedgerError::AlreadyRegistered`] if the product's ledger
    /// already has any history.
    pub fn register_with_id(
        &self,
        product_id: SubjectId,
        details: ProductDetails,
    ) -> Result<Registration> {
        let record = Record::from(ProductRegistration {
            product_id: product_id.as_str().to_string(),
            name: details.name,
            manufacturer: details.manufacturer,
            category: details.category,
            batch_number: details.batch_number,
            manufacture_date: details.manufacture_date,
        });
        record.validate()?;

        let ledger = self.registry.resolve(&product_id);
        let block = ledger
            .append_after(None, record)
            .map_err(|e| match e {
                LedgerError::StaleTail { subject, .. } => LedgerError::AlreadyRegistered(subject),
                other => other,
            })?;

        tracing::info!(product_id = %product_id, hash = %block.hash(), "registered product");

        Ok(Registration { product_id, block })
    }
}
