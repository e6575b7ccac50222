//! Verification workflow: check a product's history end to end.

use std::sync::Arc;

use serde::Serialize;

use qualitrace_core::{
    Block, Digest, ProductRegistration, QualityInspection, Record, SubjectId, VerificationQuery,
    VerificationResult,
};

use crate::config::QualitraceConfig;
use crate::error::{LedgerError, Result};
use crate::ledger::Snapshot;
use crate::registry::LedgerRegistry;

/// What a consumer sees when verifying a product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductReport {
    pub product_id: SubjectId,
    pub registration: Option<ProductRegistration>,
    /// Inspections in chain order.
    pub inspections: Vec<QualityInspection>,
    /// Blocks covered by the verification.
    pub blocks: usize,
    /// Hash of the last verified block.
    pub tail: Option<Digest>,
    pub result: VerificationResult,
    /// The verification query recorded for this check, if any.
    #[serde(skip)]
    pub query_block: Option<Arc<Block>>,
}

impl ProductReport {
    fn from_snapshot(snapshot: &Snapshot, result: VerificationResult) -> Self {
        Self {
            product_id: snapshot.subject().clone(),
            registration: snapshot.registration().cloned(),
            inspections: snapshot.inspections().cloned().collect(),
            blocks: snapshot.len(),
            tail: snapshot.tail().map(|block| *block.hash()),
            result,
            query_block: None,
        }
    }

    /// Intact chain that starts with a registration.
    pub fn is_authentic(&self) -> bool {
        self.result.ok && self.registration.is_some()
    }

    pub fn latest_inspection(&self) -> Option<&QualityInspection> {
        self.inspections.last()
    }

    /// One-line description, stored with each verification query.
    pub fn summary(&self) -> String {
        let Some(registration) = &self.registration else {
            return "unregistered product".to_string();
        };

        let passed = self.inspections.iter().filter(|i| i.passed).count();
        let mut summary = format!(
            "authentic: {} by {}, {} inspections, {} passed",
            registration.name,
            registration.manufacturer,
            self.inspections.len(),
            passed
        );
        if let Some(latest) = self.latest_inspection() {
            summary.push_str(&format!(
                ", latest {} (score {})",
                if latest.passed { "passed" } else { "failed" },
                latest.score
            ));
        }
        summary
    }
}

/// Verifies product histories for consumers and auditors.
#[derive(Debug, Clone)]
pub struct VerificationWorkflow {
    registry: Arc<LedgerRegistry>,
    config: QualitraceConfig,
}

impl VerificationWorkflow {
    /// Fails with [`LedgerError::Config`] if `config` does not validate.
    pub fn new(registry: Arc<LedgerRegistry>, config: QualitraceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { registry, config })
    }

    /// Verify the product's full chain and summarize its history.
    ///
    /// A broken chain is reported as [`LedgerError::Integrity`], never as a
    /// report. When configured, a `VerificationQuery` block is appended after
    /// a successful check.
    pub fn verify_product(&self, product_id: &SubjectId) -> Result<ProductReport> {
        let ledger = self
            .registry
            .get(product_id)
            .ok_or_else(|| LedgerError::UnknownSubject(product_id.clone()))?;

        let snapshot = ledger.iterate();
        let result = snapshot.verify();

        if let Some(source) = result.failure() {
            tracing::warn!(
                product_id = %product_id,
                index = source.index,
                reason = %source.reason,
                "verification failed"
            );
            return Err(LedgerError::Integrity {
                subject: product_id.clone(),
                source,
            });
        }

        let mut report = ProductReport::from_snapshot(&snapshot, result);

        if self.config.record_verification_queries {
            let query = VerificationQuery {
                product_id: product_id.as_str().to_string(),
                queried_at: self.registry.clock().now_millis(),
                result_summary: report.summary(),
            };
            report.query_block = Some(ledger.append(Record::from(query))?);
        }

        tracing::info!(
            product_id = %product_id,
            blocks = report.blocks,
            authentic = report.is_authentic(),
            "verified product"
        );

        Ok(report)
    }

    /// Full history of the product as a point-in-time snapshot.
    pub fn history(&self, product_id: &SubjectId) -> Result<Snapshot> {
        self.registry
            .get(product_id)
            .map(|ledger| ledger.iterate())
            .ok_or_else(|| LedgerError::UnknownSubject(product_id.clone()))
    }
}
