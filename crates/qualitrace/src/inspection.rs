//! Inspection workflow: score a product image and record the verdict.

use std::sync::Arc;

use qualitrace_core::{Block, Label, QualityInspection, Record, SubjectId, MAX_SCORE};

use crate::config::QualitraceConfig;
use crate::error::{LedgerError, Result};
use crate::ids::inspection_id_at;
use crate::oracle::{InspectionOracle, OracleVerdict};
use crate::registry::LedgerRegistry;

/// Result of one inspection.
#[derive(Debug, Clone)]
pub struct InspectionOutcome {
    pub record: QualityInspection,
    pub block: Arc<Block>,
    /// Human readable analysis of the verdict.
    pub summary: String,
}

/// Runs images through an oracle and appends the verdicts.
pub struct InspectionWorkflow<O> {
    registry: Arc<LedgerRegistry>,
    oracle: O,
    config: QualitraceConfig,
}

impl<O: InspectionOracle> InspectionWorkflow<O> {
    /// Fails with [`LedgerError::Config`] if `config` does not validate.
    pub fn new(
        registry: Arc<LedgerRegistry>,
        oracle: O,
        config: QualitraceConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            oracle,
            config,
        })
    }

    pub fn config(&self) -> &QualitraceConfig {
        &self.config
    }

    /// Inspect a product image and append a `QualityInspection` block.
    ///
    /// The oracle is consulted before anything is appended; if it fails or
    /// returns out-of-range values the ledger is left untouched.
    pub async fn inspect(
        &self,
        product_id: &SubjectId,
        inspector: &str,
        image: &[u8],
    ) -> Result<InspectionOutcome> {
        if self.config.require_registration && !self.is_registered(product_id) {
            return Err(LedgerError::UnregisteredProduct(product_id.clone()));
        }

        let verdict = self.oracle.classify(image).await?;
        check_verdict(&verdict)?;

        let labels = top_labels(verdict.labels, self.config.max_labels);
        let passed = verdict.score >= self.config.pass_threshold;

        let record = QualityInspection {
            inspection_id: inspection_id_at(self.registry.clock().now_millis()),
            product_id: product_id.as_str().to_string(),
            inspector: inspector.to_string(),
            score: verdict.score,
            passed,
            labels,
        };

        let block = self
            .registry
            .append_record(product_id, Record::from(record.clone()))?;
        let summary = analysis_summary(&record);

        tracing::info!(
            product_id = %product_id,
            inspection_id = %record.inspection_id,
            score = record.score,
            passed,
            seq = block.sequence_number(),
            "recorded inspection"
        );

        Ok(InspectionOutcome {
            record,
            block,
            summary,
        })
    }

    fn is_registered(&self, product_id: &SubjectId) -> bool {
        self.registry
            .get(product_id)
            .map_or(false, |ledger| ledger.iterate().registration().is_some())
    }
}

fn check_verdict(verdict: &OracleVerdict) -> Result<()> {
    if verdict.score > MAX_SCORE {
        return Err(LedgerError::InvalidVerdict(format!(
            "score {} exceeds {}",
            verdict.score, MAX_SCORE
        )));
    }
    if let Some(label) = verdict.labels.iter().find(|l| l.confidence > MAX_SCORE) {
        return Err(LedgerError::InvalidVerdict(format!(
            "confidence {} for {:?} exceeds {}",
            label.confidence, label.label, MAX_SCORE
        )));
    }
    if verdict.labels.iter().any(|l| l.label.trim().is_empty()) {
        return Err(LedgerError::InvalidVerdict("empty label".into()));
    }
    Ok(())
}

/// Highest-confidence labels first; ties keep the oracle's order.
fn top_labels(mut labels: Vec<Label>, max: usize) -> Vec<Label> {
    labels.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    labels.truncate(max);
    labels
}

fn analysis_summary(record: &QualityInspection) -> String {
    if !record.passed {
        return "Low confidence score. Potential quality issues detected. Requires manual review."
            .to_string();
    }

    match record.labels.first() {
        Some(top) => format!(
            "High confidence match detected. Product appears to be authentic. \
             Top prediction: {} ({}% confidence)",
            top.label, top.confidence
        ),
        None => "High confidence match detected. Product appears to be authentic.".to_string(),
    }
}
