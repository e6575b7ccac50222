//! Records: the logical payload of one ledger event.
//!
//! A record is one of three kinds, each describing a step in a product's
//! lifecycle. Records are plain data; their canonical byte form lives in
//! [`crate::canonical`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EncodingError;

/// Upper bound (inclusive) for inspection scores and label confidences.
pub const MAX_SCORE: u8 = 100;

/// Discriminator for record interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    ProductRegistration,
    QualityInspection,
    VerificationQuery,
}

impl RecordKind {
    /// Stable name used in the canonical encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::ProductRegistration => "product_registration",
            RecordKind::QualityInspection => "quality_inspection",
            RecordKind::VerificationQuery => "verification_query",
        }
    }

    /// Parse a kind name. Unknown names return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "product_registration" => Some(Self::ProductRegistration),
            "quality_inspection" => Some(Self::QualityInspection),
            "verification_query" => Some(Self::VerificationQuery),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manufacturer registering a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistration {
    pub product_id: String,
    pub name: String,
    pub manufacturer: String,
    pub category: String,
    pub batch_number: String,
    pub manufacture_date: String,
}

/// One classifier label with its confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub label: String,
    /// Confidence in percent, `0..=100`.
    pub confidence: u8,
}

impl Label {
    pub fn new(label: impl Into<String>, confidence: u8) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// An inspector's quality verdict for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityInspection {
    pub inspection_id: String,
    pub product_id: String,
    /// Opaque signer identity (wallet address, user name, ...).
    pub inspector: String,
    /// Quality score, `0..=100`.
    pub score: u8,
    pub passed: bool,
    /// Labels in the order the oracle ranked them.
    pub labels: Vec<Label>,
}

/// A consumer or auditor querying a product's authenticity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationQuery {
    pub product_id: String,
    /// Epoch milliseconds at which the query ran.
    pub queried_at: i64,
    pub result_summary: String,
}

/// The payload of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    ProductRegistration(ProductRegistration),
    QualityInspection(QualityInspection),
    VerificationQuery(VerificationQuery),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::ProductRegistration(_) => RecordKind::ProductRegistration,
            Record::QualityInspection(_) => RecordKind::QualityInspection,
            Record::VerificationQuery(_) => RecordKind::VerificationQuery,
        }
    }

    /// The product this record refers to.
    pub fn product_id(&self) -> &str {
        match self {
            Record::ProductRegistration(r) => &r.product_id,
            Record::QualityInspection(r) => &r.product_id,
            Record::VerificationQuery(r) => &r.product_id,
        }
    }

    pub fn as_registration(&self) -> Option<&ProductRegistration> {
        match self {
            Record::ProductRegistration(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_inspection(&self) -> Option<&QualityInspection> {
        match self {
            Record::QualityInspection(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_verification(&self) -> Option<&VerificationQuery> {
        match self {
            Record::VerificationQuery(r) => Some(r),
            _ => None,
        }
    }

    /// Check required fields and numeric ranges.
    ///
    /// Required text fields: `product_id` (all kinds), registration `name`,
    /// `inspection_id`, and each label's text. Blank counts as absent.
    pub fn validate(&self) -> Result<(), EncodingError> {
        require("product_id", self.product_id())?;

        match self {
            Record::ProductRegistration(r) => require("name", &r.name),
            Record::QualityInspection(r) => {
                require("inspection_id", &r.inspection_id)?;
                check_range("score", r.score)?;
                for label in &r.labels {
                    require("label", &label.label)?;
                    check_range("confidence", label.confidence)?;
                }
                Ok(())
            }
            Record::VerificationQuery(_) => Ok(()),
        }
    }
}

impl From<ProductRegistration> for Record {
    fn from(r: ProductRegistration) -> Self {
        Record::ProductRegistration(r)
    }
}

impl From<QualityInspection> for Record {
    fn from(r: QualityInspection) -> Self {
        Record::QualityInspection(r)
    }
}

impl From<VerificationQuery> for Record {
    fn from(r: VerificationQuery) -> Self {
        Record::VerificationQuery(r)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), EncodingError> {
    if value.trim().is_empty() {
        Err(EncodingError::MissingField(field))
    } else {
        Ok(())
    }
}

fn check_range(field: &'static str, value: u8) -> Result<(), EncodingError> {
    if value > MAX_SCORE {
        Err(EncodingError::OutOfRange {
            field,
            value: value.into(),
            max: MAX_SCORE.into(),
        })
    } else {
        Ok(())
    }
}
