//! Proptest generators for property-based testing.

use proptest::prelude::*;

use qualitrace_core::{
    Block, Digest, Label, ProductRegistration, QualityInspection, Record, RecordKind,
    VerificationQuery, MAX_SCORE,
};

use crate::fixtures::build_chain;

/// Generate a random Digest.
pub fn digest() -> impl Strategy<Value = Digest> {
    any::<[u8; 32]>().prop_map(Digest::from_bytes)
}

/// Generate a product id.
pub fn product_id() -> impl Strategy<Value = String> {
    "P[0-9]{1,6}".prop_map(String::from)
}

/// Generate free text, including non-ASCII.
pub fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9éü][a-zA-Z0-9 _.\\-éü]{0,23}".prop_map(String::from)
}

/// Generate a score in `0..=100`.
pub fn score() -> impl Strategy<Value = u8> {
    0..=MAX_SCORE
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800_000i64
}

pub fn label() -> impl Strategy<Value = Label> {
    (text(), score()).prop_map(|(label, confidence)| Label::new(label, confidence))
}

pub fn registration(product_id: String) -> impl Strategy<Value = ProductRegistration> {
    (text(), text(), text(), text(), "20[0-9]{2}-[01][0-9]-[0-3][0-9]").prop_map(
        move |(name, manufacturer, category, batch_number, manufacture_date)| {
            ProductRegistration {
                product_id: product_id.clone(),
                name,
                manufacturer,
                category,
                batch_number,
                manufacture_date,
            }
        },
    )
}

pub fn inspection(product_id: String) -> impl Strategy<Value = QualityInspection> {
    (
        "INSP-[0-9]{13}",
        text(),
        score(),
        prop::collection::vec(label(), 0..=3),
    )
        .prop_map(move |(inspection_id, inspector, score, labels)| QualityInspection {
            inspection_id,
            product_id: product_id.clone(),
            inspector,
            score,
            passed: score >= 75,
            labels,
        })
}

pub fn verification(product_id: String) -> impl Strategy<Value = VerificationQuery> {
    (timestamp(), text()).prop_map(move |(queried_at, result_summary)| VerificationQuery {
        product_id: product_id.clone(),
        queried_at,
        result_summary,
    })
}

/// Generate a record of the given kind.
pub fn record_of(kind: RecordKind, product_id: String) -> BoxedStrategy<Record> {
    match kind {
        RecordKind::ProductRegistration => registration(product_id).prop_map(Record::from).boxed(),
        RecordKind::QualityInspection => inspection(product_id).prop_map(Record::from).boxed(),
        RecordKind::VerificationQuery => verification(product_id).prop_map(Record::from).boxed(),
    }
}

/// Generate a non-genesis record: an inspection or a verification query.
pub fn event(product_id: String) -> BoxedStrategy<Record> {
    prop_oneof![
        3 => record_of(RecordKind::QualityInspection, product_id.clone()),
        1 => record_of(RecordKind::VerificationQuery, product_id),
    ]
    .boxed()
}

/// Parameters for generating a product chain.
///
/// The first record is always a registration, the rest are events for the
/// same product.
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub product_id: String,
    pub start: i64,
    pub records: Vec<Record>,
}

impl Arbitrary for ChainParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (product_id(), timestamp())
            .prop_flat_map(|(id, start)| {
                (
                    Just(id.clone()),
                    Just(start),
                    registration(id.clone()),
                    prop::collection::vec(event(id), 1..12),
                )
            })
            .prop_map(|(product_id, start, registration, events)| {
                let mut records = vec![Record::from(registration)];
                records.extend(events);
                ChainParams {
                    product_id,
                    start,
                    records,
                }
            })
            .boxed()
    }
}

/// Seal the chain described by the parameters.
pub fn chain_from_params(params: &ChainParams) -> Vec<Block> {
    build_chain(params.start, params.records.clone())
}
