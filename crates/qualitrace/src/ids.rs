//! Identifier policy for products and inspections.
//!
//! These formats are a boundary convention. The ledger itself only requires
//! identifiers to be non-empty.

use rand::Rng;

use crate::clock::now_millis;

pub const PRODUCT_PREFIX: &str = "PROD";
pub const INSPECTION_PREFIX: &str = "INSP";

/// Length of the random product id suffix.
pub const SUFFIX_LEN: usize = 5;

const SUFFIX_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `PROD-<epoch millis>-<5 uppercase base36 chars>`.
pub fn generate_product_id() -> String {
    product_id_at(now_millis(), &mut rand::thread_rng())
}

/// Product id for a given time and randomness source.
pub fn product_id_at<R: Rng + ?Sized>(millis: i64, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", PRODUCT_PREFIX, millis, suffix)
}

/// `INSP-<epoch millis>`.
pub fn generate_inspection_id() -> String {
    inspection_id_at(now_millis())
}

pub fn inspection_id_at(millis: i64) -> String {
    format!("{}-{}", INSPECTION_PREFIX, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_product_id_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = product_id_at(1_705_276_800_000, &mut rng);

        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "PROD");
        assert_eq!(parts[1], "1705276800000");
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2]
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase()));
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = generate_product_id();
        let b = generate_product_id();
        // Same millisecond is likely; the suffix keeps them apart.
        assert_ne!(a, b);
        assert!(generate_inspection_id().starts_with("INSP-"));
    }

    #[test]
    fn test_inspection_id_format() {
        assert_eq!(inspection_id_at(42), "INSP-42");
    }
}
