//! Policy vocabulary shared by the engine and its callers.

use std::collections::BTreeMap;

/// Named intervention magnitudes applied before a transition.
pub type Policy = BTreeMap<String, f64>;

/// Divides emissions by the tax level; raises infrastructure stress by 10% of `(t - 1)`.
pub const CARBON_TAX: &str = "carbon_tax";
/// Cuts energy consumption by `0.2 * s` and social vulnerability by `0.1 * s`.
pub const PUBLIC_TRANSPORT_SUBSIDY: &str = "public_transport_subsidy";
/// Divides water consumption by the price factor.
pub const WATER_PRICE_FACTOR: &str = "water_price_factor";

pub const CANONICAL_POLICY_KEYS: [&str; 3] =
    [CARBON_TAX, PUBLIC_TRANSPORT_SUBSIDY, WATER_PRICE_FACTOR];

pub fn is_canonical(key: &str) -> bool {
    CANONICAL_POLICY_KEYS.contains(&key)
}

/// Builds a policy from `(key, magnitude)` pairs.
pub fn policy_from<I, K>(entries: I) -> Policy
where
    I: IntoIterator<Item = (K, f64)>,
    K: Into<String>,
{
    entries
        .into_iter()
        .map(|(key, magnitude)| (key.into(), magnitude))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_vocabulary_is_stable() {
        assert_eq!(
            CANONICAL_POLICY_KEYS,
            ["carbon_tax", "public_transport_subsidy", "water_price_factor"]
        );
        assert!(is_canonical("carbon_tax"));
        assert!(!is_canonical("emissions"));
    }

    #[test]
    fn policy_from_keeps_last_magnitude_for_repeated_key() {
        let policy = policy_from([(CARBON_TAX, 1.2), (CARBON_TAX, 1.5)]);
        assert_eq!(policy.len(), 1);
        assert_eq!(policy[CARBON_TAX], 1.5);
    }
}
