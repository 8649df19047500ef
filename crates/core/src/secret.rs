//! Strength checks for session signing secrets.
//!
//! A secret passes when it is long enough, contains none of the usual
//! placeholder words and its characters are spread out enough (Shannon
//! entropy per character).

use std::collections::BTreeMap;

use thiserror::Error;

/// Shortest accepted secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Lowest accepted entropy, in bits per character.
pub const MIN_ENTROPY_BITS: f64 = 3.3;

/// Fragments that mark a copied sample value (matched case-insensitively).
const PLACEHOLDERS: [&str; 14] = [
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Why a secret was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeakSecret {
    #[error("must be at least {min} characters (got {0})", min = MIN_SECRET_LENGTH)]
    TooShort(usize),

    #[error("appears to be a placeholder (contains '{0}')")]
    Placeholder(&'static str),

    #[error(
        "entropy too low ({0:.2} bits/char, need >= {min:.1}). Use a randomly generated secret.",
        min = MIN_ENTROPY_BITS
    )]
    LowEntropy(f64),
}

/// Shannon entropy of `value` in bits per character. Empty input is 0.
#[must_use]
pub fn entropy_bits(value: &str) -> f64 {
    let mut counts: BTreeMap<char, u32> = BTreeMap::new();
    for ch in value.chars() {
        *counts.entry(ch).or_default() += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }

    let total = f64::from(total);
    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}

/// The first placeholder fragment found in `value`.
fn placeholder_in(value: &str) -> Option<&'static str> {
    let lower = value.to_lowercase();
    PLACEHOLDERS.into_iter().find(|p| lower.contains(p))
}

/// Check `value` against length, placeholder and entropy rules, in that order.
///
/// # Errors
///
/// Returns the first rule the secret breaks.
pub fn check(value: &str) -> Result<(), WeakSecret> {
    if value.len() < MIN_SECRET_LENGTH {
        return Err(WeakSecret::TooShort(value.len()));
    }
    if let Some(fragment) = placeholder_in(value) {
        return Err(WeakSecret::Placeholder(fragment));
    }
    let bits = entropy_bits(value);
    if bits < MIN_ENTROPY_BITS {
        return Err(WeakSecret::LowEntropy(bits));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_bits() {
        assert!(entropy_bits("").abs() < f64::EPSILON);
        assert!(entropy_bits("aaaa").abs() < f64::EPSILON);
        assert!((entropy_bits("abab") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_check_too_short() {
        assert_eq!(check("Zq8#vL2!"), Err(WeakSecret::TooShort(8)));
    }

    #[test]
    fn test_check_placeholder() {
        assert_eq!(
            check("your-session-key-goes-right-here-ok"),
            Err(WeakSecret::Placeholder("your-"))
        );
        assert_eq!(
            check("Q7CHANGEME#kk2!vv9$zz1&rr5*pp3^m"),
            Err(WeakSecret::Placeholder("changeme"))
        );
    }

    #[test]
    fn test_check_low_entropy() {
        assert!(matches!(check(&"ab".repeat(20)), Err(WeakSecret::LowEntropy(_))));
    }

    #[test]
    fn test_check_random_secret_passes() {
        assert_eq!(check("Zq8#vL2!mN5@kR9$tW3^yB6&cF1*hJ4%"), Ok(()));
    }
}
