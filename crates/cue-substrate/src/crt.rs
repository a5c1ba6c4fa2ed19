//! Chinese Remainder Theorem helpers
//!
//! `solve` reconstructs an absolute step count from residues under pairwise
//! coprime bases. `check_harmonic_resonance` is the cheap trigger used by
//! peers: a direct residue comparison that needs no reconstruction.

use cue_core::{Error, MduState, Result};
use std::collections::BTreeMap;

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Multiplicative inverse of `a` modulo `m`, if it exists.
fn mod_inverse(a: u128, m: u128) -> Option<u128> {
    if m == 1 {
        return Some(0);
    }
    let (mut old_r, mut r) = (a as i128, m as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    if old_r != 1 {
        return None;
    }
    Some(old_s.rem_euclid(m as i128) as u128)
}

/// Smallest non-negative `x` with `x ≡ r (mod m)` for every `(r, m)`.
///
/// Moduli must be positive and pairwise coprime, and their product must fit
/// in a `u64`. An empty system is satisfied by `0`.
pub fn solve(congruences: &[(u64, u64)]) -> Result<u64> {
    for &(_, m) in congruences {
        if m == 0 {
            return Err(Error::validation("CRT modulus must be positive"));
        }
    }
    for (i, &(_, mi)) in congruences.iter().enumerate() {
        for &(_, mj) in &congruences[i + 1..] {
            if gcd(mi, mj) != 1 {
                return Err(Error::validation(format!(
                    "CRT moduli {} and {} are not coprime",
                    mi, mj
                )));
            }
        }
    }

    let product = congruences.iter().try_fold(1u64, |acc, &(_, m)| acc.checked_mul(m));
    let product = product.ok_or_else(|| Error::validation("CRT modulus product overflows u64"))? as u128;

    let mut sum: u128 = 0;
    for &(r, m) in congruences {
        let m = m as u128;
        let partial = product / m;
        let inverse = mod_inverse(partial % m, m)
            .ok_or_else(|| Error::validation(format!("no inverse for {} mod {}", partial, m)))?;
        // Each factor is below `product`, which fits in u64, so the products fit in u128.
        let term = ((r as u128 % m) * inverse % product) * partial % product;
        sum = (sum + term) % product;
    }
    Ok(sum as u64)
}

/// True iff every named domain exists and currently sits at `target_residue`.
pub fn check_harmonic_resonance<S: AsRef<str>>(
    states: &BTreeMap<String, MduState>,
    domains_to_check: &[S],
    target_residue: u64,
) -> bool {
    !domains_to_check.is_empty()
        && domains_to_check
            .iter()
            .all(|d| states.get(d.as_ref()).is_some_and(|s| s.a == target_residue))
}

/// Recover the absolute step count implied by the named domains' residues.
pub fn reconstruct_step<S: AsRef<str>>(
    states: &BTreeMap<String, MduState>,
    domains: &[S],
) -> Result<u64> {
    let congruences = domains
        .iter()
        .map(|d| {
            states
                .get(d.as_ref())
                .map(|s| (s.a, s.b))
                .ok_or_else(|| Error::validation(format!("unknown domain '{}'", d.as_ref())))
        })
        .collect::<Result<Vec<_>>>()?;
    solve(&congruences)
}
