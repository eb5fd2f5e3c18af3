//! Rectilinear factorization of a process count across grid axes.
//!
//! Pure arithmetic, no communication: factor `nproc` into one block count
//! per axis so that block side lengths stay as close to equal as the prime
//! factorization allows. Deterministic for a given `(domain, nproc)`.

use crate::error::DecompError;

/// Factor `nproc` into per-axis block counts proportional to `domain`.
///
/// Prime factors of `nproc` are assigned largest-first, each to the axis
/// whose current per-block length is largest (ties break toward the lowest
/// axis index). Fails if any axis would end up with more blocks than cells.
pub fn factorize(domain: &[usize], nproc: usize) -> Result<Vec<usize>, DecompError> {
    let invalid = |reason: String| DecompError::InvalidPartition {
        domain: domain.to_vec(),
        nproc,
        reason,
    };
    if nproc == 0 {
        return Err(invalid("process count must be positive".into()));
    }
    if domain.iter().any(|&n| n == 0) {
        return Err(invalid("domain extents must be positive".into()));
    }
    if domain.is_empty() {
        return if nproc == 1 {
            Ok(Vec::new())
        } else {
            Err(invalid("no axis left to split".into()))
        };
    }

    let mut blocks = vec![1usize; domain.len()];
    for f in prime_factors(nproc).into_iter().rev() {
        // Split the axis whose blocks are currently longest: maximize
        // domain[k]/blocks[k], compared in integers via cross-multiplication.
        let mut best = 0;
        for k in 1..domain.len() {
            if domain[k] * blocks[best] > domain[best] * blocks[k] {
                best = k;
            }
        }
        blocks[best] *= f;
    }

    for (k, (&n, &b)) in domain.iter().zip(&blocks).enumerate() {
        if b > n {
            return Err(invalid(format!(
                "axis {k} has extent {n} but would be cut into {b} blocks"
            )));
        }
    }
    Ok(blocks)
}

/// Prime factorization by trial division, ascending.
fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            out.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        out.push(n);
    }
    out
}
