//! Dirichlet sampling and the proportion refinement loop used by
//! label-proportion skew.

#![allow(clippy::cast_precision_loss)]

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Upper bound on redraws of a single invalid Dirichlet sample.
pub const MAX_DRAW_ATTEMPTS: usize = 1_000;

/// Upper bound on refinement passes, independent of convergence.
pub const MAX_REFINE_PASSES: usize = 10_000;

/// Smallest concentration used for label-proportion skew.
pub const MIN_ALPHA: f64 = 0.01;

/// Concentration for a skewness in `[0, 1]`: `max(MIN_ALPHA, (-4 ln(s + 1e-7))^4)`.
#[must_use]
pub fn concentration(skewness: f64) -> f64 {
    (-4.0 * (skewness + 1e-7).ln()).powi(4).max(MIN_ALPHA)
}

/// One Dirichlet draw via normalized Gamma variates.
///
/// The draw is `None` when every variate underflows to zero or the result is
/// not finite; callers redraw.
///
/// # Errors
///
/// Returns an error if any concentration parameter is not strictly positive.
pub fn sample<R: Rng + ?Sized>(alpha: &[f64], rng: &mut R) -> Result<Option<Vec<f64>>> {
    let mut draw = Vec::with_capacity(alpha.len());
    for &a in alpha {
        let gamma = Gamma::new(a, 1.0).map_err(|e| {
            Error::configuration(format!("invalid Dirichlet concentration {a}: {e}"))
        })?;
        draw.push(gamma.sample(rng));
    }

    let total: f64 = draw.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Ok(None);
    }
    for v in &mut draw {
        *v /= total;
    }
    Ok(draw.iter().all(|v| v.is_finite()).then_some(draw))
}

/// Draws until a valid sample appears, up to [`MAX_DRAW_ATTEMPTS`].
///
/// # Errors
///
/// Returns a configuration error when no valid sample is produced.
pub fn sample_valid<R: Rng + ?Sized>(alpha: &[f64], rng: &mut R) -> Result<Vec<f64>> {
    for _ in 0..MAX_DRAW_ATTEMPTS {
        if let Some(draw) = sample(alpha, rng)? {
            return Ok(draw);
        }
    }
    Err(Error::configuration(format!(
        "Dirichlet concentration too small to sample after {MAX_DRAW_ATTEMPTS} attempts"
    )))
}

/// How the refinement loop ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    /// Final squared error between the mean proportion vector and the prior.
    pub error: f64,
    /// Threshold the loop aimed for.
    pub threshold: f64,
    /// Number of replacement passes performed.
    pub passes: usize,
    /// Whether the error reached the threshold.
    pub converged: bool,
}

fn squared_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn column_mean(rows: &[Vec<f64>], width: usize) -> Vec<f64> {
    let mut mean = vec![0.0; width];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    let n = rows.len() as f64;
    for m in &mut mean {
        *m /= n;
    }
    mean
}

/// Samples a `clients x classes` proportion matrix from `Dirichlet(alpha * prior)`
/// and refines it so the mean row approaches `prior`.
///
/// Each pass drops the row whose removal brings the mean closest to the
/// prior and swaps in the best of `clients` fresh candidates. The loop stops
/// once the error is within `1e-3 / classes`, when a pass produces no
/// candidate that strictly lowers the error, or after [`MAX_REFINE_PASSES`].
///
/// # Errors
///
/// Returns a configuration error if the concentration cannot be sampled.
pub fn refined_proportions<R: Rng + ?Sized>(
    prior: &[f64],
    alpha: f64,
    clients: usize,
    rng: &mut R,
) -> Result<(Vec<Vec<f64>>, Convergence)> {
    let classes = prior.len();
    let params: Vec<f64> = prior.iter().map(|p| alpha * p).collect();
    let threshold = 1e-3 / classes as f64;

    let mut proportions = (0..clients)
        .map(|_| sample_valid(&params, rng))
        .collect::<Result<Vec<_>>>()?;

    let n = clients as f64;
    let mut passes = 0;
    loop {
        let mean = column_mean(&proportions, classes);
        let error = squared_error(&mean, prior);
        debug!(pass = passes, error, "dirichlet refinement");

        if error <= threshold {
            return Ok((
                proportions,
                Convergence {
                    error,
                    threshold,
                    passes,
                    converged: true,
                },
            ));
        }
        if passes >= MAX_REFINE_PASSES {
            warn!(error, passes, "dirichlet refinement hit the pass cap");
            return Ok((
                proportions,
                Convergence {
                    error,
                    threshold,
                    passes,
                    converged: false,
                },
            ));
        }

        // Row whose exclusion leaves the mean closest to the prior
        let excluded = if clients == 1 {
            0
        } else {
            let mut best = (0, f64::INFINITY);
            for (cid, row) in proportions.iter().enumerate() {
                let without: Vec<f64> = mean
                    .iter()
                    .zip(row)
                    .map(|(m, v)| (m * n - v) / (n - 1.0))
                    .collect();
                let e = squared_error(&without, prior);
                if e < best.1 {
                    best = (cid, e);
                }
            }
            best.0
        };

        let mut candidate: Option<(Vec<f64>, f64)> = None;
        for _ in 0..clients {
            let Some(row) = sample(&params, rng)? else {
                continue;
            };
            let altered: Vec<f64> = mean
                .iter()
                .zip(&proportions[excluded])
                .zip(&row)
                .map(|((m, old), new)| m - old / n + new / n)
                .collect();
            let e = squared_error(&altered, prior);
            if candidate.as_ref().map_or(true, |(_, best)| e < *best) {
                candidate = Some((row, e));
            }
        }

        passes += 1;
        match candidate {
            Some((row, e)) if e < error => proportions[excluded] = row,
            _ => {
                debug!(error, passes, "no improving candidate, stopping refinement");
                return Ok((
                    proportions,
                    Convergence {
                        error,
                        threshold,
                        passes,
                        converged: false,
                    },
                ));
            }
        }
    }
}
