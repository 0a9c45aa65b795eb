//! Label-skew partitioning: label quantity, Dirichlet proportions and shards.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use rand::{seq::SliceRandom, Rng};
use tracing::warn;

use super::{
    dirichlet::{self, Convergence},
    split::{array_split, split_at_proportions},
};
use crate::error::Result;

/// Each client owns `max(round((1 - s) * K), 1)` labels; every label's items
/// are spread evenly over the clients owning it.
///
/// Client `i` always owns label `i % K`; the remaining labels are drawn from
/// `selection` without repeats. A label nobody drew goes to the client with
/// the fewest labels so no item is dropped.
pub(super) fn quantity<R: Rng + ?Sized, S: Rng + ?Sized>(
    by_class: &[Vec<usize>],
    num_clients: usize,
    skewness: f64,
    sampling: &mut R,
    selection: &mut S,
) -> Vec<Vec<usize>> {
    let k = by_class.len();
    let num = (((1.0 - skewness) * k as f64).round() as usize).clamp(1, k);
    let mut local = vec![Vec::new(); num_clients];

    if num == k {
        for idxs in by_class {
            let mut idxs = idxs.clone();
            idxs.shuffle(sampling);
            for (client, chunk) in local.iter_mut().zip(array_split(&idxs, num_clients)) {
                client.extend(chunk);
            }
        }
        return local;
    }

    let mut times = vec![0usize; k];
    let mut contain: Vec<Vec<usize>> = Vec::with_capacity(num_clients);
    for i in 0..num_clients {
        let mut current = vec![i % k];
        times[i % k] += 1;
        while current.len() < num {
            let ind = selection.gen_range(0..k);
            if !current.contains(&ind) {
                current.push(ind);
                times[ind] += 1;
            }
        }
        contain.push(current);
    }

    for label in 0..k {
        if times[label] > 0 {
            continue;
        }
        let owner = (0..num_clients)
            .min_by_key(|&c| contain[c].len())
            .unwrap_or_default();
        warn!(label, owner, "label owned by no client, assigning to least loaded");
        contain[owner].push(label);
        times[label] = 1;
    }

    for (label, idxs) in by_class.iter().enumerate() {
        let mut idxs = idxs.clone();
        idxs.shuffle(sampling);
        let mut chunks = array_split(&idxs, times[label]).into_iter();
        for (cid, labels) in contain.iter().enumerate() {
            if labels.contains(&label) {
                if let Some(chunk) = chunks.next() {
                    local[cid].extend(chunk);
                }
            }
        }
    }
    local
}

/// Per-class proportions drawn from a refined Dirichlet matrix.
pub(super) struct DirichletSplit {
    pub clients: Vec<Vec<usize>>,
    pub proportions: Vec<Vec<f64>>,
    pub convergence: Convergence,
}

/// Every client draws a label distribution from `Dirichlet(alpha * p)` where
/// `p` is the global label frequency; each label's items are cut according to
/// the clients' shares of that label.
pub(super) fn dirichlet<R: Rng + ?Sized>(
    by_class: &[Vec<usize>],
    total: usize,
    num_clients: usize,
    skewness: f64,
    rng: &mut R,
) -> Result<DirichletSplit> {
    let prior: Vec<f64> = by_class
        .iter()
        .map(|idxs| idxs.len() as f64 / total as f64)
        .collect();
    let alpha = dirichlet::concentration(skewness);
    let (proportions, convergence) =
        dirichlet::refined_proportions(&prior, alpha, num_clients, rng)?;

    let mut clients = vec![Vec::new(); num_clients];
    for (label, idxs) in by_class.iter().enumerate() {
        let shares: Vec<f64> = proportions.iter().map(|row| row[label]).collect();
        for (client, chunk) in clients.iter_mut().zip(split_at_proportions(idxs, &shares)) {
            client.extend(chunk);
        }
    }
    for client in &mut clients {
        client.shuffle(rng);
    }

    Ok(DirichletSplit {
        clients,
        proportions,
        convergence,
    })
}

/// Items sorted by label are cut into `num_clients * num_shards` shards and
/// each client is dealt `num_shards` of them at random.
pub(super) fn shard<R: Rng + ?Sized>(
    by_class: &[Vec<usize>],
    num_clients: usize,
    skewness: f64,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let k = by_class.len();
    let num_shards = (((1.0 - skewness) * k as f64 * 2.0).round() as usize).max(1);

    let sorted: Vec<usize> = by_class.concat();
    let shards = array_split(&sorted, num_clients * num_shards);

    let mut shard_ids: Vec<usize> = (0..shards.len()).collect();
    shard_ids.shuffle(rng);

    shard_ids
        .chunks(num_shards)
        .map(|dealt| {
            dealt
                .iter()
                .flat_map(|&s| shards[s].iter().copied())
                .collect()
        })
        .collect()
}
