// Weighted Reciprocal Rank Fusion (RRF)

use std::collections::HashMap;
use std::hash::Hash;

/// Standard RRF smoothing constant (Cormack, Clarke and Buettcher, SIGIR 2009)
pub const RRF_K: u32 = 60;

/// Per-list weights applied to each RRF contribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub lexical: f32,
    pub vector: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        FusionWeights {
            lexical: 0.4,
            vector: 0.6,
        }
    }
}

/// Fuse a lexical and a vector ranking.
///
/// score(d) = w_lex / (k + rank_lex(d)) + w_vec / (k + rank_vec(d))
///
/// Ranks are 1-based positions in each input; the inputs' own scores are
/// ignored. An item missing from a list contributes nothing for that list.
/// Output is sorted by fused score descending, with equal scores kept in
/// first-seen order (lexical list first, then vector list), so the result is
/// deterministic for identical inputs.
pub fn reciprocal_rank_fusion<T: Clone + Eq + Hash>(
    lexical: &[(T, f32)],
    vector: &[(T, f32)],
    weights: FusionWeights,
    k: u32,
) -> Vec<(T, f32)> {
    let k = k as f64;

    let mut order: Vec<(T, f64)> = Vec::with_capacity(lexical.len() + vector.len());
    let mut positions: HashMap<T, usize> = HashMap::new();

    let lists = [(lexical, weights.lexical as f64), (vector, weights.vector as f64)];
    for (list, weight) in lists {
        for (rank, (item, _score)) in list.iter().enumerate() {
            let contribution = weight / (k + (rank + 1) as f64);
            match positions.get(item) {
                Some(&at) => order[at].1 += contribution,
                None => {
                    positions.insert(item.clone(), order.len());
                    order.push((item.clone(), contribution));
                }
            }
        }
    }

    // Stable sort keeps first-seen order among ties
    order.sort_by(|a, b| b.1.total_cmp(&a.1));

    order
        .into_iter()
        .map(|(item, score)| (item, score as f32))
        .collect()
}
