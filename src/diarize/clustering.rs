//! Agglomerative clustering of speaker embeddings.
//!
//! Average-linkage over cosine distance. The merge sequence is computed
//! greedily and is independent of the stopping rule, so a lower threshold
//! can only stop earlier and can never yield fewer clusters than a higher
//! one (speaker count is monotone in the threshold).

/// How to decide the number of clusters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusterSpec {
    /// Merge while the closest pair is within `threshold`.
    Auto { threshold: f32 },
    /// Merge down to exactly this many clusters (capped by the number of
    /// embeddings).
    Fixed(usize),
}

/// Cluster embeddings; returns one cluster id per input, relabeled so that
/// id 0 is the cluster that appears first in input order, id 1 the next
/// new one, and so on.
pub fn cluster(embeddings: &[Vec<f32>], spec: ClusterSpec) -> Vec<usize> {
    if embeddings.is_empty() {
        return Vec::new();
    }

    // members[c] = input indices in cluster c; clusters are merged in place
    let mut members: Vec<Vec<usize>> = (0..embeddings.len()).map(|i| vec![i]).collect();

    let target = match spec {
        ClusterSpec::Fixed(k) => k.clamp(1, embeddings.len()),
        ClusterSpec::Auto { .. } => 1,
    };

    while members.len() > target {
        let Some((a, b, distance)) = closest_pair(&members, embeddings) else {
            break;
        };
        if let ClusterSpec::Auto { threshold } = spec
            && distance > threshold
        {
            break;
        }
        // a < b by construction
        let merged = members.remove(b);
        members[a].extend(merged);
    }

    relabel_by_first_occurrence(&members, embeddings.len())
}

/// The pair of clusters with minimal average-linkage distance.
fn closest_pair(members: &[Vec<usize>], embeddings: &[Vec<f32>]) -> Option<(usize, usize, f32)> {
    let mut best: Option<(usize, usize, f32)> = None;
    for a in 0..members.len() {
        for b in (a + 1)..members.len() {
            let distance = average_linkage(&members[a], &members[b], embeddings);
            if best.is_none_or(|(_, _, d)| distance < d) {
                best = Some((a, b, distance));
            }
        }
    }
    best
}

fn average_linkage(a: &[usize], b: &[usize], embeddings: &[Vec<f32>]) -> f32 {
    let mut total = 0.0;
    for &i in a {
        for &j in b {
            total += cosine_distance(&embeddings[i], &embeddings[j]);
        }
    }
    total / (a.len() * b.len()) as f32
}

pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

fn relabel_by_first_occurrence(members: &[Vec<usize>], len: usize) -> Vec<usize> {
    // cluster id -> earliest input index
    let mut order: Vec<(usize, usize)> = members
        .iter()
        .enumerate()
        .map(|(c, m)| (c, *m.iter().min().unwrap_or(&usize::MAX)))
        .collect();
    order.sort_by_key(|&(_, first)| first);

    let mut new_id = vec![0usize; members.len()];
    for (rank, &(cluster, _)) in order.iter().enumerate() {
        new_id[cluster] = rank;
    }

    let mut labels = vec![0usize; len];
    for (cluster, member) in members.iter().enumerate() {
        for &i in member {
            labels[i] = new_id[cluster];
        }
    }
    labels
}
