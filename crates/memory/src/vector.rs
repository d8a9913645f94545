//! Vector similarity ranking for archived chunks.

use agentmesh_core::ConversationChunk;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank chunks by similarity to `query_embedding`, highest first.
///
/// Chunks without an embedding score 0.0 and sink to the bottom. The sort is
/// stable, so equal scores keep their incoming (recency) order.
pub fn rank_by_similarity(
    chunks: Vec<ConversationChunk>,
    query_embedding: &[f32],
) -> Vec<(f32, ConversationChunk)> {
    let mut scored: Vec<(f32, ConversationChunk)> = chunks
        .into_iter()
        .map(|chunk| {
            let sim = chunk
                .embedding
                .as_deref()
                .map(|e| cosine_similarity(e, query_embedding))
                .unwrap_or(0.0);
            (sim, chunk)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
}
