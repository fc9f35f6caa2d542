//! Vector similarity for note recall.

use localecho_core::store::{Note, ScoredNote};
use std::cmp::Ordering;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]. Returns 0.0 if the lengths differ, either
/// vector is empty, or either has zero magnitude.
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

/// Rank notes by cosine similarity to a query embedding.
///
/// Notes without an embedding, or whose embedding has a different
/// dimension than the query, are skipped. Ties break toward the newer note.
pub fn rank_notes(notes: Vec<Note>, query: &[f32], top_k: usize) -> Vec<ScoredNote> {
    if query.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredNote> = notes
        .into_iter()
        .filter_map(|note| {
            let embedding = note.embedding.as_deref()?;
            if embedding.len() != query.len() {
                return None;
            }
            let score = cosine_similarity(embedding, query);
            Some(ScoredNote { note, score })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.note.created_at.cmp(&a.note.created_at))
            .then_with(|| b.note.id.cmp(&a.note.id))
    });
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn note(id: i64, embedding: Option<Vec<f32>>, age_secs: i64) -> Note {
        Note {
            id,
            content: format!("note {id}"),
            embedding,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-5);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn closer_note_ranks_first() {
        let notes = vec![
            note(1, Some(vec![0.0, 1.0]), 10),
            note(2, Some(vec![1.0, 0.1]), 20),
        ];
        let ranked = rank_notes(notes, &[1.0, 0.0], 2);
        assert_eq!(ranked.iter().map(|s| s.note.id).collect::<Vec<_>>(), vec![2, 1]);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn unsearchable_and_mismatched_notes_are_skipped() {
        let notes = vec![
            note(1, None, 0),
            note(2, Some(vec![1.0, 0.0, 0.0]), 0),
            note(3, Some(vec![0.5, 0.5]), 0),
        ];
        let ranked = rank_notes(notes, &[1.0, 0.0], 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].note.id, 3);
    }

    #[test]
    fn equal_scores_prefer_newer_notes() {
        let notes = vec![
            note(1, Some(vec![1.0, 0.0]), 100),
            note(2, Some(vec![2.0, 0.0]), 5),
            note(3, Some(vec![0.0, 1.0]), 0),
        ];
        let ranked = rank_notes(notes, &[1.0, 0.0], 1);
        assert_eq!(ranked[0].note.id, 2);
    }

    #[test]
    fn empty_inputs_yield_nothing() {
        assert!(rank_notes(Vec::new(), &[1.0], 3).is_empty());
        assert!(rank_notes(vec![note(1, Some(vec![1.0]), 0)], &[], 3).is_empty());
        assert!(rank_notes(vec![note(1, Some(vec![1.0]), 0)], &[1.0], 0).is_empty());
    }
}
