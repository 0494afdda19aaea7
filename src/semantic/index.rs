//! In-memory vector index with cosine similarity search.
//!
//! Stores document embeddings and provides exhaustive similarity search.

use std::collections::HashMap;

/// In-memory vector index for semantic search.
///
/// Stores embeddings keyed by document ID, supporting:
/// - Insert and clear operations
/// - Cosine similarity search with threshold filtering
pub struct VectorIndex {
    /// Document ID -> embedding
    entries: HashMap<String, Vec<f32>>,
    /// Expected embedding dimensions
    dimensions: usize,
}

/// Search result from the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub id: String,
    /// Cosine similarity score (-1.0 to 1.0)
    pub score: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,
}

impl VectorIndex {
    /// Create a new empty vector index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: HashMap::new(),
            dimensions,
        }
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All document IDs, sorted for stable output.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Insert or replace an entry.
    ///
    /// Returns an error if the embedding has zero norm (cannot be normalized).
    pub fn insert(&mut self, id: String, embedding: Vec<f32>) -> Result<(), IndexError> {
        self.check_dimensions(&embedding)?;

        if Self::l2_norm(&embedding) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        self.entries.insert(id, embedding);
        Ok(())
    }

    /// Search for similar vectors using cosine similarity.
    ///
    /// Results are sorted by score (highest first), ties by ID.
    pub fn search(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredId>, IndexError> {
        self.check_dimensions(query)?;

        let query_norm = Self::l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let mut results: Vec<ScoredId> = self
            .entries
            .iter()
            .filter_map(|(id, embedding)| {
                let score = Self::cosine_similarity(query, embedding, query_norm);
                (score >= threshold).then(|| ScoredId {
                    id: id.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        results.truncate(limit);

        Ok(results)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn check_dimensions(&self, v: &[f32]) -> Result<(), IndexError> {
        if v.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: v.len(),
            });
        }
        Ok(())
    }

    /// Compute L2 norm of a vector.
    fn l2_norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Compute cosine similarity between two vectors.
    /// Assumes query_norm is precomputed for efficiency.
    fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
        let target_norm = Self::l2_norm(target);
        if target_norm < f32::EPSILON {
            return 0.0;
        }

        let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
        dot_product / (query_norm * target_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_index() {
        let index = VectorIndex::new(384);
        assert_eq!(index.dimensions(), 384);
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_insert_and_contains() {
        let mut index = VectorIndex::new(3);
        index.insert("a".into(), vec![1.0, 0.0, 0.0]).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.contains("a"));
        assert!(!index.contains("b"));
    }

    #[test]
    fn test_insert_dimension_mismatch() {
        let mut index = VectorIndex::new(3);
        let result = index.insert("a".into(), vec![1.0, 0.0, 0.0, 0.0]);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_insert_zero_norm_rejected() {
        let mut index = VectorIndex::new(3);
        let result = index.insert("a".into(), vec![0.0, 0.0, 0.0]);
        assert!(matches!(result, Err(IndexError::ZeroNormVector)));
    }

    #[test]
    fn test_search_basic() {
        let mut index = VectorIndex::new(3);

        // Insert two orthogonal vectors
        index.insert("login".into(), vec![1.0, 0.0, 0.0]).unwrap();
        index.insert("chart".into(), vec![0.0, 1.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.1, 0.0], -1.0, 10).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "login");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_search_with_threshold() {
        let mut index = VectorIndex::new(3);
        index.insert("a".into(), vec![1.0, 0.0, 0.0]).unwrap();
        index.insert("b".into(), vec![0.0, 1.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 0.9, 10).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
        assert!((results[0].score - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_search_negative_scores_kept_with_low_threshold() {
        let mut index = VectorIndex::new(2);
        index.insert("opposite".into(), vec![-1.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0], -1.0, 10).unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_search_with_limit_and_tie_order() {
        let mut index = VectorIndex::new(3);
        for id in ["c", "a", "b", "d"] {
            index.insert(id.into(), vec![1.0, 0.0, 0.0]).unwrap();
        }

        let results = index.search(&[1.0, 0.0, 0.0], 0.0, 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_search_rejects_bad_query() {
        let mut index = VectorIndex::new(2);
        index.insert("a".into(), vec![1.0, 0.0]).unwrap();

        assert!(matches!(
            index.search(&[0.0, 0.0], 0.0, 1),
            Err(IndexError::ZeroNormVector)
        ));
        assert!(matches!(
            index.search(&[1.0], 0.0, 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_ids_sorted_and_clear() {
        let mut index = VectorIndex::new(3);
        index.insert("z".into(), vec![1.0, 0.0, 0.0]).unwrap();
        index.insert("m".into(), vec![0.0, 1.0, 0.0]).unwrap();

        assert_eq!(index.ids(), vec!["m".to_string(), "z".to_string()]);

        index.clear();
        assert!(index.is_empty());
    }
}
