//! Text embedding for the in-process vector store.

use ribo_core::{Result, RiboError};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Converts text to dense vectors for similarity search.
pub trait Embedder: Send + Sync {
    /// Embed a single text string.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The embedding dimension.
    fn dimension(&self) -> usize;
}

/// Deterministic hash-based embedder.
///
/// Hashes tokens into a fixed-dimension space with several signed hash
/// functions, then L2-normalizes. Not semantically rich, but fast,
/// dependency-free and fully reproducible, which is what the retrieval
/// core needs: identical inputs must yield identical rankings.
pub struct HashEmbedder {
    dimension: usize,
    num_hashes: u64,
}

impl HashEmbedder {
    /// Create an embedder with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            num_hashes: 4,
        }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1)
            .map(str::to_owned)
            .collect()
    }

    fn hash_with_seed(&self, word: &str, seed: u64) -> usize {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        word.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    fn sign_hash(word: &str, seed: u64) -> f32 {
        let mut hasher = DefaultHasher::new();
        (seed + 1000).hash(&mut hasher);
        word.hash(&mut hasher);
        if hasher.finish() % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RiboError::Embedding("empty text".to_string()));
        }

        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            // No alphanumeric content; a zero vector matches nothing.
            return Ok(vec![0.0; self.dimension]);
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            for seed in 0..self.num_hashes {
                let idx = self.hash_with_seed(token, seed);
                vector[idx] += Self::sign_hash(token, seed);
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cosine similarity between two vectors of equal dimension.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed("p53 tumor suppressor").unwrap();
        let b = embedder.embed("p53 tumor suppressor").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
    }

    #[test]
    fn shared_tokens_raise_similarity() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed("p53 activation apoptosis").unwrap();
        let near = embedder.embed("apoptosis signaling via p53").unwrap();
        let far = embedder.embed("glycolysis pyruvate kinase").unwrap();
        assert!(cosine_similarity(&query, &near) > cosine_similarity(&query, &far));
    }

    #[test]
    fn empty_text_is_rejected() {
        let embedder = HashEmbedder::default();
        assert!(matches!(
            embedder.embed("   "),
            Err(RiboError::Embedding(_))
        ));
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed("membrane receptor").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
