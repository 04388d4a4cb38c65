use crate::error::ProcessingError;
use crate::weather_data::{FeatureEncoder, HistoricalSample, WeatherQuery};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use log::{debug, info};

/// Cosine similarity between two equal-length vectors
///
/// A zero-norm vector has no direction, so its similarity to anything is 0.
/// Non-finite results also come back as 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-12 || !denom.is_finite() {
        return 0.0;
    }
    let similarity = dot / denom;
    if similarity.is_finite() { similarity } else { 0.0 }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarSample {
    pub sample: HistoricalSample,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResult {
    /// Winning label of the similarity-weighted vote; `None` when no neighbours were taken
    pub predicted_condition: Option<String>,
    pub confidence: f64,
    /// Top-N neighbours, most similar first
    pub neighbors: Vec<SimilarSample>,
}

/// Nearest-neighbour condition recommender over a fixed historical corpus
///
/// The encoder fit and the encoded corpus are computed once in `fit` and
/// never touched by `recommend`, so one instance can serve concurrent
/// queries. A changed corpus means a new instance via `refit`.
#[derive(Debug, Clone)]
pub struct Recommender {
    encoder: FeatureEncoder,
    samples: Vec<HistoricalSample>,
    encoded: Vec<Vec<f64>>,
}

impl Recommender {
    pub fn fit(samples: Vec<HistoricalSample>) -> Result<Self, ProcessingError> {
        let encoder = FeatureEncoder::fit(&samples)?;
        let encoded = samples.iter().map(|s| encoder.encode_sample(s)).collect();
        info!("Recommender ready with {} encoded samples", samples.len());
        Ok(Self { encoder, samples, encoded })
    }

    /// Build a fresh recommender from a changed corpus
    pub fn refit(&self, samples: Vec<HistoricalSample>) -> Result<Self, ProcessingError> {
        Self::fit(samples)
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn samples(&self) -> &[HistoricalSample] {
        &self.samples
    }

    /// Rank the corpus against a query and vote on the condition
    ///
    /// Steps:
    /// 1. Encode the query with the cached encoder
    /// 2. Score every historical vector by cosine similarity
    /// 3. Stable-sort descending so equal scores keep corpus order, take `top_n`
    /// 4. Sum similarities per condition; the largest sum wins
    /// 5. Confidence is the winning sum over the total, 0 when the total is 0
    ///    or not finite
    pub fn recommend(&self, query: &WeatherQuery, top_n: usize) -> RecommendationResult {
        let query_vector = self.encoder.encode(query);

        let mut scored: Vec<(usize, f64)> = self
            .encoded
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(&query_vector, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_n);

        // Labels kept in first-seen order so ties go to the higher-ranked label
        let mut votes: Vec<(&str, f64)> = Vec::new();
        for &(i, similarity) in &scored {
            let label = self.samples[i].condition.as_str();
            match votes.iter().position(|(l, _)| *l == label) {
                Some(p) => votes[p].1 += similarity,
                None => votes.push((label, similarity)),
            }
        }

        let total: f64 = votes.iter().map(|(_, sum)| sum).sum();
        let winner = votes
            .iter()
            .fold(None::<&(&str, f64)>, |best, vote| match best {
                Some(b) if b.1 >= vote.1 => Some(b),
                _ => Some(vote),
            });

        let confidence = match winner {
            Some((_, sum)) if total.is_finite() && total != 0.0 => {
                let ratio = sum / total;
                if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 }
            }
            _ => 0.0,
        };

        debug!(
            "Recommendation over {} neighbours: {:?} ({:.3})",
            scored.len(),
            winner.map(|(l, _)| *l),
            confidence
        );

        RecommendationResult {
            predicted_condition: winner.map(|(label, _)| label.to_string()),
            confidence,
            neighbors: scored
                .into_iter()
                .map(|(i, similarity)| SimilarSample {
                    sample: self.samples[i].clone(),
                    similarity,
                })
                .collect(),
        }
    }
}

/// A recommender that can be swapped out while queries are running
///
/// Readers clone the current `Arc` and work on that snapshot; a refit builds
/// the replacement outside the lock and only takes the write lock to swap.
pub struct SharedRecommender {
    current: RwLock<Arc<Recommender>>,
}

impl SharedRecommender {
    pub fn new(recommender: Recommender) -> Self {
        Self {
            current: RwLock::new(Arc::new(recommender)),
        }
    }

    pub fn snapshot(&self) -> Arc<Recommender> {
        self.current.read().clone()
    }

    pub fn recommend(&self, query: &WeatherQuery, top_n: usize) -> RecommendationResult {
        self.snapshot().recommend(query, top_n)
    }

    /// Fit on a new corpus and replace the current state
    ///
    /// On failure the previous recommender stays in place.
    pub fn refit(&self, samples: Vec<HistoricalSample>) -> Result<(), ProcessingError> {
        let replacement = Recommender::fit(samples)?;
        *self.current.write() = Arc::new(replacement);
        info!("Recommender state replaced");
        Ok(())
    }
}
