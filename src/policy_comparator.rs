use crate::collaborators::SentenceEncoder;
use crate::error::ProcessingError;
use crate::recommender::cosine_similarity;
use serde::Serialize;
use std::collections::BTreeSet;
use log::debug;

/// Shared and distinct vocabulary of two texts, each list sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TermOverlap {
    pub overlap: Vec<String>,
    pub unique_to_first: Vec<String>,
    pub unique_to_second: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyComparison {
    pub similarity: f64,
    pub terms: TermOverlap,
}

/// Compare lowercase whitespace-separated tokens of two texts
pub fn term_overlap(first: &str, second: &str) -> TermOverlap {
    let tokens = |text: &str| -> BTreeSet<String> { text.split_whitespace().map(str::to_lowercase).collect() };
    let a = tokens(first);
    let b = tokens(second);

    TermOverlap {
        overlap: a.intersection(&b).cloned().collect(),
        unique_to_first: a.difference(&b).cloned().collect(),
        unique_to_second: b.difference(&a).cloned().collect(),
    }
}

/// Embedding similarity plus term overlap for two policy texts
pub fn compare_policies(
    first: &str,
    second: &str,
    encoder: &dyn SentenceEncoder,
) -> Result<PolicyComparison, ProcessingError> {
    let first_embedding = encoder.encode(first)?;
    let second_embedding = encoder.encode(second)?;

    if first_embedding.len() != second_embedding.len() {
        return Err(ProcessingError::Collaborator {
            stage: "sentence encoder".to_string(),
            message: format!(
                "embedding widths differ: {} vs {}",
                first_embedding.len(),
                second_embedding.len()
            ),
        });
    }

    let similarity = cosine_similarity(&first_embedding, &second_embedding);
    let terms = term_overlap(first, second);
    debug!("Policy similarity {:.3} with {} shared terms", similarity, terms.overlap.len());

    Ok(PolicyComparison { similarity, terms })
}
