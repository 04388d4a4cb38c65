use crate::error::ProcessingError;
use serde::{Deserialize, Serialize};
use log::debug;

/// Produces a short summary of cleaned policy text
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> Result<String, ProcessingError>;
}

/// Finds named entities (organisations, places, dates, amounts) in text
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<Entity>, ProcessingError>;
}

/// Turns text into a fixed-width embedding
pub trait SentenceEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f64>, ProcessingError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
}

/// Summarize at most `char_limit` characters of `text`
///
/// The cut always lands on a char boundary. Whatever the summarizer returns
/// is handed back untouched.
pub fn summarize(text: &str, summarizer: &dyn Summarizer, char_limit: usize) -> Result<String, ProcessingError> {
    let input = truncate_chars(text, char_limit);
    debug!("Summarizing {} of {} characters", input.chars().count(), text.chars().count());
    summarizer.summarize(input)
}

/// Entities in the order the extractor reported them
pub fn extract_entities(text: &str, extractor: &dyn EntityExtractor) -> Result<Vec<Entity>, ProcessingError> {
    let entities = extractor.extract(text)?;
    debug!("Extractor returned {} entities", entities.len());
    Ok(entities)
}

fn truncate_chars(text: &str, char_limit: usize) -> &str {
    match text.char_indices().nth(char_limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
