use crate::error::ProcessingError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use log::info;

/// Climate-policy vocabulary shared by the cleaning stages
///
/// Built once and handed to the cleaners by reference. Nothing mutates it
/// after construction, so a single instance can back any number of
/// concurrent pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateLexicon {
    /// Canonical spellings that survive case folding verbatim
    pub acronyms: Vec<String>,
    /// Ordered `(pattern, replacement)` pairs, applied case-insensitively in list order
    pub domain_terms: Vec<(String, String)>,
    /// Country and bloc names that get title-cased for entity tagging
    pub countries: Vec<String>,
}

impl Default for ClimateLexicon {
    fn default() -> Self {
        let acronyms = [
            "UNFCCC", "IPCC", "NDC", "EU", "UNEP", "GHG", "CO2", "CH4", "N2O",
            "LULUCF", "REDD+", "CDM", "JI", "ETS", "COP", "CMP", "SBI", "SBSTA",
            "NAMA", "MRV", "ICA", "BUR", "NC", "AR", "WG", "SPM", "TS", "FAQ",
            // Tokens emitted by the normalizers themselves
            "USD", "INR", "CO2e", "Gt", "MISSING",
        ];

        let domain_terms = [
            (r"\bcarbon\s+dioxide\b", "CO2"),
            (r"\bmethane\b", "CH4"),
            (r"\bnitrous\s+oxide\b", "N2O"),
            (r"\bgreenhouse\s+gas(?:es)?\b", "GHG"),
            (r"\bemission\s+reductions?\b", "mitigation"),
            (r"\bclimate\s+change\s+adaptation\b", "adaptation"),
            (r"\bnational(?:ly)?\s+determined\s+contributions?\b", "NDC"),
            (r"\bparis\s+agreement\b", "Paris Agreement"),
            (r"\bkyoto\s+protocol\b", "Kyoto Protocol"),
        ];

        let countries = [
            "united states", "european union", "china", "india", "brazil", "russia", "japan",
        ];

        Self {
            acronyms: acronyms.iter().map(|s| s.to_string()).collect(),
            domain_terms: domain_terms
                .iter()
                .map(|(p, r)| (p.to_string(), r.to_string()))
                .collect(),
            countries: countries.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Pipeline tuning knobs
///
/// Every field has a default, so a config file only needs the keys it
/// wants to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub lexicon: ClimateLexicon,
    /// Sentences shorter than this (in characters) are dropped as noise
    pub min_sentence_chars: usize,
    /// Paragraphs shorter than this (in characters) are dropped as noise
    pub min_paragraph_chars: usize,
    /// How much cleaned text is handed to a summarizer
    pub summary_char_limit: usize,
    pub recommend_top_n: usize,
    /// Documents per parallel batch; 0 derives it from the core count
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lexicon: ClimateLexicon::default(),
            min_sentence_chars: 10,
            min_paragraph_chars: 20,
            summary_char_limit: 2000,
            recommend_top_n: 5,
            batch_size: 0,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file, falling back to defaults for absent keys
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ProcessingError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&raw).map_err(|e| {
            ProcessingError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        info!(
            "Loaded pipeline config from {} ({} acronyms, {} domain terms)",
            path.display(),
            config.lexicon.acronyms.len(),
            config.lexicon.domain_terms.len()
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"recommend_top_n": 3}}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.recommend_top_n, 3);
        assert_eq!(config.min_sentence_chars, 10);
        assert!(config.lexicon.acronyms.iter().any(|a| a == "UNFCCC"));
    }

    #[test]
    fn test_malformed_config_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = PipelineConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ProcessingError::Config(_)));
    }

    #[test]
    fn test_domain_terms_keep_table_order() {
        let lexicon = ClimateLexicon::default();
        let first = &lexicon.domain_terms[0];
        assert_eq!(first.1, "CO2");
        assert_eq!(lexicon.domain_terms.last().unwrap().1, "Kyoto Protocol");
    }
}
