use crate::collaborators::{self, Summarizer};
use crate::config::PipelineConfig;
use crate::error::ProcessingError;
use crate::numeric_normalizers::NumericNormalizers;
use crate::structure_cleaners::{Section, StructureCleaners};
use crate::text_cleaners::TextCleaners;
use crate::text_extractor::{FileType, RawDocument, TextExtractor};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use once_cell::sync::OnceCell;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::Path;
use log::{debug, info};

/// Characters of cleaned text that feed the document identifier
const ID_PREFIX_CHARS: usize = 1000;

static SHARED_PROCESSOR: OnceCell<DocumentProcessor> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub file_name: Option<String>,
    pub file_type: Option<FileType>,
    pub page_count: Option<usize>,
    /// Character count of the raw input
    pub original_length: usize,
    /// Character count of the cleaned text
    pub processed_length: usize,
    /// `processed_length / original_length`, 0 for empty input
    pub compression_ratio: f64,
    pub section_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub cleaned_text: String,
    pub sections: Vec<Section>,
    pub metadata: DocumentMetadata,
}

/// Where the raw text came from, when it came from a file
#[derive(Debug, Clone, Default)]
struct SourceInfo {
    file_name: Option<String>,
    file_type: Option<FileType>,
    page_count: Option<usize>,
}

/// Main document processor that orchestrates the cleaning pipeline
///
/// All stage objects are built once in `new` and only read afterwards, so a
/// single processor can be shared across threads.
pub struct DocumentProcessor {
    config: PipelineConfig,
    text_cleaners: TextCleaners,
    numeric_normalizers: NumericNormalizers,
    structure_cleaners: StructureCleaners,
    text_extractor: TextExtractor,
}

impl DocumentProcessor {
    pub fn new(config: PipelineConfig) -> Result<Self, ProcessingError> {
        info!("Initializing document processor...");

        let text_cleaners = TextCleaners::new(&config.lexicon)?;
        let numeric_normalizers = NumericNormalizers::new();
        let structure_cleaners = StructureCleaners::new(
            &config.lexicon,
            config.min_sentence_chars,
            config.min_paragraph_chars,
        )?;

        Ok(Self {
            config,
            text_cleaners,
            numeric_normalizers,
            structure_cleaners,
            text_extractor: TextExtractor::new(),
        })
    }

    pub fn with_defaults() -> Result<Self, ProcessingError> {
        Self::new(PipelineConfig::default())
    }

    /// Process-wide processor on the default configuration, built on first use
    pub fn shared() -> Result<&'static DocumentProcessor, ProcessingError> {
        SHARED_PROCESSOR.get_or_try_init(Self::with_defaults)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Clean raw text into normalized text, sections and metadata
    ///
    /// Pipeline (order is fixed):
    /// 1. Basic cleaning, header/footer removal, special characters
    /// 2. Numeric/date normalization, then missing-value handling
    /// 3. Section split on the still line-structured text
    /// 4. Structure cleaning, repeated paragraphs, climate-specific cleaning,
    ///    final cleanup (applied to the whole text and to each section body)
    ///
    /// Empty input is not an error: it yields empty text and one empty
    /// default section.
    pub fn process(&self, raw_text: &str) -> ProcessedDocument {
        self.process_with_source(raw_text, SourceInfo::default())
    }

    /// Extract a PDF/DOCX file and run it through the pipeline
    pub fn process_file<P: AsRef<Path>>(&self, path: P) -> Result<ProcessedDocument, ProcessingError> {
        let document = RawDocument::from_path(path)?;
        self.process_document(&document)
    }

    pub fn process_document(&self, document: &RawDocument) -> Result<ProcessedDocument, ProcessingError> {
        info!("Processing {} ({})", document.file_name, document.file_type);
        let extracted = self.text_extractor.extract(document)?;

        let source = SourceInfo {
            file_name: Some(document.file_name.clone()),
            file_type: Some(document.file_type),
            page_count: extracted.page_count,
        };
        Ok(self.process_with_source(&extracted.text, source))
    }

    /// Summarize a processed document within the configured character budget
    pub fn summarize(&self, document: &ProcessedDocument, summarizer: &dyn Summarizer) -> Result<String, ProcessingError> {
        collaborators::summarize(&document.cleaned_text, summarizer, self.config.summary_char_limit)
    }

    fn process_with_source(&self, raw_text: &str, source: SourceInfo) -> ProcessedDocument {
        debug!("Pipeline input: {} characters", raw_text.len());

        let text = self.text_cleaners.clean(raw_text);
        let text = self.numeric_normalizers.normalize_numeric_and_dates(&text);
        let text = self.numeric_normalizers.handle_missing_values(&text);

        let sections: Vec<Section> = self
            .structure_cleaners
            .split_sections(&text)
            .into_iter()
            .map(|section| Section {
                content: self.structure_cleaners.clean_structure(&section.content),
                ..section
            })
            .collect();

        let cleaned_text = self.structure_cleaners.clean_structure(&text);
        let metadata = self.build_metadata(raw_text, &cleaned_text, sections.len(), source);

        info!(
            "Processed document {}: {} -> {} characters, {} sections",
            metadata.document_id, metadata.original_length, metadata.processed_length, metadata.section_count
        );

        ProcessedDocument {
            cleaned_text,
            sections,
            metadata,
        }
    }

    fn build_metadata(
        &self,
        raw_text: &str,
        cleaned_text: &str,
        section_count: usize,
        source: SourceInfo,
    ) -> DocumentMetadata {
        let original_length = raw_text.chars().count();
        let processed_length = cleaned_text.chars().count();
        let compression_ratio = if original_length == 0 {
            0.0
        } else {
            processed_length as f64 / original_length as f64
        };

        DocumentMetadata {
            document_id: document_id(source.file_name.as_deref(), original_length, cleaned_text),
            file_name: source.file_name,
            file_type: source.file_type,
            page_count: source.page_count,
            original_length,
            processed_length,
            compression_ratio,
            section_count,
        }
    }
}

/// Stable identifier from file name, raw length and the head of the cleaned text
pub fn document_id(file_name: Option<&str>, original_length: usize, cleaned_text: &str) -> String {
    let mut hasher = FxHasher::default();
    file_name.unwrap_or("").hash(&mut hasher);
    original_length.hash(&mut hasher);
    let prefix_end = cleaned_text
        .char_indices()
        .nth(ID_PREFIX_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(cleaned_text.len());
    cleaned_text[..prefix_end].hash(&mut hasher);

    URL_SAFE_NO_PAD.encode(hasher.finish().to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure_cleaners::DEFAULT_SECTION_TITLE;

    #[test]
    fn test_empty_input_yields_single_empty_section() {
        let processor = DocumentProcessor::with_defaults().unwrap();
        let document = processor.process("");

        assert_eq!(document.cleaned_text, "");
        assert_eq!(document.sections.len(), 1);
        assert_eq!(document.sections[0].title, DEFAULT_SECTION_TITLE);
        assert_eq!(document.sections[0].content, "");
        assert_eq!(document.metadata.compression_ratio, 0.0);
        assert_eq!(document.metadata.section_count, 1);
    }

    #[test]
    fn test_metadata_lengths_are_character_counts() {
        let processor = DocumentProcessor::with_defaults().unwrap();
        let raw = "The   NDC   targets   are   ambitious   and   well   funded   overall.";
        let document = processor.process(raw);

        assert_eq!(document.metadata.original_length, raw.chars().count());
        assert_eq!(document.metadata.processed_length, document.cleaned_text.chars().count());
        assert!(document.metadata.compression_ratio < 1.0);
        assert!(document.metadata.file_name.is_none());
    }

    #[test]
    fn test_document_id_is_stable_and_input_sensitive() {
        let a = document_id(Some("plan.pdf"), 120, "reduce emissions");
        let b = document_id(Some("plan.pdf"), 120, "reduce emissions");
        let c = document_id(Some("other.pdf"), 120, "reduce emissions");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 11);
        assert!(!a.contains('='));
    }

    #[test]
    fn test_sections_are_cleaned_individually() {
        let processor = DocumentProcessor::with_defaults().unwrap();
        let raw = "Introduction\nThe   plan covers the whole economy.\nMitigation\nCarbon dioxide output will fall sharply.";
        let document = processor.process(raw);

        assert_eq!(document.sections.len(), 2);
        assert_eq!(document.sections[0].title, "introduction");
        assert_eq!(document.sections[0].content, "the plan covers the whole economy.");
        assert_eq!(document.sections[1].content, "CO2 output will fall sharply.");
    }

    struct EchoSummarizer;

    impl Summarizer for EchoSummarizer {
        fn summarize(&self, text: &str) -> Result<String, ProcessingError> {
            Ok(text.to_string())
        }
    }

    #[test]
    fn test_summary_respects_configured_limit() {
        let config = PipelineConfig {
            summary_char_limit: 16,
            ..PipelineConfig::default()
        };
        let processor = DocumentProcessor::new(config).unwrap();
        let document = processor.process("The national adaptation plan prioritises coastal resilience.");

        let summary = processor.summarize(&document, &EchoSummarizer).unwrap();
        assert_eq!(summary, "the national ada");
    }

    #[test]
    fn test_shared_processor_is_built_once() {
        let first = DocumentProcessor::shared().unwrap();
        let second = DocumentProcessor::shared().unwrap();
        assert!(std::ptr::eq(first, second));
    }
}
