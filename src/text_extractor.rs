use crate::error::ProcessingError;
use bstr::ByteSlice;
use pdfium_render::prelude::*;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use zip::ZipArchive;
use log::{debug, info, warn};

const PDF_MAGIC: &str = "%PDF-";
const ZIP_MAGIC: [u8; 2] = [0x50, 0x4b];
/// PDF readers accept the header anywhere in the first kilobyte
const PDF_HEADER_WINDOW: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
}

impl FileType {
    /// Declared type from a file name's extension
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name).extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("pdf") {
            Some(FileType::Pdf)
        } else if extension.eq_ignore_ascii_case("docx") {
            Some(FileType::Docx)
        } else {
            None
        }
    }

    /// Sniff the type from leading bytes
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
        if window.find(PDF_MAGIC).is_some() {
            Some(FileType::Pdf)
        } else if bytes.starts_with(&ZIP_MAGIC) {
            Some(FileType::Docx)
        } else {
            None
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Pdf => write!(f, "pdf"),
            FileType::Docx => write!(f, "docx"),
        }
    }
}

/// Uploaded file bytes with a verified type
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub file_name: String,
    pub file_type: FileType,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    /// Check the declared extension against the content before accepting bytes
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Result<Self, ProcessingError> {
        let declared = FileType::from_file_name(file_name).ok_or_else(|| ProcessingError::InputFormat {
            file_name: file_name.to_string(),
            detected: "unsupported extension (expected .pdf or .docx)".to_string(),
        })?;

        match FileType::detect(&bytes) {
            Some(detected) if detected == declared => Ok(Self {
                file_name: file_name.to_string(),
                file_type: declared,
                bytes,
            }),
            Some(detected) => Err(ProcessingError::InputFormat {
                file_name: file_name.to_string(),
                detected: format!("declared {} but content looks like {}", declared, detected),
            }),
            None => Err(ProcessingError::InputFormat {
                file_name: file_name.to_string(),
                detected: format!("declared {} but content signature is unrecognised", declared),
            }),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ProcessingError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let bytes = std::fs::read(path)?;
        Self::new(&file_name, bytes)
    }
}

/// Text pulled out of a document, plus the page count when it has pages
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: Option<usize>,
}

/// One way of turning document bytes into plain text
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ProcessingError>;
}

/// PDF text through the pdfium library
///
/// Looks for the library in `PDFIUM_LIB_DIR` first, then falls back to the
/// system library path.
pub struct PdfiumStrategy;

impl PdfiumStrategy {
    fn bind() -> Result<Pdfium, ProcessingError> {
        let bindings = match std::env::var("PDFIUM_LIB_DIR") {
            Ok(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                .or_else(|_| {
                    info!("Failed to load pdfium from '{}', trying system library", dir);
                    Pdfium::bind_to_system_library()
                }),
            Err(_) => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| strategy_error("pdfium", format!("library unavailable: {}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl ExtractionStrategy for PdfiumStrategy {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ProcessingError> {
        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| strategy_error(self.name(), format!("load failed: {}", e)))?;

        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| strategy_error(self.name(), format!("page {}: {}", index, e)))?
                .all();
            pages.push(text);
        }

        Ok(ExtractedText {
            page_count: Some(pages.len()),
            text: pages.join("\n"),
        })
    }
}

/// Pure-Rust PDF text through lopdf
pub struct LopdfStrategy;

impl ExtractionStrategy for LopdfStrategy {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ProcessingError> {
        let document = lopdf::Document::load_mem(bytes)
            .map_err(|e| strategy_error(self.name(), format!("load failed: {}", e)))?;

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());
        for page_number in &page_numbers {
            let text = document
                .extract_text(&[*page_number])
                .map_err(|e| strategy_error(self.name(), format!("page {}: {}", page_number, e)))?;
            pages.push(text);
        }

        Ok(ExtractedText {
            page_count: Some(page_numbers.len()),
            text: pages.join("\n"),
        })
    }
}

/// Paragraph text from `word/document.xml` inside a DOCX container
pub struct DocxStrategy;

impl ExtractionStrategy for DocxStrategy {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ProcessingError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| strategy_error(self.name(), format!("invalid container: {}", e)))?;
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|e| strategy_error(self.name(), format!("missing word/document.xml: {}", e)))?;

        let text = docx_body_text(BufReader::new(entry))
            .map_err(|e| strategy_error(self.name(), e))?;
        Ok(ExtractedText { text, page_count: None })
    }
}

/// Walk WordprocessingML and keep the text runs
///
/// `w:t` content is kept verbatim, each `w:p` ends a line, `w:br` breaks a
/// line and `w:tab` becomes a tab.
fn docx_body_text<R: Read>(reader: BufReader<R>) -> Result<String, String> {
    let mut xml = Reader::from_reader(reader);
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"w:t" => in_text_run = false,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"w:p" => text.push('\n'),
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"w:br" => text.push('\n'),
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"w:tab" => text.push('\t'),
            Ok(Event::Text(ref t)) if in_text_run => {
                let run = t.unescape().map_err(|e| format!("bad text run: {}", e))?;
                text.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML error at {}: {}", xml.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

fn strategy_error(strategy: &str, message: String) -> ProcessingError {
    ProcessingError::Extraction {
        file_type: strategy.to_string(),
        causes: message,
    }
}

/// Text extraction front door
///
/// PDFs go through the strategy list in order and the first success wins.
/// When every strategy fails the error names each one and its cause, so an
/// extraction failure is never mistaken for an empty document.
pub struct TextExtractor {
    pdf_strategies: Vec<Box<dyn ExtractionStrategy>>,
    docx_strategy: Box<dyn ExtractionStrategy>,
}

impl TextExtractor {
    pub fn new() -> Self {
        Self::with_pdf_strategies(vec![Box::new(PdfiumStrategy), Box::new(LopdfStrategy)])
    }

    pub fn with_pdf_strategies(pdf_strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self {
            pdf_strategies,
            docx_strategy: Box::new(DocxStrategy),
        }
    }

    /// Extract text from a verified document
    ///
    /// Process:
    /// 1. Pick the strategy list for the file type
    /// 2. Try each strategy, keeping every failure message
    /// 3. Return the first success, or all failures joined together
    pub fn extract(&self, document: &RawDocument) -> Result<ExtractedText, ProcessingError> {
        debug!("Extracting text from {} ({} bytes)", document.file_name, document.bytes.len());

        let strategies: Vec<&dyn ExtractionStrategy> = match document.file_type {
            FileType::Pdf => self.pdf_strategies.iter().map(|s| s.as_ref()).collect(),
            FileType::Docx => vec![self.docx_strategy.as_ref()],
        };

        let mut causes = Vec::new();
        for strategy in strategies {
            match strategy.extract(&document.bytes) {
                Ok(extracted) => {
                    info!(
                        "Extracted {} characters from {} using {}",
                        extracted.text.chars().count(),
                        document.file_name,
                        strategy.name()
                    );
                    return Ok(extracted);
                }
                Err(e) => {
                    warn!("Strategy {} failed for {}: {}", strategy.name(), document.file_name, e);
                    causes.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        if causes.is_empty() {
            causes.push("no extraction strategy configured".to_string());
        }

        Err(ProcessingError::Extraction {
            file_type: document.file_type.to_string(),
            causes: causes.join("; "),
        })
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}
