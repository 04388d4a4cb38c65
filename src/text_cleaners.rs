use crate::config::ClimateLexicon;
use crate::error::ProcessingError;
use regex::{Captures, Regex};
use rustc_hash::FxHashMap as HashMap;
use log::debug;

/// Longest line, in whitespace-separated tokens, that can be a banner
const MAX_BANNER_TOKENS: usize = 8;

/// Low-level string normalization for extracted policy text
///
/// Handles case folding (acronyms survive), whitespace, bullets,
/// page furniture and unicode artifacts. Line breaks are kept so the
/// structure stages can still see headings and paragraphs.
pub struct TextCleaners {
    acronym_regex: Option<Regex>,
    acronym_forms: HashMap<String, String>,
    control_chars_regex: Regex,
    bullet_regex: Regex,
    emphasis_regex: Regex,
    horizontal_ws_regex: Regex,
    line_edge_ws_regex: Regex,
    excessive_newlines_regex: Regex,
    page_number_regex: Regex,
    leading_ordinal_regex: Regex,
    banner_patterns: Vec<Regex>,
    header_footer_patterns: Vec<Regex>,
    unicode_space_regex: Regex,
    symbol_glyph_regex: Regex,
    dash_regex: Regex,
    broken_word_regex: Regex,
}

impl TextCleaners {
    pub fn new(lexicon: &ClimateLexicon) -> Result<Self, ProcessingError> {
        // Match on the word characters of each acronym so "REDD+" still
        // matches "redd" followed by a literal plus sign
        let mut acronym_forms = HashMap::default();
        for acronym in &lexicon.acronyms {
            let core = acronym.trim_matches(|c: char| !c.is_alphanumeric());
            if !core.is_empty() {
                acronym_forms.insert(core.to_lowercase(), core.to_string());
            }
        }

        let acronym_regex = if acronym_forms.is_empty() {
            None
        } else {
            let mut keys: Vec<&String> = acronym_forms.keys().collect();
            keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
            let alternation = keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
                .map_err(|e| ProcessingError::Config(format!("Invalid acronym list: {}", e)))?;
            Some(regex)
        };

        let banner_patterns = [
            r"(?i)^(?:ministry|department|government)\b.{0,80}\d{4}$",
            r"(?i)^draft\b.{0,80}\d{4}$",
            r"(?i)^confidential\b.{0,80}draft$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("Invalid banner regex"))
        .collect();

        let header_footer_patterns = [r"^\d+$", r"(?i)^\d{1,3}\s+of\s+\d{1,3}$"]
            .iter()
            .map(|p| Regex::new(p).expect("Invalid header/footer regex"))
            .collect();

        Ok(Self {
            acronym_regex,
            acronym_forms,
            // Form feed is handled separately as a line break
            control_chars_regex: Regex::new(r"[\x00-\x08\x0B\x0E-\x1F\x7F]").expect("Invalid control chars regex"),
            bullet_regex: Regex::new(r"[•▪▫●◦■□◆◇‣⁃]").expect("Invalid bullet regex"),
            emphasis_regex: Regex::new(r"[#*]+").expect("Invalid emphasis regex"),
            horizontal_ws_regex: Regex::new(r"[ \t]+").expect("Invalid whitespace regex"),
            line_edge_ws_regex: Regex::new(r"[ \t]*\n[ \t]*").expect("Invalid line edge regex"),
            excessive_newlines_regex: Regex::new(r"\n{3,}").expect("Invalid newlines regex"),
            page_number_regex: Regex::new(r"(?i)^page\s+\d+(?:\s+of\s+\d+)?$").expect("Invalid page number regex"),
            leading_ordinal_regex: Regex::new(r"^\d{1,3}\.\s+").expect("Invalid ordinal regex"),
            banner_patterns,
            header_footer_patterns,
            unicode_space_regex: Regex::new(r"[\u{00a0}\u{2000}-\u{200f}\u{2028}\u{2029}]").expect("Invalid unicode space regex"),
            symbol_glyph_regex: Regex::new(r"[©®™]").expect("Invalid symbol regex"),
            dash_regex: Regex::new(r"[–—]").expect("Invalid dash regex"),
            broken_word_regex: Regex::new(r"(\p{Alphabetic}+)-[ \t]*\n\s*(\p{Alphabetic}+)").expect("Invalid hyphenation regex"),
        })
    }

    /// Run all three text-level passes in pipeline order
    pub fn clean(&self, text: &str) -> String {
        let text = self.basic_text_cleaning(text);
        let text = self.remove_headers_footers(&text);
        self.clean_special_characters(&text)
    }

    /// Case folding, bullet stripping and whitespace normalization
    ///
    /// Steps:
    /// 1. Lowercase everything, then put known acronyms back in canonical form
    /// 2. Drop bullet glyphs and markdown emphasis markers
    /// 3. Remove control characters (form feeds become line breaks)
    /// 4. Collapse spaces/tabs, trim line edges, cap blank runs at one blank line
    pub fn basic_text_cleaning(&self, text: &str) -> String {
        debug!("Basic cleaning: {} characters", text.len());

        let folded = self.lowercase_preserving_acronyms(text);
        let no_bullets = self.bullet_regex.replace_all(&folded, "");
        let no_emphasis = self.emphasis_regex.replace_all(&no_bullets, "");

        let unified_breaks = no_emphasis.replace("\r\n", "\n").replace(['\r', '\x0C'], "\n");
        let no_control = self.control_chars_regex.replace_all(&unified_breaks, "");

        let result = self.normalize_whitespace(&no_control);
        debug!("Basic cleaning: {} -> {} characters", text.len(), result.len());
        result
    }

    /// Lowercase text while keeping whole-word acronyms in canonical form
    ///
    /// Only whole tokens qualify: "EUROPE" folds to "europe" even though
    /// "EU" is a known acronym.
    pub fn lowercase_preserving_acronyms(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        match &self.acronym_regex {
            Some(regex) => regex
                .replace_all(&lowered, |caps: &Captures| {
                    let token = &caps[0];
                    self.acronym_forms
                        .get(&token.to_lowercase())
                        .cloned()
                        .unwrap_or_else(|| token.to_string())
                })
                .into_owned(),
            None => lowered,
        }
    }

    /// Drop page furniture line by line
    ///
    /// Empty lines, page markers, bare numbers and ministry/draft banners
    /// are removed; a leading ordinal ("12. text") is stripped from the
    /// line but the rest of the line is kept. Banners only match short
    /// lines without sentence punctuation, so a flattened paragraph that
    /// happens to start with "government" and end with a year survives.
    pub fn remove_headers_footers(&self, text: &str) -> String {
        let mut kept = Vec::new();
        let mut dropped = 0usize;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || self.page_number_regex.is_match(line) {
                dropped += 1;
                continue;
            }

            let line = self.leading_ordinal_regex.replace(line, "");
            let line = line.trim();
            if line.is_empty() || self.is_furniture(line) {
                dropped += 1;
                continue;
            }

            kept.push(line.to_string());
        }

        debug!("Header/footer removal dropped {} lines, kept {}", dropped, kept.len());
        kept.join("\n")
    }

    fn is_furniture(&self, line: &str) -> bool {
        if self.header_footer_patterns.iter().any(|p| p.is_match(line)) {
            return true;
        }
        let banner_sized = line.split_whitespace().count() <= MAX_BANNER_TOKENS
            && !line.contains(['.', '!', '?']);
        banner_sized && self.banner_patterns.iter().any(|p| p.is_match(line))
    }

    /// Replace unicode artifacts, normalize dashes and re-join hyphenated words
    pub fn clean_special_characters(&self, text: &str) -> String {
        let spaced = self.unicode_space_regex.replace_all(text, " ");
        let no_symbols = self.symbol_glyph_regex.replace_all(&spaced, "");
        let dashes = self.dash_regex.replace_all(&no_symbols, "-");
        let joined = self.broken_word_regex.replace_all(&dashes, "${1}${2}");
        self.normalize_whitespace(&joined)
    }

    fn normalize_whitespace(&self, text: &str) -> String {
        let spaces = self.horizontal_ws_regex.replace_all(text, " ");
        let edges = self.line_edge_ws_regex.replace_all(&spaces, "\n");
        let newlines = self.excessive_newlines_regex.replace_all(&edges, "\n\n");
        newlines.trim().to_string()
    }
}
