use crate::config::ClimateLexicon;
use crate::error::ProcessingError;
use regex::{Captures, Regex};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde::{Deserialize, Serialize};
use log::debug;

pub const DEFAULT_SECTION_TITLE: &str = "Document Content";

/// Heading keyword groups, checked in this order for every line
const SECTION_HEADINGS: [&str; 6] = [
    r"introduction|executive\s+summary",
    r"objectives?|goals?|targets?",
    r"mitigation|adaptation",
    r"implementation|monitoring",
    r"conclusions?|summary",
    r"annex|appendix",
];

/// A titled block of a document, located by line numbers
///
/// `start_line` is the heading line and `end_line` is exclusive: the next
/// heading or the line count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// A sentence slice plus the whitespace that followed it in the source
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SentenceSpan<'a> {
    pub text: &'a str,
    pub separator: &'a str,
}

/// Split text at `.`, `!` or `?` runs that are followed by whitespace or the end
///
/// Decimal points ("2.5") never end a sentence.
pub(crate) fn split_sentences(text: &str) -> Vec<SentenceSpan<'_>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        while let Some(&(_, next)) = chars.peek() {
            if matches!(next, '.' | '!' | '?') {
                chars.next();
            } else {
                break;
            }
        }

        let sentence_end = chars.peek().map(|&(i, _)| i).unwrap_or(text.len());
        match chars.peek() {
            Some(&(_, next)) if !next.is_whitespace() => continue,
            _ => {}
        }

        let mut separator_end = sentence_end;
        while let Some(&(i, next)) = chars.peek() {
            if next.is_whitespace() {
                chars.next();
                separator_end = i + next.len_utf8();
            } else {
                break;
            }
        }

        spans.push(SentenceSpan {
            text: &text[start..sentence_end],
            separator: &text[sentence_end..separator_end],
        });
        start = separator_end;
    }

    if start < text.len() {
        spans.push(SentenceSpan { text: &text[start..], separator: "" });
    }
    spans
}

/// Structure-oriented and climate-domain cleaning
///
/// Everything here works on line-preserving text until `final_cleanup`,
/// which flattens the result to single-spaced prose.
pub struct StructureCleaners {
    min_sentence_chars: usize,
    min_paragraph_chars: usize,
    caption_patterns: Vec<Regex>,
    whitespace_regex: Regex,
    missing_space_regex: Regex,
    repeated_periods_regex: Regex,
    repeated_bangs_regex: Regex,
    repeated_questions_regex: Regex,
    implied_break_regex: Regex,
    heading_patterns: Vec<Regex>,
    annex_block_regex: fancy_regex::Regex,
    reference_block_regex: fancy_regex::Regex,
    footnote_patterns: Vec<Regex>,
    domain_terms: Vec<(Regex, String)>,
    boilerplate_patterns: Vec<Regex>,
    country_regex: Option<Regex>,
    country_forms: HashMap<String, String>,
    us_date_regex: Regex,
    terminator_spacing_regex: Regex,
}

impl StructureCleaners {
    pub fn new(
        lexicon: &ClimateLexicon,
        min_sentence_chars: usize,
        min_paragraph_chars: usize,
    ) -> Result<Self, ProcessingError> {
        let domain_terms = lexicon
            .domain_terms
            .iter()
            .map(|(pattern, replacement)| {
                Regex::new(&format!("(?i){}", pattern))
                    .map(|regex| (regex, replacement.clone()))
                    .map_err(|e| {
                        ProcessingError::Config(format!("Invalid domain term pattern '{}': {}", pattern, e))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut country_forms = HashMap::default();
        for country in &lexicon.countries {
            let key = collapse_whitespace(&country.to_lowercase());
            if !key.is_empty() {
                country_forms.insert(key.clone(), title_case(&key));
            }
        }
        let country_regex = if country_forms.is_empty() {
            None
        } else {
            let mut keys: Vec<&String> = country_forms.keys().collect();
            keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
            let alternation = keys
                .iter()
                .map(|k| regex::escape(k).replace(' ', r"\s+"))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
                .map_err(|e| ProcessingError::Config(format!("Invalid country list: {}", e)))?;
            Some(regex)
        };

        let heading_patterns = SECTION_HEADINGS
            .iter()
            .map(|keywords| {
                Regex::new(&format!(r"(?i)^(?:\d+(?:\.\d+)*\.?\s+)?(?:{})\b[^.!?;]{{0,40}}$", keywords))
                    .expect("Invalid section heading regex")
            })
            .collect();

        Ok(Self {
            min_sentence_chars,
            min_paragraph_chars,
            caption_patterns: vec![
                Regex::new(r"(?i)\(see\s+(?:figure|table|chart)\s+\d+\)").expect("Invalid see-figure regex"),
                Regex::new(r"(?i)\b(?:figure|table|chart|graph)\s+\d+[.:][^\n]*").expect("Invalid caption regex"),
                Regex::new(r"(?i)\b(?:fig|tab)\.\s*\d+[.:][^\n]*").expect("Invalid short caption regex"),
            ],
            whitespace_regex: Regex::new(r"\s+").expect("Invalid whitespace regex"),
            missing_space_regex: Regex::new(r"([.!?])([A-Z])").expect("Invalid missing space regex"),
            repeated_periods_regex: Regex::new(r"\.{2,}").expect("Invalid periods regex"),
            repeated_bangs_regex: Regex::new(r"!{2,}").expect("Invalid exclamation regex"),
            repeated_questions_regex: Regex::new(r"\?{2,}").expect("Invalid question regex"),
            implied_break_regex: Regex::new(r"([a-z])[ \t]*\n\s*([A-Z])").expect("Invalid implied break regex"),
            heading_patterns,
            annex_block_regex: fancy_regex::Regex::new(r"(?ims)^annex\s+[a-z]\b.*?(?=\n\n|\z)")
                .expect("Invalid annex regex"),
            reference_block_regex: fancy_regex::Regex::new(
                r"(?ims)^(?:references?|bibliography)[ \t]*:?[ \t]*\n.*?(?=\n\n|\z)",
            )
            .expect("Invalid references regex"),
            footnote_patterns: vec![
                Regex::new(r"\[\d+\]").expect("Invalid bracket footnote regex"),
                Regex::new(r"\(\d+\)").expect("Invalid paren footnote regex"),
            ],
            domain_terms,
            boilerplate_patterns: [
                r"(?i)\bhereby\s+acknowledges?\b",
                r"(?i)\bthereof\s+and\s+thereto\b",
                r"(?i)\bwhereas\b[^\n]*",
                r"(?i)\bnow\s+therefore\b",
                r"(?i)\bin\s+witness\s+whereof\b",
            ]
            .iter()
            .map(|p| Regex::new(p).expect("Invalid boilerplate regex"))
            .collect(),
            country_regex,
            country_forms,
            us_date_regex: Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("Invalid US date regex"),
            terminator_spacing_regex: Regex::new(r"([.!?])\s*([A-Z])").expect("Invalid terminator spacing regex"),
        })
    }

    /// Full structure tail of the pipeline
    ///
    /// Process:
    /// 1. Captions, sentence boundaries, duplicate sentences
    /// 2. Repeated paragraphs
    /// 3. Climate-specific cleaning (annexes, terms, boilerplate, entity prep)
    /// 4. Final whitespace cleanup
    pub fn clean_structure(&self, text: &str) -> String {
        let text = self.structure_oriented_cleaning(text);
        let text = self.remove_repeated_paragraphs(&text);
        let text = self.climate_policy_specific_cleaning(&text);
        self.final_cleanup(&text)
    }

    /// Boundary repair runs before dedup so fragments split off at an
    /// implied break are length-checked in the same pass.
    pub fn structure_oriented_cleaning(&self, text: &str) -> String {
        let text = self.remove_captions(text);
        let text = self.fix_sentence_boundaries(&text);
        self.remove_duplicate_sentences(&text)
    }

    pub fn remove_captions(&self, text: &str) -> String {
        let mut text = text.to_string();
        for pattern in &self.caption_patterns {
            text = pattern.replace_all(&text, "").into_owned();
        }
        text
    }

    /// Keep the first occurrence of every sentence
    ///
    /// Sentences are compared lowercased with whitespace collapsed. Fragments
    /// shorter than the configured minimum are dropped outright. Kept
    /// sentences retain the whitespace that followed them, so line breaks
    /// survive for the later line-anchored stages.
    pub fn remove_duplicate_sentences(&self, text: &str) -> String {
        let mut seen: HashSet<String> = HashSet::default();
        let mut out = String::with_capacity(text.len());
        let mut dropped = 0usize;

        for span in split_sentences(text) {
            let sentence = span.text.trim();
            let keep = sentence.chars().count() >= self.min_sentence_chars
                && seen.insert(self.comparison_key(sentence));

            if keep {
                out.push_str(sentence);
                out.push_str(span.separator);
            } else {
                dropped += 1;
                if span.separator.contains('\n') && !out.is_empty() && !out.ends_with('\n') {
                    let trimmed_len = out.trim_end().len();
                    out.truncate(trimmed_len);
                    out.push('\n');
                }
            }
        }

        debug!("Sentence dedup dropped {} fragments", dropped);
        out.trim_end().to_string()
    }

    pub fn fix_sentence_boundaries(&self, text: &str) -> String {
        let text = self.missing_space_regex.replace_all(text, "${1} ${2}");
        let text = self.repeated_periods_regex.replace_all(&text, ".");
        let text = self.repeated_bangs_regex.replace_all(&text, "!");
        let text = self.repeated_questions_regex.replace_all(&text, "?");
        self.implied_break_regex.replace_all(&text, "${1}. ${2}").into_owned()
    }

    /// Split text into sections at recognised heading lines
    ///
    /// A heading line opens a section that runs until the next heading or
    /// the end of input. Lines before the first heading belong to no section.
    /// Without any heading the whole text becomes one default section.
    pub fn split_sections(&self, text: &str) -> Vec<Section> {
        let lines: Vec<&str> = text.lines().collect();
        let mut sections = Vec::new();
        let mut open: Option<(String, usize, Vec<&str>)> = None;

        for (index, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if self.is_heading(trimmed) {
                if let Some((title, start, body)) = open.take() {
                    sections.push(build_section(title, start, index, &body));
                }
                open = Some((trimmed.to_string(), index, Vec::new()));
            } else if let Some((_, _, body)) = open.as_mut() {
                body.push(line);
            }
        }

        if let Some((title, start, body)) = open.take() {
            sections.push(build_section(title, start, lines.len(), &body));
        }

        if sections.is_empty() {
            sections.push(Section {
                title: DEFAULT_SECTION_TITLE.to_string(),
                content: text.trim().to_string(),
                start_line: 0,
                end_line: lines.len(),
            });
        }

        debug!("Split text into {} sections", sections.len());
        sections
    }

    fn is_heading(&self, line: &str) -> bool {
        !line.is_empty() && self.heading_patterns.iter().any(|p| p.is_match(line))
    }

    pub fn remove_repeated_paragraphs(&self, text: &str) -> String {
        let mut seen: HashSet<String> = HashSet::default();
        let mut kept = Vec::new();

        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            let key = self.comparison_key(paragraph);
            if key.chars().count() >= self.min_paragraph_chars && seen.insert(key) {
                kept.push(paragraph);
            }
        }

        kept.join("\n\n")
    }

    /// Annexes, domain terminology, legal boilerplate, entity prep
    pub fn climate_policy_specific_cleaning(&self, text: &str) -> String {
        let text = self.remove_annexes_references(text);
        let text = self.standardize_climate_terms(&text);
        let text = self.remove_legal_boilerplate(&text);
        self.entity_tagging_prep(&text)
    }

    pub fn remove_annexes_references(&self, text: &str) -> String {
        let text = self.annex_block_regex.replace_all(text, "");
        let text = self.reference_block_regex.replace_all(&text, "");
        let mut text = text.into_owned();
        for pattern in &self.footnote_patterns {
            text = pattern.replace_all(&text, "").into_owned();
        }
        text
    }

    /// Apply the domain-term table in table order
    pub fn standardize_climate_terms(&self, text: &str) -> String {
        let mut text = text.to_string();
        for (pattern, replacement) in &self.domain_terms {
            text = pattern.replace_all(&text, regex::NoExpand(replacement)).into_owned();
        }
        text
    }

    pub fn remove_legal_boilerplate(&self, text: &str) -> String {
        let mut text = text.to_string();
        for pattern in &self.boilerplate_patterns {
            text = pattern.replace_all(&text, "").into_owned();
        }
        text
    }

    pub fn entity_tagging_prep(&self, text: &str) -> String {
        let text = match &self.country_regex {
            Some(regex) => regex
                .replace_all(text, |caps: &Captures| {
                    let key = collapse_whitespace(&caps[0].to_lowercase());
                    self.country_forms
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string())
                })
                .into_owned(),
            None => text.to_string(),
        };

        self.us_date_regex
            .replace_all(&text, |caps: &Captures| {
                format!("{}-{:0>2}-{:0>2}", &caps[3], &caps[1], &caps[2])
            })
            .into_owned()
    }

    /// Flatten to single-spaced text with one space after sentence ends
    pub fn final_cleanup(&self, text: &str) -> String {
        let text = self.whitespace_regex.replace_all(text, " ");
        let text = self.terminator_spacing_regex.replace_all(&text, "${1} ${2}");
        text.trim().to_string()
    }

    fn comparison_key(&self, text: &str) -> String {
        self.whitespace_regex
            .replace_all(&text.to_lowercase(), " ")
            .trim()
            .to_string()
    }
}

fn build_section(title: String, start_line: usize, end_line: usize, body: &[&str]) -> Section {
    Section {
        title,
        content: body.join("\n").trim().to_string(),
        start_line,
        end_line,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaners() -> StructureCleaners {
        StructureCleaners::new(&ClimateLexicon::default(), 10, 20).unwrap()
    }

    #[test]
    fn test_sentence_split_keeps_decimals() {
        let spans = split_sentences("Growth of 2.5% is expected. Next steps!\nDone");
        let texts: Vec<&str> = spans.iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["Growth of 2.5% is expected.", "Next steps!", "Done"]);
        assert_eq!(spans[1].separator, "\n");
    }

    #[test]
    fn test_captions_removed() {
        let text = "Emissions fell sharply (see figure 2) last year.\nFigure 3: sectoral split\nTab. 4. totals\nBody text";
        assert_eq!(cleaners().remove_captions(text), "Emissions fell sharply  last year.\n\n\nBody text");
    }

    #[test]
    fn test_duplicate_sentences_removed() {
        let text = "We will cut emissions. we   will cut EMISSIONS. Forests matter a lot. We will cut emissions.";
        let result = cleaners().remove_duplicate_sentences(text);
        assert_eq!(result, "We will cut emissions. Forests matter a lot.");
    }

    #[test]
    fn test_short_fragments_dropped() {
        let result = cleaners().remove_duplicate_sentences("Ok. This sentence is long enough.");
        assert_eq!(result, "This sentence is long enough.");
    }

    #[test]
    fn test_sentence_boundaries() {
        let cleaners = cleaners();
        assert_eq!(cleaners.fix_sentence_boundaries("the end.Next part"), "the end. Next part");
        assert_eq!(cleaners.fix_sentence_boundaries("wait... really?? yes!!"), "wait. really? yes!");
        assert_eq!(cleaners.fix_sentence_boundaries("first line\nSecond line"), "first line. Second line");
    }

    #[test]
    fn test_fragment_from_implied_break_dropped_in_one_pass() {
        let cleaners = cleaners();
        let once = cleaners.clean_structure("we act\nNDC goals are clear and binding for all.");
        assert_eq!(once, "NDC goals are clear and binding for all.");
        assert_eq!(cleaners.clean_structure(&once), once);
    }

    #[test]
    fn test_sections_split_in_order() {
        let text = "Introduction\nThe plan sets out goals.\nMitigation\nCut coal use.\nPhase out diesel.\nConclusion\nWe will act.";
        let sections = cleaners().split_sections(text);

        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Introduction", "Mitigation", "Conclusion"]);
        assert_eq!(sections[0].content, "The plan sets out goals.");
        assert_eq!(sections[1].content, "Cut coal use.\nPhase out diesel.");
        assert_eq!(sections[2].content, "We will act.");
        assert_eq!((sections[1].start_line, sections[1].end_line), (2, 5));
    }

    #[test]
    fn test_no_heading_gives_default_section() {
        let sections = cleaners().split_sections("just some text\nwith two lines");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, DEFAULT_SECTION_TITLE);
        assert_eq!(sections[0].content, "just some text\nwith two lines");
    }

    #[test]
    fn test_sentence_mentioning_keyword_is_not_a_heading() {
        let sections = cleaners().split_sections("Mitigation measures will cut emissions by half.\nmore text");
        assert_eq!(sections[0].title, DEFAULT_SECTION_TITLE);
    }

    #[test]
    fn test_repeated_paragraphs() {
        let text = "The first paragraph is here.\n\nthe first   paragraph is HERE.\n\nshort\n\nA different paragraph entirely.";
        let result = cleaners().remove_repeated_paragraphs(text);
        assert_eq!(result, "The first paragraph is here.\n\nA different paragraph entirely.");
    }

    #[test]
    fn test_climate_terms_in_table_order() {
        let result = cleaners().standardize_climate_terms(
            "carbon dioxide and greenhouse gases under the paris agreement and nationally determined contributions",
        );
        assert_eq!(result, "CO2 and GHG under the Paris Agreement and NDC");
    }

    #[test]
    fn test_annex_and_footnotes_removed() {
        let text = "main body text[12] with note (3).\nannex b\nlong annex table\nstill annex";
        let result = cleaners().remove_annexes_references(text);
        assert_eq!(result, "main body text with note .\n");
    }

    #[test]
    fn test_references_block_removed_until_blank_line() {
        let text = "body\nreferences\nsmith 2020\n\nafter the block";
        let result = cleaners().remove_annexes_references(text);
        assert_eq!(result, "body\n\n\nafter the block");
    }

    #[test]
    fn test_legal_boilerplate() {
        let result = cleaners().remove_legal_boilerplate("whereas the parties agree\nnow therefore the plan applies");
        assert_eq!(result, "\n the plan applies");
    }

    #[test]
    fn test_entity_prep() {
        let result = cleaners().entity_tagging_prep("india and the european  union signed on 3/7/2021");
        assert_eq!(result, "India and the European Union signed on 2021-03-07");
    }

    #[test]
    fn test_final_cleanup() {
        let result = cleaners().final_cleanup("  one.\n\n\n\nTwo   three.Four \n");
        assert_eq!(result, "one. Two three. Four");
    }

    #[test]
    fn test_bad_domain_pattern_is_config_error() {
        let mut lexicon = ClimateLexicon::default();
        lexicon.domain_terms.push(("(unclosed".to_string(), "x".to_string()));
        assert!(matches!(
            StructureCleaners::new(&lexicon, 10, 20),
            Err(ProcessingError::Config(_))
        ));
    }
}
