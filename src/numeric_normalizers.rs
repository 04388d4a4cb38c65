use regex::{Captures, Regex};
use log::debug;

const MONTHS: [(&str, &str); 12] = [
    ("january", "01"), ("february", "02"), ("march", "03"), ("april", "04"),
    ("may", "05"), ("june", "06"), ("july", "07"), ("august", "08"),
    ("september", "09"), ("october", "10"), ("november", "11"), ("december", "12"),
];

const NUMBER_WORDS: [(&str, &str); 12] = [
    ("twenty", "20"), ("thirty", "30"), ("forty", "40"), ("fifty", "50"),
    ("sixty", "60"), ("seventy", "70"), ("eighty", "80"), ("ninety", "90"),
    ("hundred", "100"), ("thousand", "1000"), ("million", "1000000"),
    ("billion", "1000000000"),
];

const MONTH_ALTERNATION: &str =
    "january|february|march|april|may|june|july|august|september|october|november|december";

/// Canonicalizes percentages, years, dates, currency, emission units and
/// number words
///
/// The passes run in a fixed order and each one sees the previous output:
/// percentages -> years -> dates -> currency -> emission units -> number words.
/// Currency has to come before number words, otherwise "million" and
/// "billion" used as multipliers would already be digits.
///
/// Number-word handling is deliberately small: a fixed word table plus two
/// contiguous compound shapes ("N-M million", "one hundred and N"). Anything
/// longer ("two hundred thousand") is left partially converted.
///
/// The year-month shape cannot tell the month from the modal verb: "approved
/// in 2030, may expand" becomes "approved in 2030-05 expand".
pub struct NumericNormalizers {
    percent_spacing_regex: Regex,
    percent_word_regex: Regex,
    by_the_year_regex: Regex,
    year_prefix_regex: Regex,
    short_year_regex: Regex,
    day_month_year_regex: Regex,
    month_day_year_regex: Regex,
    year_month_regex: Regex,
    currency_patterns: Vec<(Regex, &'static str)>,
    emission_patterns: Vec<(Regex, &'static str)>,
    range_million_regex: Regex,
    hundred_and_regex: Regex,
    number_word_regex: Regex,
    missing_target_regex: Regex,
    approximate_patterns: Vec<(Regex, &'static str)>,
    range_regex: Regex,
    open_range_regex: Regex,
}

impl NumericNormalizers {
    pub fn new() -> Self {
        let words = NUMBER_WORDS.iter().map(|(w, _)| *w).collect::<Vec<_>>().join("|");

        Self {
            percent_spacing_regex: Regex::new(r"(\d+)\s*%").expect("Invalid percent regex"),
            percent_word_regex: Regex::new(r"(?i)(\d+)\s+percent\b").expect("Invalid percent word regex"),
            by_the_year_regex: Regex::new(r"(?i)\bby\s+the\s+year\s+(\d{4})\b").expect("Invalid by-the-year regex"),
            year_prefix_regex: Regex::new(r"(?i)\byear\s+(\d{4})\b").expect("Invalid year regex"),
            short_year_regex: Regex::new(r"(^|\s)'(\d{2})\b").expect("Invalid short year regex"),
            day_month_year_regex: Regex::new(&format!(
                r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({})\s+(\d{{4}})\b",
                MONTH_ALTERNATION
            ))
            .expect("Invalid day-month-year regex"),
            month_day_year_regex: Regex::new(&format!(
                r"(?i)\b({})\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b",
                MONTH_ALTERNATION
            ))
            .expect("Invalid month-day-year regex"),
            year_month_regex: Regex::new(&format!(r"(?i)\b(\d{{4}}),?\s+({})\b", MONTH_ALTERNATION))
                .expect("Invalid year-month regex"),
            currency_patterns: vec![
                (Regex::new(r"(?i)\$(\d+)bn\b").expect("Invalid $bn regex"), "${1},000,000,000 USD"),
                (Regex::new(r"(?i)\$(\d+)m\b").expect("Invalid $m regex"), "${1},000,000 USD"),
                (Regex::new(r"(?i)(\d+)\s+billion\s+USD\b").expect("Invalid billion USD regex"), "${1},000,000,000 USD"),
                (Regex::new(r"(?i)\bRs\.?\s*(\d+)\s+million\b").expect("Invalid rupee regex"), "${1},000,000 INR"),
            ],
            emission_patterns: vec![
                (Regex::new(r"(?i)(\d+)\s*MtCO2e?\b").expect("Invalid MtCO2e regex"), "${1} million tonnes CO2e"),
                (Regex::new(r"(?i)(\d+)\s*GtCO2e?\b").expect("Invalid GtCO2e regex"), "${1} billion tonnes CO2e"),
                (Regex::new(r"(?i)\bkwh\b").expect("Invalid kWh regex"), "kWh"),
                (Regex::new(r"(?i)\bmwh\b").expect("Invalid MWh regex"), "MWh"),
                (Regex::new(r"(?i)\bgigatonnes?\b").expect("Invalid gigatonne regex"), "Gt"),
            ],
            range_million_regex: Regex::new(r"(?i)\b(\d+)-(\d+)\s+million\b").expect("Invalid compound million regex"),
            hundred_and_regex: Regex::new(r"(?i)\bone\s+hundred\s+and\s+(\d+)\b").expect("Invalid hundred-and regex"),
            number_word_regex: Regex::new(&format!(r"(?i)(\d\s+)?\b({})\b", words)).expect("Invalid number word regex"),
            missing_target_regex: Regex::new(r"(?i)\breduce\s+emissions\s+by\s+_{2,}\s*%").expect("Invalid missing target regex"),
            approximate_patterns: vec![
                (Regex::new(r"(?i)\baround\s+(\d+)%").expect("Invalid around regex"), "≈${1}%"),
                (Regex::new(r"(?i)\bless\s+than\s+(\d+)%").expect("Invalid less-than regex"), "<${1}%"),
                (Regex::new(r"(?i)\bmore\s+than\s+(\d+)%").expect("Invalid more-than regex"), ">${1}%"),
            ],
            range_regex: Regex::new(r"(\d+)\s*[–-]\s*(\d+)%").expect("Invalid range regex"),
            open_range_regex: Regex::new(r"(\d+)\s*[–-]\s*_{2,}%").expect("Invalid open range regex"),
        }
    }

    /// Apply every numeric/date pass in order
    pub fn normalize_numeric_and_dates(&self, text: &str) -> String {
        debug!("Numeric normalization: {} characters", text.len());

        let text = self.normalize_percentages(text);
        let text = self.normalize_years(&text);
        let text = self.normalize_dates(&text);
        let text = self.normalize_currency(&text);
        let text = self.normalize_emission_units(&text);
        let text = self.convert_written_numbers(&text);

        debug!("Numeric normalization produced {} characters", text.len());
        text
    }

    /// Placeholders for blanks and symbols for approximate phrasing
    pub fn handle_missing_values(&self, text: &str) -> String {
        let mut text = self
            .missing_target_regex
            .replace_all(text, "reduce emissions by MISSING%")
            .into_owned();

        for (regex, replacement) in &self.approximate_patterns {
            text = regex.replace_all(&text, *replacement).into_owned();
        }

        // Open ranges first so "10-___%" is not half-eaten by the range rule
        let text = self.open_range_regex.replace_all(&text, "${1}-MISSING%");
        self.range_regex.replace_all(&text, "${1}-${2}%").into_owned()
    }

    pub fn normalize_percentages(&self, text: &str) -> String {
        let text = self.percent_spacing_regex.replace_all(text, "${1}%");
        self.percent_word_regex.replace_all(&text, "${1}%").into_owned()
    }

    pub fn normalize_years(&self, text: &str) -> String {
        let text = self.by_the_year_regex.replace_all(text, "by ${1}");
        let text = self.year_prefix_regex.replace_all(&text, "${1}");
        self.short_year_regex
            .replace_all(&text, |caps: &Captures| {
                let two_digits = &caps[2];
                let century = match two_digits.parse::<u32>() {
                    Ok(n) if n < 50 => "20",
                    _ => "19",
                };
                format!("{}{}{}", &caps[1], century, two_digits)
            })
            .into_owned()
    }

    /// Rewrite the three supported date shapes to `YYYY-MM-DD` / `YYYY-MM`
    pub fn normalize_dates(&self, text: &str) -> String {
        let text = self.day_month_year_regex.replace_all(text, |caps: &Captures| {
            format!("{}-{}-{:0>2}", &caps[3], month_number(&caps[2]), &caps[1])
        });
        let text = self.month_day_year_regex.replace_all(&text, |caps: &Captures| {
            format!("{}-{}-{:0>2}", &caps[3], month_number(&caps[1]), &caps[2])
        });
        self.year_month_regex
            .replace_all(&text, |caps: &Captures| {
                format!("{}-{}", &caps[1], month_number(&caps[2]))
            })
            .into_owned()
    }

    pub fn normalize_currency(&self, text: &str) -> String {
        apply_in_order(text, &self.currency_patterns)
    }

    pub fn normalize_emission_units(&self, text: &str) -> String {
        apply_in_order(text, &self.emission_patterns)
    }

    /// Number words to digits
    ///
    /// The two compound shapes are resolved first. A word that directly
    /// follows a number ("5 million") is a multiplier and stays as written.
    pub fn convert_written_numbers(&self, text: &str) -> String {
        let text = self.range_million_regex.replace_all(text, |caps: &Captures| {
            match (caps[1].parse::<u64>(), caps[2].parse::<u64>()) {
                (Ok(a), Ok(b)) => match a.checked_add(b) {
                    Some(sum) => format!("{}000000", sum),
                    None => caps[0].to_string(),
                },
                _ => caps[0].to_string(),
            }
        });

        let text = self.hundred_and_regex.replace_all(&text, |caps: &Captures| {
            match caps[1].parse::<u64>() {
                Ok(n) => (100 + n).to_string(),
                Err(_) => caps[0].to_string(),
            }
        });

        self.number_word_regex
            .replace_all(&text, |caps: &Captures| {
                if caps.get(1).is_some() {
                    return caps[0].to_string();
                }
                let word = caps[2].to_lowercase();
                NUMBER_WORDS
                    .iter()
                    .find(|(w, _)| *w == word)
                    .map(|(_, digits)| digits.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

impl Default for NumericNormalizers {
    fn default() -> Self {
        Self::new()
    }
}

/// Month name to two-digit number; unknown tokens pass through unchanged
fn month_number(token: &str) -> String {
    let lowered = token.to_lowercase();
    MONTHS
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, number)| number.to_string())
        .unwrap_or_else(|| token.to_string())
}

fn apply_in_order(text: &str, patterns: &[(Regex, &'static str)]) -> String {
    let mut text = text.to_string();
    for (regex, replacement) in patterns {
        text = regex.replace_all(&text, *replacement).into_owned();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentages() {
        let n = NumericNormalizers::new();
        assert_eq!(n.normalize_percentages("cut 20 % and 30 percent"), "cut 20% and 30%");
    }

    #[test]
    fn test_years() {
        let n = NumericNormalizers::new();
        assert_eq!(n.normalize_years("by the year 2030"), "by 2030");
        assert_eq!(n.normalize_years("targets for year 2050"), "targets for 2050");
        assert_eq!(n.normalize_years("since '05 and '97"), "since 2005 and 1997");
    }

    #[test]
    fn test_three_date_shapes() {
        let n = NumericNormalizers::new();
        assert!(n.normalize_dates("by 31st December 2030").contains("2030-12-31"));
        assert!(n.normalize_dates("on December 31, 2030").contains("2030-12-31"));
        assert!(n.normalize_dates("in 2030, December").contains("2030-12"));
        assert_eq!(n.normalize_dates("from 1 may 2025"), "from 2025-05-01");
    }

    #[test]
    fn test_may_after_year_reads_as_month() {
        let result = NumericNormalizers::new().normalize_dates("approved in 2030, may expand");
        assert_eq!(result, "approved in 2030-05 expand");
    }

    #[test]
    fn test_unknown_month_token_passes_through() {
        assert_eq!(month_number("Smarch"), "Smarch");
        assert_eq!(month_number("June"), "06");
    }

    #[test]
    fn test_currency() {
        let n = NumericNormalizers::new();
        assert!(n.normalize_currency("$20bn pledged").contains("20,000,000,000 USD"));
        assert!(n.normalize_currency("$5m grant").contains("5,000,000 USD"));
        assert!(n.normalize_currency("3 billion USD").contains("3,000,000,000 USD"));
        assert!(n.normalize_currency("Rs. 5 million").contains("5,000,000 INR"));
    }

    #[test]
    fn test_emission_units() {
        let n = NumericNormalizers::new();
        assert_eq!(n.normalize_emission_units("12 MtCO2e"), "12 million tonnes CO2e");
        assert_eq!(n.normalize_emission_units("3GtCO2"), "3 billion tonnes CO2e");
        assert_eq!(n.normalize_emission_units("two gigatonnes"), "two Gt");
    }

    #[test]
    fn test_written_numbers() {
        let n = NumericNormalizers::new();
        assert_eq!(n.convert_written_numbers("twenty sites"), "20 sites");
        assert_eq!(n.convert_written_numbers("one hundred and 5 trees"), "105 trees");
        assert_eq!(n.convert_written_numbers("2-3 million people"), "5000000 people");
    }

    #[test]
    fn test_multiplier_after_number_is_kept() {
        let n = NumericNormalizers::new();
        let text = n.normalize_numeric_and_dates("40 MtCO2e and a million trees");
        assert_eq!(text, "40 million tonnes CO2e and a 1000000 trees");
    }

    #[test]
    fn test_missing_values() {
        let n = NumericNormalizers::new();
        assert_eq!(n.handle_missing_values("reduce emissions by __%"), "reduce emissions by MISSING%");
        assert_eq!(n.handle_missing_values("around 40%"), "≈40%");
        assert_eq!(n.handle_missing_values("less than 5% and more than 9%"), "<5% and >9%");
        assert_eq!(n.handle_missing_values("10–20%"), "10-20%");
        assert_eq!(n.handle_missing_values("10-___%"), "10-MISSING%");
    }

    #[test]
    fn test_total_on_empty_and_plain_text() {
        let n = NumericNormalizers::new();
        assert_eq!(n.normalize_numeric_and_dates(""), "");
        assert_eq!(n.handle_missing_values("no numbers here"), "no numbers here");
    }
}
