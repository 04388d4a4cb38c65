use crate::structure_cleaners::split_sentences;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use log::debug;

/// Policy topics a sentence can be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PolicyTopic {
    #[serde(rename = "Mitigation_Targets")]
    MitigationTargets,
    #[serde(rename = "Adaptation_Strategies")]
    AdaptationStrategies,
    #[serde(rename = "Finance_Commitments")]
    FinanceCommitments,
    #[serde(rename = "Legislation_Policies")]
    LegislationPolicies,
    #[serde(rename = "Stakeholders")]
    Stakeholders,
    #[serde(rename = "Targets_Timelines")]
    TargetsTimelines,
    #[serde(rename = "Sectors_Covered")]
    SectorsCovered,
    #[serde(rename = "Monitoring_Reporting")]
    MonitoringReporting,
    #[serde(rename = "International_Cooperation")]
    InternationalCooperation,
    #[serde(rename = "Institutional_Arrangements")]
    InstitutionalArrangements,
    #[serde(rename = "Social_Community")]
    SocialCommunity,
    #[serde(rename = "Technology_Innovation")]
    TechnologyInnovation,
}

impl PolicyTopic {
    pub const ALL: [PolicyTopic; 12] = [
        PolicyTopic::MitigationTargets,
        PolicyTopic::AdaptationStrategies,
        PolicyTopic::FinanceCommitments,
        PolicyTopic::LegislationPolicies,
        PolicyTopic::Stakeholders,
        PolicyTopic::TargetsTimelines,
        PolicyTopic::SectorsCovered,
        PolicyTopic::MonitoringReporting,
        PolicyTopic::InternationalCooperation,
        PolicyTopic::InstitutionalArrangements,
        PolicyTopic::SocialCommunity,
        PolicyTopic::TechnologyInnovation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyTopic::MitigationTargets => "Mitigation_Targets",
            PolicyTopic::AdaptationStrategies => "Adaptation_Strategies",
            PolicyTopic::FinanceCommitments => "Finance_Commitments",
            PolicyTopic::LegislationPolicies => "Legislation_Policies",
            PolicyTopic::Stakeholders => "Stakeholders",
            PolicyTopic::TargetsTimelines => "Targets_Timelines",
            PolicyTopic::SectorsCovered => "Sectors_Covered",
            PolicyTopic::MonitoringReporting => "Monitoring_Reporting",
            PolicyTopic::InternationalCooperation => "International_Cooperation",
            PolicyTopic::InstitutionalArrangements => "Institutional_Arrangements",
            PolicyTopic::SocialCommunity => "Social_Community",
            PolicyTopic::TechnologyInnovation => "Technology_Innovation",
        }
    }

    /// Keyword phrases for the topic; empty for topics matched by pattern only
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            PolicyTopic::MitigationTargets => &["reduce emissions", "carbon neutral", "renewable", "net zero"],
            PolicyTopic::AdaptationStrategies => &["resilience", "adaptation", "coastal protection", "climate-proof"],
            PolicyTopic::FinanceCommitments => &["funding", "finance", "investment", "billion", "million usd"],
            PolicyTopic::LegislationPolicies => &["act", "law", "policy", "framework", "regulation"],
            PolicyTopic::Stakeholders => &["government", "ministry", "organization", "ngo", "stakeholder"],
            PolicyTopic::TargetsTimelines => &[],
            PolicyTopic::SectorsCovered => &["energy", "transport", "agriculture", "forestry", "waste", "industry"],
            PolicyTopic::MonitoringReporting => &["monitoring", "reporting", "verification", "mrv", "tracking progress"],
            PolicyTopic::InternationalCooperation => &["paris agreement", "unfccc", "bilateral", "international", "cooperation"],
            PolicyTopic::InstitutionalArrangements => &["committee", "council", "agency", "authority", "institution"],
            PolicyTopic::SocialCommunity => &["community", "indigenous", "gender", "health", "vulnerable"],
            PolicyTopic::TechnologyInnovation => &["technology", "innovation", "research", "development", "carbon capture", "hydrogen"],
        }
    }
}

impl fmt::Display for PolicyTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentences grouped by topic; every topic is present, possibly empty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyAnalysis {
    pub topics: BTreeMap<PolicyTopic, Vec<String>>,
}

impl PolicyAnalysis {
    pub fn sentences(&self, topic: PolicyTopic) -> &[String] {
        self.topics.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Topics with at least one tagged sentence, in topic order
    pub fn matched_topics(&self) -> Vec<PolicyTopic> {
        self.topics
            .iter()
            .filter(|(_, sentences)| !sentences.is_empty())
            .map(|(topic, _)| *topic)
            .collect()
    }
}

/// Keyword tagger over cleaned policy text
///
/// A sentence goes under every topic whose keyword appears as a whole
/// word or phrase, so "act" tags "the climate act" but not "impact".
pub struct PolicyAnalyzer {
    topic_patterns: Vec<(PolicyTopic, Regex)>,
}

impl PolicyAnalyzer {
    pub fn new() -> Self {
        let topic_patterns = PolicyTopic::ALL
            .iter()
            .map(|topic| {
                let pattern = match topic {
                    PolicyTopic::TargetsTimelines => r"\b20[2-5][0-9]\b".to_string(),
                    _ => {
                        let alternation = topic
                            .keywords()
                            .iter()
                            .map(|k| keyword_pattern(k))
                            .collect::<Vec<_>>()
                            .join("|");
                        format!(r"(?i)\b(?:{})\b", alternation)
                    }
                };
                (*topic, Regex::new(&pattern).expect("Invalid topic regex"))
            })
            .collect();

        Self { topic_patterns }
    }

    pub fn analyze(&self, text: &str) -> PolicyAnalysis {
        let mut topics: BTreeMap<PolicyTopic, Vec<String>> =
            PolicyTopic::ALL.iter().map(|t| (*t, Vec::new())).collect();

        let mut sentence_count = 0usize;
        for span in split_sentences(text) {
            let sentence = span.text.trim();
            if sentence.is_empty() {
                continue;
            }
            sentence_count += 1;

            for (topic, pattern) in &self.topic_patterns {
                if pattern.is_match(sentence) {
                    topics.entry(*topic).or_default().push(sentence.to_string());
                }
            }
        }

        debug!("Tagged {} sentences across {} topics", sentence_count, topics.values().filter(|s| !s.is_empty()).count());
        PolicyAnalysis { topics }
    }
}

/// Whole-word pattern for a keyword that also accepts its plural
/// ("policy" matches "policies", "act" matches "acts" but not "action")
fn keyword_pattern(keyword: &str) -> String {
    let inflected = match keyword.strip_suffix('y') {
        Some(stem) => format!("{}(?:y|ies)", regex::escape(stem)),
        None => format!("{}(?:s|es)?", regex::escape(keyword)),
    };
    inflected.replace(' ', r"\s+")
}

impl Default for PolicyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_tagged_under_every_matching_topic() {
        let analysis = PolicyAnalyzer::new()
            .analyze("The ministry will provide funding for renewable energy by 2035. Nothing else here.");

        let sentence = "The ministry will provide funding for renewable energy by 2035.";
        for topic in [
            PolicyTopic::Stakeholders,
            PolicyTopic::FinanceCommitments,
            PolicyTopic::MitigationTargets,
            PolicyTopic::SectorsCovered,
            PolicyTopic::TargetsTimelines,
        ] {
            assert_eq!(analysis.sentences(topic), &[sentence.to_string()], "topic {}", topic);
        }
        assert!(analysis.sentences(PolicyTopic::SocialCommunity).is_empty());
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let analysis = PolicyAnalyzer::new().analyze("The impact of the new act is unclear.");
        assert_eq!(analysis.sentences(PolicyTopic::LegislationPolicies).len(), 1);

        let analysis = PolicyAnalyzer::new().analyze("The impact is unclear.");
        assert!(analysis.sentences(PolicyTopic::LegislationPolicies).is_empty());
    }

    #[test]
    fn test_plural_keywords_are_tagged() {
        let analysis = PolicyAnalyzer::new().analyze(
            "New regulations take effect. Private investments doubled. Coastal communities were consulted.",
        );

        assert_eq!(analysis.sentences(PolicyTopic::LegislationPolicies), &["New regulations take effect.".to_string()]);
        assert_eq!(analysis.sentences(PolicyTopic::FinanceCommitments), &["Private investments doubled.".to_string()]);
        assert_eq!(analysis.sentences(PolicyTopic::SocialCommunity), &["Coastal communities were consulted.".to_string()]);

        let analysis = PolicyAnalyzer::new().analyze("Swift action on the impact is needed.");
        assert!(analysis.sentences(PolicyTopic::LegislationPolicies).is_empty());
    }

    #[test]
    fn test_timeline_years_are_bounded() {
        let analysis = PolicyAnalyzer::new().analyze("Targets were set in 1990. New targets land in 2045.");
        assert_eq!(analysis.sentences(PolicyTopic::TargetsTimelines), &["New targets land in 2045.".to_string()]);
    }

    #[test]
    fn test_serialises_with_topic_names() {
        let analysis = PolicyAnalyzer::new().analyze("");
        let json = serde_json::to_value(&analysis).unwrap();

        assert_eq!(json.as_object().unwrap().len(), 12);
        assert!(json["Mitigation_Targets"].as_array().unwrap().is_empty());
        assert!(analysis.matched_topics().is_empty());
    }
}
