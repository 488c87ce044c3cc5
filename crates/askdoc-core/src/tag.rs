//! Heuristic chunk tagger.
//!
//! A cheap, deterministic stand-in for LLM-based tagging: an ordered
//! keyword-lookup table maps lower-cased chunk text to a coarse main
//! category plus sub-topic tags, and a second table maps it to a
//! section label. The first matching rule wins; text matching no rule
//! falls back to `"General"`. The retrieval engine works the same
//! regardless of which tagging source produced the labels.

/// One category rule: if any keyword occurs in the text, the rule's
/// category and sub-topics apply.
pub struct TagRule {
    pub keywords: &'static [&'static str],
    pub category: &'static str,
    pub sub_topics: &'static [&'static str],
}

/// Ordered category rules; earlier rules shadow later ones.
pub const CATEGORY_RULES: &[TagRule] = &[
    TagRule {
        keywords: &["grace", "premium", "payment"],
        category: "Premiums",
        sub_topics: &["grace period", "premium payment"],
    },
    TagRule {
        keywords: &["waiting", "period", "36 months", "24 months"],
        category: "Terms",
        sub_topics: &["waiting period"],
    },
    TagRule {
        keywords: &["maternity", "pregnancy", "childbirth"],
        category: "Maternity",
        sub_topics: &["maternity coverage"],
    },
    TagRule {
        keywords: &["cataract", "surgery"],
        category: "Coverage",
        sub_topics: &["cataract surgery"],
    },
    TagRule {
        keywords: &["organ donor", "transplantation"],
        category: "Coverage",
        sub_topics: &["organ donor"],
    },
    TagRule {
        keywords: &["no claim discount", "ncd"],
        category: "Premiums",
        sub_topics: &["no claim discount"],
    },
    TagRule {
        keywords: &["health check", "preventive"],
        category: "Coverage",
        sub_topics: &["health check"],
    },
    TagRule {
        keywords: &["hospital", "institution", "beds"],
        category: "Definitions",
        sub_topics: &["hospital definition"],
    },
    TagRule {
        keywords: &["ayush", "ayurveda", "homeopathy"],
        category: "AYUSH",
        sub_topics: &["ayush treatment"],
    },
    TagRule {
        keywords: &["plan a", "room rent", "icu"],
        category: "Coverage",
        sub_topics: &["plan a limits"],
    },
];

/// Ordered section rules: (keyword, section label).
pub const SECTION_RULES: &[(&str, &str)] = &[
    ("preamble", "Preamble"),
    ("definitions", "Definitions"),
    ("benefits", "Benefits"),
    ("exclusions", "Exclusions"),
    ("conditions", "Conditions"),
];

pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_SECTION: &str = "General";
pub const DEFAULT_SUB_TOPICS: &[&str] = &["general information"];

/// Labels produced by [`tag_chunk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tags {
    pub category: String,
    pub sub_topics: Vec<String>,
    pub section: String,
}

/// Tag a chunk of text. Pure function of the lower-cased text.
pub fn tag_chunk(text: &str) -> Tags {
    let lower = text.to_lowercase();

    let (category, sub_topics) = CATEGORY_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lower.contains(kw)))
        .map(|rule| (rule.category, rule.sub_topics))
        .unwrap_or((DEFAULT_CATEGORY, DEFAULT_SUB_TOPICS));

    let section = SECTION_RULES
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|(_, section)| *section)
        .unwrap_or(DEFAULT_SECTION);

    Tags {
        category: category.to_string(),
        sub_topics: sub_topics.iter().map(|s| s.to_string()).collect(),
        section: section.to_string(),
    }
}
