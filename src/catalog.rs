//! The static question catalog.
//!
//! Every analysis category maps to an ordered list of titled questions.
//! The catalog is fixed at compile time and never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single canned analysis question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    /// Short title, also the memoization key for results.
    pub title: &'static str,
    /// Natural-language question sent to the agent.
    pub text: &'static str,
}

/// Analysis category selected by the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Awareness & Reach: impressions and visibility
    Awareness,
    /// Engagement & Interest: likes, comments and interaction
    Engagement,
    /// Conversions & Action: profile visits and actions
    Conversions,
}

const AWARENESS_QUESTIONS: &[Question] = &[
    Question {
        title: "Average Reach by Type",
        text: "What's the average reach and impressions across different post types?",
    },
    Question {
        title: "Top Organic Posts",
        text: "Which posts achieved the highest organic reach and what were their characteristics?",
    },
    Question {
        title: "Promoted vs Organic",
        text: "How does promoted content perform compared to organic in terms of reach?",
    },
];

const ENGAGEMENT_QUESTIONS: &[Question] = &[
    Question {
        title: "Engagement Rates",
        text: "What are the engagement rates for different post types?",
    },
    Question {
        title: "Top Engaging Posts",
        text: "Which posts have the highest engagement and what content do they feature?",
    },
    Question {
        title: "Engagement Trends",
        text: "How has engagement evolved over time?",
    },
];

const CONVERSION_QUESTIONS: &[Question] = &[
    Question {
        title: "Conversion Rates",
        text: "What are the conversion rates associated with different posts?",
    },
    Question {
        title: "Call-to-Action Effectiveness",
        text: "Which calls-to-action are most effective in driving conversions?",
    },
    Question {
        title: "Conversion by Audience Segment",
        text: "How do conversion rates vary across different audience segments?",
    },
];

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 3] = [
        Category::Awareness,
        Category::Engagement,
        Category::Conversions,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Awareness => "Awareness & Reach",
            Category::Engagement => "Engagement & Interest",
            Category::Conversions => "Conversions & Action",
        }
    }

    /// Metrics the category focuses on.
    pub fn metrics(&self) -> &'static [&'static str] {
        match self {
            Category::Awareness => &["Impressions", "Reach", "Promoted vs Organic"],
            Category::Engagement => &["Engagement Rate", "Likes", "Comments", "Shares"],
            Category::Conversions => &["Profile Visits", "Conversion Rate", "Follows"],
        }
    }

    /// Ordered questions of this category.
    pub fn questions(&self) -> &'static [Question] {
        match self {
            Category::Awareness => AWARENESS_QUESTIONS,
            Category::Engagement => ENGAGEMENT_QUESTIONS,
            Category::Conversions => CONVERSION_QUESTIONS,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Error returned when a category name cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}' (expected awareness, engagement or conversions)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts the short name, the full label, or a 1-based index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();

        if let Ok(index) = normalized.parse::<usize>() {
            return index
                .checked_sub(1)
                .and_then(|i| Category::ALL.get(i).copied())
                .ok_or_else(|| UnknownCategory(s.to_string()));
        }

        match normalized.as_str() {
            "awareness" | "reach" | "awareness & reach" => Ok(Category::Awareness),
            "engagement" | "interest" | "engagement & interest" => Ok(Category::Engagement),
            "conversions" | "conversion" | "action" | "conversions & action" => {
                Ok(Category::Conversions)
            }
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_category_has_questions() {
        for category in Category::ALL {
            assert!(!category.questions().is_empty(), "{} is empty", category);
        }
    }

    #[test]
    fn test_titles_unique_within_category() {
        for category in Category::ALL {
            let titles: HashSet<_> = category.questions().iter().map(|q| q.title).collect();
            assert_eq!(titles.len(), category.questions().len());
        }
    }

    #[test]
    fn test_awareness_order() {
        let titles: Vec<_> = Category::Awareness
            .questions()
            .iter()
            .map(|q| q.title)
            .collect();
        assert_eq!(
            titles,
            vec!["Average Reach by Type", "Top Organic Posts", "Promoted vs Organic"]
        );
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("awareness".parse::<Category>(), Ok(Category::Awareness));
        assert_eq!(
            "Engagement & Interest".parse::<Category>(),
            Ok(Category::Engagement)
        );
        assert_eq!("3".parse::<Category>(), Ok(Category::Conversions));
        assert!("0".parse::<Category>().is_err());
        assert!("4".parse::<Category>().is_err());
        assert_eq!(
            "virality".parse::<Category>(),
            Err(UnknownCategory("virality".to_string()))
        );
    }
}
