//! Sample data shown until the backend has answered with something usable.

use crate::charts::{RankedTopic, SentimentSlice, TimelinePoint, TopicPolarity};
use crate::models::{Priority, Sentiment};
use crate::view::{ExecutiveSummary, Recommendation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Live,
    LastKnown,
    Sample,
}

impl DataSource {
    pub fn label(self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::LastKnown => "last known",
            DataSource::Sample => "sample",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: DataSource,
}

/// Live data wins, then the last-known snapshot, then the sample.
/// Empty candidates are skipped.
pub fn choose<T>(
    live: Option<T>,
    last_known: Option<T>,
    sample: impl FnOnce() -> T,
    is_empty: impl Fn(&T) -> bool,
) -> Sourced<T> {
    if let Some(value) = live.filter(|v| !is_empty(v)) {
        return Sourced { value, source: DataSource::Live };
    }
    if let Some(value) = last_known.filter(|v| !is_empty(v)) {
        return Sourced { value, source: DataSource::LastKnown };
    }
    Sourced { value: sample(), source: DataSource::Sample }
}

pub fn choose_list<T>(
    live: Option<Vec<T>>,
    last_known: Option<Vec<T>>,
    sample: impl FnOnce() -> Vec<T>,
) -> Sourced<Vec<T>> {
    choose(live, last_known, sample, |v| v.is_empty())
}

// --- Analysis page samples ---

pub struct SampleStats {
    pub total_reviews: u64,
    pub avg_sentiment_score: f64,
    pub total_themes: u64,
    pub critical_issues: u64,
}

pub const SAMPLE_STATS: SampleStats = SampleStats {
    total_reviews: 1247,
    avg_sentiment_score: 4.2,
    total_themes: 12,
    critical_issues: 8,
};

pub fn sentiment_slices() -> Vec<SentimentSlice> {
    Sentiment::ALL
        .into_iter()
        .zip([45, 30, 25])
        .map(|(sentiment, value)| SentimentSlice {
            name: sentiment.display_name().to_string(),
            value,
            color: sentiment.color().to_string(),
        })
        .collect()
}

pub fn sentiment_timeline() -> Vec<TimelinePoint> {
    [
        ("Week 1", 35, 28, 37),
        ("Week 2", 38, 30, 32),
        ("Week 3", 42, 28, 30),
        ("Week 4", 45, 30, 25),
    ]
    .into_iter()
    .map(|(date, positive, neutral, negative)| TimelinePoint {
        date: date.to_string(),
        positive,
        neutral,
        negative,
    })
    .collect()
}

/// Hand-written topics. Unlike the live ranking these carry `mixed`.
pub fn topics() -> Vec<RankedTopic> {
    [
        ("Delivery speed", 234, TopicPolarity::Mixed),
        ("Product quality", 198, TopicPolarity::Positive),
        ("Customer service", 176, TopicPolarity::Positive),
        ("Price", 154, TopicPolarity::Negative),
        ("Packaging", 142, TopicPolarity::Mixed),
    ]
    .into_iter()
    .map(|(name, count, sentiment)| RankedTopic {
        name: name.to_string(),
        count,
        sentiment,
    })
    .collect()
}

pub fn complaints() -> Vec<String> {
    to_strings(&[
        "Slow delivery",
        "Item damaged in transit",
        "Unclear product descriptions",
        "Hard to reach support",
        "Item out of stock",
    ])
}

pub fn positive_aspects() -> Vec<String> {
    to_strings(&[
        "Excellent product quality",
        "Convenient interface",
        "Fast processing",
        "Good value for money",
        "Professional service",
    ])
}

// --- Reports page samples ---

pub fn executive_summary() -> ExecutiveSummary {
    ExecutiveSummary {
        timeframe: "January 1 - December 31, 2024".to_string(),
        total_reviews: SAMPLE_STATS.total_reviews.to_string(),
        avg_rating: format!("{:.1}/5.0", SAMPLE_STATS.avg_sentiment_score),
        challenges: to_strings(&[
            "Delivery speed (234 mentions)",
            "Product damage (198 mentions)",
            "Unclear descriptions (154 mentions)",
        ]),
        strengths: to_strings(&[
            "High perceived product quality",
            "Professional service",
            "Good value proposition",
        ]),
    }
}

pub fn recommendations() -> Vec<Recommendation> {
    let rec = |priority, title: &str, description: &str, impact: &str, effort: &str| Recommendation {
        priority,
        title: title.to_string(),
        description: description.to_string(),
        impact: Some(impact.to_string()),
        effort: Some(effort.to_string()),
    };
    vec![
        rec(
            Priority::High,
            "Ship faster",
            "42% of complaints mention delivery delays. Offering express delivery could lift satisfaction by 15-20%.",
            "Satisfaction +18%",
            "Medium",
        ),
        rec(
            Priority::High,
            "Tighten quality control",
            "Items damaged in transit are the second most common complaint (38 mentions). Strengthen inspection before dispatch.",
            "Returns -25%",
            "High",
        ),
        rec(
            Priority::Medium,
            "Improve product descriptions",
            "Unclear descriptions come up in 23% of reviews. Add detailed specifications and images.",
            "Returns -12%",
            "Low",
        ),
        rec(
            Priority::Medium,
            "Extend support hours",
            "Difficulty reaching support is mentioned 28 times. 24/7 coverage or a chat bot would address it.",
            "Support satisfaction +22%",
            "Medium",
        ),
        rec(
            Priority::Low,
            "Launch a loyalty programme",
            "Customers value the price-quality ratio. A rewards programme could raise retention by 10%.",
            "Retention +10%",
            "Medium",
        ),
    ]
}

pub fn next_steps() -> Vec<String> {
    to_strings(&[
        "Review delivery partners and agree on express options",
        "Add a quality checkpoint before dispatch",
        "Rewrite the descriptions of the most-returned products",
        "Re-run the analysis after the next import to measure the effect",
    ])
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
