use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One of the three fixed tonal buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    /// Resolve a backend category key. The backend stores sentiments in Russian,
    /// so both spellings map to the same bucket.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" | "положительная" | "позитивная" => Some(Sentiment::Positive),
            "neutral" | "нейтральная" => Some(Sentiment::Neutral),
            "negative" | "отрицательная" | "негативная" => Some(Sentiment::Negative),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Sentiment::Positive => "#00b4d8",
            Sentiment::Neutral => "#90e0ef",
            Sentiment::Negative => "#0096c7",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SentimentCounts {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

impl SentimentCounts {
    pub fn new(positive: u64, neutral: u64, negative: u64) -> Self {
        Self { positive, neutral, negative }
    }

    /// Unknown keys are ignored; missing categories stay at zero.
    pub fn from_labels(map: &HashMap<String, u64>) -> Self {
        let mut counts = Self::default();
        for (label, count) in map {
            match Sentiment::from_label(label) {
                Some(Sentiment::Positive) => counts.positive = counts.positive.saturating_add(*count),
                Some(Sentiment::Neutral) => counts.neutral = counts.neutral.saturating_add(*count),
                Some(Sentiment::Negative) => counts.negative = counts.negative.saturating_add(*count),
                None => {}
            }
        }
        counts
    }

    pub fn get(&self, sentiment: Sentiment) -> u64 {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Neutral => self.neutral,
            Sentiment::Negative => self.negative,
        }
    }

    pub fn sum(&self) -> u64 {
        self.positive.saturating_add(self.neutral).saturating_add(self.negative)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeCount {
    pub topic: String,
    pub count: u64,
}

/// Per-category daily series keyed by resolved sentiment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySeries {
    pub positive: Vec<DailyCount>,
    pub neutral: Vec<DailyCount>,
    pub negative: Vec<DailyCount>,
}

impl DailySeries {
    pub fn from_labels(map: &HashMap<String, Vec<DailyCount>>) -> Self {
        let mut series = Self::default();
        for (label, points) in map {
            let target = match Sentiment::from_label(label) {
                Some(Sentiment::Positive) => &mut series.positive,
                Some(Sentiment::Neutral) => &mut series.neutral,
                Some(Sentiment::Negative) => &mut series.negative,
                None => continue,
            };
            target.extend(points.iter().cloned());
        }
        series
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.neutral.is_empty() && self.negative.is_empty()
    }

    pub fn get(&self, sentiment: Sentiment) -> &[DailyCount] {
        match sentiment {
            Sentiment::Positive => &self.positive,
            Sentiment::Neutral => &self.neutral,
            Sentiment::Negative => &self.negative,
        }
    }
}

// --- Endpoint payloads ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IsAnalyzing {
    pub is_analyzing: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSummary {
    pub total_reviews: u64,
    pub sentiment_distribution: HashMap<String, u64>,
    pub avg_sentiment_score: f64,
    pub total_themes: u64,
    pub non_positive_themes: u64,
    pub top_negative_themes: Vec<ThemeCount>,
    pub top_positive_themes: Vec<ThemeCount>,
    pub daily_counts: HashMap<String, Vec<DailyCount>>,
}

impl DashboardSummary {
    pub fn sentiment_counts(&self) -> SentimentCounts {
        SentimentCounts::from_labels(&self.sentiment_distribution)
    }

    pub fn daily_series(&self) -> DailySeries {
        DailySeries::from_labels(&self.daily_counts)
    }

    /// True when no panel could draw anything from this summary.
    pub fn is_empty(&self) -> bool {
        self.total_reviews == 0
            && self.sentiment_counts().sum() == 0
            && self.top_negative_themes.is_empty()
            && self.top_positive_themes.is_empty()
            && self.daily_series().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefSummary {
    pub total_reviews: u64,
    pub avg_sentiment_score: f64,
    pub top_negative_themes: Vec<ThemeCount>,
    pub top_positive_themes: Vec<ThemeCount>,
    pub positive_themes: u64,
    pub negative_themes: u64,
    pub neutral_themes: u64,
}

impl BriefSummary {
    pub fn theme_counts(&self) -> SentimentCounts {
        SentimentCounts::new(self.positive_themes, self.neutral_themes, self.negative_themes)
    }

    pub fn is_empty(&self) -> bool {
        self.total_reviews == 0
            && self.top_negative_themes.is_empty()
            && self.top_positive_themes.is_empty()
            && self.theme_counts().sum() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    #[default]
    Low,
}

impl Priority {
    pub fn from_rank(rank: i64) -> Self {
        match rank {
            i64::MIN..=1 => Priority::High,
            2 => Priority::Medium,
            _ => Priority::Low,
        }
    }

    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if let Ok(rank) = label.parse::<i64>() {
            return Self::from_rank(rank);
        }
        match label.as_str() {
            "high" | "высокий" => Priority::High,
            "medium" | "средний" => Priority::Medium,
            _ => Priority::Low,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Priority::High => "High priority",
            Priority::Medium => "Medium priority",
            Priority::Low => "Low priority",
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Rank(i64),
            Label(String),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Rank(rank)) => Priority::from_rank(rank),
            Some(Raw::Label(label)) => Priority::from_label(&label),
            None => Priority::default(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackItem {
    pub prio: Priority,
    pub problem: String,
    pub proposal_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackReport {
    pub feedback_analysis: Vec<FeedbackItem>,
    pub overall_proposals: Vec<String>,
}

impl FeedbackReport {
    pub fn is_empty(&self) -> bool {
        self.feedback_analysis.is_empty() && self.overall_proposals.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchId {
    Number(i64),
    Text(String),
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchId::Number(n) => write!(f, "{}", n),
            BatchId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportBatch {
    pub id: Option<BatchId>,
    #[serde(alias = "source")]
    pub source_type: Option<String>,
    #[serde(alias = "created")]
    pub created_at: Option<String>,
}

impl ImportBatch {
    pub fn display_line(&self) -> String {
        let id = self
            .id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "—".to_string());
        let source = self.source_type.as_deref().unwrap_or("csv");
        let created = self.created_at.as_deref().unwrap_or("");
        format!("Batch #{} ({}) {}", id, source, created)
            .trim_end()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LastImports {
    pub batches: Vec<ImportBatch>,
}

impl LastImports {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportReceipt {
    pub status: Option<String>,
    pub imported_count: Option<u64>,
    pub batch_id: Option<BatchId>,
}

// --- Request parameters ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub product_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub source: String,
    pub delimiter: String,
    pub encoding: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            source: "csv".to_string(),
            delimiter: ",".to_string(),
            encoding: "utf-8".to_string(),
        }
    }
}
