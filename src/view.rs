//! Per-page view models assembled from a page session.

use crate::charts::{
    self, RankedTopic, SentimentSlice, TimelinePoint, build_sentiment_distribution,
    build_sentiment_timeline, build_topic_ranking,
};
use crate::fallback::{self, DataSource, Sourced, choose, choose_list};
use crate::loader::{LoadPhase, PageSession};
use crate::models::{
    BriefSummary, DashboardSummary, FeedbackReport, LastImports, Priority, SummaryQuery, ThemeCount,
};

pub const PLACEHOLDER: &str = "—";
pub const ANALYZING_NOTICE: &str =
    "Analysis in progress, please wait. Data will be available once it finishes.";

#[derive(Debug, Clone, PartialEq)]
pub struct StatCard {
    pub label: &'static str,
    pub value: String,
    pub note: &'static str,
}

// --- Overview ---

pub struct WorkflowStep {
    pub number: u8,
    pub title: &'static str,
    pub description: &'static str,
}

pub const OVERVIEW_STATS: [(&str, &str); 4] = [
    ("Reviews analysed", "50K+"),
    ("Accuracy", "94%"),
    ("Processing time", "2.3s avg"),
    ("Supported languages", "42"),
];

pub const WORKFLOW: [WorkflowStep; 3] = [
    WorkflowStep {
        number: 1,
        title: "Import and manage reviews",
        description: "Collect customer reviews from CSV files, APIs and web forms. Data is cleaned and prepared automatically.",
    },
    WorkflowStep {
        number: 2,
        title: "Analyse sentiment and themes",
        description: "Find out what customers really think: sentiment, themes, trends, complaints and positives.",
    },
    WorkflowStep {
        number: 3,
        title: "Get recommendations",
        description: "Turn insights into actions with AI recommendations and reports.",
    },
];

pub const FEATURES: [(&str, &str); 3] = [
    ("Fast processing", "Analyse thousands of reviews in seconds"),
    ("AI insights", "Recommendations driven by customer sentiment and trends"),
    ("Track progress", "Follow improvements over time with dashboards and metrics"),
];

// --- Analysis ---

#[derive(Debug, Clone)]
pub struct AnalysisView {
    pub analyzing: bool,
    pub stats: Vec<StatCard>,
    pub stats_source: DataSource,
    pub slices: Sourced<Vec<SentimentSlice>>,
    pub timeline: Sourced<Vec<TimelinePoint>>,
    pub topics: Sourced<Vec<RankedTopic>>,
    pub complaints: Sourced<Vec<String>>,
    pub strengths: Sourced<Vec<String>>,
    pub errors: Vec<String>,
}

fn summary_slices(summary: &DashboardSummary) -> Vec<SentimentSlice> {
    let counts = summary.sentiment_counts();
    if charts::effective_total(&counts, Some(summary.total_reviews)) == 0 {
        return Vec::new();
    }
    build_sentiment_distribution(&counts, Some(summary.total_reviews))
}

fn topic_names(themes: &[ThemeCount]) -> Vec<String> {
    themes.iter().map(|t| t.topic.clone()).collect()
}

fn blank<T>() -> Sourced<Vec<T>> {
    Sourced { value: Vec::new(), source: DataSource::Live }
}

fn score_text(score: f64) -> String {
    format!("{:.1}/5.0", score)
}

impl AnalysisView {
    pub fn from_session(session: &PageSession) -> Self {
        if session.phase.is_analyzing() {
            return Self::analyzing();
        }
        Self::build(
            session.live.summary.as_ref(),
            session.last_known.summary.as_ref(),
            session.errors.clone(),
        )
    }

    /// Every metric is a placeholder and no chart data is shown.
    pub fn analyzing() -> Self {
        Self {
            analyzing: true,
            stats: Self::stat_cards(None),
            stats_source: DataSource::Live,
            slices: blank(),
            timeline: blank(),
            topics: blank(),
            complaints: blank(),
            strengths: blank(),
            errors: Vec::new(),
        }
    }

    pub fn build(
        live: Option<&DashboardSummary>,
        last_known: Option<&DashboardSummary>,
        errors: Vec<String>,
    ) -> Self {
        let stats = choose(
            live.map(|s| Self::stat_cards(Some(s))),
            last_known.map(|s| Self::stat_cards(Some(s))),
            Self::sample_stat_cards,
            |_| false,
        );

        Self {
            analyzing: false,
            stats: stats.value,
            stats_source: stats.source,
            slices: choose_list(
                live.map(summary_slices),
                last_known.map(summary_slices),
                fallback::sentiment_slices,
            ),
            timeline: choose_list(
                live.map(|s| build_sentiment_timeline(&s.daily_series())),
                last_known.map(|s| build_sentiment_timeline(&s.daily_series())),
                fallback::sentiment_timeline,
            ),
            topics: choose_list(
                live.map(|s| build_topic_ranking(&s.top_positive_themes, &s.top_negative_themes)),
                last_known.map(|s| build_topic_ranking(&s.top_positive_themes, &s.top_negative_themes)),
                fallback::topics,
            ),
            complaints: choose_list(
                live.map(|s| topic_names(&s.top_negative_themes)),
                last_known.map(|s| topic_names(&s.top_negative_themes)),
                fallback::complaints,
            ),
            strengths: choose_list(
                live.map(|s| topic_names(&s.top_positive_themes)),
                last_known.map(|s| topic_names(&s.top_positive_themes)),
                fallback::positive_aspects,
            ),
            errors,
        }
    }

    fn stat_cards(summary: Option<&DashboardSummary>) -> Vec<StatCard> {
        [
            ("Total reviews", summary.map(|s| s.total_reviews.to_string()), "in the selected range"),
            ("Average sentiment", summary.map(|s| score_text(s.avg_sentiment_score)), "1 = negative, 5 = positive"),
            ("Key themes", summary.map(|s| s.total_themes.to_string()), "themes detected"),
            ("Critical issues", summary.map(|s| s.non_positive_themes.to_string()), "need attention"),
        ]
        .into_iter()
        .map(|(label, value, note)| StatCard {
            label,
            value: value.unwrap_or_else(|| PLACEHOLDER.to_string()),
            note,
        })
        .collect()
    }

    fn sample_stat_cards() -> Vec<StatCard> {
        let stats = &fallback::SAMPLE_STATS;
        let mut cards = Self::stat_cards(None);
        cards[0].value = stats.total_reviews.to_string();
        cards[1].value = score_text(stats.avg_sentiment_score);
        cards[2].value = stats.total_themes.to_string();
        cards[3].value = stats.critical_issues.to_string();
        cards
    }
}

// --- Reports ---

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutiveSummary {
    pub timeframe: String,
    pub total_reviews: String,
    pub avg_rating: String,
    pub challenges: Vec<String>,
    pub strengths: Vec<String>,
}

impl ExecutiveSummary {
    fn placeholder(timeframe: String) -> Self {
        Self {
            timeframe,
            total_reviews: PLACEHOLDER.to_string(),
            avg_rating: PLACEHOLDER.to_string(),
            challenges: Vec::new(),
            strengths: Vec::new(),
        }
    }

    fn from_brief(brief: &BriefSummary, timeframe: String) -> Self {
        Self {
            timeframe,
            total_reviews: brief.total_reviews.to_string(),
            avg_rating: score_text(brief.avg_sentiment_score),
            challenges: brief
                .top_negative_themes
                .iter()
                .map(|t| format!("{} ({} mentions)", t.topic, t.count))
                .collect(),
            strengths: topic_names(&brief.top_positive_themes),
        }
    }
}

fn brief_is_empty(brief: &BriefSummary) -> bool {
    brief.total_reviews == 0
        && brief.top_negative_themes.is_empty()
        && brief.top_positive_themes.is_empty()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub impact: Option<String>,
    pub effort: Option<String>,
}

fn report_recommendations(report: &FeedbackReport) -> Vec<Recommendation> {
    report
        .feedback_analysis
        .iter()
        .map(|item| Recommendation {
            priority: item.prio,
            title: item.problem.clone(),
            description: item.proposal_text.clone(),
            impact: None,
            effort: None,
        })
        .collect()
}

fn brief_health(brief: &BriefSummary) -> Vec<SentimentSlice> {
    let counts = brief.theme_counts();
    if counts.sum() == 0 {
        return Vec::new();
    }
    build_sentiment_distribution(&counts, None)
}

#[derive(Debug, Clone)]
pub struct ReportsView {
    pub analyzing: bool,
    pub summary: Sourced<ExecutiveSummary>,
    pub sentiment_health: Sourced<Vec<SentimentSlice>>,
    pub recommendations: Sourced<Vec<Recommendation>>,
    pub next_steps: Sourced<Vec<String>>,
    pub errors: Vec<String>,
}

pub fn timeframe(query: &SummaryQuery) -> String {
    format!(
        "{} - {}",
        query.start_date.format("%B %-d, %Y"),
        query.end_date.format("%B %-d, %Y")
    )
}

impl ReportsView {
    pub fn from_session(session: &PageSession, query: &SummaryQuery) -> Self {
        if session.phase.is_analyzing() {
            return Self::analyzing(query);
        }
        Self::build(
            session.live.brief.as_ref(),
            session.last_known.brief.as_ref(),
            session.live.feedback_report.as_ref(),
            session.last_known.feedback_report.as_ref(),
            query,
            session.errors.clone(),
        )
    }

    pub fn analyzing(query: &SummaryQuery) -> Self {
        Self {
            analyzing: true,
            summary: Sourced {
                value: ExecutiveSummary::placeholder(timeframe(query)),
                source: DataSource::Live,
            },
            sentiment_health: blank(),
            recommendations: blank(),
            next_steps: blank(),
            errors: Vec::new(),
        }
    }

    pub fn build(
        live_brief: Option<&BriefSummary>,
        last_brief: Option<&BriefSummary>,
        live_report: Option<&FeedbackReport>,
        last_report: Option<&FeedbackReport>,
        query: &SummaryQuery,
        errors: Vec<String>,
    ) -> Self {
        let range = timeframe(query);
        let summary = choose(
            live_brief.filter(|b| !brief_is_empty(b)).map(|b| ExecutiveSummary::from_brief(b, range.clone())),
            last_brief.filter(|b| !brief_is_empty(b)).map(|b| ExecutiveSummary::from_brief(b, range.clone())),
            fallback::executive_summary,
            |_| false,
        );

        Self {
            analyzing: false,
            summary,
            sentiment_health: choose_list(
                live_brief.map(brief_health),
                last_brief.map(brief_health),
                fallback::sentiment_slices,
            ),
            recommendations: choose_list(
                live_report.map(report_recommendations),
                last_report.map(report_recommendations),
                fallback::recommendations,
            ),
            next_steps: choose_list(
                live_report.map(|r| r.overall_proposals.clone()),
                last_report.map(|r| r.overall_proposals.clone()),
                fallback::next_steps,
            ),
            errors,
        }
    }
}

// --- Import ---

#[derive(Debug, Clone)]
pub struct ImportView {
    pub busy: bool,
    pub batches: Sourced<Vec<String>>,
    pub errors: Vec<String>,
}

impl ImportView {
    /// No sample data here: an empty history is shown as empty.
    pub fn from_session(session: &PageSession) -> Self {
        let lines = |imports: &LastImports| {
            imports.batches.iter().map(|b| b.display_line()).collect::<Vec<_>>()
        };
        Self {
            busy: session.phase.is_busy() || session.phase == LoadPhase::Unknown,
            batches: choose_list(
                session.live.last_imports.as_ref().map(lines),
                session.last_known.last_imports.as_ref().map(lines),
                Vec::new,
            ),
            errors: session.errors.clone(),
        }
    }
}
