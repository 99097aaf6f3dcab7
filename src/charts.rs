//! Chart-ready view models derived from backend summaries.
//!
//! Every builder is a pure function: it takes borrowed backend data and
//! returns a fresh value. Nothing here talks to the network.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{DailyCount, DailySeries, Sentiment, SentimentCounts, ThemeCount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSlice {
    pub name: String,
    /// Percentage of the effective total, 0-100 when counts fit the total.
    pub value: u32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: String,
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicPolarity {
    Positive,
    Negative,
    /// Only present in sample data; never derived from backend lists.
    Mixed,
}

impl TopicPolarity {
    pub fn display_name(self) -> &'static str {
        match self {
            TopicPolarity::Positive => "positive",
            TopicPolarity::Negative => "negative",
            TopicPolarity::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedTopic {
    pub name: String,
    pub count: u64,
    pub sentiment: TopicPolarity,
}

/// Falls back to the sum of the counts when `total` is absent or zero.
pub fn effective_total(counts: &SentimentCounts, total: Option<u64>) -> u64 {
    total.filter(|t| *t > 0).unwrap_or_else(|| counts.sum())
}

/// One slice per category in fixed order (positive, neutral, negative).
///
/// Each percentage is rounded on its own; the three values are not corrected
/// to add up to 100.
pub fn build_sentiment_distribution(
    counts: &SentimentCounts,
    total: Option<u64>,
) -> Vec<SentimentSlice> {
    let total = effective_total(counts, total);

    Sentiment::ALL
        .iter()
        .map(|&sentiment| {
            let value = if total > 0 {
                (counts.get(sentiment) as f64 / total as f64 * 100.0).round() as u32
            } else {
                0
            };
            SentimentSlice {
                name: sentiment.display_name().to_string(),
                value,
                color: sentiment.color().to_string(),
            }
        })
        .collect()
}

/// One point per distinct date across all three series, ascending.
///
/// Dates are `YYYY-MM-DD`, so ordering the strings orders the days.
pub fn build_sentiment_timeline(series: &DailySeries) -> Vec<TimelinePoint> {
    let dates: BTreeSet<&str> = Sentiment::ALL
        .iter()
        .flat_map(|&s| series.get(s).iter().map(|point| point.date.as_str()))
        .collect();

    dates
        .into_iter()
        .map(|date| TimelinePoint {
            date: date.to_string(),
            positive: count_on(series.get(Sentiment::Positive), date),
            neutral: count_on(series.get(Sentiment::Neutral), date),
            negative: count_on(series.get(Sentiment::Negative), date),
        })
        .collect()
}

fn count_on(points: &[DailyCount], date: &str) -> u64 {
    points
        .iter()
        .find(|point| point.date == date)
        .map(|point| point.count)
        .unwrap_or(0)
}

/// Positive themes then negative themes, tagged and sorted by count descending.
/// Equal counts keep their concatenation order.
pub fn build_topic_ranking(positive: &[ThemeCount], negative: &[ThemeCount]) -> Vec<RankedTopic> {
    let tag = |themes: &[ThemeCount], sentiment: TopicPolarity| {
        themes
            .iter()
            .map(|theme| RankedTopic {
                name: theme.topic.clone(),
                count: theme.count,
                sentiment,
            })
            .collect::<Vec<_>>()
    };

    let mut ranked = tag(positive, TopicPolarity::Positive);
    ranked.extend(tag(negative, TopicPolarity::Negative));
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str, count: u64) -> DailyCount {
        DailyCount { date: date.to_string(), count }
    }

    fn theme(topic: &str, count: u64) -> ThemeCount {
        ThemeCount { topic: topic.to_string(), count }
    }

    #[test]
    fn test_distribution_example() {
        let slices = build_sentiment_distribution(&SentimentCounts::new(45, 30, 25), None);
        let pairs: Vec<(&str, u32)> = slices.iter().map(|s| (s.name.as_str(), s.value)).collect();
        assert_eq!(pairs, vec![("Positive", 45), ("Neutral", 30), ("Negative", 25)]);
        assert_eq!(slices[0].color, "#00b4d8");
    }

    #[test]
    fn test_distribution_uses_supplied_total() {
        // 200 reviews, only 100 of them classified
        let slices = build_sentiment_distribution(&SentimentCounts::new(50, 30, 20), Some(200));
        let values: Vec<u32> = slices.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![25, 15, 10]);
    }

    #[test]
    fn test_distribution_zero_total_is_all_zero() {
        let slices = build_sentiment_distribution(&SentimentCounts::default(), None);
        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(|s| s.value == 0));

        // A zero supplied total falls back to the sum, which is zero too.
        let slices = build_sentiment_distribution(&SentimentCounts::default(), Some(0));
        assert!(slices.iter().all(|s| s.value == 0));
    }

    #[test]
    fn test_distribution_zero_supplied_total_uses_sum() {
        let slices = build_sentiment_distribution(&SentimentCounts::new(1, 1, 2), Some(0));
        let values: Vec<u32> = slices.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![25, 25, 50]);
    }

    #[test]
    fn test_distribution_is_not_renormalized() {
        let slices = build_sentiment_distribution(&SentimentCounts::new(1, 1, 1), None);
        let values: Vec<u32> = slices.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![33, 33, 33]);
        assert_eq!(values.iter().sum::<u32>(), 99);

        let slices = build_sentiment_distribution(&SentimentCounts::new(1, 1, 0), Some(8));
        let values: Vec<u32> = slices.iter().map(|s| s.value).collect();
        // 12.5 rounds half up
        assert_eq!(values, vec![13, 13, 0]);
    }

    #[test]
    fn test_distribution_matches_rounding_formula() {
        let counts = SentimentCounts::new(320, 120, 100);
        let total = 540;
        let slices = build_sentiment_distribution(&counts, Some(total));
        for (slice, sentiment) in slices.iter().zip(Sentiment::ALL) {
            let expected = (counts.get(sentiment) as f64 / total as f64 * 100.0).round() as u32;
            assert_eq!(slice.value, expected);
        }
        assert_eq!(slices[0].value, 59);
        assert_eq!(slices[1].value, 22);
        assert_eq!(slices[2].value, 19);
    }

    #[test]
    fn test_timeline_example() {
        let series = DailySeries {
            positive: vec![day("2024-01-01", 3)],
            neutral: vec![],
            negative: vec![day("2024-01-02", 5)],
        };
        let timeline = build_sentiment_timeline(&series);
        assert_eq!(
            timeline,
            vec![
                TimelinePoint { date: "2024-01-01".into(), positive: 3, neutral: 0, negative: 0 },
                TimelinePoint { date: "2024-01-02".into(), positive: 0, neutral: 0, negative: 5 },
            ]
        );
    }

    #[test]
    fn test_timeline_unions_and_sorts_dates() {
        let series = DailySeries {
            positive: vec![day("2024-03-10", 1), day("2024-01-05", 2)],
            neutral: vec![day("2024-02-01", 4), day("2024-01-05", 7)],
            negative: vec![day("2024-03-10", 9)],
        };
        let timeline = build_sentiment_timeline(&series);
        let dates: Vec<&str> = timeline.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-05", "2024-02-01", "2024-03-10"]);

        assert_eq!(timeline[0].positive, 2);
        assert_eq!(timeline[0].neutral, 7);
        assert_eq!(timeline[0].negative, 0);
        assert_eq!(timeline[1].positive, 0);
        assert_eq!(timeline[1].neutral, 4);
        assert_eq!(timeline[2].positive, 1);
        assert_eq!(timeline[2].negative, 9);
    }

    #[test]
    fn test_timeline_empty_input() {
        assert!(build_sentiment_timeline(&DailySeries::default()).is_empty());
    }

    #[test]
    fn test_topic_ranking_example() {
        let ranked = build_topic_ranking(&[theme("A", 10)], &[theme("B", 20), theme("C", 5)]);
        assert_eq!(
            ranked,
            vec![
                RankedTopic { name: "B".into(), count: 20, sentiment: TopicPolarity::Negative },
                RankedTopic { name: "A".into(), count: 10, sentiment: TopicPolarity::Positive },
                RankedTopic { name: "C".into(), count: 5, sentiment: TopicPolarity::Negative },
            ]
        );
    }

    #[test]
    fn test_topic_ranking_ties_keep_positive_first() {
        let ranked = build_topic_ranking(
            &[theme("price", 8), theme("quality", 8)],
            &[theme("price", 8), theme("delivery", 12)],
        );
        let order: Vec<(&str, TopicPolarity)> =
            ranked.iter().map(|t| (t.name.as_str(), t.sentiment)).collect();
        assert_eq!(
            order,
            vec![
                ("delivery", TopicPolarity::Negative),
                ("price", TopicPolarity::Positive),
                ("quality", TopicPolarity::Positive),
                ("price", TopicPolarity::Negative),
            ]
        );
    }

    #[test]
    fn test_topic_ranking_length_order_and_tags() {
        let positive = vec![theme("a", 3), theme("b", 40), theme("c", 0)];
        let negative = vec![theme("d", 15), theme("e", 15)];
        let ranked = build_topic_ranking(&positive, &negative);

        assert_eq!(ranked.len(), positive.len() + negative.len());
        assert!(ranked.windows(2).all(|w| w[0].count >= w[1].count));
        for topic in &ranked {
            let from_positive = positive.iter().any(|t| t.topic == topic.name);
            let expected = if from_positive { TopicPolarity::Positive } else { TopicPolarity::Negative };
            assert_eq!(topic.sentiment, expected);
        }
    }

    #[test]
    fn test_topic_ranking_never_yields_mixed() {
        // Same topic on both sides stays as two separate entries.
        let ranked = build_topic_ranking(&[theme("delivery", 5)], &[theme("delivery", 5)]);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|t| t.sentiment != TopicPolarity::Mixed));
        assert!(build_topic_ranking(&[], &[]).is_empty());
    }
}
