// libs/feedback-cell/src/services/scorer.rs
use crate::models::{FeedbackScore, SatisfactionRating, SentimentCategory};
use crate::services::sentiment::{SentimentAnalyzer, VaderAnalyzer};

pub const RATING_WEIGHT: f64 = 0.6;
pub const TEXT_WEIGHT: f64 = 0.4;

/// Blends the fixed rating score with the comment's text sentiment.
pub struct FeedbackScorer<A: SentimentAnalyzer = VaderAnalyzer> {
    analyzer: A,
}

impl Default for FeedbackScorer<VaderAnalyzer> {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackScorer<VaderAnalyzer> {
    pub fn new() -> Self {
        Self { analyzer: VaderAnalyzer::new() }
    }
}

impl<A: SentimentAnalyzer> FeedbackScorer<A> {
    pub fn with_analyzer(analyzer: A) -> Self {
        Self { analyzer }
    }

    /// A blank comment counts as no comment.
    pub fn score(&self, rating: SatisfactionRating, comment: Option<&str>) -> FeedbackScore {
        let base = rating.base_score();

        let score = match comment.map(str::trim).filter(|c| !c.is_empty()) {
            Some(text) => {
                let text_score = self.analyzer.compound(text).clamp(-1.0, 1.0);
                base * RATING_WEIGHT + text_score * TEXT_WEIGHT
            }
            None => base,
        };

        FeedbackScore {
            score,
            category: SentimentCategory::from_score(score),
        }
    }
}
