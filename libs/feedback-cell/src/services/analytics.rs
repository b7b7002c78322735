// libs/feedback-cell/src/services/analytics.rs
use std::collections::BTreeMap;

use tracing::debug;

use shared_config::AppConfig;

use crate::models::{
    FeedbackError, FeedbackQuery, FeedbackSummary, Rating, SatisfactionRating, SentimentCategory,
};
use crate::services::feedback::FeedbackService;

pub struct FeedbackAnalyticsService {
    feedback_service: FeedbackService,
}

impl FeedbackAnalyticsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            feedback_service: FeedbackService::new(config),
        }
    }

    pub async fn get_summary(
        &self,
        query: &FeedbackQuery,
        auth_token: &str,
    ) -> Result<FeedbackSummary, FeedbackError> {
        let ratings = self.feedback_service.list_ratings(query, auth_token).await?;
        debug!("Summarizing {} ratings", ratings.len());
        Ok(summarize(&ratings))
    }
}

/// Aggregate stored ratings. Every category and rating label appears in the
/// distributions, with zero counts when absent.
pub fn summarize(ratings: &[Rating]) -> FeedbackSummary {
    let mut by_category: BTreeMap<String, usize> = SentimentCategory::ALL
        .iter()
        .map(|c| (c.to_string(), 0))
        .collect();
    let mut by_rating: BTreeMap<String, usize> = SatisfactionRating::ALL
        .iter()
        .map(|r| (r.to_string(), 0))
        .collect();

    for rating in ratings {
        *by_category.entry(rating.sentiment_category.to_string()).or_default() += 1;
        *by_rating.entry(rating.rating.to_string()).or_default() += 1;
    }

    let total_ratings = ratings.len();
    let (average_score, average_category, comment_rate) = if total_ratings == 0 {
        (0.0, None, 0.0)
    } else {
        let average = ratings.iter().map(|r| r.sentiment_score).sum::<f64>() / total_ratings as f64;
        let with_comment = ratings.iter().filter(|r| r.has_comment()).count();
        (
            average,
            Some(SentimentCategory::from_score(average)),
            with_comment as f64 / total_ratings as f64,
        )
    };

    FeedbackSummary {
        total_ratings,
        average_score,
        average_category,
        by_category,
        by_rating,
        comment_rate,
    }
}
