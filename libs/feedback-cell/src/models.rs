// libs/feedback-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// RATING SCALE
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SatisfactionRating {
    VerySatisfied,
    Satisfied,
    Neutral,
    Dissatisfied,
    VeryDissatisfied,
}

impl SatisfactionRating {
    pub const ALL: [SatisfactionRating; 5] = [
        SatisfactionRating::VerySatisfied,
        SatisfactionRating::Satisfied,
        SatisfactionRating::Neutral,
        SatisfactionRating::Dissatisfied,
        SatisfactionRating::VeryDissatisfied,
    ];

    /// Fixed position of the rating on the [-1, 1] sentiment axis.
    pub fn base_score(&self) -> f64 {
        match self {
            SatisfactionRating::VerySatisfied => 1.0,
            SatisfactionRating::Satisfied => 0.5,
            SatisfactionRating::Neutral => 0.0,
            SatisfactionRating::Dissatisfied => -0.5,
            SatisfactionRating::VeryDissatisfied => -1.0,
        }
    }
}

impl fmt::Display for SatisfactionRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SatisfactionRating::VerySatisfied => write!(f, "VERY_SATISFIED"),
            SatisfactionRating::Satisfied => write!(f, "SATISFIED"),
            SatisfactionRating::Neutral => write!(f, "NEUTRAL"),
            SatisfactionRating::Dissatisfied => write!(f, "DISSATISFIED"),
            SatisfactionRating::VeryDissatisfied => write!(f, "VERY_DISSATISFIED"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentimentCategory {
    VeryNegative,
    Negative,
    Neutral,
    Positive,
    VeryPositive,
}

impl SentimentCategory {
    pub const ALL: [SentimentCategory; 5] = [
        SentimentCategory::VeryNegative,
        SentimentCategory::Negative,
        SentimentCategory::Neutral,
        SentimentCategory::Positive,
        SentimentCategory::VeryPositive,
    ];

    /// Bands are closed on their upper end: -0.6 is VERY_NEGATIVE, 0.6 is POSITIVE.
    pub fn from_score(score: f64) -> Self {
        if score <= -0.6 {
            SentimentCategory::VeryNegative
        } else if score <= -0.2 {
            SentimentCategory::Negative
        } else if score <= 0.2 {
            SentimentCategory::Neutral
        } else if score <= 0.6 {
            SentimentCategory::Positive
        } else {
            SentimentCategory::VeryPositive
        }
    }
}

impl fmt::Display for SentimentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentCategory::VeryNegative => write!(f, "VERY_NEGATIVE"),
            SentimentCategory::Negative => write!(f, "NEGATIVE"),
            SentimentCategory::Neutral => write!(f, "NEUTRAL"),
            SentimentCategory::Positive => write!(f, "POSITIVE"),
            SentimentCategory::VeryPositive => write!(f, "VERY_POSITIVE"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeedbackScore {
    pub score: f64,
    pub category: SentimentCategory,
}

// ==============================================================================
// STORED RATING
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub client_id: Uuid,
    pub rating: SatisfactionRating,
    pub comment: Option<String>,
    pub sentiment_score: f64,
    pub sentiment_category: SentimentCategory,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn has_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRatingRequest {
    pub rating: SatisfactionRating,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreFeedbackRequest {
    pub rating: SatisfactionRating,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackQuery {
    pub client_id: Option<Uuid>,
    pub rating: Option<SatisfactionRating>,
    pub sentiment_category: Option<SentimentCategory>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackSummary {
    pub total_ratings: usize,
    pub average_score: f64,
    pub average_category: Option<SentimentCategory>,
    pub by_category: BTreeMap<String, usize>,
    pub by_rating: BTreeMap<String, usize>,
    pub comment_rate: f64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("Rating not found")]
    NotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Only completed appointments can be rated")]
    AppointmentNotCompleted,

    #[error("Appointment has already been rated")]
    AlreadyRated,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
