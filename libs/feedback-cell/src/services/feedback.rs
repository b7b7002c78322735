// libs/feedback-cell/src/services/feedback.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use appointment_cell::{AppointmentError, AppointmentStatus};
use appointment_cell::services::booking::AppointmentBookingService;
use shared_config::AppConfig;
use shared_database::supabase::{is_conflict, SupabaseClient};

use crate::models::{
    FeedbackError, FeedbackQuery, FeedbackScore, Rating, SatisfactionRating, SubmitRatingRequest,
};
use crate::services::scorer::FeedbackScorer;

pub const MAX_COMMENT_LENGTH: usize = 2000;

pub struct FeedbackService {
    supabase: Arc<SupabaseClient>,
    booking_service: AppointmentBookingService,
    scorer: FeedbackScorer,
}

impl FeedbackService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            booking_service: AppointmentBookingService::new(config),
            scorer: FeedbackScorer::new(),
        }
    }

    /// Score a rating without persisting anything.
    pub fn preview_score(
        &self,
        rating: SatisfactionRating,
        comment: Option<&str>,
    ) -> Result<FeedbackScore, FeedbackError> {
        let comment = normalize_comment(comment.map(str::to_string));
        validate_comment(comment.as_deref())?;
        Ok(self.scorer.score(rating, comment.as_deref()))
    }

    /// Rate a completed appointment. Each appointment takes a single rating.
    pub async fn submit_rating(
        &self,
        appointment_id: Uuid,
        request: SubmitRatingRequest,
        auth_token: &str,
    ) -> Result<Rating, FeedbackError> {
        info!("Submitting {} rating for appointment {}", request.rating, appointment_id);

        let comment = normalize_comment(request.comment);
        validate_comment(comment.as_deref())?;

        let appointment = self.booking_service.get_appointment(appointment_id, auth_token)
            .await
            .map_err(|e| match e {
                AppointmentError::NotFound => FeedbackError::AppointmentNotFound,
                other => FeedbackError::DatabaseError(other.to_string()),
            })?;

        if appointment.status != AppointmentStatus::Completed {
            warn!("Rating rejected: appointment {} is {}", appointment_id, appointment.status);
            return Err(FeedbackError::AppointmentNotCompleted);
        }

        if appointment.rating_id.is_some()
            || self.find_rating(appointment_id, auth_token).await?.is_some()
        {
            warn!("Appointment {} already has a rating", appointment_id);
            return Err(FeedbackError::AlreadyRated);
        }

        let feedback_score = self.scorer.score(request.rating, comment.as_deref());
        debug!("Computed sentiment {:.4} ({}) for appointment {}",
               feedback_score.score, feedback_score.category, appointment_id);

        let rating_data = json!({
            "appointment_id": appointment_id,
            "client_id": appointment.client_id,
            "rating": request.rating,
            "comment": comment,
            "sentiment_score": feedback_score.score,
            "sentiment_category": feedback_score.category,
            "created_at": Utc::now().to_rfc3339(),
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/ratings",
            Some(auth_token),
            Some(rating_data),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| {
            if is_conflict(&e) {
                FeedbackError::AlreadyRated
            } else {
                FeedbackError::DatabaseError(e.to_string())
            }
        })?;

        let row = result.into_iter().next()
            .ok_or_else(|| FeedbackError::DatabaseError("Rating insert returned no rows".to_string()))?;
        let rating: Rating = serde_json::from_value(row)
            .map_err(|e| FeedbackError::DatabaseError(format!("Failed to parse rating: {}", e)))?;

        if let Err(e) = self.booking_service.attach_rating(appointment_id, rating.id, auth_token).await {
            error!("Failed to link rating {} to appointment {}: {}", rating.id, appointment_id, e);
            // Unlinked ratings would block a retry, so drop it
            self.delete_rating(rating.id, auth_token).await?;
            return Err(FeedbackError::DatabaseError(e.to_string()));
        }

        info!("Rating {} recorded for appointment {}", rating.id, appointment_id);
        Ok(rating)
    }

    pub async fn get_rating_for_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Rating, FeedbackError> {
        self.find_rating(appointment_id, auth_token)
            .await?
            .ok_or(FeedbackError::NotFound)
    }

    pub async fn list_ratings(
        &self,
        query: &FeedbackQuery,
        auth_token: &str,
    ) -> Result<Vec<Rating>, FeedbackError> {
        debug!("Listing ratings with filters: {:?}", query);

        let path = build_ratings_path(query);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| FeedbackError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Rating>, _>>()
            .map_err(|e| FeedbackError::DatabaseError(format!("Failed to parse ratings: {}", e)))
    }

    async fn delete_rating(&self, rating_id: Uuid, auth_token: &str) -> Result<(), FeedbackError> {
        warn!("Removing unlinked rating {}", rating_id);

        let path = format!("/rest/v1/ratings?id=eq.{}", rating_id);
        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| {
            error!("Rating {} left without an appointment link: {}", rating_id, e);
            FeedbackError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }

    async fn find_rating(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Rating>, FeedbackError> {
        let path = format!("/rest/v1/ratings?appointment_id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| FeedbackError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| FeedbackError::DatabaseError(format!("Failed to parse rating: {}", e)))
    }
}

fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn validate_comment(comment: Option<&str>) -> Result<(), FeedbackError> {
    match comment {
        Some(text) if text.chars().count() > MAX_COMMENT_LENGTH => Err(FeedbackError::ValidationError(
            format!("Comment cannot exceed {} characters", MAX_COMMENT_LENGTH),
        )),
        _ => Ok(()),
    }
}

fn build_ratings_path(query: &FeedbackQuery) -> String {
    let mut query_parts = Vec::new();

    if let Some(client_id) = query.client_id {
        query_parts.push(format!("client_id=eq.{}", client_id));
    }
    if let Some(rating) = query.rating {
        query_parts.push(format!("rating=eq.{}", rating));
    }
    if let Some(category) = query.sentiment_category {
        query_parts.push(format!("sentiment_category=eq.{}", category));
    }
    if let Some(from_date) = query.from_date {
        query_parts.push(format!("created_at=gte.{}", urlencoding::encode(&from_date.to_rfc3339())));
    }
    if let Some(to_date) = query.to_date {
        query_parts.push(format!("created_at=lte.{}", urlencoding::encode(&to_date.to_rfc3339())));
    }

    query_parts.push("order=created_at.desc".to_string());

    if let Some(limit) = query.limit {
        query_parts.push(format!("limit={}", limit));
    }
    if let Some(offset) = query.offset {
        query_parts.push(format!("offset={}", offset));
    }

    format!("/rest/v1/ratings?{}", query_parts.join("&"))
}
