pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::*;
pub use router::feedback_routes;
pub use services::scorer::FeedbackScorer;
pub use services::sentiment::{SentimentAnalyzer, VaderAnalyzer};
