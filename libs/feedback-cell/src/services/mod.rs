pub mod analytics;
pub mod feedback;
pub mod scorer;
pub mod sentiment;

pub use analytics::FeedbackAnalyticsService;
pub use feedback::FeedbackService;
pub use scorer::FeedbackScorer;
pub use sentiment::{SentimentAnalyzer, VaderAnalyzer};
