// libs/feedback-cell/src/services/sentiment.rs
use tracing::debug;
use vader_sentiment::SentimentIntensityAnalyzer;

/// Polarity of free text on the [-1, 1] axis.
pub trait SentimentAnalyzer {
    /// 0.0 when nothing in `text` carries sentiment.
    fn compound(&self, text: &str) -> f64;
}

/// VADER compound score over the full VADER lexicon.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaderAnalyzer;

impl VaderAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl SentimentAnalyzer for VaderAnalyzer {
    fn compound(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }

        let analyzer = SentimentIntensityAnalyzer::new();
        let scores = analyzer.polarity_scores(text);
        let compound = scores.get("compound").copied().unwrap_or(0.0).clamp(-1.0, 1.0);

        debug!("Sentiment compound {:.4} for {} chars", compound, text.len());
        compound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str) -> f64 {
        VaderAnalyzer::new().compound(text)
    }

    fn assert_close(text: &str, expected: f64) {
        let actual = score(text);
        assert!((actual - expected).abs() < 1e-3, "{:?}: expected {}, got {}", text, expected, actual);
    }

    #[test]
    fn test_reference_compound_scores() {
        assert_close("good", 0.4404);
        assert_close("excellent", 0.5719);
        assert_close("The book was good.", 0.4404);
        assert_close("VADER is smart, handsome, and funny.", 0.8316);
        assert_close("A really bad, horrible book.", -0.8211);
    }

    #[test]
    fn test_text_without_sentiment_scores_zero() {
        assert_eq!(score(""), 0.0);
        assert_eq!(score("   "), 0.0);
        assert_eq!(score("The appointment was on Tuesday at ten"), 0.0);
    }

    #[test]
    fn test_everyday_feedback_words_carry_sentiment() {
        assert!(score("disgusting") < -0.2);
        assert!(score("The dentist was horrendous") < -0.2);
        assert!(score("unacceptable wait") < -0.2);
        assert!(score("The staff were amazing") > 0.2);
    }

    #[test]
    fn test_negation_and_emphasis() {
        assert!(score("not good") < 0.0);
        assert!(score("very good") > score("good"));
        assert!(score("good!!!") > score("good"));
        assert!(score("The staff were GREAT") > score("The staff were great"));
        assert!(score("The room was nice but the wait was terrible") < 0.0);
    }

    #[test]
    fn test_score_stays_in_range() {
        let glowing = "amazing wonderful excellent perfect superb fantastic great best love ".repeat(10);
        let scathing = "terrible awful horrible worst rude hate disgusting dreadful ".repeat(10);
        let high = score(&format!("{}!!!!", glowing));
        let low = score(&format!("{}!!!!", scathing));
        assert!(high > 0.99 && high <= 1.0);
        assert!(low < -0.99 && low >= -1.0);
    }
}
