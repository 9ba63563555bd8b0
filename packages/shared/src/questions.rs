use async_trait::async_trait;

use crate::models::room::Question;

#[derive(Debug)]
pub enum QuestionProviderError {
    Unavailable(String),
    InvalidQuestionSet(String),
}

impl std::fmt::Display for QuestionProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionProviderError::Unavailable(msg) => {
                write!(f, "Question provider unavailable: {}", msg)
            }
            QuestionProviderError::InvalidQuestionSet(msg) => {
                write!(f, "Invalid question set: {}", msg)
            }
        }
    }
}

impl std::error::Error for QuestionProviderError {}

/// External question content source. The core treats prompt/option/answer
/// text as already validated and only checks structural invariants before
/// freezing the set on a room.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    async fn questions(
        &self,
        difficulty: &str,
        count: usize,
    ) -> Result<Vec<Question>, QuestionProviderError>;
}

/// Structural invariants: the requested count, a nonempty option list per
/// question, and exactly one option equal to the stored correct text (index
/// comparison between players is meaningless otherwise).
pub fn validate_question_set(
    questions: &[Question],
    expected_count: usize,
) -> Result<(), QuestionProviderError> {
    if questions.len() != expected_count {
        return Err(QuestionProviderError::InvalidQuestionSet(format!(
            "expected {} questions, got {}",
            expected_count,
            questions.len()
        )));
    }
    for question in questions {
        if question.options.is_empty() {
            return Err(QuestionProviderError::InvalidQuestionSet(format!(
                "question {} has no options",
                question.question_id
            )));
        }
        let matching = question
            .options
            .iter()
            .filter(|o| **o == question.correct_answer)
            .count();
        if matching != 1 {
            return Err(QuestionProviderError::InvalidQuestionSet(format!(
                "question {} has {} options matching the correct answer",
                question.question_id, matching
            )));
        }
    }
    Ok(())
}

/// Serves from a fixed pool; used by tests and local runs.
pub struct FixedQuestionProvider {
    pool: Vec<Question>,
}

impl FixedQuestionProvider {
    pub fn new(pool: Vec<Question>) -> Self {
        FixedQuestionProvider { pool }
    }

    /// A numbered placeholder pool large enough for any test room.
    pub fn with_placeholder_pool(size: usize) -> Self {
        let pool = (0..size)
            .map(|i| Question {
                question_id: format!("q{}", i),
                prompt: format!("Question {}", i + 1),
                options: vec![
                    "Option A".to_string(),
                    "Option B".to_string(),
                    "Option C".to_string(),
                    "Option D".to_string(),
                ],
                correct_answer: "Option B".to_string(),
                explanation: format!("Option B is correct for question {}", i + 1),
                image_ref: String::new(),
            })
            .collect();
        FixedQuestionProvider { pool }
    }
}

#[async_trait]
impl QuestionProvider for FixedQuestionProvider {
    async fn questions(
        &self,
        _difficulty: &str,
        count: usize,
    ) -> Result<Vec<Question>, QuestionProviderError> {
        if self.pool.len() < count {
            return Err(QuestionProviderError::Unavailable(format!(
                "pool holds {} questions, {} requested",
                self.pool.len(),
                count
            )));
        }
        Ok(self.pool[..count].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_provider_returns_requested_count() {
        let provider = FixedQuestionProvider::with_placeholder_pool(10);
        let questions = provider.questions("medium", 5).await.unwrap();
        assert_eq!(questions.len(), 5);
        validate_question_set(&questions, 5).unwrap();
    }

    #[tokio::test]
    async fn fixed_provider_rejects_oversized_request() {
        let provider = FixedQuestionProvider::with_placeholder_pool(3);
        assert!(provider.questions("medium", 5).await.is_err());
    }

    #[test]
    fn validation_rejects_wrong_count() {
        let questions = FixedQuestionProvider::with_placeholder_pool(2).pool;
        assert!(validate_question_set(&questions, 3).is_err());
    }

    #[test]
    fn validation_rejects_empty_options() {
        let mut questions = FixedQuestionProvider::with_placeholder_pool(1).pool;
        questions[0].options.clear();
        assert!(validate_question_set(&questions, 1).is_err());
    }

    #[test]
    fn validation_requires_exactly_one_correct_option() {
        let mut questions = FixedQuestionProvider::with_placeholder_pool(1).pool;
        questions[0].options[0] = questions[0].correct_answer.clone();
        assert!(validate_question_set(&questions, 1).is_err());

        let mut absent = FixedQuestionProvider::with_placeholder_pool(1).pool;
        absent[0].correct_answer = "not an option".to_string();
        assert!(validate_question_set(&absent, 1).is_err());
    }
}
