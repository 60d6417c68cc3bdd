use thiserror::Error;

/// The error taxonomy from the system's external contract.
///
/// These are *kinds*, not exception class hierarchies: every boundary
/// (storage, RAG, agent runtime, service layer) maps its failures onto one
/// of these before it crosses a crate boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UserNotFound,
    CourseNotFound,
    ChapterNotFound,
    QuestionSetNotFound,
    BatchNotFound,
    BatchAlreadyFinished,
    ExamConfigUnsatisfiable,
    QuestionsUnavailable,
    NoMistakesToRetry,
    RagNotReady,
    EmbeddingUnavailable,
    LlmUnavailable,
    LlmRateLimited,
    LlmContextTooLarge,
    CollectionEmpty,
    ValidationError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::CourseNotFound => "COURSE_NOT_FOUND",
            ErrorCode::ChapterNotFound => "CHAPTER_NOT_FOUND",
            ErrorCode::QuestionSetNotFound => "QUESTION_SET_NOT_FOUND",
            ErrorCode::BatchNotFound => "BATCH_NOT_FOUND",
            ErrorCode::BatchAlreadyFinished => "BATCH_ALREADY_FINISHED",
            ErrorCode::ExamConfigUnsatisfiable => "EXAM_CONFIG_UNSATISFIABLE",
            ErrorCode::QuestionsUnavailable => "QUESTIONS_UNAVAILABLE",
            ErrorCode::NoMistakesToRetry => "NO_MISTAKES_TO_RETRY",
            ErrorCode::RagNotReady => "RAG_NOT_READY",
            ErrorCode::EmbeddingUnavailable => "EMBEDDING_UNAVAILABLE",
            ErrorCode::LlmUnavailable => "LLM_UNAVAILABLE",
            ErrorCode::LlmRateLimited => "LLM_RATE_LIMITED",
            ErrorCode::LlmContextTooLarge => "LLM_CONTEXT_TOO_LARGE",
            ErrorCode::CollectionEmpty => "COLLECTION_EMPTY",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core domain error: a stable code plus a human-readable message.
///
/// Propagation policy: surfaced verbatim to the caller boundary,
/// retried locally only for `LlmRateLimited` and transient embedding faults.
#[derive(Debug, Error, Clone)]
#[error("{code}: {message}")]
pub struct CoreError {
    pub code: ErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: ErrorCode, what: impl std::fmt::Display) -> Self {
        Self::new(code, format!("{what} not found"))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

macro_rules! ctor {
    ($name:ident, $code:ident) => {
        impl CoreError {
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ErrorCode::$code, message)
            }
        }
    };
}

ctor!(user_not_found, UserNotFound);
ctor!(course_not_found, CourseNotFound);
ctor!(chapter_not_found, ChapterNotFound);
ctor!(question_set_not_found, QuestionSetNotFound);
ctor!(batch_not_found, BatchNotFound);
ctor!(batch_already_finished, BatchAlreadyFinished);
ctor!(exam_config_unsatisfiable, ExamConfigUnsatisfiable);
ctor!(questions_unavailable, QuestionsUnavailable);
ctor!(no_mistakes_to_retry, NoMistakesToRetry);
ctor!(rag_not_ready, RagNotReady);
ctor!(embedding_unavailable, EmbeddingUnavailable);
ctor!(llm_unavailable, LlmUnavailable);
ctor!(llm_rate_limited, LlmRateLimited);
ctor!(llm_context_too_large, LlmContextTooLarge);
ctor!(collection_empty, CollectionEmpty);
ctor!(validation_error, ValidationError);
ctor!(internal_error, InternalError);

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::new(ErrorCode::InternalError, err.to_string())
    }
}
