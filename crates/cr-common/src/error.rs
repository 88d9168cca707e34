use thiserror::Error;

/// Caller-supplied data that cannot be turned into a profile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("unknown MBTI dimension: {0}")]
    UnknownDimension(String),
    #[error("choice '{choice}' is not a pole of dimension {dimension}")]
    InvalidChoice { dimension: String, choice: String },
    #[error("weight {weight} of question {question_id} must be finite and within [0, 1]")]
    AnswerWeightOutOfRange { question_id: i64, weight: f64 },
    #[error("weight {weight} of dimension {dimension} must be finite and within [0, 1]")]
    DimensionWeightOutOfRange { dimension: String, weight: f64 },
    #[error("missing weight for dimension {0}")]
    MissingWeight(String),
    #[error("unknown intelligence type: {0}")]
    UnknownIntelligence(String),
    #[error("score {score} of intelligence {intelligence} is not usable")]
    InvalidScore { intelligence: String, score: f64 },
    #[error("invalid MBTI code: {0}")]
    InvalidCode(String),
    #[error("invalid MBTI vector: {0:?}")]
    InvalidVector(Vec<i64>),
    #[error("MBTI code {code} does not agree with vector {vector:?}")]
    CodeVectorMismatch { code: String, vector: Vec<i64> },
}

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("no predictor produced a recommendation: {0}")]
    NoPrediction(String),
}
