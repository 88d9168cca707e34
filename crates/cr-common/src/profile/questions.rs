//! Questionnaires served to clients. Answers to them feed [`MbtiScorer`] and
//! [`MiScorer`]: each MBTI option carries the letter sent back as
//! `user_choice`, each MI question is answered on a 1 to [`MI_ANSWER_SCALE`] scale.
//!
//! [`MbtiScorer`]: super::MbtiScorer
//! [`MiScorer`]: super::MiScorer

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::{Dimension, Intelligence};

pub const MBTI_QUESTIONS_FILE: &str = "mbti_questions.json";
pub const MI_QUESTIONS_FILE: &str = "mi_questions.json";
pub const MI_ANSWER_SCALE: u8 = 5;

const EMBEDDED_MBTI: &str = include_str!("../../assets/mbti_questions.json");
const EMBEDDED_MI: &str = include_str!("../../assets/mi_questions.json");

#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {bank} questions: {source}")]
    Parse {
        bank: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {bank} questions: {reason}")]
    Invalid { bank: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbtiOption {
    pub letter: char,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbtiQuestion {
    pub id: i64,
    pub dimension: Dimension,
    pub question: String,
    pub options: Vec<MbtiOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiQuestion {
    pub id: i64,
    pub intelligence_type: Intelligence,
    pub question: String,
}

/// Both questionnaires, validated so every axis and intelligence is asked about.
/// The default bank is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionBank {
    mbti: Vec<MbtiQuestion>,
    mi: Vec<MiQuestion>,
}

impl QuestionBank {
    /// The questionnaires compiled into the binary.
    pub fn embedded() -> Result<Self, QuestionBankError> {
        Self::parse(EMBEDDED_MBTI, EMBEDDED_MI)
    }

    /// Reads [`MBTI_QUESTIONS_FILE`] and [`MI_QUESTIONS_FILE`] from `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, QuestionBankError> {
        let dir = dir.as_ref();
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|source| QuestionBankError::Io { path, source })
        };

        let bank = Self::parse(&read(MBTI_QUESTIONS_FILE)?, &read(MI_QUESTIONS_FILE)?)?;
        info!(
            dir = %dir.display(),
            mbti = bank.mbti.len(),
            mi = bank.mi.len(),
            "loaded question banks"
        );
        Ok(bank)
    }

    pub fn parse(mbti: &str, mi: &str) -> Result<Self, QuestionBankError> {
        let mbti: Vec<MbtiQuestion> = serde_json::from_str(mbti)
            .map_err(|source| QuestionBankError::Parse { bank: "MBTI", source })?;
        let mi: Vec<MiQuestion> = serde_json::from_str(mi)
            .map_err(|source| QuestionBankError::Parse { bank: "MI", source })?;

        validate_mbti(&mbti)?;
        validate_mi(&mi)?;
        Ok(Self { mbti, mi })
    }

    pub fn mbti(&self) -> &[MbtiQuestion] {
        &self.mbti
    }

    pub fn mi(&self) -> &[MiQuestion] {
        &self.mi
    }
}

fn invalid(bank: &'static str, reason: String) -> QuestionBankError {
    QuestionBankError::Invalid { bank, reason }
}

fn validate_mbti(questions: &[MbtiQuestion]) -> Result<(), QuestionBankError> {
    let mut ids = HashSet::new();
    for question in questions {
        if !ids.insert(question.id) {
            return Err(invalid("MBTI", format!("duplicate id {}", question.id)));
        }
        let poles: HashSet<Option<u8>> = question
            .options
            .iter()
            .map(|option| question.dimension.pole_of(option.letter))
            .collect();
        if question.options.len() != 2 || poles != HashSet::from([Some(0), Some(1)]) {
            return Err(invalid(
                "MBTI",
                format!(
                    "question {} must offer one option per {} letter",
                    question.id,
                    question.dimension.as_ref()
                ),
            ));
        }
    }

    match Dimension::ALL
        .into_iter()
        .find(|dimension| !questions.iter().any(|q| q.dimension == *dimension))
    {
        Some(missing) => Err(invalid(
            "MBTI",
            format!("no question for {}", missing.as_ref()),
        )),
        None => Ok(()),
    }
}

fn validate_mi(questions: &[MiQuestion]) -> Result<(), QuestionBankError> {
    let mut ids = HashSet::new();
    if let Some(duplicate) = questions.iter().find(|q| !ids.insert(q.id)) {
        return Err(invalid("MI", format!("duplicate id {}", duplicate.id)));
    }

    match Intelligence::ALL
        .into_iter()
        .find(|intelligence| !questions.iter().any(|q| q.intelligence_type == *intelligence))
    {
        Some(missing) => Err(invalid("MI", format!("no question for {}", missing.as_ref()))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::profile::mi::DEFAULT_MAX_SCORE;
    use crate::profile::{MbtiAnswer, MbtiScorer, MiAnswer, MiScorer};

    #[test]
    fn embedded_banks_cover_every_axis_and_intelligence() {
        let bank = QuestionBank::embedded().unwrap();

        assert_eq!(bank.mbti().len(), 16);
        assert_eq!(bank.mi().len(), 16);
        assert!(bank.mbti().iter().all(|q| !q.question.is_empty()));
    }

    #[test]
    fn answering_second_options_scores_as_infp() {
        let bank = QuestionBank::embedded().unwrap();
        let answers: Vec<MbtiAnswer> = bank
            .mbti()
            .iter()
            .map(|q| MbtiAnswer {
                question_id: q.id,
                dimension: q.dimension.as_ref().to_string(),
                user_choice: q.options[1].letter.to_string(),
                weight: 1.0,
            })
            .collect();

        let profile = MbtiScorer.score(&answers).unwrap();

        assert_eq!(profile.code(), "INFP");
    }

    #[test]
    fn top_answers_fill_the_mi_scale() {
        let bank = QuestionBank::embedded().unwrap();
        let per_type = bank.mi().iter().fold(BTreeMap::new(), |mut acc, q| {
            *acc.entry(q.intelligence_type).or_insert(0u8) += MI_ANSWER_SCALE;
            acc
        });
        assert!(per_type.values().all(|max| f64::from(*max) == DEFAULT_MAX_SCORE));

        let answers: Vec<MiAnswer> = bank
            .mi()
            .iter()
            .map(|q| MiAnswer {
                intelligence_type: q.intelligence_type.as_ref().to_string(),
                score: f64::from(MI_ANSWER_SCALE),
            })
            .collect();
        let profile = MiScorer::default().score(&answers).unwrap();

        assert!(Intelligence::ALL.iter().all(|i| profile.get(*i) == 1.0));
    }

    #[test]
    fn option_letters_must_match_the_axis() {
        let mbti = r#"[{"id": 1, "dimension": "E/I", "question": "?", "options": [
            {"letter": "E", "text": "a"}, {"letter": "T", "text": "b"}]}]"#;

        let err = QuestionBank::parse(mbti, "[]").unwrap_err();

        assert!(matches!(err, QuestionBankError::Invalid { bank: "MBTI", .. }));
    }

    #[test]
    fn load_dir_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MBTI_QUESTIONS_FILE), EMBEDDED_MBTI).unwrap();

        assert!(matches!(
            QuestionBank::load_dir(dir.path()),
            Err(QuestionBankError::Io { .. })
        ));

        std::fs::write(dir.path().join(MI_QUESTIONS_FILE), EMBEDDED_MI).unwrap();
        assert_eq!(
            QuestionBank::load_dir(dir.path()).unwrap(),
            QuestionBank::embedded().unwrap()
        );
    }
}
