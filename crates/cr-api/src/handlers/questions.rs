use axum::{Json, extract::State};
use serde::Serialize;

use cr_common::profile::questions::{MbtiQuestion, MiQuestion};

use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct MbtiQuestions {
    pub mbti_questions: Vec<MbtiQuestion>,
}

#[derive(Debug, Serialize)]
pub struct MiQuestions {
    pub mi_questions: Vec<MiQuestion>,
}

pub async fn mbti(State(state): State<SharedState>) -> Json<MbtiQuestions> {
    Json(MbtiQuestions {
        mbti_questions: state.questions.mbti().to_vec(),
    })
}

pub async fn multiple_intelligence(State(state): State<SharedState>) -> Json<MiQuestions> {
    Json(MiQuestions {
        mi_questions: state.questions.mi().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use cr_common::profile::{Dimension, Intelligence};

    use super::*;
    use crate::test_state;

    #[tokio::test]
    async fn mbti_questions_cover_every_axis() {
        let Json(body) = mbti(State(test_state())).await;

        let axes: HashSet<Dimension> = body.mbti_questions.iter().map(|q| q.dimension).collect();
        assert_eq!(axes.len(), Dimension::ALL.len());
        assert!(body.mbti_questions.iter().all(|q| q.options.len() == 2));
    }

    #[tokio::test]
    async fn mi_questions_cover_every_intelligence() {
        let Json(body) = multiple_intelligence(State(test_state())).await;

        let kinds: HashSet<Intelligence> =
            body.mi_questions.iter().map(|q| q.intelligence_type).collect();
        assert_eq!(kinds.len(), Intelligence::ALL.len());
    }
}
