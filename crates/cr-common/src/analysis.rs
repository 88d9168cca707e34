//! Prompt construction for the optional LLM career analysis.
//!
//! The engine only formats the prompt and keeps whatever text comes back; the
//! HTTP client lives in the API crate.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::CareerMatch;
use crate::profile::MiProfile;

pub const MAX_PROMPT_RECOMMENDATIONS: usize = 5;

pub const SYSTEM_PROMPT: &str = "Eres un asistente de orientación vocacional.";

pub fn build_career_analysis_prompt(
    mbti_code: &str,
    mi: &MiProfile,
    recommendations: &[CareerMatch],
) -> String {
    let mi_text = mi
        .ranked()
        .iter()
        .map(|(intelligence, score)| format!("- {}: {score:.2}", intelligence.as_ref()))
        .collect::<Vec<_>>()
        .join("\n");

    let mut rec_text = String::new();
    for (i, rec) in recommendations
        .iter()
        .take(MAX_PROMPT_RECOMMENDATIONS)
        .enumerate()
    {
        if i > 0 {
            rec_text.push('\n');
        }
        let _ = write!(
            rec_text,
            "- {}. {} ({}, {}): {:.2} match",
            i + 1,
            rec.nombre,
            rec.universidad,
            rec.ciudad,
            rec.match_score
        );
    }

    format!(
        "Actúa como un consejero vocacional experto. Basándote en el perfil de personalidad MBTI, \n\
las puntuaciones de inteligencias múltiples y las recomendaciones de carrera proporcionadas, \n\
genera un análisis detallado y personalizado explicando:\n\
\n\
1. Por qué estas carreras son adecuadas para este perfil específico\n\
2. Cómo las características del perfil MBTI se alinean con cada carrera recomendada\n\
3. Cómo las inteligencias múltiples del usuario se relacionan con las demandas de cada carrera\n\
4. Qué habilidades específicas podría desarrollar el usuario para tener éxito en estas carreras\n\
5. Oportunidades y desafíos potenciales que podría enfrentar en estos campos\n\
\n\
Perfil MBTI: {mbti_code}\n\
\n\
Inteligencias Múltiples (ordenadas de mayor a menor):\n\
{mi_text}\n\
\n\
Recomendaciones de Carrera:\n\
{rec_text}\n\
\n\
Proporciona un análisis detallado, personalizado y práctico que ayude al usuario a entender por qué estas \n\
carreras son compatibles con su perfil y cómo podría aprovechar sus fortalezas naturales.\n"
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis: String,
    pub raw_response: String,
}

impl AnalysisResult {
    pub fn from_response(raw: impl Into<String>) -> Self {
        let raw_response = raw.into();
        Self {
            analysis: raw_response.trim().to_string(),
            raw_response,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::profile::Intelligence;

    fn mi() -> MiProfile {
        let mut scores: BTreeMap<Intelligence, f64> =
            Intelligence::ALL.into_iter().map(|i| (i, 0.1)).collect();
        scores.insert(Intelligence::Nat, 0.9);
        scores.insert(Intelligence::Spa, 0.456);
        MiProfile::from_scores(scores).unwrap()
    }

    fn career(i: usize) -> CareerMatch {
        CareerMatch {
            nombre: format!("Carrera {i}"),
            universidad: "UNAM".into(),
            ciudad: "Ciudad de México".into(),
            match_score: 0.5,
        }
    }

    #[test]
    fn prompt_lists_intelligences_by_descending_score() {
        let prompt = build_career_analysis_prompt("INTJ", &mi(), &[]);

        assert!(prompt.contains("Perfil MBTI: INTJ\n"));
        let nat = prompt.find("- Nat: 0.90").unwrap();
        let spa = prompt.find("- Spa: 0.46").unwrap();
        let lin = prompt.find("- Lin: 0.10").unwrap();
        assert!(nat < spa && spa < lin);
    }

    #[test]
    fn prompt_caps_recommendations_at_five() {
        let careers: Vec<_> = (1..=7).map(career).collect();

        let prompt = build_career_analysis_prompt("ENFP", &mi(), &careers);

        assert!(prompt.contains("- 1. Carrera 1 (UNAM, Ciudad de México): 0.50 match"));
        assert!(prompt.contains("- 5. Carrera 5"));
        assert!(!prompt.contains("Carrera 6"));
    }

    #[test]
    fn response_is_trimmed_but_raw_text_kept() {
        let result = AnalysisResult::from_response("\n  Análisis listo.  \n");

        assert_eq!(result.analysis, "Análisis listo.");
        assert_eq!(result.raw_response, "\n  Análisis listo.  \n");
    }
}
