use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use lazy_static::lazy_static;
use siphasher::sip::SipHasher13;
use unicode_normalization::UnicodeNormalization;

use super::similarity::cosine_similarity;
use super::{
    PredictionInput, Predictor, PredictorError, RuleBasedPredictor, ScoredCareer,
    SupportsRuleBasedFallback, sort_descending,
};
use crate::catalog::CareerCatalog;
use crate::profile::{Dimension, Intelligence};

/// Sentinel for careers outside the requested location. Sits below the cosine range
/// so an in-location career with similarity -1.0 still outranks it.
pub const OUT_OF_LOCATION_SCORE: f64 = -2.0;
const STRONG_DIMENSION_THRESHOLD: f64 = 0.7;
const EXPANSION_WEIGHT: f32 = 0.8;

// Changing either seed changes every embedding; bump HashEmbedder::version too.
const HASH_SEED_K0: u64 = 0x0123_4567_89ab_cdef;
const HASH_SEED_K1: u64 = 0xfedc_ba98_7654_3210;

pub trait TextEmbedder: Send + Sync {
    fn name(&self) -> &'static str;

    fn version(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Vec<f32>;
}

pub fn create_embedder(name: &str, dimension: usize) -> Result<Arc<dyn TextEmbedder>, PredictorError> {
    if dimension == 0 {
        return Err(PredictorError::Unavailable(
            "embedding dimension must be positive".into(),
        ));
    }
    match name {
        "hash" => Ok(Arc::new(HashEmbedder::new(dimension))),
        other => Err(PredictorError::Unavailable(format!(
            "unknown text embedder: {other}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedToken {
    pub token: String,
    pub weight: f32,
}

impl WeightedToken {
    pub fn new(token: impl Into<String>, weight: f32) -> Self {
        Self {
            token: token.into(),
            weight,
        }
    }
}

lazy_static! {
    static ref STOPWORDS: Vec<&'static str> = vec![
        "para", "con", "que", "los", "las", "del", "una", "por", "como", "entre", "sus",
    ];

    /// Profile vocabulary (intelligence keys, MBTI letters) mapped onto words
    /// that appear in career descriptions.
    static ref PROFILE_LEXICON: HashMap<&'static str, &'static [&'static str]> = HashMap::from([
        ("lin", &["comunicacion", "documentacion", "investigacion"][..]),
        ("logmath", &["analisis", "datos", "estadistica", "programacion", "aprendizaje", "control"][..]),
        ("spa", &["diseno", "sistemas", "robotizados", "digitales"][..]),
        ("bodkin", &["mecanica", "electronica", "robotizados", "automatizados"][..]),
        ("mus", &["diseno", "experiencias"][..]),
        ("inter", &["usuario", "experiencias", "centradas", "salud"][..]),
        ("intra", &["investigacion", "soluciones", "analisis"][..]),
        ("nat", &["biologia", "ambiente", "ambientales", "sustentabilidad", "alimentos"][..]),
    ]);
}

fn letter_expansion(letter: char) -> &'static [&'static str] {
    match letter {
        'e' => &["usuario", "colaboracion"],
        'i' => &["investigacion"],
        's' => &["mecanica", "control"],
        'n' => &["tecnologia", "innovacion"],
        't' => &["analisis", "sistemas"],
        'f' => &["salud", "usuario"],
        'j' => &["control"],
        'p' => &["diseno"],
        _ => &[],
    }
}

fn is_mbti_code(token: &str) -> bool {
    let letters: Vec<char> = token.chars().collect();
    letters.len() == 4
        && Dimension::ALL
            .iter()
            .all(|d| d.pole_of(letters[d.index()]).is_some())
}

/// Lowercase, accent-free alphabetic words with stopwords and short words removed.
pub fn normalize_words(text: &str) -> Vec<String> {
    let folded: String = text
        .nfkd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    folded
        .split(|c: char| !c.is_alphabetic())
        .filter(|word| word.chars().count() >= 3 && !STOPWORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Words weighted 1.0 plus lexicon expansions for profile vocabulary.
pub fn tokenize(text: &str) -> Vec<WeightedToken> {
    let mut tokens = Vec::new();

    for word in normalize_words(text) {
        if let Some(expansion) = PROFILE_LEXICON.get(word.as_str()) {
            tokens.extend(
                expansion
                    .iter()
                    .map(|term| WeightedToken::new(format!("w:{term}"), EXPANSION_WEIGHT)),
            );
        } else if is_mbti_code(&word) {
            for letter in word.chars() {
                tokens.extend(
                    letter_expansion(letter)
                        .iter()
                        .map(|term| WeightedToken::new(format!("w:{term}"), EXPANSION_WEIGHT)),
                );
            }
        }
        tokens.push(WeightedToken::new(format!("w:{word}"), 1.0));
    }

    tokens
}

/// Deterministic feature-hashing embedder (SipHash13 with fixed keys, sign
/// hashing, L2-normalised output). No training or model files required.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn hash_token(&self, token: &str) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        token.hash(&mut hasher);
        hasher.finish()
    }
}

impl TextEmbedder for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn version(&self) -> &str {
        "v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for wt in tokenize(text) {
            let idx = (self.hash_token(&wt.token) % self.dimension as u64) as usize;
            let sign = if self.hash_token(&format!("{}_sign", wt.token)) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            vector[idx] += sign * wt.weight;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// Renders the profile as text in the vocabulary of career descriptions.
pub fn profile_text(input: &PredictionInput) -> String {
    let strengths = input
        .mi
        .top(3)
        .into_iter()
        .map(|(intelligence, score)| format!("{} ({score:.2})", intelligence.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut text = format!(
        "Perfil MBTI: {}. Fortalezas en inteligencias: {strengths}. ",
        input.mbti.code()
    );

    let strong = input
        .mbti
        .strong_dimensions(STRONG_DIMENSION_THRESHOLD)
        .into_iter()
        .map(|d| d.as_ref().to_string())
        .collect::<Vec<_>>();
    if !strong.is_empty() {
        text.push_str(&format!(
            "Preferencias fuertes en dimensiones: {}.",
            strong.join(", ")
        ));
    }

    text
}

/// Ranks careers by cosine similarity between description and profile embeddings.
pub struct SemanticPredictor {
    catalog: Arc<CareerCatalog>,
    embedder: Arc<dyn TextEmbedder>,
    description_embeddings: Vec<Vec<f32>>,
    rules: Arc<RuleBasedPredictor>,
}

impl SemanticPredictor {
    /// Embeds every description once. Fails with `Unavailable` for an empty catalog.
    pub fn new(
        catalog: Arc<CareerCatalog>,
        embedder: Arc<dyn TextEmbedder>,
        rules: Arc<RuleBasedPredictor>,
    ) -> Result<Self, PredictorError> {
        if catalog.is_empty() {
            return Err(PredictorError::Unavailable(
                "no career descriptions to embed".into(),
            ));
        }

        let description_embeddings = catalog
            .records()
            .iter()
            .map(|record| embedder.embed(&record.descripcion))
            .collect();

        tracing::info!(
            embedder = embedder.name(),
            dimension = embedder.dimension(),
            careers = catalog.len(),
            "embedded career descriptions"
        );

        Ok(Self {
            catalog,
            embedder,
            description_embeddings,
            rules,
        })
    }
}

impl Predictor for SemanticPredictor {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn version(&self) -> String {
        format!("{}-{}", self.embedder.name(), self.embedder.version())
    }

    fn predict(&self, input: &PredictionInput) -> Result<Vec<ScoredCareer>, PredictorError> {
        let profile_embedding = self.embedder.embed(&profile_text(input));

        let location = input.location.as_deref();
        let any_in_location = location
            .map(|loc| self.catalog.records().iter().any(|r| r.in_location(loc)))
            .unwrap_or(false);

        let mut scored: Vec<ScoredCareer> = self
            .catalog
            .records()
            .iter()
            .zip(&self.description_embeddings)
            .map(|(record, embedding)| {
                let outside = any_in_location
                    && location.is_some_and(|loc| !record.in_location(loc));
                let score = if outside {
                    OUT_OF_LOCATION_SCORE
                } else {
                    f64::from(cosine_similarity(&profile_embedding, embedding))
                };
                ScoredCareer::for_record(record, score)
            })
            .collect();

        sort_descending(&mut scored);
        Ok(scored)
    }

    fn rule_fallback(&self) -> Option<&dyn SupportsRuleBasedFallback> {
        Some(self.rules.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::profile::{MbtiProfile, MiProfile, mbti::code_to_vector};

    fn input(code: &str, mi: &[(Intelligence, f64)]) -> PredictionInput {
        let weights = BTreeMap::from([
            (Dimension::EI, 0.9),
            (Dimension::SN, 0.4),
            (Dimension::TF, 0.8),
            (Dimension::JP, 0.2),
        ]);
        let mbti = MbtiProfile::from_vector(code_to_vector(code).unwrap(), weights).unwrap();
        let mi = MiProfile::from_scores(mi.iter().copied().collect()).unwrap();
        PredictionInput::new(mbti, mi)
    }

    fn predictor() -> SemanticPredictor {
        let catalog = Arc::new(CareerCatalog::with_defaults());
        let rules = Arc::new(RuleBasedPredictor::new(catalog.clone()));
        SemanticPredictor::new(catalog, Arc::new(HashEmbedder::new(256)), rules).unwrap()
    }

    #[test]
    fn normalize_words_folds_accents_and_drops_noise() {
        assert_eq!(
            normalize_words("Diseño e investigación, para la Ingeniería!"),
            vec!["diseno", "investigacion", "ingenieria"]
        );
    }

    #[test]
    fn profile_text_lists_top_strengths_and_strong_dimensions() {
        let text = profile_text(&input(
            "INTJ",
            &[(Intelligence::LogMath, 0.9), (Intelligence::Nat, 0.75), (Intelligence::Lin, 0.5)],
        ));

        assert_eq!(
            text,
            "Perfil MBTI: INTJ. Fortalezas en inteligencias: LogMath (0.90), Nat (0.75), Lin (0.50). \
             Preferencias fuertes en dimensiones: E/I, T/F."
        );
    }

    #[test]
    fn embeddings_are_normalized_and_deterministic() {
        let embedder = HashEmbedder::new(128);

        let a = embedder.embed("análisis de datos");
        let b = embedder.embed("análisis de datos");

        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn logical_profile_ranks_data_science_above_environmental() {
        let ranked = predictor()
            .predict(&input(
                "INTJ",
                &[(Intelligence::LogMath, 0.95), (Intelligence::Intra, 0.3), (Intelligence::Mus, 0.2)],
            ))
            .unwrap();

        let position = |name: &str| ranked.iter().position(|s| s.nombre == name).unwrap();
        assert!(position("Ciencia de Datos") < position("Ingeniería Ambiental"));
        assert_eq!(ranked.len(), 5);
    }

    #[test]
    fn careers_outside_location_get_sentinel() {
        let ranked = predictor()
            .predict(&input("ENFP", &[(Intelligence::Nat, 0.9)]).with_location(Some("Toluca".into())))
            .unwrap();

        assert_eq!(ranked[0].nombre, "Ingeniería Ambiental");
        assert!(ranked[0].score > OUT_OF_LOCATION_SCORE);
        assert!(ranked[1..].iter().all(|s| s.score == OUT_OF_LOCATION_SCORE));
    }

    struct OpposedEmbedder {
        descriptions: Vec<String>,
    }

    impl TextEmbedder for OpposedEmbedder {
        fn name(&self) -> &'static str {
            "opposed"
        }

        fn version(&self) -> &str {
            "1"
        }

        fn dimension(&self) -> usize {
            1
        }

        fn embed(&self, text: &str) -> Vec<f32> {
            if self.descriptions.iter().any(|d| d == text) {
                vec![-1.0]
            } else {
                vec![1.0]
            }
        }
    }

    #[test]
    fn opposite_in_location_career_still_outranks_sentinel() {
        let catalog = Arc::new(CareerCatalog::with_defaults());
        let embedder = OpposedEmbedder {
            descriptions: catalog.records().iter().map(|r| r.descripcion.clone()).collect(),
        };
        let rules = Arc::new(RuleBasedPredictor::new(catalog.clone()));
        let predictor = SemanticPredictor::new(catalog, Arc::new(embedder), rules).unwrap();

        let ranked = predictor
            .predict(&input("ENFP", &[(Intelligence::Nat, 0.9)]).with_location(Some("Toluca".into())))
            .unwrap();

        assert_eq!(ranked[0].nombre, "Ingeniería Ambiental");
        assert_eq!(ranked[0].score, -1.0);
        assert!(ranked[1..].iter().all(|s| s.score == OUT_OF_LOCATION_SCORE));
        assert!(ranked[1..].iter().all(|s| s.score < ranked[0].score));
    }

    #[test]
    fn unmatched_location_is_ignored() {
        let ranked = predictor()
            .predict(&input("ENFP", &[(Intelligence::Nat, 0.9)]).with_location(Some("Mérida".into())))
            .unwrap();

        assert!(ranked.iter().all(|s| s.score > OUT_OF_LOCATION_SCORE));
    }

    #[test]
    fn empty_catalog_or_unknown_embedder_is_unavailable() {
        let empty = Arc::new(CareerCatalog::default());
        let rules = Arc::new(RuleBasedPredictor::new(empty.clone()));

        assert!(matches!(
            SemanticPredictor::new(empty, Arc::new(HashEmbedder::new(8)), rules),
            Err(PredictorError::Unavailable(_))
        ));
        assert!(matches!(
            create_embedder("onnx", 256),
            Err(PredictorError::Unavailable(_))
        ));
    }
}
