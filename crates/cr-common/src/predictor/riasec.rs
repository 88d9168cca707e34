//! Labelled profiles derived from the open RIASEC questionnaire export: 48
//! Holland items (`R1`..`C8`, answered 1-5) plus the ten TIPI items (1-7).
//!
//! Each respondent's Holland shares are turned into an approximate MBTI vector,
//! axis weights and MI scores, then labelled with the catalog career whose field
//! code best matches their top three Holland types.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use csv::{ReaderBuilder, StringRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use super::PredictorError;
use super::synthetic::{LabeledSample, TrainingSource};
use crate::features::FeatureEncoder;
use crate::profile::{Dimension, Intelligence};

const ITEMS_PER_TYPE: usize = 8;
const HOLLAND_ITEMS: usize = 6 * ITEMS_PER_TYPE;
const TIPI_ITEMS: usize = 10;
const ITEM_ANSWERS: RangeInclusive<f64> = 1.0..=5.0;
const TIPI_ANSWERS: RangeInclusive<f64> = 1.0..=7.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Holland {
    Realistic,
    Investigative,
    Artistic,
    Social,
    Enterprising,
    Conventional,
}

impl Holland {
    pub const ALL: [Holland; 6] = [
        Holland::Realistic,
        Holland::Investigative,
        Holland::Artistic,
        Holland::Social,
        Holland::Enterprising,
        Holland::Conventional,
    ];

    pub fn letter(self) -> char {
        match self {
            Holland::Realistic => 'R',
            Holland::Investigative => 'I',
            Holland::Artistic => 'A',
            Holland::Social => 'S',
            Holland::Enterprising => 'E',
            Holland::Conventional => 'C',
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Three Holland types, strongest first.
pub type HollandCode = [Holland; 3];

/// Broad study fields, their typical Holland code, and the career-name stems
/// that place a catalog career in the field. First match wins.
static FIELDS: [(&str, HollandCode, &[&str]); 10] = [
    (
        "Tecnología",
        [Holland::Investigative, Holland::Realistic, Holland::Enterprising],
        &["datos", "sistemas", "comput", "software", "informát", "robót"],
    ),
    (
        "Medicina",
        [Holland::Investigative, Holland::Social, Holland::Realistic],
        &["medic", "enfermer", "salud", "nutrici", "odontolog"],
    ),
    (
        "Psicología",
        [Holland::Social, Holland::Investigative, Holland::Artistic],
        &["psicolog", "neurocien"],
    ),
    (
        "Negocios",
        [Holland::Enterprising, Holland::Conventional, Holland::Social],
        &["negocio", "administra", "finanz", "econom", "contadur"],
    ),
    (
        "Arte",
        [Holland::Artistic, Holland::Social, Holland::Investigative],
        &["arte", "diseño", "músic", "arquitect"],
    ),
    (
        "Educación",
        [Holland::Social, Holland::Artistic, Holland::Enterprising],
        &["educa", "pedagog", "docen"],
    ),
    (
        "Derecho",
        [Holland::Enterprising, Holland::Social, Holland::Investigative],
        &["derecho", "leyes"],
    ),
    (
        "Ciencias Sociales",
        [Holland::Investigative, Holland::Social, Holland::Artistic],
        &["social", "sociolog", "antropolog", "histori"],
    ),
    (
        "Comunicación",
        [Holland::Artistic, Holland::Enterprising, Holland::Social],
        &["comunica", "periodis"],
    ),
    (
        "Ingeniería",
        [Holland::Realistic, Holland::Investigative, Holland::Conventional],
        &["ingenier"],
    ),
];

/// Field name and Holland code for a career, or `None` when no stem matches.
pub fn field_of(career: &str) -> Option<(&'static str, HollandCode)> {
    let name = career.to_lowercase();
    FIELDS
        .iter()
        .find(|(_, _, stems)| stems.iter().any(|stem| name.contains(stem)))
        .map(|(field, code, _)| (*field, *code))
}

/// Shared types score more when both codes rank them high.
pub fn code_affinity(top: &HollandCode, profile: &HollandCode) -> usize {
    top.iter()
        .enumerate()
        .filter_map(|(rank, holland)| {
            profile
                .iter()
                .position(|p| p == holland)
                .map(|pos| (3 - rank) * (3 - pos))
        })
        .sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiasecScores {
    /// Mean item answer per type, in [`Holland::ALL`] order.
    pub means: [f64; 6],
    /// `means` scaled to sum to one.
    pub shares: [f64; 6],
    /// TIPI answers rescaled from 1..=7 to 0..=1.
    pub tipi: [f64; TIPI_ITEMS],
}

impl RiasecScores {
    pub fn from_answers(items: &[f64; HOLLAND_ITEMS], tipi: &[f64; TIPI_ITEMS]) -> Option<Self> {
        let means: [f64; 6] = std::array::from_fn(|t| {
            items[t * ITEMS_PER_TYPE..(t + 1) * ITEMS_PER_TYPE]
                .iter()
                .sum::<f64>()
                / ITEMS_PER_TYPE as f64
        });
        let total: f64 = means.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return None;
        }

        let span = TIPI_ANSWERS.end() - TIPI_ANSWERS.start();
        Some(Self {
            means,
            shares: means.map(|m| m / total),
            tipi: tipi.map(|v| (v - TIPI_ANSWERS.start()) / span),
        })
    }

    fn share(&self, holland: Holland) -> f64 {
        self.shares[holland.index()]
    }

    /// TIPI item by its 1-based questionnaire number.
    fn tipi_item(&self, number: usize) -> f64 {
        self.tipi[number - 1]
    }

    pub fn top_code(&self) -> HollandCode {
        let mut ranked = Holland::ALL;
        ranked.sort_by(|a, b| {
            self.means[b.index()]
                .partial_cmp(&self.means[a.index()])
                .unwrap_or(Ordering::Equal)
        });
        [ranked[0], ranked[1], ranked[2]]
    }

    /// Evidence for the first and second pole of each axis, in axis order.
    fn poles(&self) -> [(f64, f64); 4] {
        use Holland::*;
        let s = |holland| self.share(holland);
        [
            (s(Social) + s(Enterprising), s(Investigative)),
            (s(Realistic) + s(Conventional), s(Artistic) + s(Investigative)),
            (s(Realistic) + s(Investigative), s(Social) + s(Artistic)),
            (s(Conventional) + s(Enterprising), s(Artistic)),
        ]
    }

    /// 0 picks the first pole (E, S, T, J) only on strictly stronger evidence.
    pub fn mbti_vector(&self) -> [u8; 4] {
        self.poles().map(|(first, second)| u8::from(first <= second))
    }

    pub fn mbti_weights(&self) -> BTreeMap<Dimension, f64> {
        Dimension::ALL
            .into_iter()
            .zip(self.poles())
            .map(|(dimension, (first, second))| {
                let larger = first.max(second);
                let weight = if larger > 0.0 {
                    (first - second).abs() / larger
                } else {
                    0.0
                };
                (dimension, weight)
            })
            .collect()
    }

    pub fn mi_scores(&self) -> BTreeMap<Intelligence, f64> {
        use Holland::*;
        let s = |holland| self.share(holland);
        let extraversion = self.tipi_item(1);
        let conscientiousness = self.tipi_item(3);
        let openness = self.tipi_item(5);
        let agreeableness = self.tipi_item(7);
        let stability = self.tipi_item(9);

        BTreeMap::from([
            (Intelligence::Lin, 0.6 * s(Artistic) + 0.3 * openness + 0.1 * extraversion),
            (
                Intelligence::LogMath,
                0.6 * s(Investigative) + 0.3 * s(Conventional) + 0.1 * conscientiousness,
            ),
            (Intelligence::Spa, 0.5 * s(Realistic) + 0.5 * s(Artistic)),
            (Intelligence::BodKin, 0.6 * s(Realistic) + 0.4 * s(Social)),
            (Intelligence::Mus, 0.8 * s(Artistic) + 0.2 * openness),
            (
                Intelligence::Inter,
                0.4 * s(Social) + 0.3 * s(Enterprising) + 0.1 * extraversion + 0.2 * agreeableness,
            ),
            (
                Intelligence::Intra,
                0.4 * s(Investigative) + 0.3 * stability + 0.3 * conscientiousness,
            ),
            (
                Intelligence::Nat,
                0.4 * s(Investigative) + 0.4 * s(Realistic) + 0.2 * openness,
            ),
        ])
    }
}

/// Delimited RIASEC export. The delimiter (tab, semicolon or comma) is taken
/// from the header line.
#[derive(Debug, Clone)]
pub struct RiasecSource {
    pub path: PathBuf,
    /// Rows kept after shuffling; every usable row when unset.
    pub sample_size: Option<usize>,
}

impl RiasecSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sample_size: None,
        }
    }

    pub fn with_sample_size(mut self, sample_size: Option<usize>) -> Self {
        self.sample_size = sample_size;
        self
    }

    fn error(&self, message: impl std::fmt::Display) -> PredictorError {
        PredictorError::Training(format!("{}: {message}", self.path.display()))
    }

    /// Rows with a missing, non-numeric or out-of-range answer are skipped.
    pub fn read_scores(&self) -> Result<Vec<RiasecScores>, PredictorError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|err| self.error(format!("failed to read: {err}")))?;
        let mut reader = ReaderBuilder::new()
            .delimiter(sniff_delimiter(&raw))
            .flexible(true)
            .from_reader(raw.as_bytes());

        let headers = reader
            .headers()
            .map_err(|err| self.error(format!("unreadable header: {err}")))?
            .clone();
        let column = |name: String| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or_else(|| self.error(format!("missing column {name}")))
        };
        let item_columns = Holland::ALL
            .into_iter()
            .flat_map(|h| (1..=ITEMS_PER_TYPE).map(move |i| format!("{}{i}", h.letter())))
            .map(column)
            .collect::<Result<Vec<_>, _>>()?;
        let tipi_columns = (1..=TIPI_ITEMS)
            .map(|i| column(format!("TIPI{i}")))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for record in reader.records() {
            let record = record.map_err(|err| self.error(format!("malformed row: {err}")))?;
            let scores = answers::<HOLLAND_ITEMS>(&record, &item_columns, &ITEM_ANSWERS)
                .zip(answers::<TIPI_ITEMS>(&record, &tipi_columns, &TIPI_ANSWERS))
                .and_then(|(items, tipi)| RiasecScores::from_answers(&items, &tipi));
            match scores {
                Some(scores) => rows.push(scores),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(skipped, path = %self.path.display(), "skipped incomplete RIASEC rows");
        }
        Ok(rows)
    }
}

impl TrainingSource for RiasecSource {
    fn name(&self) -> &'static str {
        "riasec"
    }

    fn load(&self, careers: &[String], rng: &mut StdRng) -> Result<Vec<LabeledSample>, PredictorError> {
        let coded: Vec<(&str, HollandCode)> = careers
            .iter()
            .filter_map(|career| field_of(career).map(|(_, code)| (career.as_str(), code)))
            .collect();
        if coded.is_empty() {
            return Err(PredictorError::Training(
                "no catalog career maps to a RIASEC field".into(),
            ));
        }
        if coded.len() < careers.len() {
            warn!(
                unmapped = careers.len() - coded.len(),
                "careers without a RIASEC field receive no samples"
            );
        }

        let mut rows = self.read_scores()?;
        if let Some(limit) = self.sample_size.filter(|limit| *limit < rows.len()) {
            rows.shuffle(rng);
            rows.truncate(limit);
        }

        let samples: Vec<LabeledSample> = rows
            .iter()
            .map(|scores| LabeledSample {
                features: FeatureEncoder.encode(
                    scores.mbti_vector(),
                    &scores.mbti_weights(),
                    &scores.mi_scores(),
                ),
                label: closest_career(&scores.top_code(), &coded, rng).to_string(),
            })
            .collect();

        info!(
            samples = samples.len(),
            careers = coded.len(),
            path = %self.path.display(),
            "loaded RIASEC training data"
        );
        Ok(samples)
    }
}

fn sniff_delimiter(raw: &str) -> u8 {
    let header = raw.lines().next().unwrap_or_default();
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|delimiter| header.matches(char::from(*delimiter)).count())
        .unwrap_or(b',')
}

fn answers<const N: usize>(
    record: &StringRecord,
    columns: &[usize],
    valid: &RangeInclusive<f64>,
) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    for (slot, column) in out.iter_mut().zip(columns) {
        let value: f64 = record.get(*column)?.trim().parse().ok()?;
        if !valid.contains(&value) {
            return None;
        }
        *slot = value;
    }
    Some(out)
}

/// Careers sharing the best affinity split its rows at random.
fn closest_career<'a>(
    top: &HollandCode,
    coded: &[(&'a str, HollandCode)],
    rng: &mut StdRng,
) -> &'a str {
    let best = coded
        .iter()
        .map(|(_, code)| code_affinity(top, code))
        .max()
        .unwrap_or(0);
    let tied: Vec<&'a str> = coded
        .iter()
        .filter(|(_, code)| code_affinity(top, code) == best)
        .map(|(name, _)| *name)
        .collect();
    tied.choose(rng).copied().unwrap_or_default()
}
