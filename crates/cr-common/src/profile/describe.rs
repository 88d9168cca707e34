use std::collections::HashMap;

use lazy_static::lazy_static;

use super::mi::{Intelligence, MiProfile};

const UNKNOWN_TYPE_PHRASE: &str = "tienes un perfil único";

lazy_static! {
    static ref MBTI_DESCRIPTIONS: HashMap<&'static str, &'static str> = HashMap::from([
        ("INTJ", "posees una mente analítica y estratégica. Eres independiente, determinado y tienes una gran capacidad para comprender conceptos complejos."),
        ("INTP", "eres curioso, analítico y teórico. Te gusta resolver problemas complejos y buscar patrones, con un enfoque lógico y objetivo."),
        ("ENTJ", "eres decidido, estratégico y tienes dotes de liderazgo natural. Te destacas por tu organización y tu capacidad para tomar decisiones."),
        ("ENTP", "eres ingenioso, innovador y adaptable. Disfrutas debatiendo ideas y encontrando soluciones creativas a problemas complejos."),
        ("INFJ", "eres perceptivo, idealista y comprometido. Te enfocas en comprender a los demás y trabajar por causas significativas."),
        ("INFP", "eres idealista, creativo y empático. Valoras la autenticidad y buscas tener un impacto positivo en el mundo."),
        ("ENFJ", "eres carismático, empático y natural para liderar. Te preocupas por el desarrollo de los demás y trabajas en crear ambientes armoniosos."),
        ("ENFP", "eres entusiasta, creativo y con gran capacidad para conectar con los demás. Disfrutas explorando nuevas ideas y posibilidades."),
        ("ISTJ", "eres responsable, práctico y organizado. Valoras la consistencia y la confiabilidad en tu enfoque metódico."),
        ("ISFJ", "eres servicial, detallista y leal. Te destacas por tu enfoque práctico para ayudar a los demás y tu atención al detalle."),
        ("ESTJ", "eres organizado, lógico y orientado a resultados. Te enfocas en implementar soluciones prácticas con eficiencia."),
        ("ESFJ", "eres sociable, cooperativo y práctico. Te gusta cuidar de los demás y mantener la armonía mientras logras resultados concretos."),
        ("ISTP", "eres versátil, pragmático y orientado a la acción. Tienes habilidades excepcionales para resolver problemas técnicos."),
        ("ISFP", "eres artístico, adaptable y observador. Disfrutas experimentando con nuevas ideas en el momento presente."),
        ("ESTP", "eres enérgico, práctico y adaptable. Te destacas en situaciones que requieren acción inmediata e improvisación."),
        ("ESFP", "eres entusiasta, espontáneo y sociable. Disfrutas trabajando con otros en proyectos prácticos y dinámicos."),
    ]);
}

fn mi_suggestion(intelligence: Intelligence) -> &'static str {
    match intelligence {
        Intelligence::Lin => "comunicación científica, documentación técnica o divulgación STEM",
        Intelligence::LogMath => "programación, estadística, ciencia de datos o matemáticas aplicadas",
        Intelligence::Spa => "diseño 3D, arquitectura, visualización de datos o ingeniería civil",
        Intelligence::BodKin => "ingeniería biomédica, ergonomía o tecnologías de rehabilitación",
        Intelligence::Mus => "acústica, ingeniería de sonido o tecnología musical",
        Intelligence::Inter => "gestión de proyectos tecnológicos, consultoría o educación STEM",
        Intelligence::Intra => "investigación, análisis de sistemas o desarrollo de soluciones autónomas",
        Intelligence::Nat => "ciencias ambientales, biología, ecología o sostenibilidad",
    }
}

/// Renders a short Spanish narrative of an MBTI + MI profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileDescriber;

impl ProfileDescriber {
    pub fn describe(&self, mbti_code: &str, mi: &MiProfile) -> String {
        let code = mbti_code.trim().to_ascii_uppercase();
        let type_phrase = MBTI_DESCRIPTIONS
            .get(code.as_str())
            .copied()
            .unwrap_or(UNKNOWN_TYPE_PHRASE)
            .trim_end_matches('.');

        let top: Vec<Intelligence> = mi.top(3).into_iter().map(|(i, _)| i).collect();
        let suggestions = top
            .iter()
            .map(|i| mi_suggestion(*i))
            .collect::<Vec<_>>()
            .join(", ");

        let has = |wanted: &[Intelligence]| top.iter().any(|i| wanted.contains(i));
        let code_has = |letters: &str| letters.chars().any(|letter| code.contains(letter));

        let mut description = format!(
            "Como persona con perfil MBTI {code}, {type_phrase}. \
             Tus fortalezas en inteligencias múltiples indican aptitudes para {suggestions}. \
             Estas características te hacen especialmente apto/a para carreras que combinen "
        );

        if has(&[Intelligence::LogMath]) {
            description.push_str(if code_has("NT") {
                "análisis riguroso con innovación tecnológica, "
            } else {
                "pensamiento lógico con aplicaciones prácticas, "
            });
        }
        if has(&[Intelligence::Spa, Intelligence::BodKin]) {
            description.push_str(if code_has("SP") {
                "diseño y construcción de soluciones físicas, "
            } else {
                "planificación y visualización de sistemas, "
            });
        }
        if has(&[Intelligence::Inter, Intelligence::Lin]) {
            description.push_str(if code_has("EF") {
                "comunicación y colaboración en equipos multidisciplinarios, "
            } else {
                "documentación y explicación de conceptos complejos, "
            });
        }

        let mut description = description.trim_end_matches([',', ' ']).to_string();
        description.push('.');
        description
    }
}
