use super::CareerRecord;

/// Built-in catalog used when no catalog file is configured.
pub fn default_careers() -> Vec<CareerRecord> {
    vec![
        CareerRecord::new(
            "Ingeniería en Biotecnología",
            "Tec de Monterrey",
            "Carrera que combina biología y tecnología para el desarrollo de soluciones en salud, alimentos y medio ambiente.",
            "Querétaro",
        ),
        CareerRecord::new(
            "Ciencia de Datos",
            "UNAM",
            "Carrera enfocada en el análisis de grandes volúmenes de datos, aprendizaje automático y estadística aplicada.",
            "Ciudad de México",
        ),
        CareerRecord::new(
            "Ingeniería Mecatrónica",
            "IPN",
            "Combina mecánica, electrónica, control y programación para crear sistemas robotizados y automatizados.",
            "Ciudad de México",
        ),
        CareerRecord::new(
            "Diseño UX",
            "IBERO",
            "Enfocada en crear experiencias digitales centradas en el usuario, combinando diseño e investigación.",
            "Ciudad de México",
        ),
        CareerRecord::new(
            "Ingeniería Ambiental",
            "UAEM",
            "Carrera enfocada en el desarrollo de soluciones para problemas ambientales y sustentabilidad.",
            "Toluca",
        ),
    ]
}
