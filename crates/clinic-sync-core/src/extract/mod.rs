//! Extraction of structured growth facts from clinical notes.
//!
//! Pipeline: Free text → Turkish fold → Unit-aware scan → Plausibility filter → Policy pick

mod birth;
mod values;

pub use birth::*;
pub use values::*;

use crate::models::MeasurementType;

/// Case-fold Turkish text for matching.
///
/// Lower-cases, maps `İ`/`I`/`ı` to `i` and drops the combining dot (U+0307)
/// left behind by generic lower-casing. Notes typed in capitals and patterns
/// written in lower case fold to the same string. Patterns and keywords must be
/// folded with this too, so `ı` in a literal becomes `i`.
pub fn fold_tr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'İ' | 'I' | 'ı' => out.push('i'),
            '\u{307}' => {}
            _ => out.extend(c.to_lowercase().filter(|&l| l != '\u{307}')),
        }
    }
    out
}

/// Classify a note as birth or visit context.
pub fn classify_measurement(text: &str) -> MeasurementType {
    if is_birth_context(text) {
        MeasurementType::Birth
    } else {
        MeasurementType::Visit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_measurement() {
        assert_eq!(
            classify_measurement("Doğum kilosu 3.5 kg, boy 50 cm"),
            MeasurementType::Birth
        );
        assert_eq!(classify_measurement("kilo 9 kg"), MeasurementType::Visit);
    }

    #[test]
    fn test_fold_tr() {
        assert_eq!(fold_tr("BAŞ ÇEVRESİ"), "baş çevresi");
        assert_eq!(fold_tr("HAYATIN 5. GÜNÜ"), "hayatin 5. günü");
        assert_eq!(fold_tr("hayatın"), "hayatin");
        assert_eq!(fold_tr("Ağırlığı"), "ağirliği");
        assert_eq!(fold_tr("i\u{307}"), "i");
    }

    #[test]
    fn test_classify_upper_case_notes() {
        assert_eq!(classify_measurement("DOĞUM KİLOSU 3200 GR"), MeasurementType::Birth);
        assert_eq!(classify_measurement("DOĞUM AĞIRLIĞI 3 KG"), MeasurementType::Birth);
        assert_eq!(classify_measurement("HAYATIN 5. GÜNÜ"), MeasurementType::Birth);
        assert_eq!(classify_measurement("YENİDOĞAN KONTROLÜ"), MeasurementType::Birth);
    }
}
