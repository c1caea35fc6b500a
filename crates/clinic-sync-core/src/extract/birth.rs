//! Birth-context detection.

use std::sync::LazyLock;

use regex::Regex;

use super::fold_tr;

/// Indicators that a note describes the patient at birth rather than at a visit.
static BIRTH_INDICATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"doğum\s+(?:kilosu|ağırlığı|boyu|tartısı)",
        r"doğumda",
        r"\bc/s\b",
        r"\bnsd\b",
        r"sezaryen",
        r"normal\s+doğum",
        r"yenidoğan",
        r"\b\d+\s+günlük\b",
        r"postnatal\s+\d+\.?\s*gün",
        r"hayatın\s+\d+\.?\s*günü",
    ]
    .iter()
    .map(|p| Regex::new(&fold_tr(p)).expect("birth indicator pattern"))
    .collect()
});

/// True when the text carries any birth-context indicator.
pub fn is_birth_context(text: &str) -> bool {
    let folded = fold_tr(text);
    BIRTH_INDICATORS.iter().any(|re| re.is_match(&folded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_birth_weight_phrases() {
        assert!(is_birth_context("Doğum kilosu 3.5 kg, boy 50 cm"));
        assert!(is_birth_context("doğum ağırlığı: 3200 gr"));
        assert!(is_birth_context("Doğumda 49 cm"));
    }

    #[test]
    fn test_delivery_mode_markers() {
        assert!(is_birth_context("38 hf C/S ile doğdu"));
        assert!(is_birth_context("NSD, 3100 g"));
        assert!(is_birth_context("sezaryen ile doğum"));
        assert!(is_birth_context("Normal doğum"));
    }

    #[test]
    fn test_day_of_life_markers() {
        assert!(is_birth_context("5 günlük bebek"));
        assert!(is_birth_context("postnatal 3. gün kontrol"));
        assert!(is_birth_context("hayatın 2. günü sarılık"));
    }

    #[test]
    fn test_visit_notes_are_not_birth() {
        assert!(!is_birth_context("kilo 8,2 kg boy 70 cm"));
        assert!(!is_birth_context("6 aylık kontrol"));
        assert!(!is_birth_context("ateş yok, genel durum iyi"));
        assert!(!is_birth_context(""));
    }

    #[test]
    fn test_markers_need_word_boundaries() {
        assert!(!is_birth_context("transduser"));
        assert!(!is_birth_context("nsdx"));
    }
}
