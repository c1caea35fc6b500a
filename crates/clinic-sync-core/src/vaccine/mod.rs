//! Vaccine identity resolution for free-text service names.
//!
//! Pipeline: Service name → Turkish fold → Ordered keyword scan → Generic-term fallback

mod table;

pub use table::*;

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::fold_tr;
use crate::models::MatchMethod;

static DOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*\.?\s*doz").expect("dose pattern"));

/// A resolved vaccine and how it was recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaccineMatch {
    pub identity: VaccineIdentity,
    pub method: MatchMethod,
}

/// Resolver mapping service names to canonical vaccine families.
#[derive(Debug, Clone, Default)]
pub struct VaccineResolver {
    table: VaccineTable,
}

impl VaccineResolver {
    pub fn new(table: VaccineTable) -> Self {
        Self { table }
    }

    /// Resolve a service name. `None` means "not a vaccine".
    pub fn resolve(&self, text: &str) -> Option<VaccineIdentity> {
        self.classify(text).map(|m| m.identity)
    }

    /// Resolve a service name, reporting whether a keyword or only a generic
    /// term matched. Rules are tried in table order; the first match wins.
    pub fn classify(&self, text: &str) -> Option<VaccineMatch> {
        let folded = fold_tr(text);

        if let Some(rule) = self
            .table
            .rules
            .iter()
            .find(|rule| contains_keyword(&folded, &rule.keyword))
        {
            return Some(VaccineMatch {
                identity: rule.identity.clone(),
                method: MatchMethod::Keyword,
            });
        }

        if self
            .table
            .generic_terms
            .iter()
            .any(|term| folded.contains(term.as_str()))
        {
            return Some(VaccineMatch {
                identity: unknown_identity(text),
                method: MatchMethod::Generic,
            });
        }

        None
    }
}

/// Keyword containment on folded text. A keyword whose last word is a single
/// letter ("hepatit a") must not run on into a longer word ("hepatit aşısı").
fn contains_keyword(folded: &str, keyword: &str) -> bool {
    let letter_tail = keyword
        .rsplit(' ')
        .next()
        .is_some_and(|word| word.chars().count() == 1);
    if !letter_tail {
        return folded.contains(keyword);
    }
    folded.match_indices(keyword).any(|(at, found)| {
        !folded[at + found.len()..]
            .chars()
            .next()
            .is_some_and(char::is_alphabetic)
    })
}

/// Identity used when a service is a vaccination but its family is unknown.
pub fn unknown_identity(original: &str) -> VaccineIdentity {
    VaccineIdentity {
        vaccine_type: "unknown".to_string(),
        standard_name: original.trim().to_string(),
    }
}

/// True when a service group label denotes vaccination ("Aşılama").
pub fn is_vaccination_group(group: &str) -> bool {
    let folded = fold_tr(group);
    ["aşi", "vaccin"].iter().any(|t| folded.contains(t))
}

/// Dose number from a service name: "Rotarix 1.doz" → 1, "2. doz" → 2.
pub fn parse_dose(text: &str) -> Option<u32> {
    let folded = fold_tr(text);
    DOSE.captures(&folded)?.get(1)?.as_str().parse().ok()
}
