//! Brand/keyword → vaccine family table.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::fold_tr;

/// Vaccine table errors.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Vaccine table has no rules")]
    Empty,

    #[error("Rule {0} has an empty keyword")]
    EmptyKeyword(usize),
}

/// Canonical identity of a vaccine family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaccineIdentity {
    #[serde(rename = "type")]
    pub vaccine_type: String,
    #[serde(rename = "standardName")]
    pub standard_name: String,
}

/// One keyword rule. The keyword is matched as a substring of the
/// Turkish-folded service name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccineRule {
    pub keyword: String,
    #[serde(flatten)]
    pub identity: VaccineIdentity,
}

/// Ordered rule table. Earlier rules win, so more specific keywords
/// ("priorix tetra") must precede the shorter ones they contain ("priorix").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccineTable {
    pub rules: Vec<VaccineRule>,
    /// Terms marking a service as some vaccine when no rule matches
    #[serde(default = "default_generic_terms")]
    pub generic_terms: Vec<String>,
}

impl Default for VaccineTable {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            generic_terms: default_generic_terms(),
        }
    }
}

impl VaccineTable {
    /// Parse a table from JSON and normalise its keywords.
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        let table: VaccineTable = serde_json::from_str(json)?;
        table.normalized()
    }

    /// Load a table from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn normalized(mut self) -> Result<Self, TableError> {
        if self.rules.is_empty() {
            return Err(TableError::Empty);
        }
        for (index, rule) in self.rules.iter_mut().enumerate() {
            rule.keyword = fold_tr(rule.keyword.trim());
            if rule.keyword.is_empty() {
                return Err(TableError::EmptyKeyword(index));
            }
        }
        self.generic_terms = self
            .generic_terms
            .iter()
            .map(|t| fold_tr(t.trim()))
            .filter(|t| !t.is_empty())
            .collect();
        Ok(self)
    }
}

fn default_generic_terms() -> Vec<String> {
    ["aşı", "vaccine", "vaksin"].iter().map(|t| fold_tr(t)).collect()
}

/// Built-in table: Turkish national schedule plus common private-market brands.
fn default_rules() -> Vec<VaccineRule> {
    let rules: &[(&str, &str, &str)] = &[
        // Combined DTaP families, most valent first
        ("hexaxim", "hexavalent", "Hekzavalan (DaBT-İPA-Hib-HepB)"),
        ("hexyon", "hexavalent", "Hekzavalan (DaBT-İPA-Hib-HepB)"),
        ("infanrix hexa", "hexavalent", "Hekzavalan (DaBT-İPA-Hib-HepB)"),
        ("pentaxim", "pentavalent", "Beşli Karma (DaBT-İPA-Hib)"),
        ("infanrix-ipv+hib", "pentavalent", "Beşli Karma (DaBT-İPA-Hib)"),
        ("beşli karma", "pentavalent", "Beşli Karma (DaBT-İPA-Hib)"),
        ("tetraxim", "tetravalent", "Dörtlü Karma (DaBT-İPA)"),
        ("infanrix-ipv", "tetravalent", "Dörtlü Karma (DaBT-İPA)"),
        ("dörtlü karma", "tetravalent", "Dörtlü Karma (DaBT-İPA)"),
        ("boostrix", "tdap", "Tdap (Erişkin Tip Boğmaca)"),
        ("adacel", "tdap", "Tdap (Erişkin Tip Boğmaca)"),
        ("tdap", "tdap", "Tdap (Erişkin Tip Boğmaca)"),
        ("dabt", "dtap", "DaBT"),
        // Pneumococcal
        ("prevenar", "pneumococcal", "Pnömokok (KPA)"),
        ("synflorix", "pneumococcal", "Pnömokok (KPA)"),
        ("vaxneuvance", "pneumococcal", "Pnömokok (KPA)"),
        ("pnömokok", "pneumococcal", "Pnömokok (KPA)"),
        // Rotavirus
        ("rotarix", "rotavirus", "Rotavirüs"),
        ("rotateq", "rotavirus", "Rotavirüs"),
        ("rota", "rotavirus", "Rotavirüs"),
        // MMR and MMRV
        ("priorix tetra", "mmrv", "KKK + Suçiçeği"),
        ("priorix-tetra", "mmrv", "KKK + Suçiçeği"),
        ("proquad", "mmrv", "KKK + Suçiçeği"),
        ("priorix", "mmr", "KKK (Kızamık-Kızamıkçık-Kabakulak)"),
        ("m-m-rvaxpro", "mmr", "KKK (Kızamık-Kızamıkçık-Kabakulak)"),
        ("kkk", "mmr", "KKK (Kızamık-Kızamıkçık-Kabakulak)"),
        ("mmr", "mmr", "KKK (Kızamık-Kızamıkçık-Kabakulak)"),
        // Varicella
        ("varilrix", "varicella", "Suçiçeği"),
        ("varivax", "varicella", "Suçiçeği"),
        ("suçiçeği", "varicella", "Suçiçeği"),
        ("su çiçeği", "varicella", "Suçiçeği"),
        // Hepatitis
        ("havrix", "hepatitis_a", "Hepatit A"),
        ("avaxim", "hepatitis_a", "Hepatit A"),
        ("hepatit a", "hepatitis_a", "Hepatit A"),
        ("engerix", "hepatitis_b", "Hepatit B"),
        ("euvax", "hepatitis_b", "Hepatit B"),
        ("hepatit b", "hepatitis_b", "Hepatit B"),
        // Tuberculosis
        ("bcg", "bcg", "BCG (Verem)"),
        ("verem", "bcg", "BCG (Verem)"),
        // Meningococcal
        ("nimenrix", "meningococcal_acwy", "Meningokok ACWY"),
        ("menactra", "meningococcal_acwy", "Meningokok ACWY"),
        ("menveo", "meningococcal_acwy", "Meningokok ACWY"),
        ("menquadfi", "meningococcal_acwy", "Meningokok ACWY"),
        ("bexsero", "meningococcal_b", "Meningokok B"),
        ("trumenba", "meningococcal_b", "Meningokok B"),
        // HPV
        ("gardasil", "hpv", "HPV"),
        ("cervarix", "hpv", "HPV"),
        ("hpv", "hpv", "HPV"),
        // Influenza
        ("vaxigrip", "influenza", "İnfluenza (Grip)"),
        ("influvac", "influenza", "İnfluenza (Grip)"),
        ("fluarix", "influenza", "İnfluenza (Grip)"),
        ("grip", "influenza", "İnfluenza (Grip)"),
        // Single-antigen and travel
        ("act-hib", "hib", "Hib"),
        ("polio", "polio", "Polio (OPA/İPA)"),
        ("typhim", "typhoid", "Tifo"),
        ("tifo", "typhoid", "Tifo"),
        ("kuduz", "rabies", "Kuduz"),
        ("verorab", "rabies", "Kuduz"),
        ("tetanoz", "tetanus", "Tetanoz"),
        ("tetavax", "tetanus", "Tetanoz"),
    ];

    rules
        .iter()
        .map(|(keyword, vaccine_type, standard_name)| VaccineRule {
            keyword: fold_tr(keyword),
            identity: VaccineIdentity {
                vaccine_type: vaccine_type.to_string(),
                standard_name: standard_name.to_string(),
            },
        })
        .collect()
}
