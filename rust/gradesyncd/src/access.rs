use crate::model::StudentRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Ok,
    /// The link names a batch that is no longer loaded (the instructor uploaded
    /// a newer one). Distinct from "student not found".
    BatchInvalid,
}

/// How names are compared during lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameMatchRule {
    /// Trim and lower-case only. `"luis perez"` does not find `"Luis Pérez"`.
    #[default]
    Exact,
    /// Additionally folds Spanish/Latin diacritics to their base letter, in
    /// both precomposed and decomposed (base letter plus combining mark) form.
    FoldAccents,
}

impl NameMatchRule {
    pub fn as_str(self) -> &'static str {
        match self {
            NameMatchRule::Exact => "exact",
            NameMatchRule::FoldAccents => "foldAccents",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "foldaccents" | "fold_accents" => Some(Self::FoldAccents),
            _ => None,
        }
    }
}

/// Restricts lookup candidates to one batch. Without a batch id every record
/// is searchable (demo mode).
pub fn filter_for_lookup<'a>(
    records: &'a [StudentRecord],
    batch_id: Option<&str>,
) -> (Vec<&'a StudentRecord>, FilterOutcome) {
    let Some(batch_id) = batch_id else {
        return (records.iter().collect(), FilterOutcome::Ok);
    };
    let candidates: Vec<&StudentRecord> = records
        .iter()
        .filter(|r| r.batch_id.as_deref() == Some(batch_id))
        .collect();
    if candidates.is_empty() && !records.is_empty() {
        return (candidates, FilterOutcome::BatchInvalid);
    }
    (candidates, FilterOutcome::Ok)
}

pub fn normalize_name(s: &str, rule: NameMatchRule) -> String {
    let lowered = s.trim().to_lowercase();
    match rule {
        NameMatchRule::Exact => lowered,
        NameMatchRule::FoldAccents => lowered
            .chars()
            .filter(|c| !is_combining_mark(*c))
            .map(fold_char)
            .collect(),
    }
}

/// Combining Diacritical Marks block (U+0300..=U+036F).
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// First candidate, in store order, whose normalized name equals or contains
/// the normalized query. Duplicate names are not disambiguated.
pub fn find_by_name<'a>(
    candidates: &[&'a StudentRecord],
    query: &str,
    rule: NameMatchRule,
) -> Option<&'a StudentRecord> {
    let needle = normalize_name(query, rule);
    if needle.is_empty() {
        return None;
    }
    candidates.iter().copied().find(|r| {
        let name = normalize_name(&r.name, rule);
        name == needle || name.contains(&needle)
    })
}
