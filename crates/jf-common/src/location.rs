use serde::Serialize;
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::gazetteer::{Gazetteer, GazetteerEntry};
use crate::UNSPECIFIED;

/// Fragments removed outright after folding.
const NOISE_FRAGMENTS: &[&str] = &["sub region"];

/// Spelling variants rewritten to the form used in the region tables.
const SPELLING_VARIANTS: &[(&str, &str)] = &[
    ("northen", "north"),
    ("southern", "south"),
    ("savonia", "savo"),
];

/// Which pass of the resolver produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationMatch {
    City,
    Region,
    Country,
    Unresolved,
}

impl LocationMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationMatch::City => "city",
            LocationMatch::Region => "region",
            LocationMatch::Country => "country",
            LocationMatch::Unresolved => "unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocation {
    pub city: String,
    pub region: String,
    pub country: String,
    pub matched: LocationMatch,
}

impl ResolvedLocation {
    fn from_city(entry: &GazetteerEntry) -> Self {
        Self {
            city: entry.city.clone(),
            region: entry.region_english.clone(),
            country: entry.country.clone(),
            matched: LocationMatch::City,
        }
    }

    fn from_region(entry: &GazetteerEntry) -> Self {
        Self {
            city: UNSPECIFIED.to_string(),
            region: entry.region_english.clone(),
            country: entry.country.clone(),
            matched: LocationMatch::Region,
        }
    }

    fn from_country(country: &str) -> Self {
        Self {
            city: UNSPECIFIED.to_string(),
            region: UNSPECIFIED.to_string(),
            country: country.to_string(),
            matched: LocationMatch::Country,
        }
    }

    pub fn unresolved() -> Self {
        Self {
            city: UNSPECIFIED.to_string(),
            region: UNSPECIFIED.to_string(),
            country: UNSPECIFIED.to_string(),
            matched: LocationMatch::Unresolved,
        }
    }
}

/// Folds free-form location text into lookup tokens.
///
/// Hyphens and commas become spaces, diacritics are dropped after NFKD
/// decomposition, the text is lower-cased, and the noise and spelling tables
/// are applied before splitting on whitespace.
pub fn location_tokens(raw: &str) -> Vec<String> {
    let mut text: String = raw
        .to_lowercase()
        .replace(['-', ','], " ")
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    for fragment in NOISE_FRAGMENTS {
        text = text.replace(fragment, "");
    }
    for (from, to) in SPELLING_VARIANTS {
        text = text.replace(from, to);
    }

    text.split_whitespace().map(str::to_string).collect()
}

/// Key form used for gazetteer indexes. Shares the input folding so table
/// names and free text meet in the middle.
pub fn fold_place_name(name: &str) -> String {
    location_tokens(name).join(" ")
}

/// Candidate region names derived from the token list, by token count.
fn region_candidates(tokens: &[String]) -> Vec<String> {
    let n = tokens.len();
    match n {
        0 => Vec::new(),
        1 | 2 => tokens.to_vec(),
        // "<region> <region> <country>"
        3 => vec![tokens[..2].join(" ")],
        // "<city> <region ...> <country>"
        _ => vec![tokens[1..n - 1].join(" ")],
    }
}

/// Country name when the input spells out the gazetteer's own country, e.g.
/// the token "finland" for the Finnish tables. Other country names and
/// local-language spellings are not recognised.
fn fallback_country<'a>(gazetteer: &'a Gazetteer, tokens: &[String]) -> Option<&'a str> {
    let key = gazetteer.country();
    if tokens.iter().any(|token| token == key) {
        gazetteer.country_name(key)
    } else {
        None
    }
}

/// Resolves free-form location text to city, region and country.
///
/// City tokens win over region names, which win over a bare country. Anything
/// else comes back as [`ResolvedLocation::unresolved`].
pub fn normalize_location(raw: &str, gazetteer: &Gazetteer) -> ResolvedLocation {
    let tokens = location_tokens(raw);

    if let Some(entry) = tokens.iter().find_map(|token| gazetteer.city(token)) {
        return ResolvedLocation::from_city(entry);
    }

    if let Some(entry) = region_candidates(&tokens)
        .iter()
        .find_map(|candidate| gazetteer.region(candidate))
    {
        return ResolvedLocation::from_region(entry);
    }

    if let Some(country) = fallback_country(gazetteer, &tokens) {
        return ResolvedLocation::from_country(country);
    }

    debug!(location = raw, country = gazetteer.country(), "location unresolved");
    ResolvedLocation::unresolved()
}
