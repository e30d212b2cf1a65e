//! Per-country reference tables.
//!
//! Each country directory under the resources root holds four JSON files:
//!
//! - `cities_and_regions_<country>.json`: city → region → country rows
//! - `job_fields_<country>.json`: canonical job field → alias list
//! - `seniority_levels_<country>.json`: seniority levels in display order
//! - `time_periods_<country>.json`: time periods offered to the dashboard
//!
//! A [`Gazetteer`] is built once per country and never mutated afterwards, so
//! it can be shared freely between concurrent normalization calls. Reloading
//! is explicit through [`GazetteerCatalog::reload`].

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::job_fields::JobFieldIndex;
use crate::location::fold_place_name;

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("unknown country: {0}")]
    UnknownCountry(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One row of the city/region/country table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub city: String,
    #[serde(alias = "region_fi")]
    pub region_local: String,
    #[serde(alias = "region_en")]
    pub region_english: String,
    pub country: String,
}

impl GazetteerEntry {
    pub fn new(city: &str, region_local: &str, region_english: &str, country: &str) -> Self {
        Self {
            city: city.to_string(),
            region_local: region_local.to_string(),
            region_english: region_english.to_string(),
            country: country.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobFieldRow {
    name: String,
    #[serde(default)]
    alternatives: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeniorityLevelRow {
    level: String,
}

#[derive(Debug, Deserialize)]
struct TimePeriodRow {
    time_period: String,
}

/// Immutable lookup structure for one country.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    country: String,
    entries: Vec<GazetteerEntry>,
    cities: HashMap<String, usize>,
    regions: HashMap<String, usize>,
    countries: HashMap<String, String>,
    job_fields: JobFieldIndex,
}

impl Gazetteer {
    /// Builds the indexes. When two rows share a key, the earlier row wins.
    pub fn new(country: &str, entries: Vec<GazetteerEntry>, job_fields: JobFieldIndex) -> Self {
        let mut cities = HashMap::new();
        let mut regions = HashMap::new();
        let mut countries = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            let city_key = fold_place_name(&entry.city);
            if !city_key.is_empty() {
                cities.entry(city_key).or_insert(idx);
            }

            for region in [&entry.region_local, &entry.region_english] {
                let key = fold_place_name(region);
                if !key.is_empty() {
                    regions.entry(key).or_insert(idx);
                }
            }

            let country_key = fold_place_name(&entry.country);
            if !country_key.is_empty() {
                countries
                    .entry(country_key)
                    .or_insert_with(|| entry.country.clone());
            }
        }

        Self {
            country: country.trim().to_lowercase(),
            entries,
            cities,
            regions,
            countries,
            job_fields,
        }
    }

    #[instrument]
    pub fn load(resources_dir: &Path, country: &str) -> Result<Self, GazetteerError> {
        let country_key = country_dir_name(resources_dir, country)?;

        let entries: Vec<GazetteerEntry> = read_json(&resource_path(
            resources_dir,
            &country_key,
            "cities_and_regions",
        ))?;
        let field_rows: Vec<JobFieldRow> =
            read_json(&resource_path(resources_dir, &country_key, "job_fields"))?;

        let job_fields = JobFieldIndex::from_table(
            field_rows
                .into_iter()
                .map(|row| (row.name, row.alternatives)),
        );

        let gazetteer = Self::new(&country_key, entries, job_fields);
        info!(
            country = %gazetteer.country,
            entries = gazetteer.entries.len(),
            cities = gazetteer.cities.len(),
            regions = gazetteer.regions.len(),
            aliases = gazetteer.job_fields.alias_count(),
            "loaded gazetteer"
        );
        Ok(gazetteer)
    }

    /// Lower-cased country identifier this gazetteer was loaded for.
    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    pub fn job_fields(&self) -> &JobFieldIndex {
        &self.job_fields
    }

    /// Looks up a city by an already folded token.
    pub fn city(&self, folded: &str) -> Option<&GazetteerEntry> {
        self.cities.get(folded).map(|idx| &self.entries[*idx])
    }

    /// Looks up a region by its folded local or English name.
    pub fn region(&self, folded: &str) -> Option<&GazetteerEntry> {
        self.regions.get(folded).map(|idx| &self.entries[*idx])
    }

    /// Canonical country name for a folded token, if the table knows it.
    pub fn country_name(&self, folded: &str) -> Option<&str> {
        self.countries.get(folded).map(String::as_str)
    }
}

/// Caches one gazetteer, and the dashboard filter options, per country for
/// the lifetime of the process.
#[derive(Debug)]
pub struct GazetteerCatalog {
    resources_dir: PathBuf,
    loaded: RwLock<HashMap<String, Arc<Gazetteer>>>,
    references: RwLock<HashMap<String, Arc<ReferenceData>>>,
}

impl GazetteerCatalog {
    pub fn new(resources_dir: impl Into<PathBuf>) -> Self {
        Self {
            resources_dir: resources_dir.into(),
            loaded: RwLock::new(HashMap::new()),
            references: RwLock::new(HashMap::new()),
        }
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    pub fn get_or_load(&self, country: &str) -> Result<Arc<Gazetteer>, GazetteerError> {
        let key = country.trim().to_lowercase();
        if let Some(existing) = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(existing));
        }

        self.reload(&key)
    }

    /// Re-reads the country's files and replaces the cached instance.
    /// Callers holding the previous `Arc` keep using the old tables.
    pub fn reload(&self, country: &str) -> Result<Arc<Gazetteer>, GazetteerError> {
        let gazetteer = Arc::new(Gazetteer::load(&self.resources_dir, country)?);
        self.references
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(gazetteer.country());
        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(gazetteer.country().to_string(), Arc::clone(&gazetteer));
        Ok(gazetteer)
    }

    pub fn reference(&self, country: &str) -> Result<Arc<ReferenceData>, GazetteerError> {
        let key = country.trim().to_lowercase();
        if let Some(existing) = self
            .references
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(existing));
        }

        let reference = Arc::new(ReferenceData::load(&self.resources_dir, &key)?);
        self.references
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.country.clone(), Arc::clone(&reference));
        Ok(reference)
    }

    /// Countries with either table set cached, sorted.
    pub fn loaded_countries(&self) -> Vec<String> {
        let mut countries: BTreeSet<String> = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        countries.extend(
            self.references
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned(),
        );
        countries.into_iter().collect()
    }
}

/// Filter options the dashboard offers for a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceData {
    pub country: String,
    pub regions: Vec<String>,
    pub job_fields: Vec<String>,
    pub seniority_levels: Vec<String>,
    pub time_periods: Vec<String>,
}

impl ReferenceData {
    pub fn load(resources_dir: &Path, country: &str) -> Result<Self, GazetteerError> {
        let country_key = country_dir_name(resources_dir, country)?;

        let entries: Vec<GazetteerEntry> = read_json(&resource_path(
            resources_dir,
            &country_key,
            "cities_and_regions",
        ))?;
        let fields: Vec<JobFieldRow> =
            read_json(&resource_path(resources_dir, &country_key, "job_fields"))?;
        let levels: Vec<SeniorityLevelRow> = read_json(&resource_path(
            resources_dir,
            &country_key,
            "seniority_levels",
        ))?;
        let periods: Vec<TimePeriodRow> =
            read_json(&resource_path(resources_dir, &country_key, "time_periods"))?;

        let regions: BTreeSet<String> = entries.into_iter().map(|e| e.region_english).collect();
        let job_fields: BTreeSet<String> = fields.into_iter().map(|f| f.name).collect();

        let mut seniority_levels: Vec<String> = Vec::new();
        for row in levels {
            if !seniority_levels.contains(&row.level) {
                seniority_levels.push(row.level);
            }
        }

        Ok(Self {
            country: country_key,
            regions: regions.into_iter().collect(),
            job_fields: job_fields.into_iter().collect(),
            seniority_levels,
            time_periods: periods.into_iter().map(|p| p.time_period).collect(),
        })
    }
}

/// Sorted names of the country directories under the resources root.
pub fn available_countries(resources_dir: &Path) -> Result<Vec<String>, GazetteerError> {
    let io_err = |source| GazetteerError::Io {
        path: resources_dir.to_path_buf(),
        source,
    };

    let mut countries = Vec::new();
    for entry in fs::read_dir(resources_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                countries.push(name.to_string());
            }
        }
    }
    countries.sort();
    Ok(countries)
}

fn country_dir_name(resources_dir: &Path, country: &str) -> Result<String, GazetteerError> {
    let key = country.trim().to_lowercase();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'));
    if !valid || !resources_dir.join(&key).is_dir() {
        return Err(GazetteerError::UnknownCountry(country.to_string()));
    }
    Ok(key)
}

fn resource_path(resources_dir: &Path, country: &str, stem: &str) -> PathBuf {
    resources_dir
        .join(country)
        .join(format!("{stem}_{country}.json"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, GazetteerError> {
    let raw = fs::read_to_string(path).map_err(|source| GazetteerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| GazetteerError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) fn fixture() -> Gazetteer {
    let entries = vec![
        GazetteerEntry::new("Helsinki", "Uusimaa", "Uusimaa", "Finland"),
        GazetteerEntry::new("Espoo", "Uusimaa", "Uusimaa", "Finland"),
        GazetteerEntry::new("Tampere", "Pirkanmaa", "Pirkanmaa", "Finland"),
        GazetteerEntry::new("Turku", "Varsinais-Suomi", "Southwest Finland", "Finland"),
        GazetteerEntry::new("Kuopio", "Pohjois-Savo", "North Savo", "Finland"),
        GazetteerEntry::new("Mikkeli", "Etelä-Savo", "South Savo", "Finland"),
        GazetteerEntry::new("Hämeenlinna", "Kanta-Häme", "Tavastia Proper", "Finland"),
        GazetteerEntry::new("Oulu", "Pohjois-Pohjanmaa", "North Ostrobothnia", "Finland"),
    ];
    let job_fields = JobFieldIndex::from_table(vec![
        (
            "Software Engineering".to_string(),
            vec!["information technology".to_string(), "it".to_string()],
        ),
        (
            "Sales".to_string(),
            vec!["sales".to_string(), "business development".to_string()],
        ),
        (
            "Marketing".to_string(),
            vec!["marketing".to_string(), "public relations".to_string()],
        ),
    ]);
    Gazetteer::new("finland", entries, job_fields)
}

#[cfg(test)]
pub(crate) fn write_fixture_resources(root: &Path) {
    let dir = root.join("finland");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("cities_and_regions_finland.json"),
        r#"[
            {"city": "Helsinki", "region_fi": "Uusimaa", "region_en": "Uusimaa", "country": "Finland"},
            {"city": "Tampere", "region_fi": "Pirkanmaa", "region_en": "Pirkanmaa", "country": "Finland"},
            {"city": "Kuopio", "region_fi": "Pohjois-Savo", "region_en": "North Savo", "country": "Finland"}
        ]"#,
    )
    .unwrap();
    fs::write(
        dir.join("job_fields_finland.json"),
        r#"[
            {"name": "Software Engineering", "alternatives": ["Information Technology", "software", ""]},
            {"name": "Sales", "alternatives": ["sales"]}
        ]"#,
    )
    .unwrap();
    fs::write(
        dir.join("seniority_levels_finland.json"),
        r#"[{"level": "Entry level"}, {"level": "Mid-Senior level"}, {"level": "Entry level"}]"#,
    )
    .unwrap();
    fs::write(
        dir.join("time_periods_finland.json"),
        r#"[{"time_period": "Any time"}, {"time_period": "month"}]"#,
    )
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_cities_and_both_region_names() {
        let gazetteer = fixture();

        assert_eq!(gazetteer.city("helsinki").unwrap().region_english, "Uusimaa");
        assert_eq!(
            gazetteer.region("varsinais suomi").unwrap().region_english,
            "Southwest Finland"
        );
        assert_eq!(
            gazetteer.region("southwest finland").unwrap().city,
            "Turku"
        );
        assert_eq!(gazetteer.country_name("finland"), Some("Finland"));
    }

    #[test]
    fn folds_diacritics_in_table_keys() {
        let gazetteer = fixture();
        assert_eq!(gazetteer.city("hameenlinna").unwrap().city, "Hämeenlinna");
        assert_eq!(
            gazetteer.region("kanta hame").unwrap().region_english,
            "Tavastia Proper"
        );
    }

    #[test]
    fn first_row_wins_for_shared_region_key() {
        let gazetteer = fixture();
        assert_eq!(gazetteer.region("uusimaa").unwrap().city, "Helsinki");
    }

    #[test]
    fn loads_country_tables_from_disk() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_resources(root.path());

        let gazetteer = Gazetteer::load(root.path(), "Finland").unwrap();
        assert_eq!(gazetteer.country(), "finland");
        assert_eq!(gazetteer.entries().len(), 3);
        assert_eq!(gazetteer.city("kuopio").unwrap().region_local, "Pohjois-Savo");
        assert_eq!(
            gazetteer.job_fields().field_for_alias("information technology"),
            Some("Software Engineering")
        );
        // the empty alias is dropped at load time
        assert_eq!(gazetteer.job_fields().alias_count(), 3);
    }

    #[test]
    fn unknown_country_is_reported() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_resources(root.path());

        let err = Gazetteer::load(root.path(), "sweden").unwrap_err();
        assert!(matches!(err, GazetteerError::UnknownCountry(_)));

        let err = Gazetteer::load(root.path(), "../finland").unwrap_err();
        assert!(matches!(err, GazetteerError::UnknownCountry(_)));
    }

    #[test]
    fn malformed_table_surfaces_path() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_resources(root.path());
        fs::write(
            root.path().join("finland/job_fields_finland.json"),
            "{not json",
        )
        .unwrap();

        let err = Gazetteer::load(root.path(), "finland").unwrap_err();
        match err {
            GazetteerError::Json { path, .. } => {
                assert!(path.ends_with("job_fields_finland.json"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn catalog_caches_until_explicit_reload() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_resources(root.path());
        let catalog = GazetteerCatalog::new(root.path());

        let first = catalog.get_or_load("finland").unwrap();
        let again = catalog.get_or_load("FINLAND").unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        fs::write(
            root.path().join("finland/cities_and_regions_finland.json"),
            r#"[{"city": "Oulu", "region_fi": "Pohjois-Pohjanmaa", "region_en": "North Ostrobothnia", "country": "Finland"}]"#,
        )
        .unwrap();

        let cached = catalog.get_or_load("finland").unwrap();
        assert!(cached.city("oulu").is_none());

        let reloaded = catalog.reload("finland").unwrap();
        assert!(reloaded.city("oulu").is_some());
        assert!(first.city("helsinki").is_some());
        assert_eq!(catalog.loaded_countries(), vec!["finland".to_string()]);
    }

    #[test]
    fn catalog_caches_reference_data_and_drops_it_on_reload() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_resources(root.path());
        let catalog = GazetteerCatalog::new(root.path());

        let first = catalog.reference("Finland").unwrap();
        assert!(Arc::ptr_eq(&first, &catalog.reference("finland").unwrap()));

        catalog.reload("finland").unwrap();
        assert!(!Arc::ptr_eq(&first, &catalog.reference("finland").unwrap()));
        assert!(matches!(
            catalog.reference("atlantis"),
            Err(GazetteerError::UnknownCountry(_))
        ));
    }

    #[test]
    fn reference_data_is_sorted_and_deduplicated() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_resources(root.path());

        let reference = ReferenceData::load(root.path(), "finland").unwrap();
        assert_eq!(
            reference.regions,
            vec!["North Savo", "Pirkanmaa", "Uusimaa"]
        );
        assert_eq!(reference.job_fields, vec!["Sales", "Software Engineering"]);
        assert_eq!(
            reference.seniority_levels,
            vec!["Entry level", "Mid-Senior level"]
        );
        assert_eq!(reference.time_periods, vec!["Any time", "month"]);
    }

    #[test]
    fn lists_country_directories() {
        let root = tempfile::tempdir().unwrap();
        write_fixture_resources(root.path());
        fs::create_dir_all(root.path().join("estonia")).unwrap();
        fs::write(root.path().join("README"), "not a country").unwrap();

        assert_eq!(
            available_countries(root.path()).unwrap(),
            vec!["estonia".to_string(), "finland".to_string()]
        );
    }
}
