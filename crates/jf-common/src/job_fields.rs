use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::OTHER_JOB_FIELD;

/// Alias → canonical job field table.
///
/// Aliases keep the order they were first inserted in. Re-inserting an alias
/// for a different field moves the alias to that field but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct JobFieldIndex {
    exact: HashMap<String, String>,
    ordered: Vec<(String, String)>,
    fields: Vec<String>,
}

impl JobFieldIndex {
    /// Builds the index from `(field, aliases)` rows. Empty aliases are skipped.
    pub fn from_table<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut index = Self::default();
        for (field, aliases) in rows {
            index.add_field(&field);
            for alias in aliases {
                index.insert(&field, &alias);
            }
        }
        index
    }

    fn add_field(&mut self, field: &str) {
        if !self.fields.iter().any(|f| f == field) {
            self.fields.push(field.to_string());
        }
    }

    pub fn insert(&mut self, field: &str, alias: &str) {
        let alias = alias.trim().to_lowercase();
        if alias.is_empty() {
            return;
        }
        self.add_field(field);

        if let Some(slot) = self.ordered.iter_mut().find(|(a, _)| *a == alias) {
            slot.1 = field.to_string();
        } else {
            self.ordered.push((alias.clone(), field.to_string()));
        }
        self.exact.insert(alias, field.to_string());
    }

    pub fn field_for_alias(&self, alias: &str) -> Option<&str> {
        self.exact.get(alias).map(String::as_str)
    }

    pub fn alias_count(&self) -> usize {
        self.ordered.len()
    }

    /// Canonical field names in table order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn classify(&self, raw: &str) -> JobFields {
        let lowered = raw.trim().to_lowercase();
        if lowered.is_empty() {
            return JobFields::other();
        }

        if let Some(field) = self.exact.get(&lowered) {
            return JobFields(vec![field.clone()]);
        }

        let mut matched: Vec<String> = Vec::new();
        for (alias, field) in &self.ordered {
            if lowered.contains(alias.as_str()) && !matched.contains(field) {
                matched.push(field.clone());
            }
        }

        if matched.is_empty() {
            JobFields::other()
        } else {
            JobFields(matched)
        }
    }
}

/// Ordered, duplicate-free list of canonical job fields for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobFields(pub Vec<String>);

impl JobFields {
    pub fn other() -> Self {
        Self(vec![OTHER_JOB_FIELD.to_string()])
    }

    pub fn is_other(&self) -> bool {
        self.0.len() == 1 && self.0[0] == OTHER_JOB_FIELD
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|f| f == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// JSON array text, the form stored in the `job_fields` column.
    pub fn to_json(&self) -> String {
        serde_json::Value::from(self.0.clone()).to_string()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl Default for JobFields {
    fn default() -> Self {
        Self::other()
    }
}

/// Maps a raw job-function label onto canonical job fields.
pub fn normalize_job_function(index: &JobFieldIndex, raw: &str) -> JobFields {
    index.classify(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> JobFieldIndex {
        JobFieldIndex::from_table(vec![
            (
                "Software Engineering".to_string(),
                vec!["Information Technology".to_string(), "engineering".to_string()],
            ),
            (
                "Sales".to_string(),
                vec!["sales".to_string(), "business development".to_string()],
            ),
            (
                "Marketing".to_string(),
                vec!["marketing".to_string(), "".to_string()],
            ),
        ])
    }

    #[test]
    fn exact_alias_wins() {
        let fields = normalize_job_function(&index(), "Information Technology");
        assert_eq!(fields, JobFields(vec!["Software Engineering".to_string()]));
    }

    #[test]
    fn exact_alias_short_circuits_substring_scan() {
        let index = JobFieldIndex::from_table(vec![(
            "Software Engineering".to_string(),
            vec!["information technology".to_string(), "it".to_string()],
        )]);
        assert_eq!(
            normalize_job_function(&index, "INFORMATION TECHNOLOGY"),
            JobFields(vec!["Software Engineering".to_string()])
        );
        assert_eq!(
            normalize_job_function(&index, "it"),
            JobFields(vec!["Software Engineering".to_string()])
        );
    }

    #[test]
    fn substring_scan_keeps_table_order_and_dedupes() {
        let fields = normalize_job_function(
            &index(),
            "Sales and Business Development, Marketing and Sales",
        );
        assert_eq!(
            fields,
            JobFields(vec!["Sales".to_string(), "Marketing".to_string()])
        );
    }

    #[test]
    fn no_match_yields_other() {
        let fields = normalize_job_function(&index(), "Underwater basket weaving");
        assert!(fields.is_other());
        assert!(normalize_job_function(&index(), "Unspecified").is_other());
        assert!(normalize_job_function(&index(), "").is_other());
    }

    #[test]
    fn empty_alias_is_never_indexed() {
        let index = index();
        assert_eq!(index.alias_count(), 5);
        assert!(index.field_for_alias("").is_none());
    }

    #[test]
    fn reinserted_alias_moves_to_latest_field_in_place() {
        let mut index = index();
        index.insert("Marketing", "sales");

        assert_eq!(index.field_for_alias("sales"), Some("Marketing"));
        let fields = index.classify("sales and business development");
        assert_eq!(
            fields,
            JobFields(vec!["Marketing".to_string(), "Sales".to_string()])
        );
    }

    #[test]
    fn serialises_as_json_array() {
        let fields = JobFields(vec!["Sales".to_string(), "Marketing".to_string()]);
        assert_eq!(fields.to_json(), r#"["Sales","Marketing"]"#);
        assert_eq!(JobFields::from_json(&fields.to_json()).unwrap(), fields);
        assert_eq!(JobFields::other().to_json(), r#"["Other"]"#);
    }
}
