use chrono::NaiveDateTime;
use html2text::render::TrivialDecorator;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::date::normalize_date;
use crate::gazetteer::Gazetteer;
use crate::job_fields::{normalize_job_function, JobFields};
use crate::location::{normalize_location, LocationMatch};
use crate::UNSPECIFIED;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
}

/// Raw scraped item as it arrives on the feed. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawJobItem {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Country the crawl was started for.
    pub request_location: Option<String>,
    /// Relative phrase such as "3 days ago".
    pub date_posted: Option<String>,
    #[serde(alias = "seniorty_level")]
    pub seniority_level: Option<String>,
    pub employment_type: Option<String>,
    pub job_function: Option<String>,
    pub industries: Option<String>,
    /// HTML fragment.
    pub description: Option<String>,
    pub job_url: Option<String>,
}

/// Normalized job posting, one row of the `jobs` table.
///
/// Every field is non-empty; anything missing or unresolvable is `Unspecified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub date_posted: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub seniority_level: String,
    pub employment_type: String,
    pub job_function: String,
    pub job_fields: JobFields,
    pub industries: String,
    pub description: String,
    pub job_url: String,
}

/// Trims, drops line breaks and commas, and substitutes `Unspecified` for
/// empty results.
pub fn clean_text(value: Option<&str>) -> String {
    let stripped: String = value
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | ','))
        .collect();
    or_unspecified(stripped.trim())
}

fn or_unspecified(value: &str) -> String {
    if value.is_empty() {
        UNSPECIFIED.to_string()
    } else {
        value.to_string()
    }
}

/// Visible text of an HTML fragment with whitespace collapsed. No list
/// bullets, heading markers or link references are added.
pub fn description_text(html: Option<&str>) -> String {
    let html = html.unwrap_or_default();
    let rendered = html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(html.as_bytes(), usize::MAX);
    let text = match rendered {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "html to text conversion failed; stripping tags");
            TAG_RE.replace_all(html, " ").into_owned()
        }
    };
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    or_unspecified(&collapsed)
}

/// Posting URL without tracking parameters.
pub fn canonical_job_url(raw: Option<&str>) -> String {
    let trimmed = raw.unwrap_or_default().trim();
    let url = trimmed
        .split_once("?position")
        .map_or(trimmed, |(base, _)| base);
    or_unspecified(url)
}

/// Turns a raw item into a [`JobRecord`]. Never fails; `now` anchors the
/// relative posting date.
pub fn normalize(item: &RawJobItem, gazetteer: &Gazetteer, now: NaiveDateTime) -> JobRecord {
    let location = clean_text(item.location.as_deref());
    let resolved = normalize_location(&location, gazetteer);

    let job_function = clean_text(item.job_function.as_deref());
    let job_fields = normalize_job_function(gazetteer.job_fields(), &job_function);

    let date_phrase = clean_text(item.date_posted.as_deref());
    let job_url = canonical_job_url(item.job_url.as_deref());

    if resolved.matched == LocationMatch::Unresolved || job_fields.is_other() {
        debug!(
            job_url = %job_url,
            location_match = resolved.matched.as_str(),
            job_function = %job_function,
            "record normalized with fallback values"
        );
    }

    JobRecord {
        date_posted: normalize_date(&date_phrase, now),
        title: clean_text(item.title.as_deref()),
        company: clean_text(item.company.as_deref()),
        location,
        city: resolved.city,
        region: resolved.region,
        country: resolved.country,
        seniority_level: clean_text(item.seniority_level.as_deref()),
        employment_type: clean_text(item.employment_type.as_deref()),
        job_function,
        job_fields,
        industries: clean_text(item.industries.as_deref()),
        description: description_text(item.description.as_deref()),
        job_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::fixture;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn item() -> RawJobItem {
        serde_json::from_str(
            r#"{
                "title": "  Rust Developer\n",
                "company": "Acme, Oy",
                "location": "Helsinki, Uusimaa, Finland",
                "request_location": "Finland",
                "date_posted": "3 days ago",
                "seniorty_level": "Mid-Senior level",
                "employment_type": "Full-time",
                "job_function": "Information Technology",
                "industries": "Software Development",
                "description": "<div><p>Build   things</p>\n<p>in Rust</p></div>",
                "job_url": "https://www.linkedin.com/jobs/view/123?position=4&pageNum=0",
                "tracking_id": "ignored"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn normalizes_complete_item() {
        let record = normalize(&item(), &fixture(), now());

        assert_eq!(record.date_posted, "2024-05-17 09:30:00");
        assert_eq!(record.title, "Rust Developer");
        assert_eq!(record.company, "Acme Oy");
        assert_eq!(record.location, "Helsinki Uusimaa Finland");
        assert_eq!(record.city, "Helsinki");
        assert_eq!(record.region, "Uusimaa");
        assert_eq!(record.country, "Finland");
        assert_eq!(record.seniority_level, "Mid-Senior level");
        assert_eq!(record.employment_type, "Full-time");
        assert_eq!(
            record.job_fields,
            JobFields(vec!["Software Engineering".to_string()])
        );
        assert_eq!(record.industries, "Software Development");
        assert_eq!(record.description, "Build things in Rust");
        assert_eq!(record.job_url, "https://www.linkedin.com/jobs/view/123");
    }

    #[test]
    fn empty_item_is_all_unspecified() {
        let record = normalize(&RawJobItem::default(), &fixture(), now());

        assert_eq!(record.date_posted, "2024-05-20 09:30:00");
        for value in [
            &record.title,
            &record.company,
            &record.location,
            &record.city,
            &record.region,
            &record.country,
            &record.seniority_level,
            &record.employment_type,
            &record.job_function,
            &record.industries,
            &record.description,
            &record.job_url,
        ] {
            assert_eq!(value, UNSPECIFIED);
        }
        assert!(record.job_fields.is_other());
    }

    #[test]
    fn clean_text_handles_blank_and_punctuation() {
        assert_eq!(clean_text(Some("   ")), UNSPECIFIED);
        assert_eq!(clean_text(Some(",\n,")), UNSPECIFIED);
        assert_eq!(clean_text(Some(" a,b\r\nc ")), "abc");
        assert_eq!(clean_text(None), UNSPECIFIED);
    }

    #[test]
    fn description_drops_list_heading_and_link_markup() {
        let html = r#"<p>We offer <b>great</b> perks:</p><ul><li>Remote work</li><li>Gym</li></ul><p>See <a href="https://acme.example/about">our site</a></p><h2>About</h2>"#;
        assert_eq!(
            description_text(Some(html)),
            "We offer great perks: Remote work Gym See our site About"
        );
    }

    #[test]
    fn description_decodes_entities_and_line_breaks() {
        assert_eq!(
            description_text(Some("<p>R&amp;D team<br>Oulu<br/>office</p>")),
            "R&D team Oulu office"
        );
        assert_eq!(
            description_text(Some("<ol><li>Rust</li><li>SQL</li></ol><h3>Perks</h3><em>Sauna</em>")),
            "Rust SQL Perks Sauna"
        );
    }

    #[test]
    fn description_of_blank_markup_is_unspecified() {
        assert_eq!(description_text(Some("<div>  </div>")), UNSPECIFIED);
        assert_eq!(description_text(Some("")), UNSPECIFIED);
    }

    #[test]
    fn url_without_tracking_suffix_is_kept() {
        assert_eq!(
            canonical_job_url(Some(" https://example.com/jobs/1 ")),
            "https://example.com/jobs/1"
        );
        assert_eq!(canonical_job_url(Some("?position=1")), UNSPECIFIED);
    }

    #[test]
    fn canonical_spelling_of_seniority_is_accepted() {
        let item: RawJobItem =
            serde_json::from_str(r#"{"seniority_level": "Director"}"#).unwrap();
        assert_eq!(item.seniority_level.as_deref(), Some("Director"));
    }

    #[test]
    fn normalization_is_deterministic() {
        let gazetteer = fixture();
        assert_eq!(
            normalize(&item(), &gazetteer, now()),
            normalize(&item(), &gazetteer, now())
        );
    }
}
