//! Normalizes raw scraped records into the fixed job schema.
//!
//! Never fails: unknown keys are dropped, unparsable numbers become `None`,
//! and missing required fields become empty strings.
use serde_json::{Map, Value};

use crate::db::model::NewJob;

/// A job record as returned by the scraping service.
pub type RawJob = Map<String, Value>;

/// Source key names that map onto a different column.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("company", "company_name"),
    ("company_logo", "logo_photo_url"),
];

fn field<'a>(raw: &'a RawJob, key: &str) -> Option<&'a Value> {
    if let Some(v) = raw.get(key).filter(|v| !v.is_null()) {
        return Some(v);
    }
    KEY_ALIASES
        .iter()
        .filter(|(_, column)| *column == key)
        .find_map(|(alias, _)| raw.get(*alias).filter(|v| !v.is_null()))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn opt_string(raw: &RawJob, key: &str) -> Option<String> {
    field(raw, key).map(|v| text_of(v).trim().to_string())
}

fn required_string(raw: &RawJob, key: &str) -> String {
    opt_string(raw, key).unwrap_or_default()
}

fn opt_number(raw: &RawJob, key: &str) -> Option<f64> {
    let n = match field(raw, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|f| f.is_finite())
}

fn flag(raw: &RawJob, key: &str) -> bool {
    match field(raw, key) {
        Some(Value::Bool(b)) => *b,
        Some(v @ (Value::String(_) | Value::Number(_))) => {
            matches!(
                text_of(v).trim().to_lowercase().as_str(),
                "true" | "1" | "yes"
            )
        }
        _ => false,
    }
}

/// Build a [`NewJob`] from a raw record.
pub fn sanitize(raw: &RawJob) -> NewJob {
    NewJob {
        site: required_string(raw, "site"),
        job_url: required_string(raw, "job_url"),
        title: required_string(raw, "title"),
        job_url_direct: opt_string(raw, "job_url_direct"),
        company_name: opt_string(raw, "company_name"),
        location: opt_string(raw, "location"),
        job_type: opt_string(raw, "job_type"),
        date_posted: opt_string(raw, "date_posted"),
        interval: opt_string(raw, "interval"),
        min_amount: opt_number(raw, "min_amount"),
        max_amount: opt_number(raw, "max_amount"),
        currency: opt_string(raw, "currency"),
        is_remote: flag(raw, "is_remote"),
        job_level: opt_string(raw, "job_level"),
        job_function: opt_string(raw, "job_function"),
        company_industry: opt_string(raw, "company_industry"),
        listing_type: opt_string(raw, "listing_type"),
        emails: opt_string(raw, "emails"),
        description: opt_string(raw, "description"),
        company_url: opt_string(raw, "company_url"),
        company_url_direct: opt_string(raw, "company_url_direct"),
        company_addresses: opt_string(raw, "company_addresses"),
        company_num_employees: opt_string(raw, "company_num_employees"),
        company_revenue: opt_string(raw, "company_revenue"),
        company_description: opt_string(raw, "company_description"),
        logo_photo_url: opt_string(raw, "logo_photo_url"),
        banner_photo_url: opt_string(raw, "banner_photo_url"),
        ceo_name: opt_string(raw, "ceo_name"),
        ceo_photo_url: opt_string(raw, "ceo_photo_url"),
        compensation_interval: opt_string(raw, "compensation_interval"),
        salary_source: opt_string(raw, "salary_source"),
        company_rating: opt_number(raw, "company_rating"),
        skills: opt_string(raw, "skills"),
        experience_range: opt_string(raw, "experience_range"),
    }
}

/// Raw location string, if present, as the classifier sees it.
pub fn raw_location(raw: &RawJob) -> Option<String> {
    opt_string(raw, "location")
}

impl NewJob {
    /// Required fields are all non-blank. Not enforced on insert.
    pub fn is_valid(&self) -> bool {
        !self.site.trim().is_empty()
            && !self.job_url.trim().is_empty()
            && !self.title.trim().is_empty()
    }

    /// Human-readable salary range, e.g. `SGD 4,000 - 6,000`.
    pub fn salary_range(&self) -> Option<String> {
        let currency = self.currency.as_deref().unwrap_or("USD");
        match (self.min_amount, self.max_amount) {
            (Some(min), Some(max)) => Some(format!(
                "{currency} {} - {}",
                group_thousands(min),
                group_thousands(max)
            )),
            (Some(min), None) => Some(format!("{currency} {}+", group_thousands(min))),
            (None, Some(max)) => Some(format!("Up to {currency} {}", group_thousands(max))),
            (None, None) => None,
        }
    }
}

fn group_thousands(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 {
        out.insert(0, '-');
    }
    out
}
