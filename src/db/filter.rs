//! Typed search filters.
//!
//! Each recognized filter maps to one [`Predicate`]; predicates are rendered
//! into a `QueryBuilder` with every value bound as a parameter.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};

use super::repo::to_sql_ts;
use crate::region::Country;

/// Sortable columns. Anything else falls back to `scraped_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Title,
    Company,
    Location,
    MinAmount,
    MaxAmount,
    DatePosted,
    #[default]
    ScrapedAt,
}

impl SortField {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => SortField::Title,
            "company" | "company_name" => SortField::Company,
            "location" => SortField::Location,
            "min_amount" => SortField::MinAmount,
            "max_amount" => SortField::MaxAmount,
            "date_posted" => SortField::DatePosted,
            _ => SortField::ScrapedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Company => "company_name",
            SortField::Location => "location",
            SortField::MinAmount => "min_amount",
            SortField::MaxAmount => "max_amount",
            SortField::DatePosted => "date_posted",
            SortField::ScrapedAt => "scraped_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Optional, conjunctive job search filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_remote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_salary: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_salary: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_old: Option<u32>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column LIKE %value%`
    Contains(&'static str, String),
    /// Any of the values is a substring of `column`.
    ContainsAny(&'static str, Vec<String>),
    EqualsText(&'static str, String),
    EqualsInt(&'static str, i64),
    /// Either salary bound is at least the threshold.
    SalaryAtLeast(f64),
    /// Either salary bound is at most the threshold.
    SalaryAtMost(f64),
    ScrapedSince(String),
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl JobFilters {
    pub fn predicates(&self, now: DateTime<Utc>) -> Vec<Predicate> {
        let mut out = Vec::new();
        if let Some(v) = non_blank(&self.title) {
            out.push(Predicate::Contains("title", v.to_string()));
        }
        if let Some(v) = non_blank(&self.company) {
            out.push(Predicate::Contains("company_name", v.to_string()));
        }
        if let Some(v) = non_blank(&self.location) {
            out.push(Predicate::Contains("location", v.to_string()));
        }
        if let Some(v) = non_blank(&self.country) {
            match Country::parse(v) {
                Some(country) => out.push(Predicate::ContainsAny(
                    "location",
                    country.aliases().iter().map(|a| a.to_string()).collect(),
                )),
                None => out.push(Predicate::Contains("location", v.to_string())),
            }
        }
        if let Some(v) = non_blank(&self.job_type) {
            out.push(Predicate::EqualsText("job_type", v.to_string()));
        }
        if let Some(v) = non_blank(&self.site) {
            out.push(Predicate::EqualsText("site", v.to_string()));
        }
        if let Some(remote) = self.is_remote {
            out.push(Predicate::EqualsInt("is_remote", i64::from(remote)));
        }
        if let Some(min) = self.min_salary {
            out.push(Predicate::SalaryAtLeast(min));
        }
        if let Some(max) = self.max_salary {
            out.push(Predicate::SalaryAtMost(max));
        }
        // A window reaching past the earliest representable date has no bound.
        if let Some(cutoff) = self
            .days_old
            .and_then(|days| now.checked_sub_signed(Duration::days(i64::from(days))))
        {
            out.push(Predicate::ScrapedSince(to_sql_ts(cutoff)));
        }
        out
    }

    pub fn order_clause(&self) -> String {
        let order = self.sort_order.keyword();
        format!(" ORDER BY {} {order}, id {order}", self.sort_by.column())
    }
}

fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Append ` WHERE ...` for `predicates` (nothing when empty).
pub fn push_where<'a>(qb: &mut QueryBuilder<'a, Sqlite>, predicates: &[Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::Contains(column, value) => {
                qb.push(*column)
                    .push(" LIKE ")
                    .push_bind(like_pattern(value))
                    .push(" ESCAPE '\\'");
            }
            Predicate::ContainsAny(column, values) => {
                qb.push("(");
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(*column)
                        .push(" LIKE ")
                        .push_bind(like_pattern(value))
                        .push(" ESCAPE '\\'");
                }
                qb.push(")");
            }
            Predicate::EqualsText(column, value) => {
                qb.push(*column).push(" = ").push_bind(value.clone());
            }
            Predicate::EqualsInt(column, value) => {
                qb.push(*column).push(" = ").push_bind(*value);
            }
            Predicate::SalaryAtLeast(min) => {
                qb.push("(min_amount >= ")
                    .push_bind(*min)
                    .push(" OR max_amount >= ")
                    .push_bind(*min)
                    .push(")");
            }
            Predicate::SalaryAtMost(max) => {
                qb.push("(min_amount <= ")
                    .push_bind(*max)
                    .push(" OR max_amount <= ")
                    .push_bind(*max)
                    .push(")");
            }
            Predicate::ScrapedSince(cutoff) => {
                qb.push("scraped_at >= ").push_bind(cutoff.clone());
            }
        }
    }
}
