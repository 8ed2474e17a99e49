//! Southeast Asian location classification.
//!
//! Matching is a case-insensitive substring test against a fixed alias table
//! (country names plus major cities). There is no geocoding: a location that
//! does not literally contain a known alias is rejected, even when it is in
//! fact in the region.
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Country {
    Indonesia,
    Malaysia,
    Thailand,
    Vietnam,
    Singapore,
}

impl Country {
    pub const ALL: [Country; 5] = [
        Country::Indonesia,
        Country::Malaysia,
        Country::Thailand,
        Country::Vietnam,
        Country::Singapore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Country::Indonesia => "Indonesia",
            Country::Malaysia => "Malaysia",
            Country::Thailand => "Thailand",
            Country::Vietnam => "Vietnam",
            Country::Singapore => "Singapore",
        }
    }

    /// Country name first, then major cities.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Country::Indonesia => &["Indonesia", "Jakarta", "Surabaya", "Bandung", "Medan"],
            Country::Malaysia => &[
                "Malaysia",
                "Kuala Lumpur",
                "Penang",
                "Johor Bahru",
                "Selangor",
            ],
            Country::Thailand => &["Thailand", "Bangkok", "Chiang Mai", "Phuket", "Pattaya"],
            Country::Vietnam => &["Vietnam", "Ho Chi Minh City", "Hanoi", "Da Nang", "Hue"],
            Country::Singapore => &["Singapore"],
        }
    }

    /// Location string handed to the scraping service for this country.
    pub fn scrape_location(&self) -> &'static str {
        match self {
            Country::Indonesia => "Jakarta, Indonesia",
            Country::Malaysia => "Kuala Lumpur, Malaysia",
            Country::Thailand => "Bangkok, Thailand",
            Country::Vietnam => "Ho Chi Minh City, Vietnam",
            Country::Singapore => "Singapore",
        }
    }

    /// Case-insensitive lookup by country name.
    pub fn parse(name: &str) -> Option<Country> {
        let name = name.trim();
        Country::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static LOWERCASE_ALIASES: Lazy<Vec<(Country, String)>> = Lazy::new(|| {
    Country::ALL
        .into_iter()
        .flat_map(|c| c.aliases().iter().map(move |a| (c, a.to_lowercase())))
        .collect()
});

/// True iff `location` contains any known alias of any recognized country.
pub fn is_sea_location(location: &str) -> bool {
    country_of(location).is_some()
}

/// Same as [`is_sea_location`] for an optional location; `None` is rejected.
pub fn is_sea_location_opt(location: Option<&str>) -> bool {
    location.map(is_sea_location).unwrap_or(false)
}

/// First country (in table order) with an alias contained in `location`.
pub fn country_of(location: &str) -> Option<Country> {
    if location.trim().is_empty() {
        return None;
    }
    let lower = location.to_lowercase();
    LOWERCASE_ALIASES
        .iter()
        .find(|(_, alias)| lower.contains(alias.as_str()))
        .map(|(country, _)| *country)
}

/// Statistics bucket for a stored location: the country name, or `"Other"`.
pub fn bucket(location: Option<&str>) -> &'static str {
    location
        .and_then(country_of)
        .map(|c| c.as_str())
        .unwrap_or("Other")
}

/// True iff `location` contains one of the five country names (cities alone
/// do not count). Used to validate scrape requests.
pub fn names_recognized_country(location: &str) -> bool {
    let lower = location.to_lowercase();
    Country::ALL
        .iter()
        .any(|c| lower.contains(&c.as_str().to_lowercase()))
}
