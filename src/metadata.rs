//! Tour metadata from track filenames.
//!
//! Track files follow the convention
//!
//! ```text
//! <Title tokens...>_<COUNTRY>_<PROVINCE>_<Region>_<direction>.gpx
//! ```
//!
//! The last four tokens are positional; everything before them is the title,
//! which may itself contain separators. Hyphens count as separators too, so
//! `Mt-Brew_Ridge_CAN_BC_Squamish_up` has the title "Mt Brew Ridge".
//!
//! Names that do not have enough tokens are reported as
//! [`SlugMetadata::Unrecognized`] instead of being silently defaulted.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Number of positional tokens at the end of a conventional slug.
const POSITIONAL_TOKENS: usize = 4;

/// ISO 3166 alpha-3 codes with display names.
pub const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("CAN", "Canada"),
    ("USA", "United States"),
    ("AUT", "Austria"),
    ("DEU", "Germany"),
    ("CHE", "Switzerland"),
];

/// Canadian province and territory codes with display names.
pub const PROVINCE_NAMES: &[(&str, &str)] = &[
    ("BC", "British Columbia"),
    ("AB", "Alberta"),
    ("YT", "Yukon"),
    ("NT", "Northwest Territories"),
    ("NU", "Nunavut"),
];

/// Known tour directions.
pub const DIRECTIONS: &[&str] = &["up", "down", "loop", "traverse"];

/// Descriptive fields of a tour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourMetadata {
    pub title: String,
    pub country_code: String,
    pub country: String,
    pub province_code: String,
    pub province: String,
    pub region: String,
    pub direction: String,
}

/// Outcome of parsing a slug against the filename convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugMetadata {
    /// The slug has a title and all four positional tokens.
    Parsed(TourMetadata),
    /// Too few tokens; only a humanized title is available.
    Unrecognized { title: String },
}

impl SlugMetadata {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Parsed(meta) => &meta.title,
            Self::Unrecognized { title } => title,
        }
    }

    /// Flatten into a full record, with empty structured fields when unrecognized.
    pub fn into_metadata(self) -> TourMetadata {
        match self {
            Self::Parsed(meta) => meta,
            Self::Unrecognized { title } => TourMetadata { title, ..TourMetadata::default() },
        }
    }
}

/// The slug of a track: its file stem.
pub fn slug_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Humanize a slug: separators become spaces, words are title-cased.
///
/// ```
/// use tour_pipeline::metadata::title_from_slug;
/// assert_eq!(title_from_slug("mt-brew_ridge"), "Mt Brew Ridge");
/// ```
pub fn title_from_slug(slug: &str) -> String {
    title_case(&slug.replace(['-', '_'], " "))
}

/// Infer tour metadata from a slug.
///
/// # Example
/// ```
/// use tour_pipeline::metadata::{parse_slug, SlugMetadata};
///
/// let SlugMetadata::Parsed(meta) = parse_slug("Ginpeak_CAN_BC_Whistler_up") else {
///     panic!("expected a conventional slug");
/// };
/// assert_eq!(meta.title, "Ginpeak");
/// assert_eq!(meta.country, "Canada");
/// assert_eq!(meta.province, "British Columbia");
/// assert_eq!(meta.region, "Whistler");
/// assert_eq!(meta.direction, "up");
/// ```
pub fn parse_slug(slug: &str) -> SlugMetadata {
    let normalized = slug.replace('-', "_");
    let parts: Vec<&str> = normalized.split('_').filter(|p| !p.is_empty()).collect();

    if parts.len() <= POSITIONAL_TOKENS {
        return SlugMetadata::Unrecognized { title: title_from_slug(slug) };
    }

    let (title_parts, codes) = parts.split_at(parts.len() - POSITIONAL_TOKENS);
    let country_code = codes[0].to_uppercase();
    let province_code = codes[1].to_uppercase();
    let region = codes[2];
    let direction = codes[3].to_lowercase();

    let title_raw = title_parts.join(" ");
    let title = match title_raw.trim() {
        "" => title_from_slug(slug),
        raw => title_case(raw),
    };

    SlugMetadata::Parsed(TourMetadata {
        title,
        country: lookup(COUNTRY_NAMES, &country_code).to_string(),
        country_code,
        province: lookup(PROVINCE_NAMES, &province_code).to_string(),
        province_code,
        region: title_case(region),
        direction: direction_name(&direction).to_string(),
    })
}

/// Display name for a code; unknown codes are their own display name.
fn lookup<'a>(table: &'a [(&'a str, &'a str)], code: &'a str) -> &'a str {
    table
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

fn direction_name(direction: &str) -> &str {
    DIRECTIONS
        .iter()
        .find(|known| **known == direction)
        .copied()
        .unwrap_or(direction)
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
