//! Static HTML page per tour.
//!
//! Each detail record is combined with the tour's Markdown notes and the page
//! template (`templates/tour_page.html`). Templates use `{{TOKEN}}`
//! placeholders:
//!
//! | Token | Value |
//! |-------|-------|
//! | `TITLE`, `SLUG` | HTML-escaped |
//! | `PROVINCE`, `REGION` | HTML-escaped, "—" when empty |
//! | `GPX_URL`, `DETAIL_GEOJSON_URL` | page-relative, HTML-escaped |
//! | `CONTENT_HTML` | rendered notes |
//! | `COORDS_JSON` | `[[lat, lon], ...]` for map scripts |
//! | `TITLE_JSON` | title as a JSON string literal |
//! | `BUILT_AT` | local build time, `%Y-%m-%d %H:%M` |
//!
//! Missing notes are scaffolded from `tours_md/_template.md`, which uses
//! the same token syntax. Existing notes are never touched.
//!
//! Pages are only rebuilt when older than any of their inputs, unless a
//! rerun is requested.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::SystemTime;

use chrono::Local;
use log::{debug, info, warn};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::{Result, TourError};
use crate::geojson::{
    load_overview_by_slug, merge_with_fallback, read_json, write_text, Feature, GeoJsonDocument, Properties,
};
use crate::markdown::{self, escape_html};
use crate::metadata::slug_from_path;
use crate::BuildReport;

/// Placeholder shown for an empty province or region.
const EMPTY_FIELD: &str = "—";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([A-Z_]+)\}\}").expect("valid token pattern"));

/// Options of the page stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageOptions {
    /// Rebuild every page, ignoring modification times.
    pub rerun: bool,
}

// ============================================================================
// Helpers
// ============================================================================

/// Rewrite a site-root-relative URL so it resolves from `tours/<slug>.html`.
///
/// ```
/// use tour_pipeline::pages::as_page_relative;
/// assert_eq!(as_page_relative("./tracks/x.gpx"), "../tracks/x.gpx");
/// assert_eq!(as_page_relative("../y.gpx"), "../y.gpx");
/// assert_eq!(as_page_relative("https://example.com/a.gpx"), "https://example.com/a.gpx");
/// ```
pub fn as_page_relative(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("../") {
        return url.to_string();
    }
    match url.strip_prefix("./") {
        Some(rest) => format!("../{rest}"),
        None => format!("../{}", url.trim_start_matches('/')),
    }
}

/// Replace every known `{{TOKEN}}` in a single pass.
///
/// Unknown tokens are left in place. Substituted values are never rescanned,
/// so notes that mention a token literally stay as written.
pub fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            values
                .iter()
                .find(|(token, _)| *token == name)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// `[[lat, lon], ...]` from a LineString-like geometry, `[]` when there is none.
pub fn coords_json(geometry: &Value) -> String {
    let Some(coords) = geometry.get("coordinates").and_then(Value::as_array) else {
        return "[]".to_string();
    };
    if !coords.first().is_some_and(Value::is_array) {
        return "[]".to_string();
    }

    let lat_lon: Vec<[&Value; 2]> = coords
        .iter()
        .filter_map(Value::as_array)
        .filter(|c| c.len() >= 2)
        .map(|c| [&c[1], &c[0]])
        .collect();
    serde_json::to_string(&lat_lon).unwrap_or_else(|_| "[]".to_string())
}

/// Whether `page` exists and is at least as new as every input.
///
/// Any unreadable timestamp counts as stale.
pub fn is_up_to_date(page: &Path, inputs: &[&Path]) -> bool {
    let Some(built) = modified(page) else {
        return false;
    };
    inputs.iter().all(|input| modified(input).is_some_and(|changed| built >= changed))
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Text of a property: strings as-is, null or absent as empty, others as JSON.
fn prop_text(props: &Properties, key: &str) -> String {
    match props.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// First non-blank text among `keys`, trimmed.
fn first_text(props: &Properties, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| prop_text(props, key).trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

fn or_placeholder(text: &str) -> String {
    if text.is_empty() {
        EMPTY_FIELD.to_string()
    } else {
        escape_html(text)
    }
}

// ============================================================================
// Notes
// ============================================================================

/// Create the notes file of a tour from the notes template if it is missing.
///
/// Returns whether the file was created. A missing template is only an error
/// when a scaffold is actually needed.
pub fn scaffold_notes_if_missing(
    notes_path: &Path,
    template_path: &Path,
    slug: &str,
    props: &Properties,
) -> Result<bool> {
    if notes_path.exists() {
        return Ok(false);
    }
    if !template_path.is_file() {
        return Err(TourError::MissingFile { what: "markdown template", path: template_path.to_path_buf() });
    }

    let template = fs::read_to_string(template_path).map_err(|e| TourError::io(template_path, e))?;
    let title = match prop_text(props, "title") {
        title if title.is_empty() => slug.to_string(),
        title => title,
    };
    let values = [
        ("SLUG", slug.to_string()),
        ("TITLE", title),
        ("PROVINCE", prop_text(props, "province")),
        ("REGION", prop_text(props, "region")),
        ("COUNTRY", prop_text(props, "country")),
        ("DIRECTION", prop_text(props, "direction")),
    ];

    write_text(notes_path, &fill_template(&template, &values))?;
    Ok(true)
}

// ============================================================================
// Pages
// ============================================================================

/// Token values of one page, except `BUILT_AT`.
pub fn page_values(
    slug: &str,
    props: &Properties,
    geometry: &Value,
    content_html: String,
) -> Vec<(&'static str, String)> {
    let title = match first_text(props, &["title"]) {
        title if title.is_empty() => slug.to_string(),
        title => title,
    };
    let province = first_text(props, &["province", "province_code"]);
    let region = first_text(props, &["region"]);

    let gpx = match prop_text(props, "gpx") {
        gpx if gpx.is_empty() => format!("./tracks/{slug}.gpx"),
        gpx => gpx,
    };
    let gpx_url = as_page_relative(&gpx);
    let detail_url = as_page_relative(&format!("./data/tours_detail/{slug}.geojson"));

    vec![
        ("TITLE", escape_html(&title)),
        ("PROVINCE", or_placeholder(&province)),
        ("REGION", or_placeholder(&region)),
        ("GPX_URL", if gpx_url.is_empty() { "#".to_string() } else { escape_html(&gpx_url) }),
        ("CONTENT_HTML", content_html),
        ("COORDS_JSON", coords_json(geometry)),
        ("TITLE_JSON", Value::String(title).to_string()),
        ("SLUG", escape_html(slug)),
        ("DETAIL_GEOJSON_URL", escape_html(&detail_url)),
    ]
}

/// Read one detail file as a feature.
///
/// Unreadable or invalid JSON is an error; valid JSON that is neither a
/// feature nor a non-empty collection is `Ok(None)`.
fn read_detail_feature(path: &Path) -> Result<Option<Feature<Value>>> {
    let value: Value = read_json(path)?;
    Ok(serde_json::from_value::<GeoJsonDocument>(value)
        .ok()
        .and_then(GeoJsonDocument::into_first_feature))
}

/// Render `tours/<slug>.html` for every detail record.
///
/// Fails if the detail directory, its files or the page template are missing,
/// or if notes must be scaffolded without a notes template. Unreadable detail
/// files are logged and counted as failed.
pub fn build_pages(config: &PipelineConfig, options: PageOptions) -> Result<BuildReport> {
    let layout = &config.layout;
    let files = layout.detail_files()?;
    if !layout.page_template.is_file() {
        return Err(TourError::MissingFile { what: "HTML template", path: layout.page_template.clone() });
    }

    fs::create_dir_all(&layout.pages_dir).map_err(|e| TourError::io(&layout.pages_dir, e))?;
    fs::create_dir_all(&layout.notes_dir).map_err(|e| TourError::io(&layout.notes_dir, e))?;

    let overview = load_overview_by_slug(&layout.overview_path);
    let template = fs::read_to_string(&layout.page_template).map_err(|e| TourError::io(&layout.page_template, e))?;
    let renderer = markdown::default_renderer();
    debug!("Rendering notes with the {} renderer", renderer.name());

    let mut report = BuildReport::default();

    for path in &files {
        let feature = match read_detail_feature(path) {
            Ok(Some(feature)) => feature,
            Ok(None) => {
                warn!("Skipping {}", TourError::InvalidFeature { path: path.clone() });
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        };

        let slug = feature.slug().map(str::to_string).unwrap_or_else(|| slug_from_path(path));
        let props = match overview.get(&slug) {
            Some(fallback) => merge_with_fallback(fallback, &feature.properties),
            None => feature.properties,
        };

        let notes_path = layout.notes_path(&slug);
        if scaffold_notes_if_missing(&notes_path, &layout.notes_template, &slug, &props)? {
            info!("Created notes {}", notes_path.display());
            report.created_notes += 1;
        }

        let page_path = layout.page_path(&slug);
        if options.rerun {
            if page_path.exists() {
                report.forced += 1;
            }
        } else if is_up_to_date(&page_path, &[layout.page_template.as_path(), notes_path.as_path(), path.as_path()]) {
            debug!("Up to date: {}", slug);
            report.up_to_date += 1;
            continue;
        }

        let notes = match fs::read_to_string(&notes_path) {
            Ok(notes) => notes,
            Err(e) => {
                warn!("Skipping {}: {}", slug, TourError::io(&notes_path, e));
                report.failed += 1;
                continue;
            }
        };
        let content_html = markdown::render(renderer.as_ref(), &notes);

        let mut values = page_values(&slug, &props, &feature.geometry, content_html);
        values.push(("BUILT_AT", Local::now().format("%Y-%m-%d %H:%M").to_string()));

        write_text(&page_path, &fill_template(&template, &values))?;
        debug!("Wrote page {}", page_path.display());
        report.written += 1;
    }

    info!("Created markdown files: {}", report.created_notes);
    info!("Built tour pages: {}", report.written);
    if options.rerun {
        info!("Forced overwrites: {}", report.forced);
    } else {
        info!("Skipped (up to date): {}", report.up_to_date);
    }
    info!("Output folder: {}", layout.pages_dir.display());
    report.log_summary("pages");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs::File;
    use std::time::Duration;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn value_of<'a>(values: &'a [(&str, String)], token: &str) -> &'a str {
        &values.iter().find(|(t, _)| *t == token).unwrap().1
    }

    #[test]
    fn test_as_page_relative() {
        assert_eq!(as_page_relative(""), "");
        assert_eq!(as_page_relative("  "), "");
        assert_eq!(as_page_relative("./tracks/x.gpx"), "../tracks/x.gpx");
        assert_eq!(as_page_relative("../y.gpx"), "../y.gpx");
        assert_eq!(as_page_relative("http://a.b/c"), "http://a.b/c");
        assert_eq!(as_page_relative("https://a.b/c"), "https://a.b/c");
        assert_eq!(as_page_relative("/tracks/x.gpx"), "../tracks/x.gpx");
        assert_eq!(as_page_relative("tracks/x.gpx"), "../tracks/x.gpx");
    }

    #[test]
    fn test_fill_template_single_pass() {
        let values = [("TITLE", "A {{SLUG}}".to_string()), ("SLUG", "a".to_string())];
        let out = fill_template("<h1>{{TITLE}}</h1>{{SLUG}}{{UNKNOWN}}", &values);
        assert_eq!(out, "<h1>A {{SLUG}}</h1>a{{UNKNOWN}}");
    }

    #[test]
    fn test_coords_json_swaps_to_lat_lon() {
        let geometry = json!({"type": "LineString", "coordinates": [[-122.9, 50.1, 700.0], [-122.8, 50.2, null]]});
        assert_eq!(coords_json(&geometry), "[[50.1,-122.9],[50.2,-122.8]]");
    }

    #[test]
    fn test_coords_json_unavailable() {
        assert_eq!(coords_json(&Value::Null), "[]");
        assert_eq!(coords_json(&json!({"type": "Point", "coordinates": [1.0, 2.0]})), "[]");
        assert_eq!(coords_json(&json!({"coordinates": []})), "[]");
    }

    #[test]
    fn test_page_values_escape_and_placeholders() {
        let p = props(json!({"title": "Tom & Jerry <Ridge>", "province": "", "province_code": "", "gpx": ""}));
        let values = page_values("tj", &p, &Value::Null, "<p>x</p>".to_string());

        assert_eq!(value_of(&values, "TITLE"), "Tom &amp; Jerry &lt;Ridge&gt;");
        assert_eq!(value_of(&values, "TITLE_JSON"), r#""Tom & Jerry <Ridge>""#);
        assert_eq!(value_of(&values, "PROVINCE"), "—");
        assert_eq!(value_of(&values, "REGION"), "—");
        assert_eq!(value_of(&values, "GPX_URL"), "../tracks/tj.gpx");
        assert_eq!(value_of(&values, "DETAIL_GEOJSON_URL"), "../data/tours_detail/tj.geojson");
        assert_eq!(value_of(&values, "CONTENT_HTML"), "<p>x</p>");
        assert_eq!(value_of(&values, "COORDS_JSON"), "[]");
    }

    #[test]
    fn test_page_values_fallbacks() {
        let p = props(json!({
            "title": "  ",
            "province_code": "BC",
            "region": "Whistler",
            "gpx": "https://x.org/a.gpx"
        }));
        let values = page_values("slug_a", &p, &Value::Null, String::new());
        assert_eq!(value_of(&values, "TITLE"), "slug_a");
        assert_eq!(value_of(&values, "PROVINCE"), "BC");
        assert_eq!(value_of(&values, "REGION"), "Whistler");
        assert_eq!(value_of(&values, "GPX_URL"), "https://x.org/a.gpx");
    }

    #[test]
    fn test_scaffold_notes() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("_template.md");
        let notes = dir.path().join("a.md");
        fs::write(&template, "# {{TITLE}}\n{{PROVINCE}} / {{REGION}} / {{COUNTRY}} ({{DIRECTION}}) {{SLUG}}").unwrap();

        let p = props(json!({
            "province": "British Columbia",
            "region": "Whistler",
            "country": "Canada",
            "direction": "up"
        }));
        assert!(scaffold_notes_if_missing(&notes, &template, "a", &p).unwrap());
        assert_eq!(fs::read_to_string(&notes).unwrap(), "# a\nBritish Columbia / Whistler / Canada (up) a");

        fs::write(&notes, "edited").unwrap();
        assert!(!scaffold_notes_if_missing(&notes, &template, "a", &p).unwrap());
        assert_eq!(fs::read_to_string(&notes).unwrap(), "edited");
    }

    #[test]
    fn test_missing_notes_template_only_matters_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("missing.md");
        let notes = dir.path().join("a.md");

        let err = scaffold_notes_if_missing(&notes, &template, "a", &Properties::new()).unwrap_err();
        assert!(matches!(err, TourError::MissingFile { .. }));

        fs::write(&notes, "exists").unwrap();
        assert!(!scaffold_notes_if_missing(&notes, &template, "a", &Properties::new()).unwrap());
    }

    #[test]
    fn test_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.geojson");
        let page = dir.path().join("out.html");
        fs::write(&input, "{}").unwrap();
        assert!(!is_up_to_date(&page, &[input.as_path()]));

        fs::write(&page, "").unwrap();
        let now = SystemTime::now();
        File::options().write(true).open(&input).unwrap().set_modified(now - Duration::from_secs(60)).unwrap();
        File::options().write(true).open(&page).unwrap().set_modified(now).unwrap();
        assert!(is_up_to_date(&page, &[input.as_path()]));

        File::options().write(true).open(&input).unwrap().set_modified(now + Duration::from_secs(60)).unwrap();
        assert!(!is_up_to_date(&page, &[input.as_path()]));

        let missing = dir.path().join("gone.md");
        assert!(!is_up_to_date(&page, &[missing.as_path()]));
    }
}
