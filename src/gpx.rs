//! GPX track reader.
//!
//! Extracts `trkpt` elements in document order. Files without track points
//! fall back to `rtept` (route) elements. Element names are matched by local
//! name, so both prefixed and default-namespace documents are accepted.
//!
//! Each point must carry parsable `lat`/`lon` attributes; a bad coordinate fails
//! the whole file. The nested `<ele>` value is optional and an unparsable one is
//! read as "no elevation".

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Result, TourError};
use crate::TrackPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointKind {
    Track,
    Route,
}

// A point element that has been opened but not yet closed.
#[derive(Debug)]
struct PendingPoint {
    kind: PointKind,
    longitude: f64,
    latitude: f64,
    elevation: Option<f64>,
    ele_seen: bool,
}

impl PendingPoint {
    fn from_element(e: &BytesStart<'_>, kind: PointKind, index: usize) -> Result<Self> {
        let mut lat = None;
        let mut lon = None;
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            match attr.key.local_name().as_ref() {
                b"lat" => lat = Some(attr.unescape_value()?.into_owned()),
                b"lon" => lon = Some(attr.unescape_value()?.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            kind,
            latitude: parse_coordinate(lat, "lat", index)?,
            longitude: parse_coordinate(lon, "lon", index)?,
            elevation: None,
            ele_seen: false,
        })
    }

    fn finish(self) -> TrackPoint {
        TrackPoint::new(self.longitude, self.latitude, self.elevation)
    }
}

fn parse_coordinate(raw: Option<String>, name: &str, index: usize) -> Result<f64> {
    let raw = raw.ok_or_else(|| TourError::InvalidPoint {
        index,
        reason: format!("missing {name} attribute"),
    })?;
    raw.trim().parse::<f64>().map_err(|_| TourError::InvalidPoint {
        index,
        reason: format!("unparsable {name} {raw:?}"),
    })
}

fn point_kind(name: &[u8]) -> Option<PointKind> {
    match name {
        b"trkpt" => Some(PointKind::Track),
        b"rtept" => Some(PointKind::Route),
        _ => None,
    }
}

/// Parse the points of a GPX document.
///
/// Returns track points if the document has any, otherwise route points.
///
/// # Example
/// ```
/// use tour_pipeline::gpx::parse_track_points;
///
/// let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><trk><trkseg>
///   <trkpt lat="50.1163" lon="-122.9574"><ele>675.2</ele></trkpt>
///   <trkpt lat="50.1080" lon="-122.9490"/>
/// </trkseg></trk></gpx>"#;
///
/// let points = parse_track_points(xml).unwrap();
/// assert_eq!(points.len(), 2);
/// assert_eq!(points[0].elevation, Some(675.2));
/// assert_eq!(points[1].elevation, None);
/// ```
pub fn parse_track_points(xml: &str) -> Result<Vec<TrackPoint>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut track = Vec::new();
    let mut route = Vec::new();
    let mut open: Option<PendingPoint> = None;
    // Element depth below the open point; `ele` only counts as a direct child.
    let mut depth = 0usize;
    let mut in_ele = false;
    let mut ele_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = e.local_name();
                if open.is_some() {
                    depth += 1;
                    if depth == 1 && name.as_ref() == b"ele" {
                        in_ele = true;
                        ele_text.clear();
                    }
                } else if let Some(kind) = point_kind(name.as_ref()) {
                    let index = count(kind, &track, &route);
                    open = Some(PendingPoint::from_element(&e, kind, index)?);
                    depth = 0;
                }
            }
            Event::Empty(e) => {
                if open.is_none() {
                    if let Some(kind) = point_kind(e.local_name().as_ref()) {
                        let index = count(kind, &track, &route);
                        let point = PendingPoint::from_element(&e, kind, index)?;
                        push(point, &mut track, &mut route);
                    }
                }
            }
            Event::Text(t) if in_ele => {
                ele_text.push_str(&t.unescape()?);
            }
            Event::End(e) if open.is_some() => {
                if depth == 0 {
                    if point_kind(e.local_name().as_ref()).is_some() {
                        if let Some(point) = open.take() {
                            push(point, &mut track, &mut route);
                        }
                    }
                } else {
                    if depth == 1 && in_ele {
                        in_ele = false;
                        if let Some(point) = open.as_mut().filter(|p| !p.ele_seen) {
                            point.ele_seen = true;
                            point.elevation = ele_text.trim().parse::<f64>().ok();
                        }
                    }
                    depth -= 1;
                }
            }
            _ => {}
        }
    }

    if track.is_empty() {
        Ok(route)
    } else {
        Ok(track)
    }
}

fn count(kind: PointKind, track: &[TrackPoint], route: &[TrackPoint]) -> usize {
    match kind {
        PointKind::Track => track.len(),
        PointKind::Route => route.len(),
    }
}

fn push(point: PendingPoint, track: &mut Vec<TrackPoint>, route: &mut Vec<TrackPoint>) {
    match point.kind {
        PointKind::Track => track.push(point.finish()),
        PointKind::Route => route.push(point.finish()),
    }
}

/// Read and parse one GPX file.
pub fn read_track_points(path: &Path) -> Result<Vec<TrackPoint>> {
    let xml = fs::read_to_string(path).map_err(|e| TourError::io(path, e))?;
    let points = parse_track_points(&xml)?;
    debug!("Read {} points from {}", points.len(), path.display());
    Ok(points)
}

/// Read many GPX files, keeping the input order.
///
/// Each file yields its own result so one bad track does not affect the others.
pub fn read_all_tracks(paths: &[PathBuf]) -> Vec<Result<Vec<TrackPoint>>> {
    #[cfg(feature = "parallel")]
    {
        paths.par_iter().map(|p| read_track_points(p)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        paths.iter().map(|p| read_track_points(p)).collect()
    }
}
