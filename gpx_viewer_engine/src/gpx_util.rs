use chrono::NaiveDate;
use geo::{Coord, LineString};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use gpx::Gpx;

const UNNAMED: &str = "Unnamed";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed GPX: {0}")]
    Malformed(String),
    #[error("GPX document contains no track")]
    MissingTrack,
    #[error("track contains no segment")]
    MissingSegment,
    #[error("track contains no points")]
    MissingPoint,
    #[error("feature has no LineString geometry")]
    NoGeometry,
}

/// Geometry and display name extracted from one GPX file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrack {
    pub name: String,
    pub geometry: LineString<f64>,
}

/// Parses GPX text into the first track's geometry and normalized name.
pub fn parse_gpx(text: &str) -> Result<ParsedTrack, ParseError> {
    let gpx = gpx::read(text.as_bytes()).map_err(|err| ParseError::Malformed(err.to_string()))?;
    validate(&gpx)?;

    let collection = to_feature_collection(&gpx);
    normalize(&collection)
}

/// Fails only if no track at all carries a point. Empty tracks are skipped later.
fn validate(gpx: &Gpx) -> Result<(), ParseError> {
    if gpx.tracks.is_empty() {
        return Err(ParseError::MissingTrack);
    }

    if gpx.tracks.iter().all(|track| track.segments.is_empty()) {
        return Err(ParseError::MissingSegment);
    }

    let has_point = gpx.tracks.iter()
        .flat_map(|track| track.segments.iter())
        .any(|segment| !segment.points.is_empty());
    if !has_point {
        return Err(ParseError::MissingPoint);
    }

    Ok(())
}

/// One LineString feature per track, segments concatenated. Tracks without points are left out.
pub fn to_feature_collection(gpx: &Gpx) -> FeatureCollection {
    let metadata_name = gpx.metadata.as_ref().and_then(|meta| meta.name.clone());

    let features = gpx.tracks.iter()
        .filter_map(|track| {
            let line: Vec<Vec<f64>> = track.segments.iter()
                .flat_map(|segment| segment.points.iter())
                .map(|point| {
                    let p = point.point();
                    vec![p.x(), p.y()]
                })
                .collect();

            if line.is_empty() {
                return None;
            }

            let mut properties = JsonObject::new();
            if let Some(name) = track.name.clone().or_else(|| metadata_name.clone()) {
                properties.insert("name".into(), JsonValue::from(name));
            }

            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::LineString(line))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Takes the first feature as the canonical track.
pub fn normalize(collection: &FeatureCollection) -> Result<ParsedTrack, ParseError> {
    let feature = collection.features.first().ok_or(ParseError::MissingTrack)?;

    let Some(Value::LineString(line)) = feature.geometry.as_ref().map(|geometry| &geometry.value) else {
        return Err(ParseError::NoGeometry);
    };

    let coords: Vec<Coord<f64>> = line.iter()
        .filter(|position| position.len() >= 2)
        .map(|position| Coord { x: position[0], y: position[1] })
        .filter(|coord| coord.x.is_finite() && coord.y.is_finite())
        .collect();

    if coords.is_empty() {
        return Err(ParseError::MissingPoint);
    }

    let raw_name = feature.properties.as_ref()
        .and_then(|properties| properties.get("name"))
        .and_then(JsonValue::as_str)
        .unwrap_or(UNNAMED);

    Ok(ParsedTrack {
        name: normalize_name(raw_name),
        geometry: LineString::from(coords),
    })
}

/// `20230814_MorningRun` becomes `14/08/2023 - MorningRun`. Anything else is kept as is.
pub fn normalize_name(raw: &str) -> String {
    let raw = raw.trim();

    if let Some((date, label)) = raw.split_once('_') {
        if let Some(date) = parse_compact_date(date).filter(|_| !label.is_empty()) {
            return format!("{} - {}", date.format("%d/%m/%Y"), label);
        }
    }

    if raw.is_empty() {
        UNNAMED.to_string()
    } else {
        raw.to_string()
    }
}

/// `YYYYMMDD`, exactly eight digits forming a real calendar date.
fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{gpx_document, morning_run, MALFORMED};

    #[test]
    fn parses_morning_run() {
        let parsed = parse_gpx(&morning_run()).unwrap();

        assert_eq!(parsed.name, "14/08/2023 - MorningRun");
        assert_eq!(parsed.geometry.0, vec![
            Coord { x: 0., y: 0. },
            Coord { x: 0., y: 0.001 },
            Coord { x: 0., y: 0.002 },
        ]);
    }

    #[test]
    fn name_normalization() {
        assert_eq!(normalize_name("20230814_MorningRun"), "14/08/2023 - MorningRun");
        assert_eq!(normalize_name("20240229_Leap_Day"), "29/02/2024 - Leap_Day");
        // Not a real date
        assert_eq!(normalize_name("20231340_Run"), "20231340_Run");
        assert_eq!(normalize_name("2023081_Run"), "2023081_Run");
        assert_eq!(normalize_name("20230814_"), "20230814_");
        assert_eq!(normalize_name("  Evening ride "), "Evening ride");
        assert_eq!(normalize_name(""), "Unnamed");
    }

    #[test]
    fn malformed_xml() {
        assert!(matches!(parse_gpx(MALFORMED), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_gpx("not xml at all"), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn missing_track_segment_point() {
        let no_track = r#"<?xml version="1.0"?><gpx version="1.1" creator="t"></gpx>"#;
        assert_eq!(parse_gpx(no_track), Err(ParseError::MissingTrack));

        let no_segment = r#"<?xml version="1.0"?><gpx version="1.1" creator="t"><trk><name>a</name></trk></gpx>"#;
        assert_eq!(parse_gpx(no_segment), Err(ParseError::MissingSegment));

        let no_points = gpx_document("empty", &[]);
        assert_eq!(parse_gpx(&no_points), Err(ParseError::MissingPoint));
    }

    #[test]
    fn falls_back_to_metadata_name() {
        let text = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="t">
  <metadata><name>20220101_NewYear</name></metadata>
  <trk><trkseg><trkpt lat="55.0" lon="9.0"></trkpt></trkseg></trk>
</gpx>"#;

        let parsed = parse_gpx(text).unwrap();
        assert_eq!(parsed.name, "01/01/2022 - NewYear");
        assert_eq!(parsed.geometry.0, vec![Coord { x: 9., y: 55. }]);
    }

    #[test]
    fn unnamed_track() {
        let text = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="t">
  <trk><trkseg><trkpt lat="1" lon="2"></trkpt></trkseg></trk>
</gpx>"#;
        assert_eq!(parse_gpx(text).unwrap().name, "Unnamed");
    }

    #[test]
    fn feature_collection_skips_empty_tracks() {
        let text = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="t">
  <trk><name>first</name><trkseg><trkpt lat="1" lon="2"></trkpt></trkseg><trkseg><trkpt lat="3" lon="4"></trkpt></trkseg></trk>
  <trk><name>empty</name><trkseg></trkseg></trk>
  <trk><name>third</name><trkseg><trkpt lat="5" lon="6"></trkpt></trkseg></trk>
</gpx>"#;
        let gpx = gpx::read(text.as_bytes()).unwrap();
        let collection = to_feature_collection(&gpx);

        assert_eq!(collection.features.len(), 2);
        let Some(Value::LineString(line)) = collection.features[0].geometry.as_ref().map(|g| &g.value) else {
            panic!("expected a LineString");
        };
        // Segments are concatenated in order
        assert_eq!(line, &vec![vec![2., 1.], vec![4., 3.]]);
    }

    #[test]
    fn empty_first_track_falls_through_to_next() {
        let text = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="t">
  <trk><name>empty</name><trkseg></trkseg></trk>
  <trk><name>20230814_MorningRun</name><trkseg>
    <trkpt lat="0" lon="0"></trkpt>
    <trkpt lat="0.001" lon="0"></trkpt>
  </trkseg></trk>
</gpx>"#;

        let parsed = parse_gpx(text).unwrap();
        assert_eq!(parsed.name, "14/08/2023 - MorningRun");
        assert_eq!(parsed.geometry.0, vec![Coord { x: 0., y: 0. }, Coord { x: 0., y: 0.001 }]);
    }

    #[test]
    fn only_empty_tracks_is_missing_point() {
        let text = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="t">
  <trk><name>a</name><trkseg></trkseg></trk>
  <trk><name>b</name></trk>
</gpx>"#;
        assert_eq!(parse_gpx(text), Err(ParseError::MissingPoint));
    }

    #[test]
    fn normalize_rejects_non_line_geometry() {
        let collection = FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![1., 2.]))),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        };
        assert_eq!(normalize(&collection), Err(ParseError::NoGeometry));
    }
}
