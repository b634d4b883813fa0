use std::fmt::Write;

/// Builds a single-track, single-segment GPX 1.1 document from (lon, lat) pairs.
pub fn gpx_document(track_name: &str, points: &[(f64, f64)]) -> String {
    let mut gpx = String::new();
    gpx.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    gpx.push('\n');
    gpx.push_str(r#"<gpx version="1.1" creator="gpx-viewer-tests" xmlns="http://www.topografix.com/GPX/1/1">"#);
    gpx.push('\n');
    gpx.push_str("  <trk>\n");
    let _ = writeln!(gpx, "    <name>{}</name>", track_name);
    gpx.push_str("    <trkseg>\n");
    for (lon, lat) in points {
        let _ = writeln!(gpx, r#"      <trkpt lat="{}" lon="{}"></trkpt>"#, lat, lon);
    }
    gpx.push_str("    </trkseg>\n");
    gpx.push_str("  </trk>\n");
    gpx.push_str("</gpx>\n");
    gpx
}

pub const MORNING_RUN: &[(f64, f64)] = &[(0., 0.), (0., 0.001), (0., 0.002)];

pub fn morning_run() -> String {
    gpx_document("20230814_MorningRun", MORNING_RUN)
}

pub const MALFORMED: &str = "<gpx version=\"1.1\"><trk><trkseg><trkpt lat=\"1\"";
