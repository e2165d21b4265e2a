use crate::constants::{COORD_DECIMALS, STYLE_FILL_COLOR, STYLE_ID, VALUE_DECIMALS};
use crate::error::{CityGridError, Result};
use crate::fields::FieldDisplayMap;
use crate::geometry::Ring;
use crate::layer::Feature;
use crate::spacing::SpacingEstimate;

use std::fs;
use std::path::Path;

/// XML escape for element text and attribute values
pub fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Metric value text: integer when |v| > 1, otherwise 4 decimals.
/// Missing and non-finite values are written as 0.
pub fn format_value(value: Option<f64>) -> String {
    let v = match value {
        Some(v) if v.is_finite() => v,
        _ => return "0".to_string(),
    };

    if v.abs() > 1.0 {
        return format!("{:.0}", v.round_ties_even());
    }

    let scale = 10f64.powi(VALUE_DECIMALS);
    let rounded = (v * scale).round_ties_even() / scale;
    if rounded == 0.0 {
        "0".to_string() // no "-0"
    } else {
        rounded.to_string()
    }
}

/// `lon,lat,0` pairs joined by spaces
pub fn format_coordinates(ring: &Ring) -> String {
    ring.iter()
        .map(|(lon, lat)| format!("{:.*},{:.*},0", COORD_DECIMALS, lon, COORD_DECIMALS, lat))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders the whole KML document. Identical input gives identical output.
pub fn render(
    features: &[Feature],
    spacing: &SpacingEstimate,
    display: &FieldDisplayMap,
) -> String {
    let mut lines: Vec<String> = vec![
        r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string(),
        r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#.to_string(),
        "<Document>".to_string(),
    ];

    lines.extend([
        format!(r#"<Style id="{}">"#, STYLE_ID),
        "<PolyStyle>".to_string(),
        format!("<color>{}</color>", STYLE_FILL_COLOR),
        "<outline>0</outline>".to_string(),
        "</PolyStyle>".to_string(),
        "</Style>".to_string(),
    ]);

    for feature in features {
        push_placemark(&mut lines, feature, spacing, display);
    }

    lines.extend(["</Document>".to_string(), "</kml>".to_string()]);
    lines.join("\n")
}

fn push_placemark(
    lines: &mut Vec<String>,
    feature: &Feature,
    spacing: &SpacingEstimate,
    display: &FieldDisplayMap,
) {
    lines.push("<Placemark>".to_string());
    lines.push(format!("<styleUrl>#{}</styleUrl>", STYLE_ID));
    lines.push(format!("<n>{}</n>", xml_escape(&feature.name)));

    for (key, value) in feature.metrics.iter() {
        lines.push(format!(
            r#"<data name="{}">{}</data>"#,
            xml_escape(display.display_name(key)),
            format_value(value)
        ));
    }

    lines.extend([
        "<Polygon>".to_string(),
        "<outerBoundaryIs>".to_string(),
        "<LinearRing>".to_string(),
        format!(
            "<coordinates>{}</coordinates>",
            format_coordinates(&feature.cell(spacing))
        ),
        "</LinearRing>".to_string(),
        "</outerBoundaryIs>".to_string(),
        "</Polygon>".to_string(),
        "</Placemark>".to_string(),
    ]);
}

/// Renders and writes a KML document to `path`
pub fn write_kml<P: AsRef<Path>>(
    path: P,
    features: &[Feature],
    spacing: &SpacingEstimate,
    display: &FieldDisplayMap,
) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, render(features, spacing, display)).map_err(|e| CityGridError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
