/// Closed ring of (lon, lat) vertices: bottom-left, bottom-right, top-right, top-left, bottom-left
pub type Ring = [(f64, f64); 5];

/// Builds the axis-aligned cell around a center point
pub fn build_cell(center_lat: f64, center_lon: f64, half_lat: f64, half_lon: f64) -> Ring {
    let (west, east) = (center_lon - half_lon, center_lon + half_lon);
    let (south, north) = (center_lat - half_lat, center_lat + half_lat);
    [
        (west, south),
        (east, south),
        (east, north),
        (west, north),
        (west, south),
    ]
}
