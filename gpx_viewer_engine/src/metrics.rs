use geo::Coord;

/// Mean earth radius in meters, spherical approximation.
pub const EARTH_RADIUS_M: f64 = 6_371_000.;

/// Great-circle distance in meters. Coordinates are `x` = lon, `y` = lat in degrees.
/// Antimeridian crossing and the poles are not special-cased.
pub fn haversine_distance(p1: Coord<f64>, p2: Coord<f64>) -> f64 {
    let d_lat = (p2.y - p1.y).to_radians();
    let d_lon = (p2.x - p1.x).to_radians();
    let lat1 = p1.y.to_radians();
    let lat2 = p2.y.to_radians();

    let a = f64::sin(d_lat / 2.).powi(2) + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    // Rounding can push a marginally above 1 for antipodal points
    let c = 2. * f64::asin(f64::sqrt(a.min(1.)));

    EARTH_RADIUS_M * c
}

/// Trip length in kilometers, summed pairwise in point order.
pub fn distance_km(points: &[Coord<f64>]) -> f64 {
    let meters: f64 = points.windows(2).map(|pair| haversine_distance(pair[0], pair[1])).sum();
    meters / 1000.
}

pub fn format_distance(distance_km: f64) -> String {
    format!("{:.2} km", distance_km)
}

/// Text shown when a track is clicked on the map.
pub fn popup_text(name: &str, distance_km: f64) -> String {
    format!("{}<br>Distance: {}", name, format_distance(distance_km))
}
