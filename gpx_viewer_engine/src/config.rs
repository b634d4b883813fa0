use geo::Coord;
use gpx_viewer_lib::color::Color;

/// Knobs for a viewer session. The defaults match the stock web viewer.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Color given to tracks ingested without an explicit one.
    pub default_color: Color,
    /// Line layer width in pixels.
    pub line_width: f64,
    /// Padding in pixels applied when fitting the map to the track bounds.
    pub fit_padding: u32,
    /// Initial map center, `x` = lon, `y` = lat.
    pub initial_center: Coord<f64>,
    pub initial_zoom: f64,
    /// How close (in meters) a click must be to a track for it to be reported.
    pub query_tolerance_m: f64,
    /// Capacity of the session command channel.
    pub channel_capacity: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_color: Color::black(),
            line_width: 3.,
            fit_padding: 20,
            initial_center: Coord { x: 0., y: 20. },
            initial_zoom: 2.,
            query_tolerance_m: 50.,
            channel_capacity: 100,
        }
    }
}
