use geo::{BoundingRect, Coord};
use gpx_viewer_lib::{bounds::Bounds, track::Track};

/// Running union envelope of every ingested point.
///
/// `extend` only ever widens the envelope. `full_recompute` throws the running
/// state away and rebuilds it from the tracks that actually exist.
#[derive(Debug, Clone, Default)]
pub struct BoundsAggregator {
    bounds: Option<Bounds>,
}

impl BoundsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, point: Coord<f64>) {
        match &mut self.bounds {
            Some(bounds) => bounds.extend(point),
            None => self.bounds = Some(Bounds::from_point(point)),
        }
    }

    pub fn extend_all(&mut self, points: impl IntoIterator<Item = Coord<f64>>) {
        for point in points {
            self.extend(point);
        }
    }

    pub fn full_recompute<'a>(&mut self, tracks: impl IntoIterator<Item = &'a Track>) {
        self.bounds = tracks.into_iter()
            .filter_map(|track| track.geometry().bounding_rect())
            .map(Bounds::from)
            .reduce(|acc, bounds| acc.union(&bounds));
    }

    pub fn is_valid(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, LineString};
    use gpx_viewer_lib::{color::Color, track::TrackId};

    fn track(id: u64, points: Vec<(f64, f64)>) -> Track {
        Track::new(TrackId(id), format!("t{id}"), LineString::from(points), 0., Color::black())
    }

    #[test]
    fn empty_is_invalid() {
        let aggregator = BoundsAggregator::new();
        assert!(!aggregator.is_valid());
        assert_eq!(aggregator.bounds(), None);
    }

    #[test]
    fn first_extend_is_degenerate() {
        let mut aggregator = BoundsAggregator::new();
        aggregator.extend(coord! { x: 3., y: 4. });
        assert!(aggregator.is_valid());
        assert_eq!(aggregator.bounds(), Some(Bounds::from_point(coord! { x: 3., y: 4. })));
    }

    #[test]
    fn incremental_matches_recompute() {
        let p1 = coord! { x: 10.196123, y: 56.175188 };
        let p2 = coord! { x: 44.873029, y: 40.664208 };

        let mut incremental = BoundsAggregator::new();
        incremental.extend(p1);
        incremental.extend(p2);

        let mut recomputed = BoundsAggregator::new();
        recomputed.full_recompute(&[track(0, vec![(p1.x, p1.y), (p2.x, p2.y)])]);

        let (a, b) = (incremental.bounds().unwrap(), recomputed.bounds().unwrap());
        assert!(a.approx_eq(&b, 1e-12), "{a:?} != {b:?}");
    }

    #[test]
    fn recompute_discards_stale_state() {
        let mut aggregator = BoundsAggregator::new();
        aggregator.extend_all([coord! { x: -100., y: -80. }, coord! { x: 100., y: 80. }]);

        let tracks = vec![track(0, vec![(0., 0.), (1., 1.)]), track(1, vec![(2., -1.)])];
        aggregator.full_recompute(&tracks);

        assert_eq!(aggregator.bounds().unwrap().to_bbox(), [0., -1., 2., 1.]);

        aggregator.full_recompute(&[]);
        assert!(!aggregator.is_valid());
    }
}
