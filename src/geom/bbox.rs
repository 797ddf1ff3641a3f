use geo::Rect;
use rstar::{AABB, RTreeObject};

/// Envelope of one boundary polygon, stored in the R-tree by position.
#[derive(Debug, Clone)]
pub(super) struct PolygonEnvelope {
    position: usize,
    rect: Rect<f64>,
}

impl PolygonEnvelope {
    #[inline] pub(super) fn new(position: usize, rect: Rect<f64>) -> Self { Self { position, rect } }

    /// Row of the polygon in its layer.
    #[inline] pub(super) fn position(&self) -> usize { self.position }
}

impl RTreeObject for PolygonEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.rect.min().into(), self.rect.max().into())
    }
}
