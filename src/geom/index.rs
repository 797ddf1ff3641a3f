use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rstar::{AABB, RTree};

use super::bbox::PolygonEnvelope;

/// R-tree over the envelopes of a polygon layer, answering point-in-polygon
/// queries without scanning every boundary.
#[derive(Debug, Clone)]
pub struct PolygonIndex {
    rtree: RTree<PolygonEnvelope>,
}

impl PolygonIndex {
    /// Empty polygons (no bounding rectangle) are never matched.
    pub fn new(shapes: &[MultiPolygon<f64>]) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect()
                        .map(|rect| PolygonEnvelope::new(i, rect)))
                    .collect()
            ),
        }
    }

    /// Positions of the polygons in `shapes` that strictly contain `point`,
    /// in ascending order. `shapes` must be the slice the index was built from.
    pub fn containing(&self, shapes: &[MultiPolygon<f64>], point: Point<f64>) -> Vec<usize> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut hits = self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(PolygonEnvelope::position)
            .filter(|&i| shapes[i].contains(&point))
            .collect::<Vec<_>>();
        hits.sort_unstable();
        hits
    }
}

#[cfg(test)]
mod tests {
    use geo::{Rect, coord};

    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![
            Rect::new(coord! { x: x0, y: y0 }, coord! { x: x0 + size, y: y0 + size }).to_polygon(),
        ])
    }

    #[test]
    fn finds_the_containing_square() {
        let shapes = vec![square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0), square(5.0, 5.0, 1.0)];
        let index = PolygonIndex::new(&shapes);
        assert_eq!(index.containing(&shapes, Point::new(0.5, 0.5)), vec![0]);
        assert_eq!(index.containing(&shapes, Point::new(5.5, 5.5)), vec![2]);
        assert_eq!(index.containing(&shapes, Point::new(1.5, 0.2)), vec![1]);
        assert!(index.containing(&shapes, Point::new(3.0, 3.0)).is_empty());
    }

    #[test]
    fn boundary_points_are_not_contained() {
        let shapes = vec![square(0.0, 0.0, 1.0)];
        let index = PolygonIndex::new(&shapes);
        assert!(index.containing(&shapes, Point::new(1.0, 0.5)).is_empty());
    }
}
