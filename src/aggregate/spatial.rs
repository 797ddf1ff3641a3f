use anyhow::{Result, bail};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    common::{f64_values, require_columns},
    geom::Crs,
    layer::{PointLayer, PolygonLayer},
};

/// Aggregate applied to one column within each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Sum,
    Mean,
    First,
    /// Non-null values in the group.
    Count,
    Min,
    Max,
}

impl AggFunc {
    /// Polars expression aggregating column `name`, keeping the name.
    pub fn expr(self, name: &str) -> Expr {
        let column = col(name);
        match self {
            AggFunc::Sum => column.sum(),
            AggFunc::Mean => column.mean(),
            AggFunc::First => column.first(),
            AggFunc::Count => column.count(),
            AggFunc::Min => column.min(),
            AggFunc::Max => column.max(),
        }.alias(name)
    }

    /// Whether the source column should be coerced to numbers first.
    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(self, AggFunc::Sum | AggFunc::Mean | AggFunc::Min | AggFunc::Max)
    }
}

/// One output column: `func` over point column `source`, written as `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggColumn {
    pub source: String,
    pub func: AggFunc,
    pub output: String,
}

impl AggColumn {
    pub fn new(source: &str, func: AggFunc, output: &str) -> Self {
        Self { source: source.to_string(), func, output: output.to_string() }
    }
}

/// What to compute per boundary unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    /// Boundary identifier column on the polygon layer.
    pub key: String,
    pub columns: Vec<AggColumn>,
    /// When set, every point counts 1 towards a summed column of this name.
    pub count_column: Option<String>,
}

/// Join points to the polygons containing them and aggregate per boundary key.
///
/// Layers not already in `preferred` are reprojected to it first. Points
/// outside every polygon are dropped; a point inside overlapping polygons
/// counts once for each. One row per key that received at least one point,
/// in no particular order.
pub fn aggregate_points(
    polygons: &PolygonLayer,
    points: &PointLayer,
    spec: &AggregationSpec,
    preferred: Crs,
) -> Result<DataFrame> {
    require_columns(polygons.data(), "boundaries", &[&spec.key])?;
    require_columns(points.data(), "points", &spec.columns.iter().map(|c| &c.source).collect::<Vec<_>>())?;

    let mut outputs = spec.columns.iter().map(|c| c.output.as_str())
        .chain(spec.count_column.as_deref())
        .collect::<Vec<_>>();
    outputs.sort_unstable();
    if outputs.windows(2).any(|w| w[0] == w[1]) || outputs.contains(&spec.key.as_str()) {
        bail!("aggregate output names must be distinct and differ from the key {:?}", spec.key);
    }

    let polygons = if polygons.crs() == preferred { polygons.clone() } else { polygons.to_crs(preferred)? };
    let points = if points.crs() == preferred { points.clone() } else { points.to_crs(preferred)? };

    let mut point_rows: Vec<IdxSize> = Vec::new();
    let mut polygon_rows: Vec<IdxSize> = Vec::new();
    for (i, &point) in points.points().iter().enumerate() {
        for j in polygons.containing(point) {
            point_rows.push(i as IdxSize);
            polygon_rows.push(j as IdxSize);
        }
    }
    debug!("[aggregate] {} of {} points matched a boundary", point_rows.len(), points.len());

    let point_idx = IdxCa::from_vec("point".into(), point_rows);
    let polygon_idx = IdxCa::from_vec("polygon".into(), polygon_rows);

    let mut columns = vec![polygons.data().column(&spec.key)?.take(&polygon_idx)?];
    for agg in &spec.columns {
        let source = if agg.func.is_numeric() {
            Column::new(agg.output.as_str().into(), f64_values(points.data(), "points", &agg.source)?)
        } else {
            points.data().column(&agg.source)?.clone().with_name(agg.output.as_str().into())
        };
        columns.push(source.take(&point_idx)?);
    }
    if let Some(count) = &spec.count_column {
        columns.push(Column::new(count.as_str().into(), vec![1i64; point_idx.len()]));
    }

    let exprs = spec.columns.iter()
        .map(|c| c.func.expr(&c.output))
        .chain(spec.count_column.iter().map(|name| AggFunc::Sum.expr(name)))
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?.lazy()
        .group_by([col(spec.key.as_str())])
        .agg(exprs)
        .collect()?)
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, Point, Rect, coord};
    use polars::df;

    use super::*;

    fn square(x0: f64, y0: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Rect::new(coord! { x: x0, y: y0 }, coord! { x: x0 + 1.0, y: y0 + 1.0 }).to_polygon()])
    }

    fn boundaries() -> PolygonLayer {
        PolygonLayer::new(df!["GEOID" => ["A", "B", "C"]].unwrap(), vec![square(0.0, 0.0), square(1.0, 0.0), square(5.0, 5.0)], Crs::WGS84).unwrap()
    }

    fn sorted_by_key(df: DataFrame) -> DataFrame {
        df.sort(["GEOID"], SortMultipleOptions::default()).unwrap()
    }

    #[test]
    fn sums_follow_containment() {
        let points = PointLayer::new(
            df!["HHPop" => ["4", "6", "3", "9"]].unwrap(),
            vec![Point::new(0.2, 0.2), Point::new(0.8, 0.5), Point::new(1.5, 0.5), Point::new(9.0, 9.0)],
            Crs::WGS84,
        ).unwrap();
        let spec = AggregationSpec {
            key: "GEOID".into(),
            columns: vec![AggColumn::new("HHPop", AggFunc::Sum, "HHPop")],
            count_column: Some("StructCntHHs".into()),
        };

        let result = sorted_by_key(aggregate_points(&boundaries(), &points, &spec, Crs::WGS84).unwrap());
        assert_eq!(result.height(), 2);
        let keys = result.column("GEOID").unwrap().str().unwrap().into_no_null_iter().collect::<Vec<_>>();
        assert_eq!(keys, vec!["A", "B"]);
        let pop = result.column("HHPop").unwrap().f64().unwrap().into_no_null_iter().collect::<Vec<_>>();
        assert_eq!(pop, vec![10.0, 3.0]);
        let counts = result.column("StructCntHHs").unwrap().i64().unwrap().into_no_null_iter().collect::<Vec<_>>();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn mismatched_crs_is_reprojected() {
        let utm = Crs::utm(35, false).unwrap();
        let lusaka = Point::new(28.2833, -15.4167);
        let polygons = PolygonLayer::new(
            df!["GEOID" => ["EA1"]].unwrap(),
            vec![MultiPolygon::new(vec![Rect::new(coord! { x: 28.0, y: -15.6 }, coord! { x: 28.5, y: -15.2 }).to_polygon()])],
            Crs::WGS84,
        ).unwrap();
        let points = PointLayer::new(df!["n" => [1.0]].unwrap(), vec![lusaka], Crs::WGS84).unwrap().to_crs(utm).unwrap();

        let spec = AggregationSpec { key: "GEOID".into(), columns: vec![], count_column: Some("cnt".into()) };
        let result = aggregate_points(&polygons, &points, &spec, Crs::WGS84).unwrap();
        assert_eq!(result.height(), 1);
    }

    #[test]
    fn first_and_mean() {
        let points = PointLayer::new(
            df!["name" => ["x", "y"], "v" => [1.0, 3.0]].unwrap(),
            vec![Point::new(0.2, 0.2), Point::new(0.4, 0.4)],
            Crs::WGS84,
        ).unwrap();
        let spec = AggregationSpec {
            key: "GEOID".into(),
            columns: vec![AggColumn::new("name", AggFunc::First, "name"), AggColumn::new("v", AggFunc::Mean, "v_mean")],
            count_column: None,
        };
        let result = aggregate_points(&boundaries(), &points, &spec, Crs::WGS84).unwrap();
        assert_eq!(result.column("v_mean").unwrap().f64().unwrap().get(0), Some(2.0));
        assert_eq!(result.column("name").unwrap().str().unwrap().get(0), Some("x"));
    }
}
