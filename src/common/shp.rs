//! Shapefile (`.shp` + `.dbf` + `.prj`) reading and writing.

use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use polars::prelude::*;
use shapefile::{
    self as shp,
    Reader, Shape, Writer,
    dbase::{self, FieldName, FieldType, FieldValue, Record, TableWriterBuilder},
    record::EsriShape,
};

use tracing::warn;

use crate::geom::Crs;

/// dBASE limit on field name length.
pub const DBF_FIELD_NAME_LEN: usize = 10;

const DBF_MAX_CHARACTER_LEN: usize = 254;

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>
pub fn shp_to_geo(polygon: &shp::Polygon) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    // Rings arrive as an outer ring followed by its holes.
    for ring in polygon.rings() {
        let mut coords = ring.points().iter()
            .map(|pt| Coord { x: pt.x, y: pt.y })
            .collect::<Vec<_>>();
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }

        match ring {
            shp::PolygonRing::Outer(_) => {
                if let Some(outer) = exterior.replace(LineString(coords)) {
                    polygons.push(Polygon::new(outer, std::mem::take(&mut holes)));
                }
            }
            shp::PolygonRing::Inner(_) => holes.push(LineString(coords)),
        }
    }
    if let Some(outer) = exterior {
        polygons.push(Polygon::new(outer, holes));
    }

    MultiPolygon(polygons)
}

/// Convert geo::MultiPolygon<f64> to shapefile::Polygon
pub fn geo_to_shp(shape: &MultiPolygon<f64>) -> shp::Polygon {
    /// Get the signed area of a closed point list (negative when clockwise)
    fn signed_area(pts: &[shp::Point]) -> f64 {
        pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
    }

    /// Closed ring in the requested winding
    fn ring(line: &LineString<f64>, clockwise: bool) -> Vec<shp::Point> {
        let mut pts = line.coords().map(|c| shp::Point::new(c.x, c.y)).collect::<Vec<_>>();
        if let (Some(&first), Some(&last)) = (pts.first(), pts.last()) {
            if first.x != last.x || first.y != last.y { pts.push(first); }
        }
        if (signed_area(&pts) < 0.0) != clockwise { pts.reverse(); }
        pts
    }

    let mut rings = Vec::new();
    for polygon in &shape.0 {
        rings.push(shp::PolygonRing::Outer(ring(polygon.exterior(), true)));
        for hole in polygon.interiors() {
            rings.push(shp::PolygonRing::Inner(ring(hole, false)));
        }
    }

    shp::Polygon::with_rings(rings)
}

/// Column values collected from dbf records, typed by the dbf field type.
enum FieldColumn {
    Text(Vec<Option<String>>),
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
}

impl FieldColumn {
    fn for_type(field_type: FieldType, capacity: usize) -> Self {
        match field_type {
            FieldType::Numeric | FieldType::Float | FieldType::Double | FieldType::Currency
                => Self::Float(Vec::with_capacity(capacity)),
            FieldType::Integer => Self::Int(Vec::with_capacity(capacity)),
            FieldType::Logical => Self::Bool(Vec::with_capacity(capacity)),
            _ => Self::Text(Vec::with_capacity(capacity)),
        }
    }

    fn push(&mut self, value: Option<&FieldValue>) {
        match self {
            Self::Text(values) => values.push(match value {
                Some(FieldValue::Character(s)) => s.as_deref().map(|s| s.trim().to_string()),
                Some(FieldValue::Memo(s)) => Some(s.clone()),
                Some(FieldValue::Date(Some(d))) => Some(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())),
                Some(FieldValue::DateTime(dt)) => Some(format!("{dt:?}")),
                _ => None,
            }),
            Self::Float(values) => values.push(match value {
                Some(FieldValue::Numeric(n)) => *n,
                Some(FieldValue::Float(f)) => f.map(f64::from),
                Some(FieldValue::Double(d)) => Some(*d),
                Some(FieldValue::Currency(c)) => Some(*c),
                _ => None,
            }),
            Self::Int(values) => values.push(match value {
                Some(FieldValue::Integer(i)) => Some(i64::from(*i)),
                _ => None,
            }),
            Self::Bool(values) => values.push(match value {
                Some(FieldValue::Logical(b)) => *b,
                _ => None,
            }),
        }
    }

    fn into_column(self, name: &str) -> Column {
        match self {
            Self::Text(values) => Column::new(name.into(), values),
            Self::Float(values) => Column::new(name.into(), values),
            Self::Int(values) => Column::new(name.into(), values),
            Self::Bool(values) => Column::new(name.into(), values),
        }
    }
}

/// Reads shapes and all dbf attributes, keeping the dbf field order.
fn read_shapes<G>(path: &Path, convert: impl Fn(Shape) -> Result<G>) -> Result<(DataFrame, Vec<G>)> {
    let dbf_path = path.with_extension("dbf");
    let fields = dbase::Reader::from_path(&dbf_path)
        .with_context(|| format!("Failed to open attribute table: {}", dbf_path.display()))?
        .fields().iter()
        .filter(|field| field.name() != "DeletionFlag")
        .map(|field| (field.name().to_string(), field.field_type()))
        .collect::<Vec<_>>();

    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;
    let size = reader.shape_count()?;

    let mut columns = fields.iter()
        .map(|(_, field_type)| FieldColumn::for_type(*field_type, size))
        .collect::<Vec<_>>();
    let mut shapes = Vec::with_capacity(size);

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("Error reading shape+record")?;
        shapes.push(convert(shape)?);
        for ((name, _), column) in fields.iter().zip(columns.iter_mut()) {
            column.push(record.get(name));
        }
    }

    let data = DataFrame::new(
        fields.iter().zip(columns)
            .map(|((name, _), column)| column.into_column(name))
            .collect()
    )?;

    Ok((data, shapes))
}

/// Reads a polygon shapefile into its attribute table and one MultiPolygon per row.
pub fn read_polygon_shapefile(path: &Path) -> Result<(DataFrame, Vec<MultiPolygon<f64>>)> {
    read_shapes(path, |shape| match shape {
        Shape::Polygon(polygon) => Ok(shp_to_geo(&polygon)),
        other => bail!("found non-Polygon shape in {}: {:?}", path.display(), other.shapetype()),
    })
}

/// Reads a point shapefile into its attribute table and one Point per row.
pub fn read_point_shapefile(path: &Path) -> Result<(DataFrame, Vec<Point<f64>>)> {
    read_shapes(path, |shape| match shape {
        Shape::Point(p) => Ok(Point::new(p.x, p.y)),
        Shape::PointM(p) => Ok(Point::new(p.x, p.y)),
        Shape::PointZ(p) => Ok(Point::new(p.x, p.y)),
        other => bail!("found non-Point shape in {}: {:?}", path.display(), other.shapetype()),
    })
}

/// Longest prefix of `text` within `max` bytes that ends on a char boundary.
fn truncate_to_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max { return text }
    let mut end = max;
    while !text.is_char_boundary(end) { end -= 1; }
    &text[..end]
}

/// dbf field layout and per-row values for one DataFrame column.
struct FieldPlan {
    name: String,
    values: Vec<FieldValue>,
}

/// Names longer than the dBASE limit are cut; cuts that collide are an error.
pub fn dbf_field_names(data: &DataFrame) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    data.get_column_names().iter()
        .map(|name| {
            let short = name.chars().take(DBF_FIELD_NAME_LEN).collect::<String>();
            if !seen.insert(short.clone()) {
                bail!("column {:?} collides with another column as dbf field {short:?}", name.as_str());
            }
            Ok(short)
        })
        .collect()
}

fn plan_fields(data: &DataFrame) -> Result<(TableWriterBuilder, Vec<FieldPlan>)> {
    let field_name = |name: &str| FieldName::try_from(name)
        .map_err(|e| anyhow!("invalid dbf field name {name:?}: {e:?}"));

    let mut builder = TableWriterBuilder::new();
    let mut plans = Vec::with_capacity(data.width());

    for (column, name) in data.get_columns().iter().zip(dbf_field_names(data)?) {
        let dtype = column.dtype();
        let values = if dtype.is_primitive_numeric() {
            let numbers = column.cast(&DataType::Float64)?.f64()?.into_iter().collect::<Vec<_>>();
            let integral = dtype.is_integer() || numbers.iter().flatten().all(|v| v.fract() == 0.0);
            builder = if integral {
                builder.add_numeric_field(field_name(&name)?, 18, 0)
            } else {
                builder.add_numeric_field(field_name(&name)?, 24, 8)
            };
            numbers.into_iter()
                .map(|v| FieldValue::Numeric(v.filter(|v| v.is_finite())))
                .collect()
        } else if dtype == &DataType::Boolean {
            builder = builder.add_logical_field(field_name(&name)?);
            column.bool()?.into_iter().map(FieldValue::Logical).collect()
        } else {
            let text = column.cast(&DataType::String)?;
            let mut cut = 0usize;
            let strings = text.str()?.into_iter()
                .map(|v| v.map(|v| {
                    let short = truncate_to_char_boundary(v, DBF_MAX_CHARACTER_LEN);
                    if short.len() < v.len() { cut += 1; }
                    short.to_string()
                }))
                .collect::<Vec<_>>();
            if cut > 0 {
                warn!("[common::shp] {cut} values of {:?} cut to {DBF_MAX_CHARACTER_LEN} bytes", column.name().as_str());
            }
            let width = strings.iter().flatten()
                .map(String::len)
                .max().unwrap_or(1)
                .clamp(1, DBF_MAX_CHARACTER_LEN);
            builder = builder.add_character_field(field_name(&name)?, width as u8);
            strings.into_iter().map(FieldValue::Character).collect()
        };
        plans.push(FieldPlan { name, values });
    }

    Ok((builder, plans))
}

fn write_shapes<S: EsriShape>(path: &Path, data: &DataFrame, shapes: &[S]) -> Result<()> {
    if data.height() != shapes.len() {
        bail!("{} attribute rows for {} shapes in {}", data.height(), shapes.len(), path.display());
    }

    let (builder, plans) = plan_fields(data)?;
    let mut writer = Writer::from_path(path, builder)
        .with_context(|| format!("Failed to create shapefile: {}", path.display()))?;

    for (row, shape) in shapes.iter().enumerate() {
        let mut record = Record::default();
        for plan in &plans {
            record.insert(plan.name.clone(), plan.values[row].clone());
        }
        writer.write_shape_and_record(shape, &record)
            .with_context(|| format!("Failed to write row {row} of {}", path.display()))?;
    }

    Ok(())
}

/// Writes a polygon shapefile with a `.prj` for `crs`.
pub fn write_polygon_shapefile(path: &Path, data: &DataFrame, shapes: &[MultiPolygon<f64>], crs: Crs) -> Result<()> {
    let polygons = shapes.iter().map(geo_to_shp).collect::<Vec<_>>();
    write_shapes(path, data, &polygons)?;
    write_prj(path, crs)
}

/// Writes a point shapefile with a `.prj` for `crs`.
pub fn write_point_shapefile(path: &Path, data: &DataFrame, points: &[Point<f64>], crs: Crs) -> Result<()> {
    let points = points.iter().map(|p| shp::Point::new(p.x(), p.y())).collect::<Vec<_>>();
    write_shapes(path, data, &points)?;
    write_prj(path, crs)
}

/// CRS named by the sidecar `.prj`, if present and recognised.
pub fn read_prj(path: &Path) -> Result<Option<Crs>> {
    let prj_path = path.with_extension("prj");
    if !prj_path.exists() { return Ok(None) }
    let wkt = fs::read_to_string(&prj_path)
        .with_context(|| format!("Failed to read {}", prj_path.display()))?;
    Ok(Crs::from_wkt(&wkt))
}

fn write_prj(path: &Path, crs: Crs) -> Result<()> {
    let prj_path = path.with_extension("prj");
    fs::write(&prj_path, crs.to_esri_wkt()?)
        .with_context(|| format!("Failed to write {}", prj_path.display()))
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    #[test]
    fn long_names_are_truncated() {
        let data = df!["StructCntHHs" => [1i64], "GEOID" => ["a"]].unwrap();
        assert_eq!(dbf_field_names(&data).unwrap(), vec!["StructCntH", "GEOID"]);
    }

    #[test]
    fn colliding_truncations_fail() {
        let data = df!["StructCntHHs" => [1i64], "StructCntHouses" => [2i64]].unwrap();
        assert!(dbf_field_names(&data).is_err());
    }

    #[test]
    fn text_is_cut_on_char_boundaries() {
        assert_eq!(truncate_to_char_boundary("Kabwe", 254), "Kabwe");
        assert_eq!(truncate_to_char_boundary("abc", 2), "ab");
        // 'é' is two bytes, so three bytes keep one and a half chars
        assert_eq!(truncate_to_char_boundary("ééé", 3), "é");
    }

    #[test]
    fn ring_conversion_keeps_holes() {
        let outer = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0), (1.0, 1.0)]);
        let shape = MultiPolygon(vec![Polygon::new(outer, vec![hole])]);

        let back = shp_to_geo(&geo_to_shp(&shape));
        assert_eq!(back.0.len(), 1);
        assert_eq!(back.0[0].interiors().len(), 1);
        assert_eq!(back.0[0].exterior().0.len(), 5);
    }
}
