use anyhow::{bail, Context, Result};
use bsreg_core::{BSpline, ControlGrid, ControlPoint, KnotVector};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Write one knot vector: degree, knot count, n, lower, upper, then the knots.
pub fn write_knot_vector<W: Write>(writer: &mut W, knots: &KnotVector) -> Result<()> {
    writeln!(writer, "{}", knots.degree())?;
    writeln!(writer, "{}", knots.len())?;
    writeln!(writer, "{}", knots.n())?;
    writeln!(writer, "{}", knots.lower())?;
    writeln!(writer, "{}", knots.upper())?;
    for knot in knots.knots() {
        writeln!(writer, "{}", knot)?;
    }
    Ok(())
}

/// Read a knot vector written by [`write_knot_vector`].
///
/// The stored `n`, `lower` and `upper` must agree with the values derived
/// from the degree and the knots.
pub fn read_knot_vector<R: BufRead>(reader: &mut R) -> Result<KnotVector> {
    let degree: usize = next_value(reader, "degree")?;
    let count: usize = next_value(reader, "knot count")?;
    let n: usize = next_value(reader, "n")?;
    let lower: usize = next_value(reader, "lower")?;
    let upper: usize = next_value(reader, "upper")?;

    let mut values = Vec::with_capacity(count.min(1 << 16));
    for i in 0..count {
        values.push(next_value::<f64, _>(reader, &format!("knot {}", i))?);
    }
    let knots = KnotVector::new(values, degree).context("Invalid knot vector")?;

    if knots.n() != n {
        bail!("stored n = {} but {} knots of degree {} give n = {}", n, count, degree, knots.n());
    }
    if knots.lower() != lower || knots.upper() != upper {
        bail!(
            "stored lower/upper {}/{} do not match degree {} (expected {}/{})",
            lower,
            upper,
            degree,
            knots.lower(),
            knots.upper()
        );
    }
    Ok(knots)
}

/// Write grid extents, then every control point's coordinates and weight,
/// last axis fastest.
pub fn write_control_grid<W: Write, const D: usize>(writer: &mut W, grid: &ControlGrid<D>) -> Result<()> {
    for extent in grid.dims() {
        writeln!(writer, "{}", extent)?;
    }
    for point in grid.points() {
        for coord in point.coords() {
            writeln!(writer, "{}", coord)?;
        }
        writeln!(writer, "{}", point.weight())?;
    }
    Ok(())
}

/// Read a control grid written by [`write_control_grid`].
pub fn read_control_grid<R: BufRead, const D: usize>(reader: &mut R) -> Result<ControlGrid<D>> {
    let mut dims = [0usize; D];
    for (axis, extent) in dims.iter_mut().enumerate() {
        *extent = next_value(reader, &format!("grid extent {}", axis))?;
    }
    let count = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .with_context(|| format!("grid extents {:?} overflow", dims))?;

    let mut points = Vec::with_capacity(count.min(1 << 16));
    for i in 0..count {
        let mut coords = [0.0; D];
        for (axis, coord) in coords.iter_mut().enumerate() {
            *coord = next_value(reader, &format!("control point {} coordinate {}", i, axis))?;
        }
        let weight = next_value(reader, &format!("control point {} weight", i))?;
        points.push(ControlPoint::with_weight(coords, weight));
    }
    ControlGrid::from_points(dims, points).context("Invalid control grid")
}

/// Write `spline`: one knot vector per axis, then the control grid.
pub fn write_spline<W: Write, const D: usize>(writer: &mut W, spline: &BSpline<D>) -> Result<()> {
    for (axis, knots) in spline.knots().iter().enumerate() {
        write_knot_vector(writer, knots).with_context(|| format!("Failed to write knot vector {}", axis))?;
    }
    write_control_grid(writer, spline.grid()).context("Failed to write control grid")
}

/// Read a spline written by [`write_spline`].
pub fn read_spline<R: BufRead, const D: usize>(reader: &mut R) -> Result<BSpline<D>> {
    let mut knots = Vec::with_capacity(D);
    for axis in 0..D {
        knots.push(read_knot_vector(reader).with_context(|| format!("Failed to read knot vector {}", axis))?);
    }
    let knots: [KnotVector; D] = match knots.try_into() {
        Ok(knots) => knots,
        Err(_) => bail!("expected {} knot vectors", D),
    };
    let grid = read_control_grid(reader).context("Failed to read control grid")?;
    BSpline::new(grid, knots).context("Control grid does not match the knot vectors")
}

/// Save `spline` to `path`. Error messages do not include the path.
pub fn save_spline<P: AsRef<Path>, const D: usize>(path: P, spline: &BSpline<D>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).context("Failed to create spline file")?;
    let mut writer = BufWriter::new(file);
    write_spline(&mut writer, spline).context("Failed to write spline file")?;
    writer.flush()?;
    tracing::debug!("Saved {}D spline with {} control points to {}", D, spline.grid().len(), path.display());
    Ok(())
}

/// Load a `D`-dimensional spline from `path`.
pub fn load_spline<const D: usize>(path: impl AsRef<Path>) -> Result<BSpline<D>> {
    let path = path.as_ref();
    let file = File::open(path).context("Failed to open spline file")?;
    let mut reader = BufReader::new(file);
    let spline = read_spline(&mut reader).context("Failed to read spline file")?;
    tracing::debug!("Loaded {}D spline with {} control points from {}", D, spline.grid().len(), path.display());
    Ok(spline)
}

fn next_value<T, R>(reader: &mut R, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    R: BufRead,
{
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        bail!("unexpected end of input while reading {}", what);
    }
    let value = line.trim();
    value
        .parse()
        .with_context(|| format!("could not parse {:?} as {}", value, what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_knot_vector_layout() {
        let knots = KnotVector::new(vec![0.0, 0.0, 0.5, 1.0, 1.0], 1).unwrap();
        let mut out = Vec::new();
        write_knot_vector(&mut out, &knots).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\n5\n2\n1\n1\n0\n0\n0.5\n1\n1\n");
    }

    #[test]
    fn test_knot_vector_roundtrip() {
        let knots = KnotVector::uniform_unclamped(5, 3, -1.25, 7.0).unwrap();
        let mut out = Vec::new();
        write_knot_vector(&mut out, &knots).unwrap();
        let read = read_knot_vector(&mut Cursor::new(out)).unwrap();
        assert_eq!(read, knots);
    }

    #[test]
    fn test_inconsistent_n_rejected() {
        let text = "1\n5\n3\n1\n1\n0\n0\n0.5\n1\n1\n";
        let err = read_knot_vector(&mut Cursor::new(text)).unwrap_err();
        assert!(err.to_string().contains("n = 3"));
    }

    #[test]
    fn test_truncated_input_rejected() {
        let err = read_knot_vector(&mut Cursor::new("2\n7\n")).unwrap_err();
        assert!(err.to_string().contains("end of input"));
    }

    #[test]
    fn test_control_grid_roundtrip_keeps_weights() {
        let grid = ControlGrid::from_fn([2, 3], |[i, j]| {
            ControlPoint::with_weight([i as f64 * 0.1, -(j as f64) / 3.0], 1.0 + j as f64)
        })
        .unwrap();
        let mut out = Vec::new();
        write_control_grid(&mut out, &grid).unwrap();
        let read: ControlGrid<2> = read_control_grid(&mut Cursor::new(out)).unwrap();
        assert_eq!(read, grid);
    }
}
