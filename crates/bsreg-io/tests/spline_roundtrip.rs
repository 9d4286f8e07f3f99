use bsreg_core::{BSpline, SplineSurface, SplineVolume};
use bsreg_io::{load_spline, read_spline, save_spline, write_spline};
use proptest::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("bsreg-io-{}-{}", std::process::id(), name))
}

fn to_text<const D: usize>(spline: &BSpline<D>) -> String {
    let mut out = Vec::new();
    write_spline(&mut out, spline).unwrap();
    String::from_utf8(out).unwrap()
}

fn assert_bit_identical<const D: usize>(a: &BSpline<D>, b: &BSpline<D>) {
    for (ka, kb) in a.knots().iter().zip(b.knots()) {
        assert_eq!(ka.degree(), kb.degree());
        let bits_a: Vec<u64> = ka.knots().iter().map(|k| k.to_bits()).collect();
        let bits_b: Vec<u64> = kb.knots().iter().map(|k| k.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }
    assert_eq!(a.grid().dims(), b.grid().dims());
    for (pa, pb) in a.grid().points().iter().zip(b.grid().points()) {
        for (ca, cb) in pa.coords().iter().zip(pb.coords()) {
            assert_eq!(ca.to_bits(), cb.to_bits());
        }
        assert_eq!(pa.weight().to_bits(), pb.weight().to_bits());
    }
}

#[test]
fn test_surface_file_roundtrip() {
    let mut spline = SplineSurface::create_identity([-3.5, 0.1], [17.0, 9.9], [5, 4], [3, 2]).unwrap();
    let mut parameters = spline.parameters();
    parameters[0] = 0.1 + 0.2;
    parameters[1] = 1e-300;
    parameters[2] = -0.0;
    parameters[3] = std::f64::consts::PI * 1e12;
    spline.set_parameters(&parameters).unwrap();

    let path = temp_path("surface.spline");
    save_spline(&path, &spline).unwrap();
    let loaded = load_spline::<2>(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_bit_identical(&spline, &loaded);
    assert_eq!(loaded, spline);
}

#[test]
fn test_volume_stream_roundtrip() {
    let spline = SplineVolume::create_identity([0.0; 3], [31.0, 15.0, 7.0], [6, 5, 4], [2, 2, 1]).unwrap();
    let text = to_text(&spline);
    let loaded: SplineVolume = read_spline(&mut Cursor::new(text.as_bytes())).unwrap();
    assert_bit_identical(&spline, &loaded);
    assert_eq!(to_text(&loaded), text);
}

#[test]
fn test_layout() {
    // Degree 1 with two control points per axis: four knots each.
    let spline = SplineSurface::create_identity([0.0, 0.0], [1.0, 2.0], [2, 2], [1, 1]).unwrap();
    let text = to_text(&spline);
    let lines: Vec<&str> = text.lines().collect();

    // Two knot vectors of 5 + 4 lines, 2 extents, 4 points of 2 coords + weight.
    assert_eq!(lines.len(), 2 * 9 + 2 + 4 * 3);
    // degree, knot count, n, lower, upper for u
    assert_eq!(&lines[..5], &["1", "4", "1", "1", "1"]);
    // grid extents
    assert_eq!(&lines[18..20], &["2", "2"]);
    // first control point sits on the domain start with unit weight
    let first: Vec<f64> = lines[20..23].iter().map(|l| l.parse().unwrap()).collect();
    assert_eq!(first, spline.grid().points()[0].coords().iter().copied().chain([1.0]).collect::<Vec<_>>());
}

#[test]
fn test_malformed_input_rejected() {
    let spline = SplineSurface::create_identity([0.0, 0.0], [4.0, 4.0], [4, 4], [2, 2]).unwrap();
    let text = to_text(&spline);

    // Truncated
    let truncated = &text[..text.len() / 2];
    assert!(read_spline::<_, 2>(&mut Cursor::new(truncated.as_bytes())).is_err());

    // Not a number
    let garbage = text.replacen("2\n", "two\n", 1);
    let err = read_spline::<_, 2>(&mut Cursor::new(garbage.as_bytes())).unwrap_err();
    assert!(format!("{:#}", err).contains("degree"));

    // Grid extents that disagree with the knot vectors
    let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();
    let extent = 2 * (5 + spline.knot_vector(0).len());
    lines[extent] = "3".to_string();
    let mismatched = lines.join("\n") + "\n";
    assert!(read_spline::<_, 2>(&mut Cursor::new(mismatched.as_bytes())).is_err());

    // Decreasing knots
    let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();
    lines[5] = "100".to_string();
    let unsorted = lines.join("\n") + "\n";
    assert!(read_spline::<_, 2>(&mut Cursor::new(unsorted.as_bytes())).is_err());
}

#[test]
fn test_missing_file_does_not_leak_path() {
    let path = temp_path("does-not-exist.spline");
    let err = load_spline::<2>(&path).unwrap_err();
    let message = format!("{:#}", err);
    assert!(!message.contains(path.to_str().unwrap()), "error message leaks path: {}", message);
}

proptest! {
    #[test]
    fn test_arbitrary_coordinates_are_bit_identical(
        coords in prop::collection::vec(-1e6f64..1e6, 18),
        weights in prop::collection::vec(0.01f64..100.0, 9),
    ) {
        let mut spline = SplineSurface::create_identity([0.0, 0.0], [8.0, 8.0], [3, 3], [2, 2]).unwrap();
        spline.set_parameters(&coords).unwrap();
        for (point, weight) in spline.grid_mut().points_mut().iter_mut().zip(&weights) {
            *point = bsreg_core::ControlPoint::with_weight(*point.coords(), *weight);
        }
        let loaded: SplineSurface = read_spline(&mut Cursor::new(to_text(&spline).into_bytes())).unwrap();
        prop_assert_eq!(loaded, spline);
    }
}
