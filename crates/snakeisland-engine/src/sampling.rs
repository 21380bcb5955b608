//! Initial control points from vector line data.
//!
//! Coastlines from chart data arrive as line strings of float coordinates.
//! [`sample_linestrings`] picks the part of one line string between two of
//! its vertices and thins it to roughly evenly spaced control points.

use crate::types::{ControlPoint, Point, SnakeError};

/// Sample the line string containing `start` and `end` into control points
/// about `distance` pixels apart.
///
/// The part between the two vertices is walked from `start` to `end` (in
/// reverse if `end` comes first). The path length `L` is split into
/// `max(1, floor(L / distance))` equal parts; from each chosen vertex the
/// next one is the remaining vertex whose straight distance is closest to
/// that spacing. A second-to-last point closer than half the spacing to the
/// last one is dropped. Coordinates are truncated to integers.
///
/// # Errors
///
/// Returns [`SnakeError::NotOnSameLine`] if no line string holds both
/// vertices, and [`SnakeError::NoControlPoints`] for a zero-length slice or
/// a non-positive `distance`.
pub fn sample_linestrings(
    start: Point,
    end: Point,
    linestrings: &[Vec<Point>],
    distance: f64,
) -> Result<Vec<ControlPoint>, SnakeError> {
    if !(distance.is_finite() && distance > 0.0) {
        return Err(SnakeError::NoControlPoints);
    }
    let linestring = linestrings
        .iter()
        .find(|ls| ls.contains(&start))
        .ok_or(SnakeError::NotOnSameLine)?;
    let slice = slice_between(linestring, start, end).ok_or(SnakeError::NotOnSameLine)?;

    let length: f64 = slice.windows(2).map(|w| w[0].distance(w[1])).sum();
    if length <= 0.0 {
        return Err(SnakeError::NoControlPoints);
    }
    let parts = (length / distance).floor().max(1.0);
    let spacing = length / parts;

    let mut picked = vec![slice[0]];
    let mut i = 0;
    while i < slice.len() - 1 {
        i += next_in_distance(&slice[i..], spacing);
        picked.push(slice[i]);
    }
    let n = picked.len();
    if n > 2 && picked[n - 2].distance(picked[n - 1]) < spacing / 2.0 {
        picked.remove(n - 2);
    }

    log::debug!(
        "sampled {} control points from {} vertices (spacing {spacing:.1})",
        picked.len(),
        slice.len()
    );
    Ok(picked.into_iter().map(truncate).collect())
}

/// Vertices from `a` to `b` inclusive, reversed if `b` precedes `a`.
fn slice_between(linestring: &[Point], a: Point, b: Point) -> Option<Vec<Point>> {
    let ia = linestring.iter().position(|&p| p == a)?;
    let ib = linestring.iter().position(|&p| p == b)?;
    Some(if ia <= ib {
        linestring[ia..=ib].to_vec()
    } else {
        linestring[ib..=ia].iter().rev().copied().collect()
    })
}

/// Offset in `coords` (at least 1) of the vertex whose distance from
/// `coords[0]` is closest to `spacing`; ties go to the last vertex, then to
/// the earliest.
fn next_in_distance(coords: &[Point], spacing: f64) -> usize {
    let origin = coords[0];
    let last = coords.len() - 1;
    let mut best = (origin.distance(coords[last]) - spacing).abs();
    let mut best_i = last;
    for (i, &c) in coords.iter().enumerate().skip(1) {
        let d = (origin.distance(c) - spacing).abs();
        if d < best {
            best = d;
            best_i = i;
        }
    }
    best_i
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(p: Point) -> ControlPoint {
    ControlPoint::new(p.x as i32, p.y as i32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dense_line(len: u32) -> Vec<Point> {
        (0..=len).map(|x| Point::new(f64::from(x), 0.5)).collect()
    }

    #[test]
    fn samples_evenly_spaced_points() {
        let line = dense_line(100);
        let cps = sample_linestrings(line[0], line[100], &[line.clone()], 25.0).unwrap();
        let xs: Vec<i32> = cps.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![0, 25, 50, 75, 100]);
        assert!(cps.iter().all(|c| c.y == 0));
    }

    #[test]
    fn reversed_endpoints_walk_backwards() {
        let line = dense_line(100);
        let cps = sample_linestrings(line[100], line[0], &[line.clone()], 50.0).unwrap();
        let xs: Vec<i32> = cps.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![100, 50, 0]);
    }

    #[test]
    fn close_penultimate_point_is_dropped() {
        let line = vec![
            Point::new(0.0, 0.0),
            Point::new(52.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(104.0, 0.0),
        ];
        // Spacing 104 / 3: the walk visits 52 and 100, then 104 lands
        // only 4 px after 100.
        let cps = sample_linestrings(line[0], line[3], &[line.clone()], 30.0).unwrap();
        assert_eq!(
            cps,
            vec![
                ControlPoint::new(0, 0),
                ControlPoint::new(52, 0),
                ControlPoint::new(104, 0)
            ]
        );
    }

    #[test]
    fn endpoints_on_different_lines_are_rejected() {
        let a = dense_line(10);
        let b: Vec<Point> = (0..5).map(|y| Point::new(500.0, f64::from(y))).collect();
        let result = sample_linestrings(a[0], b[4], &[a, b], 5.0);
        assert!(matches!(result, Err(SnakeError::NotOnSameLine)));
    }

    #[test]
    fn unknown_start_is_rejected() {
        let a = dense_line(10);
        let result = sample_linestrings(Point::new(-3.0, 0.0), a[4], &[a], 5.0);
        assert!(matches!(result, Err(SnakeError::NotOnSameLine)));
    }

    #[test]
    fn degenerate_requests_produce_no_points() {
        let a = dense_line(10);
        assert!(matches!(
            sample_linestrings(a[3], a[3], &[a.clone()], 5.0),
            Err(SnakeError::NoControlPoints)
        ));
        assert!(matches!(
            sample_linestrings(a[0], a[10], &[a], 0.0),
            Err(SnakeError::NoControlPoints)
        ));
    }

    #[test]
    fn spacing_longer_than_slice_keeps_both_ends() {
        let a = dense_line(10);
        let cps = sample_linestrings(a[0], a[10], &[a], 1000.0).unwrap();
        assert_eq!(cps, vec![ControlPoint::new(0, 0), ControlPoint::new(10, 0)]);
    }
}
