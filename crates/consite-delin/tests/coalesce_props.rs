use consite_core::{Footprint, GeometryOps, SiteError};
use consite_delin::coalesce;
use consite_geom::shapes::multi;
use consite_geom::{circle, rectangle, PlanarKernel};
use geo::{coord, Point, Polygon};
use proptest::prelude::*;

fn square(x0: f64, y0: f64, side: f64) -> Polygon<f64> {
    rectangle(coord! { x: x0, y: y0 }, coord! { x: x0 + side, y: y0 + side })
}

fn area(kernel: &PlanarKernel, parts: &[Polygon<f64>]) -> f64 {
    kernel.area(&multi(parts.iter().cloned()))
}

#[test]
fn zero_distance_is_a_configuration_error() {
    let kernel = PlanarKernel::default();
    let err = coalesce(&kernel, &[square(0.0, 0.0, 10.0)], 0.0).unwrap_err();
    assert!(matches!(err, SiteError::Config(_)));
    assert!(err.is_fatal());
    assert_eq!(err.info().code, "coalesce_zero_distance");
}

#[test]
fn closing_is_idempotent_on_a_convex_polygon() {
    let kernel = PlanarKernel::default();
    let base = vec![square(0.0, 0.0, 100.0)];
    let once = coalesce(&kernel, &base, 10.0).unwrap();
    let twice = coalesce(&kernel, &once, 10.0).unwrap();
    assert_eq!(once.len(), 1);
    assert_eq!(twice.len(), 1);
    let a1 = area(&kernel, &once);
    let a2 = area(&kernel, &twice);
    assert!((a1 - 10_000.0).abs() / 10_000.0 < 0.01, "closing changed area to {a1}");
    assert!((a1 - a2).abs() / a1 < 0.005, "{a1} vs {a2}");
}

#[test]
fn closing_bridges_gaps_narrower_than_twice_the_distance() {
    let kernel = PlanarKernel::default();
    let pair = vec![square(0.0, 0.0, 50.0), square(56.0, 0.0, 50.0)];
    assert_eq!(coalesce(&kernel, &pair, 4.0).unwrap().len(), 1);
    assert_eq!(coalesce(&kernel, &pair, 2.0).unwrap().len(), 2);
}

#[test]
fn opening_removes_thin_parts_and_keeps_wide_ones() {
    let kernel = PlanarKernel::default();
    let features = vec![
        rectangle(coord! { x: 0.0, y: 0.0 }, coord! { x: 500.0, y: 6.0 }),
        square(0.0, 100.0, 100.0),
    ];
    let opened = coalesce(&kernel, &features, -5.0).unwrap();
    assert_eq!(opened.len(), 1);
    let kept = area(&kernel, &opened);
    assert!(kept > 9_000.0 && kept <= 10_000.0 + 1e-6, "kept {kept}");
}

#[test]
fn features_collapsing_under_opening_vanish_silently() {
    let kernel = PlanarKernel::default();
    let thin = vec![rectangle(coord! { x: 0.0, y: 0.0 }, coord! { x: 100.0, y: 3.0 })];
    assert!(coalesce(&kernel, &thin, -5.0).unwrap().is_empty());
}

#[test]
fn small_interior_gaps_are_filled() {
    let kernel = PlanarKernel::default();
    let ring = square(0.0, 0.0, 100.0);
    let hole = square(45.0, 45.0, 10.0);
    let donut = kernel.erase(&multi([ring]), &multi([hole])).unwrap();
    let closed = coalesce(&kernel, &donut.0, 1.0).unwrap();
    assert_eq!(closed.len(), 1);
    assert!(closed[0].interiors().is_empty());
}

#[test]
fn closing_never_loses_area_at_large_distances() {
    let kernel = PlanarKernel::default();
    let block = kernel
        .buffer_footprint(&Footprint::Point(Point::new(0.0, 0.0)), 100.0)
        .unwrap();
    let input = kernel.area(&block);
    for distance in [5.0, 40.0, 250.0, 2_000.0] {
        let closed = coalesce(&kernel, &block.0, distance).unwrap();
        assert_eq!(closed.len(), 1, "d={distance}");
        let covered = area(&kernel, &closed);
        assert!(covered >= input - 1e-6, "d={distance}: {covered} < {input}");
        assert!((covered - input) / input < 0.002, "d={distance}: grew to {covered}");
        let outside = kernel.erase(&block, &multi(closed)).unwrap();
        assert!(kernel.area(&outside) < 1e-6, "d={distance} left input uncovered");
    }
}

#[test]
fn closing_then_opening_restores_a_disc() {
    let kernel = PlanarKernel::default();
    let disc = vec![circle(coord! { x: 0.0, y: 0.0 }, 100.0, 128)];
    let input = area(&kernel, &disc);
    let closed = coalesce(&kernel, &disc, 20.0).unwrap();
    let restored = coalesce(&kernel, &closed, -20.0).unwrap();
    assert_eq!(restored.len(), 1);
    let out = area(&kernel, &restored);
    assert!((out - input).abs() / input < 0.005, "{input} -> {out}");
}

#[test]
fn close_open_cycle_is_idempotent() {
    let kernel = PlanarKernel::default();
    let pair = vec![square(0.0, 0.0, 60.0), square(66.0, 10.0, 50.0)];
    let cycle = |shapes: &[Polygon<f64>]| {
        let closed = coalesce(&kernel, shapes, 5.0).unwrap();
        coalesce(&kernel, &closed, -5.0).unwrap()
    };
    let once = cycle(&pair);
    let twice = cycle(&once);
    assert_eq!(once.len(), twice.len());
    let a1 = area(&kernel, &once);
    let a2 = area(&kernel, &twice);
    assert!((a1 - a2).abs() / a1 < 0.005, "{a1} vs {a2}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn closing_grows_with_distance(gap in 1.0f64..30.0, d1 in 1.0f64..8.0, extra in 0.5f64..8.0) {
        let kernel = PlanarKernel::default();
        let pair = vec![square(0.0, 0.0, 40.0), square(40.0 + gap, 10.0, 40.0)];
        let small = area(&kernel, &coalesce(&kernel, &pair, d1).unwrap());
        let large = area(&kernel, &coalesce(&kernel, &pair, d1 + extra).unwrap());
        prop_assert!(large >= small * 0.995, "d={} -> {}, d={} -> {}", d1, small, d1 + extra, large);
    }

    #[test]
    fn closing_ignores_input_order(gap in 1.0f64..30.0, d in 1.0f64..10.0) {
        let kernel = PlanarKernel::default();
        let a = square(0.0, 0.0, 40.0);
        let b = square(40.0 + gap, 5.0, 30.0);
        let forward = coalesce(&kernel, &[a.clone(), b.clone()], d).unwrap();
        let backward = coalesce(&kernel, &[b, a], d).unwrap();
        prop_assert_eq!(forward.len(), backward.len());
        let fa = area(&kernel, &forward);
        let ba = area(&kernel, &backward);
        prop_assert!((fa - ba).abs() <= fa * 1e-6 + 1e-6);
    }

    #[test]
    fn opening_shrinks_with_distance(
        width in 40.0f64..200.0,
        height in 40.0f64..200.0,
        d1 in 1.0f64..8.0,
        extra in 0.5f64..8.0,
    ) {
        let kernel = PlanarKernel::default();
        let shape = vec![rectangle(coord! { x: 0.0, y: 0.0 }, coord! { x: width, y: height })];
        let input = area(&kernel, &shape);
        let small = area(&kernel, &coalesce(&kernel, &shape, -d1).unwrap());
        let large = area(&kernel, &coalesce(&kernel, &shape, -(d1 + extra)).unwrap());
        prop_assert!(small <= input + 1e-6, "opening grew {} to {}", input, small);
        prop_assert!(large <= small + 1e-6, "d={} -> {}, d={} -> {}", d1, small, d1 + extra, large);
    }
}
