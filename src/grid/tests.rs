use super::*;

#[test]
fn test_distance_is_chebyshev() {
    let a = Coordinate::new(0, 0);
    assert_eq!(a.distance(&Coordinate::new(3, 1)), 3);
    assert_eq!(a.distance(&Coordinate::new(2, 5)), 5);
    assert_eq!(a.distance(&Coordinate::new(4, 4)), 4);
    assert_eq!(a.distance(&a), 0);
}

#[test]
fn test_distance_is_symmetric() {
    let a = Coordinate::new(7, -2);
    let b = Coordinate::new(-1, 3);
    assert_eq!(a.distance(&b), b.distance(&a));
    assert_eq!(a.distance(&b), 8);
}

#[test]
fn test_step_toward_reaches_target_in_distance_steps() {
    let target = Coordinate::new(5, 2);
    let mut pos = Coordinate::new(0, 0);
    let mut steps = 0;
    while pos != target {
        pos = pos.step_toward(&target);
        steps += 1;
    }
    assert_eq!(steps, Coordinate::new(0, 0).distance(&target));
}

#[test]
fn test_step_toward_at_target_stays_put() {
    let c = Coordinate::new(3, 3);
    assert_eq!(c.step_toward(&c), c);
}

#[test]
fn test_bounds_contains() {
    let bounds = GridBounds::new(10, 20);
    assert!(bounds.contains(&Coordinate::new(0, 0)));
    assert!(bounds.contains(&Coordinate::new(9, 19)));
    assert!(!bounds.contains(&Coordinate::new(10, 0)));
    assert!(!bounds.contains(&Coordinate::new(0, 20)));
    assert!(!bounds.contains(&Coordinate::new(-1, 5)));
    assert_eq!(bounds.cell_count(), 200);
}

#[test]
fn test_coordinate_ordering_is_row_major() {
    let mut cells = vec![
        Coordinate::new(1, 0),
        Coordinate::new(0, 5),
        Coordinate::new(0, 1),
    ];
    cells.sort();
    assert_eq!(
        cells,
        vec![Coordinate::new(0, 1), Coordinate::new(0, 5), Coordinate::new(1, 0)]
    );
}
