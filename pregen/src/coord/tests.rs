use super::*;

#[test]
fn test_cell_coord_display_roundtrip() {
    let coord = CellCoord::new(-12, 340);
    let text = coord.to_string();
    assert_eq!(text, "-12,340");
    assert_eq!(text.parse::<CellCoord>().unwrap(), coord);
}

#[test]
fn test_cell_coord_parse_trims_whitespace() {
    let coord: CellCoord = " 3 , -4 ".parse().unwrap();
    assert_eq!(coord, CellCoord::new(3, -4));
}

#[test]
fn test_cell_coord_parse_rejects_missing_separator() {
    let result = "12".parse::<CellCoord>();
    assert!(matches!(result, Err(CoordError::Malformed(_))));
}

#[test]
fn test_cell_coord_parse_rejects_non_numeric() {
    let result = "a,1".parse::<CellCoord>();
    assert!(matches!(result, Err(CoordError::InvalidComponent { .. })));
}

#[test]
fn test_cell_coord_parse_rejects_out_of_range() {
    let result = "4294967296,0".parse::<CellCoord>();
    assert!(matches!(result, Err(CoordError::InvalidComponent { .. })));
}

#[test]
fn test_chebyshev_distance() {
    let origin = CellCoord::new(0, 0);
    assert_eq!(origin.chebyshev_distance(&CellCoord::new(3, -7)), 7);
    assert_eq!(origin.chebyshev_distance(&origin), 0);
}

#[test]
fn test_chebyshev_distance_extremes_do_not_overflow() {
    let a = CellCoord::new(i32::MIN, 0);
    let b = CellCoord::new(i32::MAX, 0);
    assert_eq!(a.chebyshev_distance(&b), u32::MAX as u64);
}

#[test]
fn test_region_id_display() {
    let id = RegionId::new("minecraft:the_nether");
    assert_eq!(id.to_string(), "minecraft:the_nether");
    assert_eq!(id.as_str(), "minecraft:the_nether");
    assert_eq!(RegionId::from("a"), RegionId::from("a".to_string()));
}
