use super::*;
use glam::Vec2;

fn polygon(min: (f32, f32), max: (f32, f32), depth: f32, all_in_view: bool) -> ProjectedPolygon {
  ProjectedPolygon {
    min: Vec2::new(min.0, min.1),
    max: Vec2::new(max.0, max.1),
    depth,
    all_in_view,
  }
}

#[test]
fn empty_map_stores_first_polygon() {
  let mut map = CoverageMap::new();
  let p = polygon((-0.5, -0.5), (0.5, 0.5), 10.0, true);
  assert_eq!(map.check_and_store(&p, true), CoverageResult::Stored);
  assert_eq!(map.occluder_count(), 1);
}

#[test]
fn farther_contained_polygon_is_occluded() {
  let mut map = CoverageMap::new();
  let near = polygon((-0.5, -0.5), (0.5, 0.5), 10.0, true);
  let far = polygon((-0.2, -0.2), (0.2, 0.2), 50.0, true);
  map.check_and_store(&near, true);
  assert_eq!(map.check_and_store(&far, true), CoverageResult::Occluded);
  assert_eq!(map.occluder_count(), 1);
}

#[test]
fn nearer_polygon_is_not_occluded_by_farther_occluder() {
  let mut map = CoverageMap::new();
  let far = polygon((-0.5, -0.5), (0.5, 0.5), 50.0, true);
  let near = polygon((-0.2, -0.2), (0.2, 0.2), 10.0, true);
  map.check_and_store(&far, true);
  assert_eq!(map.check_and_store(&near, true), CoverageResult::Stored);
}

#[test]
fn overhanging_polygon_is_visible() {
  let mut map = CoverageMap::new();
  let near = polygon((-0.5, -0.5), (0.5, 0.5), 10.0, true);
  let wide = polygon((-0.6, -0.2), (0.2, 0.2), 50.0, true);
  map.check_and_store(&near, true);
  assert_eq!(map.check_and_store(&wide, true), CoverageResult::Stored);
  assert_eq!(map.occluder_count(), 2);
}

#[test]
fn partially_out_of_view_is_not_stored() {
  let mut map = CoverageMap::new();
  let edge = polygon((0.8, 0.8), (1.2, 1.2), 10.0, false);
  assert_eq!(map.check_and_store(&edge, true), CoverageResult::NotAllInView);
  assert_eq!(map.occluder_count(), 0);
}

#[test]
fn store_false_leaves_map_unchanged() {
  let mut map = CoverageMap::new();
  let p = polygon((-0.5, -0.5), (0.5, 0.5), 10.0, true);
  assert_eq!(map.check_and_store(&p, false), CoverageResult::Visible);
  assert_eq!(map.occluder_count(), 0);
}

#[test]
fn erase_resets_the_map() {
  let mut map = CoverageMap::new();
  let near = polygon((-0.5, -0.5), (0.5, 0.5), 10.0, true);
  let far = polygon((-0.2, -0.2), (0.2, 0.2), 50.0, true);
  map.check_and_store(&near, true);
  map.erase();
  assert_eq!(map.check_and_store(&far, true), CoverageResult::Stored);
}
