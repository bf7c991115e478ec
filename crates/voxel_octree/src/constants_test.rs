use super::*;

#[test]
fn test_boundary_distance_halves_per_level() {
  let scale = DEFAULT_OCTREE_SIZE_SCALE;
  let d0 = boundary_distance_for_render_level(0, scale);
  let d1 = boundary_distance_for_render_level(1, scale);
  let d5 = boundary_distance_for_render_level(5, scale);
  assert_eq!(d0, scale);
  assert_eq!(d1, scale / 2.0);
  assert_eq!(d5, scale / 32.0);
}

/// Increasing the render level never increases the boundary distance, which
/// is what makes LOD skipping monotonic in depth.
#[test]
fn test_boundary_distance_monotonic() {
  let scale = DEFAULT_OCTREE_SIZE_SCALE;
  let mut previous = f32::INFINITY;
  for level in 0..20 {
    let d = boundary_distance_for_render_level(level, scale);
    assert!(d < previous);
    previous = d;
  }
}
