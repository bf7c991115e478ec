use super::*;

use glam::{Quat, Vec3};

// Default camera: origin, looking down -Z, 45 degree vertical fov.

#[test]
fn points_ahead_are_inside_points_behind_are_outside() {
  let frustum = ViewFrustum::default();
  assert_eq!(
    frustum.point_in_frustum(Vec3::new(0.0, 0.0, -10.0)),
    FrustumLocation::Inside
  );
  assert_eq!(
    frustum.point_in_frustum(Vec3::new(0.0, 0.0, 10.0)),
    FrustumLocation::Outside
  );
  // wide of the view cone
  assert_eq!(
    frustum.point_in_frustum(Vec3::new(100.0, 0.0, -10.0)),
    FrustumLocation::Outside
  );
}

#[test]
fn sphere_straddling_a_plane_intersects() {
  let frustum = ViewFrustum::default();
  assert_eq!(
    frustum.sphere_in_frustum(Vec3::new(0.0, 0.0, -100.0), 1.0),
    FrustumLocation::Inside
  );
  // centered on the camera: pokes out of the near plane
  assert_eq!(
    frustum.sphere_in_frustum(Vec3::new(0.0, 0.0, -0.1), 5.0),
    FrustumLocation::Intersect
  );
  assert_eq!(
    frustum.sphere_in_frustum(Vec3::new(0.0, 1000.0, -10.0), 1.0),
    FrustumLocation::Outside
  );
}

#[test]
fn cube_classification() {
  let frustum = ViewFrustum::default();
  let inside = AACube::new(Vec3::new(-1.0, -1.0, -50.0), 2.0);
  assert_eq!(frustum.cube_in_frustum(&inside), FrustumLocation::Inside);

  let behind = AACube::new(Vec3::new(-1.0, -1.0, 10.0), 2.0);
  assert_eq!(frustum.cube_in_frustum(&behind), FrustumLocation::Outside);

  // spans the camera position: straddles the near plane
  let straddling = AACube::new(Vec3::new(-5.0, -5.0, -5.0), 10.0);
  assert_eq!(frustum.cube_in_frustum(&straddling), FrustumLocation::Intersect);
}

#[test]
fn orientation_turns_the_frustum() {
  let mut frustum = ViewFrustum::default();
  frustum.set_orientation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
  frustum.calculate();
  // looking down -X now
  assert_eq!(
    frustum.point_in_frustum(Vec3::new(-10.0, 0.0, 0.0)),
    FrustumLocation::Inside
  );
  assert_eq!(
    frustum.point_in_frustum(Vec3::new(0.0, 0.0, -10.0)),
    FrustumLocation::Outside
  );
}

#[test]
fn distance_to_camera_is_euclidean() {
  let mut frustum = ViewFrustum::default();
  frustum.set_position(Vec3::new(3.0, 0.0, 0.0));
  frustum.calculate();
  assert_eq!(frustum.distance_to_camera(Vec3::new(0.0, 4.0, 0.0)), 5.0);
}

#[test]
fn similarity_hysteresis() {
  let base = ViewFrustum::default();
  assert!(base.is_very_similar(&base));

  // small drift stays similar
  let mut drifted = base.clone();
  drifted.set_position(Vec3::new(1.0, 1.0, 0.0));
  drifted.set_orientation(Quat::from_rotation_y(2.0_f32.to_radians()));
  drifted.calculate();
  assert!(base.is_very_similar(&drifted));

  // a real move is a new view
  let mut moved = base.clone();
  moved.set_position(Vec3::new(10.0, 0.0, 0.0));
  moved.calculate();
  assert!(!base.is_very_similar(&moved));

  let mut turned = base.clone();
  turned.set_orientation(Quat::from_rotation_y(30.0_f32.to_radians()));
  turned.calculate();
  assert!(!base.is_very_similar(&turned));

  let mut zoomed = base.clone();
  zoomed.set_field_of_view(60.0);
  zoomed.calculate();
  assert!(!base.is_very_similar(&zoomed));
}

#[test]
fn projected_polygon_of_a_centered_cube() {
  let frustum = ViewFrustum::default();
  let cube = AACube::new(Vec3::new(-1.0, -1.0, -20.0), 2.0);
  let polygon = frustum.projected_polygon(&cube).unwrap();
  assert!(polygon.all_in_view);
  assert!(polygon.min.x < 0.0 && polygon.max.x > 0.0);
  assert!(polygon.min.y < 0.0 && polygon.max.y > 0.0);
  assert!(polygon.depth > 0.0);
}

#[test]
fn projected_polygon_behind_the_camera_is_none() {
  let frustum = ViewFrustum::default();
  let behind = AACube::new(Vec3::new(-1.0, -1.0, 5.0), 2.0);
  assert!(frustum.projected_polygon(&behind).is_none());
}

#[test]
fn nearer_projection_covers_a_farther_one_behind_it() {
  let frustum = ViewFrustum::default();
  let near = AACube::new(Vec3::new(-2.0, -2.0, -12.0), 4.0);
  let far = AACube::new(Vec3::new(-1.0, -1.0, -40.0), 2.0);
  let near_polygon = frustum.projected_polygon(&near).unwrap();
  let far_polygon = frustum.projected_polygon(&far).unwrap();
  assert!(near_polygon.depth < far_polygon.depth);
  assert!(near_polygon.covers(&far_polygon));
  assert!(!far_polygon.covers(&near_polygon));
}
