//! ViewFrustum - camera volume and cube classification.
//!
//! Holds the camera pose and lens, derives the six bounding planes, and
//! classifies axis-aligned cubes as inside/intersecting/outside. Two
//! frustums are kept per viewer (current and last-sent) so the codec can
//! compute "was in view" deltas; [`ViewFrustum::is_very_similar`] is the
//! hysteresis that decides whether a view change is worth a scene restart.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::cube::AACube;

/// Result of classifying a volume against the frustum.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FrustumLocation {
  Outside,
  Intersect,
  Inside,
}

/// A plane in point-normal form; positive distance is the inside half-space.
#[derive(Clone, Copy, Debug, Default)]
struct Plane {
  normal: Vec3,
  d: f32,
}

impl Plane {
  fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
    let normal = (b - a).cross(c - a).normalize_or_zero();
    Self {
      normal,
      d: -normal.dot(a),
    }
  }

  #[inline]
  fn distance(&self, point: Vec3) -> f32 {
    self.normal.dot(point) + self.d
  }
}

const TOP_PLANE: usize = 0;
const BOTTOM_PLANE: usize = 1;
const LEFT_PLANE: usize = 2;
const RIGHT_PLANE: usize = 3;
const NEAR_PLANE: usize = 4;
const FAR_PLANE: usize = 5;

// Hysteresis thresholds for is_very_similar.
const POSITION_SIMILAR_ENOUGH: f32 = 5.0; // meters
const ORIENTATION_SIMILAR_ENOUGH: f32 = 10.0; // degrees
const LENS_EPSILON: f32 = 1e-4;

/// Camera-like view volume. Call [`ViewFrustum::calculate`] after mutating
/// the pose or lens; classification uses the cached planes.
#[derive(Clone, Debug)]
pub struct ViewFrustum {
  position: Vec3,
  orientation: Quat,
  field_of_view: f32, // vertical, degrees
  aspect_ratio: f32,
  near_clip: f32,
  far_clip: f32,

  planes: [Plane; 6],
  view_projection: Mat4,
}

impl Default for ViewFrustum {
  fn default() -> Self {
    let mut frustum = Self {
      position: Vec3::ZERO,
      orientation: Quat::IDENTITY,
      field_of_view: 45.0,
      aspect_ratio: 16.0 / 9.0,
      near_clip: 0.08,
      far_clip: crate::constants::TREE_SCALE,
      planes: [Plane::default(); 6],
      view_projection: Mat4::IDENTITY,
    };
    frustum.calculate();
    frustum
  }
}

impl ViewFrustum {
  pub fn position(&self) -> Vec3 {
    self.position
  }

  pub fn orientation(&self) -> Quat {
    self.orientation
  }

  pub fn field_of_view(&self) -> f32 {
    self.field_of_view
  }

  pub fn aspect_ratio(&self) -> f32 {
    self.aspect_ratio
  }

  pub fn near_clip(&self) -> f32 {
    self.near_clip
  }

  pub fn far_clip(&self) -> f32 {
    self.far_clip
  }

  pub fn set_position(&mut self, position: Vec3) {
    self.position = position;
  }

  pub fn set_orientation(&mut self, orientation: Quat) {
    self.orientation = orientation;
  }

  pub fn set_field_of_view(&mut self, degrees: f32) {
    self.field_of_view = degrees;
  }

  pub fn set_aspect_ratio(&mut self, aspect: f32) {
    self.aspect_ratio = aspect;
  }

  pub fn set_near_clip(&mut self, near: f32) {
    self.near_clip = near;
  }

  pub fn set_far_clip(&mut self, far: f32) {
    self.far_clip = far;
  }

  /// Camera forward direction.
  pub fn direction(&self) -> Vec3 {
    self.orientation * Vec3::NEG_Z
  }

  pub fn up(&self) -> Vec3 {
    self.orientation * Vec3::Y
  }

  pub fn right(&self) -> Vec3 {
    self.orientation * Vec3::X
  }

  /// Recompute the six planes and the view-projection matrix from the
  /// current pose and lens.
  pub fn calculate(&mut self) {
    // don't allow near and far to collapse onto each other
    let far = if self.far_clip > self.near_clip {
      self.far_clip
    } else {
      self.near_clip + 1.0
    };

    let fov_y = self.field_of_view.to_radians();
    let half_near_height = (fov_y * 0.5).tan() * self.near_clip;
    let half_near_width = half_near_height * self.aspect_ratio;
    let half_far_height = (fov_y * 0.5).tan() * far;
    let half_far_width = half_far_height * self.aspect_ratio;

    let dir = self.direction();
    let up = self.up();
    let right = self.right();

    let near_center = self.position + dir * self.near_clip;
    let far_center = self.position + dir * far;

    let near_top_left = near_center + up * half_near_height - right * half_near_width;
    let near_top_right = near_center + up * half_near_height + right * half_near_width;
    let near_bottom_left = near_center - up * half_near_height - right * half_near_width;
    let near_bottom_right = near_center - up * half_near_height + right * half_near_width;
    let far_top_left = far_center + up * half_far_height - right * half_far_width;
    let far_bottom_left = far_center - up * half_far_height - right * half_far_width;
    let far_bottom_right = far_center - up * half_far_height + right * half_far_width;
    let far_top_right = far_center + up * half_far_height + right * half_far_width;

    // Counter-clockwise winding as seen from inside, so normals face inward.
    self.planes[TOP_PLANE] = Plane::from_points(near_top_right, near_top_left, far_top_left);
    self.planes[BOTTOM_PLANE] =
      Plane::from_points(near_bottom_left, near_bottom_right, far_bottom_right);
    self.planes[LEFT_PLANE] = Plane::from_points(near_bottom_left, far_bottom_left, far_top_left);
    self.planes[RIGHT_PLANE] =
      Plane::from_points(far_bottom_right, near_bottom_right, near_top_right);
    self.planes[NEAR_PLANE] = Plane::from_points(near_bottom_right, near_bottom_left, near_top_left);
    self.planes[FAR_PLANE] = Plane::from_points(far_bottom_left, far_bottom_right, far_top_right);

    let projection = Mat4::perspective_rh(fov_y, self.aspect_ratio, self.near_clip, far);
    let view = Mat4::look_at_rh(self.position, self.position + dir, up);
    self.view_projection = projection * view;
  }

  pub fn point_in_frustum(&self, point: Vec3) -> FrustumLocation {
    for plane in &self.planes {
      if plane.distance(point) < 0.0 {
        return FrustumLocation::Outside;
      }
    }
    FrustumLocation::Inside
  }

  pub fn sphere_in_frustum(&self, center: Vec3, radius: f32) -> FrustumLocation {
    let mut result = FrustumLocation::Inside;
    for plane in &self.planes {
      let distance = plane.distance(center);
      if distance < -radius {
        return FrustumLocation::Outside;
      } else if distance < radius {
        result = FrustumLocation::Intersect;
      }
    }
    result
  }

  /// Classify an axis-aligned cube (in meters) against the frustum.
  pub fn cube_in_frustum(&self, cube: &AACube) -> FrustumLocation {
    let mut result = FrustumLocation::Inside;
    for plane in &self.planes {
      let vertex_p = cube.vertex_p(plane.normal);
      if plane.distance(vertex_p) < 0.0 {
        return FrustumLocation::Outside;
      }
      let vertex_n = cube.vertex_n(plane.normal);
      if plane.distance(vertex_n) < 0.0 {
        result = FrustumLocation::Intersect;
      }
    }
    result
  }

  /// Distance from the camera to a point in meters.
  #[inline]
  pub fn distance_to_camera(&self, point: Vec3) -> f32 {
    self.position.distance(point)
  }

  /// Loose equality used as view-change hysteresis: small drifts in
  /// position or orientation do not count as a changed view.
  pub fn is_very_similar(&self, other: &ViewFrustum) -> bool {
    let position_distance = self.position.distance(other.position);

    let mut angle = self.orientation.angle_between(other.orientation).to_degrees();
    if angle.is_nan() {
      angle = 0.0;
    }

    position_distance <= POSITION_SIMILAR_ENOUGH
      && angle <= ORIENTATION_SIMILAR_ENOUGH
      && (self.field_of_view - other.field_of_view).abs() <= LENS_EPSILON
      && (self.aspect_ratio - other.aspect_ratio).abs() <= LENS_EPSILON
      && (self.near_clip - other.near_clip).abs() <= LENS_EPSILON
      && (self.far_clip - other.far_clip).abs() <= LENS_EPSILON
  }

  /// Project a cube (in meters) to a normalized-device-space bounding rect
  /// for occlusion coverage. Returns None when any corner lands behind the
  /// camera, in which case occlusion culling ignores the cube.
  pub fn projected_polygon(&self, cube: &AACube) -> Option<ProjectedPolygon> {
    let mut min = Vec2::splat(f32::INFINITY);
    let mut max = Vec2::splat(f32::NEG_INFINITY);
    let mut nearest_depth = f32::INFINITY;

    for vertex in cube.vertices() {
      let clip: Vec4 = self.view_projection * vertex.extend(1.0);
      if clip.w <= 0.0 {
        return None;
      }
      let ndc = Vec2::new(clip.x / clip.w, clip.y / clip.w);
      min = min.min(ndc);
      max = max.max(ndc);
      nearest_depth = nearest_depth.min(clip.w);
    }

    let all_in_view =
      min.x >= -1.0 && min.y >= -1.0 && max.x <= 1.0 && max.y <= 1.0;

    Some(ProjectedPolygon {
      min,
      max,
      depth: nearest_depth,
      all_in_view,
    })
  }
}

/// Screen-space footprint of a projected cube, conservative bounding rect.
#[derive(Clone, Copy, Debug)]
pub struct ProjectedPolygon {
  pub min: Vec2,
  pub max: Vec2,
  /// View-space depth of the nearest corner; smaller is closer.
  pub depth: f32,
  /// The whole footprint landed inside the viewport. Occlusion decisions
  /// are only trusted for fully-visible footprints.
  pub all_in_view: bool,
}

impl ProjectedPolygon {
  /// True when `other` lies entirely within this footprint.
  pub fn covers(&self, other: &ProjectedPolygon) -> bool {
    self.min.x <= other.min.x
      && self.min.y <= other.min.y
      && self.max.x >= other.max.x
      && self.max.y >= other.max.y
  }
}

#[cfg(test)]
#[path = "frustum_test.rs"]
mod frustum_test;
