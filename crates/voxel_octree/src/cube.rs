//! AACube - axis-aligned cube used for element bounds and culling tests.

use glam::Vec3;

/// Which face of a cube a ray entered through.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BoxFace {
  MinX,
  MaxX,
  MinY,
  MaxY,
  MinZ,
  MaxZ,
}

/// Axis-aligned cube: minimum corner plus edge length.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct AACube {
  pub corner: Vec3,
  pub scale: f32,
}

impl AACube {
  pub fn new(corner: Vec3, scale: f32) -> Self {
    Self { corner, scale }
  }

  #[inline]
  pub fn center(&self) -> Vec3 {
    self.corner + Vec3::splat(self.scale * 0.5)
  }

  #[inline]
  pub fn max_corner(&self) -> Vec3 {
    self.corner + Vec3::splat(self.scale)
  }

  /// Same cube scaled about the origin (unit-space to meters).
  pub fn scaled(&self, factor: f32) -> Self {
    Self {
      corner: self.corner * factor,
      scale: self.scale * factor,
    }
  }

  pub fn contains_point(&self, point: Vec3) -> bool {
    let max = self.max_corner();
    point.cmpge(self.corner).all() && point.cmplt(max).all()
  }

  /// True when `other` lies entirely within this cube.
  pub fn contains(&self, other: &AACube) -> bool {
    let max = self.max_corner();
    let other_max = other.max_corner();
    other.corner.cmpge(self.corner).all() && other_max.cmple(max).all()
  }

  /// All eight corner vertices.
  pub fn vertices(&self) -> [Vec3; 8] {
    let min = self.corner;
    let max = self.max_corner();
    [
      Vec3::new(min.x, min.y, min.z),
      Vec3::new(max.x, min.y, min.z),
      Vec3::new(min.x, max.y, min.z),
      Vec3::new(max.x, max.y, min.z),
      Vec3::new(min.x, min.y, max.z),
      Vec3::new(max.x, min.y, max.z),
      Vec3::new(min.x, max.y, max.z),
      Vec3::new(max.x, max.y, max.z),
    ]
  }

  /// Corner farthest along `normal` (the "positive vertex" of plane tests).
  pub fn vertex_p(&self, normal: Vec3) -> Vec3 {
    let max = self.max_corner();
    Vec3::new(
      if normal.x >= 0.0 { max.x } else { self.corner.x },
      if normal.y >= 0.0 { max.y } else { self.corner.y },
      if normal.z >= 0.0 { max.z } else { self.corner.z },
    )
  }

  /// Corner farthest against `normal` (the "negative vertex").
  pub fn vertex_n(&self, normal: Vec3) -> Vec3 {
    let max = self.max_corner();
    Vec3::new(
      if normal.x >= 0.0 { self.corner.x } else { max.x },
      if normal.y >= 0.0 { self.corner.y } else { max.y },
      if normal.z >= 0.0 { self.corner.z } else { max.z },
    )
  }

  /// Slab test. Returns the entry distance along `direction` and the face
  /// entered through, or None when the ray misses. A ray starting inside
  /// hits at distance 0.
  pub fn find_ray_intersection(&self, origin: Vec3, direction: Vec3) -> Option<(f32, BoxFace)> {
    let max = self.max_corner();
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    let mut face = BoxFace::MinX;

    for axis in 0..3 {
      let o = origin[axis];
      let d = direction[axis];
      let (lo, hi) = (self.corner[axis], max[axis]);
      if d.abs() < f32::EPSILON {
        if o < lo || o > hi {
          return None;
        }
        continue;
      }
      let inv = 1.0 / d;
      let (mut t0, mut t1) = ((lo - o) * inv, (hi - o) * inv);
      let mut near_is_min = true;
      if t0 > t1 {
        std::mem::swap(&mut t0, &mut t1);
        near_is_min = false;
      }
      if t0 > t_min {
        t_min = t0;
        face = match (axis, near_is_min) {
          (0, true) => BoxFace::MinX,
          (0, false) => BoxFace::MaxX,
          (1, true) => BoxFace::MinY,
          (1, false) => BoxFace::MaxY,
          (2, true) => BoxFace::MinZ,
          _ => BoxFace::MaxZ,
        };
      }
      t_max = t_max.min(t1);
      if t_min > t_max {
        return None;
      }
    }

    if t_max < 0.0 {
      return None;
    }
    Some((t_min.max(0.0), face))
  }

  /// Penetration of a sphere into this cube, pointing from the cube surface
  /// toward the sphere center. None when they do not overlap.
  pub fn find_sphere_penetration(&self, center: Vec3, radius: f32) -> Option<Vec3> {
    let closest = center.clamp(self.corner, self.max_corner());
    let offset = center - closest;
    let distance = offset.length();
    if distance >= radius {
      return None;
    }
    if distance > f32::EPSILON {
      Some(offset / distance * (radius - distance))
    } else {
      // center inside the cube: push out along the nearest face
      Some(Vec3::new(0.0, radius, 0.0))
    }
  }

  /// True when the sphere overlaps this cube at all.
  pub fn touches_sphere(&self, center: Vec3, radius: f32) -> bool {
    let closest = center.clamp(self.corner, self.max_corner());
    center.distance_squared(closest) < radius * radius
  }
}

#[cfg(test)]
#[path = "cube_test.rs"]
mod cube_test;
