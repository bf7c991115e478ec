//! JurisdictionMap - which slice of the global tree one server owns.
//!
//! A jurisdiction is a root code plus a set of end codes: the server owns
//! every element at or below the root, stopping before descending past any
//! end. Servers without a map own the whole tree.

use crate::octal_code::OctalCode;

/// Where a code sits relative to a jurisdiction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Containment {
  /// Strictly above the jurisdiction root; recursion should continue down
  /// toward the owned region without emitting content.
  Above,
  /// Owned by this server.
  Within,
  /// Past an end code or in a disjoint branch; another server owns it.
  Below,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JurisdictionMap {
  root: OctalCode,
  ends: Vec<OctalCode>,
}

impl JurisdictionMap {
  pub fn new(root: OctalCode, ends: Vec<OctalCode>) -> Self {
    Self { root, ends }
  }

  /// The whole tree: root jurisdiction, no ends.
  pub fn whole_tree() -> Self {
    Self {
      root: OctalCode::root(),
      ends: Vec::new(),
    }
  }

  pub fn root_code(&self) -> &OctalCode {
    &self.root
  }

  pub fn end_codes(&self) -> &[OctalCode] {
    &self.ends
  }

  pub fn containment(&self, code: &OctalCode) -> Containment {
    if code.is_ancestor_of(&self.root) {
      return Containment::Above;
    }
    if code == &self.root || self.root.is_ancestor_of(code) {
      // an end code itself is still owned; only its descendants are not
      for end in &self.ends {
        if end.is_ancestor_of(code) {
          return Containment::Below;
        }
      }
      return Containment::Within;
    }
    Containment::Below
  }

  /// Containment of the `octant` child of `code` without materializing the
  /// child code on the hot path when the parent is already decisive.
  pub fn containment_of_child(&self, code: &OctalCode, octant: u8) -> Containment {
    match self.containment(code) {
      Containment::Within if !self.ends.iter().any(|end| end == code) => Containment::Within,
      _ => self.containment(&code.child(octant)),
    }
  }
}

#[cfg(test)]
#[path = "jurisdiction_test.rs"]
mod jurisdiction_test;
