use super::*;
use crate::element::ElementArena;
use crate::octal_code::OctalCode;

fn ids(count: usize) -> Vec<ElementId> {
  let mut arena = ElementArena::new();
  (0..count)
    .map(|_| arena.insert(OctalCode::root(), None, 0))
    .collect()
}

#[test]
fn extract_is_fifo() {
  let ids = ids(3);
  let mut bag = ElementBag::new();
  for &id in &ids {
    bag.insert(id);
  }
  assert_eq!(bag.len(), 3);
  assert_eq!(bag.extract(), Some(ids[0]));
  assert_eq!(bag.extract(), Some(ids[1]));
  assert_eq!(bag.extract(), Some(ids[2]));
  assert_eq!(bag.extract(), None);
}

#[test]
fn insert_is_idempotent() {
  let ids = ids(1);
  let mut bag = ElementBag::new();
  assert!(bag.insert(ids[0]));
  assert!(!bag.insert(ids[0]));
  assert_eq!(bag.len(), 1);
  assert!(bag.contains(ids[0]));
}

#[test]
fn reinsert_after_extract() {
  let ids = ids(2);
  let mut bag = ElementBag::new();
  bag.insert(ids[0]);
  bag.insert(ids[1]);
  // the element whose encode ran out of room goes back in, behind the rest
  let resumed = bag.extract().unwrap();
  assert!(bag.insert(resumed));
  assert_eq!(bag.extract(), Some(ids[1]));
  assert_eq!(bag.extract(), Some(ids[0]));
}

#[test]
fn clear_empties_both_structures() {
  let ids = ids(2);
  let mut bag = ElementBag::new();
  bag.insert(ids[0]);
  bag.insert(ids[1]);
  bag.clear();
  assert!(bag.is_empty());
  assert!(!bag.contains(ids[0]));
  assert!(bag.insert(ids[0]));
}
