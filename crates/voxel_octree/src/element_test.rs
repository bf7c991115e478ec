use super::*;
use crate::octal_code::OctalCode;

#[test]
fn insert_and_get() {
  let mut arena = ElementArena::new();
  let id = arena.insert(OctalCode::root(), None, 100);
  assert_eq!(arena.len(), 1);
  let element = arena.get(id).unwrap();
  assert!(element.code().is_root());
  assert!(element.is_leaf());
  assert_eq!(element.last_changed(), 100);
}

#[test]
fn remove_frees_slot() {
  let mut arena = ElementArena::new();
  let id = arena.insert(OctalCode::root(), None, 0);
  assert!(arena.remove(id).is_some());
  assert_eq!(arena.len(), 0);
  assert!(arena.get(id).is_none());
  assert!(arena.remove(id).is_none());
}

#[test]
fn stale_id_does_not_resolve_after_reuse() {
  let mut arena = ElementArena::new();
  let first = arena.insert(OctalCode::from_octants(&[0]), None, 0);
  arena.remove(first);
  // the freed slot is reused with a bumped generation
  let second = arena.insert(OctalCode::from_octants(&[1]), None, 0);
  assert_eq!(first.index(), second.index());
  assert_ne!(first, second);
  assert!(arena.get(first).is_none());
  assert_eq!(arena.get(second).unwrap().code().octant_at(0), 1);
}

#[test]
fn child_links() {
  let mut arena = ElementArena::new();
  let root = arena.insert(OctalCode::root(), None, 0);
  let child = arena.insert(OctalCode::from_octants(&[3]), Some(root), 0);
  arena.set_child(root, 3, Some(child));
  let element = arena.get(root).unwrap();
  assert_eq!(element.child(3), Some(child));
  assert_eq!(element.child_count(), 1);
  assert!(!element.is_leaf());
  assert_eq!(arena.get(child).unwrap().parent(), Some(root));
}

#[test]
fn change_tracking() {
  let mut arena = ElementArena::new();
  let id = arena.insert(OctalCode::root(), None, 50);
  assert!(arena.get(id).unwrap().has_changed_since(40));
  assert!(!arena.get(id).unwrap().has_changed_since(60));
  arena.touch(id, 70);
  assert!(arena.get(id).unwrap().has_changed_since(60));
}

#[test]
fn data_and_average_color() {
  let mut arena = ElementArena::new();
  let id = arena.insert(OctalCode::root(), None, 0);
  assert!(arena.get(id).unwrap().data().is_none());
  arena.set_data(id, Some(VoxelData::new(10, 20, 30)), 1);
  assert_eq!(arena.get(id).unwrap().data().unwrap().color, [10, 20, 30]);
  assert_eq!(arena.get(id).unwrap().average_color(), Some([10, 20, 30]));
  arena.set_average_color(id, Some([1, 2, 3]));
  assert_eq!(arena.get(id).unwrap().average_color(), Some([1, 2, 3]));
}

#[test]
fn level_matches_code_depth() {
  let mut arena = ElementArena::new();
  let root = arena.insert(OctalCode::root(), None, 0);
  let deep = arena.insert(OctalCode::from_octants(&[1, 2, 3]), Some(root), 0);
  assert_eq!(arena.get(root).unwrap().level(), 0);
  assert_eq!(arena.get(deep).unwrap().level(), 3);
}
