use super::*;
use crate::octal_code::OctalCode;

fn small_settings(budget: usize) -> PacketSettings {
  PacketSettings {
    want_compression: false,
    include_exists_bits: true,
    target_size: budget + COMPRESS_PADDING,
  }
}

#[test]
fn subtree_bracket_appends_octal_code() {
  let mut packet = PacketData::new(PacketSettings::default());
  let code = OctalCode::from_octants(&[1, 2]);
  assert!(packet.start_subtree(&code));
  assert_eq!(packet.uncompressed_bytes(), code.to_wire().as_slice());
  packet.end_subtree();
  assert_eq!(packet.subtree_count(), 1);
  assert!(packet.has_content());
}

#[test]
fn discard_subtree_rewinds_everything_since_start() {
  let mut packet = PacketData::new(PacketSettings::default());
  assert!(packet.append_bytes(&[0xaa]));
  let before = packet.uncompressed_size();
  assert!(packet.start_subtree(&OctalCode::root()));
  packet.append_bitmask(0xff);
  packet.discard_subtree();
  assert_eq!(packet.uncompressed_size(), before);
  assert!(!packet.has_content());
}

#[test]
fn level_discard_rewinds_only_the_level() {
  let mut packet = PacketData::new(PacketSettings::default());
  packet.start_subtree(&OctalCode::root());
  packet.append_bitmask(0x0f);
  let level = packet.start_level();
  packet.append_color([1, 2, 3]);
  packet.discard_level(level);
  // the bitmask written before the level survives
  assert_eq!(packet.uncompressed_size(), OctalCode::root().wire_len() + 1);
}

#[test]
fn end_level_reports_contributed_bytes() {
  let mut packet = PacketData::new(PacketSettings::default());
  let level = packet.start_level();
  packet.append_bitmask(0x01);
  packet.append_color([9, 9, 9]);
  assert_eq!(packet.end_level(level), 4);
}

#[test]
fn update_prior_bitmask_patches_in_place() {
  let mut packet = PacketData::new(PacketSettings::default());
  let offset = packet.append_bitmask(0b0000_0101).unwrap();
  packet.append_color([1, 1, 1]);
  packet.update_prior_bitmask(offset, 0b0000_0100);
  assert_eq!(packet.uncompressed_bytes()[offset], 0b0000_0100);
  assert_eq!(&packet.uncompressed_bytes()[offset + 1..], &[1, 1, 1]);
}

#[test]
fn update_prior_bytes_patches_a_range() {
  let mut packet = PacketData::new(PacketSettings::default());
  packet.append_bytes(&[0, 0, 0, 0]);
  packet.update_prior_bytes(1, &[7, 8]);
  assert_eq!(packet.uncompressed_bytes(), &[0, 7, 8, 0]);
}

#[test]
fn appends_fail_when_budget_exhausted() {
  let mut packet = PacketData::new(small_settings(4));
  assert!(packet.append_bytes(&[1, 2, 3]));
  assert!(!packet.append_color([1, 2, 3]));
  assert!(packet.append_bitmask(0xff).is_some());
  assert!(packet.append_bitmask(0xff).is_none());
  assert_eq!(packet.bytes_available(), 0);
}

#[test]
fn start_subtree_fails_when_code_does_not_fit() {
  let mut packet = PacketData::new(small_settings(1));
  let code = OctalCode::from_octants(&[1, 2, 3, 4]);
  assert!(!packet.start_subtree(&code));
  assert!(packet.is_empty());
}

#[test]
fn finalize_without_compression_is_identity() {
  let mut packet = PacketData::new(PacketSettings::default());
  packet.append_bytes(&[1, 2, 3]);
  let (payload, compressed) = packet.finalize();
  assert!(!compressed);
  assert_eq!(payload, vec![1, 2, 3]);
}

#[test]
fn finalize_with_compression_round_trips() {
  let settings = PacketSettings {
    want_compression: true,
    ..PacketSettings::default()
  };
  let mut packet = PacketData::new(settings);
  let body: Vec<u8> = (0..1000).map(|i| (i % 7) as u8).collect();
  assert!(packet.append_bytes(&body));
  let (payload, compressed) = packet.finalize();
  assert!(compressed);
  assert!(payload.len() < body.len());
  assert_eq!(inflate(&payload).unwrap(), body);
}

#[test]
fn compression_raises_the_uncompressed_budget() {
  let settings = PacketSettings {
    want_compression: true,
    ..PacketSettings::default()
  };
  let packet = PacketData::new(settings);
  assert_eq!(packet.bytes_available(), MAX_UNCOMPRESSED_SIZE);
}

#[test]
fn reset_clears_content_but_keeps_settings() {
  let settings = small_settings(100);
  let mut packet = PacketData::new(settings);
  packet.start_subtree(&OctalCode::root());
  packet.end_subtree();
  packet.reset();
  assert!(packet.is_empty());
  assert_eq!(packet.subtree_count(), 0);
  assert_eq!(packet.settings().target_size, settings.target_size);
}
