use super::*;

#[test]
fn header_round_trips() {
  for packet_type in [
    PacketType::Query,
    PacketType::Data,
    PacketType::Erase,
    PacketType::Stats,
    PacketType::Jurisdiction,
  ] {
    let header = PacketHeader::new(packet_type, ServerId(0xfeed));
    let mut out = Vec::new();
    header.pack(&mut out);
    let (decoded, used) = PacketHeader::unpack(&out).unwrap();
    assert_eq!(decoded, header);
    assert_eq!(used, HEADER_SIZE);
  }
}

#[test]
fn header_rejects_unknown_type_and_version() {
  let mut out = Vec::new();
  PacketHeader::new(PacketType::Data, ServerId(1)).pack(&mut out);

  let mut bad_type = out.clone();
  bad_type[0] = 99;
  assert!(matches!(
    PacketHeader::unpack(&bad_type),
    Err(ProtocolError::BadPacketType)
  ));

  let mut bad_version = out.clone();
  bad_version[1] = PROTOCOL_VERSION + 1;
  assert!(matches!(
    PacketHeader::unpack(&bad_version),
    Err(ProtocolError::BadVersion)
  ));

  assert!(matches!(
    PacketHeader::unpack(&out[..HEADER_SIZE - 1]),
    Err(ProtocolError::Truncated)
  ));
}

#[test]
fn query_round_trips() {
  let query = OctreeQuery {
    position: Vec3::new(1.0, 2.0, 3.0),
    orientation: Quat::from_rotation_y(0.5),
    field_of_view: 60.0,
    aspect_ratio: 4.0 / 3.0,
    near_clip: 0.1,
    far_clip: 1000.0,
    octree_size_scale: 32768.0,
    boundary_level_adjust: 2,
    max_packets_per_second: 300,
    flags: WANT_DELTA | WANT_OCCLUSION_CULLING,
  };
  let mut out = Vec::new();
  query.pack(&mut out);
  let (decoded, used) = OctreeQuery::unpack(&out).unwrap();
  assert_eq!(decoded, query);
  assert_eq!(used, out.len());
  assert!(decoded.wants_delta());
  assert!(decoded.wants_occlusion_culling());
  assert!(!decoded.wants_compression());
  assert!(!decoded.wants_low_res_moving());
}

#[test]
fn query_rejects_truncated() {
  let mut out = Vec::new();
  OctreeQuery::default().pack(&mut out);
  assert!(matches!(
    OctreeQuery::unpack(&out[..out.len() - 1]),
    Err(ProtocolError::Truncated)
  ));
}

#[test]
fn erase_packet_drives_the_remove_stream() {
  use voxel_octree::{process_remove_bitstream, TreeStore, VoxelData};

  let mut tree = TreeStore::new();
  tree.insert(&OctalCode::from_octants(&[1, 2]), VoxelData::new(1, 1, 1));
  tree.insert(&OctalCode::from_octants(&[3]), VoxelData::new(2, 2, 2));

  let packet = erase_packet(
    ServerId(7),
    &[
      OctalCode::from_octants(&[1, 2]),
      OctalCode::from_octants(&[3]),
    ],
  );
  let (header, consumed) = PacketHeader::unpack(&packet).unwrap();
  assert_eq!(header.packet_type, PacketType::Erase);
  assert_eq!(
    process_remove_bitstream(&mut tree, &packet[consumed..]).unwrap(),
    2
  );
  assert!(tree.find_by_code(&OctalCode::from_octants(&[1, 2])).is_none());
  assert!(tree.find_by_code(&OctalCode::from_octants(&[3])).is_none());
}

#[test]
fn jurisdiction_announcement_round_trips() {
  let announcement = JurisdictionAnnouncement {
    root: OctalCode::from_octants(&[1, 2]),
    ends: vec![
      OctalCode::from_octants(&[1, 2, 3]),
      OctalCode::from_octants(&[1, 2, 4, 5]),
    ],
  };
  let mut out = Vec::new();
  announcement.pack(&mut out);
  let (decoded, used) = JurisdictionAnnouncement::unpack(&out).unwrap();
  assert_eq!(decoded, announcement);
  assert_eq!(used, out.len());
}

#[test]
fn jurisdiction_announcement_rejects_missing_ends() {
  let announcement = JurisdictionAnnouncement {
    root: OctalCode::from_octants(&[1]),
    ends: vec![OctalCode::from_octants(&[1, 1])],
  };
  let mut out = Vec::new();
  announcement.pack(&mut out);
  assert!(matches!(
    JurisdictionAnnouncement::unpack(&out[..out.len() - 1]),
    Err(ProtocolError::Truncated)
  ));
}

#[test]
fn data_preamble_round_trips() {
  let preamble = DataPreamble {
    flags: FLAG_COMPRESSED | FLAG_FULL_SCENE,
    sequence: 0xbeef,
    sent_at: 123_456_789,
  };
  let mut out = Vec::new();
  preamble.pack(&mut out);
  assert_eq!(out.len(), DATA_PREAMBLE_SIZE);
  let (decoded, _) = DataPreamble::unpack(&out).unwrap();
  assert_eq!(decoded, preamble);
  assert!(decoded.is_compressed());
  assert!(decoded.is_full_scene());
}
