//! Encode throughput benchmarks: full-scene and frustum-culled traversals
//! over a randomly populated tree.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use voxel_octree::encode::{encode_tree_bitstream, EncodeParams};
use voxel_octree::packet_data::{PacketData, PacketSettings};
use voxel_octree::{
  ElementBag, OctalCode, SceneStats, TreeStore, ViewFrustum, DEFAULT_OCTREE_SIZE_SCALE,
};

fn random_tree(voxels: usize, depth: usize, seed: u64) -> TreeStore {
  let mut rng = StdRng::seed_from_u64(seed);
  let mut tree = TreeStore::new();
  for _ in 0..voxels {
    let octants: Vec<u8> = (0..depth).map(|_| rng.random_range(0..8)).collect();
    let color = [rng.random(), rng.random(), rng.random()];
    tree.insert(
      &OctalCode::from_octants(&octants),
      voxel_octree::VoxelData {
        color,
      },
    );
  }
  tree
}

fn drain_scene(tree: &TreeStore, params_frustum: Option<&ViewFrustum>) -> usize {
  let mut bag = ElementBag::new();
  let mut stats = SceneStats::default();
  bag.insert(tree.root());
  let mut total = 0;
  let mut guard = 0;
  while !bag.is_empty() {
    guard += 1;
    if guard > 10_000 {
      break;
    }
    let mut packet = PacketData::new(PacketSettings::default());
    while let Some(element) = bag.extract() {
      let mut params = EncodeParams::new(DEFAULT_OCTREE_SIZE_SCALE);
      params.view_frustum = params_frustum;
      let written =
        encode_tree_bitstream(tree, element, &mut packet, &mut bag, &mut params, &mut stats);
      if written == 0 {
        break;
      }
      total += written;
    }
  }
  total
}

fn bench_full_scene(c: &mut Criterion) {
  let tree = random_tree(2000, 6, 7);
  c.bench_function("encode_full_scene_2000", |b| {
    b.iter(|| black_box(drain_scene(&tree, None)));
  });
}

fn bench_frustum_culled_scene(c: &mut Criterion) {
  let tree = random_tree(2000, 6, 7);
  let mut frustum = ViewFrustum::default();
  frustum.set_position(Vec3::new(8192.0, 8192.0, 30000.0));
  frustum.set_far_clip(60000.0);
  frustum.calculate();
  c.bench_function("encode_frustum_scene_2000", |b| {
    b.iter(|| black_box(drain_scene(&tree, Some(&frustum))));
  });
}

criterion_group!(benches, bench_full_scene, bench_frustum_culled_scene);
criterion_main!(benches);
