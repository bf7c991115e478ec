use super::*;
use ServerViewStatus::{InView, OutOfView, Unknown};

#[test]
fn in_view_servers_split_the_budget() {
  let shares = apportion_query_pps(600, &[InView, InView, InView]);
  assert_eq!(shares, vec![200, 200, 200]);
}

#[test]
fn out_of_view_servers_get_nothing() {
  let shares = apportion_query_pps(600, &[InView, OutOfView, InView]);
  assert_eq!(shares, vec![300, 0, 300]);
}

#[test]
fn unknown_servers_get_the_discovery_trickle() {
  let shares = apportion_query_pps(600, &[InView, Unknown, Unknown]);
  assert_eq!(shares[1], DISCOVERY_PPS);
  assert_eq!(shares[2], DISCOVERY_PPS);
  // the in-view server gets everything that discovery left over
  assert_eq!(shares[0], 600 - 2 * DISCOVERY_PPS);
}

#[test]
fn all_unknown_splits_the_whole_budget() {
  let shares = apportion_query_pps(600, &[Unknown, Unknown, Unknown, Unknown]);
  assert_eq!(shares, vec![150, 150, 150, 150]);
}

#[test]
fn in_view_servers_never_starve() {
  // budget smaller than the discovery trickle alone
  let shares = apportion_query_pps(15, &[InView, Unknown, Unknown]);
  assert_eq!(shares[0], 1);
  assert!(shares[1] + shares[2] <= 15);
}

#[test]
fn a_flood_of_unknown_servers_does_not_overflow_the_trickle() {
  let mut statuses = vec![Unknown; 7_000];
  statuses.push(InView);
  let shares = apportion_query_pps(600, &statuses);
  // discovery demand dwarfs the budget: unknowns round down to nothing
  assert!(shares[..7_000].iter().all(|&share| share == 0));
  assert_eq!(shares[7_000], 1);
}

#[test]
fn empty_server_list() {
  assert!(apportion_query_pps(600, &[]).is_empty());
}
