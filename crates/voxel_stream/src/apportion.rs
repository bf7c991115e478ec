//! Viewer-side packet budget apportionment across jurisdiction servers.
//!
//! A viewer asks for one global packets-per-second rate but talks to many
//! servers, each owning a slice of the tree. Servers whose jurisdiction
//! provably misses the view get nothing; servers not yet heard from get a
//! small discovery trickle; the rest of the budget splits evenly among the
//! servers whose slice intersects the view.

/// Trickle rate for servers whose jurisdiction is still unknown.
pub const DISCOVERY_PPS: u16 = 10;

/// What the viewer knows about one server's jurisdiction versus its view.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ServerViewStatus {
  /// No jurisdiction announcement received yet.
  Unknown,
  /// Jurisdiction intersects the current view.
  InView,
  /// Jurisdiction provably outside the current view.
  OutOfView,
}

/// Split `total_pps` across servers according to their view status. The
/// result is index-aligned with `statuses`.
pub fn apportion_query_pps(total_pps: u16, statuses: &[ServerViewStatus]) -> Vec<u16> {
  // counts and products are widened: enough unknown servers would overflow
  // a u16 discovery total
  let unknown = statuses
    .iter()
    .filter(|s| **s == ServerViewStatus::Unknown)
    .count() as u32;
  let in_view = statuses
    .iter()
    .filter(|s| **s == ServerViewStatus::InView)
    .count() as u32;
  let total = u32::from(total_pps);

  let (per_unknown, per_in_view) = if in_view == 0 {
    // nothing visible yet: spend the whole budget on discovery
    (if unknown > 0 { total / unknown } else { 0 }, 0)
  } else {
    let discovery_total = (u32::from(DISCOVERY_PPS) * unknown).min(total);
    let per_unknown = if unknown > 0 {
      discovery_total / unknown
    } else {
      0
    };
    let remaining = total - discovery_total;
    // an in-view server always gets at least one packet per second
    (per_unknown, (remaining / in_view).max(1))
  };

  statuses
    .iter()
    .map(|status| match status {
      ServerViewStatus::Unknown => per_unknown as u16,
      ServerViewStatus::InView => per_in_view as u16,
      ServerViewStatus::OutOfView => 0,
    })
    .collect()
}

#[cfg(test)]
#[path = "apportion_test.rs"]
mod apportion_test;
