//! Dispatch resolution — ranking eligible responders for a case.
//!
//! The resolver is read-only: it produces an ordered candidate list and
//! never assigns anyone. Precedence is fixed by contract: distance bucket
//! first, then open-case load, then role preference, then seniority.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use uuid::Uuid;

use crate::{
  Result,
  case::{Case, Condition},
  geo::{GeoIndex, haversine_km},
  responder::{Availability, Responder, ResponderRole},
  store::ResponderDirectory,
};

/// Widening search radii. A candidate found at the 5 km step is preferred
/// over one only reachable at 15 km, and so on; past the last step the
/// search is unbounded.
pub const RADIUS_STEPS_KM: [f64; 3] = [5.0, 15.0, 50.0];

// ─── Output ──────────────────────────────────────────────────────────────────

/// One ranked candidate. `distance_km` is `None` for responders matched by
/// area text or lacking coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchCandidate {
  pub responder_id: Uuid,
  pub display_name: String,
  pub role:         ResponderRole,
  pub distance_km:  Option<f64>,
  pub open_cases:   u32,
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// A responder paired with the query-time facts that drive ranking.
#[derive(Debug, Clone)]
pub struct Scored {
  pub responder:   Responder,
  pub distance_km: Option<f64>,
  pub open_cases:  u32,
}

/// Bucket index for a distance: 0 (<=5 km), 1 (<=15), 2 (<=50), 3 (beyond
/// or unknown). Ties inside a bucket fall through to the later criteria.
fn distance_bucket(distance_km: Option<f64>) -> u8 {
  match distance_km {
    Some(d) if d <= RADIUS_STEPS_KM[0] => 0,
    Some(d) if d <= RADIUS_STEPS_KM[1] => 1,
    Some(d) if d <= RADIUS_STEPS_KM[2] => 2,
    _ => 3,
  }
}

/// 0 when the role matches the case's declared need, 1 otherwise.
/// RESCUER is preferred for INJURED/CRITICAL, VET for SICK.
fn role_preference(role: ResponderRole, condition: Condition) -> u8 {
  let preferred = match condition {
    Condition::Injured | Condition::Critical => ResponderRole::Rescuer,
    Condition::Sick => ResponderRole::Vet,
    Condition::Healthy | Condition::Malnourished => return 1,
  };
  u8::from(role != preferred)
}

/// Order candidates in place. Deterministic: the final tiebreaks are the
/// responder's `created_at` (seniority) and id.
pub fn rank(condition: Condition, scored: &mut [Scored]) {
  scored.sort_by(|a, b| {
    distance_bucket(a.distance_km)
      .cmp(&distance_bucket(b.distance_km))
      .then_with(|| a.open_cases.cmp(&b.open_cases))
      .then_with(|| {
        role_preference(a.responder.role, condition)
          .cmp(&role_preference(b.responder.role, condition))
      })
      .then_with(|| a.responder.created_at.cmp(&b.responder.created_at))
      .then_with(|| a.responder.responder_id.cmp(&b.responder.responder_id))
  });
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Produces ranked dispatch candidates for a case needing (re)assignment.
pub struct DispatchResolver<S> {
  directory: Arc<S>,
  geo:       Arc<GeoIndex>,
}

impl<S> Clone for DispatchResolver<S> {
  fn clone(&self) -> Self {
    Self { directory: Arc::clone(&self.directory), geo: Arc::clone(&self.geo) }
  }
}

impl<S: ResponderDirectory> DispatchResolver<S> {
  /// `geo` must index responder coordinates.
  pub fn new(directory: Arc<S>, geo: Arc<GeoIndex>) -> Self {
    Self { directory, geo }
  }

  pub async fn candidates(&self, case: &Case) -> Result<Vec<DispatchCandidate>> {
    let active = self.directory.list_responders(Some(Availability::Active)).await?;

    // The current assignee never competes for its own case.
    let exclude = case.assignee.as_ref().map(|a| a.responder_id);
    let pool: Vec<Responder> = active
      .into_iter()
      .filter(|r| Some(r.responder_id) != exclude)
      .collect();
    if pool.is_empty() {
      return Ok(Vec::new());
    }

    let eligible: Vec<(Responder, Option<f64>)> = match case.coordinates {
      Some(center) => self.eligible_by_proximity(center, pool)?,
      None => eligible_by_area_text(&case.location, pool),
    };
    if eligible.is_empty() {
      return Ok(Vec::new());
    }

    let ids: Vec<Uuid> =
      eligible.iter().map(|(r, _)| r.responder_id).collect();
    let counts = self.directory.open_case_counts(&ids).await?;

    let mut scored: Vec<Scored> = eligible
      .into_iter()
      .map(|(responder, distance_km)| Scored {
        open_cases: counts.get(&responder.responder_id).copied().unwrap_or(0),
        responder,
        distance_km,
      })
      .collect();
    rank(case.condition, &mut scored);

    Ok(
      scored
        .into_iter()
        .map(|s| DispatchCandidate {
          responder_id: s.responder.responder_id,
          display_name: s.responder.display_name,
          role:         s.responder.role,
          distance_km:  s.distance_km,
          open_cases:   s.open_cases,
        })
        .collect(),
    )
  }

  /// Widen the index query until something is found; past the last step
  /// every active responder is eligible, with a direct distance where
  /// coordinates are known.
  fn eligible_by_proximity(
    &self,
    center: crate::case::Coordinates,
    pool: Vec<Responder>,
  ) -> Result<Vec<(Responder, Option<f64>)>> {
    for radius in RADIUS_STEPS_KM {
      let distances: HashMap<Uuid, f64> =
        self.geo.within_radius(center, radius)?.into_iter().collect();
      let subset: Vec<(Responder, Option<f64>)> = pool
        .iter()
        .filter(|r| distances.contains_key(&r.responder_id))
        .map(|r| (r.clone(), Some(distances[&r.responder_id])))
        .collect();
      if !subset.is_empty() {
        return Ok(subset);
      }
    }

    Ok(
      pool
        .into_iter()
        .map(|r| {
          let d = r.coordinates.map(|c| haversine_km(center, c));
          (r, d)
        })
        .collect(),
    )
  }
}

/// Text fallback when a case has no coordinates: case-insensitive
/// substring match either way between declared area and case location.
fn eligible_by_area_text(
  location: &str,
  pool: Vec<Responder>,
) -> Vec<(Responder, Option<f64>)> {
  let location = location.to_lowercase();
  pool
    .into_iter()
    .filter(|r| {
      let area = r.area.to_lowercase();
      !area.is_empty() && (location.contains(&area) || area.contains(&location))
    })
    .map(|r| (r, None))
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, Utc};

  use super::*;
  use crate::case::Coordinates;

  fn responder(role: ResponderRole, seniority_days: i64) -> Responder {
    Responder {
      responder_id: Uuid::new_v4(),
      display_name: format!("{role:?}"),
      contact:      None,
      area:         "Indiranagar".into(),
      coordinates:  Some(Coordinates { lon: 77.64, lat: 12.97 }),
      role,
      availability: Availability::Active,
      created_at:   Utc::now() - Duration::days(seniority_days),
    }
  }

  fn scored(
    role: ResponderRole,
    distance_km: Option<f64>,
    open_cases: u32,
    seniority_days: i64,
  ) -> Scored {
    Scored { responder: responder(role, seniority_days), distance_km, open_cases }
  }

  #[test]
  fn same_bucket_prefers_role_match_over_distance() {
    // Scenario: CRITICAL case; VET at 1 km, RESCUER at 2 km. Both in the
    // 5 km bucket with equal load, so the RESCUER ranks first.
    let mut cands = vec![
      scored(ResponderRole::Vet, Some(1.0), 0, 10),
      scored(ResponderRole::Rescuer, Some(2.0), 0, 10),
    ];
    rank(Condition::Critical, &mut cands);
    assert_eq!(cands[0].responder.role, ResponderRole::Rescuer);
  }

  #[test]
  fn different_bucket_prefers_nearer_regardless_of_role() {
    // VET at 1 km (bucket 0) beats RESCUER at 12 km (bucket 1) even for
    // a CRITICAL case: bucket takes precedence over role.
    let mut cands = vec![
      scored(ResponderRole::Rescuer, Some(12.0), 0, 10),
      scored(ResponderRole::Vet, Some(1.0), 0, 10),
    ];
    rank(Condition::Critical, &mut cands);
    assert_eq!(cands[0].responder.role, ResponderRole::Vet);
  }

  #[test]
  fn load_breaks_ties_before_role() {
    let mut cands = vec![
      scored(ResponderRole::Rescuer, Some(2.0), 3, 10),
      scored(ResponderRole::Feeder, Some(2.0), 0, 10),
    ];
    rank(Condition::Critical, &mut cands);
    assert_eq!(cands[0].responder.role, ResponderRole::Feeder);
  }

  #[test]
  fn vet_preferred_for_sick() {
    let mut cands = vec![
      scored(ResponderRole::Rescuer, Some(2.0), 0, 10),
      scored(ResponderRole::Vet, Some(2.0), 0, 10),
    ];
    rank(Condition::Sick, &mut cands);
    assert_eq!(cands[0].responder.role, ResponderRole::Vet);
  }

  #[test]
  fn seniority_is_the_final_tiebreak() {
    let mut cands = vec![
      scored(ResponderRole::Feeder, Some(2.0), 0, 1),
      scored(ResponderRole::Transport, Some(2.0), 0, 100),
    ];
    rank(Condition::Malnourished, &mut cands);
    assert_eq!(cands[0].responder.role, ResponderRole::Transport);
  }

  #[test]
  fn ranking_is_deterministic() {
    let base = vec![
      scored(ResponderRole::Vet, Some(1.0), 2, 5),
      scored(ResponderRole::Rescuer, Some(2.0), 0, 8),
      scored(ResponderRole::Feeder, Some(18.0), 0, 3),
      scored(ResponderRole::Transport, None, 1, 30),
    ];
    let mut a = base.clone();
    let mut b = base;
    b.reverse();
    rank(Condition::Injured, &mut a);
    rank(Condition::Injured, &mut b);
    let ids = |v: &[Scored]| {
      v.iter().map(|s| s.responder.responder_id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&a), ids(&b));
  }

  #[test]
  fn unknown_distance_lands_in_the_last_bucket() {
    let mut cands = vec![
      scored(ResponderRole::Rescuer, None, 0, 10),
      scored(ResponderRole::Feeder, Some(40.0), 5, 10),
    ];
    rank(Condition::Critical, &mut cands);
    assert_eq!(cands[0].responder.role, ResponderRole::Feeder);
  }

  #[test]
  fn area_text_fallback_matches_substrings() {
    let pool = vec![
      responder(ResponderRole::Feeder, 1),
      {
        let mut r = responder(ResponderRole::Rescuer, 1);
        r.area = "Whitefield".into();
        r
      },
    ];
    let matched = eligible_by_area_text("near Indiranagar metro", pool);
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].0.role, ResponderRole::Feeder);
  }
}
