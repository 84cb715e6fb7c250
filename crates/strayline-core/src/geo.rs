//! Geohash-bucketed spatial index over case and responder coordinates.
//!
//! Points are stored in precision-5 geohash cells (roughly 5 km square)
//! inside a `BTreeMap`, so a radius query resolves to a handful of
//! prefix range-scans plus a haversine filter — O(log n) average at the
//! target scale of tens of thousands of points. The index is a ranking
//! aid rebuilt from the store at startup; it is never the source of truth.

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  sync::RwLock,
};

use uuid::Uuid;

use crate::{Error, Result, case::Coordinates};

/// Storage precision. ~4.9 km x 4.9 km cells.
const CELL_PRECISION: usize = 5;

/// Widening steps (km) used by [`GeoIndex::nearest`]; mirrors the dispatch
/// radius steps before falling back to a full scan.
const NEAREST_STEPS_KM: [f64; 3] = [5.0, 15.0, 50.0];

// ─── Distance ────────────────────────────────────────────────────────────────

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
  const EARTH_RADIUS_KM: f64 = 6371.0;
  let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
  let dlat = (b.lat - a.lat).to_radians();
  let dlon = (b.lon - a.lon).to_radians();
  let h = (dlat / 2.0).sin().powi(2)
    + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

// ─── Index ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Cells {
  /// geohash-5 cell -> points inside it.
  by_cell: BTreeMap<String, HashMap<Uuid, Coordinates>>,
  /// point -> (cell, coordinates), for O(1) upsert/remove.
  by_id:   HashMap<Uuid, (String, Coordinates)>,
}

/// Thread-safe in-memory spatial index. Queries take a read lock only;
/// writes are short single-point updates.
#[derive(Default)]
pub struct GeoIndex {
  inner: RwLock<Cells>,
}

impl GeoIndex {
  pub fn new() -> Self { Self::default() }

  /// Insert or move a point. Fails with `Validation` for out-of-range
  /// coordinates.
  pub fn upsert(&self, id: Uuid, coords: Coordinates) -> Result<()> {
    let cell = encode_cell(coords, CELL_PRECISION)?;
    let mut cells = self.write_lock()?;
    if let Some((old_cell, _)) = cells.by_id.remove(&id)
      && let Some(points) = cells.by_cell.get_mut(&old_cell)
    {
      points.remove(&id);
      if points.is_empty() {
        cells.by_cell.remove(&old_cell);
      }
    }
    cells.by_cell.entry(cell.clone()).or_default().insert(id, coords);
    cells.by_id.insert(id, (cell, coords));
    Ok(())
  }

  pub fn remove(&self, id: Uuid) -> Result<()> {
    let mut cells = self.write_lock()?;
    if let Some((cell, _)) = cells.by_id.remove(&id)
      && let Some(points) = cells.by_cell.get_mut(&cell)
    {
      points.remove(&id);
      if points.is_empty() {
        cells.by_cell.remove(&cell);
      }
    }
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.inner.read().map(|c| c.by_id.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// All points within `radius_km` of `center`, nearest first.
  pub fn within_radius(
    &self,
    center: Coordinates,
    radius_km: f64,
  ) -> Result<Vec<(Uuid, f64)>> {
    let cells = self.read_lock()?;

    let mut hits: Vec<(Uuid, f64)> = match prefix_precision(radius_km, center.lat)
    {
      Some(precision) => {
        let prefixes = covering_prefixes(center, precision)?;
        let mut out = Vec::new();
        for prefix in &prefixes {
          for (_, points) in cells
            .by_cell
            .range::<String, _>(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(prefix.as_str()))
          {
            for (id, coords) in points {
              let d = haversine_km(center, *coords);
              if d <= radius_km {
                out.push((*id, d));
              }
            }
          }
        }
        out
      }
      // Radius too wide for cell arithmetic; scan everything.
      None => cells
        .by_id
        .iter()
        .filter_map(|(id, (_, coords))| {
          let d = haversine_km(center, *coords);
          (d <= radius_km).then_some((*id, d))
        })
        .collect(),
    };

    sort_by_distance(&mut hits);
    Ok(hits)
  }

  /// The `n` points closest to `center`, widening the search radius in
  /// fixed steps before falling back to a full scan.
  pub fn nearest(&self, center: Coordinates, n: usize) -> Result<Vec<(Uuid, f64)>> {
    if n == 0 {
      return Ok(Vec::new());
    }
    for radius in NEAREST_STEPS_KM {
      let hits = self.within_radius(center, radius)?;
      if hits.len() >= n {
        return Ok(hits.into_iter().take(n).collect());
      }
    }

    let cells = self.read_lock()?;
    let mut all: Vec<(Uuid, f64)> = cells
      .by_id
      .iter()
      .map(|(id, (_, coords))| (*id, haversine_km(center, *coords)))
      .collect();
    sort_by_distance(&mut all);
    all.truncate(n);
    Ok(all)
  }

  fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, Cells>> {
    self
      .inner
      .read()
      .map_err(|_| Error::Unavailable("geo index lock poisoned".into()))
  }

  fn write_lock(&self) -> Result<std::sync::RwLockWriteGuard<'_, Cells>> {
    self
      .inner
      .write()
      .map_err(|_| Error::Unavailable("geo index lock poisoned".into()))
  }
}

// ─── Cell arithmetic ─────────────────────────────────────────────────────────

fn encode_cell(coords: Coordinates, precision: usize) -> Result<String> {
  geohash::encode(
    geohash::Coord { x: coords.lon, y: coords.lat },
    precision,
  )
  .map_err(|e| Error::Validation(format!("invalid coordinates: {e}")))
}

/// The coarsest geohash precision whose cells are still at least as wide as
/// `radius_km`, so a centre cell plus its 8 neighbours covers the disc.
/// `None` means the radius exceeds any workable cell size.
///
/// Cell *width* shrinks by cos(latitude), so the equator widths are scaled
/// down for the query centre; near a threshold this drops to the
/// next-coarser precision rather than miss points beyond the neighbour
/// ring.
fn prefix_precision(radius_km: f64, center_lat: f64) -> Option<usize> {
  // Clamped so polar queries still resolve instead of dividing to zero.
  let scale = center_lat.to_radians().cos().max(0.05);
  // Minimum equator cell dimension per precision, km (precision 5 to 2).
  match radius_km {
    r if r <= 4.8 * scale => Some(5),
    r if r <= 19.0 * scale => Some(4),
    r if r <= 150.0 * scale => Some(3),
    r if r <= 600.0 * scale => Some(2),
    _ => None,
  }
}

/// Centre cell plus neighbours at the given precision, deduplicated (at
/// coarse precisions neighbours can wrap onto each other).
fn covering_prefixes(
  center: Coordinates,
  precision: usize,
) -> Result<HashSet<String>> {
  let cell = encode_cell(center, precision)?;
  let neighbors = geohash::neighbors(&cell)
    .map_err(|e| Error::Validation(format!("invalid geohash cell: {e}")))?;
  let mut prefixes = HashSet::from([
    neighbors.sw, neighbors.s, neighbors.se, neighbors.w, neighbors.e,
    neighbors.nw, neighbors.n, neighbors.ne,
  ]);
  prefixes.insert(cell);
  Ok(prefixes)
}

/// Deterministic ordering: distance, then id as tiebreak.
fn sort_by_distance(hits: &mut [(Uuid, f64)]) {
  hits.sort_by(|a, b| {
    a.1
      .partial_cmp(&b.1)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then_with(|| a.0.cmp(&b.0))
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  // Around central Bengaluru.
  const CENTER: Coordinates = Coordinates { lon: 77.59, lat: 12.97 };

  fn offset_km(base: Coordinates, km_north: f64) -> Coordinates {
    // 1 degree of latitude is ~111.2 km.
    Coordinates { lon: base.lon, lat: base.lat + km_north / 111.2 }
  }

  fn offset_km_east(base: Coordinates, km_east: f64) -> Coordinates {
    let km_per_degree = 111.2 * base.lat.to_radians().cos();
    Coordinates { lon: base.lon + km_east / km_per_degree, lat: base.lat }
  }

  #[test]
  fn haversine_is_roughly_right() {
    let d = haversine_km(CENTER, offset_km(CENTER, 10.0));
    assert!((d - 10.0).abs() < 0.1, "got {d}");
  }

  #[test]
  fn within_radius_filters_and_sorts() {
    let index = GeoIndex::new();
    let near = Uuid::new_v4();
    let mid = Uuid::new_v4();
    let far = Uuid::new_v4();
    index.upsert(near, offset_km(CENTER, 1.0)).unwrap();
    index.upsert(mid, offset_km(CENTER, 4.0)).unwrap();
    index.upsert(far, offset_km(CENTER, 40.0)).unwrap();

    let hits = index.within_radius(CENTER, 5.0).unwrap();
    assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![near, mid]);

    let hits = index.within_radius(CENTER, 50.0).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[2].0, far);
  }

  #[test]
  fn upsert_moves_a_point() {
    let index = GeoIndex::new();
    let id = Uuid::new_v4();
    index.upsert(id, offset_km(CENTER, 1.0)).unwrap();
    index.upsert(id, offset_km(CENTER, 100.0)).unwrap();

    assert_eq!(index.len(), 1);
    assert!(index.within_radius(CENTER, 5.0).unwrap().is_empty());
    assert_eq!(index.within_radius(CENTER, 150.0).unwrap().len(), 1);
  }

  #[test]
  fn remove_drops_the_point() {
    let index = GeoIndex::new();
    let id = Uuid::new_v4();
    index.upsert(id, CENTER).unwrap();
    index.remove(id).unwrap();
    assert!(index.is_empty());
    assert!(index.within_radius(CENTER, 5.0).unwrap().is_empty());
  }

  #[test]
  fn nearest_widens_until_enough() {
    let index = GeoIndex::new();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    index.upsert(a, offset_km(CENTER, 2.0)).unwrap();
    index.upsert(b, offset_km(CENTER, 30.0)).unwrap();
    index.upsert(c, offset_km(CENTER, 400.0)).unwrap();

    let two = index.nearest(CENTER, 2).unwrap();
    assert_eq!(two.iter().map(|h| h.0).collect::<Vec<_>>(), vec![a, b]);

    // More requested than indexed: full scan returns everything.
    let all = index.nearest(CENTER, 10).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].0, c);
  }

  #[test]
  fn high_latitude_radius_near_threshold_still_covers() {
    // At 60N a precision-5 cell is only ~2.4 km wide, so a 4.5 km query
    // must widen to a coarser prefix to cover its whole disc.
    let center = Coordinates { lon: 10.0, lat: 60.0 };
    let index = GeoIndex::new();
    let east = Uuid::new_v4();
    let far = Uuid::new_v4();
    index.upsert(east, offset_km_east(center, 4.2)).unwrap();
    index.upsert(far, offset_km_east(center, 25.0)).unwrap();

    let hits = index.within_radius(center, 4.5).unwrap();
    assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![east]);
  }

  #[test]
  fn rejects_out_of_range_coordinates() {
    let index = GeoIndex::new();
    let err = index
      .upsert(Uuid::new_v4(), Coordinates { lon: 200.0, lat: 99.0 })
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }
}
