use crate::error::{EngineError, Result};
use crate::models::{IngestReport, RatingEvent, UserProfile};
use crate::storage::{ProfileRepository, RatingsRepository};
use crate::utils;
use crate::utils::validation::validate_rating_event;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Event log of submitted ratings. One event per (user, movie) pair, the most
/// recent timestamp winning on upsert.
#[derive(Debug, Clone, Default)]
pub struct RatingsStore {
    events: Vec<RatingEvent>,
}

impl RatingsStore {
    pub fn new(events: Vec<RatingEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[RatingEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn seen_by(&self, user_id: i64) -> Vec<i64> {
        self.events
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.movie_id)
            .collect()
    }

    pub fn ratings_of(&self, user_id: i64) -> Vec<(i64, f32)> {
        self.events
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| (e.movie_id, e.rating))
            .collect()
    }

    pub fn rating_of(&self, user_id: i64, movie_id: i64) -> Option<f32> {
        self.events
            .iter()
            .find(|e| e.user_id == user_id && e.movie_id == movie_id)
            .map(|e| e.rating)
    }

    pub fn upsert(&mut self, event: RatingEvent) {
        match self.events.iter_mut().find(|e| e.pair() == event.pair()) {
            Some(existing) => {
                if event.timestamp >= existing.timestamp {
                    *existing = event;
                }
            }
            None => self.events.push(event),
        }
    }
}

/// Concatenate the two event logs and keep exactly one event per
/// (user, movie) pair, the one with the greatest timestamp; equal timestamps
/// resolve to the later source position. The pre-dedup length is checked
/// against the sum of the inputs and a mismatch rejects the whole merge.
pub fn merge_new_ratings(
    existing: &[RatingEvent],
    incoming: &[RatingEvent],
) -> Result<Vec<RatingEvent>> {
    let mut combined = Vec::with_capacity(existing.len() + incoming.len());
    combined.extend_from_slice(existing);
    combined.extend_from_slice(incoming);

    if combined.len() != existing.len() + incoming.len() {
        return Err(EngineError::ConsistencyViolation(format!(
            "pre-dedup merge size {} != {} existing + {} incoming",
            combined.len(),
            existing.len(),
            incoming.len()
        )));
    }

    // Stable sort: equal timestamps keep source order, so the later source
    // position wins the pair below.
    combined.sort_by_key(|e| e.timestamp);

    let mut slot: HashMap<(i64, i64), usize> = HashMap::with_capacity(combined.len());
    let mut merged: Vec<RatingEvent> = Vec::with_capacity(combined.len());
    for event in combined {
        match slot.get(&event.pair()) {
            Some(&i) => merged[i] = event,
            None => {
                slot.insert(event.pair(), merged.len());
                merged.push(event);
            }
        }
    }

    Ok(merged)
}

/// Materialized per-user aggregates, always rebuilt wholesale from the full
/// event log; there is no partial-mutation path.
#[derive(Debug, Clone, Default)]
pub struct UserProfileStore {
    profiles: HashMap<i64, UserProfile>,
}

impl UserProfileStore {
    pub fn new(profiles: Vec<UserProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.user_id, p)).collect(),
        }
    }

    pub fn rebuild(events: &[RatingEvent]) -> Self {
        let mut sums: HashMap<i64, (f32, f32, usize)> = HashMap::new();
        for event in events {
            let entry = sums.entry(event.user_id).or_insert((0.0, 0.0, 0));
            entry.0 += event.rating;
            entry.1 += utils::hour_of_day_utc(event.timestamp);
            entry.2 += 1;
        }

        let profiles = sums
            .into_iter()
            .map(|(user_id, (rating_sum, hour_sum, count))| {
                (
                    user_id,
                    UserProfile {
                        user_id,
                        avg_rating: rating_sum / count as f32,
                        avg_hour: hour_sum / count as f32,
                    },
                )
            })
            .collect();

        Self { profiles }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, user_id: i64) -> Option<&UserProfile> {
        self.profiles.get(&user_id)
    }

    /// Profiles ordered by user id, for deterministic downstream fits.
    pub fn sorted(&self) -> Vec<UserProfile> {
        let mut profiles: Vec<UserProfile> = self.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| p.user_id);
        profiles
    }
}

/// The single write path of the engine: merging collected ratings into the
/// store and rebuilding the derived profiles, serialized by an exclusive lock
/// so readers never observe a partially merged snapshot.
pub struct IngestionService {
    ratings: Arc<RwLock<RatingsStore>>,
    profiles: Arc<RwLock<UserProfileStore>>,
    ratings_repo: Arc<dyn RatingsRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    write_lock: Mutex<()>,
}

impl IngestionService {
    pub fn new(
        ratings: Arc<RwLock<RatingsStore>>,
        profiles: Arc<RwLock<UserProfileStore>>,
        ratings_repo: Arc<dyn RatingsRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            ratings,
            profiles,
            ratings_repo,
            profile_repo,
            write_lock: Mutex::new(()),
        }
    }

    /// Merge a batch of newly collected ratings, rebuild profiles and persist
    /// both. All consistency checks run before anything is written; a failure
    /// leaves the in-memory stores and the persisted state untouched.
    pub fn ingest_batch(&self, incoming: Vec<RatingEvent>) -> Result<IngestReport> {
        let _guard = self.write_lock.lock();

        for event in &incoming {
            validate_rating_event(event)?;
        }

        let existing = self.ratings.read().events().to_vec();
        info!(
            "Merging {} incoming ratings into {} existing",
            incoming.len(),
            existing.len()
        );

        let merged = merge_new_ratings(&existing, &incoming)?;
        let rebuilt = UserProfileStore::rebuild(&merged);

        let previous_profiles = self.profiles.read().len();
        if rebuilt.len() < previous_profiles {
            warn!(
                "Profile rebuild shrank: {} -> {}",
                previous_profiles,
                rebuilt.len()
            );
            return Err(EngineError::ConsistencyViolation(format!(
                "profile count shrank from {} to {} during rebuild",
                previous_profiles,
                rebuilt.len()
            )));
        }

        self.ratings_repo.save(&merged)?;
        self.profile_repo.save(&rebuilt.sorted())?;

        let report = IngestReport {
            incoming_events: incoming.len(),
            merged_events: merged.len(),
            profile_count: rebuilt.len(),
        };

        *self.ratings.write() = RatingsStore::new(merged);
        *self.profiles.write() = rebuilt;

        info!(
            "Ingested batch: {} merged events, {} profiles",
            report.merged_events, report.profile_count
        );
        Ok(report)
    }

    /// Record a single rating with the current time, replacing any previous
    /// rating of the same movie by the same user.
    pub fn record_rating(&self, user_id: i64, movie_id: i64, rating: f32) -> Result<()> {
        let event = RatingEvent::new(user_id, movie_id, rating, Utc::now().timestamp());
        validate_rating_event(&event)?;

        let _guard = self.write_lock.lock();
        let mut store = self.ratings.write();
        store.upsert(event);
        self.ratings_repo.save(store.events())?;

        info!("Recorded rating {rating} for movie {movie_id} by user {user_id}");
        Ok(())
    }
}
