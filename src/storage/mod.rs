//! Boundary traits for tabular data, external ids and trained-artifact blobs,
//! with thin delimited-file implementations and in-memory counterparts for
//! tests. The on-disk format is deliberately not part of the core contract.

use crate::error::{EngineError, Result};
use crate::models::{MovieEntry, RatingEvent, UserProfile};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub trait RatingsRepository: Send + Sync {
    fn load(&self) -> Result<Vec<RatingEvent>>;
    fn save(&self, events: &[RatingEvent]) -> Result<()>;
}

pub trait CatalogSource: Send + Sync {
    fn load(&self) -> Result<Vec<MovieEntry>>;
}

pub trait ProfileRepository: Send + Sync {
    fn load(&self) -> Result<Vec<UserProfile>>;
    fn save(&self, profiles: &[UserProfile]) -> Result<()>;
}

/// Opaque named-blob storage for trained model artifacts.
pub trait ArtifactStore: Send + Sync {
    fn save_artifact(&self, name: &str, blob: &[u8]) -> Result<()>;
    fn load_artifact(&self, name: &str) -> Result<Vec<u8>>;
}

pub trait ExternalIdResolver: Send + Sync {
    fn resolve(&self, movie_id: i64) -> Result<String>;
}

fn parse_field<T: std::str::FromStr>(field: &str, line: &str) -> Result<T> {
    field
        .trim()
        .parse()
        .map_err(|_| EngineError::Malformed(format!("bad field `{field}` in line `{line}`")))
}

fn is_header(line: &str) -> bool {
    line.split(',')
        .next()
        .map(|first| first.trim().parse::<i64>().is_err())
        .unwrap_or(true)
}

/// `userId,movieId,rating,timestamp` rows.
pub struct DelimitedRatingsFile {
    path: PathBuf,
}

impl DelimitedRatingsFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RatingsRepository for DelimitedRatingsFile {
    fn load(&self) -> Result<Vec<RatingEvent>> {
        let raw = fs::read_to_string(&self.path)?;
        let mut events = Vec::new();

        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            if is_header(line) {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 4 {
                return Err(EngineError::Malformed(format!(
                    "expected 4 rating fields, got {} in `{line}`",
                    fields.len()
                )));
            }
            events.push(RatingEvent {
                user_id: parse_field(fields[0], line)?,
                movie_id: parse_field(fields[1], line)?,
                rating: parse_field(fields[2], line)?,
                timestamp: parse_field(fields[3], line)?,
            });
        }

        Ok(events)
    }

    fn save(&self, events: &[RatingEvent]) -> Result<()> {
        let mut out = String::from("userId,movieId,rating,timestamp\n");
        for event in events {
            out.push_str(&format!(
                "{},{},{},{}\n",
                event.user_id, event.movie_id, event.rating, event.timestamp
            ));
        }
        fs::write(&self.path, out)?;
        Ok(())
    }
}

/// `movieId,title,genres` rows; titles may be quoted and contain commas.
pub struct DelimitedCatalogFile {
    path: PathBuf,
}

impl DelimitedCatalogFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CatalogSource for DelimitedCatalogFile {
    fn load(&self) -> Result<Vec<MovieEntry>> {
        let raw = fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();

        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            if is_header(line) {
                continue;
            }
            let (id_field, rest) = line
                .split_once(',')
                .ok_or_else(|| EngineError::Malformed(format!("bad catalog line `{line}`")))?;
            let (title, genres) = rest
                .rsplit_once(',')
                .ok_or_else(|| EngineError::Malformed(format!("bad catalog line `{line}`")))?;

            entries.push(MovieEntry {
                movie_id: parse_field(id_field, line)?,
                title: title.trim().trim_matches('"').to_string(),
                genres: genres.trim().to_string(),
            });
        }

        Ok(entries)
    }
}

/// `userId,avg_rating,avg_hour` rows.
pub struct DelimitedProfileFile {
    path: PathBuf,
}

impl DelimitedProfileFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ProfileRepository for DelimitedProfileFile {
    fn load(&self) -> Result<Vec<UserProfile>> {
        let raw = fs::read_to_string(&self.path)?;
        let mut profiles = Vec::new();

        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            if is_header(line) {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 3 {
                return Err(EngineError::Malformed(format!(
                    "expected 3 profile fields, got {} in `{line}`",
                    fields.len()
                )));
            }
            profiles.push(UserProfile {
                user_id: parse_field(fields[0], line)?,
                avg_rating: parse_field(fields[1], line)?,
                avg_hour: parse_field(fields[2], line)?,
            });
        }

        Ok(profiles)
    }

    fn save(&self, profiles: &[UserProfile]) -> Result<()> {
        let mut out = String::from("userId,avg_rating,avg_hour\n");
        for profile in profiles {
            out.push_str(&format!(
                "{},{},{}\n",
                profile.user_id, profile.avg_rating, profile.avg_hour
            ));
        }
        fs::write(&self.path, out)?;
        Ok(())
    }
}

/// External-catalog id lookup backed by a `movieId,imdbId,...` links table.
/// Resolved ids are the zero-padded `tt` form used by the external site.
pub struct LinksFileResolver {
    ids: HashMap<i64, String>,
}

impl LinksFileResolver {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let mut ids = HashMap::new();

        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            if is_header(line) {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() < 2 {
                return Err(EngineError::Malformed(format!("bad links line `{line}`")));
            }
            let movie_id: i64 = parse_field(fields[0], line)?;
            ids.insert(movie_id, fields[1].trim().to_string());
        }

        Ok(Self { ids })
    }

    pub fn from_map(ids: HashMap<i64, String>) -> Self {
        Self { ids }
    }
}

impl ExternalIdResolver for LinksFileResolver {
    fn resolve(&self, movie_id: i64) -> Result<String> {
        let raw = self
            .ids
            .get(&movie_id)
            .ok_or(EngineError::movie_not_found(movie_id))?;
        Ok(format!("tt{raw:0>7}"))
    }
}

/// Artifact blobs as one file per name under a directory.
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save_artifact(&self, name: &str, blob: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = fs::File::create(self.path_for(name))?;
        file.write_all(blob)?;
        Ok(())
    }

    fn load_artifact(&self, name: &str) -> Result<Vec<u8>> {
        match fs::read(self.path_for(name)) {
            Ok(blob) => Ok(blob),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::ArtifactMissing(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory stand-ins used by tests and the integration suite.
#[derive(Default)]
pub struct MemoryRatingsRepository {
    events: Mutex<Vec<RatingEvent>>,
}

impl MemoryRatingsRepository {
    pub fn with_events(events: Vec<RatingEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }
}

impl RatingsRepository for MemoryRatingsRepository {
    fn load(&self) -> Result<Vec<RatingEvent>> {
        Ok(self.events.lock().clone())
    }

    fn save(&self, events: &[RatingEvent]) -> Result<()> {
        *self.events.lock() = events.to_vec();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryProfileRepository {
    profiles: Mutex<Vec<UserProfile>>,
}

impl MemoryProfileRepository {
    pub fn with_profiles(profiles: Vec<UserProfile>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
        }
    }
}

impl ProfileRepository for MemoryProfileRepository {
    fn load(&self) -> Result<Vec<UserProfile>> {
        Ok(self.profiles.lock().clone())
    }

    fn save(&self, profiles: &[UserProfile]) -> Result<()> {
        *self.profiles.lock() = profiles.to_vec();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl ArtifactStore for MemoryArtifactStore {
    fn save_artifact(&self, name: &str, blob: &[u8]) -> Result<()> {
        self.blobs.lock().insert(name.to_string(), blob.to_vec());
        Ok(())
    }

    fn load_artifact(&self, name: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::ArtifactMissing(name.to_string()))
    }
}
