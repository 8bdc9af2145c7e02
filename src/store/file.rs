use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::{
        EngineError, business_conflict, internal_error, invalid_request, not_found,
        version_conflict,
    },
    roadmap::RoadmapState,
    skills::{LearningState, SkillEntry},
    store::ports::{LearningStateStore, RoadmapRepository},
};

const PERSISTENCE_VERSION: u64 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedDocument<T> {
    version: u64,
    document: T,
}

#[derive(Debug, Clone)]
struct DocumentDir {
    dir: PathBuf,
    kind: &'static str,
}

impl DocumentDir {
    fn path_for(&self, user_id: &str) -> Result<PathBuf, EngineError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !user_id.starts_with('.');
        if !valid {
            return Err(invalid_request(format!(
                "user id '{}' cannot be used as a storage key",
                user_id
            )));
        }
        Ok(self.dir.join(format!("{user_id}.json")))
    }

    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, EngineError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(internal_error(format!(
                    "failed to read {} '{}': {err}",
                    self.kind,
                    path.display()
                )));
            }
        };

        let parsed: PersistedDocument<T> = serde_json::from_str(&content).map_err(|err| {
            internal_error(format!(
                "failed to parse {} '{}': {err}",
                self.kind,
                path.display()
            ))
        })?;
        if parsed.version != PERSISTENCE_VERSION {
            return Err(internal_error(format!(
                "unsupported {} version {} at '{}'",
                self.kind,
                parsed.version,
                path.display()
            )));
        }
        Ok(Some(parsed.document))
    }

    fn write<T: Serialize>(&self, path: &Path, document: &T) -> Result<(), EngineError> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            internal_error(format!(
                "failed to create {} directory '{}': {err}",
                self.kind,
                self.dir.display()
            ))
        })?;

        let persisted = PersistedDocument {
            version: PERSISTENCE_VERSION,
            document,
        };
        let tmp_path = path.with_extension("tmp");
        let file = fs::File::create(&tmp_path).map_err(|err| {
            internal_error(format!(
                "failed to create {} temp file '{}': {err}",
                self.kind,
                tmp_path.display()
            ))
        })?;
        {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &persisted).map_err(|err| {
                internal_error(format!(
                    "failed to serialize {} '{}': {err}",
                    self.kind,
                    tmp_path.display()
                ))
            })?;
            writer.write_all(b"\n").map_err(|err| {
                internal_error(format!(
                    "failed to finalize {} '{}': {err}",
                    self.kind,
                    tmp_path.display()
                ))
            })?;
            let file = writer.into_inner().map_err(|err| {
                internal_error(format!(
                    "failed to flush {} '{}': {err}",
                    self.kind,
                    tmp_path.display()
                ))
            })?;
            file.sync_all().map_err(|err| {
                internal_error(format!(
                    "failed to sync {} temp file '{}': {err}",
                    self.kind,
                    tmp_path.display()
                ))
            })?;
        }

        fs::rename(&tmp_path, path).map_err(|err| {
            internal_error(format!(
                "failed to replace {} '{}' from '{}': {err}",
                self.kind,
                path.display(),
                tmp_path.display()
            ))
        })?;

        if let Ok(dir_file) = fs::File::open(&self.dir) {
            let _ = dir_file.sync_all();
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct FileRoadmapRepository {
    documents: DocumentDir,
    write_lock: Mutex<()>,
}

impl FileRoadmapRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            documents: DocumentDir {
                dir: dir.into(),
                kind: "roadmap",
            },
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.documents.dir
    }
}

#[async_trait]
impl RoadmapRepository for FileRoadmapRepository {
    async fn load(&self, user_id: &str) -> Result<Option<RoadmapState>, EngineError> {
        let path = self.documents.path_for(user_id)?;
        self.documents.read(&path)
    }

    async fn create(&self, roadmap: &RoadmapState) -> Result<(), EngineError> {
        let path = self.documents.path_for(&roadmap.user_id)?;
        let _guard = self.write_lock.lock().await;
        if path.exists() {
            return Err(business_conflict(format!(
                "roadmap for '{}' already exists",
                roadmap.user_id
            )));
        }
        self.documents.write(&path, roadmap)?;
        debug!(target: "store", user_id = %roadmap.user_id, path = %path.display(), "roadmap_created");
        Ok(())
    }

    async fn commit(
        &self,
        roadmap: &RoadmapState,
        expected_version: u64,
    ) -> Result<u64, EngineError> {
        let path = self.documents.path_for(&roadmap.user_id)?;
        let _guard = self.write_lock.lock().await;
        let stored: RoadmapState = self.documents.read(&path)?.ok_or_else(|| {
            not_found(format!("no roadmap stored for '{}'", roadmap.user_id))
        })?;
        if stored.version != expected_version {
            return Err(version_conflict(format!(
                "roadmap for '{}' is at version {}, expected {}",
                roadmap.user_id, stored.version, expected_version
            )));
        }

        let next_version = expected_version + 1;
        let mut committed = roadmap.clone();
        committed.version = next_version;
        self.documents.write(&path, &committed)?;
        debug!(
            target: "store",
            user_id = %roadmap.user_id,
            version = next_version,
            "roadmap_committed"
        );
        Ok(next_version)
    }
}

#[derive(Debug)]
pub struct FileLearningStateStore {
    documents: DocumentDir,
    write_lock: Mutex<()>,
}

impl FileLearningStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            documents: DocumentDir {
                dir: dir.into(),
                kind: "learning state",
            },
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl LearningStateStore for FileLearningStateStore {
    async fn load(&self, user_id: &str) -> Result<LearningState, EngineError> {
        let path = self.documents.path_for(user_id)?;
        Ok(self
            .documents
            .read(&path)?
            .unwrap_or_else(|| LearningState::empty(user_id)))
    }

    async fn apply_entries(
        &self,
        user_id: &str,
        entries: BTreeMap<String, SkillEntry>,
        now: OffsetDateTime,
    ) -> Result<(), EngineError> {
        let path = self.documents.path_for(user_id)?;
        let _guard = self.write_lock.lock().await;
        let mut state: LearningState = self
            .documents
            .read(&path)?
            .unwrap_or_else(|| LearningState::empty(user_id));
        state.skill_vector.extend(entries);
        state.updated_at = Some(now);
        self.documents.write(&path, &state)
    }
}
