use crate::team::TeamSpec;
use crate::{TaskforceError, TaskforceResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one finished run, appended to a team's execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Team that ran.
    pub team_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Whether every executed task completed.
    pub success: bool,
    /// Number of completed tasks.
    pub completed_tasks: usize,
    /// Number of failed tasks.
    pub failed_tasks: usize,
    /// Number of skipped tasks.
    pub skipped_tasks: usize,
    /// Failure description, if any.
    pub error: Option<String>,
}

/// Repository capability for team definitions and execution history.
///
/// Injected by the calling layer; the orchestration core assumes neither
/// a schema nor a specific store.
#[async_trait]
pub trait TeamStore: Send + Sync {
    /// Persist a team definition.
    async fn save(&self, team: &TeamSpec) -> TaskforceResult<()>;
    /// Load a team definition.
    async fn load(&self, team_id: Uuid) -> TaskforceResult<Option<TeamSpec>>;
    /// Remove a team definition.
    async fn delete(&self, team_id: Uuid) -> TaskforceResult<()>;
    /// List stored team ids.
    async fn list(&self) -> TaskforceResult<Vec<Uuid>>;
    /// Append one run's summary to a team's history.
    async fn append_execution_record(
        &self,
        team_id: Uuid,
        record: ExecutionRecord,
    ) -> TaskforceResult<()>;
    /// Fetch a team's execution history, oldest first.
    async fn execution_history(&self, team_id: Uuid) -> TaskforceResult<Vec<ExecutionRecord>>;
}

/// In-memory store, useful for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryTeamStore {
    teams: RwLock<HashMap<Uuid, TeamSpec>>,
    records: RwLock<HashMap<Uuid, Vec<ExecutionRecord>>>,
}

impl MemoryTeamStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TeamStore for MemoryTeamStore {
    async fn save(&self, team: &TeamSpec) -> TaskforceResult<()> {
        self.teams.write().await.insert(team.id, team.clone());
        Ok(())
    }

    async fn load(&self, team_id: Uuid) -> TaskforceResult<Option<TeamSpec>> {
        Ok(self.teams.read().await.get(&team_id).cloned())
    }

    async fn delete(&self, team_id: Uuid) -> TaskforceResult<()> {
        self.teams.write().await.remove(&team_id);
        self.records.write().await.remove(&team_id);
        Ok(())
    }

    async fn list(&self) -> TaskforceResult<Vec<Uuid>> {
        Ok(self.teams.read().await.keys().copied().collect())
    }

    async fn append_execution_record(
        &self,
        team_id: Uuid,
        record: ExecutionRecord,
    ) -> TaskforceResult<()> {
        self.records
            .write()
            .await
            .entry(team_id)
            .or_default()
            .push(record);
        Ok(())
    }

    async fn execution_history(&self, team_id: Uuid) -> TaskforceResult<Vec<ExecutionRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&team_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// File-based store: one JSON file per team, one JSONL history file per
/// team. Good enough for single-node deployments.
pub struct FileTeamStore {
    dir: PathBuf,
}

impl FileTeamStore {
    /// Create the store, creating the backing directory if needed.
    pub async fn new(dir: PathBuf) -> TaskforceResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn team_path(&self, team_id: Uuid) -> PathBuf {
        self.dir.join(format!("{team_id}.json"))
    }

    fn history_path(&self, team_id: Uuid) -> PathBuf {
        self.dir.join(format!("{team_id}.history.jsonl"))
    }
}

#[async_trait]
impl TeamStore for FileTeamStore {
    async fn save(&self, team: &TeamSpec) -> TaskforceResult<()> {
        let json = serde_json::to_string_pretty(team)?;
        tokio::fs::write(self.team_path(team.id), json).await?;
        Ok(())
    }

    async fn load(&self, team_id: Uuid) -> TaskforceResult<Option<TeamSpec>> {
        let path = self.team_path(team_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let team: TeamSpec = serde_json::from_str(&data)
            .map_err(|e| TaskforceError::Store(format!("failed to parse team: {e}")))?;
        Ok(Some(team))
    }

    async fn delete(&self, team_id: Uuid) -> TaskforceResult<()> {
        let path = self.team_path(team_id);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        let history = self.history_path(team_id);
        if history.exists() {
            tokio::fs::remove_file(history).await?;
        }
        Ok(())
    }

    async fn list(&self) -> TaskforceResult<Vec<Uuid>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".json") {
                if let Ok(id) = stem.parse::<Uuid>() {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    async fn append_execution_record(
        &self,
        team_id: Uuid,
        record: ExecutionRecord,
    ) -> TaskforceResult<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path(team_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn execution_history(&self, team_id: Uuid) -> TaskforceResult<Vec<ExecutionRecord>> {
        let path = self.history_path(team_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(path).await?;
        let mut records = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            let record: ExecutionRecord = serde_json::from_str(line)
                .map_err(|e| TaskforceError::Store(format!("corrupt history line: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::team::{AgentRole, AgentSpec, ExecutionMode};

    fn demo_team() -> TeamSpec {
        TeamSpec::new("demo", ExecutionMode::Sequential)
            .with_agent(AgentSpec::new("a", AgentRole::Writer, "write"))
    }

    fn demo_record(team_id: Uuid, success: bool) -> ExecutionRecord {
        ExecutionRecord {
            team_id,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            success,
            completed_tasks: 2,
            failed_tasks: usize::from(!success),
            skipped_tasks: 0,
            error: (!success).then(|| "task failed".to_string()),
        }
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryTeamStore::new();
        let team = demo_team();
        let id = team.id;

        store.save(&team).await.unwrap();
        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "demo");
        assert_eq!(store.list().await.unwrap(), vec![id]);

        store.delete(id).await.unwrap();
        assert!(store.load(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_history() {
        let store = MemoryTeamStore::new();
        let id = Uuid::new_v4();
        store
            .append_execution_record(id, demo_record(id, true))
            .await
            .unwrap();
        store
            .append_execution_record(id, demo_record(id, false))
            .await
            .unwrap();

        let history = store.execution_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].success);
        assert!(!history[1].success);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileTeamStore::new(tmp.path().to_path_buf()).await.unwrap();
        let team = demo_team();
        let id = team.id;

        store.save(&team).await.unwrap();
        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(store.list().await.unwrap(), vec![id]);

        store.delete(id).await.unwrap();
        assert!(store.load(id).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_history_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileTeamStore::new(tmp.path().to_path_buf()).await.unwrap();
        let id = Uuid::new_v4();

        assert!(store.execution_history(id).await.unwrap().is_empty());

        store
            .append_execution_record(id, demo_record(id, true))
            .await
            .unwrap();
        store
            .append_execution_record(id, demo_record(id, false))
            .await
            .unwrap();

        let history = store.execution_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].error.as_deref(), Some("task failed"));
    }

    #[tokio::test]
    async fn test_load_missing_team_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileTeamStore::new(tmp.path().to_path_buf()).await.unwrap();
        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }
}
