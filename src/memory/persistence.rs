//! 清单快照持久化
//!
//! ArtifactStore：save 返回对核心不透明的位置字符串，load 按位置读回。
//! ChecklistRepository 将快照写为 JSON 文件；InMemoryArtifactStore 用于测试与嵌入场景。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use crate::core::ChecklistError;
use crate::memory::ChecklistArtifact;

/// 快照存储抽象
pub trait ArtifactStore: Send + Sync {
    fn save(&self, artifact: &ChecklistArtifact) -> Result<String, ChecklistError>;

    fn load(&self, location: &str) -> Result<ChecklistArtifact, ChecklistError>;
}

/// 文件持久化：每次保存生成一个 checklist_<时间戳>.json
#[derive(Debug, Clone)]
pub struct ChecklistRepository {
    base_path: PathBuf,
}

impl ChecklistRepository {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl ArtifactStore for ChecklistRepository {
    /// 写入 JSON 文件；目录不存在时自动创建
    fn save(&self, artifact: &ChecklistArtifact) -> Result<String, ChecklistError> {
        std::fs::create_dir_all(&self.base_path)?;
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        let mut file_path = self.base_path.join(format!("checklist_{}.json", timestamp));
        // 同一毫秒内重复保存时追加短后缀
        if file_path.exists() {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            file_path = self
                .base_path
                .join(format!("checklist_{}_{}.json", timestamp, &suffix[..8]));
        }
        std::fs::write(&file_path, serde_json::to_string_pretty(artifact)?)?;
        tracing::info!(path = %file_path.display(), items = artifact.items.len(), "Checklist artifact saved");
        Ok(file_path.to_string_lossy().into_owned())
    }

    fn load(&self, location: &str) -> Result<ChecklistArtifact, ChecklistError> {
        let data = std::fs::read_to_string(location)?;
        let artifact: ChecklistArtifact = serde_json::from_str(&data)?;
        tracing::debug!(path = location, "Checklist artifact loaded");
        Ok(artifact)
    }
}

/// 内存存储：以 JSON 文本保存，load 时重新解析，与文件实现行为一致
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn save(&self, artifact: &ChecklistArtifact) -> Result<String, ChecklistError> {
        let raw = serde_json::to_string(artifact)?;
        let location = format!("memory://checklist/{}", uuid::Uuid::new_v4().simple());
        self.entries
            .lock()
            .map_err(|_| ChecklistError::Io(std::io::Error::other("artifact store poisoned")))?
            .insert(location.clone(), raw);
        Ok(location)
    }

    fn load(&self, location: &str) -> Result<ChecklistArtifact, ChecklistError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ChecklistError::Io(std::io::Error::other("artifact store poisoned")))?;
        let raw = entries.get(location).ok_or_else(|| {
            ChecklistError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no artifact at {}", location),
            ))
        })?;
        Ok(serde_json::from_str(raw)?)
    }
}
