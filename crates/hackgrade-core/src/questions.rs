//! Question Store: id → question and reference answer.
//!
//! A load either yields the complete mapping or fails; there is no partial
//! load. Reloading replaces the whole mapping, readers keep whatever snapshot
//! they already hold.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{GradeError, GradeResult};
use crate::model::Question;

#[derive(Debug, Deserialize)]
struct QuestionsFile {
    questions: Vec<Question>,
}

/// Immutable question mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionBank {
    by_id: HashMap<String, Question>,
}

impl QuestionBank {
    pub fn from_questions(questions: Vec<Question>) -> Result<Self, String> {
        let mut by_id = HashMap::with_capacity(questions.len());
        for q in questions {
            if q.id.trim().is_empty() {
                return Err("question with empty id".to_string());
            }
            if let Some(prev) = by_id.insert(q.id.clone(), q) {
                return Err(format!("duplicate question id '{}'", prev.id));
            }
        }
        Ok(Self { by_id })
    }

    pub fn parse(json: &str) -> Result<Self, String> {
        let file: QuestionsFile = serde_json::from_str(json).map_err(|e| e.to_string())?;
        Self::from_questions(file.questions)
    }

    pub fn load(path: &Path) -> GradeResult<Self> {
        let store_err = |message: String| GradeError::QuestionStore {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| store_err(e.to_string()))?;
        Self::parse(&content).map_err(store_err)
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.by_id.get(id)
    }

    /// Like [`get`](Self::get), failing with [`GradeError::UnknownQuestion`].
    pub fn require(&self, id: &str) -> GradeResult<&Question> {
        self.get(id).ok_or_else(|| GradeError::UnknownQuestion {
            question_id: id.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Question ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_id.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// File-backed, reloadable store.
#[derive(Debug, Clone)]
pub struct QuestionStore {
    path: PathBuf,
    current: Arc<RwLock<Arc<QuestionBank>>>,
}

impl QuestionStore {
    /// Load `path`; a malformed file fails startup.
    pub fn open(path: impl Into<PathBuf>) -> GradeResult<Self> {
        let path = path.into();
        let bank = QuestionBank::load(&path)?;
        info!(path = %path.display(), questions = bank.len(), "questions loaded");
        Ok(Self {
            path,
            current: Arc::new(RwLock::new(Arc::new(bank))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> Arc<QuestionBank> {
        self.current.read().await.clone()
    }

    /// Re-read the file and swap in the new mapping. On failure the current
    /// mapping stays in place.
    pub async fn reload(&self) -> GradeResult<usize> {
        let bank = QuestionBank::load(&self.path)?;
        let count = bank.len();
        *self.current.write().await = Arc::new(bank);
        info!(path = %self.path.display(), questions = count, "questions reloaded");
        Ok(count)
    }
}
