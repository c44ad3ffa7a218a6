// orchestrator-rs/src/artifacts.rs
// Reading and atomically replacing the persisted phase artifacts

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use complaint_types::{
    ArtifactKind, ClassificationArtifact, Complaint, CuratedTaxonomy, PartialCollection, Phase, PipelineError,
    ProposedTaxonomy, TaxonomyError,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::config::PathsConfig;

/// Artifact locations plus typed read/write access
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    paths: PathsConfig,
}

impl ArtifactStore {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::RawComplaints => self.paths.raw_complaints(),
            ArtifactKind::PartialComplaints => self.paths.partial_complaints(),
            ArtifactKind::ProposedTaxonomy => self.paths.proposed_taxonomy(),
            ArtifactKind::CuratedTaxonomy => self.paths.curated_taxonomy(),
            ArtifactKind::ClassificationResults => self.paths.classification_results(),
            ArtifactKind::UsageLog => self.paths.usage_log(),
        }
    }

    pub fn exists(&self, kind: ArtifactKind) -> bool {
        self.path(kind).is_file()
    }

    pub fn modified(&self, kind: ArtifactKind) -> Option<SystemTime> {
        std::fs::metadata(self.path(kind)).and_then(|m| m.modified()).ok()
    }

    /// Raw complaints as a precondition of `phase`: present, parseable, non-empty, unique ids
    pub async fn load_complaints(&self, phase: Phase) -> Result<Vec<Complaint>, PipelineError> {
        let kind = ArtifactKind::RawComplaints;
        let path = self.path(kind);
        let contents = self.read_required(phase, kind, &path).await?;
        let complaints: Vec<Complaint> = serde_json::from_str(&contents).map_err(|e| {
            PipelineError::precondition(phase, kind.label(), format!("{} is not a complaint list: {}", path.display(), e))
        })?;
        if complaints.is_empty() {
            return Err(PipelineError::precondition(
                phase,
                kind.label(),
                format!("{} contains no complaints", path.display()),
            ));
        }

        let mut seen = HashSet::with_capacity(complaints.len());
        if let Some(duplicate) = complaints.iter().find(|c| !seen.insert(c.complaint_id.as_str())) {
            return Err(PipelineError::precondition(
                phase,
                kind.label(),
                format!(
                    "{} contains duplicate complaint_id {}",
                    path.display(),
                    duplicate.complaint_id
                ),
            ));
        }
        Ok(complaints)
    }

    /// Curated taxonomy as a precondition of `phase`; a proposed one is refused
    pub async fn load_curated(&self, phase: Phase) -> Result<CuratedTaxonomy, PipelineError> {
        let kind = ArtifactKind::CuratedTaxonomy;
        let path = self.path(kind);
        let contents = self.read_required(phase, kind, &path).await?;
        CuratedTaxonomy::from_json(&contents).map_err(|err| {
            let reason = match err {
                TaxonomyError::NotCurated => format!(
                    "{} is not curated (it still carries the proposed form); review it and save the final categories",
                    path.display()
                ),
                other => format!("{} is invalid: {}", path.display(), other),
            };
            PipelineError::precondition(phase, kind.label(), reason)
        })
    }

    pub async fn load_proposed(&self) -> Result<ProposedTaxonomy, PipelineError> {
        self.read_json(ArtifactKind::ProposedTaxonomy).await
    }

    pub async fn load_results(&self) -> Result<ClassificationArtifact, PipelineError> {
        self.read_json(ArtifactKind::ClassificationResults).await
    }

    pub async fn load_partial(&self) -> Result<PartialCollection, PipelineError> {
        self.read_json(ArtifactKind::PartialComplaints).await
    }

    pub async fn write<T: Serialize>(&self, kind: ArtifactKind, value: &T) -> Result<PathBuf, PipelineError> {
        let path = self.path(kind);
        let json = serde_json::to_vec_pretty(value).map_err(|e| PipelineError::artifact(kind, &path, e))?;
        write_atomic(&path, &json)
            .await
            .map_err(|e| PipelineError::artifact(kind, &path, e))?;
        tracing::debug!(artifact = kind.label(), path = %path.display(), bytes = json.len(), "artifact written");
        Ok(path)
    }

    /// Remove an artifact if present
    pub async fn remove(&self, kind: ArtifactKind) -> Result<(), PipelineError> {
        let path = self.path(kind);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::artifact(kind, &path, e)),
        }
    }

    async fn read_required(&self, phase: Phase, kind: ArtifactKind, path: &Path) -> Result<String, PipelineError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PipelineError::missing_artifact(phase, kind, path))
            }
            Err(e) => Err(PipelineError::artifact(kind, path, e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<T, PipelineError> {
        let path = self.path(kind);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PipelineError::artifact(kind, &path, e))?;
        serde_json::from_str(&contents).map_err(|e| PipelineError::artifact(kind, &path, e))
    }
}

/// Write `bytes` to a sibling temp file, fsync it, then rename over `path`.
///
/// Readers see either the old file or the complete new one.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let write = async {
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp, path).await
    };

    if let Err(err) = write.await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(err);
    }
    Ok(())
}
