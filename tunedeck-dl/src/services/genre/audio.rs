//! Audio-content genre analysis via an external classifier binary
//!
//! Runs after download when every text source passed. The analyzer
//! wraps an Essentia-based genre model exposed as a command-line tool
//! that takes an audio path and prints label/probability pairs as
//! JSON. Availability is probed exactly once; concurrent first callers
//! all await the same probe.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Predictions below this probability are noise.
const MIN_CONFIDENCE: f64 = 0.05;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Classifier binary not found or not runnable
    #[error("genre analyzer unavailable")]
    Unavailable,

    /// Failed to execute the analyzer
    #[error("failed to execute analyzer: {0}")]
    ExecutionError(String),

    /// Analyzer ran but reported failure
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    /// Analyzer output was not the expected JSON
    #[error("failed to parse analyzer output: {0}")]
    ParseError(String),

    /// Audio file not found at path
    #[error("audio file not found: {0}")]
    FileNotFound(String),
}

#[derive(Debug, Deserialize)]
struct AnalyzerOutput {
    #[serde(default)]
    predictions: Vec<(String, f64)>,
}

pub struct AudioAnalyzer {
    binary: Option<PathBuf>,
    available: OnceCell<bool>,
}

impl AudioAnalyzer {
    /// `binary` comes from configuration; `None` disables audio
    /// analysis entirely.
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary,
            available: OnceCell::new(),
        }
    }

    /// One-time availability probe shared by all callers.
    async fn is_available(&self) -> bool {
        let Some(binary) = self.binary.clone() else {
            return false;
        };
        *self
            .available
            .get_or_init(|| async move {
                let probe = tokio::task::spawn_blocking(move || {
                    Command::new(&binary).arg("--version").output()
                })
                .await;
                match probe {
                    Ok(Ok(output)) if output.status.success() => true,
                    _ => {
                        tracing::warn!("genre analyzer binary not runnable, audio analysis disabled");
                        false
                    }
                }
            })
            .await
    }

    /// Classify a downloaded file, returning the best label above the
    /// confidence floor.
    pub async fn best_genre(&self, audio_path: &Path) -> Result<Option<String>, AnalyzerError> {
        if !self.is_available().await {
            return Err(AnalyzerError::Unavailable);
        }
        if !audio_path.exists() {
            return Err(AnalyzerError::FileNotFound(audio_path.display().to_string()));
        }
        // is_available() returned true, so the binary is set
        let Some(binary) = self.binary.clone() else {
            return Err(AnalyzerError::Unavailable);
        };

        let audio = audio_path.to_path_buf();
        let output = tokio::task::spawn_blocking(move || {
            Command::new(&binary).arg(&audio).arg("--json").output()
        })
        .await
        .map_err(|e| AnalyzerError::ExecutionError(e.to_string()))?
        .map_err(|e| AnalyzerError::ExecutionError(e.to_string()))?;

        if !output.status.success() {
            return Err(AnalyzerError::AnalysisFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let parsed: AnalyzerOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| AnalyzerError::ParseError(e.to_string()))?;
        Ok(pick_best_label(&parsed.predictions))
    }
}

/// Highest-probability prediction above the floor, with compound
/// labels reduced to their subcategory.
fn pick_best_label(predictions: &[(String, f64)]) -> Option<String> {
    predictions
        .iter()
        .filter(|(_, p)| *p >= MIN_CONFIDENCE)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(label, _)| clean_label(label))
}

fn clean_label(label: &str) -> String {
    match label.rsplit_once("---") {
        Some((_, sub)) => sub.trim().to_string(),
        None => label.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_labels_reduce_to_subcategory() {
        assert_eq!(clean_label("Electronic---Deep House"), "Deep House");
        assert_eq!(clean_label("Techno"), "Techno");
    }

    #[test]
    fn best_label_respects_confidence_floor() {
        let predictions = vec![
            ("Electronic---House".to_string(), 0.04),
            ("Electronic---Techno".to_string(), 0.31),
            ("Rock---Indie".to_string(), 0.12),
        ];
        assert_eq!(pick_best_label(&predictions).as_deref(), Some("Techno"));
        assert_eq!(pick_best_label(&[("X".to_string(), 0.01)]), None);
        assert_eq!(pick_best_label(&[]), None);
    }

    #[tokio::test]
    async fn disabled_analyzer_reports_unavailable() {
        let analyzer = AudioAnalyzer::new(None);
        let err = analyzer.best_genre(Path::new("/tmp/x.mp3")).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Unavailable));
    }
}
