use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::error::IngestError;

/// A knowledge-base data source. Consumed by the ingestion pipeline, never
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSource {
    Folder {
        path: PathBuf,
    },
    Repository {
        url: String,
        #[serde(default)]
        branch: Option<String>,
    },
}

/// A shallow repository clone in a temporary directory. The checkout is
/// removed when this value drops, whether ingestion succeeded or not.
pub(crate) struct RepoCheckout {
    dir: TempDir,
}

impl RepoCheckout {
    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub(crate) async fn clone_repository(
    url: &str,
    branch: Option<&str>,
) -> Result<RepoCheckout, IngestError> {
    let dir = TempDir::new()?;

    let mut command = tokio::process::Command::new("git");
    command.arg("clone").arg("--depth").arg("1");
    if let Some(branch) = branch {
        command.arg("--branch").arg(branch);
    }
    command.arg(url).arg(dir.path());

    tracing::info!(url, ?branch, "cloning repository");
    let output = command.output().await.map_err(|e| IngestError::Clone {
        url: url.to_owned(),
        message: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(IngestError::Clone {
            url: url.to_owned(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(RepoCheckout { dir })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_source_from_toml() {
        let source: DataSource =
            toml::from_str("type = \"folder\"\npath = \"./docs\"").unwrap();
        assert!(matches!(source, DataSource::Folder { ref path } if path.ends_with("docs")));
    }

    #[test]
    fn repository_source_from_toml() {
        let source: DataSource = toml::from_str(
            "type = \"repository\"\nurl = \"https://github.com/acme/widgets\"\nbranch = \"main\"",
        )
        .unwrap();
        match source {
            DataSource::Repository { url, branch } => {
                assert_eq!(url, "https://github.com/acme/widgets");
                assert_eq!(branch.as_deref(), Some("main"));
            }
            DataSource::Folder { .. } => panic!("expected repository source"),
        }
    }

    #[test]
    fn unknown_source_type_is_rejected() {
        let result: Result<DataSource, _> =
            toml::from_str("type = \"bucket\"\npath = \"./x\"");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn clone_invalid_url_errors_and_cleans_up() {
        let result = clone_repository("file:///nonexistent/repo.git", None).await;
        assert!(matches!(result, Err(IngestError::Clone { .. })));
    }

    #[tokio::test]
    async fn checkout_dir_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let checkout = RepoCheckout { dir };
        assert!(checkout.path().exists());
        drop(checkout);
        assert!(!path.exists());
    }
}
