use crate::core::error::LainError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// One conflicted path with the blob ids of its index stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictEntry {
    pub path: String,
    pub base: Option<String>,
    pub ours: Option<String>,
    pub theirs: Option<String>,
}

/// Groups `git ls-files -u -z` output by path.
///
/// Each record is `<mode> <object> <stage>\t<path>` terminated by NUL.
/// Stage 1 is the merge base, 2 is ours and 3 is theirs.
pub fn parse_unmerged(output: &[u8]) -> Result<Vec<ConflictEntry>, LainError> {
    let mut entries: BTreeMap<String, ConflictEntry> = BTreeMap::new();

    for record in output.split(|b| *b == 0).filter(|r| !r.is_empty()) {
        let record = String::from_utf8_lossy(record);
        let (meta, path) = record
            .split_once('\t')
            .ok_or_else(|| LainError::Git(format!("Unexpected ls-files record: {}", record)))?;

        let mut fields = meta.split_whitespace();
        let (Some(_mode), Some(object), Some(stage)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(LainError::Git(format!("Unexpected ls-files record: {}", record)));
        };

        let entry = entries
            .entry(path.to_string())
            .or_insert_with(|| ConflictEntry {
                path: path.to_string(),
                ..Default::default()
            });
        let slot = match stage {
            "1" => &mut entry.base,
            "2" => &mut entry.ours,
            "3" => &mut entry.theirs,
            other => {
                return Err(LainError::Git(format!("Unexpected index stage: {}", other)));
            }
        };
        *slot = Some(object.to_string());
    }

    Ok(entries.into_values().collect())
}

/// A work tree driven through the `git` executable.
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Finds the repository enclosing `dir`.
    pub async fn discover(dir: &Path) -> Result<Self, LainError> {
        let output = run_git(dir, &["rev-parse", "--show-toplevel"]).await?;
        let root = String::from_utf8_lossy(&output).trim().to_string();
        tracing::info!("Using git repository at {}", root);
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn conflicts(&self) -> Result<Vec<ConflictEntry>, LainError> {
        let output = self.git(&["ls-files", "-u", "-z"]).await?;
        parse_unmerged(&output)
    }

    /// Text of blob `id`, or an empty string for an absent stage.
    pub async fn read_blob(&self, id: Option<&str>) -> Result<String, LainError> {
        match id {
            Some(id) => {
                let output = self.git(&["cat-file", "blob", id]).await?;
                Ok(String::from_utf8_lossy(&output).into_owned())
            }
            None => Ok(String::new()),
        }
    }

    pub async fn stage(&self, path: &str) -> Result<(), LainError> {
        self.git(&["add", "--", path]).await?;
        tracing::info!("Staged {}", path);
        Ok(())
    }

    async fn git(&self, args: &[&str]) -> Result<Vec<u8>, LainError> {
        run_git(&self.root, args).await
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<Vec<u8>, LainError> {
    tracing::debug!("git -C {} {}", dir.display(), args.join(" "));
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .await
        .map_err(|e| LainError::Git(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LainError::Git(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}
