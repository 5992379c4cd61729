//! Just enough git to know which branch a checkout is on.

use std::path::{Path, PathBuf};

use super::ControlError;

const BRANCH_REF_PREFIX: &str = "ref: refs/heads/";

/// Branch currently checked out in `repo`, read from its HEAD file.
/// Linked worktrees, whose `.git` is a `gitdir:` pointer file, are followed.
pub async fn current_branch(repo: &Path) -> Result<String, ControlError> {
    let git_dir = git_dir(repo).await?;
    let head = tokio::fs::read_to_string(git_dir.join("HEAD"))
        .await
        .map_err(|_| ControlError::NotARepository {
            path: repo.to_path_buf(),
        })?;

    head.trim()
        .strip_prefix(BRANCH_REF_PREFIX)
        .filter(|branch| !branch.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ControlError::DetachedHead {
            path: repo.to_path_buf(),
        })
}

async fn git_dir(repo: &Path) -> Result<PathBuf, ControlError> {
    let dot_git = repo.join(".git");
    let metadata = tokio::fs::metadata(&dot_git)
        .await
        .map_err(|_| ControlError::NotARepository {
            path: repo.to_path_buf(),
        })?;
    if metadata.is_dir() {
        return Ok(dot_git);
    }

    let pointer = tokio::fs::read_to_string(&dot_git).await?;
    let target = pointer
        .trim()
        .strip_prefix("gitdir:")
        .map(str::trim)
        .ok_or_else(|| ControlError::NotARepository {
            path: repo.to_path_buf(),
        })?;
    Ok(repo.join(target))
}
