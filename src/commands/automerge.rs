use super::{CommandContext, CommandHandler};
use crate::core::error::LainError;
use crate::display;
use crate::git::{ConflictEntry, GitRepo};
use crate::transport::{ChatMessage, ChatTransport, FragmentSink, StreamOutcome, drain};
use crate::utils::text::strip_code_fence;
use async_trait::async_trait;
use std::fs;
use std::io::{self, Write};
use tokio_util::sync::CancellationToken;

const MERGE_SYSTEM_PROMPT: &str = "You resolve git merge conflicts. Given the base, ours and theirs \
versions of a file, combine the intent of both sides. Reply with only the complete resolved file \
content, without explanations.";

pub struct AutoMergeCommand;

#[async_trait]
impl CommandHandler for AutoMergeCommand {
    async fn execute(&self, ctx: &CommandContext, _args: &[String]) -> Result<(), LainError> {
        let repo = GitRepo::discover(&std::env::current_dir()?).await?;
        let mut out = io::stdout();
        let report = resolve_conflicts(ctx.transport.as_ref(), &repo, &ctx.cancel, &mut out).await?;

        for path in &report.resolved {
            display::display_success(&format!("Resolved and staged {}", path));
        }
        for path in &report.skipped {
            display::display_status(&format!("Left {} unresolved", path));
        }
        if report.interrupted {
            return Err(LainError::Cancelled);
        }
        Ok(())
    }

    fn usage(&self) -> &'static str {
        "lain automerge"
    }

    fn description(&self) -> &'static str {
        "Resolve merge conflicts in the current git repository"
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub resolved: Vec<String>,
    pub skipped: Vec<String>,
    /// Set when Ctrl-C stopped the run before every path was tried
    pub interrupted: bool,
}

pub fn merge_prompt(base: &str, ours: &str, theirs: &str) -> String {
    format!("BASE:\n{}\n\nOURS:\n{}\n\nTHEIRS:\n{}", base, ours, theirs)
}

/// Gathers a whole reply while showing progress dots.
struct ReplyCollector<'a, W: Write> {
    reply: String,
    progress: &'a mut W,
}

impl<W: Write> FragmentSink for ReplyCollector<'_, W> {
    fn fragment(&mut self, text: &str) -> Result<(), LainError> {
        self.reply.push_str(text);
        write!(self.progress, ".")?;
        self.progress.flush()?;
        Ok(())
    }

    fn error(&mut self, err: &LainError) {
        tracing::warn!("Merge stream error: {}", err);
    }
}

/// Asks the model to resolve every conflicted path, then writes and stages
/// each resolution once its reply has completed cleanly.
pub async fn resolve_conflicts<W: Write>(
    transport: &dyn ChatTransport,
    repo: &GitRepo,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<MergeReport, LainError> {
    let conflicts = repo.conflicts().await?;
    let mut report = MergeReport::default();

    if conflicts.is_empty() {
        writeln!(out, "No merge conflicts detected.")?;
        return Ok(report);
    }
    tracing::info!("Found {} conflicted paths", conflicts.len());

    for entry in conflicts {
        write!(out, "Resolving {} ", entry.path)?;
        out.flush()?;

        match resolve_entry(transport, repo, &entry, cancel, out).await {
            Ok(Some(content)) => {
                fs::write(repo.root().join(&entry.path), content)?;
                repo.stage(&entry.path).await?;
                writeln!(out, " done")?;
                report.resolved.push(entry.path);
            }
            Ok(None) => {
                writeln!(out, " skipped")?;
                report.skipped.push(entry.path);
            }
            Err(err @ (LainError::Transport(_) | LainError::Status { .. })) => {
                tracing::debug!("Request for {} failed: {}", entry.path, err);
                writeln!(out, " failed: {}", err)?;
                report.skipped.push(entry.path);
            }
            Err(err) => return Err(err),
        }

        if cancel.is_cancelled() {
            report.interrupted = true;
            break;
        }
    }

    Ok(report)
}

/// Resolved content for `entry`, or `None` when the reply is unusable.
async fn resolve_entry<W: Write>(
    transport: &dyn ChatTransport,
    repo: &GitRepo,
    entry: &ConflictEntry,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<Option<String>, LainError> {
    let base = repo.read_blob(entry.base.as_deref()).await?;
    let ours = repo.read_blob(entry.ours.as_deref()).await?;
    let theirs = repo.read_blob(entry.theirs.as_deref()).await?;

    let messages = [
        ChatMessage::system(MERGE_SYSTEM_PROMPT),
        ChatMessage::user(merge_prompt(&base, &ours, &theirs)),
    ];
    let stream = transport.send(&messages).await?;

    let mut collector = ReplyCollector {
        reply: String::new(),
        progress: out,
    };
    let summary = drain(stream, cancel, &mut collector).await?;

    if summary.outcome == StreamOutcome::Cancelled {
        tracing::warn!("Resolution of {} was interrupted", entry.path);
        return Ok(None);
    }
    if summary.errors > 0 {
        tracing::warn!(
            "Resolution of {} had {} stream errors",
            entry.path,
            summary.errors
        );
        return Ok(None);
    }

    let content = strip_code_fence(&collector.reply);
    if content.trim().is_empty() {
        tracing::warn!("Empty resolution for {}", entry.path);
        return Ok(None);
    }
    Ok(Some(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::testing::ScriptedTransport;
    use std::path::Path;
    use std::process::Command;
    use tempfile::{TempDir, tempdir};

    fn git(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .args([
                "-c",
                "user.name=Lain Test",
                "-c",
                "user.email=lain@example.com",
                "-c",
                "commit.gpgsign=false",
                "-c",
                "init.defaultBranch=main",
            ])
            .arg("-C")
            .arg(dir)
            .args(args)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn write_all(dir: &Path, files: &[&str], content: &str) {
        for file in files {
            fs::write(dir.join(file), content).unwrap();
        }
    }

    /// A repository left in the middle of a merge where every file in
    /// `files` conflicts, or `None` when git is unavailable.
    fn conflicted_repo(files: &[&str]) -> Option<TempDir> {
        let dir = tempdir().unwrap();
        let path = dir.path();
        if !git(path, &["init", "-q"]) {
            return None;
        }

        write_all(path, files, "base\n");
        assert!(git(path, &["add", "."]));
        assert!(git(path, &["commit", "-q", "-m", "base"]));
        assert!(git(path, &["branch", "-M", "main"]));
        assert!(git(path, &["checkout", "-q", "-b", "feature"]));
        write_all(path, files, "theirs\n");
        assert!(git(path, &["commit", "-q", "-am", "theirs"]));
        assert!(git(path, &["checkout", "-q", "main"]));
        write_all(path, files, "ours\n");
        assert!(git(path, &["commit", "-q", "-am", "ours"]));
        assert!(!git(path, &["merge", "-q", "feature"]));

        Some(dir)
    }

    #[test]
    fn test_merge_prompt_layout() {
        assert_eq!(
            merge_prompt("b", "o", "t"),
            "BASE:\nb\n\nOURS:\no\n\nTHEIRS:\nt"
        );
    }

    #[tokio::test]
    async fn test_resolution_is_written_and_staged() {
        let Some(dir) = conflicted_repo(&["notes.txt"]) else {
            return;
        };
        let repo = GitRepo::discover(dir.path()).await.unwrap();
        let transport = ScriptedTransport::new().reply(&["```text\n", "ours and theirs\n", "```"]);
        let mut out = Vec::new();

        let report = resolve_conflicts(&transport, &repo, &CancellationToken::new(), &mut out)
            .await
            .unwrap();

        assert_eq!(report.resolved, vec!["notes.txt"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            "ours and theirs\n"
        );
        assert!(repo.conflicts().await.unwrap().is_empty());

        let requests = transport.requests();
        assert_eq!(
            requests[0][1].content,
            "BASE:\nbase\n\n\nOURS:\nours\n\n\nTHEIRS:\ntheirs\n"
        );
    }

    #[tokio::test]
    async fn test_unclean_stream_leaves_conflict_in_place() {
        let Some(dir) = conflicted_repo(&["notes.txt"]) else {
            return;
        };
        let repo = GitRepo::discover(dir.path()).await.unwrap();
        let before = fs::read_to_string(dir.path().join("notes.txt")).unwrap();
        let transport = ScriptedTransport::new().reply_items(vec![
            Ok("half".to_string()),
            Err(LainError::ChunkParse("not-json".to_string())),
        ]);
        let mut out = Vec::new();

        let report = resolve_conflicts(&transport, &repo, &CancellationToken::new(), &mut out)
            .await
            .unwrap();

        assert_eq!(report.skipped, vec!["notes.txt"]);
        assert_eq!(fs::read_to_string(dir.path().join("notes.txt")).unwrap(), before);
        assert_eq!(repo.conflicts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clean_tree_reports_no_conflicts() {
        let dir = tempdir().unwrap();
        if !git(dir.path(), &["init", "-q"]) {
            return;
        }
        let repo = GitRepo::discover(dir.path()).await.unwrap();
        let transport = ScriptedTransport::new();
        let mut out = Vec::new();

        let report = resolve_conflicts(&transport, &repo, &CancellationToken::new(), &mut out)
            .await
            .unwrap();

        assert_eq!(report, MergeReport::default());
        assert_eq!(String::from_utf8(out).unwrap(), "No merge conflicts detected.\n");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failed_request_moves_on_to_next_path() {
        let Some(dir) = conflicted_repo(&["a.txt", "b.txt"]) else {
            return;
        };
        let repo = GitRepo::discover(dir.path()).await.unwrap();
        let transport = ScriptedTransport::new()
            .fail(LainError::Status {
                status: 503,
                body: "busy".to_string(),
            })
            .reply(&["merged\n"]);
        let mut out = Vec::new();

        let report = resolve_conflicts(&transport, &repo, &CancellationToken::new(), &mut out)
            .await
            .unwrap();

        assert_eq!(report.skipped, vec!["a.txt"]);
        assert_eq!(report.resolved, vec!["b.txt"]);
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "merged\n");
        let remaining = repo.conflicts().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].path, "a.txt");
        assert!(String::from_utf8(out).unwrap().contains("failed: API returned status 503"));
    }

    #[tokio::test]
    async fn test_interrupted_run_still_returns_report() {
        let Some(dir) = conflicted_repo(&["notes.txt"]) else {
            return;
        };
        let repo = GitRepo::discover(dir.path()).await.unwrap();
        let transport = ScriptedTransport::new().reply(&["never written"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut out = Vec::new();

        let report = resolve_conflicts(&transport, &repo, &cancel, &mut out)
            .await
            .unwrap();

        assert!(report.interrupted);
        assert_eq!(report.skipped, vec!["notes.txt"]);
        assert!(report.resolved.is_empty());
        assert_eq!(repo.conflicts().await.unwrap().len(), 1);
    }
}
