//! Scoped git working copies.
//!
//! A [`GitWorkspace`] owns a temporary directory holding a shallow clone.
//! Every command runs with that directory as its working directory; the
//! process-wide current directory is never changed. The directory is removed
//! when the workspace is dropped, whether publishing succeeded or not.

use std::path::Path;
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::utils::url::{redact_credentials, redact_secret};

/// A temporary shallow clone of one branch of a repository.
#[derive(Debug)]
pub struct GitWorkspace {
    dir: TempDir,
    config: Vec<String>,
    secret: Option<String>,
}

impl GitWorkspace {
    /// Shallow-clone `branch` of `remote` into a fresh temporary directory.
    ///
    /// `secret` is scrubbed from any error output.
    pub async fn clone_branch(remote: &str, branch: &str, secret: Option<&str>) -> Result<Self> {
        let workspace = Self {
            dir: tempfile::Builder::new().prefix("sucatalog-").tempdir()?,
            config: Vec::new(),
            secret: secret.map(str::to_string),
        };
        log::info!(
            "Cloning {} ({}) into {}",
            redact_credentials(remote),
            branch,
            workspace.path().display()
        );
        workspace
            .run(&["clone", "--branch", branch, "--depth", "1", remote, "."])
            .await?;
        Ok(workspace)
    }

    /// Commit as the given identity instead of the ambient git config.
    pub fn with_identity(mut self, name: Option<&str>, email: Option<&str>) -> Self {
        if let Some(name) = name {
            self.config.push("-c".into());
            self.config.push(format!("user.name={name}"));
        }
        if let Some(email) = email {
            self.config.push("-c".into());
            self.config.push(format!("user.email={email}"));
        }
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run one git command inside the workspace.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let subcommand = args.first().copied().unwrap_or_default();
        log::debug!("git {}", redact_secret(&args.join(" "), self.secret.as_deref()));

        let output = Command::new("git")
            .args(&self.config)
            .args(args)
            .current_dir(self.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AppError::git(subcommand, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::git(
                subcommand,
                format!(
                    "{}: {}",
                    output.status,
                    redact_secret(stderr.trim(), self.secret.as_deref())
                ),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Check out `base`, then create and switch to `branch` from it.
    pub async fn branch_from(&self, base: &str, branch: &str) -> Result<()> {
        self.run(&["checkout", base]).await?;
        self.run(&["switch", "-c", branch]).await?;
        Ok(())
    }

    /// Write `contents` to `name` at the workspace root.
    pub async fn write_file(&self, name: &str, contents: &str) -> Result<()> {
        tokio::fs::write(self.path().join(name), contents).await?;
        Ok(())
    }

    /// Stage `name` (even if ignored) and commit it.
    pub async fn commit_file(&self, name: &str, message: &str) -> Result<()> {
        self.run(&["add", "--force", name]).await?;
        self.run(&["commit", "--message", message]).await?;
        Ok(())
    }

    /// Push `branch` to `origin`.
    pub async fn push(&self, branch: &str) -> Result<()> {
        self.run(&["push", "origin", branch]).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::process::Command as StdCommand;

    pub(crate) fn git_available() -> bool {
        StdCommand::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap()
            .status;
        assert!(status.success(), "git {args:?} failed");
    }

    /// A local repository with a `template` branch, usable as a remote.
    pub(crate) fn template_remote() -> TempDir {
        let remote = TempDir::new().unwrap();
        git(remote.path(), &["init", "--quiet"]);
        git(remote.path(), &["checkout", "--quiet", "-b", "template"]);
        std::fs::write(remote.path().join("README.md"), "records\n").unwrap();
        git(remote.path(), &["add", "README.md"]);
        git(remote.path(), &["commit", "--quiet", "--message", "template"]);
        remote
    }

    pub(crate) fn remote_url(remote: &TempDir) -> String {
        format!("file://{}", remote.path().display())
    }

    pub(crate) fn remote_branches(remote: &TempDir) -> Vec<String> {
        let output = StdCommand::new("git")
            .args(["branch", "--format=%(refname:short)"])
            .current_dir(remote.path())
            .output()
            .unwrap();
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_clone_branch_commit_push() {
        if !git_available() {
            return;
        }
        let remote = template_remote();

        let workspace = GitWorkspace::clone_branch(&remote_url(&remote), "template", None)
            .await
            .unwrap()
            .with_identity(Some("Test"), Some("test@example.com"));
        let workdir = workspace.path().to_path_buf();
        assert!(workdir.join("README.md").exists());

        workspace.branch_from("template", "feature").await.unwrap();
        workspace.write_file("product.json", "{}").await.unwrap();
        workspace.commit_file("product.json", "automatic commit").await.unwrap();
        workspace.push("feature").await.unwrap();

        assert!(remote_branches(&remote).contains(&"feature".to_string()));

        drop(workspace);
        assert!(!workdir.exists());
    }

    #[tokio::test]
    async fn test_clone_failure_redacts_secret() {
        if !git_available() {
            return;
        }
        let err = GitWorkspace::clone_branch(
            "file:///nonexistent/s3cr3t-repo",
            "template",
            Some("s3cr3t"),
        )
        .await
        .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("git clone failed"));
        assert!(!message.contains("s3cr3t"));
    }
}
