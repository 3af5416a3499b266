//! GitHub-hosted record store.
//!
//! Known identifiers come from the REST branch listing; records are published
//! by pushing one branch per record from a scoped clone of the template
//! branch.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Platform, PublisherConfig, ReleaseRecord, StoreConfig};
use crate::storage::{GitWorkspace, PublishReport, RecordStore};
use crate::utils::http::next_link;

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
}

/// A repository holding the records of one platform.
pub struct GitHubStore {
    client: Client,
    platform: Platform,
    repo: String,
    publisher: PublisherConfig,
    token: Option<String>,
    remote: Option<String>,
}

impl GitHubStore {
    pub fn new(
        client: Client,
        store: &StoreConfig,
        publisher: &PublisherConfig,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            platform: store.platform,
            repo: store.repo.clone(),
            publisher: publisher.clone(),
            token,
            remote: None,
        }
    }

    /// Clone and push through `remote` instead of the configured git host.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// First page of the branch listing.
    pub fn branches_url(&self) -> String {
        format!(
            "{}/repos/{}/branches?per_page={}",
            self.publisher.api_base.trim_end_matches('/'),
            self.repo,
            self.publisher.per_page
        )
    }

    /// Clone URL, with the token as userinfo when one is configured.
    pub fn remote_url(&self) -> String {
        if let Some(remote) = &self.remote {
            return remote.clone();
        }
        match &self.token {
            Some(token) => format!("https://{}@{}/{}.git", token, self.publisher.git_host, self.repo),
            None => format!("https://{}/{}.git", self.publisher.git_host, self.repo),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<(Vec<Branch>, Option<String>)> {
        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("token {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::known_set(&self.repo, e))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::known_set(
                &self.repo,
                format!("unexpected status {status} from {url}"),
            ));
        }

        let next = response
            .headers()
            .get(header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link);
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::known_set(&self.repo, e))?;
        let branches: Vec<Branch> = serde_json::from_slice(&body)
            .map_err(|e| AppError::known_set(&self.repo, e))?;
        Ok((branches, next))
    }

    async fn publish_one(&self, workspace: &GitWorkspace, record: &ReleaseRecord) -> Result<()> {
        let branch = record.identifier.as_str();
        let document = record.to_document()?;

        workspace
            .branch_from(&self.publisher.template_branch, branch)
            .await?;
        workspace
            .write_file(&self.publisher.document_name, &document)
            .await?;
        workspace
            .commit_file(&self.publisher.document_name, &self.publisher.commit_message)
            .await?;
        workspace.push(branch).await
    }
}

#[async_trait]
impl RecordStore for GitHubStore {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn name(&self) -> &str {
        &self.repo
    }

    async fn known_identifiers(&self) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        let mut url = Some(self.branches_url());
        let mut pages = 0usize;

        while let Some(current) = url {
            let (branches, next) = self.fetch_page(&current).await?;
            pages += 1;
            names.extend(branches.into_iter().map(|b| b.name));
            url = next;
        }

        log::info!(
            "{}: {} branches across {} page(s)",
            self.repo,
            names.len(),
            pages
        );
        Ok(names)
    }

    async fn publish(&self, records: &[ReleaseRecord]) -> Result<PublishReport> {
        let mut report = PublishReport::default();
        if records.is_empty() {
            return Ok(report);
        }

        let workspace = GitWorkspace::clone_branch(
            &self.remote_url(),
            &self.publisher.template_branch,
            self.token.as_deref(),
        )
        .await?
        .with_identity(
            self.publisher.committer_name.as_deref(),
            self.publisher.committer_email.as_deref(),
        );

        for record in records {
            log::info!("Processing {}...", record.identifier);
            match self.publish_one(&workspace, record).await {
                Ok(()) => report.published.push(record.identifier.clone()),
                Err(e) => {
                    log::error!("{}: failed to publish {}: {}", self.repo, record.identifier, e);
                    report.failed.push((record.identifier.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::Identifier;
    use crate::storage::git::tests::{git_available, remote_branches, remote_url, template_remote};

    const ID_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const ID_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn store(token: Option<&str>) -> GitHubStore {
        GitHubStore::new(
            Client::new(),
            &StoreConfig {
                platform: Platform::MacOS,
                repo: "owner/macOS".into(),
            },
            &PublisherConfig::default(),
            token.map(str::to_string),
        )
    }

    fn record(id: &str) -> ReleaseRecord {
        ReleaseRecord {
            identifier: Identifier::parse(id).unwrap(),
            platform: Platform::MacOS,
            version: None,
            post_date: "2021-03-01T18:00:00Z".into(),
            distribution_url: format!("https://swdist.apple.com/content/downloads/11/22/x/{id}/a.dist"),
            packages: serde_json::json!([]),
        }
    }

    #[test]
    fn test_branches_url() {
        assert_eq!(
            store(None).branches_url(),
            "https://api.github.com/repos/owner/macOS/branches?per_page=100"
        );
    }

    #[test]
    fn test_remote_override() {
        assert_eq!(
            store(Some("tok")).with_remote("file:///tmp/r").remote_url(),
            "file:///tmp/r"
        );
    }

    #[test]
    fn test_remote_url_with_and_without_token() {
        assert_eq!(store(None).remote_url(), "https://github.com/owner/macOS.git");
        assert_eq!(
            store(Some("tok")).remote_url(),
            "https://tok@github.com/owner/macOS.git"
        );
    }

    #[tokio::test]
    async fn test_publish_empty_batch_does_not_clone() {
        // No network: an empty batch must return before touching the remote.
        let report = store(Some("tok")).publish(&[]).await.unwrap();
        assert!(report.published.is_empty());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_publish_one_branch_per_record_and_isolates_failures() {
        if !git_available() {
            return;
        }
        let remote = template_remote();
        let publisher = PublisherConfig {
            committer_name: Some("Test".into()),
            committer_email: Some("test@example.com".into()),
            ..PublisherConfig::default()
        };
        let store = GitHubStore::new(
            Client::new(),
            &StoreConfig {
                platform: Platform::MacOS,
                repo: "owner/macOS".into(),
            },
            &publisher,
            None,
        )
        .with_remote(remote_url(&remote));

        // The second A collides with the branch created just before it.
        let records = vec![record(ID_A), record(ID_A), record(ID_B)];
        let report = store.publish(&records).await.unwrap();

        assert_eq!(report.published.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.as_str(), ID_A);

        let branches = remote_branches(&remote);
        assert!(branches.contains(&ID_A.to_string()));
        assert!(branches.contains(&ID_B.to_string()));
    }

    /// Serve canned responses on successive connections; `{base}` in a
    /// response is replaced by the server's own address.
    async fn serve(responses: Vec<String>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let own = base.clone();
        let handle = tokio::spawn(async move {
            let mut heads = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }
                let response = response.replace("{base}", &own);
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
                heads.push(String::from_utf8_lossy(&head).into_owned());
            }
            heads
        });
        (base, handle)
    }

    fn json_response(body: &str, link: Option<&str>) -> String {
        let link = link
            .map(|l| format!("Link: <{l}>; rel=\"next\"\r\n"))
            .unwrap_or_default();
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n{link}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn api_store(base: &str, token: Option<&str>) -> GitHubStore {
        let publisher = PublisherConfig {
            api_base: base.to_string(),
            ..PublisherConfig::default()
        };
        GitHubStore::new(
            Client::new(),
            &StoreConfig {
                platform: Platform::MacOS,
                repo: "owner/macOS".into(),
            },
            &publisher,
            token.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_known_identifiers_follows_pagination() {
        let (base, server) = serve(vec![
            json_response(
                &format!(r#"[{{"name":"template"}},{{"name":"{ID_A}"}}]"#),
                Some("{base}/repositories/1/branches?per_page=100&page=2"),
            ),
            json_response(&format!(r#"[{{"name":"{ID_B}"}}]"#), None),
        ])
        .await;

        let names = api_store(&base, Some("tok")).known_identifiers().await.unwrap();
        let heads = server.await.unwrap();

        assert_eq!(names.len(), 3);
        assert!(names.contains(ID_A));
        assert!(names.contains(ID_B));
        assert!(heads[0].starts_with("GET /repos/owner/macOS/branches?per_page=100 "));
        assert!(heads[0].to_ascii_lowercase().contains("authorization: token tok"));
        assert!(heads[1].starts_with("GET /repositories/1/branches?per_page=100&page=2 "));
    }

    #[tokio::test]
    async fn test_known_identifiers_fails_on_bad_status() {
        let (base, server) = serve(vec![
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
        ])
        .await;

        let err = api_store(&base, None).known_identifiers().await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, AppError::KnownSet { .. }));
    }
}
