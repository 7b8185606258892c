//! Artifact generation, token issuance and single-shot redemption.

use crate::bundle;
use crate::error::ArtifactError;
use crate::profile::{ConnectionProfile, ServerProfile};
use identity_store::{generate_token, ArtifactKind, DownloadToken, TokenStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

/// Name of the pre-built base bundle inside the bundles directory.
const BASE_BUNDLE_FILENAME: &str = "_base_client_template.zip";

/// A rendered (not yet published) set of connection artifacts.
#[derive(Debug, Clone)]
pub struct ConnectionArtifacts {
    pub document: String,
    pub filename: String,
    pub quick_connect: String,
}

/// A published artifact the caller can hand to the user: token only.
#[derive(Debug, Clone)]
pub struct PublishedArtifact {
    pub token: String,
    pub user_facing_filename: String,
}

/// A redeemed artifact ready to stream to the downloader.
pub struct RedeemedArtifact {
    pub file: fs::File,
    pub filename: String,
    pub size: u64,
}

/// Builds connection files, quick-connect links and client bundles, and
/// registers every on-disk artifact with the token store.
///
/// Callers only ever see tokens; raw paths stay inside this type.
pub struct ArtifactGenerator {
    server: ServerProfile,
    files_dir: PathBuf,
    bundles_dir: PathBuf,
    base_bundle: Option<PathBuf>,
    bundle_display_name: Option<String>,
    tokens: Arc<TokenStore>,
    token_ttl: Duration,
}

impl ArtifactGenerator {
    pub fn new(
        server: ServerProfile,
        files_dir: PathBuf,
        bundles_dir: PathBuf,
        tokens: Arc<TokenStore>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            server,
            files_dir,
            bundles_dir,
            base_bundle: None,
            bundle_display_name: None,
            tokens,
            token_ttl,
        }
    }

    pub fn server(&self) -> &ServerProfile {
        &self.server
    }

    /// Whether client bundles can be produced.
    pub fn bundles_enabled(&self) -> bool {
        self.base_bundle.is_some()
    }

    /// Assemble the base client bundle from a template directory.
    ///
    /// Called once at startup when a template is configured; per-user
    /// bundles are derived from the resulting archive.
    pub async fn install_template(&mut self, template_dir: PathBuf) -> Result<(), ArtifactError> {
        let display_name = template_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "VoiceClient".to_string());

        fs::create_dir_all(&self.bundles_dir).await?;
        let target = self.bundles_dir.join(BASE_BUNDLE_FILENAME);
        let build_target = target.clone();
        tokio::task::spawn_blocking(move || bundle::build_base_bundle(&template_dir, &build_target))
            .await??;

        info!("Base client bundle ready at {}", target.display());
        self.base_bundle = Some(target);
        self.bundle_display_name = Some(display_name);
        Ok(())
    }

    /// Server name reduced to something safe for filenames.
    fn safe_server_name(&self) -> String {
        let safe: String = self
            .server
            .server_name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == ' ' || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = safe.trim_end().to_string();
        if safe.is_empty() {
            "Voice_Server".to_string()
        } else {
            safe
        }
    }

    /// Render the connection document and quick-connect link for one user.
    pub fn render(&self, username: &str, password: &str, nickname: &str) -> ConnectionArtifacts {
        let profile = ConnectionProfile::new(&self.server, username, password, nickname);
        ConnectionArtifacts {
            document: profile.render_document(),
            filename: format!("{}.tt", self.safe_server_name()),
            quick_connect: profile.quick_connect_link(),
        }
    }

    /// Write the connection file to disk and issue a download token.
    pub async fn publish_config(
        &self,
        artifacts: &ConnectionArtifacts,
    ) -> Result<PublishedArtifact, ArtifactError> {
        fs::create_dir_all(&self.files_dir).await?;

        let token_tail = generate_token();
        let disk_name = format!("{}_{}.tt", self.safe_server_name(), &token_tail[..8]);
        let path = self.files_dir.join(&disk_name);
        fs::write(&path, artifacts.document.as_bytes()).await?;

        let token = DownloadToken::new(
            path.to_string_lossy(),
            artifacts.filename.clone(),
            ArtifactKind::ConfigFile,
            self.token_ttl,
        );
        let published = PublishedArtifact {
            token: token.token.clone(),
            user_facing_filename: token.user_facing_filename.clone(),
        };
        self.tokens.insert(token).await?;

        debug!("Published connection file as {}", disk_name);
        Ok(published)
    }

    /// Build, write and tokenize a per-user client bundle.
    ///
    /// Returns `None` when no bundle template is configured.
    pub async fn publish_bundle(
        &self,
        username: &str,
        password: &str,
        nickname: &str,
        language: &str,
    ) -> Result<Option<PublishedArtifact>, ArtifactError> {
        let (base, display_name) = match (&self.base_bundle, &self.bundle_display_name) {
            (Some(base), Some(name)) => (base.clone(), name.clone()),
            _ => return Ok(None),
        };

        let profile = ConnectionProfile::new(&self.server, username, password, nickname);
        let settings = bundle::render_client_settings(&profile, language);
        let config_filename = format!("{}.tt", self.safe_server_name());
        let config_content = profile.render_document();

        let token_tail = generate_token();
        let disk_name = format!("{}_{}_{}.zip", display_name, username, &token_tail[..8]);
        let user_filename = format!("{}_{}.zip", display_name, username);
        let target = self.bundles_dir.join(&disk_name);

        let task_target = target.clone();
        tokio::task::spawn_blocking(move || {
            bundle::customize_bundle(
                &base,
                &task_target,
                &settings,
                &config_filename,
                &config_content,
            )
        })
        .await??;

        let token = DownloadToken::new(
            target.to_string_lossy(),
            user_filename,
            ArtifactKind::ClientBundle,
            self.token_ttl,
        );
        let published = PublishedArtifact {
            token: token.token.clone(),
            user_facing_filename: token.user_facing_filename.clone(),
        };
        self.tokens.insert(token).await?;

        info!("Published client bundle for '{}'", username);
        Ok(Some(published))
    }

    /// Redeem a download token and open the underlying file for streaming.
    ///
    /// Single-shot: the token is marked used before the file opens, so a
    /// second redemption returns `None` even though the bytes survive until
    /// the next sweep.
    pub async fn redeem(
        &self,
        token: &str,
        expected_kind: ArtifactKind,
    ) -> Result<Option<RedeemedArtifact>, ArtifactError> {
        let row = match self.tokens.redeem(token, expected_kind).await? {
            Some(row) => row,
            None => return Ok(None),
        };

        let file = match fs::File::open(&row.server_side_path).await {
            Ok(file) => file,
            Err(e) => {
                // Token row outlived its bytes; treat as expired.
                warn!(
                    "Artifact file missing for redeemed token ({}): {}",
                    row.server_side_path, e
                );
                return Ok(None);
            }
        };
        let size = file.metadata().await?.len();

        Ok(Some(RedeemedArtifact {
            file,
            filename: row.user_facing_filename,
            size,
        }))
    }

    /// Sweep expired/used tokens and delete their files. Returns the count.
    pub async fn sweep(&self) -> Result<usize, ArtifactError> {
        let swept = self.tokens.sweep().await?;
        for row in &swept {
            if let Err(e) = fs::remove_file(&row.server_side_path).await {
                debug!(
                    "Could not delete swept artifact {}: {}",
                    row.server_side_path, e
                );
            }
        }
        Ok(swept.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ServerProfile {
        ServerProfile {
            server_name: "Voice Server".into(),
            host: "voice.example.org".into(),
            public_host: None,
            tcp_port: 10333,
            udp_port: 10444,
            encrypted: true,
        }
    }

    fn generator(dir: &std::path::Path) -> ArtifactGenerator {
        ArtifactGenerator::new(
            server(),
            dir.join("files"),
            dir.join("bundles"),
            TokenStore::memory(),
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn test_publish_and_redeem_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path());

        let artifacts = generator.render("alice", "secret", "Alice");
        assert_eq!(artifacts.filename, "Voice Server.tt");
        assert!(artifacts.quick_connect.starts_with("tt://voice.example.org?"));

        let published = generator.publish_config(&artifacts).await.unwrap();

        let first = generator
            .redeem(&published.token, ArtifactKind::ConfigFile)
            .await
            .unwrap();
        let redeemed = first.expect("first redemption should succeed");
        assert_eq!(redeemed.filename, "Voice Server.tt");
        assert!(redeemed.size > 0);

        let second = generator
            .redeem(&published.token, ArtifactKind::ConfigFile)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_redeem_with_wrong_kind_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path());

        let artifacts = generator.render("alice", "secret", "Alice");
        let published = generator.publish_config(&artifacts).await.unwrap();

        let wrong = generator
            .redeem(&published.token, ArtifactKind::ClientBundle)
            .await
            .unwrap();
        assert!(wrong.is_none());
    }

    #[tokio::test]
    async fn test_sweep_deletes_used_artifact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path());

        let artifacts = generator.render("alice", "secret", "Alice");
        let published = generator.publish_config(&artifacts).await.unwrap();
        generator
            .redeem(&published.token, ArtifactKind::ConfigFile)
            .await
            .unwrap();

        let swept = generator.sweep().await.unwrap();
        assert_eq!(swept, 1);

        let leftover: Vec<_> = std::fs::read_dir(dir.path().join("files"))
            .unwrap()
            .collect();
        assert!(leftover.is_empty());
    }

    #[tokio::test]
    async fn test_bundle_publication_requires_template() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator(dir.path());
        assert!(!generator.bundles_enabled());

        let none = generator
            .publish_bundle("alice", "secret", "Alice", "en")
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_bundle_publication_with_template() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template");
        std::fs::create_dir_all(template.join("Client")).unwrap();
        std::fs::write(
            template.join(crate::bundle::SETTINGS_PATH_IN_BUNDLE),
            "[general_]\n",
        )
        .unwrap();

        let mut generator = generator(dir.path());
        generator.install_template(template).await.unwrap();
        assert!(generator.bundles_enabled());

        let published = generator
            .publish_bundle("alice", "secret", "Alice", "en")
            .await
            .unwrap()
            .expect("bundle should be produced");
        assert_eq!(published.user_facing_filename, "template_alice.zip");

        let redeemed = generator
            .redeem(&published.token, ArtifactKind::ClientBundle)
            .await
            .unwrap();
        assert!(redeemed.is_some());
    }
}
