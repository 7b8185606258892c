//! Web-channel registration.
//!
//! The web form collects username, password and optional nickname in one
//! POST, so there is no step machine here — just the gate checks, the
//! shared commit sequence and artifact publication. Web registrations have
//! no durable registrant identity; the per-IP record is the at-most-once
//! mechanism, and approval mode never gates this channel.

use crate::commit::{CommitRequest, Registrar};
use crate::error::FlowError;
use artifact_gen::PublishedArtifact;
use identity_store::{IdentityStore, SourceContext};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use voice_directory::AccountDirectory;

/// User-visible web registration failures, pre-classified for the handler.
#[derive(Error, Debug)]
pub enum WebRegisterError {
    #[error("Username and password are required")]
    MissingFields,

    #[error("This address has already registered an account")]
    IpAlreadyRegistered,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Registration service is temporarily unavailable")]
    ServiceUnavailable,

    #[error("Registration failed")]
    Failed,
}

/// A web form submission.
#[derive(Debug, Clone)]
pub struct WebRegisterRequest {
    pub username: String,
    pub password: String,
    pub nickname: Option<String>,
    pub ip_address: String,
    pub locale: String,
}

/// Everything the success page needs.
#[derive(Debug, Clone)]
pub struct WebRegisterOutcome {
    pub username: String,
    pub quick_connect: String,
    pub config: PublishedArtifact,
    pub bundle: Option<PublishedArtifact>,
}

/// One-shot web registration service.
pub struct WebRegistration {
    store: Arc<IdentityStore>,
    directory: Arc<dyn AccountDirectory>,
    registrar: Arc<Registrar>,
}

impl WebRegistration {
    pub fn new(
        store: Arc<IdentityStore>,
        directory: Arc<dyn AccountDirectory>,
        registrar: Arc<Registrar>,
    ) -> Self {
        Self {
            store,
            directory,
            registrar,
        }
    }

    pub async fn register(
        &self,
        request: WebRegisterRequest,
    ) -> Result<WebRegisterOutcome, WebRegisterError> {
        let username = request.username.trim().to_string();
        if username.is_empty() || request.password.is_empty() {
            return Err(WebRegisterError::MissingFields);
        }

        if self.store.is_ip_registered(&request.ip_address).await {
            info!(
                "Web registration from {} refused: IP already registered",
                request.ip_address
            );
            return Err(WebRegisterError::IpAlreadyRegistered);
        }

        match self.directory.exists(&username).await {
            Ok(true) => return Err(WebRegisterError::UsernameTaken),
            Ok(false) => {}
            Err(e) => {
                error!("Username check failed for web registration: {}", e);
                return Err(WebRegisterError::ServiceUnavailable);
            }
        }

        let nickname = request
            .nickname
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&username)
            .to_string();

        let commit = CommitRequest {
            registrant_id: None,
            username: username.clone(),
            password: request.password.clone(),
            nickname: nickname.clone(),
            source: SourceContext::web(&request.locale, &request.ip_address),
        };
        let outcome = match self.registrar.commit(&commit).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Web registration commit failed for '{}': {}", username, e);
                return Err(WebRegisterError::Failed);
            }
        };

        // Two concurrent submissions from one IP can race the gate above;
        // the duplicate row is harmless, so a conflict only warns.
        if let Err(e) = self
            .store
            .record_ip(&request.ip_address, Some(username.clone()))
            .await
        {
            warn!("Could not record registered IP {}: {}", request.ip_address, e);
        }

        let published = self.publish(&outcome.artifacts, &username, &request, &nickname).await;
        match published {
            Ok((config, bundle)) => Ok(WebRegisterOutcome {
                username,
                quick_connect: outcome.artifacts.quick_connect.clone(),
                config,
                bundle,
            }),
            Err(e) => {
                error!("Artifact publication failed for '{}': {}", username, e);
                Err(WebRegisterError::Failed)
            }
        }
    }

    async fn publish(
        &self,
        artifacts: &artifact_gen::ConnectionArtifacts,
        username: &str,
        request: &WebRegisterRequest,
        nickname: &str,
    ) -> Result<(PublishedArtifact, Option<PublishedArtifact>), FlowError> {
        let generator = self.registrar.artifacts();
        let config = generator.publish_config(artifacts).await?;

        // Bundle failures are non-critical: the user still gets the file.
        let bundle = match generator
            .publish_bundle(username, &request.password, nickname, &request.locale)
            .await
        {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Client bundle creation failed for '{}': {}", username, e);
                None
            }
        };

        Ok((config, bundle))
    }
}
