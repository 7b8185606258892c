//! The registration state machine.
//!
//! Drives a registrant through language, username, password, optional
//! account-type and nickname steps, then either commits directly or parks
//! the registration for admin approval. Inputs arrive as [`FlowInput`]
//! events from whichever front-end the registrant used; user-facing output
//! comes back as [`Reply`] values for that front-end to render, while admin
//! notifications go out through the [`Registrar`].

use crate::channel::Choice;
use crate::commit::{CommitRequest, Registrar};
use crate::error::FlowError;
use crate::locale::LocaleCatalog;
use crate::policy::RegistrationPolicy;
use crate::session::{RegSession, RegStep, SessionStore};
use identity_store::{IdentityStore, PendingRegistration, SourceContext};
use std::sync::Arc;
use tracing::{debug, error, info};
use voice_directory::{AccountDirectory, AccountType};

/// Button payloads used in choice prompts.
pub mod callback {
    pub const LANG_PREFIX: &str = "reg:lang:";
    pub const NICK_YES: &str = "reg:nick:yes";
    pub const NICK_NO: &str = "reg:nick:no";
    pub const TYPE_STANDARD: &str = "reg:type:standard";
    pub const TYPE_ELEVATED: &str = "reg:type:elevated";
    pub const APPROVE_PREFIX: &str = "reg:approve:";
    pub const REJECT_PREFIX: &str = "reg:reject:";
}

/// A parsed button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Locale(String),
    NicknameChoice(bool),
    AccountType(AccountType),
    Approve(String),
    Reject(String),
}

/// Parse a button payload back into an action.
pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    if let Some(code) = data.strip_prefix(callback::LANG_PREFIX) {
        return Some(CallbackAction::Locale(code.to_string()));
    }
    if let Some(key) = data.strip_prefix(callback::APPROVE_PREFIX) {
        return Some(CallbackAction::Approve(key.to_string()));
    }
    if let Some(key) = data.strip_prefix(callback::REJECT_PREFIX) {
        return Some(CallbackAction::Reject(key.to_string()));
    }
    match data {
        callback::NICK_YES => Some(CallbackAction::NicknameChoice(true)),
        callback::NICK_NO => Some(CallbackAction::NicknameChoice(false)),
        callback::TYPE_STANDARD => Some(CallbackAction::AccountType(AccountType::Standard)),
        callback::TYPE_ELEVATED => Some(CallbackAction::AccountType(AccountType::Elevated)),
        _ => None,
    }
}

/// One front-end event entering the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowInput {
    /// The registrant asked to begin (e.g. a /start command).
    Start,
    /// A language was selected.
    LocaleSelected(String),
    /// Free text for whichever step expects it.
    Text(String),
    /// Answer to the "set a custom nickname?" prompt.
    NicknameChoice(bool),
    /// Admin chose the account tier for a proxy registration.
    AccountTypeSelected(AccountType),
    /// The registrant abandoned the flow.
    Cancel,
}

/// User-facing output for the initiating front-end to render.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Choices { text: String, choices: Vec<Choice> },
    Document {
        bytes: Vec<u8>,
        filename: String,
        caption: String,
    },
}

/// The per-registrant registration state machine.
pub struct RegistrationFlow {
    sessions: SessionStore,
    store: Arc<IdentityStore>,
    directory: Arc<dyn AccountDirectory>,
    registrar: Arc<Registrar>,
    locales: Arc<LocaleCatalog>,
    policy: RegistrationPolicy,
}

impl RegistrationFlow {
    pub fn new(
        sessions: SessionStore,
        store: Arc<IdentityStore>,
        directory: Arc<dyn AccountDirectory>,
        registrar: Arc<Registrar>,
        locales: Arc<LocaleCatalog>,
        policy: RegistrationPolicy,
    ) -> Self {
        Self {
            sessions,
            store,
            directory,
            registrar,
            locales,
            policy,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn tr(&self, locale: &str, key: &str) -> String {
        self.locales.tr(locale, key)
    }

    /// Feed one input event through the machine.
    ///
    /// Out-of-order input (say, a password while still awaiting a username)
    /// is not advanced on; the registrant is re-prompted for the step they
    /// are actually in.
    pub async fn handle(
        &self,
        registrant_id: &str,
        display_name: &str,
        input: FlowInput,
    ) -> Result<Vec<Reply>, FlowError> {
        if self.store.is_banned(registrant_id).await {
            debug!("Ignoring input from banned registrant {}", registrant_id);
            return Ok(Vec::new());
        }

        match input {
            FlowInput::Start => return self.start(registrant_id, display_name).await,
            FlowInput::Cancel => return self.cancel(registrant_id).await,
            _ => {}
        }

        let session = match self.sessions.get(registrant_id).await {
            Some(session) => session,
            None => {
                return Ok(vec![Reply::Text(self.tr(
                    self.locales.bootstrap(),
                    "Send /start to begin registration.",
                ))])
            }
        };

        match (session.step, input) {
            (RegStep::ChoosingLanguage, FlowInput::LocaleSelected(code)) => {
                self.on_locale_selected(session, &code).await
            }
            (RegStep::AwaitingUsername, FlowInput::Text(text)) => {
                self.on_username(session, &text).await
            }
            (RegStep::AwaitingPassword, FlowInput::Text(text)) => {
                self.on_password(session, text).await
            }
            (RegStep::AwaitingAccountType, FlowInput::AccountTypeSelected(account_type)) => {
                self.on_account_type(session, account_type).await
            }
            (RegStep::AwaitingNicknameChoice, FlowInput::NicknameChoice(wants_custom)) => {
                self.on_nickname_choice(session, wants_custom).await
            }
            (RegStep::AwaitingNickname, FlowInput::Text(text)) => {
                self.on_nickname(session, &text).await
            }
            (RegStep::AwaitingApproval, _) => Ok(vec![Reply::Text(self.tr(
                &session.locale,
                "Your registration is awaiting administrator approval.",
            ))]),
            (step, input) => {
                debug!(
                    "Out-of-order input {:?} in step {:?} from {}",
                    input, step, registrant_id
                );
                Ok(vec![self.reprompt(&session, step)])
            }
        }
    }

    /// Begin (or restart) a registration.
    async fn start(
        &self,
        registrant_id: &str,
        display_name: &str,
    ) -> Result<Vec<Reply>, FlowError> {
        let is_admin = self.policy.is_admin(registrant_id);
        info!(
            "Registrant {} starting registration (admin registrar: {})",
            registrant_id, is_admin
        );

        if !is_admin && self.store.is_registered(registrant_id).await {
            return Ok(vec![Reply::Text(self.tr(
                self.locales.bootstrap(),
                "You have already registered one account from this identity. Only one registration is allowed.",
            ))]);
        }

        let mut session = RegSession::new(registrant_id, display_name, self.locales.bootstrap());
        if is_admin {
            session.admin_registrar = Some(registrant_id.to_string());
        }

        // Forced-language override takes the same validity gate as organic
        // selection; an unusable catalog falls back to the picker.
        if let Some(code) = self
            .locales
            .resolve_forced(self.policy.forced_locale.as_deref())
        {
            session.locale = code.clone();
            session.step = RegStep::AwaitingUsername;
            let prompt = self.tr(&code, "Hello! Please enter a username for registration.");
            self.sessions.put(session).await;
            return Ok(vec![Reply::Text(prompt)]);
        }

        session.step = RegStep::ChoosingLanguage;
        self.sessions.put(session).await;
        Ok(vec![self.language_prompt()])
    }

    async fn cancel(&self, registrant_id: &str) -> Result<Vec<Reply>, FlowError> {
        let existed = self.sessions.clear(registrant_id).await;
        if !existed {
            return Ok(Vec::new());
        }
        Ok(vec![Reply::Text(self.tr(
            self.locales.bootstrap(),
            "Registration cancelled. Send /start to begin again.",
        ))])
    }

    fn language_prompt(&self) -> Reply {
        let choices: Vec<Choice> = self
            .locales
            .available()
            .into_iter()
            .map(|info| {
                Choice::new(
                    info.native_name,
                    format!("{}{}", callback::LANG_PREFIX, info.code),
                )
            })
            .collect();
        Reply::Choices {
            text: "Please choose your language:".to_string(),
            choices,
        }
    }

    async fn on_locale_selected(
        &self,
        mut session: RegSession,
        code: &str,
    ) -> Result<Vec<Reply>, FlowError> {
        if !self.locales.is_usable(code) {
            return Ok(vec![self.language_prompt()]);
        }
        session.locale = code.to_string();

        // Second registered-already gate, in case the first was skipped by
        // a stale session or the record appeared meanwhile.
        if !session.is_admin_proxy() && self.store.is_registered(&session.registrant_id).await {
            self.sessions.clear(&session.registrant_id).await;
            return Ok(vec![Reply::Text(self.tr(
                code,
                "You have already registered one account from this identity. Only one registration is allowed.",
            ))]);
        }

        session.step = RegStep::AwaitingUsername;
        let prompt = self.tr(
            &session.locale,
            "Hello! Please enter a username for registration.",
        );
        self.sessions.put(session).await;
        Ok(vec![Reply::Text(prompt)])
    }

    async fn on_username(
        &self,
        mut session: RegSession,
        text: &str,
    ) -> Result<Vec<Reply>, FlowError> {
        let username = text.trim();
        if username.is_empty() {
            return Ok(vec![Reply::Text(self.tr(
                &session.locale,
                "Hello! Please enter a username for registration.",
            ))]);
        }

        debug!(
            "Validating username '{}' for registrant {}",
            username, session.registrant_id
        );
        match self.directory.exists(username).await {
            Ok(true) => Ok(vec![Reply::Text(self.tr(
                &session.locale,
                "Sorry, this username is already taken. Please choose another username.",
            ))]),
            Ok(false) => {
                session.username = Some(username.to_string());
                session.step = RegStep::AwaitingPassword;
                let prompt = self.tr(&session.locale, "Now enter a password.");
                self.sessions.put(session).await;
                Ok(vec![Reply::Text(prompt)])
            }
            Err(e) => {
                // Indeterminate: never advance on a failed check.
                error!(
                    "Username check failed for registrant {} ('{}'): {}",
                    session.registrant_id, username, e
                );
                Ok(vec![Reply::Text(self.tr(
                    &session.locale,
                    "Registration error. Please try again later or contact an administrator.",
                ))])
            }
        }
    }

    async fn on_password(
        &self,
        mut session: RegSession,
        text: String,
    ) -> Result<Vec<Reply>, FlowError> {
        // Guards the race where two concurrent sessions for the same
        // registrant both reached this point.
        if !session.is_admin_proxy() && self.store.is_registered(&session.registrant_id).await {
            let locale = session.locale.clone();
            self.sessions.clear(&session.registrant_id).await;
            return Ok(vec![Reply::Text(self.tr(
                &locale,
                "This identity has already registered an account. Only one registration is allowed.",
            ))]);
        }

        // Passwords are stored as-is; see the trimming note in DESIGN.md.
        session.password = Some(text);

        if session.is_admin_proxy() {
            session.step = RegStep::AwaitingAccountType;
            let reply = self.account_type_prompt(&session);
            self.sessions.put(session).await;
            Ok(vec![reply])
        } else {
            session.step = RegStep::AwaitingNicknameChoice;
            let reply = self.nickname_preference_prompt(&session);
            self.sessions.put(session).await;
            Ok(vec![reply])
        }
    }

    async fn on_account_type(
        &self,
        mut session: RegSession,
        account_type: AccountType,
    ) -> Result<Vec<Reply>, FlowError> {
        info!(
            "Admin {} chose account type {:?} for '{}'",
            session.registrant_id,
            account_type,
            session.username.as_deref().unwrap_or("?")
        );
        session.account_type = account_type;
        session.step = RegStep::AwaitingNicknameChoice;
        let reply = self.nickname_preference_prompt(&session);
        self.sessions.put(session).await;
        Ok(vec![reply])
    }

    fn account_type_prompt(&self, session: &RegSession) -> Reply {
        let username = session.username.as_deref().unwrap_or_default();
        let text = format!(
            "{}\n{}",
            self.tr(&session.locale, "This account will be for username '{}'.")
                .replace("{}", username),
            self.tr(
                &session.locale,
                "Register it as a server 'Admin' or a regular 'User'?",
            )
        );
        Reply::Choices {
            text,
            choices: vec![
                Choice::new(
                    self.tr(&session.locale, "Server Admin"),
                    callback::TYPE_ELEVATED,
                ),
                Choice::new(
                    self.tr(&session.locale, "Server User"),
                    callback::TYPE_STANDARD,
                ),
            ],
        }
    }

    fn nickname_preference_prompt(&self, session: &RegSession) -> Reply {
        let username = session.username.as_deref().unwrap_or_default();
        let text = self
            .tr(
                &session.locale,
                "Your username will be '{}'. Would you like to set a different nickname? \
                 If not, your nickname will be the same as your username.",
            )
            .replace("{}", username);
        Reply::Choices {
            text,
            choices: vec![
                Choice::new(self.tr(&session.locale, "Yes"), callback::NICK_YES),
                Choice::new(
                    self.tr(&session.locale, "No (use username)"),
                    callback::NICK_NO,
                ),
            ],
        }
    }

    async fn on_nickname_choice(
        &self,
        mut session: RegSession,
        wants_custom: bool,
    ) -> Result<Vec<Reply>, FlowError> {
        if wants_custom {
            session.step = RegStep::AwaitingNickname;
            let prompt = self.tr(&session.locale, "Please enter your desired nickname.");
            self.sessions.put(session).await;
            return Ok(vec![Reply::Text(prompt)]);
        }
        session.nickname = session.username.clone();
        self.advance_to_approval(session).await
    }

    async fn on_nickname(
        &self,
        mut session: RegSession,
        text: &str,
    ) -> Result<Vec<Reply>, FlowError> {
        let nickname = text.trim();
        if nickname.is_empty() {
            return Ok(vec![Reply::Text(self.tr(
                &session.locale,
                "Nickname cannot be empty. Please enter a valid nickname.",
            ))]);
        }
        session.nickname = Some(nickname.to_string());
        self.advance_to_approval(session).await
    }

    /// The approval decision point: commit directly, or park the
    /// registration and hand it to the admins.
    async fn advance_to_approval(&self, session: RegSession) -> Result<Vec<Reply>, FlowError> {
        let username = session.username.clone().unwrap_or_default();
        let password = session.password.clone().unwrap_or_default();
        let nickname = session
            .nickname
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| username.clone());

        let mut source = SourceContext::chat(&session.locale, &session.display_name);
        source.registered_by_admin = session.admin_registrar.clone();
        source.elevated = session.account_type == AccountType::Elevated;

        if self.policy.require_approval && !session.is_admin_proxy() {
            let pending = PendingRegistration::new(
                &session.registrant_id,
                &username,
                &password,
                &nickname,
                source,
            );
            self.store.insert_pending(pending.clone()).await?;
            self.registrar.prompt_admins_approval(&pending).await;

            let mut parked = session;
            parked.step = RegStep::AwaitingApproval;
            let locale = parked.locale.clone();
            self.sessions.put(parked).await;

            return Ok(vec![Reply::Text(self.tr(
                &locale,
                "Registration request sent to administrators. Please wait for approval.",
            ))]);
        }

        if session.is_admin_proxy() {
            info!(
                "Admin {} bypassing approval for account '{}'",
                session.registrant_id, username
            );
        }

        let request = CommitRequest {
            registrant_id: Some(session.registrant_id.clone()),
            username: username.clone(),
            password,
            nickname,
            source,
        };
        let locale = session.locale.clone();

        // Session clears unconditionally so the registrant can restart.
        self.sessions.clear(&session.registrant_id).await;

        match self.registrar.commit(&request).await {
            Ok(outcome) => {
                let mut replies = vec![Reply::Text(
                    self.tr(&locale, "User {} successfully registered.")
                        .replace("{}", &username),
                )];
                if outcome.link_failed {
                    replies.push(Reply::Text(self.tr(
                        &locale,
                        "Registration completed, but a sync error occurred. Please contact an admin.",
                    )));
                }
                replies.push(Reply::Document {
                    bytes: outcome.artifacts.document.clone().into_bytes(),
                    filename: outcome.artifacts.filename.clone(),
                    caption: self.tr(&locale, "Your connection file for quick access"),
                });
                replies.push(Reply::Text(format!(
                    "{}\n{}",
                    self.tr(&locale, "Or use this quick connect link:"),
                    outcome.artifacts.quick_connect
                )));
                Ok(replies)
            }
            Err(e) => {
                error!("Registration commit failed for '{}': {}", username, e);
                Ok(vec![Reply::Text(self.tr(
                    &locale,
                    "Registration error. Please try again later or contact an administrator.",
                ))])
            }
        }
    }

    fn reprompt(&self, session: &RegSession, step: RegStep) -> Reply {
        match step {
            RegStep::ChoosingLanguage => self.language_prompt(),
            RegStep::AwaitingUsername => Reply::Text(self.tr(
                &session.locale,
                "Hello! Please enter a username for registration.",
            )),
            RegStep::AwaitingPassword => {
                Reply::Text(self.tr(&session.locale, "Now enter a password."))
            }
            RegStep::AwaitingAccountType => self.account_type_prompt(session),
            RegStep::AwaitingNicknameChoice => self.nickname_preference_prompt(session),
            RegStep::AwaitingNickname => Reply::Text(
                self.tr(&session.locale, "Please enter your desired nickname."),
            ),
            RegStep::AwaitingApproval => Reply::Text(self.tr(
                &session.locale,
                "Your registration is awaiting administrator approval.",
            )),
        }
    }
}
