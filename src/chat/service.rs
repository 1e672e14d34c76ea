use crate::context::{ConversationLog, ConversationWindow, TrimReport, Turn, WindowPolicy};
use crate::core::errors::ApiError;
use crate::core::security::{validate_credentials, Credentials, InviteSecret};
use crate::history::TranscriptStore;
use crate::llm::LlmService;
use crate::users::{Role, UserRecord, UserRow, UserRowUpdate, UserStore};

use super::session::{Session, SessionStore};

/// What a successful login hands back, depending on the account's role.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    User { history: Vec<Turn> },
    Admin { users: Vec<UserRow> },
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub reply: String,
    pub history: Vec<Turn>,
    pub trim: TrimReport,
}

/// The request pipeline: authenticate, window, complete, account, persist.
#[derive(Clone)]
pub struct ChatService {
    users: UserStore,
    secret: InviteSecret,
    sessions: SessionStore,
    transcripts: TranscriptStore,
    window: ConversationWindow,
    llm: LlmService,
    policy: WindowPolicy,
    max_input_length: usize,
}

impl ChatService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: UserStore,
        secret: InviteSecret,
        sessions: SessionStore,
        transcripts: TranscriptStore,
        window: ConversationWindow,
        llm: LlmService,
        policy: WindowPolicy,
        max_input_length: usize,
    ) -> Self {
        Self {
            users,
            secret,
            sessions,
            transcripts,
            window,
            llm,
            policy,
            max_input_length,
        }
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    pub fn authenticate(&self, credentials: &Credentials) -> Result<UserRecord, ApiError> {
        let table = self.users.load()?;
        validate_credentials(&table, &self.secret, credentials).inspect_err(|err| {
            tracing::info!(user_id = %credentials.user_id, "Rejected credentials: {}", err);
        })
    }

    /// Users get their persisted transcript, which becomes the live session.
    /// Admins get the dashboard rows.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, ApiError> {
        let record = self.authenticate(credentials)?;
        let user_id = credentials.user_id.as_str();

        match &record.role {
            Role::Admin => {
                let users = self.users.list_rows()?;
                tracing::info!(user_id, rows = users.len(), "Admin logged in");
                Ok(LoginOutcome::Admin { users })
            }
            Role::User => {
                let history = self.transcripts.load(user_id)?;
                self.sessions
                    .replace(user_id, ConversationLog::from_turns(history.clone()))
                    .await;
                tracing::info!(user_id, turns = history.len(), "User logged in");
                Ok(LoginOutcome::User { history })
            }
            Role::Other(role) => {
                tracing::warn!(user_id, role = %role, "Login refused for unrecognized role");
                Err(ApiError::WrongRole("this service"))
            }
        }
    }

    pub async fn chat(&self, credentials: &Credentials, input: &str) -> Result<ChatOutcome, ApiError> {
        let record = self.authenticate(credentials)?;
        if record.role != Role::User {
            return Err(ApiError::WrongRole("chat"));
        }
        self.check_input(input)?;

        let user_id = credentials.user_id.as_str();
        let handle = self.sessions.handle(user_id).await;
        let mut session = handle.lock().await;
        self.hydrate(user_id, &mut session)?;

        tracing::info!(
            user_id,
            queue_len = session.log.len(),
            estimated_tokens = self.window.estimate(&session.log),
            "Chat request"
        );

        let budget = usize::try_from(record.max_tokens).unwrap_or(usize::MAX);
        let input_tokens = self.window.cost(input);
        if self.window.cost(self.window.persona()) + input_tokens > budget {
            tracing::warn!(
                user_id,
                input_tokens,
                budget,
                "Message alone exceeds the token budget"
            );
        }

        session.log.push(Turn::user(input));
        let trim = match self.window.enforce(&mut session.log, budget, self.policy) {
            Ok(trim) => trim,
            Err(err) => {
                session.log.pop_back();
                tracing::info!(user_id, budget, "Refused over-budget request");
                return Err(err);
            }
        };

        if trim.evicted > 0 {
            tracing::info!(
                user_id,
                evicted = trim.evicted,
                estimated_tokens = trim.estimated_tokens,
                "Evicted oldest turns"
            );
        }
        if !trim.within_budget {
            tracing::warn!(
                user_id,
                estimated_tokens = trim.estimated_tokens,
                budget,
                "Prompt still exceeds budget with an empty history"
            );
        }

        let reply = self.llm.complete(self.window.messages(&session.log)).await?;
        let reply_tokens = self.window.cost(&reply);
        session.log.push(Turn::assistant(reply.clone()));

        let users = self.users.clone();
        let owner = user_id.to_string();
        let cost = (input_tokens + reply_tokens) as u64;
        let used_tokens = run_blocking(move || users.add_usage(&owner, cost)).await?;

        let history = session.log.to_vec();
        let transcripts = self.transcripts.clone();
        let owner = user_id.to_string();
        let snapshot = history.clone();
        run_blocking(move || transcripts.save(&owner, &snapshot)).await?;

        tracing::info!(
            user_id,
            input_tokens,
            reply_tokens,
            used_tokens,
            "Chat completed"
        );

        Ok(ChatOutcome {
            reply,
            history,
            trim,
        })
    }

    pub async fn history(&self, credentials: &Credentials) -> Result<Vec<Turn>, ApiError> {
        let record = self.authenticate(credentials)?;
        if record.role != Role::User {
            return Err(ApiError::WrongRole("chat"));
        }

        let user_id = credentials.user_id.as_str();
        let handle = self.sessions.handle(user_id).await;
        let mut session = handle.lock().await;
        self.hydrate(user_id, &mut session)?;
        Ok(session.log.to_vec())
    }

    pub fn admin_list(&self, credentials: &Credentials) -> Result<Vec<UserRow>, ApiError> {
        self.require_admin(credentials)?;
        self.users.list_rows()
    }

    pub fn admin_update(
        &self,
        credentials: &Credentials,
        rows: &[UserRowUpdate],
    ) -> Result<usize, ApiError> {
        self.require_admin(credentials)?;
        let applied = self.users.apply_row_updates(rows)?;
        tracing::info!(
            admin = %credentials.user_id,
            submitted = rows.len(),
            applied,
            "Admin changes saved"
        );
        Ok(applied)
    }

    fn require_admin(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let record = self.authenticate(credentials)?;
        if record.role != Role::Admin {
            return Err(ApiError::WrongRole("the admin dashboard"));
        }
        Ok(())
    }

    fn check_input(&self, input: &str) -> Result<(), ApiError> {
        if input.trim().is_empty() {
            return Err(ApiError::BadRequest("Message must not be empty".to_string()));
        }
        if input.chars().count() > self.max_input_length {
            return Err(ApiError::BadRequest(format!(
                "Message exceeds the maximum length of {} characters",
                self.max_input_length
            )));
        }
        Ok(())
    }

    fn hydrate(&self, user_id: &str, session: &mut Session) -> Result<(), ApiError> {
        if session.hydrated {
            return Ok(());
        }
        session.log = ConversationLog::from_turns(self.transcripts.load(user_id)?);
        session.hydrated = true;
        tracing::debug!(user_id, turns = session.log.len(), "Session hydrated from transcript");
        Ok(())
    }
}

/// Store writes take `flock` and touch disk, so they run on the blocking pool
/// instead of stalling a runtime worker while another process holds the lock.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(ApiError::internal)?
}
