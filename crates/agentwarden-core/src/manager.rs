//! Session manager
//!
//! Owns at most one live [`AgentSession`] and exposes the public operations
//! over it. Every operation is an independent async call; the manager does not
//! queue or serialize them, so a host must not issue overlapping calls against
//! the same manager. The in-memory session lock is never held across an await.

use crate::catalog::{FileCatalog, SecretStore, ServerCatalog, ServerInstaller, StaticSecrets};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::parse;
use crate::process::{
    AgentCommand, CliInvoker, InvocationRequest, ProcessInvoker, ShutdownController,
};
use crate::storage::{render_json, render_markdown, summarize, SessionWorkspace, StateStore, TranscriptLog};
use crate::types::*;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Prompt sent on the single init turn; the system prompt rides along as
/// appended system context.
const INIT_PROMPT: &str = "Acknowledge that you are ready. Reply with a single short sentence.";

pub struct SessionManager {
    config: ManagerConfig,
    invoker: Arc<dyn ProcessInvoker>,
    catalog: Arc<dyn ServerCatalog>,
    installer: ServerInstaller,
    shutdown: ShutdownController,
    session: Mutex<Option<AgentSession>>,
}

impl SessionManager {
    pub fn new(
        config: ManagerConfig,
        invoker: Arc<dyn ProcessInvoker>,
        catalog: Arc<dyn ServerCatalog>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        let shutdown = ShutdownController::new(config.shutdown_grace());
        Self {
            installer: ServerInstaller::new(catalog.clone(), secrets),
            config,
            invoker,
            catalog,
            shutdown,
            session: Mutex::new(None),
        }
    }

    /// Wire the real CLI invoker and the file backed catalog and secrets
    pub async fn from_config(config: ManagerConfig) -> Result<Self> {
        let catalog = Arc::new(FileCatalog::new(
            config.catalog_path.clone(),
            config.trusted_servers_path.clone(),
        ));
        let secrets: Arc<dyn SecretStore> = match &config.secrets_path {
            Some(path) => Arc::new(StaticSecrets::from_file(path).await?),
            None => Arc::new(StaticSecrets::empty()),
        };
        Ok(Self::new(config, Arc::new(CliInvoker::new()), catalog, secrets))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Start a fresh session, stopping any live one first
    pub async fn init_agent(&self, system_prompt: &str) -> Result<InitResult> {
        let live = self.session.lock().is_some();
        if live {
            info!("Replacing live session");
            self.stop_agent(false).await;
        }

        let workspace = SessionWorkspace::create(&self.config.sessions_root).await?;
        workspace
            .write_settings(&SessionSettings::new(
                self.config.denied_tools.clone(),
                self.config.auto_enable_servers,
            ))
            .await?;
        workspace.write_runtime_config(&RuntimeConfig::default()).await?;
        TranscriptLog::new(&workspace).create().await?;

        let args = AgentCommand::new(INIT_PROMPT)
            .append_system_prompt(system_prompt)
            .max_turns(Some(1))
            .into_args();
        let request = InvocationRequest::new(&self.config.cli_command, args)
            .working_dir(workspace.root())
            .timeout(self.config.init_timeout());

        let output = self
            .invoker
            .invoke(request)
            .await
            .map_err(Error::Initialization)?;
        trace!("Init output: {}", output);

        let session_id = match parse::parse_session_id(&output) {
            Ok(id) => id,
            Err(e) => {
                // A synthetic id cannot be resumed by the CLI; later turns run against it and fail
                let id = format!("local-{}", Uuid::new_v4());
                warn!("Could not read session id from init output ({}), using {}", e, id);
                id
            }
        };

        let session = AgentSession::new(session_id, system_prompt, workspace.root());
        let state = StateStore::new(&workspace);
        state.save(&session).await?;

        info!(
            "Session {} started in {:?}",
            session.session_id,
            workspace.root()
        );
        let result = InitResult {
            session_id: session.session_id.clone(),
            status: session.status,
            state_handle: state.path().to_path_buf(),
        };
        *self.session.lock() = Some(session);
        Ok(result)
    }

    /// Ask the agent which trusted servers suit `task_prompt`
    ///
    /// Runs inside the live session when there is one. An answer that cannot
    /// be parsed yields an empty list.
    pub async fn find_servers(&self, task_prompt: &str) -> Result<FindServersResult> {
        let document = self.catalog.trusted_servers_document().await?;
        let live = self
            .session
            .lock()
            .as_ref()
            .map(|s| (s.session_id.clone(), s.working_directory.clone()));

        let args = AgentCommand::new(server_query(task_prompt, &document))
            .resume(live.as_ref().map(|(id, _)| id.as_str()))
            .into_args();
        let mut request = InvocationRequest::new(&self.config.cli_command, args)
            .timeout(self.config.command_timeout());
        if let Some((_, dir)) = &live {
            request = request.working_dir(dir);
        }

        let raw = self
            .invoker
            .invoke(request)
            .await
            .map_err(|e| Error::operation("find_servers", e))?;
        trace!("find_servers output: {}", raw);

        let reply = parse::parse_turn_reply(&raw);
        let servers = match parse::parse_server_suggestions(&reply.text) {
            Ok(servers) => servers,
            Err(e) => {
                warn!("Could not parse server suggestions, returning none: {}", e);
                Vec::new()
            }
        };
        debug!("Agent suggested {} server(s)", servers.len());
        Ok(FindServersResult { servers })
    }

    /// Resolve `names` and rewrite the session's runtime config from scratch
    pub async fn install_servers(
        &self,
        names: &[String],
        overrides: Option<&ServerOverrides>,
    ) -> Result<InstallServersResult> {
        let session = self.live_session("install_servers")?;
        let workspace = SessionWorkspace::open(&session.working_directory);

        let no_overrides = ServerOverrides::new();
        let (installations, runtime_config) = self
            .installer
            .install(names, overrides.unwrap_or(&no_overrides))
            .await;
        let config_handle = workspace.write_runtime_config(&runtime_config).await?;

        let installed: Vec<String> = installations
            .iter()
            .filter(|r| r.succeeded())
            .map(|r| r.server_name.clone())
            .collect();
        info!("Installed servers: {:?}", installed);

        let updated = self.update_session(&session.working_directory, |s| {
            s.installed_servers = installed;
            s.touch();
        });
        if let Some(updated) = updated {
            StateStore::new(&workspace).save(&updated).await?;
        }

        Ok(InstallServersResult {
            installations,
            config_handle,
        })
    }

    /// Send one prompt to the live session
    ///
    /// `timeout` defaults to the configured chat timeout. The session is back
    /// to idle when this returns, whatever the outcome, and also when the
    /// future is dropped early.
    pub async fn chat(&self, prompt: &str, timeout: Option<Duration>) -> Result<ChatResult> {
        let session = self.begin_turn()?;
        let guard = WorkingGuard {
            slot: &self.session,
            working_directory: session.working_directory.clone(),
        };

        let workspace = SessionWorkspace::open(&session.working_directory);
        let transcript = TranscriptLog::new(&workspace);
        transcript.append(&TranscriptEntry::user(prompt)).await?;

        let args = AgentCommand::new(prompt)
            .resume(Some(&session.session_id))
            .max_turns(self.config.chat_max_turns)
            .skip_permissions(self.config.skip_permissions)
            .into_args();
        let request = InvocationRequest::new(&self.config.cli_command, args)
            .working_dir(&session.working_directory)
            .timeout(timeout.unwrap_or_else(|| self.config.chat_timeout()));

        let started = Instant::now();
        let outcome = self.invoker.invoke(request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(raw) => record_reply(&transcript, &raw, duration_ms).await,
            Err(e) => {
                warn!("Chat turn failed after {}ms: {}", duration_ms, e);
                Err(Error::operation("chat", e))
            }
        };
        drop(guard);

        let snapshot = self.update_session(&session.working_directory, AgentSession::touch);
        if let Some(snapshot) = snapshot {
            let saved = StateStore::new(&workspace).save(&snapshot).await;
            match (&result, saved) {
                (Ok(_), Err(e)) => return Err(e),
                (Err(_), Err(e)) => warn!("Failed to persist session after failed turn: {}", e),
                (_, Ok(())) => {}
            }
        }

        result
    }

    /// Render the transcript next to it and report its size
    pub async fn inspect_transcript(&self, format: TranscriptFormat) -> Result<InspectResult> {
        let session = self.live_session("inspect_transcript")?;
        let workspace = SessionWorkspace::open(&session.working_directory);
        let entries = TranscriptLog::new(&workspace).entries().await?;

        let rendered = match format {
            TranscriptFormat::Markdown => render_markdown(&entries),
            TranscriptFormat::Json => render_json(&entries)?,
        };
        let transcript_handle = workspace.write_rendered_transcript(format, &rendered).await?;
        debug!("Rendered {} entries to {:?}", entries.len(), transcript_handle);

        Ok(InspectResult {
            transcript_handle,
            metadata: summarize(&entries),
        })
    }

    /// Stop the live session. Never fails; problems are reported in the result.
    ///
    /// The session reference is cleared first and unconditionally. Its working
    /// directory is left on disk.
    pub async fn stop_agent(&self, force: bool) -> StopResult {
        let Some(session) = self.session.lock().take() else {
            debug!("stop_agent called with no live session");
            return StopResult {
                status: StopStatus::Stopped,
                final_state: None,
                error: None,
            };
        };

        let target = self.invoker.active_process();
        match self.shutdown.shutdown(target, force).await {
            Ok(status) => {
                info!("Session {} stopped ({:?})", session.session_id, status);
                StopResult {
                    status,
                    final_state: Some(session),
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to stop session {}: {}", session.session_id, e);
                StopResult {
                    status: StopStatus::Failed,
                    final_state: Some(session),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// In-memory snapshot of the live session
    pub fn get_agent_state(&self) -> Option<AgentSession> {
        self.session.lock().clone()
    }

    fn live_session(&self, operation: &'static str) -> Result<AgentSession> {
        self.session
            .lock()
            .clone()
            .ok_or(Error::Precondition(operation))
    }

    fn begin_turn(&self) -> Result<AgentSession> {
        let mut slot = self.session.lock();
        let session = slot.as_mut().ok_or(Error::Precondition("chat"))?;
        session.status = SessionStatus::Working;
        Ok(session.clone())
    }

    /// Mutate the live session if it is still the one rooted at `working_directory`
    fn update_session(
        &self,
        working_directory: &Path,
        f: impl FnOnce(&mut AgentSession),
    ) -> Option<AgentSession> {
        let mut slot = self.session.lock();
        let session = slot
            .as_mut()
            .filter(|s| s.working_directory == working_directory)?;
        f(session);
        Some(session.clone())
    }
}

/// Puts the session back to idle when a turn ends, including on cancellation
struct WorkingGuard<'a> {
    slot: &'a Mutex<Option<AgentSession>>,
    working_directory: PathBuf,
}

impl Drop for WorkingGuard<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.slot.lock().as_mut() {
            if session.working_directory == self.working_directory {
                session.status = SessionStatus::Idle;
            }
        }
    }
}

async fn record_reply(transcript: &TranscriptLog, raw: &str, duration_ms: u64) -> Result<ChatResult> {
    trace!("Chat output: {}", raw);
    let reply = parse::parse_turn_reply(raw);
    if !reply.structured {
        warn!("Chat output had no readable envelope, keeping raw output");
    }

    let entry = TranscriptEntry::assistant(
        reply.text.clone(),
        EntryMetadata {
            tokens_used: reply.tokens_used,
            duration_ms: Some(duration_ms),
            tool_calls: reply.tool_calls,
        },
    );
    transcript.append(&entry).await?;

    Ok(ChatResult {
        response: reply.text,
        metadata: ChatMetadata {
            tokens_used: reply.tokens_used,
            duration_ms,
            timestamp: entry.timestamp,
        },
    })
}

fn server_query(task: &str, document: &str) -> String {
    format!(
        "Pick the companion servers from the catalog below that would help with this task.\n\n\
         Task:\n{}\n\n\
         Catalog:\n{}\n\n\
         Answer with a JSON array of objects with \"name\" and \"rationale\" fields inside a \
         ```json fenced block. Answer with [] if none apply.",
        task.trim(),
        document.trim()
    )
}
