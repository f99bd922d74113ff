//! Chat turn orchestration.
//!
//! [`ChatOrchestrator::handle_turn`] drives one user turn end to end: it
//! resolves (or lazily creates) the backing session, persists the incoming
//! user message, builds the provider conversation behind the server-owned
//! system prompt, and consumes the provider's event stream. Tool calls run
//! between model rounds, bounded by a round cap; the completed assistant
//! text, summed usage, and tool invocations persist in one append.
//!
//! Persistence failures never kill a turn in flight. The stream degrades to
//! unpersisted chat and the failure is logged. Provider failures end the
//! stream with a generic human-readable message; raw upstream error text is
//! logged but never forwarded to clients.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use futures::{Stream, StreamExt};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use aisemble_core::events::StreamEvent;
use aisemble_core::{
    ResourceType, Role, TokenUsage, ToolCall, ToolInvocation, generate_session_title,
};
use aisemble_llm::{
    ChatMessage, ChatRequest, FETCH_TRANSCRIPT_TOOL, Provider, ProviderError,
    fetch_transcript_tool,
};
use aisemble_store::ChatStore;

use crate::errors::RuntimeError;
use crate::prompt::{FALLBACK_VIDEO_TITLE, system_prompt};
use crate::session_service::{NewChatSession, SessionService};
use crate::transcript_cache::TranscriptCache;

/// Default cap on model round trips within one turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;

const MODEL_ERROR_MESSAGE: &str =
    "Something went wrong while generating the response. Please try again later.";
const RATE_LIMIT_MESSAGE: &str =
    "The model is handling too many requests right now. Please try again in a moment.";
const AUTH_ERROR_MESSAGE: &str =
    "The model credentials are not valid. Please check the server configuration.";

// ─────────────────────────────────────────────────────────────────────────────
// Turn request and events
// ─────────────────────────────────────────────────────────────────────────────

/// One client-supplied message in a turn request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnMessage {
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// A chat turn as submitted by a client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// Conversation history, oldest first. The final user message is the
    /// turn input.
    pub messages: Vec<TurnMessage>,
    /// Video the conversation is anchored to.
    pub video_id: String,
    /// Session to persist into. A new session is created when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Events emitted to the client while a turn runs.
///
/// This is the orchestrator's outward protocol; the HTTP layer reshapes it
/// into SSE frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// Incremental assistant text.
    #[serde(rename = "text")]
    Text {
        /// Text fragment.
        delta: String,
    },

    /// A tool call is about to execute.
    #[serde(rename = "tool_started")]
    ToolStarted {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        name: String,
    },

    /// A tool call finished. `result` is the payload fed back to the model.
    #[serde(rename = "tool_finished")]
    ToolFinished {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        name: String,
        /// Result envelope.
        result: Value,
    },

    /// Turn completed.
    #[serde(rename = "done")]
    Done {
        /// Session the turn persisted into, when persistence was available.
        #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Token usage summed across model rounds.
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
    },

    /// Turn failed. `message` is safe to show to the user.
    #[serde(rename = "error")]
    Error {
        /// Human-readable description.
        message: String,
    },
}

/// Boxed stream of [`TurnEvent`]s for one chat turn.
pub type TurnStream = Pin<Box<dyn Stream<Item = TurnEvent> + Send>>;

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Drives chat turns against the provider, the store, and the transcript
/// cache.
pub struct ChatOrchestrator {
    provider: Arc<dyn Provider>,
    store: Arc<ChatStore>,
    cache: Arc<TranscriptCache>,
    sessions: Arc<SessionService>,
    max_tool_rounds: u32,
}

impl ChatOrchestrator {
    /// Create a new orchestrator with the default tool round cap.
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<ChatStore>,
        cache: Arc<TranscriptCache>,
        sessions: Arc<SessionService>,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            sessions,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Override the cap on model round trips per turn.
    #[must_use]
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: u32) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Run one chat turn, streaming [`TurnEvent`]s until done, error, or
    /// cancellation.
    ///
    /// Cancellation stops the stream at the next event boundary and skips
    /// completion persistence; the user message persisted at turn start
    /// stays.
    #[allow(clippy::too_many_lines)]
    pub fn handle_turn(
        &self,
        user_id: &str,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> TurnStream {
        let provider = Arc::clone(&self.provider);
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        let sessions = Arc::clone(&self.sessions);
        let max_tool_rounds = self.max_tool_rounds;
        let user_id = user_id.to_owned();

        Box::pin(stream! {
            counter!("chat_turns_total").increment(1);
            let turn_started = Instant::now();

            // Resolve the session backing this turn. Creation failure is
            // not fatal; the turn proceeds without persistence. Lazy
            // sessions are titled from the first user message, falling
            // back to the video-based default when the turn has none.
            let session_id = if let Some(id) = request.session_id.clone() {
                Some(id)
            } else {
                let derived_title = request
                    .messages
                    .iter()
                    .find(|m| m.role == Role::User)
                    .map(|m| generate_session_title(m.content.trim()))
                    .filter(|title| !title.is_empty());
                match sessions.create_session(&NewChatSession {
                    resource_id: &request.video_id,
                    resource_type: ResourceType::Youtube,
                    user_id: &user_id,
                    title: derived_title.as_deref(),
                    agent_id: None,
                }) {
                    Ok(row) => Some(row.id),
                    Err(e) => {
                        warn!(
                            video_id = %request.video_id,
                            error = %e,
                            "session creation failed, continuing without persistence"
                        );
                        None
                    }
                }
            };

            // Persist the user turn before the model runs, so it survives
            // even if the stream dies mid-response.
            if let (Some(id), Some(last)) = (session_id.as_deref(), request.messages.last())
                && last.role == Role::User
                && let Err(e) = store.append_user_message(id, &last.content)
            {
                warn!(session_id = %id, error = %e, "failed to persist user message");
            }

            let video_title = match store.video_title(&request.video_id) {
                Ok(Some(title)) => title,
                Ok(None) => FALLBACK_VIDEO_TITLE.to_owned(),
                Err(e) => {
                    warn!(video_id = %request.video_id, error = %e, "video title lookup failed");
                    FALLBACK_VIDEO_TITLE.to_owned()
                }
            };

            let mut convo = vec![ChatMessage::system(system_prompt(
                &request.video_id,
                &video_title,
            ))];
            for message in &request.messages {
                match message.role {
                    Role::User => convo.push(ChatMessage::user(message.content.clone())),
                    Role::Assistant => convo.push(ChatMessage::assistant(message.content.clone())),
                    // The server owns the system prompt; client-sent system
                    // and data messages never reach the model.
                    Role::System | Role::Data => {}
                }
            }

            let mut ttft_recorded = false;
            let mut turn_text = String::new();
            let mut invocations: Vec<ToolInvocation> = Vec::new();
            let mut usage: Option<TokenUsage> = None;
            let mut round: u32 = 0;

            loop {
                round += 1;
                let round_request = ChatRequest {
                    messages: convo.clone(),
                    tools: vec![fetch_transcript_tool()],
                    temperature: None,
                    max_tokens: None,
                };

                let mut events = match provider.stream(&round_request).await {
                    Ok(events) => events,
                    Err(e) => {
                        let err = RuntimeError::from(e);
                        error!(
                            round,
                            error = %err,
                            recoverable = err.is_recoverable(),
                            "provider request failed"
                        );
                        counter!("chat_turn_errors_total", "category" => err.category())
                            .increment(1);
                        yield TurnEvent::Error { message: user_facing_message(&err) };
                        return;
                    }
                };

                // Consume one model round down to its aggregated message.
                let message = loop {
                    let event = tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!(round, "chat turn cancelled");
                            return;
                        }
                        event = events.next() => event,
                    };
                    match event {
                        Some(Ok(StreamEvent::TextDelta { delta })) => {
                            if !ttft_recorded {
                                histogram!("provider_ttft_seconds")
                                    .record(turn_started.elapsed().as_secs_f64());
                                ttft_recorded = true;
                            }
                            yield TurnEvent::Text { delta };
                        }
                        // Tool calls arrive fully formed on the done message.
                        Some(Ok(
                            StreamEvent::Start
                            | StreamEvent::ToolCallStart { .. }
                            | StreamEvent::ToolCallDelta { .. }
                            | StreamEvent::ToolCallEnd { .. },
                        )) => {}
                        Some(Ok(StreamEvent::Done { message, .. })) => break message,
                        Some(Ok(StreamEvent::Error { error })) => {
                            error!(round, error = %error, "provider reported a stream error");
                            counter!("chat_turn_errors_total", "category" => "provider")
                                .increment(1);
                            yield TurnEvent::Error { message: MODEL_ERROR_MESSAGE.to_owned() };
                            return;
                        }
                        Some(Err(e)) => {
                            let err = RuntimeError::from(e);
                            error!(
                                round,
                                error = %err,
                                recoverable = err.is_recoverable(),
                                "provider stream failed"
                            );
                            counter!("chat_turn_errors_total", "category" => err.category())
                                .increment(1);
                            yield TurnEvent::Error { message: user_facing_message(&err) };
                            return;
                        }
                        None => {
                            error!(round, "provider stream ended without a done event");
                            counter!("chat_turn_errors_total", "category" => "internal")
                                .increment(1);
                            yield TurnEvent::Error { message: MODEL_ERROR_MESSAGE.to_owned() };
                            return;
                        }
                    }
                };

                merge_usage(&mut usage, message.token_usage);
                turn_text.push_str(&message.content);

                if !message.has_tool_calls() {
                    break;
                }
                if round >= max_tool_rounds {
                    warn!(round, "tool round limit reached, finishing turn");
                    break;
                }

                convo.push(ChatMessage::Assistant {
                    content: message.content.clone(),
                    tool_calls: message.tool_calls.clone(),
                });
                for call in &message.tool_calls {
                    if cancel.is_cancelled() {
                        debug!(round, "chat turn cancelled during tool execution");
                        return;
                    }
                    yield TurnEvent::ToolStarted {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                    };
                    let result = execute_tool(&cache, call, &user_id).await;
                    yield TurnEvent::ToolFinished {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        result: result.clone(),
                    };
                    convo.push(ChatMessage::tool_result(call.id.clone(), result.to_string()));
                    invocations.push(ToolInvocation {
                        tool_name: call.name.clone(),
                        arguments: call.arguments.clone(),
                        result,
                    });
                }
            }

            // One append for the whole turn: concatenated text, summed
            // usage, and every tool invocation that ran.
            if let Some(id) = session_id.as_deref() {
                let ran = (!invocations.is_empty()).then_some(invocations.as_slice());
                if let Err(e) = store.append_assistant_message(id, &turn_text, usage, ran) {
                    warn!(session_id = %id, error = %e, "failed to persist assistant message");
                }
            }
            if let Some(u) = usage {
                counter!("chat_tokens_total").increment(u.total_tokens);
            }
            info!(
                session_id = ?session_id,
                video_id = %request.video_id,
                rounds = round,
                tool_calls = invocations.len(),
                chars = turn_text.len(),
                "chat turn completed"
            );
            yield TurnEvent::Done { session_id, usage };
        })
    }
}

/// Execute one tool call against the transcript cache.
///
/// Unknown tools and malformed arguments produce error envelopes for the
/// model rather than ending the turn.
#[instrument(skip_all, fields(tool_name = %call.name, tool_call_id = %call.id))]
async fn execute_tool(cache: &TranscriptCache, call: &ToolCall, user_id: &str) -> Value {
    if call.name != FETCH_TRANSCRIPT_TOOL {
        warn!("model called an unknown tool");
        return json!({
            "success": false,
            "error": format!("Unknown tool: {}", call.name)
        });
    }
    let Some(video_id) = call.arguments.get("videoId").and_then(Value::as_str) else {
        warn!("tool call is missing the videoId argument");
        return json!({
            "success": false,
            "error": "An error occurred while fetching the transcripts"
        });
    };
    cache.tool_result(video_id, user_id).await
}

/// Map an internal failure to the message shown to the user. Raw upstream
/// error text stays in the logs.
fn user_facing_message(err: &RuntimeError) -> String {
    match err {
        RuntimeError::Provider(ProviderError::RateLimited { .. }) => RATE_LIMIT_MESSAGE.to_owned(),
        RuntimeError::Provider(ProviderError::Auth { .. }) => AUTH_ERROR_MESSAGE.to_owned(),
        _ => MODEL_ERROR_MESSAGE.to_owned(),
    }
}

/// Fold one round's usage into the turn total.
fn merge_usage(total: &mut Option<TokenUsage>, round: Option<TokenUsage>) {
    if let Some(round) = round {
        let total = total.get_or_insert_with(TokenUsage::default);
        total.prompt_tokens = total.prompt_tokens.saturating_add(round.prompt_tokens);
        total.completion_tokens = total
            .completion_tokens
            .saturating_add(round.completion_tokens);
        total.total_tokens = total.total_tokens.saturating_add(round.total_tokens);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use aisemble_core::DEFAULT_AGENT_ID;
    use aisemble_core::events::CompletedMessage;
    use aisemble_llm::{EventStream, ProviderResult};
    use aisemble_store::{NewSessionOptions, SaveTranscriptOptions};
    use aisemble_youtube::{InnerTubeClient, InnerTubeConfig};

    // ─────────────────────────────────────────────────────────────────
    // Providers
    // ─────────────────────────────────────────────────────────────────

    /// Plays back one scripted event list per model round and records every
    /// request it receives.
    struct ScriptedProvider {
        rounds: Mutex<VecDeque<Vec<Result<StreamEvent, ProviderError>>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(rounds: Vec<Vec<Result<StreamEvent, ProviderError>>>) -> Self {
            Self {
                rounds: Mutex::new(rounds.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn stream(&self, request: &ChatRequest) -> ProviderResult<EventStream> {
            self.requests.lock().unwrap().push(request.clone());
            let script = self.rounds.lock().unwrap().pop_front().unwrap_or_default();
            Ok(Box::pin(stream! {
                for event in script {
                    yield event;
                }
            }))
        }
    }

    /// Fails every request before any event streams.
    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn model(&self) -> &str {
            "failing"
        }

        async fn stream(&self, _request: &ChatRequest) -> ProviderResult<EventStream> {
            Err(ProviderError::Auth {
                message: "invalid api key".into(),
            })
        }
    }

    /// Cancels the turn token mid-stream, after the first delta is queued.
    struct CancellingProvider {
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Provider for CancellingProvider {
        fn model(&self) -> &str {
            "cancelling"
        }

        async fn stream(&self, _request: &ChatRequest) -> ProviderResult<EventStream> {
            let cancel = self.cancel.clone();
            Ok(Box::pin(stream! {
                yield Ok(StreamEvent::Start);
                cancel.cancel();
                yield Ok(StreamEvent::TextDelta { delta: "partial".into() });
                yield Ok(StreamEvent::TextDelta { delta: " never delivered".into() });
                yield Ok(StreamEvent::Done {
                    message: CompletedMessage {
                        content: "partial never delivered".into(),
                        ..CompletedMessage::default()
                    },
                    stop_reason: "stop".into(),
                });
            }))
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Fixtures
    // ─────────────────────────────────────────────────────────────────

    struct Fixture {
        store: Arc<ChatStore>,
        orchestrator: ChatOrchestrator,
    }

    fn fixture_opts(provider: Arc<dyn Provider>, max_tool_rounds: u32) -> Fixture {
        let store = Arc::new(ChatStore::open_in_memory().unwrap());
        // Unroutable address: any test that reaches the platform is a bug.
        let platform = Arc::new(InnerTubeClient::new(InnerTubeConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..InnerTubeConfig::default()
        }));
        let cache = Arc::new(TranscriptCache::new(Arc::clone(&store), platform));
        let sessions = Arc::new(SessionService::new(Arc::clone(&store)));
        let orchestrator = ChatOrchestrator::new(provider, Arc::clone(&store), cache, sessions)
            .with_max_tool_rounds(max_tool_rounds);
        Fixture {
            store,
            orchestrator,
        }
    }

    fn fixture(provider: Arc<dyn Provider>) -> Fixture {
        fixture_opts(provider, DEFAULT_MAX_TOOL_ROUNDS)
    }

    fn scripted_fixture(
        rounds: Vec<Vec<Result<StreamEvent, ProviderError>>>,
    ) -> (Fixture, Arc<ScriptedProvider>) {
        scripted_fixture_opts(rounds, DEFAULT_MAX_TOOL_ROUNDS)
    }

    fn scripted_fixture_opts(
        rounds: Vec<Vec<Result<StreamEvent, ProviderError>>>,
        max_tool_rounds: u32,
    ) -> (Fixture, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(rounds));
        (
            fixture_opts(Arc::clone(&provider) as Arc<dyn Provider>, max_tool_rounds),
            provider,
        )
    }

    fn text(delta: &str) -> Result<StreamEvent, ProviderError> {
        Ok(StreamEvent::TextDelta {
            delta: delta.into(),
        })
    }

    fn done(
        content: &str,
        tool_calls: Vec<ToolCall>,
        token_usage: Option<TokenUsage>,
    ) -> Result<StreamEvent, ProviderError> {
        let stop_reason = if tool_calls.is_empty() {
            "stop"
        } else {
            "tool_calls"
        };
        Ok(StreamEvent::Done {
            message: CompletedMessage {
                content: content.into(),
                tool_calls,
                token_usage,
            },
            stop_reason: stop_reason.into(),
        })
    }

    fn usage(prompt: u64, completion: u64) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    fn transcript_call(id: &str, video_id: &str) -> ToolCall {
        let mut arguments = serde_json::Map::new();
        arguments.insert("videoId".into(), json!(video_id));
        ToolCall {
            id: id.into(),
            name: FETCH_TRANSCRIPT_TOOL.into(),
            arguments,
        }
    }

    fn turn_request(video_id: &str, session_id: Option<&str>, user_text: &str) -> TurnRequest {
        TurnRequest {
            messages: vec![TurnMessage {
                role: Role::User,
                content: user_text.into(),
            }],
            video_id: video_id.into(),
            session_id: session_id.map(str::to_owned),
        }
    }

    fn new_session(store: &ChatStore) -> String {
        store
            .create_session(&NewSessionOptions {
                resource_id: "vid_1",
                resource_type: ResourceType::Youtube,
                title: "Chat: Test",
                agent_id: "agent_1",
                user_id: "user_1",
            })
            .unwrap()
            .id
    }

    fn save_transcript(store: &ChatStore, video_id: &str, title: &str, caption: &str) {
        let segments = vec![aisemble_core::TranscriptSegment {
            text: caption.into(),
            timestamp: "0:00:00".into(),
        }];
        store
            .save_transcript(&SaveTranscriptOptions {
                video_id,
                segments: &segments,
                title: Some(title),
                user_id: "user_1",
            })
            .unwrap();
    }

    async fn collect(stream: TurnStream) -> Vec<TurnEvent> {
        stream.collect::<Vec<_>>().await
    }

    // ─────────────────────────────────────────────────────────────────
    // Plain text turns
    // ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn streams_text_and_persists_turn() {
        let (f, _provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            text("Hello"),
            text(" world"),
            done("Hello world", vec![], Some(usage(10, 5))),
        ]]);
        let session_id = new_session(&f.store);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", Some(&session_id), "What is this video about?"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(
            events,
            vec![
                TurnEvent::Text {
                    delta: "Hello".into()
                },
                TurnEvent::Text {
                    delta: " world".into()
                },
                TurnEvent::Done {
                    session_id: Some(session_id.clone()),
                    usage: Some(usage(10, 5)),
                },
            ]
        );

        let rows = f.store.list_messages(&session_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, "user");
        assert_eq!(rows[0].content, "What is this video about?");
        assert_eq!(rows[1].role, "assistant");
        assert_eq!(rows[1].content, "Hello world");
        assert_eq!(rows[1].tokens_used, Some(15));
        assert_eq!(rows[1].prompt_tokens, Some(10));
        assert!(rows[1].tool_invocations.is_none());
    }

    #[tokio::test]
    async fn lazily_creates_session_when_absent() {
        let (f, _provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            text("hi"),
            done("hi", vec![], None),
        ]]);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", None, "hello"),
            CancellationToken::new(),
        ))
        .await;

        let Some(TurnEvent::Done {
            session_id: Some(session_id),
            ..
        }) = events.last()
        else {
            panic!("expected done with a session id, got {events:?}");
        };

        let session = f.store.get_session(session_id).unwrap().unwrap();
        assert_eq!(session.title, "hello");
        assert_eq!(session.agent_id, DEFAULT_AGENT_ID);
        assert_eq!(session.user_id, "user_1");

        let rows = f.store.list_messages(session_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "hello");
    }

    #[tokio::test]
    async fn lazy_session_title_truncates_long_first_message() {
        let (f, _provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            done("ok", vec![], None),
        ]]);

        let long = "Please give me a detailed summary of the main arguments presented in this video";
        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", None, long),
            CancellationToken::new(),
        ))
        .await;

        let Some(TurnEvent::Done {
            session_id: Some(session_id),
            ..
        }) = events.last()
        else {
            panic!("expected done with a session id");
        };
        let session = f.store.get_session(session_id).unwrap().unwrap();
        assert!(session.title.ends_with("..."));
        assert!(session.title.chars().count() <= 50);
        assert!(long.starts_with(session.title.trim_end_matches("...")));
    }

    #[tokio::test]
    async fn lazy_session_without_user_text_gets_video_default_title() {
        let (f, _provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            done("ok", vec![], None),
        ]]);

        let request = TurnRequest {
            messages: vec![],
            video_id: "vid_1".into(),
            session_id: None,
        };
        let events = collect(
            f.orchestrator
                .handle_turn("user_1", request, CancellationToken::new()),
        )
        .await;

        let Some(TurnEvent::Done {
            session_id: Some(session_id),
            ..
        }) = events.last()
        else {
            panic!("expected done with a session id");
        };
        let session = f.store.get_session(session_id).unwrap().unwrap();
        assert_eq!(session.title, "Chat: Unknown Video");
    }

    #[tokio::test]
    async fn system_prompt_uses_cached_video_title() {
        let (f, provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            done("ok", vec![], None),
        ]]);
        save_transcript(&f.store, "vid_1", "Rust in Production", "hello");

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", None, "hi"),
            CancellationToken::new(),
        ))
        .await;

        let requests = provider.requests.lock().unwrap();
        let ChatMessage::System { content } = &requests[0].messages[0] else {
            panic!("expected a leading system message");
        };
        assert!(content.contains("Rust in Production"));
        assert!(content.contains("vid_1"));
        assert!(matches!(events.last(), Some(TurnEvent::Done { .. })));
    }

    #[tokio::test]
    async fn system_prompt_falls_back_without_title() {
        let (f, provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            done("ok", vec![], None),
        ]]);

        collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", None, "hi"),
            CancellationToken::new(),
        ))
        .await;

        let requests = provider.requests.lock().unwrap();
        let ChatMessage::System { content } = &requests[0].messages[0] else {
            panic!("expected a leading system message");
        };
        assert!(content.contains(FALLBACK_VIDEO_TITLE));
    }

    #[tokio::test]
    async fn maps_history_roles_into_provider_request() {
        let (f, provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            done("ok", vec![], None),
        ]]);
        let session_id = new_session(&f.store);

        let request = TurnRequest {
            messages: vec![
                TurnMessage {
                    role: Role::User,
                    content: "first".into(),
                },
                TurnMessage {
                    role: Role::Assistant,
                    content: "earlier reply".into(),
                },
                TurnMessage {
                    role: Role::System,
                    content: "injected instructions".into(),
                },
                TurnMessage {
                    role: Role::Data,
                    content: "{}".into(),
                },
                TurnMessage {
                    role: Role::User,
                    content: "second".into(),
                },
            ],
            video_id: "vid_1".into(),
            session_id: Some(session_id.clone()),
        };
        collect(
            f.orchestrator
                .handle_turn("user_1", request, CancellationToken::new()),
        )
        .await;

        let requests = provider.requests.lock().unwrap();
        let forwarded = &requests[0].messages;
        assert_eq!(forwarded.len(), 4);
        assert!(matches!(forwarded[0], ChatMessage::System { .. }));
        assert_eq!(forwarded[1], ChatMessage::user("first"));
        assert_eq!(forwarded[2], ChatMessage::assistant("earlier reply"));
        assert_eq!(forwarded[3], ChatMessage::user("second"));

        // Only the latest user message persists, not the replayed history.
        let rows = f.store.list_messages(&session_id).unwrap();
        assert_eq!(rows[0].content, "second");
    }

    // ─────────────────────────────────────────────────────────────────
    // Tool rounds
    // ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn runs_transcript_tool_round_trip() {
        let (f, provider) = scripted_fixture(vec![
            vec![
                Ok(StreamEvent::Start),
                done("", vec![transcript_call("tc_1", "vid_1")], Some(usage(100, 20))),
            ],
            vec![
                Ok(StreamEvent::Start),
                text("The video opens with Hello"),
                done("The video opens with Hello", vec![], Some(usage(30, 10))),
            ],
        ]);
        let session_id = new_session(&f.store);
        save_transcript(&f.store, "vid_1", "Rust in Production", "Hello");

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", Some(&session_id), "How does it start?"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            TurnEvent::ToolStarted {
                tool_call_id: "tc_1".into(),
                name: FETCH_TRANSCRIPT_TOOL.into(),
            }
        );
        let TurnEvent::ToolFinished { result, .. } = &events[1] else {
            panic!("expected tool_finished, got {:?}", events[1]);
        };
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["data"][0]["text"], "Hello");
        assert_eq!(
            events[3],
            TurnEvent::Done {
                session_id: Some(session_id.clone()),
                usage: Some(usage(130, 30)),
            }
        );

        // The second round sees the assistant's tool call and its result.
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let second = &requests[1].messages;
        let ChatMessage::Assistant { tool_calls, .. } = &second[second.len() - 2] else {
            panic!("expected an assistant message with tool calls");
        };
        assert_eq!(tool_calls.len(), 1);
        let ChatMessage::ToolResult {
            tool_call_id,
            content,
        } = second.last().unwrap()
        else {
            panic!("expected a trailing tool result");
        };
        assert_eq!(tool_call_id, "tc_1");
        assert!(content.contains(r#""success":true"#));

        // Invocations persist on the assistant row.
        let rows = f.store.list_messages(&session_id).unwrap();
        assert_eq!(rows[1].tokens_used, Some(160));
        let invocations = rows[1].parsed_tool_invocations().unwrap().unwrap();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].tool_name, FETCH_TRANSCRIPT_TOOL);
        assert_eq!(invocations[0].arguments["videoId"], json!("vid_1"));
        assert_eq!(invocations[0].result["success"], json!(true));
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_envelope() {
        let call = ToolCall {
            id: "tc_9".into(),
            name: "web_search".into(),
            arguments: serde_json::Map::new(),
        };
        let (f, provider) = scripted_fixture(vec![
            vec![Ok(StreamEvent::Start), done("", vec![call], None)],
            vec![Ok(StreamEvent::Start), done("ok", vec![], None)],
        ]);
        let session_id = new_session(&f.store);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", Some(&session_id), "hi"),
            CancellationToken::new(),
        ))
        .await;

        let TurnEvent::ToolFinished { result, .. } = &events[1] else {
            panic!("expected tool_finished, got {:?}", events[1]);
        };
        assert_eq!(
            result,
            &json!({ "success": false, "error": "Unknown tool: web_search" })
        );

        // The model still gets a result for the call it made.
        let requests = provider.requests.lock().unwrap();
        let ChatMessage::ToolResult { content, .. } = requests[1].messages.last().unwrap() else {
            panic!("expected a trailing tool result");
        };
        assert!(content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn missing_video_id_argument_yields_error_envelope() {
        let call = ToolCall {
            id: "tc_1".into(),
            name: FETCH_TRANSCRIPT_TOOL.into(),
            arguments: serde_json::Map::new(),
        };
        let (f, _provider) = scripted_fixture(vec![
            vec![Ok(StreamEvent::Start), done("", vec![call], None)],
            vec![Ok(StreamEvent::Start), done("ok", vec![], None)],
        ]);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", None, "hi"),
            CancellationToken::new(),
        ))
        .await;

        let TurnEvent::ToolFinished { result, .. } = &events[1] else {
            panic!("expected tool_finished, got {:?}", events[1]);
        };
        assert_eq!(
            result,
            &json!({
                "success": false,
                "error": "An error occurred while fetching the transcripts"
            })
        );
    }

    #[tokio::test]
    async fn tool_round_limit_caps_model_calls() {
        let (f, provider) = scripted_fixture_opts(
            vec![
                vec![
                    Ok(StreamEvent::Start),
                    done("", vec![transcript_call("tc_1", "vid_1")], None),
                ],
                vec![
                    Ok(StreamEvent::Start),
                    done(
                        "still working",
                        vec![transcript_call("tc_2", "vid_1")],
                        None,
                    ),
                ],
                // Never requested: the cap stops the loop after round two.
                vec![Ok(StreamEvent::Start), done("never", vec![], None)],
            ],
            2,
        );
        let session_id = new_session(&f.store);
        save_transcript(&f.store, "vid_1", "T", "hello");

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", Some(&session_id), "hi"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(provider.requests.lock().unwrap().len(), 2);
        let started = events
            .iter()
            .filter(|e| matches!(e, TurnEvent::ToolStarted { .. }))
            .count();
        assert_eq!(started, 1);
        assert!(matches!(events.last(), Some(TurnEvent::Done { .. })));

        let rows = f.store.list_messages(&session_id).unwrap();
        assert_eq!(rows[1].content, "still working");
        let invocations = rows[1].parsed_tool_invocations().unwrap().unwrap();
        assert_eq!(invocations.len(), 1);
    }

    // ─────────────────────────────────────────────────────────────────
    // Failures and cancellation
    // ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn mid_stream_error_yields_generic_message() {
        let (f, _provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            text("Hal"),
            Ok(StreamEvent::Error {
                error: "boom from upstream".into(),
            }),
        ]]);
        let session_id = new_session(&f.store);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", Some(&session_id), "hi"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(
            events,
            vec![
                TurnEvent::Text {
                    delta: "Hal".into()
                },
                TurnEvent::Error {
                    message: MODEL_ERROR_MESSAGE.into()
                },
            ]
        );
        // Raw upstream text never reaches the client.
        for event in &events {
            assert!(!format!("{event:?}").contains("boom"));
        }
        // The user message stays; no assistant row is written.
        assert_eq!(f.store.list_messages(&session_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transport_error_mid_stream_ends_turn() {
        let (f, _provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            text("x"),
            Err(ProviderError::Api {
                status: 500,
                message: "internal upstream failure".into(),
                code: None,
                retryable: true,
            }),
        ]]);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", None, "hi"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(
            events.last(),
            Some(&TurnEvent::Error {
                message: MODEL_ERROR_MESSAGE.into()
            })
        );
    }

    #[tokio::test]
    async fn rate_limited_stream_maps_retry_message() {
        let (f, _provider) = scripted_fixture(vec![vec![
            Ok(StreamEvent::Start),
            Err(ProviderError::RateLimited {
                retry_after_ms: 2000,
                message: "slow down".into(),
            }),
        ]]);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", None, "hi"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(
            events.last(),
            Some(&TurnEvent::Error {
                message: RATE_LIMIT_MESSAGE.into()
            })
        );
    }

    #[tokio::test]
    async fn provider_request_failure_maps_auth_message() {
        let f = fixture(Arc::new(FailingProvider));
        let session_id = new_session(&f.store);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", Some(&session_id), "hi"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(
            events,
            vec![TurnEvent::Error {
                message: AUTH_ERROR_MESSAGE.into()
            }]
        );
        assert_eq!(f.store.list_messages(&session_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_skips_completion_persistence() {
        let cancel = CancellationToken::new();
        let f = fixture(Arc::new(CancellingProvider {
            cancel: cancel.clone(),
        }));
        let session_id = new_session(&f.store);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", Some(&session_id), "hi"),
            cancel,
        ))
        .await;

        // The delta already in flight is delivered; nothing after the
        // cancellation is, and no done or error event follows.
        assert_eq!(
            events,
            vec![TurnEvent::Text {
                delta: "partial".into()
            }]
        );
        assert_eq!(f.store.list_messages(&session_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stream_ending_without_done_is_an_error() {
        let (f, _provider) =
            scripted_fixture(vec![vec![Ok(StreamEvent::Start), text("cut off")]]);

        let events = collect(f.orchestrator.handle_turn(
            "user_1",
            turn_request("vid_1", None, "hi"),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(
            events.last(),
            Some(&TurnEvent::Error {
                message: MODEL_ERROR_MESSAGE.into()
            })
        );
    }

    // ─────────────────────────────────────────────────────────────────
    // Helpers and wire shapes
    // ─────────────────────────────────────────────────────────────────

    #[test]
    fn merge_usage_sums_rounds() {
        let mut total = None;
        merge_usage(&mut total, Some(usage(100, 20)));
        merge_usage(&mut total, None);
        merge_usage(&mut total, Some(usage(30, 10)));
        assert_eq!(total, Some(usage(130, 30)));

        let mut empty = None;
        merge_usage(&mut empty, None);
        assert_eq!(empty, None);
    }

    #[test]
    fn turn_event_wire_shapes() {
        let done = TurnEvent::Done {
            session_id: Some("sess_1".into()),
            usage: Some(usage(10, 5)),
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["sessionId"], "sess_1");
        assert_eq!(json["usage"]["totalTokens"], 15);

        let bare = TurnEvent::Done {
            session_id: None,
            usage: None,
        };
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("sessionId").is_none());
        assert!(json.get("usage").is_none());

        let started = TurnEvent::ToolStarted {
            tool_call_id: "tc_1".into(),
            name: "fetch_transcript".into(),
        };
        let json = serde_json::to_value(&started).unwrap();
        assert_eq!(json["type"], "tool_started");
        assert_eq!(json["toolCallId"], "tc_1");

        let delta = TurnEvent::Text { delta: "hi".into() };
        assert_eq!(serde_json::to_value(&delta).unwrap()["type"], "text");
    }

    #[test]
    fn turn_request_parses_camel_case() {
        let request: TurnRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "videoId": "vid_1",
            "sessionId": "sess_1"
        }))
        .unwrap();
        assert_eq!(request.video_id, "vid_1");
        assert_eq!(request.session_id.as_deref(), Some("sess_1"));
        assert_eq!(request.messages[0].role, Role::User);

        let without_session: TurnRequest = serde_json::from_value(json!({
            "messages": [],
            "videoId": "vid_1"
        }))
        .unwrap();
        assert!(without_session.session_id.is_none());
    }
}
