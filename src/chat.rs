//! General assistant chat with optional web search.
//!
//! Each session keeps its own chat history, separate from the document
//! chat. A message that looks like it needs current information (or an
//! explicit `search` flag) runs a web search first; the results are
//! appended to the prompt sent to the model, but only the message as
//! typed is recorded.
//!
//! Message indices are zero-based positions in the recorded history,
//! which holds user and assistant turns only.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use docviz_core::models::{Role, Turn};
use docviz_core::store::SessionStore;

use crate::llm::{complete_or_explain, Completer};
use crate::websearch::{SearchResult, Searcher};

const SEARCH_KEYWORDS: &[&str] = &[
    "search",
    "google",
    "find",
    "look up",
    "lookup",
    "what is",
    "who is",
    "when did",
    "where is",
    "how to",
    "latest",
    "recent",
    "news",
    "current",
    "today",
    "update",
    "trending",
    "2024",
    "2025",
    "price",
    "weather",
    "definition",
    "meaning",
    "explain what",
    "tell me about",
    "information about",
    "search for",
    "search the web",
    "web search",
    "online",
    "internet",
];

const QUESTION_OPENERS: &[&str] = &[
    "what is the",
    "who is the",
    "when is",
    "where is the",
    "how do i",
    "how can i",
];

const ASSISTANT_INSTRUCTIONS: &str = "You are the docviz assistant, a programming expert with web search.

You help with writing, debugging, and optimizing code, explaining algorithms, \
reviewing designs, and finding current information on the web.

When you receive web search results, base the answer on them, summarize the key findings, \
and cite the sources with their links.

Format every answer in markdown. Put code in fenced blocks tagged with the language \
and use inline code for identifiers.";

const SEARCH_RESULTS_HEADER: &str = "\n\n📊 **Web Search Results:**\n\n";

const SEARCH_INSTRUCTIONS: &str =
    "Please use the above search results to provide an accurate and helpful response. Cite sources when relevant.";

const SUMMARY_INSTRUCTIONS: &str = "You are a helpful assistant. Summarize the following search results \
concisely and provide key insights. Include relevant links when appropriate.";

pub const NO_RESULTS_SUMMARY: &str = "No search results found.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message index {index} out of range (history length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Can only edit user messages")]
    NotUserMessage,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurnReply {
    pub response: String,
    pub user_index: usize,
    pub ai_index: usize,
    pub searched: bool,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditReply {
    pub response: String,
    pub user_index: usize,
    pub ai_index: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReply {
    pub results: Vec<SearchResult>,
    pub summary: Option<String>,
    pub query: String,
}

/// Keyword heuristic for messages that need current information.
///
/// Matches are case-insensitive substrings, plus a few question openers
/// matched at the start of the message.
pub fn should_search_web(message: &str) -> bool {
    let lower = message.to_lowercase();
    SEARCH_KEYWORDS.iter().any(|k| lower.contains(k))
        || QUESTION_OPENERS.iter().any(|p| lower.starts_with(p))
}

/// Numbered, markdown-formatted search results for the prompt.
pub fn search_context(results: &[SearchResult]) -> String {
    let mut context = String::from(SEARCH_RESULTS_HEADER);
    for (i, result) in results.iter().enumerate() {
        let title = if result.title.is_empty() {
            "No title"
        } else {
            &result.title
        };
        context.push_str(&format!("**{}. {}**\n", i + 1, title));
        if !result.snippet.is_empty() {
            context.push_str(&format!("{}\n", result.snippet));
        }
        if !result.link.is_empty() {
            context.push_str(&format!("🔗 {}\n", result.link));
        }
        context.push('\n');
    }
    context
}

/// The message sent to the model: the message itself when there are no
/// results, otherwise the message followed by the results and a request
/// to cite them.
pub fn enhanced_message(message: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return message.to_string();
    }
    format!(
        "{}\n{}\n{}",
        message,
        search_context(results),
        SEARCH_INSTRUCTIONS
    )
}

/// System prompt, then the whole recorded history, then `content` as the
/// newest user turn.
pub fn chat_turns(history: &[Turn], content: &str) -> Vec<Turn> {
    let system = format!(
        "{}\n\nCurrent date and time: {}",
        ASSISTANT_INSTRUCTIONS,
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    );
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(Turn::system(system));
    turns.extend(history.iter().cloned());
    turns.push(Turn::user(content));
    turns
}

async fn search_or_empty(searcher: &dyn Searcher, query: &str) -> Vec<SearchResult> {
    match searcher.search(query).await {
        Ok(results) => results,
        Err(e) => {
            warn!(error = %e, searcher = searcher.name(), "web search failed");
            Vec::new()
        }
    }
}

/// Answer one chat message, searching the web first when asked to or when
/// [`should_search_web`] matches.
pub async fn send(
    store: &dyn SessionStore,
    completer: &dyn Completer,
    searcher: &dyn Searcher,
    session: &str,
    message: &str,
    force_search: bool,
) -> Result<ChatTurnReply> {
    let results = if force_search || should_search_web(message) {
        search_or_empty(searcher, message).await
    } else {
        Vec::new()
    };
    info!(session, results = results.len(), "chat message");

    let history = store.get(session).await?.chat;
    let turns = chat_turns(&history, &enhanced_message(message, &results));
    let response = complete_or_explain(completer, &turns).await;

    // Re-read: other requests may have changed the session during the call.
    let mut state = store.get(session).await?;
    state.chat.push(Turn::user(message));
    state.chat.push(Turn::assistant(response.clone()));
    let ai_index = state.chat.len() - 1;
    store.replace(session, state).await?;

    Ok(ChatTurnReply {
        response,
        user_index: ai_index - 1,
        ai_index,
        searched: !results.is_empty(),
        model: completer.model_name().to_string(),
        timestamp: Utc::now(),
    })
}

/// Replace the user message at `index`, drop everything after it, and
/// answer again from the shortened history.
pub async fn edit(
    store: &dyn SessionStore,
    completer: &dyn Completer,
    session: &str,
    index: usize,
    content: &str,
) -> Result<EditReply, ChatError> {
    let history = store.get(session).await?.chat;
    match history.get(index) {
        None => {
            return Err(ChatError::IndexOutOfRange {
                index,
                len: history.len(),
            })
        }
        Some(turn) if turn.role != Role::User => return Err(ChatError::NotUserMessage),
        Some(_) => {}
    }

    let turns = chat_turns(&history[..index], content);
    let response = complete_or_explain(completer, &turns).await;

    let mut chat = history;
    chat.truncate(index);
    chat.push(Turn::user(content));
    chat.push(Turn::assistant(response.clone()));
    let ai_index = chat.len() - 1;

    let mut state = store.get(session).await?;
    state.chat = chat;
    store.replace(session, state).await?;
    info!(session, index, "chat message edited");

    Ok(EditReply {
        response,
        user_index: index,
        ai_index,
        timestamp: Utc::now(),
    })
}

pub async fn history(store: &dyn SessionStore, session: &str) -> Result<Vec<Turn>> {
    Ok(store.get(session).await?.chat)
}

/// Forget the chat history; documents and datasets are untouched.
pub async fn reset(store: &dyn SessionStore, session: &str) -> Result<()> {
    let mut state = store.get(session).await?;
    state.chat.clear();
    store.replace(session, state).await
}

fn summary_prompt(query: &str, results: &[SearchResult]) -> String {
    let mut prompt = format!("Web search results for '{}':\n\n", query);
    for (i, r) in results.iter().enumerate() {
        prompt.push_str(&format!("{}. **{}**\n", i + 1, r.title));
        if !r.snippet.is_empty() {
            prompt.push_str(&format!("   {}\n", r.snippet));
        }
        if !r.link.is_empty() {
            prompt.push_str(&format!("   Link: {}\n", r.link));
        }
        prompt.push('\n');
    }
    prompt.push_str(
        "\n\nPlease summarize these search results and provide the most relevant information.",
    );
    prompt
}

/// Stand-alone web search, optionally summarized by the model.
pub async fn web_search(
    searcher: &dyn Searcher,
    completer: &dyn Completer,
    query: &str,
    summarize: bool,
) -> SearchReply {
    let results = search_or_empty(searcher, query).await;
    if results.is_empty() {
        return SearchReply {
            results,
            summary: Some(NO_RESULTS_SUMMARY.to_string()),
            query: query.to_string(),
        };
    }

    let summary = if summarize {
        let turns = [
            Turn::system(SUMMARY_INSTRUCTIONS),
            Turn::user(summary_prompt(query, &results)),
        ];
        Some(complete_or_explain(completer, &turns).await)
    } else {
        None
    };

    SearchReply {
        results,
        summary,
        query: query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use docviz_core::store::memory::InMemorySessionStore;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<Vec<Turn>>>,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last(&self) -> Vec<Turn> {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Completer for Recording {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, turns: &[Turn]) -> Result<String> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(turns.to_vec());
            Ok(format!("reply {}", seen.len()))
        }
    }

    struct Fixed(Vec<SearchResult>);

    #[async_trait]
    impl Searcher for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl Searcher for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
            bail!("quota exceeded")
        }
    }

    fn result(title: &str, snippet: &str, link: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            snippet: snippet.to_string(),
            link: link.to_string(),
        }
    }

    #[test]
    fn test_should_search_web() {
        assert!(should_search_web("What is the borrow checker?"));
        assert!(should_search_web("latest tokio release"));
        assert!(should_search_web("Weather in Oslo"));
        assert!(should_search_web("How do I split a string"));
        assert!(should_search_web("rust jobs ONLINE"));
        assert!(!should_search_web("Refactor this function for me"));
        assert!(!should_search_web("hello there"));
        assert!(!should_search_web(""));
    }

    #[test]
    fn test_search_context_format() {
        let results = vec![
            result("Rust", "A language", "https://rust-lang.org"),
            result("", "", ""),
        ];
        assert_eq!(
            search_context(&results),
            "\n\n📊 **Web Search Results:**\n\n\
             **1. Rust**\nA language\n🔗 https://rust-lang.org\n\n\
             **2. No title**\n\n"
        );
    }

    #[test]
    fn test_enhanced_message() {
        assert_eq!(enhanced_message("hi", &[]), "hi");
        let enhanced = enhanced_message("news?", &[result("T", "S", "L")]);
        assert!(enhanced.starts_with("news?\n\n\n📊"));
        assert!(enhanced.ends_with("Cite sources when relevant."));
    }

    #[test]
    fn test_chat_turns_layout() {
        let history = vec![Turn::user("a"), Turn::assistant("b")];
        let turns = chat_turns(&history, "c");
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, Role::System);
        assert!(turns[0].content.contains("Current date and time"));
        assert_eq!(turns[1..3], history[..]);
        assert_eq!(turns[3], Turn::user("c"));
    }

    #[tokio::test]
    async fn test_send_records_message_as_typed() {
        let store = InMemorySessionStore::new();
        let llm = Recording::new();
        let searcher = Fixed(vec![result("Tokio 1.40", "Released", "https://tokio.rs")]);

        let reply = send(&store, &llm, &searcher, "s", "latest tokio", false)
            .await
            .unwrap();
        assert!(reply.searched);
        assert_eq!((reply.user_index, reply.ai_index), (0, 1));
        assert_eq!(reply.model, "recording");

        let sent = llm.last();
        assert!(sent.last().unwrap().content.contains("https://tokio.rs"));

        let chat = history(&store, "s").await.unwrap();
        assert_eq!(chat, vec![Turn::user("latest tokio"), Turn::assistant("reply 1")]);
    }

    #[tokio::test]
    async fn test_send_without_search() {
        let store = InMemorySessionStore::new();
        let llm = Recording::new();
        let searcher = Fixed(vec![result("unused", "", "")]);

        let reply = send(&store, &llm, &searcher, "s", "refactor this", false)
            .await
            .unwrap();
        assert!(!reply.searched);
        assert_eq!(llm.last().last().unwrap().content, "refactor this");

        let reply = send(&store, &llm, &searcher, "s", "refactor this", true)
            .await
            .unwrap();
        assert!(reply.searched);
        assert_eq!((reply.user_index, reply.ai_index), (2, 3));
        // History replayed: system + 2 prior turns + new message.
        assert_eq!(llm.last().len(), 4);
    }

    #[tokio::test]
    async fn test_search_failure_is_no_results() {
        let store = InMemorySessionStore::new();
        let llm = Recording::new();
        let reply = send(&store, &llm, &Broken, "s", "search rust news", false)
            .await
            .unwrap();
        assert!(!reply.searched);
        assert_eq!(reply.response, "reply 1");
    }

    #[tokio::test]
    async fn test_edit_truncates_and_regenerates() {
        let store = InMemorySessionStore::new();
        let llm = Recording::new();
        for m in ["first", "second", "third"] {
            send(&store, &llm, &Fixed(vec![]), "s", m, false)
                .await
                .unwrap();
        }

        let reply = edit(&store, &llm, "s", 2, "second, edited").await.unwrap();
        assert_eq!((reply.user_index, reply.ai_index), (2, 3));
        assert_eq!(reply.response, "reply 4");

        let chat = history(&store, "s").await.unwrap();
        assert_eq!(
            chat,
            vec![
                Turn::user("first"),
                Turn::assistant("reply 1"),
                Turn::user("second, edited"),
                Turn::assistant("reply 4"),
            ]
        );
        // The model saw only the history before the edited message.
        let sent = llm.last();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[3], Turn::user("second, edited"));
    }

    #[tokio::test]
    async fn test_edit_rejects_bad_index() {
        let store = InMemorySessionStore::new();
        let llm = Recording::new();
        send(&store, &llm, &Fixed(vec![]), "s", "hello", false)
            .await
            .unwrap();

        assert!(matches!(
            edit(&store, &llm, "s", 1, "x").await,
            Err(ChatError::NotUserMessage)
        ));
        assert!(matches!(
            edit(&store, &llm, "s", 2, "x").await,
            Err(ChatError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert_eq!(history(&store, "s").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_keeps_documents() {
        let store = InMemorySessionStore::new();
        let llm = Recording::new();
        let mut state = store.get("s").await.unwrap();
        state.conversation.push(Turn::user("doc question"));
        store.replace("s", state).await.unwrap();
        send(&store, &llm, &Fixed(vec![]), "s", "hello", false)
            .await
            .unwrap();

        reset(&store, "s").await.unwrap();
        let state = store.get("s").await.unwrap();
        assert!(state.chat.is_empty());
        assert_eq!(state.conversation.len(), 1);
    }

    #[tokio::test]
    async fn test_web_search_summary() {
        let llm = Recording::new();
        let reply = web_search(&Fixed(vec![]), &llm, "nothing", true).await;
        assert!(reply.results.is_empty());
        assert_eq!(reply.summary.as_deref(), Some(NO_RESULTS_SUMMARY));

        let searcher = Fixed(vec![result("Rust", "A language", "https://rust-lang.org")]);
        let reply = web_search(&searcher, &llm, "rust", false).await;
        assert_eq!(reply.results.len(), 1);
        assert!(reply.summary.is_none());

        let reply = web_search(&searcher, &llm, "rust", true).await;
        assert_eq!(reply.summary.as_deref(), Some("reply 1"));
        let prompt = &llm.last()[1].content;
        assert!(prompt.starts_with("Web search results for 'rust':"));
        assert!(prompt.contains("   Link: https://rust-lang.org"));
    }
}
