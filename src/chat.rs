//! Question/answer exchange with the backend's `/chat` route.
//!
//! Request body:
//!
//! ```json
//! {"question": "...", "k": 4, "namespace": "optional", "documents": [...]}
//! ```
//!
//! The backend has used both English and Portuguese field names over time,
//! so the answer is read from `answer`, `resposta` or `raw` (in that order)
//! and the citations from `sources` or `fontes`.

use anyhow::Result as AnyResult;
use serde::Serialize;
use serde_json::Value;

use crate::backend::BackendClient;
use crate::config::Config;
use crate::error::{Error, Result};

/// A question to send to the backend.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub question: String,
    pub k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Value>,
}

impl ChatRequest {
    /// Build a request, trimming the question. Blank questions are rejected.
    pub fn new(question: &str, k: u32) -> Result<Self> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::EmptyQuestion);
        }
        Ok(Self {
            question: question.to_string(),
            k,
            namespace: None,
            documents: None,
        })
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    /// Attach caller-supplied documents. Empty values are dropped.
    pub fn with_documents(mut self, documents: Option<Value>) -> Self {
        self.documents = documents.filter(|d| !is_empty_value(d));
        self
    }
}

/// Parse the free-form documents JSON typed by the user.
///
/// Blank input means "no documents".
pub fn parse_documents(text: &str) -> Result<Option<Value>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(text)?;
    Ok(Some(value))
}

/// The answer part of a backend response.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    /// Objects and arrays, shown as pretty-printed JSON.
    Structured(Value),
}

impl Answer {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => Answer::Text(s),
            Value::Object(_) | Value::Array(_) => Answer::Structured(value),
            other => Answer::Text(other.to_string()),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Answer::Text(s) => s.clone(),
            Answer::Structured(v) => pretty(v),
        }
    }
}

/// Interpreted backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub answer: Answer,
    pub sources: Option<Value>,
    /// The payload exactly as received (or `{"raw": text}` for non-JSON bodies).
    pub raw: Value,
}

impl ChatResponse {
    pub fn from_value(data: Value) -> Self {
        let answer = match &data {
            Value::Object(map) => ["answer", "resposta", "raw"]
                .iter()
                .filter_map(|key| map.get(*key))
                .find(|v| !is_empty_value(v))
                .cloned()
                .unwrap_or_else(|| data.clone()),
            _ => data.clone(),
        };

        let sources = match &data {
            Value::Object(map) => ["sources", "fontes"]
                .iter()
                .filter_map(|key| map.get(*key))
                .find(|v| !is_empty_value(v))
                .cloned(),
            _ => None,
        };

        Self {
            answer: Answer::from_value(answer),
            sources,
            raw: data,
        }
    }

    /// Build from a response body that may or may not be JSON.
    pub fn from_body(body: &str) -> Self {
        let data = serde_json::from_str::<Value>(body)
            .unwrap_or_else(|_| serde_json::json!({ "raw": body }));
        Self::from_value(data)
    }
}

/// JSON "falsy" values: null, false, 0, "", [] and {}.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Run `docchat ask`.
///
/// Malformed documents JSON is reported as a warning and the question is
/// still sent, without documents.
pub async fn run_ask(
    config: &Config,
    question: &str,
    k: Option<u32>,
    namespace: Option<String>,
    documents_text: Option<String>,
    json_output: bool,
) -> AnyResult<()> {
    let documents = match documents_text.as_deref().map(parse_documents) {
        Some(Ok(docs)) => docs,
        Some(Err(e)) => {
            eprintln!("Warning: invalid documents: {}", e);
            tracing::warn!(error = %e, "ignoring documents");
            None
        }
        None => None,
    };

    let request = ChatRequest::new(question, k.unwrap_or(config.backend.default_k))?
        .with_namespace(namespace)
        .with_documents(documents);

    let client = BackendClient::new(&config.backend)?;
    eprintln!("Querying documents...");
    let response = client.chat(&request).await?;

    if json_output {
        println!("{}", pretty(&response.raw));
        return Ok(());
    }

    println!("Answer:");
    println!("{}", response.answer.render());

    if let Some(sources) = &response.sources {
        println!();
        println!("Sources:");
        println!("{}", pretty(sources));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_trims_question_and_omits_empty_fields() {
        let req = ChatRequest::new("  what is covered?  ", 4)
            .unwrap()
            .with_namespace(Some(String::new()))
            .with_documents(Some(json!([])));

        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"question": "what is covered?", "k": 4})
        );
    }

    #[test]
    fn request_includes_namespace_and_documents() {
        let docs = json!([{"id": "1", "text": "hello", "metadata": {}}]);
        let req = ChatRequest::new("q", 2)
            .unwrap()
            .with_namespace(Some("contracts".to_string()))
            .with_documents(Some(docs.clone()));

        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"question": "q", "k": 2, "namespace": "contracts", "documents": docs})
        );
    }

    #[test]
    fn blank_question_is_rejected() {
        assert!(matches!(
            ChatRequest::new("   \n", 4),
            Err(Error::EmptyQuestion)
        ));
    }

    #[test]
    fn parse_documents_handles_blank_and_invalid() {
        assert_eq!(parse_documents("   ").unwrap(), None);
        assert_eq!(
            parse_documents(r#"[{"id":"1"}]"#).unwrap(),
            Some(json!([{"id": "1"}]))
        );
        assert!(matches!(
            parse_documents("[{oops"),
            Err(Error::MalformedJson(_))
        ));
    }

    #[test]
    fn response_prefers_answer_then_resposta_then_raw() {
        let r = ChatResponse::from_value(json!({"answer": "A", "resposta": "B"}));
        assert_eq!(r.answer, Answer::Text("A".to_string()));

        let r = ChatResponse::from_value(json!({"answer": "", "resposta": "B"}));
        assert_eq!(r.answer, Answer::Text("B".to_string()));

        let r = ChatResponse::from_value(json!({"raw": "plain"}));
        assert_eq!(r.answer, Answer::Text("plain".to_string()));
    }

    #[test]
    fn response_without_answer_keys_is_the_answer() {
        let data = json!({"result": {"text": "x"}});
        let r = ChatResponse::from_value(data.clone());
        assert_eq!(r.answer, Answer::Structured(data));
        assert!(r.sources.is_none());
    }

    #[test]
    fn response_reads_sources_or_fontes() {
        let r = ChatResponse::from_value(json!({"answer": "A", "fontes": ["doc.pdf"]}));
        assert_eq!(r.sources, Some(json!(["doc.pdf"])));

        let r = ChatResponse::from_value(json!({"answer": "A", "sources": [], "fontes": ["f"]}));
        assert_eq!(r.sources, Some(json!(["f"])));
    }

    #[test]
    fn non_json_body_becomes_raw_answer() {
        let r = ChatResponse::from_body("<html>gateway</html>");
        assert_eq!(r.answer, Answer::Text("<html>gateway</html>".to_string()));
        assert_eq!(r.raw, json!({"raw": "<html>gateway</html>"}));
    }

    #[test]
    fn structured_answer_renders_as_pretty_json() {
        let r = ChatResponse::from_value(json!({"answer": {"summary": "ok"}}));
        assert_eq!(r.answer.render(), "{\n  \"summary\": \"ok\"\n}");
    }

    #[test]
    fn array_payload_is_answer_without_sources() {
        let r = ChatResponse::from_value(json!(["a", "b"]));
        assert_eq!(r.answer, Answer::Structured(json!(["a", "b"])));
        assert!(r.sources.is_none());
    }
}
