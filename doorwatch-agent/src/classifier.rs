//! Gemini vision classifier
//!
//! One `generateContent` call per attempt: the prompt and the still go in
//! as text + inline JPEG, and the model is constrained by a response schema
//! to answer `{"is_open": bool, "rationale": string}`.

use async_trait::async_trait;
use base64::Engine as _;
use doorwatch_core::config::ClassifierConf;
use doorwatch_core::ports::{Classifier, DoorStatus};
use doorwatch_core::CheckError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::transport::{request_error, status_error};

pub struct GeminiClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClassifier {
    pub fn new(conf: &ClassifierConf, api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(conf.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: conf.endpoint.trim_end_matches('/').to_string(),
            model: conf.model.clone(),
            api_key: api_key.into(),
        })
    }

    fn request_body(prompt: &str, image: &[u8]) -> Value {
        json!({
            "contents": [{
                "parts": [
                    {"text": prompt},
                    {"inline_data": {
                        "mime_type": "image/jpeg",
                        "data": base64::engine::general_purpose::STANDARD.encode(image)
                    }}
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "is_open": {"type": "BOOLEAN"},
                        "rationale": {"type": "STRING"}
                    },
                    "required": ["is_open", "rationale"]
                }
            }
        })
    }
}

/// Extracts the structured verdict from the first candidate's text.
fn parse_verdict(resp: GenerateResponse) -> Result<DoorStatus, CheckError> {
    let text = resp
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .ok_or_else(|| CheckError::terminal("classifier returned no content"))?;

    serde_json::from_str::<DoorStatus>(text.trim())
        .map_err(|e| CheckError::terminal(format!("unparseable classifier verdict: {e}")))
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, prompt: &str, image: &[u8]) -> Result<DoorStatus, CheckError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(prompt, image))
            .send()
            .await
            .map_err(|e| request_error("classifier", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error("classifier", status));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| CheckError::terminal(format!("classifier response is not JSON: {e}")))?;
        let verdict = parse_verdict(body)?;
        debug!(is_open = verdict.is_open, rationale = %verdict.rationale, "classifier verdict");
        Ok(verdict)
    }
}
