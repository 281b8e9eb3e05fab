use anyhow::{anyhow, Result};
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::Serialize;

use crate::config::Endpoints;
use crate::gallery::Artwork;
use crate::riddle::{Riddle, Verdict, VerifyRequest};
use crate::state::Turn;
use crate::stream::{text_fragments, StreamError};

/// Decoded text fragments of a streamed answer
pub type FragmentStream = BoxStream<'static, Result<String, StreamError>>;

#[derive(Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
    stream: bool,
    messages: &'a [Turn],
}

#[derive(Serialize)]
struct AlternativesRequest<'a> {
    question: &'a str,
    answer: &'a str,
}

/// Which streaming chat endpoint to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEndpoint {
    Conversation,
    WhatIf,
}

/// HTTP client for the IA SIGNATURE back end
#[derive(Clone)]
pub struct SignatureClient {
    client: Client,
    endpoints: Endpoints,
}

impl SignatureClient {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            client: Client::new(),
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Send the turn history and return the answer as a stream of text
    /// fragments. A non-success status fails before any fragment is read.
    pub async fn open_chat_stream(
        &self,
        endpoint: ChatEndpoint,
        query: &str,
        history: &[Turn],
    ) -> Result<FragmentStream, StreamError> {
        let url = match endpoint {
            ChatEndpoint::Conversation => &self.endpoints.chat,
            ChatEndpoint::WhatIf => &self.endpoints.whatif_chat,
        };

        let request = ChatRequest {
            query,
            stream: true,
            messages: history,
        };

        tracing::debug!(%url, turns = history.len(), "opening chat stream");

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StreamError::Status(response.status().as_u16()));
        }

        Ok(text_fragments(response.bytes_stream()).boxed())
    }

    /// Ask for alternative continuations. The JSON body is returned untouched.
    pub async fn fetch_alternatives(&self, question: &str, answer: &str) -> Result<serde_json::Value> {
        let request = AlternativesRequest { question, answer };

        let response = self
            .client
            .post(&self.endpoints.whatif_alternatives)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error! status: {}", response.status()));
        }

        Ok(response.json().await?)
    }

    pub async fn fetch_riddle(&self) -> Result<Riddle> {
        let response = self.client.post(&self.endpoints.riddle).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to load riddle: {}", response.status()));
        }

        Ok(response.json().await?)
    }

    pub async fn verify_riddle(&self, request: &VerifyRequest) -> Result<Verdict> {
        let response = self
            .client
            .post(&self.endpoints.verify)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to verify answer: {}", response.status()));
        }

        Ok(response.json().await?)
    }

    pub async fn fetch_artworks(&self, artist: &str) -> Result<Vec<Artwork>> {
        let url = self.endpoints.artworks_url(artist);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to fetch artworks"));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_shape() {
        let history = vec![Turn::assistant("Salutations"), Turn::user("Qui es-tu ?")];
        let request = ChatRequest {
            query: "Qui es-tu ?",
            stream: true,
            messages: &history,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["query"], "Qui es-tu ?");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"].as_array().map(|m| m.len()), Some(2));
        assert_eq!(json["messages"][0]["role"], "assistant");
        assert_eq!(json["messages"][1]["content"], "Qui es-tu ?");
    }

    #[test]
    fn test_alternatives_request_shape() {
        let request = AlternativesRequest {
            question: "NOT_PROVIDED",
            answer: "le phénix",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"question": "NOT_PROVIDED", "answer": "le phénix"}));
    }
}
