use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AiAdapter, AiError, CompletionRequest};
use crate::config::AiVendor;
use crate::sanitize::redact_url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat-completions client for any OpenAI-compatible endpoint.
///
/// Requests ask for a JSON object response at temperature 0. For vision
/// models the receipt image is attached as a base64 data URI.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    vendor: AiVendor,
    client: Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(vendor: AiVendor, timeout: Duration) -> Result<Self, AiError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Client(e.to_string()))?;
        Ok(Self {
            vendor,
            client,
            timeout,
        })
    }

    fn default_base_url(&self) -> Option<&'static str> {
        match self.vendor {
            AiVendor::OpenAi => Some("https://api.openai.com/v1"),
            AiVendor::Gemini => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            AiVendor::OpenAiCustom | AiVendor::Ollama => None,
        }
    }

    /// Full chat-completions URL. An endpoint that already names the
    /// `/chat/completions` path is used as is.
    fn completions_url(&self, endpoint: Option<&str>) -> Result<String, AiError> {
        let base = endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .or_else(|| self.default_base_url())
            .ok_or(AiError::MissingEndpoint(self.vendor))?;

        let base = base.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            Ok(base.to_string())
        } else {
            Ok(format!("{}/chat/completions", base))
        }
    }

    fn request_body(request: &CompletionRequest<'_>) -> Value {
        let content = match request.image {
            Some(image) => json!([
                {"type": "text", "text": request.prompt},
                {"type": "image_url", "image_url": {"url": image.data_uri(), "detail": "auto"}}
            ]),
            None => Value::String(request.prompt.to_string()),
        };

        let model = if request.model.trim().is_empty() {
            DEFAULT_MODEL
        } else {
            request.model
        };

        json!({
            "model": model,
            "messages": [{"role": "user", "content": content}],
            "n": 1,
            "temperature": 0,
            "response_format": {"type": "json_object"}
        })
    }
}

impl AiAdapter for OpenAiCompatibleClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AiError> {
        let url = self.completions_url(request.endpoint)?;
        let _span = tracing::info_span!(
            "ai.chat_completion",
            vendor = self.vendor.as_str(),
            endpoint = %redact_url(&url),
            model = request.model,
        )
        .entered();

        let mut builder = self.client.post(&url).json(&Self::request_body(request));
        if let Some(credential) = request.credential {
            builder = builder.bearer_auth(credential.expose_secret());
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                AiError::Timeout(self.timeout.as_secs())
            } else {
                AiError::Http(e.without_url().to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().map_err(|e| {
            if e.is_timeout() {
                AiError::Timeout(self.timeout.as_secs())
            } else {
                AiError::Http(e.without_url().to_string())
            }
        })?;

        if !status.is_success() {
            log::warn!("AI endpoint {} returned {}", redact_url(&url), status);
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) => return Err(AiError::EmptyResponse { body }),
        };

        match parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
        {
            Some(content) => Ok(content),
            None => Err(AiError::EmptyResponse { body }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ReceiptImage;
    use secrecy::SecretString;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves one canned HTTP response and returns the raw request it received.
    fn serve_once(status: &str, body: &str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                head.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            let mut stream = stream;
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            format!("{}{}", head, String::from_utf8_lossy(&body))
        });

        (url, handle)
    }

    fn request<'a>(
        endpoint: Option<&'a str>,
        credential: Option<&'a SecretString>,
        image: Option<&'a ReceiptImage>,
    ) -> CompletionRequest<'a> {
        CompletionRequest {
            prompt: "Extract the receipt",
            image,
            credential,
            model: "test-model",
            endpoint,
        }
    }

    #[test]
    fn test_completions_url() {
        let client = OpenAiCompatibleClient::new(AiVendor::OpenAi, Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.completions_url(None).unwrap(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            client
                .completions_url(Some("http://localhost:8080/v1/chat/completions"))
                .unwrap(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(
            client.completions_url(Some("http://localhost:11434/v1/")).unwrap(),
            "http://localhost:11434/v1/chat/completions"
        );

        let ollama = OpenAiCompatibleClient::new(AiVendor::Ollama, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            ollama.completions_url(None),
            Err(AiError::MissingEndpoint(AiVendor::Ollama))
        ));
    }

    #[test]
    fn test_request_body_with_image() {
        let image = ReceiptImage::new(b"abc".to_vec(), "image/png");
        let body = OpenAiCompatibleClient::request_body(&request(None, None, Some(&image)));
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["response_format"]["type"], "json_object");
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["text"], "Extract the receipt");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_request_body_text_only_defaults_model() {
        let mut req = request(None, None, None);
        req.model = "";
        let body = OpenAiCompatibleClient::request_body(&req);
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["messages"][0]["content"], "Extract the receipt");
    }

    #[test]
    fn test_complete_returns_message_content() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"name\":\"Cafe\"}"}}]}"#,
        );
        let client = OpenAiCompatibleClient::new(AiVendor::OpenAiCustom, Duration::from_secs(5)).unwrap();
        let key = SecretString::from("sk-test-123".to_string());

        let content = client
            .complete(&request(Some(&url), Some(&key), None))
            .unwrap();
        assert_eq!(content, r#"{"name":"Cafe"}"#);

        let raw_request = server.join().unwrap();
        assert!(raw_request.starts_with("POST /v1/chat/completions"));
        assert!(raw_request
            .to_ascii_lowercase()
            .contains("authorization: bearer sk-test-123"));
        assert!(raw_request.contains("\"model\":\"test-model\""));
    }

    #[test]
    fn test_complete_non_success_status_keeps_body() {
        let (url, server) = serve_once("503 Service Unavailable", r#"{"error":"overloaded"}"#);
        let client = OpenAiCompatibleClient::new(AiVendor::OpenAiCustom, Duration::from_secs(5)).unwrap();

        let err = client.complete(&request(Some(&url), None, None)).unwrap_err();
        server.join().unwrap();
        match err {
            AiError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, r#"{"error":"overloaded"}"#);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn test_complete_without_choices() {
        let (url, server) = serve_once("200 OK", r#"{"choices":[]}"#);
        let client = OpenAiCompatibleClient::new(AiVendor::OpenAiCustom, Duration::from_secs(5)).unwrap();

        let err = client.complete(&request(Some(&url), None, None)).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, AiError::EmptyResponse { .. }));
    }
}
