//! Secondary OCR: a vision-capable chat model over HTTPS.
//!
//! Invoked only when the primary strategy's quantitative triggers fire
//! (low confidence or too few parseable lines). The provider reports no
//! per-span confidence, so returned spans carry a fixed nominal value and
//! synthetic line-index geometry.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::Engine as _;
use image::DynamicImage;
use serde::Deserialize;

use deckscan_core::types::{BoundingBox, Span};

use crate::OcrError;

/// Nominal confidence assigned to provider output.
const VISION_SPAN_CONFIDENCE: f32 = 0.9;

/// Height assigned to each synthetic line box.
const SYNTHETIC_LINE_HEIGHT: f32 = 24.0;

const PROMPT: &str = "Transcribe this Magic: The Gathering decklist screenshot. \
Output one card per line as '<count> <name>'. Keep the word 'Sideboard' on its \
own line if a sideboard section is visible. Output nothing else.";

/// Per-minute sliding-window budget shared by all workers in the process.
#[derive(Debug)]
pub struct RateWindow {
    capacity: u32,
    window: Duration,
    events: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    /// A window admitting `capacity` events per `window`.
    #[must_use]
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Try to reserve one slot. Returns false when the budget is exhausted;
    /// exhaustion is not an error, it merely suppresses the fallback.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        while let Some(front) = events.front() {
            if now.duration_since(*front) > self.window {
                events.pop_front();
            } else {
                break;
            }
        }
        if events.len() as u64 >= u64::from(self.capacity) {
            return false;
        }
        events.push_back(now);
        true
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Client for the secondary vision provider.
pub struct VisionOcr {
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
    budget: RateWindow,
    http: reqwest::Client,
}

impl VisionOcr {
    /// Create a client with a per-minute call budget.
    #[must_use]
    pub fn new(endpoint: String, api_key: String, rate_per_minute: u32) -> Self {
        Self {
            endpoint,
            api_key,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(20),
            budget: RateWindow::new(rate_per_minute, Duration::from_secs(60)),
            http: reqwest::Client::new(),
        }
    }

    /// True when the per-minute budget admits another call. Reserves the
    /// slot on success.
    pub fn try_reserve(&self) -> bool {
        self.budget.try_acquire()
    }

    /// Send the image to the provider and re-tokenise its transcript into
    /// spans. The caller is responsible for budget reservation.
    ///
    /// # Errors
    ///
    /// [`OcrError::Provider`] on transport/HTTP errors after one retry,
    /// [`OcrError::MalformedResponse`] when the payload has no transcript.
    pub async fn recognize_image(&self, image: &DynamicImage) -> Result<Vec<Span>, OcrError> {
        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| OcrError::Preprocess(e.to_string()))?;
        let body = build_request_body(&self.model, &png);

        let mut last_err = None;
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            match self.send(&body).await {
                Ok(text) => return Ok(spans_from_transcript(&text)),
                Err(err) => {
                    log::warn!("vision OCR attempt {} failed: {err}", attempt + 1);
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| OcrError::Provider("no attempts made".to_string())))
    }

    async fn send(&self, body: &serde_json::Value) -> Result<String, OcrError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| OcrError::Provider(e.to_string()))?;
        if !response.status().is_success() {
            return Err(OcrError::Provider(format!(
                "HTTP {} from vision provider",
                response.status()
            )));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OcrError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OcrError::MalformedResponse("empty choices".to_string()))
    }
}

/// Build the chat-completion request body with the inlined image.
fn build_request_body(model: &str, png: &[u8]) -> serde_json::Value {
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
    serde_json::json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": PROMPT },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/png;base64,{encoded}") }
                }
            ]
        }],
        "max_tokens": 800,
        "temperature": 0
    })
}

/// One span per non-empty transcript line, with synthetic geometry.
fn spans_from_transcript(text: &str) -> Vec<Span> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, line)| {
            #[allow(clippy::cast_precision_loss)]
            let y = i as f32 * SYNTHETIC_LINE_HEIGHT;
            Span::new(
                line.to_string(),
                VISION_SPAN_CONFIDENCE,
                BoundingBox::new(0.0, y, 0.0, SYNTHETIC_LINE_HEIGHT),
            )
        })
        .collect()
}
