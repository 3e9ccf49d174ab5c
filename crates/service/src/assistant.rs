//! Assistant proxy: builds a bounded store-context prompt and forwards it to
//! an external text-generation service.
//!
//! Downstream failures are explicit ([`GenerationError`]) and each maps to a
//! fixed human-readable reply; the proxy itself never fails on a downstream
//! problem. Only an empty message is rejected, before any external call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{ChatRole, ChatTurn, Product};
use repository::{CategoriesRepository, ProductFilter, ProductsRepository};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::{pricing, ServiceError};

/// Products included in the prompt context.
pub const MAX_CONTEXT_PRODUCTS: usize = 8;
/// Categories included in the prompt context.
pub const MAX_CONTEXT_CATEGORIES: usize = 5;
/// Conversation turns carried into the outbound prompt.
pub const MAX_HISTORY_TURNS: usize = 6;
/// Longest product description fragment, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 180;

/// Reply when no API key is configured.
pub const REPLY_CONFIG_MISSING: &str =
    "Trợ lý ảo chưa được cấu hình (thiếu API key). Vui lòng liên hệ quản trị viên cửa hàng.";
/// Reply when the generation service cannot be reached.
pub const REPLY_TRANSPORT_ERROR: &str =
    "Trợ lý ảo hiện không truy cập được. Vui lòng thử lại sau ít phút.";
/// Reply when the generation service returns something unusable.
pub const REPLY_MALFORMED_RESPONSE: &str =
    "Trợ lý ảo trả về phản hồi không hợp lệ. Vui lòng thử lại sau.";

const SYSTEM_INSTRUCTIONS: &str = "Bạn là trợ lý bán hàng của cửa hàng. \
Trả lời bằng tiếng Việt, ngắn gọn và thân thiện. \
Ưu tiên dữ liệu cửa hàng được cung cấp bên dưới; \
nếu không chắc chắn, hãy nói rõ là bạn không chắc thay vì đoán.";

/// Connection settings for the generation service, passed in at
/// construction time.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// How a generation attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No API key configured; detected before any I/O.
    ConfigMissing,
    /// The service could not be reached or answered non-2xx.
    Transport(String),
    /// The service answered, but with an unparseable or empty body.
    MalformedResponse,
}

/// Outbound client for the generation service; allows test doubles.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OutboundMessage<'a>>,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Real HTTP client speaking the OpenAI-style chat-completions protocol.
pub struct HttpGenerationClient {
    http: reqwest::Client,
    config: AssistantConfig,
}

impl HttpGenerationClient {
    /// Build the client with the configured total request timeout.
    pub fn new(config: AssistantConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        if self.config.api_key.trim().is_empty() {
            return Err(GenerationError::ConfigMissing);
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![OutboundMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::Transport(format!("HTTP {status}")));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|_| GenerationError::MalformedResponse)?;
        parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::MalformedResponse)
    }
}

/// Assistant proxy service.
pub struct AssistantService<P, C, G> {
    products: Arc<P>,
    categories: Arc<C>,
    client: G,
}

impl<P, C, G> AssistantService<P, C, G>
where
    P: ProductsRepository,
    C: CategoriesRepository,
    G: GenerationClient,
{
    pub fn new(products: Arc<P>, categories: Arc<C>, client: G) -> Self {
        Self {
            products,
            categories,
            client,
        }
    }

    /// Answer a shopper question, with store context, as of now.
    pub async fn answer(
        &self,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String, ServiceError> {
        self.answer_at(message, history, Utc::now()).await
    }

    /// Answer at an explicit instant (prices in the context depend on it).
    ///
    /// An empty message is the only hard error; every downstream failure
    /// becomes a fixed fallback reply.
    #[instrument(skip(self, message, history))]
    pub async fn answer_at(
        &self,
        message: &str,
        history: &[ChatTurn],
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::InvalidInput("message is empty".into()));
        }

        let prompt = self.build_prompt(message, history, now).await;
        match self.client.complete(&prompt).await {
            Ok(reply) => Ok(reply),
            Err(GenerationError::ConfigMissing) => {
                warn!("assistant call skipped: no API key configured");
                Ok(REPLY_CONFIG_MISSING.to_string())
            }
            Err(GenerationError::Transport(e)) => {
                warn!("assistant transport failure: {}", e);
                Ok(REPLY_TRANSPORT_ERROR.to_string())
            }
            Err(GenerationError::MalformedResponse) => {
                warn!("assistant returned a malformed response");
                Ok(REPLY_MALFORMED_RESPONSE.to_string())
            }
        }
    }

    async fn build_prompt(
        &self,
        message: &str,
        history: &[ChatTurn],
        now: DateTime<Utc>,
    ) -> String {
        // Catalog lookups degrade to an empty context; the assistant still
        // answers, it just knows less.
        let products = self
            .products
            .search(&ProductFilter {
                query: Some(message.to_string()),
                match_specification: true,
                category_slug: None,
                limit: MAX_CONTEXT_PRODUCTS as i64,
            })
            .await
            .unwrap_or_else(|e| {
                warn!("assistant context: product search failed: {}", e);
                Vec::new()
            });
        let categories = self.categories.all().await.unwrap_or_else(|e| {
            warn!("assistant context: category listing failed: {}", e);
            Vec::new()
        });

        let message_lower = message.to_lowercase();
        let matching_categories: Vec<&str> = categories
            .iter()
            .filter(|c| {
                let name = c.name.to_lowercase();
                message_lower.contains(&name) || name.contains(&message_lower)
            })
            .take(MAX_CONTEXT_CATEGORIES)
            .map(|c| c.name.as_str())
            .collect();

        let mut prompt = String::new();
        prompt.push_str(SYSTEM_INSTRUCTIONS);
        prompt.push_str("\n\n## Dữ liệu cửa hàng\n");
        if products.is_empty() {
            prompt.push_str("(không tìm thấy sản phẩm phù hợp)\n");
        } else {
            for product in products.iter().take(MAX_CONTEXT_PRODUCTS) {
                prompt.push_str(&context_line(product, now));
                prompt.push('\n');
            }
        }
        if !matching_categories.is_empty() {
            prompt.push_str("Danh mục liên quan: ");
            prompt.push_str(&matching_categories.join(", "));
            prompt.push('\n');
        }

        let tail_start = history.len().saturating_sub(MAX_HISTORY_TURNS);
        if history.len() > tail_start {
            prompt.push_str("\n## Hội thoại gần đây\n");
            for turn in &history[tail_start..] {
                let speaker = match turn.role {
                    ChatRole::User => "Khách",
                    ChatRole::Assistant => "Trợ lý",
                };
                prompt.push_str(speaker);
                prompt.push_str(": ");
                prompt.push_str(turn.content.trim());
                prompt.push('\n');
            }
        }

        prompt.push_str("\n## Câu hỏi\nKhách: ");
        prompt.push_str(message);
        prompt
    }
}

/// One product as a single context line: name, effective price (with flash
/// note), stock, colors, and a truncated description.
fn context_line(product: &Product, now: DateTime<Utc>) -> String {
    let price = pricing::effective_price(product, now);
    let mut line = format!("- {}: giá {}đ", product.name, price);
    if pricing::is_flash_active(product, now) {
        line.push_str(&format!(" (flash sale, giá gốc {}đ)", product.price));
    }
    match product.stock {
        Some(stock) => line.push_str(&format!("; kho: {stock}")),
        None => line.push_str("; kho: không giới hạn"),
    }
    if !product.colors.is_empty() {
        line.push_str("; màu: ");
        line.push_str(&product.colors.join(", "));
    }
    let description = product.description.trim();
    if !description.is_empty() {
        line.push_str("; ");
        line.push_str(&truncate_chars(description, MAX_DESCRIPTION_CHARS));
    }
    line
}

/// Truncate to at most `max` characters, ellipsis included. Safe on any
/// char boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{product, FakeCategories, FakeProducts};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::Mutex;

    /// Stub client recording every prompt it is asked to complete.
    struct StubClient {
        prompts: Mutex<Vec<String>>,
        result: Result<String, GenerationError>,
    }

    impl StubClient {
        fn ok(reply: &str) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                result: Ok(reply.to_string()),
            }
        }

        fn failing(err: GenerationError) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                result: Err(err),
            }
        }
    }

    #[async_trait]
    impl GenerationClient for &StubClient {
        async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.result.clone()
        }
    }

    fn service<'a>(
        products: Vec<Product>,
        client: &'a StubClient,
    ) -> AssistantService<FakeProducts, FakeCategories, &'a StubClient> {
        AssistantService::new(
            Arc::new(FakeProducts::new(products)),
            Arc::new(FakeCategories::new(&["Điện thoại", "Tai nghe"])),
            client,
        )
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_before_any_call() {
        let client = StubClient::ok("xin chào");
        let svc = service(vec![], &client);
        let err = svc.answer("   ", &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_config_missing_yields_deterministic_reply() {
        let client = StubClient::failing(GenerationError::ConfigMissing);
        let svc = service(vec![], &client);
        let reply = svc.answer("còn hàng không?", &[]).await.unwrap();
        assert_eq!(reply, REPLY_CONFIG_MISSING);
    }

    #[tokio::test]
    async fn test_transport_and_malformed_failures_yield_fallbacks() {
        let client = StubClient::failing(GenerationError::Transport("timeout".into()));
        let svc = service(vec![], &client);
        assert_eq!(
            svc.answer("giá bao nhiêu?", &[]).await.unwrap(),
            REPLY_TRANSPORT_ERROR
        );

        let client = StubClient::failing(GenerationError::MalformedResponse);
        let svc = service(vec![], &client);
        assert_eq!(
            svc.answer("giá bao nhiêu?", &[]).await.unwrap(),
            REPLY_MALFORMED_RESPONSE
        );
    }

    #[tokio::test]
    async fn test_prompt_carries_matching_products_with_flash_price() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut p = product(1, 200_000, Some(5));
        p.name = "Tai nghe Bluetooth".into();
        p.flash_price = Some(150_000);
        p.flash_starts_at = Some(now - ChronoDuration::hours(1));
        p.flash_ends_at = Some(now + ChronoDuration::hours(1));

        let client = StubClient::ok("dạ còn ạ");
        let svc = service(vec![p], &client);
        let reply = svc.answer_at("tai nghe", &[], now).await.unwrap();
        assert_eq!(reply, "dạ còn ạ");

        let prompts = client.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("Tai nghe Bluetooth"));
        assert!(prompt.contains("giá 150000đ"));
        assert!(prompt.contains("giá gốc 200000đ"));
        assert!(prompt.contains("kho: 5"));
        assert!(prompt.contains("Danh mục liên quan: Tai nghe"));
    }

    #[tokio::test]
    async fn test_prompt_caps_products_and_history() {
        let mut products = Vec::new();
        for id in 1..=12 {
            let mut p = product(id, 10_000, Some(1));
            p.name = format!("Áo thun mẫu {id}");
            products.push(p);
        }
        let history: Vec<ChatTurn> = (0..10)
            .map(|i| ChatTurn {
                role: if i % 2 == 0 {
                    ChatRole::User
                } else {
                    ChatRole::Assistant
                },
                content: format!("lượt {i}"),
            })
            .collect();

        let client = StubClient::ok("vâng");
        let svc = service(products, &client);
        svc.answer("áo thun", &history).await.unwrap();

        let prompts = client.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert_eq!(prompt.matches("- Áo thun mẫu").count(), 8);
        // Only the last 6 turns survive.
        assert!(!prompt.contains("lượt 3"));
        for i in 4..10 {
            assert!(prompt.contains(&format!("lượt {i}")));
        }
    }

    #[test]
    fn test_truncate_chars_is_boundary_safe() {
        let s = "đáđáđá";
        assert_eq!(truncate_chars(s, 10), s);
        let long: String = std::iter::repeat('đ').take(200).collect();
        let cut = truncate_chars(&long, 180);
        assert_eq!(cut.chars().count(), 180);
        assert!(cut.ends_with('…'));
    }
}
