//! 文本模型（Oracle）- 基础设施层
//!
//! 只暴露"给一段 prompt，拿回一段文本"的能力
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ConfigError, OracleError};

/// 文本补全接口
///
/// 调用方必须假设返回内容不可靠：可能不是 JSON、缺字段、或者直接报错。
#[async_trait]
pub trait TextOracle: Send + Sync {
    /// 模型名称（仅用于日志）
    fn name(&self) -> &str;

    /// 给定 prompt，返回补全文本
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

const SYSTEM_MESSAGE: &str = "You are an experienced school mathematics teacher and assessment designer. \
                              When asked for JSON, reply with JSON only.";

/// 基于 OpenAI 兼容接口的 Oracle
pub struct OpenAiOracle {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiOracle {
    /// 创建新的 Oracle，缺少 API Key 时报错
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?;

        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Ok(Self {
            client,
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            timeout: Duration::from_secs(config.oracle_timeout_secs),
        })
    }

    async fn send(&self, prompt: &str) -> Result<String, OracleError> {
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_MESSAGE)
            .build()
            .map_err(|e| OracleError::RequestBuildFailed {
                source: Box::new(e),
            })?;

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| OracleError::RequestBuildFailed {
                source: Box::new(e),
            })?;

        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| OracleError::RequestBuildFailed {
                source: Box::new(e),
            })?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            OracleError::call_failed(&self.model_name, e)
        })?;

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| OracleError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl TextOracle for OpenAiOracle {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("prompt 长度: {} 字符", prompt.len());

        match tokio::time::timeout(self.timeout, self.send(prompt)).await {
            Ok(result) => {
                if result.is_ok() {
                    debug!("LLM API 调用成功");
                }
                result
            }
            Err(_) => {
                warn!(
                    "LLM API 调用超时 ({} 秒)，模型: {}",
                    self.timeout.as_secs(),
                    self.model_name
                );
                Err(OracleError::Timeout {
                    model: self.model_name.clone(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// 测试用的脚本化 Oracle
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按顺序返回预设的响应，用完之后一律报错
    pub struct ScriptedOracle {
        responses: Mutex<VecDeque<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedOracle {
        pub fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }

        /// 每次都返回同一个响应
        pub fn repeating(response: &str, times: usize) -> Self {
            Self::new(vec![Ok(response); times])
        }

        /// 永远报错
        pub fn failing() -> Self {
            Self::new(Vec::new())
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextOracle for ScriptedOracle {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(msg)) => Err(OracleError::call_failed("scripted", msg)),
                None => Err(OracleError::call_failed("scripted", "脚本响应已用完")),
            }
        }
    }

    struct Route {
        marker: &'static str,
        responses: VecDeque<Result<String, String>>,
        fallback: Option<Result<String, String>>,
    }

    /// 按 prompt 中的关键字分发响应，用于多个服务共用一个 Oracle 的测试
    ///
    /// 每条路由先按顺序返回脚本响应，用完后返回 fallback（没有则报错）
    pub struct RoutingOracle {
        routes: Mutex<Vec<Route>>,
        prompts: Mutex<Vec<String>>,
    }

    impl RoutingOracle {
        pub fn new() -> Self {
            Self {
                routes: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn route(self, marker: &'static str, responses: Vec<Result<&str, &str>>) -> Self {
            self.push(marker, responses, None)
        }

        pub fn always(self, marker: &'static str, response: Result<&str, &str>) -> Self {
            self.push(marker, Vec::new(), Some(response))
        }

        fn push(
            self,
            marker: &'static str,
            responses: Vec<Result<&str, &str>>,
            fallback: Option<Result<&str, &str>>,
        ) -> Self {
            let owned = |r: Result<&str, &str>| r.map(str::to_string).map_err(str::to_string);
            self.routes.lock().unwrap().push(Route {
                marker,
                responses: responses.into_iter().map(owned).collect(),
                fallback: fallback.map(owned),
            });
            self
        }

        /// 包含 `marker` 的 prompt 数量
        pub fn calls_matching(&self, marker: &str) -> usize {
            self.prompts
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.contains(marker))
                .count()
        }

        pub fn prompts_matching(&self, marker: &str) -> Vec<String> {
            self.prompts
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.contains(marker))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl TextOracle for RoutingOracle {
        fn name(&self) -> &str {
            "routing"
        }

        async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut routes = self.routes.lock().unwrap();
            let next = routes
                .iter_mut()
                .find(|route| prompt.contains(route.marker))
                .and_then(|route| route.responses.pop_front().or_else(|| route.fallback.clone()));
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(msg)) => Err(OracleError::call_failed("routing", msg)),
                None => Err(OracleError::call_failed("routing", "没有匹配的脚本响应")),
            }
        }
    }
}
