use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, FileError};

/// 校验器自身失败（模型报错 / 返回无法解析）时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ValidatorFailurePolicy {
    /// 视为通过，保证流程不会卡死
    #[default]
    FailOpen,
    /// 视为不通过，交给控制器重新出题
    FailClosed,
}

impl FromStr for ValidatorFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-open" | "open" => Ok(Self::FailOpen),
            "fail-closed" | "closed" => Ok(Self::FailClosed),
            other => Err(format!("未知的校验失败策略: {}", other)),
        }
    }
}

/// 程序配置
///
/// 一次运行内有效，构造时显式传给各个组件
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    /// 单次模型调用超时（秒）
    pub oracle_timeout_secs: u64,
    // --- 输出 ---
    /// 输出目录（tex / json / images）
    pub output_dir: PathBuf,
    /// 试卷科目（写入 \setsubject）
    pub subject: String,
    // --- 生成循环 ---
    /// 循环安全上限
    pub max_iterations: usize,
    /// 单题出题重试次数
    pub framing_attempts: u32,
    /// 单题校验回环次数
    pub validation_attempts: u32,
    /// 想法生成重试次数
    pub idea_fetch_attempts: u32,
    /// 想法用完后最多补充几批
    pub max_idea_refreshes: usize,
    /// 重试间隔（毫秒）
    pub retry_backoff_ms: u64,
    pub validator_failure_policy: ValidatorFailurePolicy,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_temperature: 0.7,
            llm_max_tokens: 2048,
            oracle_timeout_secs: 90,
            output_dir: PathBuf::from("question_paper"),
            subject: "Mathematics".to_string(),
            max_iterations: 200,
            framing_attempts: 3,
            validation_attempts: 5,
            idea_fetch_attempts: 2,
            max_idea_refreshes: 3,
            retry_backoff_ms: 500,
            validator_failure_policy: ValidatorFailurePolicy::FailOpen,
            verbose_logging: false,
        }
    }
}

/// TOML 配置文件，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub llm_api_key: Option<String>,
    pub llm_api_base_url: Option<String>,
    pub llm_model_name: Option<String>,
    pub llm_temperature: Option<f32>,
    pub llm_max_tokens: Option<u32>,
    pub oracle_timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub subject: Option<String>,
    pub max_iterations: Option<usize>,
    pub framing_attempts: Option<u32>,
    pub validation_attempts: Option<u32>,
    pub idea_fetch_attempts: Option<u32>,
    pub max_idea_refreshes: Option<usize>,
    pub retry_backoff_ms: Option<u64>,
    pub validator_failure_policy: Option<ValidatorFailurePolicy>,
    pub verbose_logging: Option<bool>,
}

impl Config {
    /// 默认值 → 配置文件（可选）→ 环境变量
    pub fn load(config_file: Option<&Path>) -> Result<Self, crate::error::AppError> {
        let mut config = Self::default();
        if let Some(path) = config_file {
            let content =
                std::fs::read_to_string(path).map_err(|e| FileError::read_failed(path, e))?;
            let file_config: FileConfig =
                toml::from_str(&content).map_err(|e| FileError::TomlParseFailed {
                    path: path.display().to_string(),
                    source: e,
                })?;
            config.apply_file(file_config);
        }
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 只读取环境变量（不读配置文件）
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_file(&mut self, file: FileConfig) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = file.$field { self.$field = v; })*
            };
        }
        take!(
            llm_api_key,
            llm_api_base_url,
            llm_model_name,
            llm_temperature,
            llm_max_tokens,
            oracle_timeout_secs,
            output_dir,
            subject,
            max_iterations,
            framing_attempts,
            validation_attempts,
            idea_fetch_attempts,
            max_idea_refreshes,
            retry_backoff_ms,
            validator_failure_policy,
            verbose_logging,
        );
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("LLM_API_KEY") {
            self.llm_api_key = v;
        }
        if let Ok(v) = std::env::var("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }
        if let Ok(v) = std::env::var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PAPER_SUBJECT") {
            self.subject = v;
        }
        self.llm_temperature = env_parse("LLM_TEMPERATURE", self.llm_temperature)?;
        self.llm_max_tokens = env_parse("LLM_MAX_TOKENS", self.llm_max_tokens)?;
        self.oracle_timeout_secs = env_parse("ORACLE_TIMEOUT_SECS", self.oracle_timeout_secs)?;
        self.max_iterations = env_parse("MAX_ITERATIONS", self.max_iterations)?;
        self.framing_attempts = env_parse("FRAMING_ATTEMPTS", self.framing_attempts)?;
        self.validation_attempts = env_parse("VALIDATION_ATTEMPTS", self.validation_attempts)?;
        self.idea_fetch_attempts = env_parse("IDEA_FETCH_ATTEMPTS", self.idea_fetch_attempts)?;
        self.max_idea_refreshes = env_parse("MAX_IDEA_REFRESHES", self.max_idea_refreshes)?;
        self.retry_backoff_ms = env_parse("RETRY_BACKOFF_MS", self.retry_backoff_ms)?;
        self.validator_failure_policy =
            env_parse("VALIDATOR_FAILURE_POLICY", self.validator_failure_policy)?;
        self.verbose_logging = env_parse("VERBOSE_LOGGING", self.verbose_logging)?;
        Ok(())
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_iterations", self.max_iterations as u64),
            ("framing_attempts", self.framing_attempts as u64),
            ("validation_attempts", self.validation_attempts as u64),
            ("idea_fetch_attempts", self.idea_fetch_attempts as u64),
            ("oracle_timeout_secs", self.oracle_timeout_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "必须大于 0".to_string(),
                });
            }
        }
        Ok(())
    }

    /// 生成阶段必须有 API Key
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::EnvVarNotFound {
                var_name: "LLM_API_KEY".to_string(),
            });
        }
        Ok(&self.llm_api_key)
    }

    /// 两次模型调用重试之间的等待
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn env_parse<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_generation_limits() {
        let config = Config::default();
        assert_eq!(config.max_iterations, 200);
        assert_eq!(config.framing_attempts, 3);
        assert_eq!(config.validation_attempts, 5);
        assert_eq!(config.validator_failure_policy, ValidatorFailurePolicy::FailOpen);
    }

    #[test]
    fn test_file_config_overrides_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            llm_model_name = "gemini-2.5-flash-lite"
            max_iterations = 50
            validator_failure_policy = "fail-closed"
            output_dir = "out"
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_file(file);

        assert_eq!(config.llm_model_name, "gemini-2.5-flash-lite");
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.validator_failure_policy, ValidatorFailurePolicy::FailClosed);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        // 未出现的字段保持默认
        assert_eq!(config.framing_attempts, 3);
    }

    #[test]
    fn test_file_config_rejects_unknown_fields() {
        let result: Result<FileConfig, _> = toml::from_str("max_iteration = 5");
        assert!(result.is_err());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "fail_closed".parse::<ValidatorFailurePolicy>().unwrap(),
            ValidatorFailurePolicy::FailClosed
        );
        assert_eq!(
            "OPEN".parse::<ValidatorFailurePolicy>().unwrap(),
            ValidatorFailurePolicy::FailOpen
        );
        assert!("maybe".parse::<ValidatorFailurePolicy>().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = Config {
            framing_attempts: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_require_api_key() {
        let config = Config::default();
        assert!(config.require_api_key().is_err());

        let config = Config {
            llm_api_key: "sk-test".to_string(),
            ..Config::default()
        };
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }
}
