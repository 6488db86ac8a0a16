use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 文本模型（Oracle）错误
    #[error("Oracle错误: {0}")]
    Oracle(#[from] OracleError),
    /// 出题失败
    #[error("出题错误: {0}")]
    Framing(#[from] FramingError),
    /// 文档写入错误
    #[error("文档错误: {0}")]
    Document(#[from] DocumentError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 续写（从 JSON 重新渲染）错误
    #[error("续写错误: {0}")]
    Resume(#[from] ResumeError),
}

/// 文本模型调用错误
#[derive(Debug, Error)]
pub enum OracleError {
    /// API 调用失败
    #[error("模型 API 调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 构建请求失败
    #[error("构建模型请求失败: {source}")]
    RequestBuildFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 调用超时
    #[error("模型调用超时 (模型: {model}, 超时: {secs}秒)")]
    Timeout { model: String, secs: u64 },
    /// 返回内容为空
    #[error("模型返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 出题错误
#[derive(Debug, Error)]
pub enum FramingError {
    /// 重试次数用尽
    #[error("题目 {question_id} 在 {attempts} 次尝试后仍未生成 (想法: {idea_preview}): {last_error}")]
    Exhausted {
        question_id: String,
        attempts: u32,
        idea_preview: String,
        last_error: String,
    },
}

/// 文档写入错误
#[derive(Debug, Error)]
pub enum DocumentError {
    /// 未调用 open 就写入
    #[error("文档尚未初始化，请先调用 open()")]
    NotInitialized,
    /// 重复打开
    #[error("文档已经打开: {path}")]
    AlreadyOpen { path: String },
    /// 关闭之后再调用
    #[error("文档已经关闭")]
    AlreadyClosed,
    /// 底层 IO 失败
    #[error("写入文档失败 ({path}): {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },
    /// 创建目录失败
    #[error("创建目录失败 ({path}): {source}")]
    CreateDirFailed {
        path: String,
        source: std::io::Error,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        source: serde_json::Error,
    },
    /// JSON 序列化失败
    #[error("JSON序列化失败 ({path}): {source}")]
    JsonSerializeFailed {
        path: String,
        source: serde_json::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        source: toml::de::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 续写错误
#[derive(Debug, Error)]
pub enum ResumeError {
    /// JSON 中没有任何题目
    #[error("JSON 文件中没有找到任何题目: {path}")]
    EmptyQuestionSet { path: String },
    /// 无法确定主题或年级
    #[error("缺少{field}，命令行和 JSON 文件中都没有提供")]
    MissingMetadata { field: String },
}

// ========== 便捷构造函数 ==========

impl OracleError {
    /// 创建 API 调用失败错误
    pub fn call_failed(
        model: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        OracleError::ApiCallFailed {
            model: model.into(),
            source: source.into(),
        }
    }
}

impl FileError {
    pub fn read_failed(path: &std::path::Path, source: std::io::Error) -> Self {
        FileError::ReadFailed {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn write_failed(path: &std::path::Path, source: std::io::Error) -> Self {
        FileError::WriteFailed {
            path: path.display().to_string(),
            source,
        }
    }
}
