use crate::error::{Error, Result};
use crate::formatter::FormatterCollection;
use crate::rest::RestApi;
use base64::Engine;
use reqwest::{Client, header};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl Auth {
    fn header_value(&self) -> String {
        match self {
            Auth::Basic { username, password } => {
                let credentials = format!("{}:{}", username, password);
                let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
                format!("Basic {}", encoded)
            }
            Auth::Bearer { token } => format!("Bearer {}", token),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixiConfig {
    pub base_url: String,
    pub auth: Option<Auth>,
    pub timeout: Option<Duration>,
}

impl FixiConfig {
    pub fn new(base_url: impl Into<String>, auth: Option<Auth>) -> Result<Self> {
        let base_url = base_url.into();

        // URLの検証
        let _ = Url::parse(&base_url)
            .map_err(|_| Error::InvalidConfiguration("Invalid base URL".to_string()))?;

        Ok(Self {
            base_url,
            auth,
            timeout: None,
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 環境変数から設定を読み込む
    ///
    /// - `FIXI_URL`（必須）
    /// - `FIXI_TOKEN`、または `FIXI_USER` と `FIXI_PASSWORD`（任意）
    /// - `FIXI_TIMEOUT_SECS`（任意）
    pub fn from_env() -> Result<Self> {
        use std::env;

        let base_url = env::var("FIXI_URL")
            .map_err(|_| Error::ConfigurationMissing("FIXI_URL not found in environment".to_string()))?;

        let auth = match env::var("FIXI_TOKEN") {
            Ok(token) => Some(Auth::Bearer { token }),
            Err(_) => match (env::var("FIXI_USER"), env::var("FIXI_PASSWORD")) {
                (Ok(username), Ok(password)) => Some(Auth::Basic { username, password }),
                (Ok(_), Err(_)) => {
                    return Err(Error::ConfigurationMissing(
                        "FIXI_PASSWORD not found in environment".to_string(),
                    ));
                }
                _ => None,
            },
        };

        let mut config = Self::new(base_url, auth)?;

        if let Ok(secs) = env::var("FIXI_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                Error::InvalidConfiguration(format!("FIXI_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            config = config.timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

/// Fixi APIクライアント
///
/// 内部の `reqwest::Client` とフォーマッター一覧は共有されるため、
/// `clone` して複数タスクから同時に使える。
#[derive(Debug, Clone)]
pub struct FixiClient {
    pub(crate) rest: RestApi,
    pub(crate) config: Arc<FixiConfig>,
}

impl FixiClient {
    pub fn new(config: FixiConfig) -> Result<Self> {
        Self::with_formatters(config, FormatterCollection::default())
    }

    /// レスポンスの読み取りに使うフォーマッターを指定して作成する
    pub fn with_formatters(config: FixiConfig, formatters: FormatterCollection) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        // 読めるメディアタイプだけを要求する
        if let Some(accept) = formatters.accept() {
            headers.insert(
                header::ACCEPT,
                header::HeaderValue::from_str(&accept)
                    .map_err(|_| Error::InvalidConfiguration("Invalid Accept header".to_string()))?,
            );
        }

        // 認証ヘッダーを追加
        if let Some(auth) = &config.auth {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&auth.header_value())
                    .map_err(|_| Error::InvalidConfiguration("Invalid auth header".to_string()))?,
            );
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| Error::InvalidConfiguration(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!(base_url = %config.base_url, formatters = formatters.len(), "Fixi client created");

        Ok(Self {
            rest: RestApi::new(client, config.base_url.clone(), formatters),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &FixiConfig {
        &self.config
    }

    /// 汎用のREST呼び出し
    pub fn rest(&self) -> &RestApi {
        &self.rest
    }
}
