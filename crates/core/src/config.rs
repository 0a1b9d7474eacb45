//! # プロバイダ設定
//!
//! 環境変数からの設定読み込み。コアはAPIキーとRPC URLを不透明な値として扱う。

/// APIキーの環境変数名
pub const ENV_API_KEY: &str = "MAILSIGN_API_KEY";
/// チェーンRPCエンドポイントの環境変数名
pub const ENV_RPC_URL: &str = "MAILSIGN_RPC_URL";
/// 認証・署名サービスのエンドポイントの環境変数名
pub const ENV_AUTH_ENDPOINT: &str = "MAILSIGN_AUTH_ENDPOINT";
/// モックプロバイダ切り替えの環境変数名
pub const ENV_MOCK_MODE: &str = "MOCK_MODE";

const DEFAULT_RPC_URL: &str = "http://localhost:26657";
const DEFAULT_AUTH_ENDPOINT: &str = "http://localhost:8080";

/// セッションプロバイダの構築パラメータ。
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// 公開APIキー
    pub api_key: String,
    /// チェーンRPCエンドポイントURL
    pub rpc_url: String,
    /// 認証・署名サービスのベースURL
    pub auth_endpoint: String,
    /// trueならモックプロバイダを使う（ローカル開発・テスト用）
    pub mock_mode: bool,
}

impl ProviderConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から構築する。未設定の値はデフォルトを使う。
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_key: lookup(ENV_API_KEY).unwrap_or_default(),
            rpc_url: lookup(ENV_RPC_URL).unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            auth_endpoint: lookup(ENV_AUTH_ENDPOINT)
                .unwrap_or_else(|| DEFAULT_AUTH_ENDPOINT.to_string()),
            mock_mode: lookup(ENV_MOCK_MODE).unwrap_or_default() == "true",
        }
    }
}

// APIキーをログに出さない
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("rpc_url", &self.rpc_url)
            .field("auth_endpoint", &self.auth_endpoint)
            .field("mock_mode", &self.mock_mode)
            .finish()
    }
}
