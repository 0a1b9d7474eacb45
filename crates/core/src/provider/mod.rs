//! # セッションプロバイダ抽象化
//!
//! 外部のウォレット・認証プロバイダを狭いケイパビリティインターフェースで抽象化する。
//! 設定値 `mock_mode`（環境変数 `MOCK_MODE`）で実装を切り替える。
//!
//! 現在のプロバイダ実装:
//! - `mock` — ローカル開発・テスト用（メモリ内鍵生成、呼び出し記録）
//! - `http` — JSON/HTTPの認証・署名サービス

pub mod http;
pub mod mock;

pub use http::HttpProvider;
pub use mock::{MockProvider, ProviderCall};

use std::sync::Arc;

use mailsign_types::{AccountMetadata, SignResult, SigningRequest};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// セッションプロバイダのトレイト。
///
/// ログイン・メタデータ取得・署名はいずれも非同期で、呼び出し元のフローを中断させる。
/// 認証済みセッションそのものはプロバイダ内部に保持される。
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// プロバイダ種別を返す（ログ出力用）。
    fn provider_kind(&self) -> &str;

    /// メールアドレスとワンタイムコードでログインする。
    ///
    /// 認証されたアカウント識別子を返す。ログイン失敗・中断時は `Ok(None)`。
    ///
    /// 完了前に別のログインが開始された場合、このログインはセッションを確定させずに
    /// `ProviderError::Superseded` を返す。セッションは常に最後に開始されたログインのもの。
    async fn login_with_email_otp(&self, email: &str) -> Result<Option<String>, ProviderError>;

    /// 認証済みユーザーのメタデータを取得する。
    async fn get_metadata(&self) -> Result<AccountMetadata, ProviderError>;

    /// 署名者アドレスを解決する。空のアドレスは解決失敗とみなす。
    async fn get_address(&self) -> Result<String, ProviderError> {
        let metadata = self.get_metadata().await?;
        if metadata.public_address.is_empty() {
            return Err(ProviderError::MissingAddress);
        }
        Ok(metadata.public_address)
    }

    /// 署名リクエストに署名する。結果は解釈せずに返す。
    async fn sign(&self, request: &SigningRequest) -> Result<SignResult, ProviderError>;
}

/// ワンタイムコードの入力元。
///
/// HTTPプロバイダはコード送信後にこれを呼び出し、ユーザーからコードを受け取る。
/// `Ok(None)` はユーザーがログインを中断したことを表す。
#[async_trait::async_trait]
pub trait OtpCodeSource: Send + Sync {
    /// `email` 宛てに送信されたコードを取得する。
    async fn read_code(&self, email: &str) -> Result<Option<String>, ProviderError>;
}

/// 設定に従ってプロバイダを構築する。
///
/// `mock_mode` ならモック、それ以外はHTTPプロバイダ。
pub async fn initialize(
    config: ProviderConfig,
    otp_source: Arc<dyn OtpCodeSource>,
) -> Result<Arc<dyn SessionProvider>, ProviderError> {
    if config.mock_mode {
        tracing::info!("MockProviderで起動します");
        return Ok(Arc::new(MockProvider::new()));
    }

    tracing::info!(auth_endpoint = %config.auth_endpoint, "HttpProviderで起動します");
    let provider = HttpProvider::initialize(&config, otp_source).await?;
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCode;

    #[async_trait::async_trait]
    impl OtpCodeSource for NoCode {
        async fn read_code(&self, _email: &str) -> Result<Option<String>, ProviderError> {
            Ok(None)
        }
    }

    fn config(mock_mode: bool, api_key: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.to_string(),
            rpc_url: "http://localhost:26657".to_string(),
            auth_endpoint: "http://localhost:8080".to_string(),
            mock_mode,
        }
    }

    #[tokio::test]
    async fn test_initialize_mock_mode() {
        let provider = initialize(config(true, ""), Arc::new(NoCode)).await.unwrap();
        assert_eq!(provider.provider_kind(), "mock");
    }

    #[tokio::test]
    async fn test_initialize_http_mode() {
        let provider = initialize(config(false, "pk_test"), Arc::new(NoCode))
            .await
            .unwrap();
        assert_eq!(provider.provider_kind(), "http");
    }

    /// APIキー未設定のHTTPプロバイダは構築に失敗する
    #[tokio::test]
    async fn test_initialize_http_without_api_key_fails() {
        let result = initialize(config(false, ""), Arc::new(NoCode)).await;
        assert!(matches!(result, Err(ProviderError::InvalidConfig(_))));
    }

    /// デフォルトのget_addressが空アドレスをエラーにすることを確認
    #[tokio::test]
    async fn test_get_address_rejects_empty_address() {
        struct EmptyAddress;

        #[async_trait::async_trait]
        impl SessionProvider for EmptyAddress {
            fn provider_kind(&self) -> &str {
                "empty"
            }
            async fn login_with_email_otp(
                &self,
                _email: &str,
            ) -> Result<Option<String>, ProviderError> {
                Ok(None)
            }
            async fn get_metadata(&self) -> Result<AccountMetadata, ProviderError> {
                Ok(AccountMetadata {
                    public_address: String::new(),
                    email: None,
                    issuer: None,
                })
            }
            async fn sign(&self, _request: &SigningRequest) -> Result<SignResult, ProviderError> {
                Err(ProviderError::NoSession)
            }
        }

        let result = EmptyAddress.get_address().await;
        assert_eq!(result, Err(ProviderError::MissingAddress));
    }
}
