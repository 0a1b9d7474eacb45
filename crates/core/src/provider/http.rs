//! # HTTPプロバイダ
//!
//! JSON/HTTPの認証・署名サービスを使うセッションプロバイダ。
//!
//! ## エンドポイント
//! - `POST /v1/auth/email-otp/start` — ワンタイムコードをメール送信
//! - `POST /v1/auth/email-otp/verify` — コードを検証しセッションを発行
//! - `GET /v1/user/metadata` — 認証済みユーザーのメタデータ
//! - `POST /v1/chain/sign` — 署名リクエストへの署名
//!
//! APIキーは全リクエストの `X-Api-Key` ヘッダで送る。
//! セッショントークンはverify以降 `Authorization: Bearer` で送る。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use mailsign_types::{
    AccountMetadata, ChainSignRequest, OtpStartRequest, OtpStartResponse, OtpVerifyRequest,
    OtpVerifyResponse, SignResult, SigningRequest,
};

use super::{OtpCodeSource, SessionProvider};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// APIキーを送るヘッダ名
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// HTTP経由の認証・署名サービスを使うプロバイダ。
pub struct HttpProvider {
    /// HTTPクライアント
    http_client: reqwest::Client,
    /// 認証・署名サービスのベースURL（末尾スラッシュなし）
    auth_endpoint: String,
    /// チェーンRPCエンドポイント（署名リクエストに添えて送る）
    rpc_url: String,
    /// 公開APIキー
    api_key: String,
    /// ワンタイムコードの入力元
    otp_source: Arc<dyn OtpCodeSource>,
    /// verify後に発行されたセッショントークン
    session_token: RwLock<Option<String>>,
    /// ログインの世代。最新の世代のログインだけがトークンを確定できる
    login_generation: AtomicU64,
}

impl HttpProvider {
    /// 設定を検証してプロバイダを構築する。
    pub async fn initialize(
        config: &ProviderConfig,
        otp_source: Arc<dyn OtpCodeSource>,
    ) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::InvalidConfig("APIキーが設定されていません".into()));
        }
        reqwest::Url::parse(&config.auth_endpoint).map_err(|e| {
            ProviderError::InvalidConfig(format!(
                "認証エンドポイントが不正です ({}): {e}",
                config.auth_endpoint
            ))
        })?;
        reqwest::Url::parse(&config.rpc_url).map_err(|e| {
            ProviderError::InvalidConfig(format!("RPC URLが不正です ({}): {e}", config.rpc_url))
        })?;

        Ok(Self {
            http_client: reqwest::Client::new(),
            auth_endpoint: config.auth_endpoint.trim_end_matches('/').to_string(),
            rpc_url: config.rpc_url.clone(),
            api_key: config.api_key.clone(),
            otp_source,
            session_token: RwLock::new(None),
            login_generation: AtomicU64::new(0),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.auth_endpoint, path)
    }

    async fn current_token(&self) -> Result<String, ProviderError> {
        self.session_token
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NoSession)
    }

    /// リクエストを送り、2xxならJSONとしてパースする。
    async fn send_json<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<R, ProviderError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("HTTP送信失敗 ({path}): {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("レスポンス読み取り失敗 ({path}): {e}")))?;

        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "プロバイダがエラーを返しました");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("{path}: {e}")))
    }

    async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<R, ProviderError> {
        let mut request = self.http_client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.send_json(request, path).await
    }
}

#[async_trait::async_trait]
impl SessionProvider for HttpProvider {
    fn provider_kind(&self) -> &str {
        "http"
    }

    /// start → コード入力 → verify の順でログインする。
    async fn login_with_email_otp(&self, email: &str) -> Result<Option<String>, ProviderError> {
        let generation = {
            let mut token = self.session_token.write().await;
            *token = None;
            self.login_generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let started: OtpStartResponse = self
            .post_json(
                "/v1/auth/email-otp/start",
                &OtpStartRequest {
                    email: email.to_string(),
                },
                None,
            )
            .await?;
        tracing::debug!(request_id = %started.request_id, "ワンタイムコードを送信しました");

        let Some(code) = self.otp_source.read_code(email).await? else {
            tracing::info!("ワンタイムコードの入力が中断されました");
            return Ok(None);
        };

        let verified: OtpVerifyResponse = self
            .post_json(
                "/v1/auth/email-otp/verify",
                &OtpVerifyRequest {
                    request_id: started.request_id,
                    code,
                },
                None,
            )
            .await?;

        match verified.account.filter(|account| !account.is_empty()) {
            Some(account) => {
                let token = verified.session_token.ok_or_else(|| {
                    ProviderError::InvalidResponse("sessionTokenがありません".into())
                })?;
                let mut current = self.session_token.write().await;
                if self.login_generation.load(Ordering::SeqCst) != generation {
                    tracing::info!(generation, "新しいログインが開始されたためセッションを破棄します");
                    return Err(ProviderError::Superseded);
                }
                *current = Some(token);
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    async fn get_metadata(&self) -> Result<AccountMetadata, ProviderError> {
        let token = self.current_token().await?;
        let path = "/v1/user/metadata";
        let request = self.http_client.get(self.url(path)).bearer_auth(token);
        self.send_json(request, path).await
    }

    async fn sign(&self, request: &SigningRequest) -> Result<SignResult, ProviderError> {
        let token = self.current_token().await?;
        let body = ChainSignRequest {
            rpc_url: self.rpc_url.clone(),
            messages: request.messages.clone(),
            fee: request.fee.clone(),
        };
        let result: serde_json::Value = self
            .post_json("/v1/chain/sign", &body, Some(&token))
            .await?;
        Ok(SignResult(result))
    }
}
