//! # 認証状態機械
//!
//! プロバイダの構築からメールOTPログイン、署名までのライフサイクルを管理する。
//!
//! ## 状態遷移
//! 1. `Uninitialized` — プロバイダ構築中
//! 2. `Unauthenticated` — 構築完了。ログインフォームを受付
//! 3. `Authenticating(email)` — プロバイダのログイン完了待ち
//! 4. `Authenticated(account)` — 署名を受付（ログアウトはない）
//!
//! 現在の状態は `tokio::sync::watch` で公開し、描画側は購読またはポーリングする。

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, OnceCell};

use mailsign_types::SignResult;

use crate::builder::build_signing_request;
use crate::error::{FlowError, ProviderError};
use crate::provider::SessionProvider;

/// ログインが失敗した理由。`Unauthenticated` に添えて公開する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// プロバイダがアイデンティティを返さなかった（失敗または中断）
    NoIdentity,
    /// ログイン中にプロバイダがエラーを返した
    Provider(String),
}

/// 認証状態。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// プロバイダ構築中
    Uninitialized,
    /// 未認証。直前のログインが失敗していればその理由を持つ
    Unauthenticated {
        /// 直前のログイン失敗理由
        last_failure: Option<LoginFailure>,
    },
    /// ログイン処理中
    Authenticating {
        /// ログイン中のメールアドレス
        email: String,
    },
    /// 認証済み
    Authenticated {
        /// プロバイダが返したアカウント識別子
        account: String,
    },
}

/// 描画側が状態ごとに表示する画面。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// 初期化中インジケータ
    Initializing,
    /// メールアドレス入力フォーム
    LoginForm,
    /// ローディングインジケータ
    Loading,
    /// メッセージ署名フォーム
    SignForm,
}

impl AuthState {
    /// 状態に対応する画面。
    pub fn screen(&self) -> Screen {
        match self {
            AuthState::Uninitialized => Screen::Initializing,
            AuthState::Unauthenticated { .. } => Screen::LoginForm,
            AuthState::Authenticating { .. } => Screen::Loading,
            AuthState::Authenticated { .. } => Screen::SignForm,
        }
    }

    /// 認証済みならアカウント識別子を返す。
    pub fn account(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { account } => Some(account),
            _ => None,
        }
    }
}

/// 認証状態機械。セッションハンドルを排他的に所有する。
pub struct AuthMachine {
    /// 現在の状態（購読可能）
    state_tx: watch::Sender<AuthState>,
    /// 構築済みのプロバイダ（一度だけ設定される。構築は直列化される）
    provider: OnceCell<Arc<dyn SessionProvider>>,
    /// ログイン試行の世代。古い試行の結果を破棄するのに使う
    attempt: AtomicU64,
}

impl AuthMachine {
    /// `Uninitialized` 状態で作成する。
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(AuthState::Uninitialized);
        Self {
            state_tx,
            provider: OnceCell::new(),
            attempt: AtomicU64::new(0),
        }
    }

    /// 現在の状態のスナップショット。
    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// 状態変化を購読する。
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// プロバイダを構築し、`Unauthenticated` に遷移する。
    ///
    /// 遷移は一度だけ。構築に失敗した場合は `Uninitialized` のまま。
    /// 並行して呼ばれた場合、後の呼び出しは先の構築の完了を待ち、
    /// 先の構築が失敗していれば自分の構築を試みる。
    pub async fn initialize<F>(&self, construct: F) -> Result<AuthState, FlowError>
    where
        F: Future<Output = Result<Arc<dyn SessionProvider>, ProviderError>>,
    {
        if self.provider.initialized() {
            return Err(FlowError::AlreadyInitialized);
        }

        let mut constructed = false;
        let ran = &mut constructed;
        let provider = self
            .provider
            .get_or_try_init(move || async move {
                *ran = true;
                tracing::info!("プロバイダを初期化中...");
                construct.await
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "プロバイダの初期化に失敗");
                FlowError::Initialization(e)
            })?;
        if !constructed {
            return Err(FlowError::AlreadyInitialized);
        }

        let kind = provider.provider_kind().to_string();
        let next = AuthState::Unauthenticated { last_failure: None };
        self.state_tx.send_replace(next.clone());
        tracing::info!(provider = %kind, "初期化完了");
        Ok(next)
    }

    /// メールアドレスでログインする。
    ///
    /// 空白のみのメールは何もしない（状態変化もプロバイダ呼び出しもない）。
    /// ログイン中に再度呼ばれた場合は新しい試行が優先され、古い試行の結果は破棄される。
    pub async fn connect(&self, email: &str) -> Result<AuthState, FlowError> {
        if email.trim().is_empty() {
            tracing::debug!("空のメールアドレスは無視します");
            return Ok(self.state());
        }

        let provider = self.provider.get().cloned().ok_or(FlowError::NotInitialized)?;

        let mut rejected = None;
        let mut attempt = 0;
        self.state_tx.send_if_modified(|state| match state {
            AuthState::Uninitialized => {
                rejected = Some(FlowError::NotInitialized);
                false
            }
            AuthState::Authenticated { account } => {
                rejected = Some(FlowError::AlreadyAuthenticated {
                    account: account.clone(),
                });
                false
            }
            AuthState::Unauthenticated { .. } | AuthState::Authenticating { .. } => {
                attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;
                *state = AuthState::Authenticating {
                    email: email.to_string(),
                };
                true
            }
        });
        if let Some(e) = rejected {
            return Err(e);
        }

        tracing::info!(email, attempt, "ログインを開始");
        let outcome = provider.login_with_email_otp(email).await;

        let next = match &outcome {
            Ok(Some(account)) if !account.is_empty() => AuthState::Authenticated {
                account: account.clone(),
            },
            Ok(_) => AuthState::Unauthenticated {
                last_failure: Some(LoginFailure::NoIdentity),
            },
            Err(e) => AuthState::Unauthenticated {
                last_failure: Some(LoginFailure::Provider(e.to_string())),
            },
        };

        let applied = self.state_tx.send_if_modified(|state| {
            if self.attempt.load(Ordering::SeqCst) != attempt
                || !matches!(state, AuthState::Authenticating { .. })
            {
                return false;
            }
            *state = next.clone();
            true
        });

        if !applied {
            tracing::info!(attempt, "新しいログイン試行があるため結果を破棄します");
            return Ok(self.state());
        }

        match outcome {
            Err(e) => {
                tracing::warn!(error = %e, "ログイン中にプロバイダがエラーを返しました");
                Err(FlowError::Provider(e))
            }
            Ok(_) => {
                match &next {
                    AuthState::Authenticated { account } => {
                        tracing::info!(account = %account, "認証完了");
                    }
                    _ => tracing::info!("ログインに失敗しました（アイデンティティなし）"),
                }
                Ok(next)
            }
        }
    }

    /// メッセージに署名する。
    ///
    /// 署名者アドレスを解決してから署名リクエストを構築し、プロバイダの署名を一度だけ呼ぶ。
    /// 失敗は再試行せずにそのまま返す。
    pub async fn sign(&self, message: &str) -> Result<SignResult, FlowError> {
        let account = self
            .state_tx
            .borrow()
            .account()
            .map(str::to_string)
            .ok_or(FlowError::NotAuthenticated)?;
        let provider = self.provider.get().cloned().ok_or(FlowError::NotInitialized)?;

        let signer = provider.get_address().await.map_err(|e| {
            tracing::error!(error = %e, "署名者アドレスの解決に失敗");
            FlowError::Metadata(e)
        })?;
        if signer != account {
            tracing::debug!(account = %account, signer = %signer, "アカウント識別子と署名者アドレスが異なります");
        }

        let request = build_signing_request(message, &signer);
        tracing::debug!(signer = %signer, data_len = message.len(), "署名リクエストを送信");

        let result = provider.sign(&request).await.map_err(|e| {
            tracing::warn!(error = %e, "署名に失敗");
            FlowError::Signing(e)
        })?;

        tracing::info!(result = %result.as_json(), "署名完了");
        Ok(result)
    }
}

impl Default for AuthMachine {
    fn default() -> Self {
        Self::new()
    }
}
