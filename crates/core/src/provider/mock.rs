//! # ローカル開発用モックプロバイダ
//!
//! 認証サービスが利用できない開発環境で使用するモック実装。
//! メモリ内でEd25519鍵を生成し、署名リクエストの正規バイト列にローカルで署名する。
//! すべての呼び出しを記録するため、テストでプロバイダへのトラフィックを検証できる。
//! `with_per_email_accounts` を指定するとメールごとに別の鍵（別のアドレス）を使う。

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, Notify, RwLock};

use mailsign_types::{AccountMetadata, SignResult, SigningRequest};

use super::SessionProvider;
use crate::error::ProviderError;

/// モックアドレスのプレフィックス
const ADDRESS_PREFIX: &str = "cosmos1";

/// モックプロバイダが受けた呼び出し。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// login_with_email_otp
    Login {
        /// ログインに使われたメールアドレス
        email: String,
    },
    /// get_metadata
    GetMetadata,
    /// sign
    Sign {
        /// 渡された署名リクエスト
        request: SigningRequest,
    },
}

/// ログイン呼び出しの振る舞い。
#[derive(Debug, Clone)]
enum LoginBehavior {
    /// 許可リストに含まれるメールを受け入れる
    Accept,
    /// 常にアイデンティティなしで返す
    Reject,
    /// 常にエラーを返す
    Fail(ProviderError),
}

/// モックセッションプロバイダ。ローカル開発・テスト用。
pub struct MockProvider {
    /// Ed25519署名鍵（メモリ内生成）
    signing_key: SigningKey,
    /// ログインの振る舞い
    login: LoginBehavior,
    /// ログインを許可するメール（Noneなら全て許可）
    allowed_emails: Option<HashSet<String>>,
    /// ログイン完了を保留するゲート（Noneなら即時完了）
    login_gate: Option<Arc<Notify>>,
    /// get_metadataが返すエラー
    metadata_error: Option<ProviderError>,
    /// signが返すエラー
    sign_error: Option<ProviderError>,
    /// メールごとに鍵を導出するか
    per_email_accounts: bool,
    /// ログイン済みのメール
    session: RwLock<Option<String>>,
    /// ログインの世代。最新の世代のログインだけがセッションを確定できる
    login_generation: AtomicU64,
    /// 呼び出し記録
    calls: Mutex<Vec<ProviderCall>>,
}

impl MockProvider {
    /// ランダムな鍵でMockProviderを初期化する。
    pub fn new() -> Self {
        Self::with_signing_key(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// 固定シードから初期化する（アドレスが決定的になる）。
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::with_signing_key(SigningKey::from_bytes(&seed))
    }

    fn with_signing_key(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            login: LoginBehavior::Accept,
            allowed_emails: None,
            login_gate: None,
            metadata_error: None,
            sign_error: None,
            per_email_accounts: false,
            session: RwLock::new(None),
            login_generation: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 指定したメールだけログインを許可する。
    pub fn with_allowed_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_emails = Some(emails.into_iter().map(Into::into).collect());
        self
    }

    /// すべてのログインをアイデンティティなしで返す。
    pub fn rejecting_logins(mut self) -> Self {
        self.login = LoginBehavior::Reject;
        self
    }

    /// すべてのログインをエラーにする。
    pub fn failing_logins(mut self, error: ProviderError) -> Self {
        self.login = LoginBehavior::Fail(error);
        self
    }

    /// `gate` が通知されるまでログインを完了させない。
    pub fn with_login_gate(mut self, gate: Arc<Notify>) -> Self {
        self.login_gate = Some(gate);
        self
    }

    /// get_metadataをエラーにする。
    pub fn failing_metadata(mut self, error: ProviderError) -> Self {
        self.metadata_error = Some(error);
        self
    }

    /// signをエラーにする。
    pub fn failing_sign(mut self, error: ProviderError) -> Self {
        self.sign_error = Some(error);
        self
    }

    /// メールごとに別の鍵を導出する（鍵 = SHA-256(基本鍵 || メール)）。
    pub fn with_per_email_accounts(mut self) -> Self {
        self.per_email_accounts = true;
        self
    }

    /// このプロバイダの基本鍵のアカウントアドレス。
    ///
    /// `cosmos1` + SHA-256(公開鍵)の先頭20バイトのhex。
    pub fn address(&self) -> String {
        address_of(&self.signing_key)
    }

    /// `email` でログインした場合のアカウントアドレス。
    pub fn address_for(&self, email: &str) -> String {
        address_of(&self.key_for(email))
    }

    fn key_for(&self, email: &str) -> SigningKey {
        if !self.per_email_accounts {
            return self.signing_key.clone();
        }
        let seed: [u8; 32] = Sha256::new()
            .chain_update(self.signing_key.to_bytes())
            .chain_update(email.as_bytes())
            .finalize()
            .into();
        SigningKey::from_bytes(&seed)
    }

    /// これまでの呼び出し記録を返す。
    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: ProviderCall) {
        self.calls.lock().await.push(call);
    }

    async fn logged_in_email(&self) -> Result<String, ProviderError> {
        self.session.read().await.clone().ok_or(ProviderError::NoSession)
    }
}

fn address_of(key: &SigningKey) -> String {
    let digest = Sha256::digest(key.verifying_key().as_bytes());
    format!("{ADDRESS_PREFIX}{}", hex::encode(&digest[..20]))
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionProvider for MockProvider {
    fn provider_kind(&self) -> &str {
        "mock"
    }

    async fn login_with_email_otp(&self, email: &str) -> Result<Option<String>, ProviderError> {
        self.record(ProviderCall::Login {
            email: email.to_string(),
        })
        .await;

        let generation = {
            let mut session = self.session.write().await;
            *session = None;
            self.login_generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        if let Some(gate) = &self.login_gate {
            gate.notified().await;
        }

        match &self.login {
            LoginBehavior::Fail(error) => Err(error.clone()),
            LoginBehavior::Reject => Ok(None),
            LoginBehavior::Accept => {
                if let Some(allowed) = &self.allowed_emails {
                    if !allowed.contains(email) {
                        tracing::debug!(email, "許可リストにないメールのためログインを拒否");
                        return Ok(None);
                    }
                }
                let mut session = self.session.write().await;
                if self.login_generation.load(Ordering::SeqCst) != generation {
                    tracing::debug!(email, generation, "新しいログインに置き換えられました");
                    return Err(ProviderError::Superseded);
                }
                *session = Some(email.to_string());
                Ok(Some(self.address_for(email)))
            }
        }
    }

    async fn get_metadata(&self) -> Result<AccountMetadata, ProviderError> {
        self.record(ProviderCall::GetMetadata).await;

        if let Some(error) = &self.metadata_error {
            return Err(error.clone());
        }
        let email = self.logged_in_email().await?;
        let key = self.key_for(&email);

        Ok(AccountMetadata {
            public_address: address_of(&key),
            email: Some(email),
            issuer: Some(format!(
                "did:mock:{}",
                hex::encode(key.verifying_key().as_bytes())
            )),
        })
    }

    /// 署名リクエストの正規バイト列にEd25519で署名する。
    async fn sign(&self, request: &SigningRequest) -> Result<SignResult, ProviderError> {
        self.record(ProviderCall::Sign {
            request: request.clone(),
        })
        .await;

        if let Some(error) = &self.sign_error {
            return Err(error.clone());
        }
        let key = self.key_for(&self.logged_in_email().await?);

        let sign_bytes = request
            .canonical_bytes()
            .map_err(|e| ProviderError::Internal(format!("署名対象のシリアライズに失敗: {e}")))?;
        let signature = key.sign(&sign_bytes);
        let b64 = base64::engine::general_purpose::STANDARD;

        Ok(SignResult(serde_json::json!({
            "signature": b64.encode(signature.to_bytes()),
            "pub_key": {
                "type": "tendermint/PubKeyEd25519",
                "value": b64.encode(key.verifying_key().as_bytes()),
            },
            "signed": request,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_signing_request;
    use ed25519_dalek::{Signature, Verifier};

    #[tokio::test]
    async fn test_login_returns_address() {
        let provider = MockProvider::from_seed([7u8; 32]);
        let account = provider.login_with_email_otp("a@b.com").await.unwrap();
        assert_eq!(account, Some(provider.address()));
        assert!(provider.address().starts_with("cosmos1"));
        assert_eq!(provider.address().len(), "cosmos1".len() + 40);
    }

    /// 同じシードからは同じアドレスが得られることを確認
    #[test]
    fn test_address_is_deterministic_for_seed() {
        let a = MockProvider::from_seed([1u8; 32]);
        let b = MockProvider::from_seed([1u8; 32]);
        let c = MockProvider::from_seed([2u8; 32]);
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }

    #[tokio::test]
    async fn test_allow_list_rejects_unknown_email() {
        let provider = MockProvider::new().with_allowed_emails(["ok@b.com"]);
        assert_eq!(provider.login_with_email_otp("nope@b.com").await, Ok(None));
        assert!(provider.login_with_email_otp("ok@b.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_metadata_requires_session() {
        let provider = MockProvider::new();
        assert_eq!(provider.get_metadata().await, Err(ProviderError::NoSession));

        provider.login_with_email_otp("a@b.com").await.unwrap();
        let metadata = provider.get_metadata().await.unwrap();
        assert_eq!(metadata.public_address, provider.address());
        assert_eq!(metadata.email.as_deref(), Some("a@b.com"));
    }

    /// 署名結果の署名が公開鍵で検証できることを確認
    #[tokio::test]
    async fn test_sign_verifies_with_public_key() {
        let provider = MockProvider::new();
        provider.login_with_email_otp("a@b.com").await.unwrap();

        let request = build_signing_request("hello", &provider.address());
        let result = provider.sign(&request).await.unwrap();

        let b64 = base64::engine::general_purpose::STANDARD;
        let sig_bytes: [u8; 64] = b64
            .decode(result.as_json()["signature"].as_str().unwrap())
            .unwrap()
            .try_into()
            .unwrap();
        let signature = Signature::from_bytes(&sig_bytes);

        provider
            .signing_key
            .verifying_key()
            .verify(&request.canonical_bytes().unwrap(), &signature)
            .unwrap();
        assert_eq!(result.as_json()["signed"], serde_json::to_value(&request).unwrap());
    }

    #[tokio::test]
    async fn test_configured_failures() {
        let provider = MockProvider::new()
            .failing_metadata(ProviderError::Transport("down".into()))
            .failing_sign(ProviderError::Cancelled);
        provider.login_with_email_otp("a@b.com").await.unwrap();

        assert_eq!(
            provider.get_metadata().await,
            Err(ProviderError::Transport("down".into()))
        );
        let request = build_signing_request("x", "cosmos1abc");
        assert_eq!(provider.sign(&request).await, Err(ProviderError::Cancelled));
    }

    #[tokio::test]
    async fn test_calls_are_recorded_in_order() {
        let provider = MockProvider::new();
        provider.login_with_email_otp("a@b.com").await.unwrap();
        provider.get_metadata().await.unwrap();
        let request = build_signing_request("x", &provider.address());
        provider.sign(&request).await.unwrap();

        assert_eq!(
            provider.calls().await,
            vec![
                ProviderCall::Login {
                    email: "a@b.com".to_string()
                },
                ProviderCall::GetMetadata,
                ProviderCall::Sign { request },
            ]
        );
    }

    /// ゲートが通知されるまでログインが完了しないことを確認
    #[tokio::test]
    async fn test_login_gate_holds_login() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(MockProvider::new().with_login_gate(gate.clone()));

        let task = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.login_with_email_otp("a@b.com").await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!task.is_finished());

        gate.notify_one();
        let account = task.await.unwrap().unwrap();
        assert_eq!(account, Some(provider.address()));
    }

    #[tokio::test]
    async fn test_per_email_accounts() {
        let provider = MockProvider::from_seed([3u8; 32]).with_per_email_accounts();
        assert_ne!(provider.address_for("a@b.com"), provider.address_for("c@d.com"));

        let account = provider.login_with_email_otp("c@d.com").await.unwrap();
        assert_eq!(account, Some(provider.address_for("c@d.com")));
        assert_eq!(
            provider.get_address().await.unwrap(),
            provider.address_for("c@d.com")
        );
    }

    /// 後から開始されたログインがあると、古いログインはセッションを確定させない
    #[tokio::test]
    async fn test_stale_login_is_superseded() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(
            MockProvider::new()
                .with_per_email_accounts()
                .with_login_gate(gate.clone()),
        );

        let first = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.login_with_email_otp("first@b.com").await })
        };
        let second = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.login_with_email_otp("second@b.com").await })
        };
        while provider.calls().await.len() < 2 {
            tokio::task::yield_now().await;
        }

        gate.notify_one();
        assert_eq!(first.await.unwrap(), Err(ProviderError::Superseded));
        gate.notify_one();
        assert_eq!(
            second.await.unwrap(),
            Ok(Some(provider.address_for("second@b.com")))
        );
        assert_eq!(
            provider.get_address().await.unwrap(),
            provider.address_for("second@b.com")
        );
    }
}
