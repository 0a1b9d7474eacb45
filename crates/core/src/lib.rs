//! # Mailsign Core
//!
//! パスワードレス（メールOTP）ログインから署名までのクライアント側フローを実装する。
//!
//! ## 処理フロー
//! 1. セッションプロバイダを構築する（`Uninitialized` → `Unauthenticated`）
//! 2. メールアドレスでログインする（`Authenticating` → `Authenticated`）
//! 3. 署名者アドレスを解決し、署名リクエストを構築する
//! 4. プロバイダの署名機能に渡し、結果をそのまま返す

pub mod builder;
pub mod config;
pub mod error;
pub mod machine;
pub mod provider;

pub use builder::build_signing_request;
pub use config::ProviderConfig;
pub use error::{FlowError, ProviderError};
pub use machine::{AuthMachine, AuthState, LoginFailure, Screen};
pub use provider::{HttpProvider, MockProvider, OtpCodeSource, ProviderCall, SessionProvider};

pub use mailsign_types as types;
