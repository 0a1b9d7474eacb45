//! # Mailsign エラー型
//!
//! プロバイダ境界の `ProviderError` と、状態機械境界の `FlowError`。

/// セッションプロバイダのエラー型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// 設定値が不正（APIキー未設定、URL不正）
    #[error("プロバイダ設定が不正です: {0}")]
    InvalidConfig(String),
    /// 通信失敗（接続不可、レスポンス読み取り失敗）
    #[error("プロバイダとの通信に失敗: {0}")]
    Transport(String),
    /// プロバイダがリクエストを拒否した
    #[error("プロバイダがエラーを返しました: HTTP {status} - {body}")]
    Rejected {
        /// HTTPステータスコード
        status: u16,
        /// レスポンス本文
        body: String,
    },
    /// レスポンスのパースに失敗
    #[error("プロバイダのレスポンスが不正です: {0}")]
    InvalidResponse(String),
    /// 認証済みセッションが存在しない
    #[error("認証済みセッションがありません")]
    NoSession,
    /// メタデータに公開アドレスが含まれない
    #[error("公開アドレスを解決できません")]
    MissingAddress,
    /// 後から開始されたログインに置き換えられた（セッションは確定しない）
    #[error("新しいログインに置き換えられました")]
    Superseded,
    /// ユーザーがプロバイダ内で署名を取り消した
    #[error("ユーザーが署名をキャンセルしました")]
    Cancelled,
    /// 内部エラー（シリアライズ失敗等）
    #[error("内部エラー: {0}")]
    Internal(String),
}

/// 認証・署名フローのエラー型。
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// プロバイダの構築に失敗（起動時の回復不能エラー）
    #[error("プロバイダの初期化に失敗: {0}")]
    Initialization(#[source] ProviderError),
    /// 初期化は一度しか行えない
    #[error("プロバイダは初期化済みです")]
    AlreadyInitialized,
    /// プロバイダが未初期化
    #[error("プロバイダが初期化されていません")]
    NotInitialized,
    /// 既に認証済み（ログアウトはサポートしない）
    #[error("既に認証済みです: {account}")]
    AlreadyAuthenticated {
        /// 認証済みアカウント識別子
        account: String,
    },
    /// 未認証状態で署名しようとした
    #[error("認証されていません")]
    NotAuthenticated,
    /// ログイン中にプロバイダがエラーを返した
    #[error("ログインに失敗: {0}")]
    Provider(#[source] ProviderError),
    /// 署名者アドレスの解決に失敗
    #[error("署名者アドレスの解決に失敗: {0}")]
    Metadata(#[source] ProviderError),
    /// 署名操作が失敗した（プロバイダのエラーをそのまま保持）
    #[error("署名に失敗: {0}")]
    Signing(#[source] ProviderError),
}

impl FlowError {
    /// プロバイダ由来のエラーであればその内容を返す。
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            FlowError::Initialization(e)
            | FlowError::Provider(e)
            | FlowError::Metadata(e)
            | FlowError::Signing(e) => Some(e),
            _ => None,
        }
    }
}
