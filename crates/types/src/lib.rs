//! # Mailsign 共有型定義
//!
//! 署名リクエスト・手数料記述子・アカウントメタデータ・HTTPプロバイダの
//! ワイヤ形式をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - JSONフィールド名はcamelCase（`typeUrl`, `publicAddress` 等）
//! - 署名結果はプロバイダ依存の不透明なJSONとして保持する

use serde::{Deserialize, Serialize};

/// オフチェーン署名メッセージの型URL（固定値）。
pub const MSG_SIGN_DATA_TYPE_URL: &str = "/cosmos.offchain.v1alpha1.MsgSignData";

/// このフローで使用するガス値（手数料見積もりは行わない）。
pub const ZERO_GAS: &str = "0";

// ---------------------------------------------------------------------------
// 署名リクエスト
// ---------------------------------------------------------------------------

/// MsgSignDataの値部分。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDataValue {
    /// 署名者アドレス（認証済みセッションの公開アドレスと一致する）
    pub signer: String,
    /// ユーザーが入力した任意のデータ（検証・エスケープしない）
    pub data: String,
}

/// 型URL付きのメッセージ記述子。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignDataMessage {
    /// メッセージ型URL（`MSG_SIGN_DATA_TYPE_URL`）
    pub type_url: String,
    /// メッセージ本体
    pub value: SignDataValue,
}

/// 手数料の金額要素。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// 単位（例: "uatom"）
    pub denom: String,
    /// 文字列表現の整数
    pub amount: String,
}

/// 手数料記述子。このフローでは常に `{gas: "0", amount: []}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeDescriptor {
    /// 文字列表現の整数ガス値
    pub gas: String,
    /// 金額リスト
    pub amount: Vec<Coin>,
}

impl FeeDescriptor {
    /// ゼロ手数料（ガス "0"、金額なし）。
    pub fn zero() -> Self {
        Self {
            gas: ZERO_GAS.to_string(),
            amount: Vec::new(),
        }
    }
}

/// 署名サービスに渡す署名リクエスト。署名呼び出しごとに新規構築され、永続化されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    /// メッセージ記述子の列（このフローでは常に1要素）
    pub messages: Vec<SignDataMessage>,
    /// 手数料記述子
    pub fee: FeeDescriptor,
}

impl SigningRequest {
    /// ローカル署名で使う正規バイト列（serde_jsonエンコーディング）。
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ---------------------------------------------------------------------------
// アカウント・署名結果
// ---------------------------------------------------------------------------

/// 認証済みユーザーのメタデータ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetadata {
    /// チェーン上の公開アドレス（署名者アドレス）
    pub public_address: String,
    /// ログインに使ったメールアドレス
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// 発行者識別子（プロバイダ固有）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

/// 署名操作の結果。内容は解釈せず、そのまま呼び出し元に返す。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignResult(pub serde_json::Value);

impl SignResult {
    /// 内部のJSON値を参照する。
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// 内部のJSON値を取り出す。
    pub fn into_json(self) -> serde_json::Value {
        self.0
    }
}

// ---------------------------------------------------------------------------
// HTTPプロバイダ ワイヤ形式
// ---------------------------------------------------------------------------

/// POST /v1/auth/email-otp/start リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpStartRequest {
    /// ログイン対象のメールアドレス
    pub email: String,
}

/// POST /v1/auth/email-otp/start レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpStartResponse {
    /// ワンタイムコード送信済みのログインフローID
    pub request_id: String,
}

/// POST /v1/auth/email-otp/verify リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyRequest {
    /// startで払い出されたログインフローID
    pub request_id: String,
    /// メールで受け取ったワンタイムコード
    pub code: String,
}

/// POST /v1/auth/email-otp/verify レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyResponse {
    /// 認証されたアカウント識別子（失敗時はnull）
    #[serde(default)]
    pub account: Option<String>,
    /// 以降のリクエストで使うセッショントークン
    #[serde(default)]
    pub session_token: Option<String>,
}

/// POST /v1/chain/sign リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSignRequest {
    /// チェーンRPCエンドポイント
    pub rpc_url: String,
    /// 署名対象メッセージ
    pub messages: Vec<SignDataMessage>,
    /// 手数料記述子
    pub fee: FeeDescriptor,
}
