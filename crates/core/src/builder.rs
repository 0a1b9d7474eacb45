//! # 署名リクエストの構築
//!
//! ユーザー入力のメッセージと解決済みの署名者アドレスから、
//! 1要素のMsgSignDataとゼロ手数料を組み立てる。

use mailsign_types::{
    FeeDescriptor, SignDataMessage, SignDataValue, SigningRequest, MSG_SIGN_DATA_TYPE_URL,
};

/// 署名リクエストを構築する。
///
/// `message_data` は空文字列を含め任意（検証・トリムしない）。
/// `signer_address` は認証済みセッションから解決済みの空でないアドレスでなければならない。
/// 未解決のアドレスで呼ぶのはプログラミングエラー。
pub fn build_signing_request(message_data: &str, signer_address: &str) -> SigningRequest {
    debug_assert!(
        !signer_address.is_empty(),
        "署名者アドレスが未解決のまま署名リクエストを構築しようとしました"
    );

    SigningRequest {
        messages: vec![SignDataMessage {
            type_url: MSG_SIGN_DATA_TYPE_URL.to_string(),
            value: SignDataValue {
                signer: signer_address.to_string(),
                data: message_data.to_string(),
            },
        }],
        fee: FeeDescriptor::zero(),
    }
}
