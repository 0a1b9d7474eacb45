//! # 状態描画
//!
//! 認証状態を購読し、変化のたびに対応する画面を1行で表示する。

use tokio::sync::watch;

use mailsign_core::{AuthState, LoginFailure};

/// 状態に対応する表示行。
pub fn render_line(state: &AuthState) -> String {
    match state {
        AuthState::Uninitialized => "プロバイダを初期化しています...".to_string(),
        AuthState::Unauthenticated { last_failure: None } => {
            "メールアドレスを入力してウォレットに接続してください".to_string()
        }
        AuthState::Unauthenticated {
            last_failure: Some(LoginFailure::NoIdentity),
        } => "ログインできませんでした。もう一度メールアドレスを入力してください".to_string(),
        AuthState::Unauthenticated {
            last_failure: Some(LoginFailure::Provider(reason)),
        } => format!("ログインに失敗しました ({reason})。もう一度メールアドレスを入力してください"),
        AuthState::Authenticating { email } => format!("{email} でログイン中..."),
        AuthState::Authenticated { account } => {
            format!("接続済み: {account} — 署名するメッセージを入力してください")
        }
    }
}

/// 状態チャネルが閉じるまで変化を表示し続ける。
pub async fn run(mut rx: watch::Receiver<AuthState>) {
    let first = render_line(&rx.borrow_and_update());
    println!("{first}");
    while rx.changed().await.is_ok() {
        let line = render_line(&rx.borrow_and_update());
        println!("{line}");
    }
}
