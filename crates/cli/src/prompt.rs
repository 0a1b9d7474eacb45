//! # 標準入力プロンプト
//!
//! メールアドレス・ワンタイムコード・メッセージを1行ずつ読み取る。

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::Mutex;

use mailsign_core::{OtpCodeSource, ProviderError};

/// 行単位の入力プロンプト。入力は改行以外そのまま返す。
pub struct Prompt<R> {
    lines: Mutex<Lines<R>>,
}

impl<R: AsyncBufRead + Unpin + Send> Prompt<R> {
    /// 任意の入力元から作成する。
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    /// ラベルを表示して1行読む。入力が終了していれば `None`。
    pub async fn ask(&self, label: &str) -> std::io::Result<Option<String>> {
        let mut lines = self.lines.lock().await;
        print!("{label}: ");
        std::io::stdout().flush()?;
        lines.next_line().await
    }
}

/// プロンプトからワンタイムコードを読むOtpCodeSource。
///
/// 空入力または入力終了はログイン中断として扱う。
pub struct PromptOtp<R> {
    prompt: Arc<Prompt<R>>,
}

impl<R> PromptOtp<R> {
    /// 共有プロンプトから作成する。
    pub fn new(prompt: Arc<Prompt<R>>) -> Self {
        Self { prompt }
    }
}

#[async_trait::async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> OtpCodeSource for PromptOtp<R> {
    async fn read_code(&self, email: &str) -> Result<Option<String>, ProviderError> {
        let code = self
            .prompt
            .ask(&format!("{email} に届いたコード"))
            .await
            .map_err(|e| ProviderError::Internal(format!("コードの読み取りに失敗: {e}")))?;
        Ok(code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()))
    }
}
