//! # Mailsign CLI
//!
//! メールOTPでログインし、入力したメッセージに署名するターミナルクライアント。
//!
//! ## 起動シーケンス
//! 1. 環境変数とフラグから設定を構築
//! 2. プロバイダを初期化（`MOCK_MODE=true` または `--mock` ならモック）
//! 3. メールアドレスを受け取りログイン（失敗時は再入力）
//! 4. メッセージを受け取り署名し、結果をJSONで出力

mod prompt;
mod render;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mailsign_core::{provider, AuthMachine, FlowError, ProviderConfig};

use crate::prompt::{Prompt, PromptOtp};

/// コマンドライン引数。未指定の値は環境変数またはデフォルトを使う。
#[derive(Parser, Debug)]
#[command(name = "mailsign-cli", version, about = "メールOTPログインとメッセージ署名")]
struct Args {
    /// ログインに使うメールアドレス（省略時は入力を求める）
    #[arg(long)]
    email: Option<String>,
    /// 署名するメッセージ（省略時は入力を求める）
    #[arg(long)]
    message: Option<String>,
    /// 公開APIキー
    #[arg(long)]
    api_key: Option<String>,
    /// チェーンRPCエンドポイントURL
    #[arg(long)]
    rpc_url: Option<String>,
    /// 認証・署名サービスのベースURL
    #[arg(long)]
    auth_endpoint: Option<String>,
    /// モックプロバイダを使う
    #[arg(long)]
    mock: bool,
}

impl Args {
    /// 環境変数由来の設定にフラグの値を上書きする。
    fn apply_to(&self, mut config: ProviderConfig) -> ProviderConfig {
        if let Some(api_key) = &self.api_key {
            config.api_key = api_key.clone();
        }
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.clone();
        }
        if let Some(auth_endpoint) = &self.auth_endpoint {
            config.auth_endpoint = auth_endpoint.clone();
        }
        config.mock_mode |= self.mock;
        config
    }
}

/// 署名するメッセージを決める。`--message` が優先、なければ入力を求める。
///
/// 入力が終了していれば `None`（署名しない）。空行は空のメッセージとして署名する。
async fn read_message<R>(args: &Args, prompt: &Prompt<R>) -> std::io::Result<Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin + Send,
{
    match &args.message {
        Some(message) => Ok(Some(message.clone())),
        None => prompt.ask("メッセージ").await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.apply_to(ProviderConfig::from_env());
    tracing::debug!(?config, "設定を読み込みました");

    let prompt = Arc::new(Prompt::new(tokio::io::BufReader::new(tokio::io::stdin())));
    let machine = Arc::new(AuthMachine::new());
    let renderer = tokio::spawn(render::run(machine.subscribe()));

    let otp_source = Arc::new(PromptOtp::new(prompt.clone()));
    machine
        .initialize(provider::initialize(config, otp_source))
        .await?;

    // ログイン（失敗時は再入力）
    let mut preset_email = args.email.clone();
    while machine.state().account().is_none() {
        let email = match preset_email.take() {
            Some(email) => email,
            None => match prompt.ask("メールアドレス").await? {
                Some(email) => email,
                None => {
                    renderer.abort();
                    return Ok(());
                }
            },
        };

        match machine.connect(&email).await {
            Ok(_) => {}
            Err(e @ FlowError::Provider(_)) => tracing::warn!(error = %e, "再入力を待ちます"),
            Err(e) => return Err(e.into()),
        }
    }

    let Some(message) = read_message(&args, &*prompt).await? else {
        tracing::info!("入力が閉じられたため署名せずに終了します");
        renderer.abort();
        return Ok(());
    };

    let result = machine.sign(&message).await?;
    println!("{}", serde_json::to_string_pretty(result.as_json())?);

    renderer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ProviderConfig {
        ProviderConfig::from_lookup(|_| None)
    }

    #[test]
    fn test_flags_override_env() {
        let args = Args::parse_from([
            "mailsign-cli",
            "--api-key",
            "pk_flag",
            "--rpc-url",
            "https://rpc.flag",
            "--mock",
        ]);
        let config = args.apply_to(base_config());
        assert_eq!(config.api_key, "pk_flag");
        assert_eq!(config.rpc_url, "https://rpc.flag");
        assert!(config.mock_mode);
    }

    /// フラグ未指定なら環境変数由来の値が残る
    #[test]
    fn test_unset_flags_keep_env_values() {
        let args = Args::parse_from(["mailsign-cli", "--email", "a@b.com"]);
        let mut env_config = base_config();
        env_config.api_key = "pk_env".to_string();
        env_config.mock_mode = true;

        let config = args.apply_to(env_config.clone());
        assert_eq!(config, env_config);
        assert_eq!(args.email.as_deref(), Some("a@b.com"));
    }

    /// 入力終了時はメッセージなし（署名しない）として扱う
    #[tokio::test]
    async fn test_message_eof_means_no_signing() {
        let args = Args::parse_from(["mailsign-cli"]);
        let prompt = Prompt::new(&b""[..]);
        assert_eq!(read_message(&args, &prompt).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_message_from_prompt_or_flag() {
        let args = Args::parse_from(["mailsign-cli"]);
        let prompt = Prompt::new(&b"hello\n\n"[..]);
        assert_eq!(read_message(&args, &prompt).await.unwrap().as_deref(), Some("hello"));
        assert_eq!(read_message(&args, &prompt).await.unwrap().as_deref(), Some(""));

        let args = Args::parse_from(["mailsign-cli", "--message", "from flag"]);
        assert_eq!(
            read_message(&args, &prompt).await.unwrap().as_deref(),
            Some("from flag")
        );
    }
}
