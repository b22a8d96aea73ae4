//! dialog-hub 控制台
//!
//! 在终端里模拟 /api/chat 客户端：每行输入作为 user_message，meta 由斜杠命令设置。
//! 用法：dialog-hub [config.toml]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use dialog_hub::config::load_config;
use dialog_hub::core::{
    run_with_graceful_shutdown, SessionStoreCleanup, ShutdownCoordinator, ShutdownManager,
    ShutdownReason,
};
use dialog_hub::dialogue::{LineStatus, Reply};
use dialog_hub::gateway::{MetaEnvelope, ModeRouter, RawMeta};
use dialog_hub::observability;

const HELP: &str = "\
명령어:
  /edu                     학습 모드로 새 세션 시작
  /kiosk <kiosk_type> [store_id]  키오스크 모드로 새 세션 시작 (예: /kiosk cafe)
  /level <beginner|intermediate|advanced>
  /content <본문>          다음 입력과 함께 요약할 본문
  /answer <답안>           다음 입력과 함께 채점할 답안
  /topic <주제>            다음 입력과 함께 연습 문제 주제
  /help, /quit";

/// 控制台会话：固定的 meta 加上只作用于下一轮的教学字段
struct Console {
    meta: RawMeta,
}

impl Console {
    fn new() -> Self {
        let mut console = Self {
            meta: RawMeta::default(),
        };
        console.start("edu", None, None);
        console
    }

    fn start(&mut self, mode: &str, kiosk_type: Option<&str>, store_id: Option<&str>) {
        let level = self.meta.user_level.take();
        self.meta = RawMeta {
            client_session_id: Some(format!("console-{}", uuid::Uuid::new_v4().simple())),
            mode: Some(mode.to_string()),
            device_type: Some("console".to_string()),
            user_level: level,
            kiosk_type: kiosk_type.map(String::from),
            store_id: store_id.map(String::from),
            ..Default::default()
        };
    }

    /// 处理斜杠命令；返回 false 表示退出
    fn command(&mut self, line: &str) -> bool {
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let arg = (!rest.is_empty()).then(|| rest.to_string());
        match cmd {
            "/quit" | "/exit" => return false,
            "/edu" => {
                self.start("edu", None, None);
                println!("학습 모드 세션을 시작했어요.");
            }
            "/kiosk" => {
                let mut parts = rest.split_whitespace();
                let kiosk_type = parts.next().unwrap_or("cafe").to_string();
                let store_id = parts.next().map(String::from);
                self.start("kiosk", Some(&kiosk_type), store_id.as_deref());
                println!("키오스크 모드 세션을 시작했어요. ({})", kiosk_type);
            }
            "/level" => self.meta.user_level = arg,
            "/content" => self.meta.content = arg,
            "/answer" => self.meta.student_answer = arg,
            "/topic" => self.meta.topic = arg,
            _ => println!("{}", HELP),
        }
        true
    }

    /// 本轮使用的 meta；教学字段用过即清空
    fn take_meta(&mut self) -> RawMeta {
        let meta = self.meta.clone();
        self.meta.content = None;
        self.meta.student_answer = None;
        self.meta.topic = None;
        meta
    }
}

fn print_reply(reply: &Reply) {
    println!("[{:?}] {}", reply.kind, reply.message);
    if let Some(cart) = &reply.cart {
        for line in cart {
            let mark = match line.status {
                LineStatus::Confirmed => "✔",
                LineStatus::AwaitingOptions => "…",
            };
            let options: Vec<String> = line.options.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            println!("  {} {} x{} {}", mark, line.display_name, line.quantity, options.join(", "));
        }
    }
}

async fn repl(router: Arc<ModeRouter>, manager: Arc<ShutdownManager>) {
    println!("{}", HELP);
    let mut console = Console::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let mode = console.meta.mode.clone().unwrap_or_default();
        let _ = stdout.write_all(format!("{}> ", mode).as_bytes()).await;
        let _ = stdout.flush().await;

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("stdin read failed: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('/') {
            if !console.command(line) {
                break;
            }
            continue;
        }

        let meta = match MetaEnvelope::try_from(console.take_meta()) {
            Ok(meta) => meta,
            Err(e) => {
                println!("요청을 만들 수 없어요: {}", e);
                continue;
            }
        };
        match router.handle(line, &meta).await {
            Ok(outcome) => print_reply(&outcome.reply),
            Err(e) => println!("오류: {}", e),
        }
    }
    manager.shutdown(ShutdownReason::UserInitiated);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_with_default("warn");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let router = Arc::new(
        ModeRouter::from_config(&cfg)
            .await
            .context("Failed to build dialog router")?,
    );

    let manager = Arc::new(ShutdownManager::new());
    let cleanup = Arc::clone(&router).spawn_cleanup(
        Duration::from_secs(cfg.session.cleanup_interval_secs.max(1)),
        manager.token(),
    );

    let mut coordinator = ShutdownCoordinator::new();
    coordinator.register(SessionStoreCleanup::new(router.store()));

    run_with_graceful_shutdown(
        Arc::clone(&manager),
        repl(Arc::clone(&router), Arc::clone(&manager)),
        coordinator,
    )
    .await;
    let _ = cleanup.await;
    Ok(())
}
