use crate::events::SessionEvent;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// Рантайм-переключатель поверх `config::LOGGING_ENABLED`, на весь процесс
static RUNTIME_ENABLED: AtomicBool = AtomicBool::new(true);

const DEFAULT_PREFIX: &str = "RUST";

/// Настройки логов одной сессии
#[derive(Debug, Clone)]
pub struct LogScope {
    pub enabled: bool,
    pub prefix: String,
}

tokio::task_local! {
    static SCOPE: LogScope;
}

/// Выполняет `fut` с настройками логов сессии. Всё, что логируется внутри
/// (в том числе коллабораторами), подчиняется `scope`.
pub async fn scoped<F: Future>(scope: LogScope, fut: F) -> F::Output {
    SCOPE.scope(scope, fut).await
}

pub fn set_enabled(enabled: bool) {
    RUNTIME_ENABLED.store(enabled, Ordering::Relaxed);
}

fn enabled() -> bool {
    if !crate::config::LOGGING_ENABLED || !crate::config::dev::ENABLE_LOGGING {
        return false;
    }
    if !RUNTIME_ENABLED.load(Ordering::Relaxed) {
        return false;
    }
    SCOPE.try_with(|s| s.enabled).unwrap_or(true)
}

fn prefix() -> String {
    SCOPE
        .try_with(|s| s.prefix.clone())
        .unwrap_or_else(|_| DEFAULT_PREFIX.to_string())
}

fn line(tag: &str, msg: &str) -> Option<String> {
    if !enabled() {
        return None;
    }
    let now = chrono::Local::now();
    let line = format!(
        "{}: {}[{}] {}",
        prefix(),
        tag,
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        msg
    );
    #[cfg(test)]
    recorded::push(&line);
    Some(line)
}

/// Логирование с временными метками
pub fn log(msg: &str) {
    if let Some(line) = line("", msg) {
        println!("{line}");
    }
}

pub fn log_error(msg: &str) {
    if let Some(line) = line("ERROR ", msg) {
        eprintln!("{line}");
    }
}

/// Печать события сессии, которое уходит в UI
pub fn emit_event(room: Option<&str>, event: &SessionEvent) {
    if !enabled() {
        return;
    }
    let payload = serde_json::to_string(event).unwrap_or_else(|e| format!("<{e}>"));
    log(&format!(
        "emit {} room={} payload={}",
        event.name(),
        room.unwrap_or("-"),
        payload
    ));
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scope_controls_output_of_its_task() {
        let quiet = LogScope {
            enabled: false,
            prefix: "scope-quiet".into(),
        };
        let loud = LogScope {
            enabled: true,
            prefix: "scope-loud".into(),
        };
        scoped(quiet, async { log("hidden") }).await;
        scoped(loud, async { log_error("shown") }).await;

        assert!(recorded::with_prefix("scope-quiet").is_empty());
        let lines = recorded::with_prefix("scope-loud");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("ERROR") && lines[0].ends_with("shown"));
    }
}
