use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};

pub enum Level {
    Info,
    Warn,
    Error,
    Debug,
}

/// 调试输出开关，由配置中的 debug 字段在启动时设置
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

/// 统一日志输出函数
/// 格式: [Time] [LEVEL] [Target      ] Message
pub fn print(level: Level, target: &str, args: std::fmt::Arguments) {
    if matches!(level, Level::Debug) && !DEBUG_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let now = Local::now().format("%H:%M:%S");

    // ANSI 颜色代码
    let gray = "\x1b[90m";
    let reset = "\x1b[0m";
    let cyan = "\x1b[36m";

    // Level 颜色与标签
    let (color, level_str) = match level {
        Level::Info => ("\x1b[32m", "INFO"),  // Green
        Level::Warn => ("\x1b[33m", "WARN"),  // Yellow
        Level::Error => ("\x1b[31m", "ERRO"), // Red
        Level::Debug => ("\x1b[34m", "DEBG"), // Blue
    };

    println!(
        "{}[{}] {}[{}] {} {}{}{} {}",
        gray,
        now,
        color,
        level_str,
        reset,
        cyan,
        format_args!("[{}]", target),
        reset,
        args
    );
}

/// 启动横幅
pub fn print_banner() {
    let cyan = "\x1b[36m";
    let gray = "\x1b[90m";
    let reset = "\x1b[0m";
    println!(
        "{}    ___    ____  ______   ____  ____  ______
   /   |  / __ \\/ ____/  / __ )/ __ \\/_  __/
  / /| | / /_/ / /      / __  / / / / / /
 / ___ |/ _, _/ /___   / /_/ / /_/ / / /
/_/  |_/_/ |_|\\____/  /_____/\\____/ /_/{}
{}        ARC Raiders 资源查询机器人{}
",
        cyan, reset, gray, reset
    );
}

#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => (
        $crate::log::print($crate::log::Level::Info, $target, format_args!($($arg)+))
    );
    ($($arg:tt)+) => (
        $crate::log::print($crate::log::Level::Info, "System", format_args!($($arg)+))
    );
}

#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => (
        $crate::log::print($crate::log::Level::Warn, $target, format_args!($($arg)+))
    );
    ($($arg:tt)+) => (
        $crate::log::print($crate::log::Level::Warn, "System", format_args!($($arg)+))
    );
}

#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => (
        $crate::log::print($crate::log::Level::Error, $target, format_args!($($arg)+))
    );
    ($($arg:tt)+) => (
        $crate::log::print($crate::log::Level::Error, "System", format_args!($($arg)+))
    );
}

#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => (
        $crate::log::print($crate::log::Level::Debug, $target, format_args!($($arg)+))
    );
    ($($arg:tt)+) => (
        $crate::log::print($crate::log::Level::Debug, "System", format_args!($($arg)+))
    );
}
