use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[cfg(windows)]
const UTF8_CODE_PAGE: u32 = 65001;

/// Switches stdout to UTF-8 and turns on VT escape handling.
///
/// Returns whether the console will render ANSI colours. Redirected output
/// and legacy consoles report `false`.
#[cfg(windows)]
pub fn enable_virtual_terminal() -> bool {
    use windows_sys::Win32::System::Console::{
        GetConsoleMode, GetStdHandle, SetConsoleMode, SetConsoleOutputCP, CONSOLE_MODE,
        ENABLE_VIRTUAL_TERMINAL_PROCESSING, STD_OUTPUT_HANDLE,
    };

    // SAFETY: plain Win32 calls on the process's own stdout handle.
    unsafe {
        SetConsoleOutputCP(UTF8_CODE_PAGE);
        let handle = GetStdHandle(STD_OUTPUT_HANDLE);
        let mut mode: CONSOLE_MODE = 0;
        if GetConsoleMode(handle, &mut mode) == 0 {
            return false;
        }
        if mode & ENABLE_VIRTUAL_TERMINAL_PROCESSING != 0 {
            return true;
        }
        SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING) != 0
    }
}

#[cfg(not(windows))]
pub fn enable_virtual_terminal() -> bool {
    true
}

/// Installs the global subscriber. `RUST_LOG` filters, `RUST_LOG_FORMAT=json` emits JSON lines.
pub fn init_tracing() {
    let ansi = enable_virtual_terminal();
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let layer = match std::env::var("RUST_LOG_FORMAT").as_deref() {
        Ok("json") => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer().with_ansi(ansi).with_filter(env_filter).boxed(),
    };

    tracing_subscriber::registry().with(layer).init();
}
