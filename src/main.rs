#![cfg_attr(windows, windows_subsystem = "windows")]
// Windows-only implementation lives in src/host.rs
#[cfg(windows)]
mod host;

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    // Logging is best effort: a rolling daily file under the app's data dir.
    let _guard = match taskbar_tools::config::project_paths() {
        Ok(paths) => {
            std::fs::create_dir_all(&paths.log_dir).ok();
            let file_appender = tracing_appender::rolling::daily(&paths.log_dir, "trayhost.log");
            let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
            let env = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env)
                .with_ansi(false)
                .with_writer(nb_writer)
                .try_init();
            tracing::info!("trayhost starting");
            Some(guard)
        }
        Err(_) => None,
    };
    host::main()
}

// Non-Windows stub builds cleanly and informs the user.
#[cfg(not(windows))]
fn main() {
    println!("trayhost needs the Windows notification area. Build on Windows to run.");
}
