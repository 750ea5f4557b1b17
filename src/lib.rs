pub mod api;
pub mod core;

/// 初始化日志，可重复调用
pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("travel_note_rust"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        let env = env_logger::Env::default().default_filter_or("info");
        let _ = env_logger::Builder::from_env(env).try_init();
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_logging_is_idempotent() {
        super::init_logging();
        super::init_logging();
        log::info!("✅ logging ready");
    }
}
