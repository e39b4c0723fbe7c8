use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "ssr")] {
        use anyhow::Context;
        use dotenv::dotenv;
        use env_logger::Env;
        use brandgen::app::router;
        use brandgen::config::Config;
        use brandgen::state::AppState;
        use std::net::SocketAddr;

        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            dotenv().ok();
            env_logger::init_from_env(Env::default().default_filter_or("info"));

            let config = Config::from_env().context("invalid relay configuration")?;
            let addr = config.site_addr;
            log::info!("Using model {} at {}", config.provider.model, config.provider.base_url);

            let app = router(AppState::new(&config.provider));

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            log::info!("listening on http://{}", &addr);
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
            Ok(())
        }
    } else {
        pub fn main() {
            eprintln!("The relay server requires the 'ssr' feature");
            std::process::exit(1);
        }
    }
}
