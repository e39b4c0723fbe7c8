use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "ssr")] {
        use axum::extract::FromRef;

        use crate::cancellable_stream::StreamRegistry;
        use crate::config::ProviderConfig;
        use crate::services::openai::OpenAIService;

        #[derive(FromRef, Clone)]
        pub struct AppState {
            pub openai: OpenAIService,
            pub streams: StreamRegistry,
        }

        impl AppState {
            pub fn new(provider: &ProviderConfig) -> Self {
                Self {
                    openai: OpenAIService::new(provider),
                    streams: StreamRegistry::new(),
                }
            }
        }
    }
}
