use crate::{config::Config, session::SessionRuntime};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub runtime: SessionRuntime,
    pub config: Config,
}

impl FromRef<AppState> for SessionRuntime {
    fn from_ref(state: &AppState) -> Self {
        state.runtime.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
