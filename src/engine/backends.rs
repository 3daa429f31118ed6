//! Picks the concrete source and sink named in the config

use crate::config::{AppConfig, BackendKind, SinkKind};
use crate::controller::gilrs_source::GilrsSource;
use crate::controller::state_source::StateSource;
use crate::engine::poll_loop::EngineError;
use crate::output::sink::{InputSink, LogSink};
use tracing::info;

pub fn build_source(config: &AppConfig) -> Result<Box<dyn StateSource>, EngineError> {
    info!("Creating controller backend: {:?}", config.backend);
    match config.backend {
        BackendKind::Gilrs => Ok(Box::new(GilrsSource::create()?)),
        #[cfg(windows)]
        BackendKind::Xinput => Ok(Box::new(
            crate::controller::xinput_source::XInputSource::create(config.controller_slot)?,
        )),
        #[cfg(not(windows))]
        BackendKind::Xinput => Err(crate::mapping::error::ConfigError::UnsupportedBackend(
            "xinput".to_string(),
        )
        .into()),
    }
}

pub fn build_sink(config: &AppConfig) -> Result<Box<dyn InputSink>, EngineError> {
    info!("Creating input sink: {:?}", config.sink);
    match config.sink {
        SinkKind::Log => Ok(Box::new(LogSink)),
        #[cfg(windows)]
        SinkKind::SendInput => Ok(Box::new(crate::output::send_input::SendInputSink::new())),
        #[cfg(not(windows))]
        SinkKind::SendInput => Err(crate::mapping::error::ConfigError::UnsupportedBackend(
            "send_input".to_string(),
        )
        .into()),
    }
}
