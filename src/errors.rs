// Copyright (c) 2025 The psyvis developers
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Error taxonomy of the engine.
///
/// `InvalidParameter` and `ResourceLoad` are raised synchronously at the call
/// that caused them and are caller-recoverable. `RecoverableDeviceState` is
/// handled inside the render loop by recreating swap resources and retrying
/// the frame. `FatalDeviceState` terminates the loop and propagates to the
/// process boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("failed to load resource: {0}")]
    ResourceLoad(String),

    #[error("swap resources invalidated: {0}")]
    RecoverableDeviceState(String),

    #[error("fatal device state: {0}")]
    FatalDeviceState(String),

    #[error("engine is in state {actual}, operation requires {required}")]
    WrongState {
        required: &'static str,
        actual: &'static str,
    },
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidParameter(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        EngineError::ResourceLoad(msg.into())
    }

    /// True if the render loop may recover by recreating swap resources.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::RecoverableDeviceState(_))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::ResourceLoad(e.to_string())
    }
}

impl From<image::ImageError> for EngineError {
    fn from(e: image::ImageError) -> Self {
        EngineError::ResourceLoad(e.to_string())
    }
}

impl From<wgpu::SurfaceError> for EngineError {
    /// Classifies presentation failures. A lost, outdated or timed-out
    /// surface triggers swap recreation; running out of device memory does
    /// not.
    fn from(e: wgpu::SurfaceError) -> Self {
        match e {
            wgpu::SurfaceError::Lost => {
                EngineError::RecoverableDeviceState("surface lost".into())
            }
            wgpu::SurfaceError::Outdated => {
                EngineError::RecoverableDeviceState("surface outdated".into())
            }
            wgpu::SurfaceError::Timeout => {
                EngineError::RecoverableDeviceState("surface acquisition timed out".into())
            }
            wgpu::SurfaceError::OutOfMemory => {
                EngineError::FatalDeviceState("out of device memory".into())
            }
        }
    }
}

impl From<wgpu::RequestDeviceError> for EngineError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        EngineError::FatalDeviceState(e.to_string())
    }
}

impl From<wgpu::CreateSurfaceError> for EngineError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        EngineError::FatalDeviceState(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_errors_classify_by_severity() {
        assert!(EngineError::from(wgpu::SurfaceError::Lost).is_recoverable());
        assert!(EngineError::from(wgpu::SurfaceError::Outdated).is_recoverable());
        assert!(EngineError::from(wgpu::SurfaceError::Timeout).is_recoverable());
        assert!(!EngineError::from(wgpu::SurfaceError::OutOfMemory).is_recoverable());
    }
}
