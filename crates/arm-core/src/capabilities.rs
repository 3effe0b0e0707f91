//! Hardware and resource collaborators the engine talks to. Implementations
//! live outside the engine; `sim` has in-memory ones for headless runs and tests.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::program::ProgramFile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coords {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Base, shoulder, elbow and wrist servo angles in degrees.
pub type ServoAngles = [f64; 4];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Robot is not connected")]
    RobotDisconnected,

    #[error("Camera is not connected")]
    CameraDisconnected,

    #[error("Resource manager is not available")]
    NoResources,

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

pub trait Robot: Send + Sync {
    fn connected(&self) -> bool;
    fn coords(&self) -> Coords;
    fn set_coords(&self, target: Coords) -> Result<(), CapabilityError>;
    fn wrist(&self) -> f64;
    fn set_wrist(&self, angle: f64) -> Result<(), CapabilityError>;
    fn set_speed(&self, speed: f64) -> Result<(), CapabilityError>;
    fn set_servo_angles(&self, angles: ServoAngles) -> Result<(), CapabilityError>;
    fn gripper_closed(&self) -> bool;
    fn set_gripper(&self, closed: bool) -> Result<(), CapabilityError>;
    fn buzz(&self, frequency: f64, duration: f64) -> Result<(), CapabilityError>;
    fn tip_pressed(&self) -> bool;
    fn is_moving(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// Time since the object was last recognized.
    pub age: Duration,
    /// Pixel position of the object center.
    pub center: (f64, f64),
    pub rotation: f64,
}

pub trait Vision: Send + Sync {
    fn connected(&self) -> bool;
    fn start_tracking(&self, object: &str) -> Result<(), CapabilityError>;
    fn end_all_tracking(&self);
    /// Monotonic count of frames processed so far.
    fn frame_count(&self) -> u64;
    fn recognition(&self, object: &str) -> Option<Recognition>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingFrame {
    pub servos: ServoAngles,
    #[serde(default)]
    pub gripper: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub frame_interval_ms: u64,
    pub frames: Vec<RecordingFrame>,
}

/// Named resources: trackable objects, motion recordings and sub-programs.
pub trait ObjectManager: Send + Sync {
    fn names(&self) -> Vec<String>;
    fn is_trackable(&self, name: &str) -> bool;
    fn recording(&self, name: &str) -> Option<Recording>;
    fn program(&self, name: &str) -> Option<ProgramFile>;

    fn exists(&self, name: &str) -> bool {
        self.names().iter().any(|candidate| candidate == name)
    }
}

pub trait Settings: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
}

/// The capability handles a run may use. Missing handles behave like
/// disconnected devices.
#[derive(Clone, Default)]
pub struct Environment {
    pub robot: Option<Arc<dyn Robot>>,
    pub vision: Option<Arc<dyn Vision>>,
    pub objects: Option<Arc<dyn ObjectManager>>,
    pub settings: Option<Arc<dyn Settings>>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_robot(mut self, robot: Arc<dyn Robot>) -> Self {
        self.robot = Some(robot);
        self
    }

    #[must_use]
    pub fn with_vision(mut self, vision: Arc<dyn Vision>) -> Self {
        self.vision = Some(vision);
        self
    }

    #[must_use]
    pub fn with_objects(mut self, objects: Arc<dyn ObjectManager>) -> Self {
        self.objects = Some(objects);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Arc<dyn Settings>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// The robot, if one is attached and connected.
    pub fn robot(&self) -> Result<&dyn Robot, CapabilityError> {
        self.robot
            .as_deref()
            .filter(|robot| robot.connected())
            .ok_or(CapabilityError::RobotDisconnected)
    }

    pub fn vision(&self) -> Result<&dyn Vision, CapabilityError> {
        self.vision
            .as_deref()
            .filter(|vision| vision.connected())
            .ok_or(CapabilityError::CameraDisconnected)
    }

    pub fn objects(&self) -> Result<&dyn ObjectManager, CapabilityError> {
        self.objects.as_deref().ok_or(CapabilityError::NoResources)
    }

    #[must_use]
    pub fn setting(&self, key: &str) -> Option<serde_json::Value> {
        self.settings.as_ref().and_then(|settings| settings.get(key))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("robot", &self.robot.is_some())
            .field("vision", &self.vision.is_some())
            .field("objects", &self.objects.is_some())
            .field("settings", &self.settings.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimulatedRobot, SimulatedVision};

    #[test]
    fn test_missing_devices_report_disconnected() {
        let env = Environment::new();
        assert_eq!(env.robot().err(), Some(CapabilityError::RobotDisconnected));
        assert_eq!(env.vision().err(), Some(CapabilityError::CameraDisconnected));
        assert_eq!(env.objects().err(), Some(CapabilityError::NoResources));
        assert!(env.setting("units").is_none());
    }

    #[test]
    fn test_disconnected_device_is_rejected() {
        let env = Environment::new()
            .with_robot(Arc::new(SimulatedRobot::disconnected()))
            .with_vision(Arc::new(SimulatedVision::new()));
        assert!(env.robot().is_err());
        assert!(env.vision().is_ok());
    }

    #[test]
    fn test_capability_error_messages() {
        assert_eq!(
            CapabilityError::ResourceNotFound("cup".to_string()).to_string(),
            "Resource not found: cup"
        );
        assert_eq!(
            CapabilityError::CameraDisconnected.to_string(),
            "Camera is not connected"
        );
    }
}
