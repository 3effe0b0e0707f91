//! In-memory capabilities for headless runs and tests.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::capabilities::{
    CapabilityError, Coords, ObjectManager, Recognition, Recording, Robot, ServoAngles, Settings,
    Vision,
};
use crate::program::ProgramFile;

const HOME: Coords = Coords::new(0.0, 150.0, 150.0);
const FRAME_PERIOD: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, PartialEq)]
pub enum RobotCall {
    MoveTo(Coords),
    Wrist(f64),
    Speed(f64),
    Servos(ServoAngles),
    Gripper(bool),
    Buzzer { frequency: f64, duration: f64 },
}

#[derive(Debug)]
struct RobotState {
    connected: bool,
    coords: Coords,
    wrist: f64,
    gripper: bool,
    tip: bool,
    moving: bool,
}

/// A robot that reaches every target instantly and records what it was asked to do.
#[derive(Debug)]
pub struct SimulatedRobot {
    state: Mutex<RobotState>,
    calls: Mutex<Vec<RobotCall>>,
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRobot {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RobotState {
                connected: true,
                coords: HOME,
                wrist: 0.0,
                gripper: false,
                tip: false,
                moving: false,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn disconnected() -> Self {
        let robot = Self::new();
        robot.state.lock().connected = false;
        robot
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RobotCall> {
        self.calls.lock().clone()
    }

    pub fn set_tip(&self, pressed: bool) {
        self.state.lock().tip = pressed;
    }

    pub fn set_moving(&self, moving: bool) {
        self.state.lock().moving = moving;
    }

    fn record(&self, call: RobotCall) -> Result<(), CapabilityError> {
        if !self.state.lock().connected {
            return Err(CapabilityError::RobotDisconnected);
        }
        log::trace!("simulated robot: {call:?}");
        self.calls.lock().push(call);
        Ok(())
    }
}

impl Robot for SimulatedRobot {
    fn connected(&self) -> bool {
        self.state.lock().connected
    }

    fn coords(&self) -> Coords {
        self.state.lock().coords
    }

    fn set_coords(&self, target: Coords) -> Result<(), CapabilityError> {
        self.record(RobotCall::MoveTo(target))?;
        self.state.lock().coords = target;
        Ok(())
    }

    fn wrist(&self) -> f64 {
        self.state.lock().wrist
    }

    fn set_wrist(&self, angle: f64) -> Result<(), CapabilityError> {
        if !(-90.0..=90.0).contains(&angle) {
            return Err(CapabilityError::Rejected(format!(
                "wrist angle {angle} is out of range"
            )));
        }
        self.record(RobotCall::Wrist(angle))?;
        self.state.lock().wrist = angle;
        Ok(())
    }

    fn set_speed(&self, speed: f64) -> Result<(), CapabilityError> {
        if speed <= 0.0 {
            return Err(CapabilityError::Rejected(format!(
                "speed must be positive, got {speed}"
            )));
        }
        self.record(RobotCall::Speed(speed))
    }

    fn set_servo_angles(&self, angles: ServoAngles) -> Result<(), CapabilityError> {
        self.record(RobotCall::Servos(angles))?;
        self.state.lock().wrist = angles[3];
        Ok(())
    }

    fn gripper_closed(&self) -> bool {
        self.state.lock().gripper
    }

    fn set_gripper(&self, closed: bool) -> Result<(), CapabilityError> {
        self.record(RobotCall::Gripper(closed))?;
        self.state.lock().gripper = closed;
        Ok(())
    }

    fn buzz(&self, frequency: f64, duration: f64) -> Result<(), CapabilityError> {
        self.record(RobotCall::Buzzer {
            frequency,
            duration,
        })
    }

    fn tip_pressed(&self) -> bool {
        self.state.lock().tip
    }

    fn is_moving(&self) -> bool {
        self.state.lock().moving
    }
}

/// A camera producing a frame roughly every 33ms. Objects are "seen" when a
/// test marks them.
#[derive(Debug)]
pub struct SimulatedVision {
    started: Instant,
    connected: bool,
    tracked: Mutex<Vec<String>>,
    sightings: Mutex<HashMap<String, (Instant, (f64, f64))>>,
}

impl Default for SimulatedVision {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedVision {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            connected: true,
            tracked: Mutex::new(Vec::new()),
            sightings: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new()
        }
    }

    pub fn mark_seen(&self, object: &str, center: (f64, f64)) {
        self.sightings
            .lock()
            .insert(object.to_string(), (Instant::now(), center));
    }

    pub fn forget(&self, object: &str) {
        self.sightings.lock().remove(object);
    }

    #[must_use]
    pub fn tracked(&self) -> Vec<String> {
        self.tracked.lock().clone()
    }
}

impl Vision for SimulatedVision {
    fn connected(&self) -> bool {
        self.connected
    }

    fn start_tracking(&self, object: &str) -> Result<(), CapabilityError> {
        let mut tracked = self.tracked.lock();
        if !tracked.iter().any(|name| name == object) {
            tracked.push(object.to_string());
        }
        Ok(())
    }

    fn end_all_tracking(&self) {
        self.tracked.lock().clear();
    }

    fn frame_count(&self) -> u64 {
        let frames = self.started.elapsed().as_millis() / FRAME_PERIOD.as_millis();
        u64::try_from(frames).unwrap_or(u64::MAX)
    }

    fn recognition(&self, object: &str) -> Option<Recognition> {
        self.sightings
            .lock()
            .get(object)
            .map(|(seen_at, center)| Recognition {
                age: seen_at.elapsed(),
                center: *center,
                rotation: 0.0,
            })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryObjects {
    trackable: HashSet<String>,
    recordings: IndexMap<String, Recording>,
    programs: IndexMap<String, ProgramFile>,
}

impl InMemoryObjects {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_trackable(mut self, name: &str) -> Self {
        self.trackable.insert(name.to_string());
        self
    }

    #[must_use]
    pub fn with_recording(mut self, name: &str, recording: Recording) -> Self {
        self.recordings.insert(name.to_string(), recording);
        self
    }

    #[must_use]
    pub fn with_program(mut self, name: &str, program: ProgramFile) -> Self {
        self.programs.insert(name.to_string(), program);
        self
    }
}

impl ObjectManager for InMemoryObjects {
    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.trackable.iter().cloned().collect();
        names.sort();
        names.extend(self.recordings.keys().cloned());
        names.extend(self.programs.keys().cloned());
        names
    }

    fn is_trackable(&self, name: &str) -> bool {
        self.trackable.contains(name)
    }

    fn recording(&self, name: &str) -> Option<Recording> {
        self.recordings.get(name).cloned()
    }

    fn program(&self, name: &str) -> Option<ProgramFile> {
        self.programs.get(name).cloned()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsSnapshot(IndexMap<String, serde_json::Value>);

impl SettingsSnapshot {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json).map(Self)
    }
}

impl Settings for SettingsSnapshot {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.0.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robot_records_calls() {
        let robot = SimulatedRobot::new();
        robot.set_coords(Coords::new(1.0, 2.0, 3.0)).unwrap();
        robot.set_gripper(true).unwrap();
        assert_eq!(
            robot.calls(),
            [
                RobotCall::MoveTo(Coords::new(1.0, 2.0, 3.0)),
                RobotCall::Gripper(true)
            ]
        );
        assert!(robot.set_wrist(120.0).is_err());
    }

    #[test]
    fn test_disconnected_robot_rejects_commands() {
        let robot = SimulatedRobot::disconnected();
        assert_eq!(
            robot.set_gripper(true),
            Err(CapabilityError::RobotDisconnected)
        );
        assert!(robot.calls().is_empty());
    }

    #[test]
    fn test_vision_tracking_and_frames() {
        let vision = SimulatedVision::new();
        vision.start_tracking("cup").unwrap();
        vision.start_tracking("cup").unwrap();
        assert_eq!(vision.tracked(), ["cup".to_string()]);
        vision.end_all_tracking();
        assert!(vision.tracked().is_empty());

        let first = vision.frame_count();
        std::thread::sleep(FRAME_PERIOD * 2);
        assert!(vision.frame_count() > first);
    }

    #[test]
    fn test_objects_listing() {
        let objects = InMemoryObjects::new()
            .with_trackable("cup")
            .with_program("sub", ProgramFile::default());
        assert!(objects.exists("cup"));
        assert!(objects.exists("sub"));
        assert!(!objects.is_trackable("sub"));
    }
}
