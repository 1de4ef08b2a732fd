use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Direction, FunctionId, RunOrder, Speed};
use crate::bus::{BusSnapshot, HOLD_BUS};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChaserStep {
    pub function_id: FunctionId,
    /// Overrides the chaser speed for this step.
    pub hold: Option<Duration>,
}

impl ChaserStep {
    pub fn new(function_id: FunctionId) -> Self {
        Self {
            function_id,
            hold: None,
        }
    }

    pub fn with_hold(function_id: FunctionId, hold: Duration) -> Self {
        Self {
            function_id,
            hold: Some(hold),
        }
    }
}

/// A timed sequence of functions, one running at a time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chaser {
    pub steps: Vec<ChaserStep>,
    /// Default hold time of each step.
    pub speed: Speed,
    pub run_order: RunOrder,
    pub direction: Direction,
}

impl Chaser {
    pub fn new(steps: Vec<ChaserStep>) -> Self {
        Self {
            steps,
            speed: Speed::Bus(HOLD_BUS),
            run_order: RunOrder::default(),
            direction: Direction::default(),
        }
    }

    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_run_order(mut self, run_order: RunOrder, direction: Direction) -> Self {
        self.run_order = run_order;
        self.direction = direction;
        self
    }

    pub fn add_step(&mut self, step: ChaserStep) {
        self.steps.push(step);
    }

    pub fn step(&self, index: usize) -> Option<&ChaserStep> {
        self.steps.get(index)
    }

    /// Hold time of a step in seconds, `None` when the speed bus is gone.
    pub fn hold_seconds(&self, index: usize, buses: &BusSnapshot) -> Option<f64> {
        match self.steps.get(index).and_then(|s| s.hold) {
            Some(hold) => Some(hold.as_secs_f64()),
            None => self.speed.seconds(buses),
        }
    }
}
