use serde::{Deserialize, Serialize};

/// What happens when a chaser or EFX reaches the end of its traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOrder {
    /// Wrap back to the start.
    #[default]
    Loop,
    /// Run once, then complete.
    SingleShot,
    /// Bounce between both ends.
    PingPong,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Lifecycle of a running instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Stopped,
}

impl RunState {
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Idle | RunState::Running)
    }
}

/// Result of advancing a cursor by one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorStatus {
    Unchanged,
    Moved,
    Finished,
}

// Upper bound on step changes per tick, so a pathological hold time cannot
// stall the tick.
const MAX_STEPS_PER_TICK: usize = 1024;

/// Cursor over the ordered steps of a chaser.
#[derive(Clone, Debug)]
pub struct StepCursor {
    index: usize,
    len: usize,
    direction: Direction,
    run_order: RunOrder,
    elapsed: f64,
}

impl StepCursor {
    /// Returns `None` for an empty step list: there is nothing to traverse.
    pub fn new(len: usize, run_order: RunOrder, direction: Direction) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let index = match direction {
            Direction::Forward => 0,
            Direction::Backward => len - 1,
        };
        Some(Self {
            index,
            len,
            direction,
            run_order,
            elapsed: 0.0,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Step to the next index. Returns false once a single shot traversal has
    /// run past its last step.
    pub fn next(&mut self) -> bool {
        let last = self.len - 1;
        match self.run_order {
            RunOrder::Loop => {
                self.index = match self.direction {
                    Direction::Forward => (self.index + 1) % self.len,
                    Direction::Backward => (self.index + last) % self.len,
                };
                true
            }
            RunOrder::SingleShot => match self.direction {
                Direction::Forward if self.index < last => {
                    self.index += 1;
                    true
                }
                Direction::Backward if self.index > 0 => {
                    self.index -= 1;
                    true
                }
                _ => false,
            },
            RunOrder::PingPong => {
                if self.len == 1 {
                    return true;
                }
                match self.direction {
                    Direction::Forward if self.index == last => {
                        self.direction = Direction::Backward;
                        self.index -= 1;
                    }
                    Direction::Forward => self.index += 1,
                    Direction::Backward if self.index == 0 => {
                        self.direction = Direction::Forward;
                        self.index += 1;
                    }
                    Direction::Backward => self.index -= 1,
                }
                true
            }
        }
    }

    /// Advance by `dt` seconds. `hold` returns the hold time in seconds of a
    /// step; steps with a zero (or invalid) hold last exactly one tick.
    pub fn advance<F>(&mut self, dt: f64, hold: F) -> CursorStatus
    where
        F: Fn(usize) -> f64,
    {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }

        let mut status = CursorStatus::Unchanged;
        for _ in 0..MAX_STEPS_PER_TICK {
            let hold = hold(self.index);
            let hold = if hold.is_finite() && hold > 0.0 {
                hold
            } else {
                0.0
            };

            if hold > 0.0 && self.elapsed < hold {
                return status;
            }
            if hold == 0.0 && status == CursorStatus::Moved {
                self.elapsed = 0.0;
                return status;
            }

            self.elapsed = (self.elapsed - hold).max(0.0);
            if !self.next() {
                return CursorStatus::Finished;
            }
            status = CursorStatus::Moved;
        }

        self.elapsed = 0.0;
        status
    }
}

/// Normalized position (0.0 to 1.0) within an EFX cycle.
#[derive(Clone, Debug)]
pub struct PhaseCursor {
    phase: f64,
    direction: Direction,
    run_order: RunOrder,
}

impl PhaseCursor {
    pub fn new(run_order: RunOrder, direction: Direction) -> Self {
        let phase = match direction {
            Direction::Forward => 0.0,
            Direction::Backward => 1.0,
        };
        Self {
            phase,
            direction,
            run_order,
        }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Move the phase by `delta` cycles. Returns false once a single shot
    /// cycle has completed.
    pub fn advance(&mut self, delta: f64) -> bool {
        if !delta.is_finite() || delta <= 0.0 {
            return true;
        }

        match self.run_order {
            RunOrder::Loop => {
                let step = match self.direction {
                    Direction::Forward => delta,
                    Direction::Backward => -delta,
                };
                self.phase = (self.phase + step).rem_euclid(1.0);
                true
            }
            RunOrder::SingleShot => match self.direction {
                Direction::Forward => {
                    self.phase += delta;
                    if self.phase >= 1.0 {
                        self.phase = 1.0;
                        return false;
                    }
                    true
                }
                Direction::Backward => {
                    self.phase -= delta;
                    if self.phase <= 0.0 {
                        self.phase = 0.0;
                        return false;
                    }
                    true
                }
            },
            RunOrder::PingPong => {
                // Unfold onto a 0..2 track: 0..1 runs forward, 1..2 runs back.
                let unfolded = match self.direction {
                    Direction::Forward => self.phase,
                    Direction::Backward => 2.0 - self.phase,
                };
                let unfolded = (unfolded + delta).rem_euclid(2.0);
                if unfolded < 1.0 {
                    self.phase = unfolded;
                    self.direction = Direction::Forward;
                } else {
                    self.phase = 2.0 - unfolded;
                    self.direction = Direction::Backward;
                }
                true
            }
        }
    }
}
