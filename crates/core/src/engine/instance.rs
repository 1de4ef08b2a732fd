use crate::bus::BusSnapshot;
use crate::function::run_order::{CursorStatus, PhaseCursor, StepCursor};
use crate::function::{Function, FunctionId, FunctionKind, RunState};
use crate::patch::Patch;
use crate::universe::ChannelWrite;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-activation state of each function kind.
#[derive(Clone, Debug)]
pub(crate) enum Runtime {
    Scene,
    Chaser {
        cursor: Option<StepCursor>,
        child: Option<InstanceId>,
    },
    Efx {
        cursor: PhaseCursor,
    },
    Collection,
}

/// What the engine has to do after an instance advanced.
#[derive(Debug, PartialEq)]
pub(crate) enum Transition {
    None,
    /// The chaser moved on: stop the previous child and start `next`.
    Step {
        previous: Option<InstanceId>,
        next: FunctionId,
    },
    Finished,
    /// A reference went away while running.
    Invalid(String),
}

#[derive(Clone, Debug)]
pub(crate) struct RunningInstance {
    pub id: InstanceId,
    pub function_id: FunctionId,
    pub parent: Option<InstanceId>,
    pub state: RunState,
    pub runtime: Runtime,
    pub scratch: Vec<ChannelWrite>,
}

impl RunningInstance {
    pub fn new(id: InstanceId, function: &Function, parent: Option<InstanceId>) -> Self {
        let (runtime, empty) = match &function.kind {
            FunctionKind::Scene(_) => (Runtime::Scene, false),
            FunctionKind::Chaser(chaser) => {
                let cursor = StepCursor::new(chaser.steps.len(), chaser.run_order, chaser.direction);
                let empty = cursor.is_none();
                (Runtime::Chaser { cursor, child: None }, empty)
            }
            FunctionKind::Efx(efx) => (
                Runtime::Efx {
                    cursor: PhaseCursor::new(efx.run_order, efx.direction),
                },
                efx.fixtures.is_empty(),
            ),
            FunctionKind::Collection(collection) => {
                (Runtime::Collection, collection.members.is_empty())
            }
        };

        Self {
            id,
            function_id: function.id,
            parent,
            // Nothing to traverse: complete without ever writing.
            state: if empty {
                RunState::Completed
            } else {
                RunState::Idle
            },
            runtime,
            scratch: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// First function a chaser has to start.
    pub fn initial_step(&self, function: &Function) -> Option<FunctionId> {
        match (&self.runtime, &function.kind) {
            (Runtime::Chaser { cursor: Some(cursor), .. }, FunctionKind::Chaser(chaser)) => {
                chaser.step(cursor.index()).map(|s| s.function_id)
            }
            _ => None,
        }
    }

    pub fn advance(&mut self, function: &Function, dt: f64, buses: &BusSnapshot) -> Transition {
        // A fresh instance holds its start position for the tick it started in.
        if self.state == RunState::Idle {
            self.state = RunState::Running;
            return Transition::None;
        }

        match (&mut self.runtime, &function.kind) {
            (Runtime::Scene, _) | (Runtime::Collection, _) => Transition::None,
            (Runtime::Chaser { cursor, child }, FunctionKind::Chaser(chaser)) => {
                let Some(cursor) = cursor else {
                    return Transition::Finished;
                };
                if chaser.hold_seconds(cursor.index(), buses).is_none() {
                    return Transition::Invalid(format!(
                        "speed bus {:?} is no longer defined",
                        chaser.speed.bus()
                    ));
                }

                match cursor.advance(dt, |i| chaser.hold_seconds(i, buses).unwrap_or(0.0)) {
                    CursorStatus::Unchanged => Transition::None,
                    CursorStatus::Finished => Transition::Finished,
                    CursorStatus::Moved => match chaser.step(cursor.index()) {
                        Some(step) => Transition::Step {
                            previous: child.take(),
                            next: step.function_id,
                        },
                        None => Transition::Invalid("step list changed".to_string()),
                    },
                }
            }
            (Runtime::Efx { cursor }, FunctionKind::Efx(efx)) => {
                let Some(delta) = efx.phase_delta(dt, buses) else {
                    return Transition::Invalid(format!(
                        "speed bus {:?} is no longer defined",
                        efx.speed.bus()
                    ));
                };
                if cursor.advance(delta) {
                    Transition::None
                } else {
                    Transition::Finished
                }
            }
            _ => Transition::Invalid(format!(
                "function changed type to {}",
                function.type_name()
            )),
        }
    }

    /// Fill the scratch buffer with this instance's channel levels.
    pub fn render(&mut self, function: &Function, patch: &Patch) {
        self.scratch.clear();
        match (&self.runtime, &function.kind) {
            (Runtime::Scene, FunctionKind::Scene(scene)) => scene.render(patch, &mut self.scratch),
            (Runtime::Efx { cursor }, FunctionKind::Efx(efx)) => {
                efx.render(cursor.phase(), patch, &mut self.scratch)
            }
            _ => {}
        }
    }

    pub fn set_child(&mut self, id: InstanceId) {
        if let Runtime::Chaser { child, .. } = &mut self.runtime {
            *child = Some(id);
        }
    }
}
