pub mod chaser;
pub mod collection;
pub mod efx;
pub mod run_order;
pub mod scene;

use std::time::Duration;

use lumen_fixtures::FixtureId;
use serde::{Deserialize, Serialize};

pub use chaser::{Chaser, ChaserStep};
pub use collection::Collection;
pub use efx::{AxisMapping, Efx, EfxFixture, FixtureOrder};
pub use run_order::{Direction, RunOrder, RunState};
pub use scene::{Scene, SceneValue};

use crate::bus::{BusId, BusSnapshot};
use crate::errors::StartError;
use crate::patch::Patch;

pub type FunctionId = usize;

/// Where a chaser or EFX takes its timing from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Speed {
    Fixed(Duration),
    Bus(BusId),
}

impl Speed {
    /// Current duration in seconds, or `None` if the bus has gone away.
    pub fn seconds(&self, buses: &BusSnapshot) -> Option<f64> {
        match self {
            Speed::Fixed(duration) => Some(duration.as_secs_f64()),
            Speed::Bus(id) => buses.get(*id),
        }
    }

    pub fn bus(&self) -> Option<BusId> {
        match self {
            Speed::Fixed(_) => None,
            Speed::Bus(id) => Some(*id),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FunctionKind {
    Scene(Scene),
    Chaser(Chaser),
    Efx(Efx),
    Collection(Collection),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub kind: FunctionKind,
}

impl Function {
    pub fn new(id: FunctionId, name: &str, kind: FunctionKind) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
        }
    }

    pub fn scene(id: FunctionId, name: &str, scene: Scene) -> Self {
        Self::new(id, name, FunctionKind::Scene(scene))
    }

    pub fn chaser(id: FunctionId, name: &str, chaser: Chaser) -> Self {
        Self::new(id, name, FunctionKind::Chaser(chaser))
    }

    pub fn efx(id: FunctionId, name: &str, efx: Efx) -> Self {
        Self::new(id, name, FunctionKind::Efx(efx))
    }

    pub fn collection(id: FunctionId, name: &str, collection: Collection) -> Self {
        Self::new(id, name, FunctionKind::Collection(collection))
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            FunctionKind::Scene(_) => "Scene",
            FunctionKind::Chaser(_) => "Chaser",
            FunctionKind::Efx(_) => "EFX",
            FunctionKind::Collection(_) => "Collection",
        }
    }

    /// Fixtures this function writes to directly.
    pub fn fixtures(&self) -> Vec<FixtureId> {
        match &self.kind {
            FunctionKind::Scene(scene) => scene.fixtures(),
            FunctionKind::Efx(efx) => efx.fixtures.iter().map(|f| f.fixture_id).collect(),
            FunctionKind::Chaser(_) | FunctionKind::Collection(_) => Vec::new(),
        }
    }

    /// Functions this function may start.
    pub fn children(&self) -> Vec<FunctionId> {
        match &self.kind {
            FunctionKind::Scene(_) => Vec::new(),
            FunctionKind::Chaser(chaser) => chaser.steps.iter().map(|s| s.function_id).collect(),
            FunctionKind::Efx(efx) => efx.start_scene.into_iter().chain(efx.stop_scene).collect(),
            FunctionKind::Collection(collection) => collection.members.clone(),
        }
    }

    pub fn buses(&self) -> Vec<BusId> {
        match &self.kind {
            FunctionKind::Chaser(chaser) => chaser.speed.bus().into_iter().collect(),
            FunctionKind::Efx(efx) => efx.speed.bus().into_iter().collect(),
            FunctionKind::Scene(_) | FunctionKind::Collection(_) => Vec::new(),
        }
    }

    pub fn references_fixture(&self, fixture_id: FixtureId) -> bool {
        self.fixtures().contains(&fixture_id)
    }

    /// Checks the references this function holds on its own. Children are
    /// validated by the engine, which knows the whole function graph.
    pub fn validate(&self, patch: &Patch, buses: &BusSnapshot) -> Result<(), StartError> {
        for bus_id in self.buses() {
            if !buses.contains(bus_id) {
                return Err(StartError::MissingBus {
                    function_id: self.id,
                    bus_id,
                });
            }
        }

        match &self.kind {
            FunctionKind::Scene(scene) => scene.validate(self.id, patch),
            FunctionKind::Efx(efx) => efx.validate(self.id, patch),
            FunctionKind::Chaser(_) | FunctionKind::Collection(_) => Ok(()),
        }
    }
}
