use lumen_fixtures::{FixtureId, UniverseId};
use thiserror::Error;

use crate::bus::BusId;
use crate::function::FunctionId;

/// Reason a function refused to start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StartError {
    #[error("Function {0} does not exist")]
    UnknownFunction(FunctionId),

    #[error("Function {function_id} references missing fixture {fixture_id}")]
    MissingFixture {
        function_id: FunctionId,
        fixture_id: FixtureId,
    },

    #[error("Function {function_id} references channel {channel} of fixture {fixture_id}, which has no such channel")]
    InvalidChannel {
        function_id: FunctionId,
        fixture_id: FixtureId,
        channel: usize,
    },

    #[error("Function {function_id} references missing bus {bus_id}")]
    MissingBus {
        function_id: FunctionId,
        bus_id: BusId,
    },

    #[error("Function {function_id} references missing function {child_id}")]
    MissingChild {
        function_id: FunctionId,
        child_id: FunctionId,
    },

    #[error("Function {0} references itself")]
    RecursiveReference(FunctionId),

    #[error("Too many running functions (limit {0})")]
    TooManyRunning(usize),

    #[error("Function {function_id} has invalid pattern parameters: {reason}")]
    InvalidPattern {
        function_id: FunctionId,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("Fixture {0} is already patched")]
    DuplicateId(FixtureId),

    #[error("Fixture {fixture_id} does not fit in universe {universe} at address {address}")]
    AddressOutOfRange {
        fixture_id: FixtureId,
        universe: UniverseId,
        address: u16,
    },

    #[error("Fixture {fixture_id} overlaps fixture {other_id} in universe {universe}")]
    AddressConflict {
        fixture_id: FixtureId,
        other_id: FixtureId,
        universe: UniverseId,
    },

    #[error("Fixture {0} is not patched")]
    UnknownFixture(FixtureId),
}
