use serde::{Deserialize, Serialize};

use super::FunctionId;

/// Functions started and stopped together. Has no timing of its own.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Collection {
    pub members: Vec<FunctionId>,
}

impl Collection {
    pub fn new(members: Vec<FunctionId>) -> Self {
        Self { members }
    }

    /// Adds a member unless it is already part of the collection.
    pub fn add(&mut self, function_id: FunctionId) -> bool {
        if self.members.contains(&function_id) {
            return false;
        }
        self.members.push(function_id);
        true
    }

    pub fn remove(&mut self, function_id: FunctionId) {
        self.members.retain(|m| *m != function_id);
    }
}
