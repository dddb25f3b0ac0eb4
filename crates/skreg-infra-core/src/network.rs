//! Network component contract.

use crate::output::Output;

/// Number of availability zones the network spans.
pub const ZONE_COUNT: usize = 2;

#[derive(Debug, Clone)]
pub struct NetworkOutputs {
    pub vpc_id: Output<String>,
    pub public_subnet_ids: [Output<String>; ZONE_COUNT],
    pub private_subnet_ids: [Output<String>; ZONE_COUNT],
}

impl NetworkOutputs {
    /// Private subnet ids collected into one value.
    pub fn private_subnets(&self) -> Output<Vec<String>> {
        Output::all(self.private_subnet_ids.iter().cloned())
    }

    /// Public subnet ids collected into one value.
    pub fn public_subnets(&self) -> Output<Vec<String>> {
        Output::all(self.public_subnet_ids.iter().cloned())
    }
}

/// An isolated network partition with public and private subnets.
pub trait Network {
    fn outputs(&self) -> &NetworkOutputs;
}
