use ailab_inference::{ConnectionRegistry, ContainerProviderConnection, VmType};

/// Connection registry over a fixed list of connections
#[derive(Debug, Clone, Default)]
pub struct MockConnectionRegistry {
    connections: Vec<ContainerProviderConnection>,
}

impl MockConnectionRegistry {
    pub fn new(connections: Vec<ContainerProviderConnection>) -> Self {
        Self { connections }
    }

    /// A single running connection on `vm_type` (`None` for a native engine)
    pub fn single(vm_type: Option<VmType>) -> Self {
        Self::new(vec![ContainerProviderConnection::new(
            "podman-machine-default",
            vm_type,
        )])
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl ConnectionRegistry for MockConnectionRegistry {
    fn get_named_connection(&self, name: &str) -> Option<ContainerProviderConnection> {
        self.connections.iter().find(|c| c.name == name).cloned()
    }

    fn get_any_running_connection(&self) -> Option<ContainerProviderConnection> {
        self.connections.iter().find(|c| c.is_running()).cloned()
    }
}
