//! Network configuration

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use cosim_core::{CosimError, CosimResult};

/// Default one-way delay between any two nodes
pub const DEFAULT_LINK_DELAY: &str = "1ms";

/// Default jitter bound; no jitter
pub const DEFAULT_JITTER: &str = "0ns";

/// One bridge application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node name
    pub name: String,
    /// Local address; `None` binds the any-address
    #[serde(default)]
    pub address: Option<IpAddr>,
    #[serde(default)]
    pub port: u16,
}

impl NodeConfig {
    pub fn new(name: &str, address: IpAddr, port: u16) -> Self {
        NodeConfig {
            name: name.to_string(),
            address: Some(address),
            port,
        }
    }

    pub fn local(&self) -> Option<SocketAddr> {
        self.address.map(|ip| SocketAddr::new(ip, self.port))
    }
}

/// The simulated network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Link delay as a duration string
    pub link_delay: String,
    /// Lower bound of the random extra delay added to every packet
    pub jitter_min: String,
    /// Upper bound of the random extra delay added to every packet
    pub jitter_max: String,
    /// Seed for the jitter draws
    pub jitter_seed: u64,
    pub nodes: Vec<NodeConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            link_delay: DEFAULT_LINK_DELAY.to_string(),
            jitter_min: DEFAULT_JITTER.to_string(),
            jitter_max: DEFAULT_JITTER.to_string(),
            jitter_seed: 0,
            nodes: Vec::new(),
        }
    }
}

impl NetworkConfig {
    pub fn from_json(text: &str) -> CosimResult<Self> {
        let config: NetworkConfig =
            serde_json::from_str(text).map_err(|e| CosimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Two nodes on one IPv4 subnet, `10.0.0.1` and `10.0.0.2`
    pub fn pair(a: &str, b: &str, port: u16) -> Self {
        NetworkConfig {
            nodes: vec![
                NodeConfig::new(a, IpAddr::from([10, 0, 0, 1]), port),
                NodeConfig::new(b, IpAddr::from([10, 0, 0, 2]), port),
            ],
            ..Default::default()
        }
    }

    /// Set the jitter range
    pub fn with_jitter(mut self, min: &str, max: &str) -> Self {
        self.jitter_min = min.to_string();
        self.jitter_max = max.to_string();
        self
    }

    /// Every node needs a non-empty, unique name
    pub fn validate(&self) -> CosimResult<()> {
        for (i, node) in self.nodes.iter().enumerate() {
            if node.name.is_empty() {
                return Err(CosimError::MissingName);
            }
            if self.nodes[..i].iter().any(|n| n.name == node.name) {
                return Err(CosimError::DuplicateName(node.name.clone()));
            }
        }
        Ok(())
    }
}
