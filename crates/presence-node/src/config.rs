//! Node configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use presence_fusion::{Device, FusionConfig};
use presence_transfer::{TransportConfig, DEFAULT_MESH_PORT};

use crate::error::{Error, Result};

/// Configuration for a presence node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// This access point's mesh name
    pub client_id: String,

    /// UDP port shared by the whole mesh
    pub mesh_port: u16,

    /// Interface the listener binds to
    pub bind_ip: IpAddr,

    /// Destination for outgoing broadcasts
    pub broadcast_ip: IpAddr,

    /// JSON file mapping access point names to positions
    pub coordinates_path: Option<PathBuf>,

    /// JSON file listing the devices to track
    pub devices_path: Option<PathBuf>,

    /// Drop our own broadcasts when they loop back
    pub ignore_self: bool,

    /// Interval between closest-access-point summaries in the log
    pub report_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            client_id: "notset".to_string(),
            mesh_port: DEFAULT_MESH_PORT,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            broadcast_ip: IpAddr::V4(Ipv4Addr::BROADCAST),
            coordinates_path: None,
            devices_path: None,
            ignore_self: false,
            report_interval: Duration::from_secs(60),
        }
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let client_id = lookup("PRESENCE_CLIENT_ID")
            .or_else(|| lookup("HOSTNAME"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.client_id);
        if client_id.len() > presence_fusion::MAX_CLIENT_ID_LEN {
            return Err(Error::Config(format!(
                "PRESENCE_CLIENT_ID longer than {} bytes",
                presence_fusion::MAX_CLIENT_ID_LEN
            )));
        }

        let mesh_port = parse_var(&lookup, "PRESENCE_MESH_PORT")?.unwrap_or(defaults.mesh_port);
        let bind_ip = parse_var(&lookup, "PRESENCE_BIND_ADDR")?.unwrap_or(defaults.bind_ip);
        let broadcast_ip =
            parse_var(&lookup, "PRESENCE_BROADCAST_ADDR")?.unwrap_or(defaults.broadcast_ip);
        let ignore_self = parse_var(&lookup, "PRESENCE_IGNORE_SELF")?.unwrap_or(defaults.ignore_self);
        let report_interval = parse_var::<u64>(&lookup, "PRESENCE_REPORT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.report_interval);
        if report_interval.is_zero() {
            return Err(Error::Config("PRESENCE_REPORT_SECS must be positive".into()));
        }

        let coordinates_path = lookup("PRESENCE_COORDINATES").map(PathBuf::from);
        let devices_path = lookup("PRESENCE_DEVICES").map(PathBuf::from);

        Ok(Self {
            client_id,
            mesh_port,
            bind_ip,
            broadcast_ip,
            coordinates_path,
            devices_path,
            ignore_self,
            report_interval,
        })
    }

    /// Transport settings derived from this config.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            bind: SocketAddr::new(self.bind_ip, self.mesh_port),
            broadcast: SocketAddr::new(self.broadcast_ip, self.mesh_port),
            ..TransportConfig::for_port(self.mesh_port)
        }
    }

    /// Fusion settings derived from this config.
    pub fn fusion_config(&self) -> FusionConfig {
        FusionConfig {
            client_id: Some(self.client_id.clone()),
            ignore_self: self.ignore_self,
        }
    }

    /// Devices listed in `devices_path`, or none.
    pub fn load_devices(&self) -> Result<Vec<Device>> {
        match &self.devices_path {
            Some(path) => {
                let json = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&json)?)
            }
            None => Ok(Vec::new()),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn config_from(vars: &[(&str, &str)]) -> Result<NodeConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(
            config.transport_config().broadcast,
            "255.255.255.255:7779".parse().unwrap()
        );
    }

    #[test]
    fn env_overrides() {
        let config = config_from(&[
            ("PRESENCE_CLIENT_ID", "kitchen"),
            ("PRESENCE_MESH_PORT", "8000"),
            ("PRESENCE_BIND_ADDR", "127.0.0.1"),
            ("PRESENCE_BROADCAST_ADDR", "192.168.1.255"),
            ("PRESENCE_IGNORE_SELF", "true"),
            ("PRESENCE_REPORT_SECS", "5"),
            ("PRESENCE_COORDINATES", "/etc/presence/coordinates.json"),
        ])
        .unwrap();

        assert_eq!(config.client_id, "kitchen");
        assert!(config.ignore_self);
        assert_eq!(config.report_interval, Duration::from_secs(5));
        assert_eq!(config.transport_config().bind, "127.0.0.1:8000".parse().unwrap());
        assert_eq!(
            config.transport_config().broadcast,
            "192.168.1.255:8000".parse().unwrap()
        );
        assert_eq!(config.fusion_config().client_id.as_deref(), Some("kitchen"));
        assert!(config.devices_path.is_none());
    }

    #[test]
    fn hostname_is_fallback_name() {
        let config = config_from(&[("HOSTNAME", "pi3study")]).unwrap();
        assert_eq!(config.client_id, "pi3study");
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(matches!(
            config_from(&[("PRESENCE_MESH_PORT", "seventy")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("PRESENCE_BIND_ADDR", "not-an-ip")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("PRESENCE_REPORT_SECS", "0")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("PRESENCE_CLIENT_ID", "x".repeat(40).as_str())]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn devices_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"mac": "aa:bb:cc:dd:ee:01", "name": "pixel", "category": "phone"}},
                {{"mac": "aa:bb:cc:dd:ee:02", "category": "beacon"}}]"#
        )
        .unwrap();

        let config = NodeConfig {
            devices_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let devices = config.load_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "pixel");
        assert_eq!(NodeConfig::default().load_devices().unwrap().len(), 0);
    }
}
