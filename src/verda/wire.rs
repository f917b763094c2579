//! Serde representations of Verda API payloads.

use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::provider::{CreateInstance, Instance, LifecycleState, SshKey};
use crate::shape::Sku;

#[derive(Debug, Serialize)]
pub(super) struct TokenRequest<'a> {
    pub grant_type: &'static str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireInstance {
    pub id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub startup_script_id: Option<String>,
}

impl From<WireInstance> for Instance {
    fn from(wire: WireInstance) -> Self {
        Self {
            id: wire.id.into(),
            hostname: wire.hostname,
            state: LifecycleState::from_provider(&wire.status),
            sku: Sku::new(wire.instance_type),
            public_ip: wire.ip.as_deref().and_then(|ip| IpAddr::from_str(ip).ok()),
            location: wire.location.map(Into::into),
            script_id: wire.startup_script_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireSshKey {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl From<WireSshKey> for SshKey {
    fn from(wire: WireSshKey) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreateInstanceBody<'a> {
    pub instance_type: &'a str,
    pub image: &'a str,
    pub hostname: &'a str,
    pub description: &'a str,
    pub ssh_key_ids: &'a [String],
    pub location_code: &'a str,
    pub is_spot: bool,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub existing_volumes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_script_id: Option<&'a str>,
}

impl<'a> CreateInstanceBody<'a> {
    pub(super) fn from_spec(spec: &'a CreateInstance) -> Self {
        Self {
            instance_type: spec.sku.as_str(),
            image: &spec.image,
            hostname: &spec.hostname,
            description: &spec.description,
            ssh_key_ids: &spec.ssh_key_ids,
            location_code: spec.location.as_str(),
            is_spot: spec.spot,
            existing_volumes: &spec.volume_ids,
            startup_script_id: spec.script_id.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ActionRequest<'a> {
    pub action: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Location;

    #[test]
    fn wire_instance_maps_into_domain_snapshot() {
        let wire = WireInstance {
            id: String::from("inst-1"),
            hostname: String::from("spot-gpu-4x-1"),
            status: String::from("provisioning"),
            instance_type: String::from("4B300.120V"),
            ip: Some(String::from("192.0.2.7")),
            location: Some(String::from("FIN-02")),
            startup_script_id: None,
        };

        let instance = Instance::from(wire);

        assert_eq!(instance.state, LifecycleState::Pending);
        assert_eq!(instance.location, Some(Location::from("FIN-02")));
        assert_eq!(
            instance.public_ip,
            Some(IpAddr::from([192, 0, 2, 7])),
        );
    }

    #[test]
    fn wire_instance_drops_unparseable_addresses() {
        let wire = WireInstance {
            id: String::from("inst-1"),
            hostname: String::new(),
            status: String::from("running"),
            instance_type: String::from("1B300.30V"),
            ip: Some(String::from("pending")),
            location: None,
            startup_script_id: None,
        };

        assert_eq!(Instance::from(wire).public_ip, None);
    }

    #[test]
    fn create_body_omits_empty_optionals() {
        let spec = CreateInstance {
            sku: Sku::new("1B300.30V"),
            image: String::from("ubuntu-24.04-cuda-12.8-open-docker"),
            hostname: String::from("spot-gpu-1x-1"),
            description: String::from("test"),
            ssh_key_ids: vec![String::from("key-1")],
            location: Location::from("FIN-03"),
            spot: true,
            volume_ids: Vec::new(),
            script_id: None,
        };

        let rendered = serde_json::to_value(CreateInstanceBody::from_spec(&spec))
            .unwrap_or_else(|err| panic!("serialise create body: {err}"));

        assert!(rendered.get("existing_volumes").is_none());
        assert!(rendered.get("startup_script_id").is_none());
        assert_eq!(
            rendered.get("location_code").and_then(|v| v.as_str()),
            Some("FIN-03")
        );
    }
}
