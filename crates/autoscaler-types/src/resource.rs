//! Cloud resource records.
//!
//! A [`CloudResource`] is the provider-neutral view of a single object the
//! autoscaler can observe or mutate. The kind-specific part lives in
//! [`ResourcePayload`]; everything a handler needs to address the object
//! (ID, name, zone, tags) sits on the record itself.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Kinds ──────────────────────────────────────────────────────────

/// Logical resource kinds known to the autoscaler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Server,
    /// A fleet of identically shaped servers sized between min and max.
    ServerGroup,
    /// One member of a [`ResourceKind::ServerGroup`].
    ServerGroupInstance,
    Elb,
    Gslb,
    Dns,
    LoadBalancer,
    Router,
}

impl ResourceKind {
    /// Global kinds are not bound to a zone.
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Elb | Self::Gslb | Self::Dns)
    }

    /// Kinds that can appear as the parent of a server.
    pub fn can_be_parent(&self) -> bool {
        matches!(
            self,
            Self::Elb | Self::Gslb | Self::Dns | Self::LoadBalancer | Self::Router
        )
    }

    /// The kind under which the cloud stores objects of this logical kind.
    pub fn cloud_kind(&self) -> ResourceKind {
        match self {
            Self::ServerGroup | Self::ServerGroupInstance => Self::Server,
            other => *other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "Server",
            Self::ServerGroup => "ServerGroup",
            Self::ServerGroupInstance => "ServerGroupInstance",
            Self::Elb => "ELB",
            Self::Gslb => "GSLB",
            Self::Dns => "DNS",
            Self::LoadBalancer => "LoadBalancer",
            Self::Router => "Router",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Records ────────────────────────────────────────────────────────

/// One object as seen through the cloud API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudResource {
    /// Empty until the cloud has assigned an ID.
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// `None` for global resources.
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
    pub payload: ResourcePayload,
}

impl CloudResource {
    /// Build a record that does not exist in the cloud yet.
    pub fn new(name: impl Into<String>, zone: Option<String>, payload: ResourcePayload) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            zone,
            tags: Vec::new(),
            description: String::new(),
            modified_at: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.payload.kind()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn as_server(&self) -> Option<&ServerSpec> {
        match &self.payload {
            ResourcePayload::Server(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_server_mut(&mut self) -> Option<&mut ServerSpec> {
        match &mut self.payload {
            ResourcePayload::Server(s) => Some(s),
            _ => None,
        }
    }
}

/// Kind-specific state of a [`CloudResource`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourcePayload {
    Server(ServerSpec),
    Elb(ElbSpec),
    Gslb(GslbSpec),
    Dns(DnsSpec),
    LoadBalancer(LoadBalancerSpec),
    Router(RouterSpec),
}

impl ResourcePayload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Server(_) => ResourceKind::Server,
            Self::Elb(_) => ResourceKind::Elb,
            Self::Gslb(_) => ResourceKind::Gslb,
            Self::Dns(_) => ResourceKind::Dns,
            Self::LoadBalancer(_) => ResourceKind::LoadBalancer,
            Self::Router(_) => ResourceKind::Router,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServerSpec {
    pub core: u32,
    /// Memory size in GB.
    pub memory: u32,
    #[serde(default)]
    pub dedicated_cpu: bool,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

impl ServerSpec {
    pub fn primary_ip(&self) -> Option<&str> {
        self.ip_addresses.first().map(String::as_str)
    }
}

/// A real server registered behind a load-balancing parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendServer {
    pub ip_address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ElbSpec {
    /// Connections per second.
    pub cps: u32,
    #[serde(default)]
    pub virtual_ip: String,
    #[serde(default)]
    pub servers: Vec<BackendServer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GslbSpec {
    #[serde(default)]
    pub fqdn: String,
    #[serde(default)]
    pub servers: Vec<BackendServer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DnsRecord {
    pub name: String,
    #[serde(default = "default_record_type")]
    pub record_type: String,
    pub value: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

fn default_record_type() -> String {
    "A".to_string()
}

fn default_ttl() -> u32 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DnsSpec {
    pub zone_name: String,
    #[serde(default)]
    pub records: Vec<DnsRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VirtualIp {
    pub address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub servers: Vec<BackendServer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoadBalancerSpec {
    #[serde(default)]
    pub virtual_ips: Vec<VirtualIp>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RouterSpec {
    /// Bandwidth in Mbps.
    pub band_width: u32,
}
