//! Typed inventory records collected from cluster hosts.

use std::fmt;

use crate::core::errors::{ClusterError, TransportError};
use crate::core::transport::{Connection, DomainApi};

/// Inventory for a single reachable host. Owns its connection exclusively
/// for the duration of the query; read-only once collected.
pub struct HostRecord<C> {
    conn: C,
    pub uri: String,
    pub hostname: String,
    pub hypervisor: String,
    pub arch: String,
    pub mem_total_mb: u64,
    pub mem_avail_mb: u64,
    pub cpus: u32,
    pub active_domains: u32,
    pub defined_domains: u32,
}

/// Inventory for a single domain. References its host by URI only; the
/// record never outlives the query pass that produced it.
#[derive(Debug, Clone)]
pub struct DomainRecord {
    pub host_uri: String,
    pub host_hostname: String,
    pub name: String,
    pub persistent: bool,
    pub state: DomainState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    Running,
    Idle,
    Paused,
    Shutdown,
    Off,
    Crashed,
    NoState,
}

impl DomainState {
    /// Maps a raw platform state code. The table is exhaustive by platform
    /// contract (virDomainState: NOSTATE=0, RUNNING=1, BLOCKED=2, PAUSED=3,
    /// SHUTDOWN=4, SHUTOFF=5, CRASHED=6); anything else is a data-integrity
    /// violation handled by the caller.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(DomainState::NoState),
            1 => Some(DomainState::Running),
            2 => Some(DomainState::Idle),
            3 => Some(DomainState::Paused),
            4 => Some(DomainState::Shutdown),
            5 => Some(DomainState::Off),
            6 => Some(DomainState::Crashed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DomainState::Running => "running",
            DomainState::Idle => "idle",
            DomainState::Paused => "paused",
            DomainState::Shutdown => "shutdown",
            DomainState::Off => "off",
            DomainState::Crashed => "crashed",
            DomainState::NoState => "nostate",
        }
    }
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strips the architecture label down to its leading alphanumeric token.
/// The esx driver reports the full CPU model string in this field, which
/// would otherwise break one-column-per-field output.
pub fn normalize_arch(raw: &str) -> String {
    raw.trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn host_query(uri: &str, source: TransportError) -> ClusterError {
    ClusterError::HostQuery {
        uri: uri.to_string(),
        source,
    }
}

impl<C: Connection> HostRecord<C> {
    /// Queries host metadata over an open connection. Fails as a unit: a
    /// partial record is never produced.
    pub fn collect(conn: C) -> Result<Self, ClusterError> {
        let uri = conn.uri().to_string();
        let hostname = conn.hostname().map_err(|e| host_query(&uri, e))?;
        let hypervisor = conn.hypervisor().map_err(|e| host_query(&uri, e))?;
        let info = conn.host_info().map_err(|e| host_query(&uri, e))?;
        let free_bytes = conn.free_memory().map_err(|e| host_query(&uri, e))?;
        let active_domains = conn.num_active_domains().map_err(|e| host_query(&uri, e))?;
        let defined_domains = conn.num_defined_domains().map_err(|e| host_query(&uri, e))?;

        Ok(Self {
            hostname,
            hypervisor,
            arch: normalize_arch(&info.model),
            mem_total_mb: info.memory_kib / 1024,
            mem_avail_mb: free_bytes / (1024 * 1024),
            cpus: info.cpus,
            active_domains,
            defined_domains,
            uri,
            conn,
        })
    }

    /// Active domains divided by CPU count; the load-density proxy used by
    /// the packing selector. Real division, so a 1-domain 2-CPU host scores
    /// under a 3-domain 2-CPU one instead of tying at zero.
    pub fn packing_ratio(&self) -> f64 {
        if self.cpus == 0 {
            f64::INFINITY
        } else {
            f64::from(self.active_domains) / f64::from(self.cpus)
        }
    }

    /// Records for every running domain, in platform enumeration order.
    pub fn collect_active(&self) -> Result<Vec<DomainRecord>, ClusterError> {
        let ids = self
            .conn
            .active_domain_ids()
            .map_err(|e| host_query(&self.uri, e))?;
        ids.into_iter()
            .map(|id| {
                let dom = self
                    .conn
                    .domain_by_id(id)
                    .map_err(|e| host_query(&self.uri, e))?;
                DomainRecord::collect(self, &dom)
            })
            .collect()
    }

    /// Records for defined but inactive domains. A name that vanishes
    /// between enumeration and lookup is skipped, not an error.
    pub fn collect_defined(&self) -> Result<Vec<DomainRecord>, ClusterError> {
        let names = self
            .conn
            .defined_domain_names()
            .map_err(|e| host_query(&self.uri, e))?;
        let mut records = Vec::with_capacity(names.len());
        for name in &names {
            match self
                .conn
                .domain_by_name(name)
                .map_err(|e| host_query(&self.uri, e))?
            {
                Some(dom) => records.push(DomainRecord::collect(self, &dom)?),
                None => continue,
            }
        }
        Ok(records)
    }

    /// Exact-name lookup on this host. `None` when the host has no domain
    /// with that name.
    pub fn lookup_exact(&self, name: &str) -> Result<Option<DomainRecord>, ClusterError> {
        match self
            .conn
            .domain_by_name(name)
            .map_err(|e| host_query(&self.uri, e))?
        {
            Some(dom) => Ok(Some(DomainRecord::collect(self, &dom)?)),
            None => Ok(None),
        }
    }
}

impl<C> fmt::Debug for HostRecord<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRecord")
            .field("uri", &self.uri)
            .field("hostname", &self.hostname)
            .field("hypervisor", &self.hypervisor)
            .field("arch", &self.arch)
            .field("mem_total_mb", &self.mem_total_mb)
            .field("mem_avail_mb", &self.mem_avail_mb)
            .field("cpus", &self.cpus)
            .field("active_domains", &self.active_domains)
            .field("defined_domains", &self.defined_domains)
            .finish_non_exhaustive()
    }
}

impl DomainRecord {
    pub fn collect<C: Connection>(
        host: &HostRecord<C>,
        dom: &C::Domain,
    ) -> Result<Self, ClusterError> {
        let name = dom.name().map_err(|e| host_query(&host.uri, e))?;
        let code = dom.state_code().map_err(|e| host_query(&host.uri, e))?;
        let state = DomainState::from_code(code).ok_or_else(|| {
            ClusterError::UnknownDomainState {
                name: name.clone(),
                code,
            }
        })?;
        let persistent = dom.is_persistent().map_err(|e| host_query(&host.uri, e))?;

        Ok(Self {
            host_uri: host.uri.clone(),
            host_hostname: host.hostname.clone(),
            name,
            persistent,
            state,
        })
    }
}
