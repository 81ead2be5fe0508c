//! Capability traits over the virtualization management protocol.
//!
//! The cluster logic never speaks the wire protocol itself; it consumes a
//! [`Transport`] that opens connections and hands back typed handles. The
//! production implementation lives in [`crate::core::libvirt`]; tests drive
//! the same code paths through an in-memory transport.

use crate::core::errors::TransportError;

/// Supplies credentials for interactive authentication prompts issued while
/// opening a connection. Keyed by the endpoint URI being connected to.
pub trait CredentialSource {
    fn username(&self, uri: &str) -> Option<String>;
    fn password(&self, uri: &str) -> Option<String>;
}

/// Raw host metadata as reported by the platform, before normalization.
#[derive(Debug, Clone)]
pub struct HostInfo {
    /// Architecture label. Some drivers report a full CPU model string here.
    pub model: String,
    /// Total host memory in KiB.
    pub memory_kib: u64,
    /// Number of physical CPUs.
    pub cpus: u32,
}

pub trait Transport {
    type Conn: Connection;

    fn open(
        &self,
        uri: &str,
        credentials: &dyn CredentialSource,
    ) -> Result<Self::Conn, TransportError>;
}

/// An open connection to a single hypervisor host.
pub trait Connection {
    type Domain: DomainApi;

    /// Canonical URI of this connection.
    fn uri(&self) -> &str;

    fn hostname(&self) -> Result<String, TransportError>;

    /// Hypervisor driver name, e.g. "QEMU" or "ESX".
    fn hypervisor(&self) -> Result<String, TransportError>;

    fn host_info(&self) -> Result<HostInfo, TransportError>;

    /// Free memory on the host, in bytes.
    fn free_memory(&self) -> Result<u64, TransportError>;

    fn num_active_domains(&self) -> Result<u32, TransportError>;

    fn num_defined_domains(&self) -> Result<u32, TransportError>;

    /// IDs of running domains, in platform enumeration order.
    fn active_domain_ids(&self) -> Result<Vec<u32>, TransportError>;

    /// Names of defined but inactive domains.
    fn defined_domain_names(&self) -> Result<Vec<String>, TransportError>;

    fn domain_by_id(&self, id: u32) -> Result<Self::Domain, TransportError>;

    /// Looks up a domain by exact name. A missing domain is `None`, not an
    /// error; the caller decides whether that matters.
    fn domain_by_name(&self, name: &str) -> Result<Option<Self::Domain>, TransportError>;
}

/// A handle to a single domain on an open connection.
pub trait DomainApi {
    fn name(&self) -> Result<String, TransportError>;

    fn is_persistent(&self) -> Result<bool, TransportError>;

    /// Raw numeric domain state as defined by the platform.
    fn state_code(&self) -> Result<u32, TransportError>;
}
