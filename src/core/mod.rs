pub mod errors;
pub mod inventory;
pub mod libvirt;
pub mod transport;

// exports for lazy devs like us
pub use errors::{ClusterError, TransportError};
pub use inventory::{DomainRecord, DomainState, HostRecord};
pub use libvirt::LibvirtTransport;
pub use transport::{Connection, CredentialSource, DomainApi, HostInfo, Transport};
