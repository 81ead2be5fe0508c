pub mod cli;
pub mod cluster;
pub mod config;
pub mod core;

// Re-exports
pub use cluster::{select, Cluster, Selector};
pub use config::{AuthSettings, ClusterSettings, Settings};
pub use core::errors::{ClusterError, TransportError};
pub use core::inventory::{DomainRecord, DomainState, HostRecord};
pub use core::libvirt::LibvirtTransport;
pub use core::transport::{Connection, CredentialSource, DomainApi, HostInfo, Transport};
