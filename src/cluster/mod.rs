//! Cluster-wide fan-out: connections, inventory collection, name lookup.
//!
//! Everything here is a lazy single pass in configured host-list order. A
//! host that cannot be reached or queried is skipped with a diagnostic; one
//! bad host never aborts the batch. The only exceptions are data-integrity
//! violations (see [`ClusterError::is_fatal`]), which do.

pub mod select;

pub use select::{select, Selector};

use tracing::warn;

use crate::config::Settings;
use crate::core::errors::ClusterError;
use crate::core::inventory::{DomainRecord, HostRecord};
use crate::core::transport::Transport;

pub struct Cluster<T> {
    transport: T,
    settings: Settings,
}

impl<T: Transport> Cluster<T> {
    pub fn new(transport: T, settings: Settings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Opens one connection per configured host, lazily and in list order.
    /// Unreachable hosts are skipped after a single diagnostic.
    pub fn connections(&self) -> impl Iterator<Item = T::Conn> + '_ {
        self.settings
            .host_uris()
            .into_iter()
            .filter_map(move |uri| match self.transport.open(&uri, &self.settings) {
                Ok(conn) => Some(conn),
                Err(e) => {
                    warn!("{}: {}", uri, e);
                    None
                }
            })
    }

    /// Host inventory, one record per reachable host. A metadata-fetch
    /// failure surfaces as an `Err` for that host only.
    pub fn hosts(&self) -> impl Iterator<Item = Result<HostRecord<T::Conn>, ClusterError>> + '_ {
        self.connections().map(HostRecord::collect)
    }

    /// Domain inventory across all hosts, running domains only.
    pub fn active_domains(&self) -> impl Iterator<Item = Result<DomainRecord, ClusterError>> + '_ {
        self.domains(false)
    }

    /// Domain inventory across all hosts. With `include_defined`, inactive
    /// defined domains follow the running ones for each host. The next host
    /// is not contacted until the current host's records are consumed.
    pub fn domains(
        &self,
        include_defined: bool,
    ) -> impl Iterator<Item = Result<DomainRecord, ClusterError>> + '_ {
        self.hosts().flat_map(move |host| {
            let mut records: Vec<Result<DomainRecord, ClusterError>> = Vec::new();
            match host {
                Ok(h) => {
                    match h.collect_active() {
                        Ok(ds) => records.extend(ds.into_iter().map(Ok)),
                        Err(e) => records.push(Err(e)),
                    }
                    if include_defined {
                        match h.collect_defined() {
                            Ok(ds) => records.extend(ds.into_iter().map(Ok)),
                            Err(e) => records.push(Err(e)),
                        }
                    }
                }
                Err(e) => records.push(Err(e)),
            }
            records.into_iter()
        })
    }

    /// Finds domains by name across the cluster. A pattern containing a
    /// glob wildcard (`*`, `?`, `[`) is matched shell-style against every
    /// active domain's name; a plain name is looked up exactly on each
    /// host, and a name colliding across hosts returns every match. An
    /// empty result is not an error.
    pub fn lookup(&self, pattern: &str) -> Result<Vec<DomainRecord>, ClusterError> {
        if pattern.contains(['*', '?', '[']) {
            self.lookup_by_pattern(pattern)
        } else {
            self.lookup_by_name(pattern)
        }
    }

    fn lookup_by_pattern(&self, pattern: &str) -> Result<Vec<DomainRecord>, ClusterError> {
        let pat = glob::Pattern::new(pattern).map_err(|source| ClusterError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let mut matches = Vec::new();
        for record in self.active_domains() {
            match record {
                Ok(d) if pat.matches(&d.name) => matches.push(d),
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("{e}"),
            }
        }
        Ok(matches)
    }

    fn lookup_by_name(&self, name: &str) -> Result<Vec<DomainRecord>, ClusterError> {
        let mut matches = Vec::new();
        for host in self.hosts() {
            match host {
                Ok(h) => match h.lookup_exact(name) {
                    Ok(Some(d)) => matches.push(d),
                    Ok(None) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!("{e}"),
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("{e}"),
            }
        }
        Ok(matches)
    }
}
