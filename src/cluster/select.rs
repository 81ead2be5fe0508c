//! Placement selection: pick one host for a new workload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::ClusterError;
use crate::core::inventory::HostRecord;
use crate::core::transport::Connection;

/// Scoring rule for placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selector {
    /// Most available free memory wins.
    Mem,
    /// Lowest active-domains-per-CPU ratio wins.
    Packing,
}

impl FromStr for Selector {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mem" => Ok(Selector::Mem),
            "packing" => Ok(Selector::Packing),
            other => Err(ClusterError::UnknownSelector(other.to_string())),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Selector::Mem => "mem",
            Selector::Packing => "packing",
        })
    }
}

/// Single-pass reduction over host inventory. Hosts not matching the
/// case-insensitive hypervisor type filter are dropped; the running best
/// starts at the first surviving host and is replaced only on a strictly
/// better score, so ties keep the earlier host. `None` when the filtered
/// set is empty.
pub fn select<C, I>(
    hosts: I,
    type_filter: Option<&str>,
    selector: Selector,
) -> Option<HostRecord<C>>
where
    C: Connection,
    I: IntoIterator<Item = HostRecord<C>>,
{
    let mut best: Option<HostRecord<C>> = None;
    for host in hosts {
        if let Some(wanted) = type_filter {
            if !host.hypervisor.eq_ignore_ascii_case(wanted) {
                continue;
            }
        }
        best = Some(match best.take() {
            None => host,
            Some(current) => match selector {
                Selector::Mem if host.mem_avail_mb > current.mem_avail_mb => host,
                Selector::Packing if host.packing_ratio() < current.packing_ratio() => host,
                _ => current,
            },
        });
    }
    best
}
