// Cluster query tests over an in-memory transport. Every property here runs
// the same collection and selection paths the CLI drives against libvirt.

use std::collections::HashMap;

use anyhow::Result;
use virt_cluster_manager::core::transport::{
    Connection, CredentialSource, DomainApi, HostInfo, Transport,
};
use virt_cluster_manager::{
    select, Cluster, ClusterSettings, DomainState, HostRecord, Selector, Settings, TransportError,
};

#[derive(Clone)]
struct MockDomain {
    name: String,
    persistent: bool,
    state: u32,
}

#[derive(Clone)]
struct MockHost {
    uri: String,
    hostname: String,
    hypervisor: String,
    model: String,
    memory_kib: u64,
    free_bytes: u64,
    cpus: u32,
    active: Vec<MockDomain>,
    defined: Vec<MockDomain>,
    reachable: bool,
}

struct MockTransport {
    hosts: Vec<MockHost>,
}

struct MockConnection {
    host: MockHost,
}

struct MockDomainHandle(MockDomain);

impl Transport for MockTransport {
    type Conn = MockConnection;

    fn open(
        &self,
        uri: &str,
        _credentials: &dyn CredentialSource,
    ) -> Result<MockConnection, TransportError> {
        let host = self
            .hosts
            .iter()
            .find(|h| h.uri == uri)
            .ok_or_else(|| TransportError::Other(format!("no route to {uri}")))?;
        if !host.reachable {
            return Err(TransportError::Other("connection refused".to_string()));
        }
        Ok(MockConnection { host: host.clone() })
    }
}

impl Connection for MockConnection {
    type Domain = MockDomainHandle;

    fn uri(&self) -> &str {
        &self.host.uri
    }

    fn hostname(&self) -> Result<String, TransportError> {
        Ok(self.host.hostname.clone())
    }

    fn hypervisor(&self) -> Result<String, TransportError> {
        Ok(self.host.hypervisor.clone())
    }

    fn host_info(&self) -> Result<HostInfo, TransportError> {
        Ok(HostInfo {
            model: self.host.model.clone(),
            memory_kib: self.host.memory_kib,
            cpus: self.host.cpus,
        })
    }

    fn free_memory(&self) -> Result<u64, TransportError> {
        Ok(self.host.free_bytes)
    }

    fn num_active_domains(&self) -> Result<u32, TransportError> {
        Ok(self.host.active.len() as u32)
    }

    fn num_defined_domains(&self) -> Result<u32, TransportError> {
        Ok(self.host.defined.len() as u32)
    }

    fn active_domain_ids(&self) -> Result<Vec<u32>, TransportError> {
        Ok((0..self.host.active.len() as u32).collect())
    }

    fn defined_domain_names(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.host.defined.iter().map(|d| d.name.clone()).collect())
    }

    fn domain_by_id(&self, id: u32) -> Result<MockDomainHandle, TransportError> {
        self.host
            .active
            .get(id as usize)
            .cloned()
            .map(MockDomainHandle)
            .ok_or_else(|| TransportError::Other(format!("no domain with id {id}")))
    }

    fn domain_by_name(&self, name: &str) -> Result<Option<MockDomainHandle>, TransportError> {
        Ok(self
            .host
            .active
            .iter()
            .chain(self.host.defined.iter())
            .find(|d| d.name == name)
            .cloned()
            .map(MockDomainHandle))
    }
}

impl DomainApi for MockDomainHandle {
    fn name(&self) -> Result<String, TransportError> {
        Ok(self.0.name.clone())
    }

    fn is_persistent(&self) -> Result<bool, TransportError> {
        Ok(self.0.persistent)
    }

    fn state_code(&self) -> Result<u32, TransportError> {
        Ok(self.0.state)
    }
}

fn running(name: &str) -> MockDomain {
    MockDomain {
        name: name.to_string(),
        persistent: true,
        state: 1,
    }
}

fn host(uri: &str, free_mb: u64, cpus: u32, active: &[&str]) -> MockHost {
    MockHost {
        uri: uri.to_string(),
        hostname: uri.trim_start_matches("test://").to_string(),
        hypervisor: "QEMU".to_string(),
        model: "x86_64".to_string(),
        memory_kib: 16 * 1024 * 1024,
        free_bytes: free_mb * 1024 * 1024,
        cpus,
        active: active.iter().map(|n| running(n)).collect(),
        defined: Vec::new(),
        reachable: true,
    }
}

fn cluster(hosts: Vec<MockHost>) -> Cluster<MockTransport> {
    let uris = hosts
        .iter()
        .map(|h| h.uri.clone())
        .collect::<Vec<_>>()
        .join(" ");
    let settings = Settings {
        cluster: ClusterSettings {
            hosts: uris,
            uri: "test://{host}".to_string(),
            headers: false,
            selector: Selector::Mem,
        },
        auth: HashMap::new(),
    };
    Cluster::new(MockTransport { hosts }, settings)
}

fn collected_hosts(c: &Cluster<MockTransport>) -> Vec<HostRecord<MockConnection>> {
    c.hosts().map(|r| r.expect("host query failed")).collect()
}

#[test]
fn select_mem_prefers_most_available() {
    let c = cluster(vec![
        host("test://a", 1024, 4, &[]),
        host("test://b", 4096, 4, &[]),
        host("test://c", 2048, 4, &[]),
    ]);
    let best = select(collected_hosts(&c), None, Selector::Mem).expect("a host");
    assert_eq!(best.uri, "test://b");
}

#[test]
fn select_mem_tie_keeps_earliest_host() {
    let c = cluster(vec![
        host("test://a", 4096, 4, &[]),
        host("test://b", 4096, 4, &[]),
    ]);
    let best = select(collected_hosts(&c), None, Selector::Mem).expect("a host");
    assert_eq!(best.uri, "test://a");
}

#[test]
fn select_packing_prefers_lowest_ratio() {
    // a: 4/2 = 2.0, b: 3/4 = 0.75
    let c = cluster(vec![
        host("test://a", 1024, 2, &["a1", "a2", "a3", "a4"]),
        host("test://b", 1024, 4, &["b1", "b2", "b3"]),
    ]);
    let best = select(collected_hosts(&c), None, Selector::Packing).expect("a host");
    assert_eq!(best.uri, "test://b");
}

#[test]
fn select_packing_uses_real_division() {
    // Integer division would score both hosts 0 and keep a; real division
    // scores a at 0.5 and b at 0.0.
    let c = cluster(vec![
        host("test://a", 1024, 2, &["a1"]),
        host("test://b", 1024, 4, &[]),
    ]);
    let best = select(collected_hosts(&c), None, Selector::Packing).expect("a host");
    assert_eq!(best.uri, "test://b");
}

#[test]
fn select_packing_tie_keeps_earliest_host() {
    // 1/2 == 2/4
    let c = cluster(vec![
        host("test://a", 1024, 2, &["a1"]),
        host("test://b", 1024, 4, &["b1", "b2"]),
    ]);
    let best = select(collected_hosts(&c), None, Selector::Packing).expect("a host");
    assert_eq!(best.uri, "test://a");
}

#[test]
fn select_type_filter_is_case_insensitive() {
    let mut esx = host("test://b", 8192, 4, &[]);
    esx.hypervisor = "ESX".to_string();
    let c = cluster(vec![host("test://a", 1024, 4, &[]), esx]);
    let best = select(collected_hosts(&c), Some("esx"), Selector::Mem).expect("a host");
    assert_eq!(best.uri, "test://b");
}

#[test]
fn select_with_unmatched_type_filter_returns_none() {
    let c = cluster(vec![
        host("test://a", 1024, 4, &[]),
        host("test://b", 4096, 4, &[]),
    ]);
    assert!(select(collected_hosts(&c), Some("xen"), Selector::Mem).is_none());
}

#[test]
fn lookup_glob_matches_across_hosts_in_order() -> Result<()> {
    let c = cluster(vec![
        host("test://a", 1024, 4, &["web1", "db1"]),
        host("test://b", 1024, 4, &["web2"]),
    ]);
    let matches = c.lookup("web*")?;
    let names: Vec<_> = matches.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["web1", "web2"]);
    Ok(())
}

#[test]
fn lookup_glob_question_mark_and_brackets() -> Result<()> {
    let c = cluster(vec![host(
        "test://a",
        1024,
        4,
        &["web1", "web2", "web31", "db1"],
    )]);

    let names = |records: Vec<virt_cluster_manager::DomainRecord>| {
        records.into_iter().map(|d| d.name).collect::<Vec<_>>()
    };
    assert_eq!(names(c.lookup("web?")?), vec!["web1", "web2"]);
    assert_eq!(names(c.lookup("web[12]")?), vec!["web1", "web2"]);
    Ok(())
}

#[test]
fn lookup_exact_returns_every_colliding_name() -> Result<()> {
    let c = cluster(vec![
        host("test://a", 1024, 4, &["db1", "web1"]),
        host("test://b", 1024, 4, &["db1"]),
    ]);
    let matches = c.lookup("db1")?;
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].host_uri, "test://a");
    assert_eq!(matches[1].host_uri, "test://b");
    Ok(())
}

#[test]
fn lookup_miss_is_empty_not_an_error() -> Result<()> {
    let c = cluster(vec![host("test://a", 1024, 4, &["web1"])]);
    assert!(c.lookup("nonexistent")?.is_empty());
    assert!(c.lookup("nomatch*")?.is_empty());
    Ok(())
}

#[test]
fn unreachable_host_is_skipped_not_fatal() {
    let mut down = host("test://b", 1024, 4, &[]);
    down.reachable = false;
    let c = cluster(vec![
        host("test://a", 1024, 4, &[]),
        down,
        host("test://c", 1024, 4, &[]),
    ]);

    let reachable: Vec<_> = collected_hosts(&c);
    let uris: Vec<_> = reachable.iter().map(|h| h.uri.as_str()).collect();
    assert_eq!(uris, vec!["test://a", "test://c"]);
}

#[test]
fn host_record_normalizes_arch_and_memory() {
    let mut esx = host("test://a", 2048, 8, &[]);
    esx.model = "x86_64 Intel(R) Xeon(R) CPU".to_string();
    esx.memory_kib = 8 * 1024 * 1024;
    let c = cluster(vec![esx]);

    let hosts = collected_hosts(&c);
    assert_eq!(hosts[0].arch, "x86_64");
    assert_eq!(hosts[0].mem_total_mb, 8192);
    assert_eq!(hosts[0].mem_avail_mb, 2048);
    assert_eq!(hosts[0].cpus, 8);
}

#[test]
fn domain_records_carry_state_and_persistence() {
    let mut h = host("test://a", 1024, 4, &[]);
    h.active = vec![
        MockDomain {
            name: "web1".to_string(),
            persistent: true,
            state: 1,
        },
        MockDomain {
            name: "scratch".to_string(),
            persistent: false,
            state: 3,
        },
    ];
    let c = cluster(vec![h]);

    let records: Vec<_> = c
        .active_domains()
        .map(|r| r.expect("domain query failed"))
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].state, DomainState::Running);
    assert!(records[0].persistent);
    assert_eq!(records[1].state, DomainState::Paused);
    assert!(!records[1].persistent);
    assert_eq!(records[1].host_uri, "test://a");
}

#[test]
fn unknown_state_code_is_fatal() {
    let mut h = host("test://a", 1024, 4, &[]);
    h.active = vec![MockDomain {
        name: "web1".to_string(),
        persistent: true,
        state: 9,
    }];
    let c = cluster(vec![h]);

    let errors: Vec<_> = c.active_domains().filter_map(|r| r.err()).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_fatal());
    assert!(errors[0].to_string().contains("unknown state code 9"));
}

#[test]
fn defined_domains_follow_active_ones() {
    let mut h = host("test://a", 1024, 4, &["web1"]);
    h.defined = vec![MockDomain {
        name: "standby".to_string(),
        persistent: true,
        state: 5,
    }];
    let c = cluster(vec![h]);

    let active_only: Vec<_> = c.domains(false).map(|r| r.unwrap().name).collect();
    assert_eq!(active_only, vec!["web1"]);

    let all: Vec<_> = c.domains(true).map(|r| r.unwrap()).collect();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].name, "standby");
    assert_eq!(all[1].state, DomainState::Off);
}
