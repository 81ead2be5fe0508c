//! Production transport backed by the libvirt client library.

use std::cell::RefCell;

use tracing::debug;
use virt::connect::{Connect, ConnectAuth, ConnectCredential};
use virt::domain::Domain;
use virt::error::ErrorNumber;
use virt::sys;

use crate::core::errors::TransportError;
use crate::core::transport::{Connection, CredentialSource, DomainApi, HostInfo, Transport};

/// Opens authenticated libvirt connections.
pub struct LibvirtTransport;

pub struct LibvirtConnection {
    uri: String,
    conn: Connect,
}

pub struct LibvirtDomain {
    dom: Domain,
}

// The libvirt auth callback is a plain fn pointer with no user-data slot on
// the Rust side, so the credentials resolved for the URI currently being
// opened are parked here for the duration of the open_auth() call.
thread_local! {
    static PENDING_CREDENTIALS: RefCell<Option<(Option<String>, Option<String>)>> =
        const { RefCell::new(None) };
}

fn auth_callback(creds: &mut Vec<ConnectCredential>) {
    PENDING_CREDENTIALS.with(|cell| {
        let pending = cell.borrow();
        let (username, password) = match pending.as_ref() {
            Some((u, p)) => (u.clone(), p.clone()),
            None => (None, None),
        };
        for cred in creds.iter_mut() {
            match cred.typed as u32 {
                sys::VIR_CRED_AUTHNAME => {
                    // Configured username, or whatever default the protocol
                    // suggested for the prompt.
                    cred.result = username.clone().or_else(|| cred.defresult.clone());
                }
                sys::VIR_CRED_PASSPHRASE | sys::VIR_CRED_NOECHOPROMPT => {
                    cred.result = password.clone();
                }
                // Unrecognized secret type: leave the request unanswered so
                // only this credential exchange fails.
                _ => {}
            }
        }
    });
}

impl Transport for LibvirtTransport {
    type Conn = LibvirtConnection;

    fn open(
        &self,
        uri: &str,
        credentials: &dyn CredentialSource,
    ) -> Result<LibvirtConnection, TransportError> {
        PENDING_CREDENTIALS.with(|cell| {
            *cell.borrow_mut() = Some((credentials.username(uri), credentials.password(uri)));
        });

        let mut auth = ConnectAuth::new(
            vec![
                sys::VIR_CRED_AUTHNAME,
                sys::VIR_CRED_PASSPHRASE,
                sys::VIR_CRED_NOECHOPROMPT,
            ],
            auth_callback,
        );
        let result = Connect::open_auth(Some(uri), &mut auth, 0);
        PENDING_CREDENTIALS.with(|cell| cell.borrow_mut().take());

        let conn = result?;
        debug!(uri, "connected");
        let canonical = conn.get_uri().unwrap_or_else(|_| uri.to_string());
        Ok(LibvirtConnection {
            uri: canonical,
            conn,
        })
    }
}

impl Connection for LibvirtConnection {
    type Domain = LibvirtDomain;

    fn uri(&self) -> &str {
        &self.uri
    }

    fn hostname(&self) -> Result<String, TransportError> {
        Ok(self.conn.get_hostname()?)
    }

    fn hypervisor(&self) -> Result<String, TransportError> {
        Ok(self.conn.get_type()?)
    }

    fn host_info(&self) -> Result<HostInfo, TransportError> {
        let info = self.conn.get_node_info()?;
        Ok(HostInfo {
            model: info.model,
            memory_kib: info.memory,
            cpus: info.cpus,
        })
    }

    fn free_memory(&self) -> Result<u64, TransportError> {
        Ok(self.conn.get_free_memory()?)
    }

    fn num_active_domains(&self) -> Result<u32, TransportError> {
        Ok(self.conn.num_of_domains()?)
    }

    fn num_defined_domains(&self) -> Result<u32, TransportError> {
        Ok(self.conn.num_of_defined_domains()?)
    }

    fn active_domain_ids(&self) -> Result<Vec<u32>, TransportError> {
        Ok(self.conn.list_domains()?)
    }

    fn defined_domain_names(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.conn.list_defined_domains()?)
    }

    fn domain_by_id(&self, id: u32) -> Result<LibvirtDomain, TransportError> {
        Ok(LibvirtDomain {
            dom: Domain::lookup_by_id(&self.conn, id)?,
        })
    }

    fn domain_by_name(&self, name: &str) -> Result<Option<LibvirtDomain>, TransportError> {
        match Domain::lookup_by_name(&self.conn, name) {
            Ok(dom) => Ok(Some(LibvirtDomain { dom })),
            Err(e) if e.code() == ErrorNumber::NoDomain => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl DomainApi for LibvirtDomain {
    fn name(&self) -> Result<String, TransportError> {
        Ok(self.dom.get_name()?)
    }

    fn is_persistent(&self) -> Result<bool, TransportError> {
        Ok(self.dom.is_persistent()?)
    }

    fn state_code(&self) -> Result<u32, TransportError> {
        let info = self.dom.get_info()?;
        Ok(info.state as u32)
    }
}
