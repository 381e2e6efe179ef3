//! Port scanner XML report parser

use quick_xml::de::from_str;
use rampart_core::domain::{RawFinding, Tool};
use serde::Deserialize;

use crate::domain::AdapterError;

#[derive(Debug, Deserialize)]
struct NmapRun {
    #[serde(rename = "host", default)]
    hosts: Vec<NmapHost>,
}

#[derive(Debug, Deserialize)]
struct NmapHost {
    #[serde(rename = "address", default)]
    addresses: Vec<NmapAddress>,
    #[serde(default)]
    hostnames: Option<NmapHostnames>,
    #[serde(default)]
    ports: Option<NmapPorts>,
}

#[derive(Debug, Deserialize)]
struct NmapAddress {
    #[serde(rename = "@addr")]
    addr: String,
    #[serde(rename = "@addrtype", default)]
    addrtype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NmapHostnames {
    #[serde(rename = "hostname", default)]
    hostnames: Vec<NmapHostname>,
}

#[derive(Debug, Deserialize)]
struct NmapHostname {
    #[serde(rename = "@name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct NmapPorts {
    #[serde(rename = "port", default)]
    ports: Vec<NmapPort>,
}

#[derive(Debug, Deserialize)]
struct NmapPort {
    #[serde(rename = "@portid")]
    portid: u16,
    #[serde(rename = "@protocol")]
    protocol: String,
    state: NmapState,
    #[serde(default)]
    service: Option<NmapService>,
}

#[derive(Debug, Deserialize)]
struct NmapState {
    #[serde(rename = "@state")]
    state: String,
}

#[derive(Debug, Deserialize)]
struct NmapService {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@product", default)]
    product: Option<String>,
    #[serde(rename = "@version", default)]
    version: Option<String>,
}

impl NmapHost {
    /// IP address, preferring IPv4/IPv6 over MAC entries
    fn ip(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.addrtype.as_deref() != Some("mac"))
            .or(self.addresses.first())
            .map(|a| a.addr.as_str())
    }

    fn hostname(&self) -> Option<&str> {
        self.hostnames
            .as_ref()
            .and_then(|h| h.hostnames.first())
            .map(|h| h.name.as_str())
    }
}

impl NmapService {
    /// "product version" banner, when the scanner detected either part
    fn banner(&self) -> Option<String> {
        let parts: Vec<&str> = [self.product.as_deref(), self.version.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// Parse an XML report into one finding per open port.
pub fn parse_nmap_xml(xml: &str) -> Result<Vec<RawFinding>, AdapterError> {
    let xml = xml.trim();
    if xml.is_empty() {
        return Err(AdapterError::parse(Tool::PortScanner, "empty report"));
    }
    if !xml.starts_with('<') {
        return Err(AdapterError::parse(Tool::PortScanner, "report is not XML"));
    }
    let run: NmapRun =
        from_str(xml).map_err(|e| AdapterError::parse(Tool::PortScanner, e.to_string()))?;

    let mut findings = Vec::new();
    for host in &run.hosts {
        let ip = host.ip();
        let hostname = host.hostname();
        let Some(ports) = &host.ports else {
            continue;
        };

        for port in ports.ports.iter().filter(|p| p.state.state == "open") {
            let service = port.service.as_ref().map(|s| s.name.as_str());
            let banner = port.service.as_ref().and_then(NmapService::banner);

            let title = match service {
                Some(service) => format!("Open port {}/{} ({})", port.portid, port.protocol, service),
                None => format!("Open port {}/{}", port.portid, port.protocol),
            };

            let mut finding = RawFinding::new("open_port", title)
                .with_port(port.portid)
                .with_protocol(&port.protocol)
                .with_raw_output(serde_json::json!({
                    "host": ip,
                    "hostname": hostname,
                    "port": port.portid,
                    "protocol": port.protocol,
                    "state": port.state.state,
                    "service": service,
                    "product": port.service.as_ref().and_then(|s| s.product.clone()),
                    "version": port.service.as_ref().and_then(|s| s.version.clone()),
                }));

            if let Some(service) = service {
                finding = finding.with_service(service);
            }
            if let Some(banner) = banner {
                finding = finding
                    .with_description(format!("Service banner: {}", banner))
                    .with_version(banner);
            }
            if let Some(host) = hostname.or(ip) {
                finding = finding.with_component(host);
            }
            findings.push(finding);
        }
    }

    Ok(findings)
}
