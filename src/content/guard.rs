use crate::error::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;
use url::{Host, Url};

/// Rejects fetch targets that point back into loopback, private or
/// link-local networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlGuard {
    allow_private: bool,
}

impl UrlGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard that only checks syntax and scheme. Local testing only.
    pub fn permissive() -> Self {
        Self { allow_private: true }
    }

    /// Parses `raw` and checks scheme and host without touching the network.
    pub fn validate(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw.trim()).map_err(|_| Error::InvalidInput("Invalid url".to_string()))?;
        self.check(&url)?;
        Ok(url)
    }

    /// Checks an already parsed URL, e.g. a redirect target.
    pub fn check(&self, url: &Url) -> Result<()> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidInput("Invalid protocol".to_string()));
        }

        let host = url
            .host()
            .ok_or_else(|| Error::InvalidInput("Invalid url".to_string()))?;

        if !self.allow_private && is_forbidden_host(&host) {
            debug!(host = %host, "refusing local/private target");
            return Err(forbidden());
        }

        Ok(())
    }

    /// Resolves a domain name and rejects it if any address is private.
    /// Literal IP hosts were already handled by [`UrlGuard::check`].
    pub async fn check_resolved(&self, url: &Url) -> Result<()> {
        if self.allow_private {
            return Ok(());
        }

        let Some(Host::Domain(domain)) = url.host() else {
            return Ok(());
        };
        let port = url.port_or_known_default().unwrap_or(80);

        let addrs = tokio::net::lookup_host((domain, port))
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Could not resolve {}: {}", domain, e)))?;

        for addr in addrs {
            if is_forbidden_ip(addr.ip()) {
                debug!(host = domain, addr = %addr.ip(), "domain resolves to a private address");
                return Err(forbidden());
            }
        }

        Ok(())
    }
}

fn forbidden() -> Error {
    Error::Forbidden("Refusing to fetch local/private address".to_string())
}

pub fn is_forbidden_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain.is_empty() || domain == "localhost" || domain.ends_with(".localhost")
        }
        Host::Ipv4(ip) => is_forbidden_ipv4(*ip),
        Host::Ipv6(ip) => is_forbidden_ipv6(*ip),
    }
}

pub fn is_forbidden_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_forbidden_ipv4(ip),
        IpAddr::V6(ip) => is_forbidden_ipv6(ip),
    }
}

fn is_forbidden_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || octets[0] == 0
        // carrier-grade NAT, 100.64.0.0/10
        || (octets[0] == 100 && (octets[1] & 0xc0) == 0x40)
}

fn is_forbidden_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_forbidden_ipv4(mapped);
    }

    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // unique local, fc00::/7
        || (first & 0xfe00) == 0xfc00
        // link local, fe80::/10
        || (first & 0xffc0) == 0xfe80
}
