//! 局域网地址发现

use local_ip_address::list_afinet_netifas;
use std::net::{IpAddr, Ipv4Addr};

/// 虚拟网卡、容器网桥、移动数据等不适合对外展示的接口
const IGNORED_INTERFACES: &[&str] = &["docker", "rmnet", "dummy", "veth", "vboxnet"];

/// 获取本机可被局域网访问的 IPv4 地址
pub fn ipv4_addresses() -> anyhow::Result<Vec<Ipv4Addr>> {
    let interfaces = list_afinet_netifas()?;
    let addrs: Vec<Ipv4Addr> = interfaces
        .into_iter()
        .filter_map(|(name, ip)| match ip {
            IpAddr::V4(v4) if is_candidate(&name, v4) => Some(v4),
            _ => None,
        })
        .collect();

    if addrs.is_empty() {
        anyhow::bail!("network interfaces not connected");
    }
    Ok(addrs)
}

/// 首选地址，找不到时回退到 `localhost`
pub fn primary_host() -> String {
    match ipv4_addresses() {
        Ok(addrs) => addrs
            .first()
            .map_or_else(|| "localhost".to_string(), ToString::to_string),
        Err(e) => {
            tracing::warn!("No LAN address found ({}), falling back to localhost", e);
            "localhost".to_string()
        }
    }
}

fn is_candidate(iface: &str, ip: Ipv4Addr) -> bool {
    if iface == "lo" || ip.is_loopback() || ip.is_unspecified() {
        return false;
    }
    if IGNORED_INTERFACES.iter().any(|p| iface.contains(p)) {
        return false;
    }
    // Windows 上的 VirtualBox Host-Only 网卡
    if cfg!(windows) && ip.octets()[..3] == [192, 168, 56] {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_virtual_interfaces() {
        let lan = Ipv4Addr::new(192, 168, 1, 20);
        assert!(is_candidate("wlan0", lan));
        assert!(is_candidate("eth0", Ipv4Addr::new(10, 0, 0, 5)));
        assert!(!is_candidate("lo", lan));
        assert!(!is_candidate("docker0", Ipv4Addr::new(172, 17, 0, 1)));
        assert!(!is_candidate("veth12ab", lan));
        assert!(!is_candidate("vboxnet0", lan));
        assert!(!is_candidate("rmnet_data0", lan));
        assert!(!is_candidate("eth0", Ipv4Addr::LOCALHOST));
    }
}
