//! Line parsers for normalized tool output.
//!
//! Adapters promise one record per line: plain hostnames from discovery,
//! `host [ip]` from the resolver, JSON objects from the prober and the
//! vulnerability scanner, `host:port` from the port scanner. Unparseable
//! lines are dropped rather than failing the stage.

use std::collections::BTreeMap;

use super::records::{Finding, HostPorts, ServiceProbe};

/// `example.com` or `example.com [93.184.216.34]`.
pub fn parse_resolve_line(line: &str) -> Option<(String, Option<String>)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(' ') {
        Some((host, rest)) => {
            let ip = rest.trim().trim_start_matches('[').trim_end_matches(']');
            let ip = (!ip.is_empty()).then(|| ip.to_string());
            Some((host.trim().to_string(), ip))
        }
        None => Some((line.to_string(), None)),
    }
}

/// One JSON object per line from the HTTP prober.
pub fn parse_probe_line(line: &str) -> Option<ServiceProbe> {
    let v: serde_json::Value = serde_json::from_str(line).ok()?;
    let url = v.get("url")?.as_str()?.to_string();
    let host = v
        .get("host")
        .or_else(|| v.get("input"))
        .and_then(|h| h.as_str())
        .unwrap_or_default()
        .to_string();
    let status_code = v
        .get("status_code")
        .or_else(|| v.get("status-code"))
        .and_then(|s| s.as_u64())
        .unwrap_or(0) as u16;
    let title = v
        .get("title")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();
    let webserver = v
        .get("webserver")
        .and_then(|w| w.as_str())
        .unwrap_or_default()
        .to_string();
    let technologies = v
        .get("tech")
        .and_then(|t| t.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|x| x.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Some(ServiceProbe {
        url,
        host,
        status_code,
        title,
        webserver,
        technologies,
    })
}

/// `host:port` from the port scanner.
pub fn parse_port_line(line: &str) -> Option<(String, u16)> {
    let (host, port) = line.trim().rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port))
}

/// Group per-line port records into the canonical port table, joining IPs
/// recorded by the resolver stage. Hosts without a resolved address mirror
/// the hostname in the `ip` field.
pub fn group_ports(
    pairs: Vec<(String, u16)>,
    ips: &std::collections::HashMap<String, String>,
) -> Vec<HostPorts> {
    let mut by_host: BTreeMap<String, Vec<u16>> = BTreeMap::new();
    for (host, port) in pairs {
        by_host.entry(host).or_default().push(port);
    }
    by_host
        .into_iter()
        .map(|(host, mut ports)| {
            ports.sort_unstable();
            ports.dedup();
            let port_count = ports.len();
            let ip = ips.get(&host).cloned().unwrap_or_else(|| host.clone());
            HostPorts {
                host,
                ip,
                ports,
                port_count,
            }
        })
        .collect()
}

/// One JSON object per line from the vulnerability scanner.
pub fn parse_finding_line(line: &str) -> Option<Finding> {
    let v: serde_json::Value = serde_json::from_str(line).ok()?;
    let template = v
        .get("template-id")
        .or_else(|| v.get("template_id"))
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();
    let info = v.get("info");
    let name = info
        .and_then(|i| i.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or(&template)
        .to_string();
    let severity = info
        .and_then(|i| i.get("severity"))
        .and_then(|s| s.as_str())
        .unwrap_or("unknown")
        .to_string();
    let host = v
        .get("host")
        .and_then(|h| h.as_str())
        .unwrap_or_default()
        .to_string();
    let matched_at = v
        .get("matched-at")
        .or_else(|| v.get("matched_at"))
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();

    if template.is_empty() && name.is_empty() {
        return None;
    }
    Some(Finding {
        template,
        name,
        severity,
        host,
        matched_at,
    })
}

/// Deduplicate probe records by URL, keeping first occurrence (stage 6).
pub fn dedupe_by_url(probes: &[ServiceProbe]) -> Vec<ServiceProbe> {
    let mut seen = std::collections::HashSet::new();
    probes
        .iter()
        .filter(|p| seen.insert(p.url.clone()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_resolve_line() {
        assert_eq!(
            parse_resolve_line("example.com [93.184.216.34]"),
            Some(("example.com".to_string(), Some("93.184.216.34".to_string())))
        );
        assert_eq!(
            parse_resolve_line("example.com"),
            Some(("example.com".to_string(), None))
        );
        assert_eq!(parse_resolve_line("   "), None);
    }

    #[test]
    fn test_parse_probe_line() {
        let line = r#"{"url":"https://example.com","host":"example.com","status_code":200,"title":"Example","webserver":"nginx","tech":["Nginx","PHP"]}"#;
        let p = parse_probe_line(line).unwrap();
        assert_eq!(p.url, "https://example.com");
        assert_eq!(p.status_code, 200);
        assert_eq!(p.technologies, vec!["Nginx", "PHP"]);
    }

    #[test]
    fn test_parse_probe_line_tolerates_missing_fields() {
        let p = parse_probe_line(r#"{"url":"http://a.example"}"#).unwrap();
        assert_eq!(p.status_code, 0);
        assert!(p.title.is_empty());
        assert!(parse_probe_line("not json").is_none());
    }

    #[test]
    fn test_parse_port_line() {
        assert_eq!(
            parse_port_line("example.com:443"),
            Some(("example.com".to_string(), 443))
        );
        assert_eq!(parse_port_line("example.com"), None);
        assert_eq!(parse_port_line(":443"), None);
    }

    #[test]
    fn test_group_ports_sorts_and_joins_ips() {
        let mut ips = std::collections::HashMap::new();
        ips.insert("a.example".to_string(), "10.0.0.1".to_string());
        let grouped = group_ports(
            vec![
                ("a.example".to_string(), 443),
                ("a.example".to_string(), 80),
                ("a.example".to_string(), 443),
                ("b.example".to_string(), 22),
            ],
            &ips,
        );
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].host, "a.example");
        assert_eq!(grouped[0].ip, "10.0.0.1");
        assert_eq!(grouped[0].ports, vec![80, 443]);
        assert_eq!(grouped[0].port_count, 2);
        // No resolved address: ip mirrors the host.
        assert_eq!(grouped[1].ip, "b.example");
    }

    #[test]
    fn test_parse_finding_line() {
        let line = r#"{"template-id":"tech-detect","info":{"name":"Tech Detect","severity":"medium"},"host":"https://example.com","matched-at":"https://example.com/x"}"#;
        let f = parse_finding_line(line).unwrap();
        assert_eq!(f.template, "tech-detect");
        assert_eq!(f.severity, "medium");
        assert!(parse_finding_line("{}").is_none());
    }

    #[test]
    fn test_dedupe_by_url() {
        let probe = |url: &str| ServiceProbe {
            url: url.to_string(),
            host: String::new(),
            status_code: 200,
            title: String::new(),
            webserver: String::new(),
            technologies: vec![],
        };
        let deduped = dedupe_by_url(&[probe("a"), probe("b"), probe("a")]);
        assert_eq!(deduped.len(), 2);
    }
}
