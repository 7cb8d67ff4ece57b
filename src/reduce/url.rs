use std::net::Ipv4Addr;

/// Host, registered domain and path of a carved URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub host: String,
    pub domain: String,
    pub path: Option<String>,
}

/// Split an `http`/`https` URL. Returns `None` for other schemes or an empty
/// host.
pub fn parse_url_parts(url: &str) -> Option<UrlParts> {
    let url = url.trim();
    let (scheme, rest) = url.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return None;
    }

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    let host = host_of(authority)?;
    let domain = registered_domain(&host);

    let path_end = tail.find(['?', '#']).unwrap_or(tail.len());
    let path = Some(&tail[..path_end])
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    Some(UrlParts { host, domain, path })
}

fn host_of(authority: &str) -> Option<String> {
    let without_userinfo = match authority.rfind('@') {
        Some(pos) => &authority[pos + 1..],
        None => authority,
    };
    let host = if without_userinfo.starts_with('[') {
        match without_userinfo.find(']') {
            Some(end) => &without_userinfo[..=end],
            None => without_userinfo,
        }
    } else {
        without_userinfo
            .split_once(':')
            .map_or(without_userinfo, |(host, _port)| host)
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    (!host.is_empty()).then_some(host)
}

/// Last two labels of `host`; IP literals and single-label hosts are
/// returned unchanged.
pub fn registered_domain(host: &str) -> String {
    if host.starts_with('[') || host.parse::<Ipv4Addr>().is_ok() {
        return host.to_string();
    }
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return host.to_string();
    }
    labels[labels.len() - 2..].join(".")
}
