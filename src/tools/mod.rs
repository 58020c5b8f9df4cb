use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool `{tool_id}`")]
    UnknownTool { tool_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Reconnaissance,
    Exploitation,
    Analysis,
    Reporting,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reconnaissance => "reconnaissance",
            Self::Exploitation => "exploitation",
            Self::Analysis => "analysis",
            Self::Reporting => "reporting",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reconnaissance" => Ok(Self::Reconnaissance),
            "exploitation" => Ok(Self::Exploitation),
            "analysis" => Ok(Self::Analysis),
            "reporting" => Ok(Self::Reporting),
            _ => Err(
                "category must be one of: reconnaissance, exploitation, analysis, reporting"
                    .to_string(),
            ),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the fixed, build-time tool catalog. `backend_route` is the
/// remote route the dispatcher resolves the tool id to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub backend_route: &'static str,
    pub description: &'static str,
    pub input_placeholder: &'static str,
}

pub const TOOL_CATALOG: &[ToolSpec] = &[
    ToolSpec {
        id: "nmap",
        name: "Nmap Scanner",
        category: Category::Reconnaissance,
        backend_route: "/tools/nmap",
        description: "Network discovery and security auditing",
        input_placeholder: "Enter target IP or domain (e.g., 192.168.1.1 or example.com)",
    },
    ToolSpec {
        id: "subdomain_enum",
        name: "Subdomain Enumeration",
        category: Category::Reconnaissance,
        backend_route: "/tools/subdomain",
        description: "Discover subdomains of a target domain",
        input_placeholder: "Enter domain (e.g., example.com)",
    },
    ToolSpec {
        id: "port_scan",
        name: "Port Scanner",
        category: Category::Reconnaissance,
        backend_route: "/tools/portscan",
        description: "Fast port scanning and service detection",
        input_placeholder: "Enter target IP (e.g., 192.168.1.1)",
    },
    ToolSpec {
        id: "whois",
        name: "WHOIS Lookup",
        category: Category::Reconnaissance,
        backend_route: "/tools/whois",
        description: "Domain registration and ownership information",
        input_placeholder: "Enter domain (e.g., example.com)",
    },
    ToolSpec {
        id: "dns_enum",
        name: "DNS Enumeration",
        category: Category::Reconnaissance,
        backend_route: "/tools/dns",
        description: "Enumerate DNS records and zone information",
        input_placeholder: "Enter domain (e.g., example.com)",
    },
    ToolSpec {
        id: "vuln_scan",
        name: "Vulnerability Scanner",
        category: Category::Exploitation,
        backend_route: "/tools/vulnscan",
        description: "Vulnerability detection against a target service",
        input_placeholder: "Enter target URL or IP",
    },
    ToolSpec {
        id: "exploit_search",
        name: "Exploit Search",
        category: Category::Exploitation,
        backend_route: "/tools/exploits",
        description: "Search known exploits and CVEs",
        input_placeholder: "Enter software name or CVE ID",
    },
    ToolSpec {
        id: "payload_gen",
        name: "Payload Generator",
        category: Category::Exploitation,
        backend_route: "/tools/payload",
        description: "Generate custom payloads",
        input_placeholder: "Describe payload requirements",
    },
    ToolSpec {
        id: "web_crawl",
        name: "Web Crawler",
        category: Category::Reconnaissance,
        backend_route: "/tools/webcrawl",
        description: "Crawl and map web applications",
        input_placeholder: "Enter website URL",
    },
    ToolSpec {
        id: "phishing_detect",
        name: "Phishing Detection",
        category: Category::Analysis,
        backend_route: "/tools/phishing",
        description: "Analyze URLs for phishing indicators",
        input_placeholder: "Enter URL to analyze",
    },
    ToolSpec {
        id: "password_audit",
        name: "Password Audit",
        category: Category::Exploitation,
        backend_route: "/tools/password",
        description: "Test password strength and common attacks",
        input_placeholder: "Enter password hash or service URL",
    },
    ToolSpec {
        id: "report_gen",
        name: "Report Generator",
        category: Category::Reporting,
        backend_route: "/tools/report",
        description: "Generate penetration test reports",
        input_placeholder: "Enter target for report generation",
    },
];

pub fn lookup(tool_id: &str) -> Result<&'static ToolSpec, ToolError> {
    TOOL_CATALOG
        .iter()
        .find(|tool| tool.id == tool_id)
        .ok_or_else(|| ToolError::UnknownTool {
            tool_id: tool_id.to_string(),
        })
}

/// Both filters apply conjunctively; the query matches name or description,
/// case-insensitively.
pub fn filter(category: Option<Category>, query: Option<&str>) -> Vec<&'static ToolSpec> {
    let needle = query.map(|q| q.to_ascii_lowercase());
    TOOL_CATALOG
        .iter()
        .filter(|tool| category.map(|c| tool.category == c).unwrap_or(true))
        .filter(|tool| match needle.as_deref() {
            Some(needle) => {
                tool.name.to_ascii_lowercase().contains(needle)
                    || tool.description.to_ascii_lowercase().contains(needle)
            }
            None => true,
        })
        .collect()
}
