//! Device IP picker backed by `/api/device-ips`

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DockerDevice {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub ports: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub used_in: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ArpDevice {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub iface: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub open_ports: Vec<u16>,
    #[serde(default)]
    pub used_in: Vec<String>,
    #[serde(default)]
    pub is_cni: bool,
    #[serde(default)]
    pub is_docker_internal: bool,
}

/// `/api/device-ips[?scan=1]` body
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DeviceIps {
    #[serde(default)]
    pub docker: Vec<DockerDevice>,
    #[serde(default)]
    pub arp: Vec<ArpDevice>,
}

pub fn state_icon(state: &str) -> &'static str {
    match state {
        "REACHABLE" => "🟢",
        "DELAY" | "PROBE" => "🟡",
        "STALE" => "🟠",
        "FAILED" => "🔴",
        _ => "⚪",
    }
}

/// Well-known port names shown next to open ports
pub fn port_label(port: u16) -> String {
    let name = match port {
        22 | 2222 => "SSH",
        80 | 8000 | 8080 => "HTTP",
        443 => "HTTPS",
        2200 => "SSH-dev",
        2201 => "SSH-mon",
        2202 => "SSH-mgr",
        2203 => "SSH-auto",
        3000 => "dev",
        5000 => "Flask",
        6080 => "VNC",
        8081 => "API",
        8082 => "mobile",
        _ => "",
    };
    if name.is_empty() {
        port.to_string()
    } else {
        format!("{}/{}", port, name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Docker,
    Arp,
    Cni,
    DockerInternal,
}

impl SectionKind {
    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::Docker => "🐋 Kontenery Docker",
            SectionKind::Arp => "📡 Sieć lokalna – ARP",
            SectionKind::Cni => "☸️ Kubernetes / CNI pods",
            SectionKind::DockerInternal => "🐋 Docker-internal",
        }
    }
}

/// One selectable row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRow {
    pub ip: String,
    pub icon: &'static str,
    /// Container name, interface or network
    pub primary: String,
    pub secondary: Vec<String>,
    /// Last path segment of the first place the IP is already used
    pub used_badge: Option<String>,
}

fn used_badge(used_in: &[String]) -> Option<String> {
    used_in
        .first()
        .map(|u| u.rsplit('/').next().unwrap_or(u).to_string())
}

impl DeviceRow {
    fn docker(d: &DockerDevice) -> Self {
        let mut secondary: Vec<String> = Vec::new();
        if !d.network.is_empty() {
            secondary.push(d.network.clone());
        }
        secondary.extend(d.ports.split_whitespace().map(str::to_string));
        Self {
            ip: d.ip.clone(),
            icon: if d.status == "running" { "🟢" } else { "🔴" },
            primary: d.name.clone(),
            secondary,
            used_badge: used_badge(&d.used_in),
        }
    }

    fn arp(d: &ArpDevice, with_state: bool) -> Self {
        let mut primary = d.iface.clone();
        if with_state && !d.state.is_empty() {
            if !primary.is_empty() {
                primary.push(' ');
            }
            primary.push_str(&d.state);
        }
        let mut secondary: Vec<String> = Vec::new();
        if !d.hostname.is_empty() {
            secondary.push(d.hostname.clone());
        }
        secondary.extend(d.open_ports.iter().map(|p| port_label(*p)));
        Self {
            ip: d.ip.clone(),
            icon: state_icon(&d.state),
            primary,
            secondary,
            used_badge: used_badge(&d.used_in),
        }
    }
}

/// Sections longer than this can be collapsed
pub const COLLAPSIBLE_AFTER: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSection {
    pub kind: SectionKind,
    pub rows: Vec<DeviceRow>,
    pub collapsed: bool,
}

impl DeviceSection {
    pub fn collapsible(&self) -> bool {
        self.rows.len() > COLLAPSIBLE_AFTER
    }

    pub fn visible_rows(&self) -> &[DeviceRow] {
        if self.collapsed {
            &[]
        } else {
            &self.rows
        }
    }
}

/// Group a device listing into picker sections; CNI and Docker-internal
/// start collapsed
pub fn sections(data: &DeviceIps) -> Vec<DeviceSection> {
    let mut out = Vec::new();
    let mut push = |kind, rows: Vec<DeviceRow>, collapsed| {
        if !rows.is_empty() {
            out.push(DeviceSection {
                kind,
                // Short sections cannot be collapsed
                collapsed: collapsed && rows.len() > COLLAPSIBLE_AFTER,
                rows,
            });
        }
    };
    push(
        SectionKind::Docker,
        data.docker.iter().map(DeviceRow::docker).collect(),
        false,
    );
    push(
        SectionKind::Arp,
        data.arp
            .iter()
            .filter(|d| !d.is_cni && !d.is_docker_internal)
            .map(|d| DeviceRow::arp(d, true))
            .collect(),
        false,
    );
    push(
        SectionKind::Cni,
        data.arp
            .iter()
            .filter(|d| d.is_cni)
            .map(|d| DeviceRow::arp(d, true))
            .collect(),
        true,
    );
    push(
        SectionKind::DockerInternal,
        data.arp
            .iter()
            .filter(|d| !d.is_cni && d.is_docker_internal)
            .map(|d| DeviceRow::arp(d, false))
            .collect(),
        true,
    );
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerBody {
    Loading { scan: bool },
    Failed(String),
    Sections(Vec<DeviceSection>),
}

/// Modal state for choosing an IP for an input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpPicker {
    /// Form field receiving the chosen IP
    pub field: String,
    /// Field value when the picker opened, highlighted in the list
    pub current: String,
    pub body: PickerBody,
    /// Index into the flattened list of visible rows and section headers
    pub cursor: usize,
}

/// An entry the picker cursor can rest on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerItem {
    Header(usize),
    Row { section: usize, row: usize },
}

impl IpPicker {
    pub fn open(field: &str, current: &str) -> Self {
        Self {
            field: field.to_string(),
            current: current.to_string(),
            body: PickerBody::Loading { scan: false },
            cursor: 0,
        }
    }

    pub fn start_loading(&mut self, scan: bool) {
        self.body = PickerBody::Loading { scan };
        self.cursor = 0;
    }

    pub fn apply(&mut self, result: Result<DeviceIps, String>) {
        self.body = match result {
            Ok(data) => PickerBody::Sections(sections(&data)),
            Err(e) => PickerBody::Failed(e),
        };
        self.cursor = 0;
    }

    /// True when the listing loaded and nothing selectable was found
    pub fn is_empty(&self) -> bool {
        match &self.body {
            PickerBody::Sections(sections) => sections
                .iter()
                .all(|s| matches!(s.kind, SectionKind::DockerInternal)),
            _ => false,
        }
    }

    pub fn items(&self) -> Vec<PickerItem> {
        let PickerBody::Sections(sections) = &self.body else {
            return Vec::new();
        };
        let mut items = Vec::new();
        for (s, section) in sections.iter().enumerate() {
            items.push(PickerItem::Header(s));
            items.extend((0..section.visible_rows().len()).map(|row| PickerItem::Row { section: s, row }));
        }
        items
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.items().len();
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor as isize + delta).rem_euclid(len as isize) as usize;
    }

    /// Activate the item under the cursor. Headers toggle their section;
    /// rows return the chosen IP.
    pub fn activate(&mut self) -> Option<String> {
        let item = self.items().get(self.cursor).copied()?;
        let PickerBody::Sections(sections) = &mut self.body else {
            return None;
        };
        match item {
            PickerItem::Header(s) => {
                let section = sections.get_mut(s)?;
                if section.collapsible() {
                    section.collapsed = !section.collapsed;
                }
                None
            }
            PickerItem::Row { section, row } => sections
                .get(section)
                .and_then(|s| s.visible_rows().get(row))
                .map(|r| r.ip.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceIps {
        serde_json::from_str(
            r#"{
              "docker": [{"name":"dockfra-web","ip":"172.18.0.2","network":"dockfra_default",
                          "ports":"80/tcp 443/tcp","status":"running","used_in":["app/.env"]}],
              "arp": [
                {"ip":"192.168.1.10","iface":"eth0","state":"REACHABLE","hostname":"rpi",
                 "open_ports":[22,8080],"used_in":["devices/.env (RPI3_HOST)"]},
                {"ip":"10.42.0.5","iface":"cni0","state":"STALE","is_cni":true},
                {"ip":"10.42.0.6","iface":"cni0","state":"STALE","is_cni":true},
                {"ip":"10.42.0.7","iface":"cni0","state":"STALE","is_cni":true},
                {"ip":"10.42.0.8","iface":"cni0","state":"FAILED","is_cni":true},
                {"ip":"172.17.0.3","iface":"docker0","state":"DELAY","is_docker_internal":true}
              ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_sections_grouping() {
        let sections = sections(&sample());
        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Docker,
                SectionKind::Arp,
                SectionKind::Cni,
                SectionKind::DockerInternal
            ]
        );
        assert!(!sections[0].collapsed);
        assert!(sections[2].collapsed);
        assert!(sections[2].visible_rows().is_empty());
        // One-row section is shown even though it starts collapsed
        assert!(!sections[3].collapsed);

        let arp = &sections[1].rows[0];
        assert_eq!(arp.icon, "🟢");
        assert_eq!(arp.secondary, vec!["rpi", "22/SSH", "8080/HTTP"]);
        assert_eq!(arp.used_badge.as_deref(), Some(".env (RPI3_HOST)"));
        assert_eq!(sections[0].rows[0].secondary, vec!["dockfra_default", "80/tcp", "443/tcp"]);
    }

    #[test]
    fn test_state_icons() {
        assert_eq!(state_icon("PROBE"), "🟡");
        assert_eq!(state_icon("STALE"), "🟠");
        assert_eq!(state_icon("NOARP"), "⚪");
    }

    #[test]
    fn test_picker_navigation() {
        let mut picker = IpPicker::open("RPI3_HOST", "192.168.1.10");
        assert!(picker.items().is_empty());
        picker.apply(Ok(sample()));
        // header docker, row, header arp, row, header cni (collapsed), header internal, row
        assert_eq!(picker.items().len(), 7);
        picker.move_cursor(1);
        assert_eq!(picker.activate().as_deref(), Some("172.18.0.2"));

        picker.move_cursor(3);
        assert_eq!(picker.items()[picker.cursor], PickerItem::Header(2));
        assert_eq!(picker.activate(), None);
        assert_eq!(picker.items().len(), 11);

        picker.apply(Err("timeout".to_string()));
        assert_eq!(picker.body, PickerBody::Failed("timeout".to_string()));
    }

    #[test]
    fn test_empty_listing() {
        let mut picker = IpPicker::open("RPI3_HOST", "");
        picker.apply(Ok(DeviceIps::default()));
        assert!(picker.is_empty());
    }
}
