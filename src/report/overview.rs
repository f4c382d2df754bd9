//! Plain-text project overview

use super::palette::{pad, visible_width, Palette};
use super::OverviewReport;
use crate::graph::overview::{NetworkGroup, NetworkRow};
use crate::usage::ServiceUsage;

const BULLET: &str = " • ";
const ITEM: &str = "  ▸ ";
const CONTINUATION: &str = "      ";

/// Greedily pack `parts` joined by `sep` into lines of at most `max_width`
/// visible columns. Continuation lines start with `indent`.
fn pack(parts: &[&str], sep: &str, max_width: usize, indent: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for part in parts {
        if current.is_empty() {
            current = if lines.is_empty() {
                part.to_string()
            } else {
                format!("{}{}", indent, part)
            };
        } else if visible_width(&current) + visible_width(sep) + visible_width(part) <= max_width {
            current.push_str(sep);
            current.push_str(part);
        } else {
            lines.push(std::mem::take(&mut current));
            current = format!("{}{}", indent, part);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wrap a `" • "`-separated line to `max_width`, then split any segment
/// that is still too long at `", "`. A width of 0 disables wrapping.
pub fn wrap_bullet_line(text: &str, max_width: usize, indent: &str) -> Vec<String> {
    if max_width == 0 || visible_width(text) <= max_width {
        return vec![text.to_string()];
    }
    let segments: Vec<&str> = text.split(BULLET).collect();
    let mut out = Vec::new();
    for line in pack(&segments, BULLET, max_width, indent) {
        if visible_width(&line) <= max_width {
            out.push(line);
            continue;
        }
        let pieces: Vec<&str> = line.split(", ").collect();
        out.extend(pack(&pieces, ", ", max_width, indent));
    }
    out
}

fn usage_summary(usage: &ServiceUsage) -> String {
    usage
        .lines
        .iter()
        .map(|l| format!("{} {}", l.label, l.ratio()))
        .collect::<Vec<_>>()
        .join(BULLET)
}

fn ratio(usage: &ServiceUsage, label: &str) -> String {
    usage.line(label).map(|l| l.ratio()).unwrap_or_else(|| "n/a".to_string())
}

struct Writer<'a> {
    palette: &'a Palette,
    max_width: usize,
    lines: Vec<String>,
}

impl Writer<'_> {
    fn push(&mut self, text: String) {
        self.lines
            .extend(wrap_bullet_line(&text, self.max_width, CONTINUATION));
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn service(&mut self, title: &str, usage: &ServiceUsage) {
        self.blank();
        let header = format!(
            "{}  ({})  {}",
            self.palette.bold(title),
            usage_summary(usage),
            self.palette.dim(&format!("[{}]", usage.source))
        );
        self.push(header);
    }

    fn section(&mut self, title: String) {
        self.push(self.palette.accent(&title));
    }

    fn item(&mut self, text: String) {
        self.push(format!("{}{}", ITEM, text));
    }
}

fn network_line(palette: &Palette, network: &NetworkRow) -> String {
    let subnets = if network.subnets.is_empty() {
        "-".to_string()
    } else {
        network
            .subnets
            .iter()
            .map(|s| {
                format!(
                    "{} {} gw:{} dhcp:{} pools:{}",
                    s.name,
                    s.cidr,
                    s.gateway,
                    if s.dhcp { "on" } else { "off" },
                    s.pools
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    };
    format!(
        "{}  [{}|{}]  subnets: {}",
        network.name,
        palette.status(&network.status),
        palette.status(&network.admin),
        subnets
    )
}

fn join_or_dash(items: &[String], sep: &str) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(sep)
    }
}

/// Render the overview as text, one section after another
pub fn render_overview(report: &OverviewReport, palette: &Palette, max_width: usize, generated_at: &str) -> String {
    let overview = &report.overview;
    let mut w = Writer {
        palette,
        max_width,
        lines: Vec::new(),
    };

    w.push(format!(
        "{}  {}",
        palette.bold("OpenStack Project Overview"),
        palette.dim(&format!("[{}]", generated_at))
    ));
    let identity = &overview.identity;
    w.push(format!(
        "Identity: domain={}{}project={}{}user={}{}roles={}",
        identity.domain,
        BULLET,
        identity.project,
        BULLET,
        identity.user,
        BULLET,
        join_or_dash(&identity.roles, ", ")
    ));

    w.service("NETWORK", &report.network);
    for (group, title) in [
        (NetworkGroup::Provider, "Provider networks"),
        (NetworkGroup::External, "External networks"),
        (NetworkGroup::Internal, "Internal networks"),
    ] {
        let rows: Vec<&NetworkRow> = overview.networks.iter().filter(|n| n.group == group).collect();
        w.section(format!("{} ({}):", title, rows.len()));
        for network in rows {
            w.item(network_line(palette, network));
        }
    }

    w.section(format!("Routers ({}):", ratio(&report.network, "routers")));
    for router in &overview.routers {
        w.item(format!(
            "{}  [{}]  ext: {}  ifs: [{}]",
            router.name,
            palette.status(&router.status),
            router.external_network,
            router.interfaces.join(", ")
        ));
    }

    w.section(format!("Free-standing ports ({}):", overview.free_ports.len()));
    for port in &overview.free_ports {
        w.item(format!(
            "{} [{}]  {}",
            pad(&port.name, 18),
            palette.status(&port.status),
            join_or_dash(&port.addresses, "; ")
        ));
    }

    w.section(format!("Security groups ({}):", ratio(&report.network, "secgroups")));
    for group in &overview.security_groups {
        w.item(format!(
            "{}  (ingress: {} | egress: {})",
            group.name, group.ingress, group.egress
        ));
    }

    w.section(format!(
        "Free-standing floating IPs ({}/{}):",
        overview.free_floating_ips.len(),
        report
            .network
            .line("fips")
            .and_then(|l| l.limit)
            .map(|l| l.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    ));
    for fip in &overview.free_floating_ips {
        w.item(format!(
            "{}  ext-net: {}  [{}]  (not associated)",
            pad(&fip.address, 15),
            fip.network,
            palette.status(&fip.status)
        ));
    }

    w.service("COMPUTE", &report.compute);
    w.section(format!("Flavors ({} visible):", overview.flavors.len()));
    for flavor in &overview.flavors {
        w.item(format!(
            "{} vCPU={} RAM={}MB Disk={}GB Ephem={}GB {}",
            pad(&flavor.name, 12),
            flavor.vcpus,
            flavor.ram_mb,
            flavor.disk_gb,
            flavor.ephemeral_gb,
            if flavor.public { "public" } else { "private" }
        ));
    }

    w.section(format!("Images ({}):", overview.images.len()));
    for image in &overview.images {
        w.item(format!(
            "{}  [{}]  {}/{}  {}MB  {}  min: {}MB RAM, {}GB disk{}fits: {}",
            image.name,
            palette.status(&image.status),
            image.disk_format,
            image.container_format,
            image.size_mb,
            image.visibility,
            image.min_ram,
            image.min_disk,
            BULLET,
            image.min_flavor
        ));
    }

    w.section(format!("Keypairs ({}):", overview.keypairs.len()));
    if !overview.keypairs.is_empty() {
        let keys = overview
            .keypairs
            .iter()
            .map(|k| format!("{} ({})", k.name, k.key_type))
            .collect::<Vec<_>>()
            .join(BULLET);
        w.item(keys);
    }

    w.section(format!("Instances ({}):", ratio(&report.compute, "instances")));
    for instance in &overview.instances {
        w.item(format!(
            "{}  [{}]  vm: {}  power: {}  host: {}{}image: {}{}flavor: {}{}key: {}",
            instance.name,
            palette.status(&instance.status),
            instance.vm_state,
            palette.status(&instance.power_state),
            instance.host,
            BULLET,
            instance.image,
            BULLET,
            instance.flavor,
            BULLET,
            instance.key_name
        ));
        w.push(format!(
            "{}ports: {}{}volumes: {}{}secgroups: {}",
            CONTINUATION,
            join_or_dash(&instance.ports, ", "),
            BULLET,
            join_or_dash(&instance.volumes, ", "),
            BULLET,
            join_or_dash(&instance.security_groups, ", ")
        ));
    }

    w.service("BLOCK STORAGE", &report.volume);
    w.section(format!("Volumes ({}):", ratio(&report.volume, "vols")));
    for volume in &overview.volumes {
        w.item(format!(
            "{}  {} {}GB  [{}]  backend: {}{}attached: {}{}snapshots: {}{}backups: {}",
            volume.name,
            volume.volume_type,
            volume.size_gb,
            palette.status(&volume.status),
            volume.backend,
            BULLET,
            join_or_dash(&volume.attached_to, ", "),
            BULLET,
            volume.snapshots,
            BULLET,
            volume
                .backups
                .map(|b| b.to_string())
                .unwrap_or_else(|| "n/a".to_string())
        ));
    }

    w.lines.join("\n")
}
