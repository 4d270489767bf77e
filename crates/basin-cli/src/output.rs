//! Table formatting for CLI listings.

use std::fmt::Write;

use basin_common::types::ContainerRecord;
use basin_network::driver::Network;

/// Renders container records as a table, one row per record.
#[must_use]
pub fn container_table(records: &[ContainerRecord]) -> String {
    let mut out = format!(
        "{:<12} {:<15} {:<8} {:<8} {:<20} {:<20}\n",
        "ID", "NAME", "PID", "STATUS", "COMMAND", "CREATED"
    );
    for r in records {
        let _ = writeln!(
            out,
            "{:<12} {:<15} {:<8} {:<8} {:<20} {:<20}",
            r.id.to_string(),
            r.name,
            r.pid.map_or_else(|| "-".to_string(), |p| p.to_string()),
            r.status.to_string(),
            r.command,
            r.created_at
        );
    }
    out
}

/// Renders networks as a table, one row per network.
#[must_use]
pub fn network_table(networks: &[Network]) -> String {
    let mut out = format!("{:<15} {:<20} {:<10}\n", "NAME", "IPRANGE", "DRIVER");
    for n in networks {
        let _ = writeln!(out, "{:<15} {:<20} {:<10}", n.name, n.ip_range.to_string(), n.driver);
    }
    out
}

#[cfg(test)]
mod tests {
    use basin_common::types::ContainerId;

    use super::*;

    #[test]
    fn empty_listing_prints_header_only() {
        let table = container_table(&[]);
        assert_eq!(table.lines().count(), 1);
        assert!(table.starts_with("ID"));
    }

    #[test]
    fn stopped_container_shows_dash_for_pid() {
        let mut record = ContainerRecord::running(
            42,
            ContainerId::new("0123456789"),
            "web",
            &["top".to_string(), "-b".to_string()],
        );
        let running = container_table(std::slice::from_ref(&record));
        let row = running.lines().nth(1).expect("row");
        assert!(row.starts_with("0123456789"));
        assert!(row.contains(" 42 "));
        assert!(row.contains("running"));
        assert!(row.contains("top -b"));

        record.mark_stopped();
        let stopped = container_table(&[record]);
        let row = stopped.lines().nth(1).expect("row");
        assert!(row.contains(" - "));
        assert!(row.contains("stopped"));
    }

    #[test]
    fn network_rows_show_range_and_driver() {
        let network = Network {
            name: "testbr".into(),
            ip_range: "192.168.10.1/24".parse().expect("cidr"),
            driver: "bridge".into(),
        };
        let table = network_table(&[network]);
        let row = table.lines().nth(1).expect("row");
        assert!(row.starts_with("testbr"));
        assert!(row.contains("192.168.10.1/24"));
        assert!(row.trim_end().ends_with("bridge"));
    }
}
