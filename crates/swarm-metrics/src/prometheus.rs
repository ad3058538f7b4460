//! Prometheus text exposition format.
//!
//! Renders a `SwarmMetrics` snapshot as gauges for scraping. Utilization
//! figures carry a `resource` and a `stat` label.

use std::fmt::Write;

use crate::aggregate::{SwarmMetrics, UtilizationStats};

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "# HELP swarm_{name} {help}");
    let _ = writeln!(out, "# TYPE swarm_{name} gauge");
    let _ = writeln!(out, "swarm_{name} {value}");
}

pub fn render_prometheus(m: &SwarmMetrics) -> String {
    let mut out = String::new();

    gauge(&mut out, "nodes_total", "Nodes in the swarm.", m.total_nodes);
    gauge(&mut out, "nodes_active", "Nodes in the active state.", m.active_nodes);
    gauge(&mut out, "tasks_total", "Tasks known to the swarm.", m.total_tasks);
    gauge(&mut out, "tasks_completed", "Tasks that completed.", m.completed_tasks);
    gauge(&mut out, "tasks_failed", "Tasks that failed.", m.failed_tasks);
    gauge(
        &mut out,
        "response_time_ms",
        "Mean submission-to-completion time in milliseconds.",
        format!("{:.2}", m.average_response_time),
    );
    gauge(
        &mut out,
        "throughput",
        "Completed tasks per second.",
        format!("{:.4}", m.throughput),
    );

    out.push_str("# HELP swarm_resource_utilization Resource utilization (0.0-1.0).\n");
    out.push_str("# TYPE swarm_resource_utilization gauge\n");
    let u = &m.resource_utilization;
    for (resource, stats) in [
        ("cpu", &u.cpu),
        ("memory", &u.memory),
        ("storage", &u.storage),
        ("network", &u.network),
    ] {
        utilization(&mut out, resource, stats);
    }

    gauge(&mut out, "topology_depth", "Deepest hierarchy level.", m.topology.depth);
    gauge(
        &mut out,
        "topology_connectivity",
        "Edges over complete-graph edges.",
        format!("{:.4}", m.topology.connectivity),
    );
    gauge(
        &mut out,
        "topology_redundancy",
        "Mean alternate paths per node.",
        format!("{:.4}", m.topology.redundancy),
    );
    gauge(
        &mut out,
        "consensus_rounds",
        "Resolved consensus proposals.",
        m.consensus.consensus_rounds,
    );
    gauge(
        &mut out,
        "consensus_success_rate",
        "Committed over resolved proposals.",
        format!("{:.4}", m.consensus.success_rate),
    );

    out
}

fn utilization(out: &mut String, resource: &str, stats: &UtilizationStats) {
    for (stat, value) in [("avg", stats.avg), ("max", stats.max), ("min", stats.min)] {
        let _ = writeln!(
            out,
            "swarm_resource_utilization{{resource=\"{resource}\",stat=\"{stat}\"}} {value:.4}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_default_snapshot() {
        let output = render_prometheus(&SwarmMetrics::default());
        assert!(output.contains("# TYPE swarm_nodes_total gauge"));
        assert!(output.contains("swarm_nodes_total 0\n"));
        assert!(output.contains("swarm_resource_utilization{resource=\"cpu\",stat=\"avg\"} 0.0000"));
    }

    #[test]
    fn render_populated_snapshot() {
        let mut m = SwarmMetrics {
            total_nodes: 3,
            active_nodes: 2,
            completed_tasks: 7,
            average_response_time: 125.5,
            ..SwarmMetrics::default()
        };
        m.resource_utilization.memory.max = 0.9;
        m.topology.connectivity = 0.5;

        let output = render_prometheus(&m);
        assert!(output.contains("swarm_nodes_active 2\n"));
        assert!(output.contains("swarm_tasks_completed 7\n"));
        assert!(output.contains("swarm_response_time_ms 125.50\n"));
        assert!(output.contains("swarm_resource_utilization{resource=\"memory\",stat=\"max\"} 0.9000"));
        assert!(output.contains("swarm_topology_connectivity 0.5000\n"));
    }
}
