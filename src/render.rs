use std::fmt;
use std::io::{self, Write};

use crossterm::style::Stylize;

use crate::aggregate::{ClusterTotals, NodeRecord};
use crate::collect::Report;
use crate::quantity::ResourceQuantity;

const BAR_WIDTH: usize = 32;
const MEBIBYTE: u64 = 1024 * 1024;

/// A single `label |#####     | NN%` line.
struct ProgressBar<'a> {
    label: &'a str,
    value: ResourceQuantity,
    max: ResourceQuantity,
}

impl<'a> ProgressBar<'a> {
    fn new(label: &'a str, value: ResourceQuantity, max: ResourceQuantity) -> Self {
        ProgressBar { label, value, max }
    }

    /// Whole percent of `max` in use; may exceed 100 when overcommitted.
    fn percent(&self) -> u128 {
        if self.max.is_zero() {
            return 0;
        }
        u128::from(self.value.value()) * 100 / u128::from(self.max.value())
    }

    fn filled(&self) -> usize {
        if self.max.is_zero() {
            return 0;
        }
        let value = self.value.min(self.max).value();
        (u128::from(value) * BAR_WIDTH as u128 / u128::from(self.max.value())) as usize
    }
}

impl fmt::Display for ProgressBar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filled = self.filled();
        write!(
            f,
            "{:<16} |{}{}| {}%",
            self.label,
            "#".repeat(filled).yellow(),
            " ".repeat(BAR_WIDTH - filled),
            self.percent()
        )
    }
}

/// Writes the report as progress bars, one block per node followed by the
/// cluster totals. `verbose` adds a per-pod table under each node.
pub fn render_text<W: Write>(report: &Report, verbose: bool, out: &mut W) -> io::Result<()> {
    if let Some(context) = &report.context {
        writeln!(out, "{}", format!("Active kube context: {}", context).green())?;
    }

    for node in &report.nodes {
        render_node(node, verbose, out)?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "Total cluster utilization".cyan())?;
    render_totals(&report.cluster, out)?;

    out.flush()
}

fn render_node<W: Write>(node: &NodeRecord, verbose: bool, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", format!("Node {:20}", node.name()).cyan())?;
    writeln!(
        out,
        "{}",
        ProgressBar::new("Requested CPU", node.total_cpu_requests(), node.cpu_capacity())
    )?;
    writeln!(
        out,
        "{}",
        ProgressBar::new("Limits CPU", node.total_cpu_limits(), node.cpu_capacity())
    )?;
    writeln!(
        out,
        "{}",
        ProgressBar::new("Requested memory", node.total_mem_requests(), node.mem_capacity())
    )?;
    writeln!(out)?;

    if verbose {
        writeln!(out, "\t{:50}{:>5}{:>8}", "POD", "CPU", "MEM")?;
        // pods without a cpu request are noise in the breakdown
        for pod in node.pods().filter(|p| !p.cpu_requests.is_zero()) {
            writeln!(
                out,
                "\t{:50}{:>5}{:>8}Mi",
                pod.name,
                pod.cpu_requests,
                pod.mem_requests.value() / MEBIBYTE
            )?;
        }
        writeln!(out)?;
    }

    Ok(())
}

fn render_totals<W: Write>(totals: &ClusterTotals, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "{}",
        ProgressBar::new("Requested CPU", totals.cpu_requests, totals.cpu_capacity)
    )?;
    writeln!(
        out,
        "{}",
        ProgressBar::new("Limits CPU", totals.cpu_limits, totals.cpu_capacity)
    )?;
    writeln!(
        out,
        "{}",
        ProgressBar::new("Requested memory", totals.mem_requests, totals.mem_capacity)
    )
}

/// Writes the report as pretty-printed JSON.
pub fn render_json<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}
