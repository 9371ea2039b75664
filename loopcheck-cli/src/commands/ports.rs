//! Serial port listing.

use anyhow::{Context, Result};
use console::style;
use loopcheck::{NativePortEnumerator, PortEnumerator, PortInfo};
use rust_i18n::t;

/// List available serial ports, as text on stderr or as JSON on stdout.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let ports = NativePortEnumerator::list_ports().context(t!("list_ports.failed").to_string())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ports_json(&ports))?);
        return Ok(());
    }

    eprintln!("{}", style(t!("list_ports.header")).bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style(t!("list_ports.no_ports")).dim());
        return Ok(());
    }

    for port in &ports {
        eprintln!(
            "  {} {}{}",
            style("•").green(),
            style(&port.name).cyan(),
            describe(port)
        );
    }
    Ok(())
}

fn ports_json(ports: &[PortInfo]) -> serde_json::Value {
    ports
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name,
                "vid": p.vid,
                "pid": p.pid,
                "manufacturer": p.manufacturer,
                "product": p.product,
            })
        })
        .collect()
}

/// USB ids and product name, when the port reports them.
fn describe(port: &PortInfo) -> String {
    let mut text = String::new();
    if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        text.push_str(&format!(" ({vid:04X}:{pid:04X})"));
    }
    if let Some(product) = port.product.as_deref().filter(|p| !p.is_empty()) {
        text.push_str(&format!(" - {}", style(product).dim()));
    }
    text
}
