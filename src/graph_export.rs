//! Renders a definition registry as a graph description.
//!
//! Read-only: feed it [`Container::definitions`] and write the result to a
//! file for Graphviz or a Mermaid renderer.
//!
//! [`Container::definitions`]: crate::Container::definitions

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::definition::Definition;
use crate::instance::InstanceSlot;

/// Output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Graphviz DOT
    Dot,
    /// Mermaid flowchart
    Mermaid,
}

/// Renders `definitions` in the given format.
pub fn export(definitions: &BTreeMap<String, Definition>, format: ExportFormat) -> String {
    match format {
        ExportFormat::Dot => to_dot(definitions),
        ExportFormat::Mermaid => to_mermaid(definitions),
    }
}

/// Graphviz DOT digraph: one node per definition, one edge per dependency
/// labelled with its local key, dashed edges for reuse aliases.
///
/// # Examples
///
/// ```
/// use rewire::{graph_export, Container};
/// use rewire::definition::RawDefinition;
///
/// let container = Container::builder()
///     .definition("app", RawDefinition::dependencies([("db", "Database")]))
///     .definition("shared", "!app")
///     .build()
///     .unwrap();
///
/// let dot = graph_export::to_dot(&container.definitions());
/// assert!(dot.starts_with("digraph Definitions {"));
/// assert!(dot.contains(r#""app" -> "Database" [label="db"];"#));
/// assert!(dot.contains(r#""shared" -> "app" [style=dashed, label="reuse"];"#));
/// ```
pub fn to_dot(definitions: &BTreeMap<String, Definition>) -> String {
    let mut output = String::new();
    output.push_str("digraph Definitions {\n");
    output.push_str("  rankdir=LR;\n");
    output.push_str("  node [shape=box];\n\n");

    for (id, definition) in definitions {
        let _ = writeln!(
            output,
            "  \"{}\" [label=\"{}\", style=filled, fillcolor={}];",
            escape(id),
            escape(&node_label(definition)),
            fill(definition)
        );
    }

    output.push('\n');

    for (id, definition) in definitions {
        if let Some(target) = &definition.reuse {
            let _ = writeln!(
                output,
                "  \"{}\" -> \"{}\" [style=dashed, label=\"reuse\"];",
                escape(id),
                escape(target)
            );
        }
        for (key, dependency) in &definition.dependencies {
            let _ = writeln!(
                output,
                "  \"{}\" -> \"{}\" [label=\"{}\"];",
                escape(id),
                escape(dependency),
                escape(key)
            );
        }
    }

    output.push_str("}\n");
    output
}

/// Mermaid flowchart with the same nodes and edges as [`to_dot`].
pub fn to_mermaid(definitions: &BTreeMap<String, Definition>) -> String {
    let mut node_ids = BTreeMap::new();
    let mut node_id = |id: &str| -> String {
        let next = node_ids.len();
        node_ids.entry(id.to_string()).or_insert_with(|| format!("n{next}")).clone()
    };

    let mut output = String::from("graph LR\n");
    for (id, definition) in definitions {
        let node = node_id(id);
        let _ = writeln!(output, "  {}[\"{}\"]", node, mermaid_text(&node_label(definition)));
    }
    for (id, definition) in definitions {
        let from = node_id(id);
        if let Some(target) = &definition.reuse {
            let to = node_id(target);
            let _ = writeln!(output, "  {from} -.->|reuse| {to}");
        }
        for (key, dependency) in &definition.dependencies {
            let to = node_id(dependency);
            let _ = writeln!(output, "  {from} -->|{}| {to}", mermaid_text(key));
        }
    }
    output
}

fn node_label(definition: &Definition) -> String {
    match (&definition.bundle_name, &definition.reuse) {
        (_, Some(target)) => format!("{}\\n!{}", definition.id, target),
        (Some(bundle), None) if bundle == &definition.id && definition.factory.is_none() => {
            definition.id.clone()
        }
        (Some(bundle), None) => match &definition.factory {
            Some(factory) => format!("{}\\n{}.{}", definition.id, bundle, factory),
            None => format!("{}\\n{}", definition.id, bundle),
        },
        (None, None) => definition.id.clone(),
    }
}

fn fill(definition: &Definition) -> &'static str {
    match &definition.instance {
        _ if definition.is_persistent => "lightyellow",
        InstanceSlot::Live(_) => "lightblue",
        InstanceSlot::Destroyed => "lightgrey",
        InstanceSlot::Unbuilt => "white",
    }
}

fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
}

fn mermaid_text(text: &str) -> String {
    text.replace('"', "#quot;").replace('|', "#124;")
}
