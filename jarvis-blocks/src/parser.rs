use roxmltree::Node;

use crate::components::*;
use crate::error::{BlocksError, BlocksResult};
use crate::validator::{validate_component, MAX_NESTING_DEPTH};

/// Synthetic root tag so that surrounding whitespace and comments parse.
const WRAPPER: &str = "__jarvis_root__";

fn wrap(xml: &str) -> String {
    format!("<{0}>{1}</{0}>", WRAPPER, xml)
}

// ─── Public parse functions ──────────────────────────────────────────────────

/// Parse and validate a markup string with exactly one root component.
pub fn parse_markup(xml: &str) -> BlocksResult<Component> {
    let wrapped = wrap(xml);
    let doc = roxmltree::Document::parse(&wrapped)?;
    let root = doc.root_element();

    let mut children = element_children(root);
    let first = children.next().ok_or(BlocksError::EmptyMarkup)?;
    if children.next().is_some() {
        return Err(BlocksError::MultipleRootComponents);
    }

    let component = parse_component_node(first, 0)?;
    validate_component(&component)?;
    Ok(component)
}

// ─── Component dispatch ───────────────────────────────────────────────────────

/// Depth is checked while descending, not after the tree is built.
fn parse_component_node<'a>(node: Node<'a, 'a>, depth: usize) -> BlocksResult<Component> {
    if depth > MAX_NESTING_DEPTH {
        return Err(BlocksError::MaxNestingDepthExceeded {
            max_depth: MAX_NESTING_DEPTH,
        });
    }
    match node.tag_name().name() {
        "Column" => parse_layout_node(node, depth).map(Component::Column),
        "Row" => parse_layout_node(node, depth).map(Component::Row),
        "Card" => parse_card_node(node, depth).map(Component::Card),
        "Text" => parse_text_node(node).map(Component::Text),
        "Heading" => parse_heading_node(node).map(Component::Heading),
        "Badge" => parse_badge_node(node).map(Component::Badge),
        "Progress" => parse_progress_node(node).map(Component::Progress),
        "Divider" => Ok(Component::Divider),
        "List" => parse_list_node(node).map(Component::List),
        "Image" => parse_image_node(node).map(Component::Image),
        "Table" => parse_table_node(node).map(Component::Table),
        other => Err(BlocksError::InvalidComponent {
            component: other.to_string(),
            reason: format!("Unknown component. Expected one of: {}", BUILTIN_COMPONENTS.join(", ")),
        }),
    }
}

fn element_children<'a>(node: Node<'a, 'a>) -> impl Iterator<Item = Node<'a, 'a>> {
    node.children().filter(|n| n.is_element())
}

fn parse_children_nodes<'a>(node: Node<'a, 'a>, depth: usize) -> BlocksResult<Vec<Component>> {
    element_children(node)
        .map(|child| parse_component_node(child, depth + 1))
        .collect()
}

fn node_text_content(node: Node) -> String {
    let mut s = String::new();
    for child in node.children() {
        if child.is_text() {
            if let Some(t) = child.text() {
                s.push_str(t);
            }
        }
    }
    s
}

/// `attr` if present, otherwise the trimmed inner text if non-empty.
fn text_attr_or_content(node: Node, attr: &str) -> Option<String> {
    node.attribute(attr).map(|s| s.to_string()).or_else(|| {
        let content = node_text_content(node);
        let t = content.trim();
        (!t.is_empty()).then(|| t.to_string())
    })
}

fn required_text(node: Node, component: &str) -> BlocksResult<String> {
    text_attr_or_content(node, "text").ok_or_else(|| BlocksError::MissingProperty {
        component: component.to_string(),
        property: "text".to_string(),
    })
}

// ─── Value parsers ────────────────────────────────────────────────────────────

fn parse_f64(s: &str, component: &str, prop: &str) -> BlocksResult<f64> {
    s.trim().parse::<f64>().map_err(|_| BlocksError::InvalidProperty {
        component: component.to_string(),
        property: prop.to_string(),
        reason: format!("expected a number, got '{}'", s),
    })
}

fn parse_bool(s: &str, component: &str, prop: &str) -> BlocksResult<bool> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(BlocksError::InvalidProperty {
            component: component.to_string(),
            property: prop.to_string(),
            reason: format!("expected 'true' or 'false', got '{}'", other),
        }),
    }
}

fn parse_tone(node: Node) -> BlocksResult<Option<Tone>> {
    node.attribute("tone")
        .map(|s| {
            Tone::parse(s).ok_or_else(|| BlocksError::InvalidEnum {
                property: "tone".to_string(),
                value: s.to_string(),
                expected: Tone::VARIANTS.to_string(),
            })
        })
        .transpose()
}

// ─── Component parsers ────────────────────────────────────────────────────────

fn parse_layout_node<'a>(node: Node<'a, 'a>, depth: usize) -> BlocksResult<Layout> {
    let component = node.tag_name().name();
    let gap = node
        .attribute("gap")
        .map(|s| parse_f64(s, component, "gap"))
        .transpose()?;
    let align = node
        .attribute("align")
        .map(|s| {
            Align::parse(s).ok_or_else(|| BlocksError::InvalidEnum {
                property: "align".to_string(),
                value: s.to_string(),
                expected: Align::VARIANTS.to_string(),
            })
        })
        .transpose()?;
    Ok(Layout {
        gap,
        align,
        children: parse_children_nodes(node, depth)?,
    })
}

fn parse_card_node<'a>(node: Node<'a, 'a>, depth: usize) -> BlocksResult<Card> {
    Ok(Card {
        title: node.attribute("title").map(|s| s.to_string()),
        children: parse_children_nodes(node, depth)?,
    })
}

fn parse_text_node(node: Node) -> BlocksResult<Text> {
    let bold = node
        .attribute("bold")
        .map(|s| parse_bool(s, "Text", "bold"))
        .transpose()?
        .unwrap_or(false);
    Ok(Text {
        text: required_text(node, "Text")?,
        tone: parse_tone(node)?,
        bold,
    })
}

fn parse_heading_node(node: Node) -> BlocksResult<Heading> {
    let level = match node.attribute("level") {
        Some(s) => s.trim().parse::<u8>().map_err(|_| BlocksError::InvalidProperty {
            component: "Heading".to_string(),
            property: "level".to_string(),
            reason: format!("expected an integer, got '{}'", s),
        })?,
        None => 2,
    };
    Ok(Heading {
        level,
        text: required_text(node, "Heading")?,
    })
}

fn parse_badge_node(node: Node) -> BlocksResult<Badge> {
    Ok(Badge {
        text: required_text(node, "Badge")?,
        tone: parse_tone(node)?,
    })
}

fn parse_progress_node(node: Node) -> BlocksResult<Progress> {
    let value = node
        .attribute("value")
        .ok_or_else(|| BlocksError::MissingProperty {
            component: "Progress".to_string(),
            property: "value".to_string(),
        })?;
    let value = parse_f64(value, "Progress", "value")?;
    let max = node
        .attribute("max")
        .map(|s| parse_f64(s, "Progress", "max"))
        .transpose()?
        .unwrap_or(100.0);
    Ok(Progress {
        value,
        max,
        label: node.attribute("label").map(|s| s.to_string()),
    })
}

fn parse_list_node<'a>(node: Node<'a, 'a>) -> BlocksResult<List> {
    let ordered = node
        .attribute("ordered")
        .map(|s| parse_bool(s, "List", "ordered"))
        .transpose()?
        .unwrap_or(false);
    let mut items = Vec::new();
    for child in element_children(node) {
        if child.tag_name().name() != "Item" {
            return Err(BlocksError::InvalidComponent {
                component: child.tag_name().name().to_string(),
                reason: "List children must be <Item> elements".to_string(),
            });
        }
        items.push(text_attr_or_content(child, "text").unwrap_or_default());
    }
    Ok(List { ordered, items })
}

fn parse_image_node(node: Node) -> BlocksResult<Image> {
    let src = node
        .attribute("src")
        .ok_or_else(|| BlocksError::MissingProperty {
            component: "Image".to_string(),
            property: "src".to_string(),
        })?;
    Ok(Image {
        src: src.trim().to_string(),
        alt: node.attribute("alt").map(|s| s.to_string()),
    })
}

fn parse_table_node<'a>(node: Node<'a, 'a>) -> BlocksResult<Table> {
    let mut header = node
        .attribute("header")
        .map(|s| parse_bool(s, "Table", "header"))
        .transpose()?
        .unwrap_or(false);
    let mut rows = Vec::new();
    for (row_index, row) in element_children(node).enumerate() {
        if row.tag_name().name() != "Tr" {
            return Err(BlocksError::InvalidComponent {
                component: row.tag_name().name().to_string(),
                reason: "Table children must be <Tr> elements".to_string(),
            });
        }
        let mut cells = Vec::new();
        for cell in element_children(row) {
            match cell.tag_name().name() {
                "Td" => {}
                // A <Th> in the first row marks it as the header row.
                "Th" if row_index == 0 => header = true,
                other => {
                    return Err(BlocksError::InvalidComponent {
                        component: other.to_string(),
                        reason: "Table rows may only contain <Td> (or <Th> in the first row)"
                            .to_string(),
                    })
                }
            }
            cells.push(node_text_content(cell).trim().to_string());
        }
        rows.push(cells);
    }
    Ok(Table { header, rows })
}
