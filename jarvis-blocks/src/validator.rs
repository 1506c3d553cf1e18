use crate::components::*;
use crate::error::{BlocksError, BlocksResult};

pub(crate) const MAX_NESTING_DEPTH: usize = 20;
const MAX_TABLE_ROWS: usize = 500;
const MAX_LIST_ITEMS: usize = 500;

/// Validate a parsed component tree.
pub fn validate_component(component: &Component) -> BlocksResult<()> {
    validate_component_recursive(component, 0)
}

fn validate_component_recursive(component: &Component, depth: usize) -> BlocksResult<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(BlocksError::MaxNestingDepthExceeded {
            max_depth: MAX_NESTING_DEPTH,
        });
    }

    match component {
        Component::Column(layout) | Component::Row(layout) => {
            if let Some(gap) = layout.gap {
                validate_range("gap", gap, 0.0, 256.0)?;
            }
        }
        Component::Heading(h) => {
            if !(1..=6).contains(&h.level) {
                return Err(BlocksError::ValueOutOfRange {
                    property: "Heading.level".to_string(),
                    value: h.level.to_string(),
                    range: "1-6".to_string(),
                });
            }
        }
        Component::Progress(p) => {
            if p.max <= 0.0 || !p.max.is_finite() {
                return Err(BlocksError::InvalidProperty {
                    component: "Progress".to_string(),
                    property: "max".to_string(),
                    reason: "must be a positive number".to_string(),
                });
            }
            validate_range("Progress.value", p.value, 0.0, p.max)?;
        }
        Component::Image(img) => validate_image_url(&img.src)?,
        Component::List(l) => {
            if l.items.len() > MAX_LIST_ITEMS {
                return Err(BlocksError::ValueOutOfRange {
                    property: "List.items".to_string(),
                    value: l.items.len().to_string(),
                    range: format!("0-{}", MAX_LIST_ITEMS),
                });
            }
        }
        Component::Table(t) => {
            if t.rows.len() > MAX_TABLE_ROWS {
                return Err(BlocksError::ValueOutOfRange {
                    property: "Table.rows".to_string(),
                    value: t.rows.len().to_string(),
                    range: format!("0-{}", MAX_TABLE_ROWS),
                });
            }
        }
        Component::Card(_)
        | Component::Text(_)
        | Component::Badge(_)
        | Component::Divider => {}
    }

    for child in component.children() {
        validate_component_recursive(child, depth + 1)?;
    }
    Ok(())
}

fn validate_range(property: &str, value: f64, min: f64, max: f64) -> BlocksResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(BlocksError::ValueOutOfRange {
            property: property.to_string(),
            value: value.to_string(),
            range: format!("{}-{}", min, max),
        });
    }
    Ok(())
}

/// Only network images and inline raster data are allowed.
fn validate_image_url(src: &str) -> BlocksResult<()> {
    let lower = src.to_ascii_lowercase();
    let allowed = lower.starts_with("https://")
        || lower.starts_with("http://")
        || lower.starts_with("data:image/png")
        || lower.starts_with("data:image/jpeg")
        || lower.starts_with("data:image/gif")
        || lower.starts_with("data:image/webp");
    if allowed {
        Ok(())
    } else {
        Err(BlocksError::UnsafeUrl {
            url: src.to_string(),
        })
    }
}
