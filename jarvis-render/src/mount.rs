//! Mounts a live component: render it, parse the markup, emit HTML.

use crate::error::{RenderError, RenderResult};
use crate::sandbox::ComponentHandle;
use jarvis_blocks::components::{Align, Component, Tone};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct MountedComponent {
    pub html: String,
    /// Tag of the root component, e.g. `Column`.
    pub root_tag: &'static str,
}

pub fn mount(handle: &ComponentHandle) -> RenderResult<MountedComponent> {
    let markup = handle.render()?;
    let tree = jarvis_blocks::parse_markup(&markup).map_err(|source| RenderError::Mount {
        chunk: handle.chunk().to_string(),
        source,
    })?;
    let mut html = String::new();
    component_to_html(&tree, &mut html)
        .map_err(|e| RenderError::execution(handle.chunk(), e))?;
    Ok(MountedComponent {
        html,
        root_tag: tree.tag(),
    })
}

/// Escapes text for HTML, XML markup and SVG alike.
pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn build_attrs(class: &str, style: Option<&str>) -> String {
    let style_part = style
        .filter(|s| !s.is_empty())
        .map(|s| format!(" style=\"{}\"", escape_html(s)))
        .unwrap_or_default();
    format!(" class=\"{}\"{}", escape_html(class), style_part)
}

fn tone_class(base: &str, tone: Option<Tone>) -> String {
    format!("{} jv-tone-{}", base, tone.unwrap_or(Tone::Default).as_str())
}

fn layout_style(gap: Option<f64>, align: Option<Align>) -> String {
    let mut css = String::new();
    if let Some(gap) = gap {
        css.push_str(&format!("gap:{}px;", gap));
    }
    if let Some(align) = align {
        css.push_str(&format!("align-items:{};", align.as_css()));
    }
    css
}

/// Writes one component (and its subtree) as HTML.
pub fn component_to_html(c: &Component, out: &mut String) -> std::fmt::Result {
    match c {
        Component::Column(l) | Component::Row(l) => {
            let class = if matches!(c, Component::Column(_)) {
                "jv-column"
            } else {
                "jv-row"
            };
            let style = layout_style(l.gap, l.align);
            write!(out, "<div{}>", build_attrs(class, Some(&style)))?;
            for child in &l.children {
                component_to_html(child, out)?;
            }
            write!(out, "</div>")
        }
        Component::Card(card) => {
            write!(out, "<section{}>", build_attrs("jv-card", None))?;
            if let Some(title) = &card.title {
                write!(out, "<header class=\"jv-card-title\">{}</header>", escape_html(title))?;
            }
            for child in &card.children {
                component_to_html(child, out)?;
            }
            write!(out, "</section>")
        }
        Component::Text(t) => {
            let mut class = tone_class("jv-text", t.tone);
            if t.bold {
                class.push_str(" jv-bold");
            }
            write!(out, "<p{}>{}</p>", build_attrs(&class, None), escape_html(&t.text))
        }
        Component::Heading(h) => {
            let level = h.level.clamp(1, 6);
            write!(
                out,
                "<h{lvl}{}>{}</h{lvl}>",
                build_attrs("jv-heading", None),
                escape_html(&h.text),
                lvl = level
            )
        }
        Component::Badge(b) => write!(
            out,
            "<span{}>{}</span>",
            build_attrs(&tone_class("jv-badge", b.tone), None),
            escape_html(&b.text)
        ),
        Component::Progress(p) => {
            write!(out, "<div{}>", build_attrs("jv-progress", None))?;
            if let Some(label) = &p.label {
                write!(out, "<span class=\"jv-progress-label\">{}</span>", escape_html(label))?;
            }
            write!(
                out,
                "<progress value=\"{}\" max=\"{}\"></progress><span class=\"jv-progress-fill\" style=\"width:{:.1}%\"></span></div>",
                p.value,
                p.max,
                p.percent()
            )
        }
        Component::Divider => write!(out, "<hr{} />", build_attrs("jv-divider", None)),
        Component::List(list) => {
            let tag = if list.ordered { "ol" } else { "ul" };
            write!(out, "<{}{}>", tag, build_attrs("jv-list", None))?;
            for item in &list.items {
                write!(out, "<li>{}</li>", escape_html(item))?;
            }
            write!(out, "</{}>", tag)
        }
        Component::Image(img) => write!(
            out,
            "<img{} src=\"{}\" alt=\"{}\" />",
            build_attrs("jv-image", None),
            escape_html(&img.src),
            escape_html(img.alt.as_deref().unwrap_or(""))
        ),
        Component::Table(table) => {
            write!(out, "<table{}>", build_attrs("jv-table", None))?;
            for (i, row) in table.rows.iter().enumerate() {
                let cell = if table.header && i == 0 { "th" } else { "td" };
                write!(out, "<tr>")?;
                for value in row {
                    write!(out, "<{c}>{}</{c}>", escape_html(value), c = cell)?;
                }
                write!(out, "</tr>")?;
            }
            write!(out, "</table>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{Capabilities, Sandbox};
    use crate::transpile::Chunk;
    use pretty_assertions::assert_eq;

    fn handle(src: &str) -> ComponentHandle {
        let chunk = Chunk {
            name: "block[0]".to_string(),
            source: src.to_string(),
        };
        Sandbox::default()
            .execute(&chunk, Capabilities::component())
            .unwrap()
            .export
            .unwrap()
    }

    #[test]
    fn test_mount_column() {
        let mounted = mount(&handle(
            r#"exports.default = '<Column gap="4"><Text bold="true">Hi &amp; bye</Text><Divider /></Column>'"#,
        ))
        .unwrap();
        assert_eq!(mounted.root_tag, "Column");
        assert_eq!(
            mounted.html,
            r#"<div class="jv-column" style="gap:4px;"><p class="jv-text jv-tone-default jv-bold">Hi &amp; bye</p><hr class="jv-divider" /></div>"#
        );
    }

    #[test]
    fn test_mount_table_with_header() {
        let mounted = mount(&handle(
            "exports.default = '<Table><Tr><Th>a</Th></Tr><Tr><Td>1</Td></Tr></Table>'",
        ))
        .unwrap();
        assert_eq!(
            mounted.html,
            r#"<table class="jv-table"><tr><th>a</th></tr><tr><td>1</td></tr></table>"#
        );
    }

    #[test]
    fn test_invalid_markup_is_mount_error() {
        let err = mount(&handle("exports.default = '<Blink />'")).unwrap_err();
        assert!(matches!(err, RenderError::Mount { .. }));
        assert!(err.is_block_failure());
    }

    #[test]
    fn test_text_escaped_once_from_builder_to_html() {
        let mounted = mount(&handle(
            r#"exports.default = ui.el('Text', nil, "it's <b> & \"q\"")"#,
        ))
        .unwrap();
        assert_eq!(
            mounted.html,
            r#"<p class="jv-text jv-tone-default">it&#39;s &lt;b&gt; &amp; &quot;q&quot;</p>"#
        );
        assert_eq!(escape_html("a'b"), "a&#39;b");
    }

    #[test]
    fn test_unsafe_image_rejected() {
        let err = mount(&handle(r#"exports.default = '<Image src="javascript:alert(1)" />'"#)).unwrap_err();
        assert!(matches!(err, RenderError::Mount { .. }));
    }
}
