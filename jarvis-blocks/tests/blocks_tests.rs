use jarvis_blocks::components::Tone;
use jarvis_blocks::{
    needs_surface, parse_markup, Block, BlocksError, Component, Content, Message, Role,
    ScriptExtractor,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;

fn fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(filename);
    fs::read_to_string(&path).unwrap()
}

#[test]
fn test_chart_message_decodes() {
    let msg = Message::from_json(&fixture("chart-message.json")).unwrap();
    assert_eq!(msg.id, Some(42));
    assert_eq!(msg.role, Role::Assistant);
    assert_eq!(msg.tool_calls().len(), 1);
    assert_eq!(msg.tool_calls()[0].name, "query_revenue");

    let blocks = msg.content.block_list().unwrap();
    assert_eq!(blocks.len(), 3);
    assert!(matches!(blocks[0], Block::Text(_)));
    assert!(blocks[1].is_code());
    assert!(matches!(blocks[2], Block::Text(_)));
}

#[test]
fn test_chart_message_needs_surface_and_yields_script() {
    let msg = Message::from_json(&fixture("chart-message.json")).unwrap();
    assert!(needs_surface(&msg.content));

    let script = ScriptExtractor::default()
        .extract_from_content(&msg.content)
        .unwrap();
    assert_eq!(script.block_index, 1);
    assert!(script.source.starts_with("local ctx = document.getElementById('myChart')"));
    assert!(script.source.trim_end().ends_with("})"));
}

#[test]
fn test_text_unit_fixture() {
    let content = Content::from_json(&fixture("text-unit.json")).unwrap();
    assert!(content.block_list().is_none());
    assert!(!needs_surface(&content));
    assert_eq!(ScriptExtractor::default().extract_from_content(&content), None);
}

#[test]
fn test_content_with_neither_shape_rejected() {
    let result = Message::from_json(&fixture("invalid-content.json"));
    assert!(matches!(result, Err(BlocksError::InvalidContent(_))), "{:?}", result);
}

#[test]
fn test_content_reencodes_to_wire_shape() {
    let content = Content::blocks(vec![Block::text("a"), Block::code("export default 1")]);
    let json = serde_json::to_value(&content).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "blocks": [
                { "block_type": "text", "text": "a" },
                { "block_type": "react", "code": "export default 1" }
            ]
        })
    );
}

#[test]
fn test_dashboard_markup() {
    let tree = parse_markup(&fixture("dashboard.xml")).unwrap();
    let Component::Column(layout) = &tree else {
        panic!("expected Column root, got {:?}", tree);
    };
    assert_eq!(layout.gap, Some(12.0));
    let tags: Vec<&str> = layout.children.iter().map(|c| c.tag()).collect();
    assert_eq!(
        tags,
        vec!["Heading", "Row", "Card", "List", "Table", "Divider", "Image"]
    );

    match &layout.children[1] {
        Component::Row(row) => match &row.children[1] {
            Component::Badge(badge) => {
                assert_eq!(badge.text, "2 flaky");
                assert_eq!(badge.tone, Some(Tone::Warning));
            }
            other => panic!("expected Badge, got {:?}", other),
        },
        other => panic!("expected Row, got {:?}", other),
    }

    match &layout.children[4] {
        Component::Table(table) => {
            assert!(table.header);
            assert_eq!(table.rows[1], vec!["jarvis-blocks".to_string(), "48".to_string()]);
        }
        other => panic!("expected Table, got {:?}", other),
    }
}

#[test]
fn test_invalid_heading_markup() {
    let result = parse_markup(&fixture("invalid-heading.xml"));
    assert!(matches!(result, Err(BlocksError::ValueOutOfRange { .. })), "{:?}", result);
}

#[test]
fn test_custom_fence_marker() {
    let extractor = ScriptExtractor::new("luau").unwrap();
    let content = Content::blocks(vec![
        Block::code("```lua\nignored()\n```"),
        Block::code("```luau\nfirst()\n```\n```luau\nsecond()\n```"),
    ]);
    let script = extractor.extract_from_content(&content).unwrap();
    assert_eq!(script.block_index, 1);
    assert_eq!(script.source, "first()");
}
