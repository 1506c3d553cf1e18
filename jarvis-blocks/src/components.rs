use serde::{Deserialize, Serialize};

/// One node of a Jarvis markup tree, as returned by an exported component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component")]
pub enum Component {
    Column(Layout),
    Row(Layout),
    Card(Card),
    Text(Text),
    Heading(Heading),
    Badge(Badge),
    Progress(Progress),
    Divider,
    List(List),
    Image(Image),
    Table(Table),
}

impl Component {
    /// Tag name as written in markup.
    pub fn tag(&self) -> &'static str {
        match self {
            Component::Column(_) => "Column",
            Component::Row(_) => "Row",
            Component::Card(_) => "Card",
            Component::Text(_) => "Text",
            Component::Heading(_) => "Heading",
            Component::Badge(_) => "Badge",
            Component::Progress(_) => "Progress",
            Component::Divider => "Divider",
            Component::List(_) => "List",
            Component::Image(_) => "Image",
            Component::Table(_) => "Table",
        }
    }

    /// Direct child components (list items and table cells are not components).
    pub fn children(&self) -> &[Component] {
        match self {
            Component::Column(l) | Component::Row(l) => &l.children,
            Component::Card(c) => &c.children,
            _ => &[],
        }
    }
}

/// Column / Row: stack children vertically or horizontally.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    pub children: Vec<Component>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Align {
    Start,
    Center,
    End,
    Stretch,
}

impl Align {
    pub const VARIANTS: &'static str = "start, center, end, stretch";

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Align::Start),
            "center" => Some(Align::Center),
            "end" => Some(Align::End),
            "stretch" => Some(Align::Stretch),
            _ => None,
        }
    }

    pub fn as_css(self) -> &'static str {
        match self {
            Align::Start => "flex-start",
            Align::Center => "center",
            Align::End => "flex-end",
            Align::Stretch => "stretch",
        }
    }
}

/// Bordered panel with an optional title.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Card {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub children: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
    #[serde(default)]
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// 1 to 6
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
}

/// Horizontal bar showing `value` out of `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub value: f64,
    pub max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Progress {
    /// Fill ratio in percent, clamped to 0..=100.
    pub fn percent(&self) -> f64 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.value / self.max * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct List {
    #[serde(default)]
    pub ordered: bool,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Plain data table. The first row is the header when `header` is true.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub header: bool,
    pub rows: Vec<Vec<String>>,
}

/// Colour intent for Text and Badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tone {
    Default,
    Muted,
    Accent,
    Success,
    Warning,
    Danger,
}

impl Tone {
    pub const VARIANTS: &'static str = "default, muted, accent, success, warning, danger";

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Tone::Default),
            "muted" => Some(Tone::Muted),
            "accent" => Some(Tone::Accent),
            "success" => Some(Tone::Success),
            "warning" => Some(Tone::Warning),
            "danger" => Some(Tone::Danger),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Default => "default",
            Tone::Muted => "muted",
            Tone::Accent => "accent",
            Tone::Success => "success",
            Tone::Warning => "warning",
            Tone::Danger => "danger",
        }
    }
}

/// Tags accepted by the parser.
pub const BUILTIN_COMPONENTS: &[&str] = &[
    "Column", "Row", "Card", "Text", "Heading", "Badge", "Progress", "Divider", "List", "Image",
    "Table",
];
