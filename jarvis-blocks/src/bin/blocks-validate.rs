use jarvis_blocks::{parse_markup, BlocksError, Content, Message, ScriptExtractor};
use std::env;
use std::fs;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: blocks-validate <message.json|content.json|component.xml>...");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  blocks-validate reply.json");
        eprintln!("  blocks-validate card.xml");
        process::exit(1);
    }

    let extractor = ScriptExtractor::default();
    let mut exit_code = 0;

    for file_path in &args[1..] {
        match validate_file(file_path, &extractor) {
            Ok(summary) => {
                println!("✓ {} is valid ({})", file_path, summary);
            }
            Err(e) => {
                eprintln!("✗ {} has errors:", file_path);
                print_error(&e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

fn validate_file(path: &str, extractor: &ScriptExtractor) -> Result<String, BlocksError> {
    let text = fs::read_to_string(path)
        .map_err(|e| BlocksError::InvalidContent(format!("Failed to read file: {}", e)))?;

    // Markup files are checked as a component tree; anything else is JSON.
    if path.ends_with(".xml") {
        let root = parse_markup(&text)?;
        return Ok(format!("{} component", root.tag()));
    }

    let content = match Message::from_json(&text) {
        Ok(message) => message.content.as_ref().clone(),
        Err(_) => Content::from_json(&text)?,
    };

    let summary = match &content {
        Content::Text(_) => "text body".to_string(),
        Content::Blocks(seq) => {
            let code = content.code_blocks().count();
            let chart = match extractor.extract_first(&seq.blocks) {
                Some(script) => format!(", chart script in block {}", script.block_index),
                None => String::new(),
            };
            format!("{} blocks, {} code{}", seq.blocks.len(), code, chart)
        }
    };
    tracing::debug!(path = %path, summary = %summary, "validated");
    Ok(summary)
}

fn print_error(error: &BlocksError) {
    match error {
        BlocksError::InvalidContent(msg) => {
            eprintln!("  Invalid content:");
            eprintln!("    {}", msg);
        }
        BlocksError::XmlError(msg) => {
            eprintln!("  XML error:");
            eprintln!("    {}", msg);
        }
        BlocksError::InvalidComponent { component, reason } => {
            eprintln!("  Invalid component '{}':", component);
            eprintln!("    {}", reason);
        }
        BlocksError::MissingProperty {
            component,
            property,
        } => {
            eprintln!(
                "  Missing required property '{}' for component '{}'",
                property, component
            );
        }
        BlocksError::ValueOutOfRange {
            property,
            value,
            range,
        } => {
            eprintln!("  Value out of range for '{}':", property);
            eprintln!("    Value: {}", value);
            eprintln!("    Expected range: {}", range);
        }
        e => {
            eprintln!("  {}", e);
        }
    }
}
