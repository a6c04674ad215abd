use crate::args::{Action, BindingArgs, CommandLineArgs, DisplayArgs};

use anyhow::Context;
use eslog::error::WorkbenchError;
use eslog::extractor::{extract_with, find_all, BraceCounting};
use eslog::globals::{default_params, last_24_hours, GlobalParams};
use eslog::http::HttpClient;
use eslog::profile::{IniFile, Profile, DEFAULT_INI_SECTION};
use eslog::projector::{format_embedded_json, ProjectedResult};
use eslog::template::{bind, parse};
use eslog::utils::{read_input, Result};
use eslog::workbench::{RequestSource, Workbench};
use serde::Serialize;
use serde_json::{json, Value};

pub async fn run(args: &CommandLineArgs) -> Result<()> {
    match args.action() {
        Action::Extract { file, line, scan } => {
            extract_block(&read_input(file.as_deref())?, *line, scan.counting())
        }
        Action::List { file, scan } => list_blocks(&read_input(file.as_deref())?, scan.counting()),
        Action::Vars { file } => print_json(&parse(&read_input(file.as_deref())?)),
        Action::Bind { file, binding } => {
            let profile = load_profile(args)?;
            let template = read_input(file.as_deref())?;
            let globals = resolve_globals(&profile, binding);
            let overrides = binding
                .variables
                .iter()
                .map(|(n, v)| (n.as_str(), v.as_str()));
            println!("{}", bind(&template, overrides, &globals));
            Ok(())
        }
        Action::Project { file, display } => {
            let response = read_input(file.as_deref())?;
            let workbench = Workbench::new(GlobalParams::new(), &display.fields);
            print_result(&workbench, &response, display)
        }
        Action::Run {
            file,
            line,
            template,
            dry_run,
            binding,
            display,
            scan,
        } => {
            let profile = load_profile(args)?;
            let text = read_input(file.as_deref())?;
            let source = if *template {
                RequestSource::Template {
                    text,
                    overrides: binding.variables.clone(),
                }
            } else {
                RequestSource::Buffer {
                    text,
                    cursor_line: line.unwrap_or_default(),
                }
            };
            let workbench = Workbench::new(resolve_globals(&profile, binding), &display.fields)
                .with_counting(scan.counting());
            let block = workbench.resolve(&source)?;
            let client = HttpClient::new(&profile)?;

            if *dry_run {
                return print_json(&json!({
                    "method": "POST",
                    "url": client.search_url(&block),
                    "body": block.body_json().unwrap_or(Value::String(block.body_text().to_string())),
                }));
            }

            if args.verbose() {
                eprintln!("> POST {}", client.search_url(&block));
            }
            let res = client.search(&block).await?;
            if args.verbose() {
                eprintln!("> status: {}", res.status());
                for (name, value) in res.headers().iter() {
                    eprintln!("> {}: {}", name, value.to_str().unwrap_or_default());
                }
            }
            if !res.status().is_success() {
                anyhow::bail!("{}: {}", res.status(), res.body());
            }

            print_result(&workbench, res.body(), display)
        }
    }
}

fn load_profile(args: &CommandLineArgs) -> Result<Profile> {
    let profile = IniFile::load_profile(args.config(), args.profile())?;
    match profile {
        Some(p) => Ok(p),
        None if args.profile() == DEFAULT_INI_SECTION => Ok(Profile::default()),
        None => anyhow::bail!("Profile '{}' not found in {}", args.profile(), args.config()),
    }
}

/// Profile globals (or the built-in defaults when the profile has none),
/// then the last-24-hours window, then `-g` values.
fn resolve_globals(profile: &Profile, binding: &BindingArgs) -> GlobalParams {
    let mut globals = if profile.globals().is_empty() {
        default_params()
    } else {
        profile.globals().clone()
    };
    if binding.last_24h {
        globals.extend(last_24_hours(chrono::Utc::now()));
    }
    globals.extend(binding.globals.iter().cloned());
    globals
}

fn extract_block(buffer: &str, line: usize, counting: BraceCounting) -> Result<()> {
    let block = extract_with(buffer, line, counting).ok_or(WorkbenchError::NotFound(line))?;
    print_json(&block)
}

fn list_blocks(buffer: &str, counting: BraceCounting) -> Result<()> {
    print_json(&find_all(buffer, counting))
}

fn print_result(workbench: &Workbench, response: &str, display: &DisplayArgs) -> Result<()> {
    let previous = match &display.previous {
        Some(path) => Some(read_input(Some(path.as_str()))?),
        None => None,
    };
    let mut result = workbench.display(response, previous.as_deref());
    expand_fields(&mut result, &display.expand);
    println!("{}", result.to_pretty_json());
    Ok(())
}

fn expand_fields(result: &mut ProjectedResult, fields: &[String]) {
    for record in result.hits.iter_mut() {
        for field in fields {
            record.map_field(field, |value| match value.as_str() {
                Some(text) => Value::String(format_embedded_json(text)),
                None => value.clone(),
            });
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{}", text);
    Ok(())
}
