//! Plan, state and schema rendering

use std::collections::HashMap;

use colored::{ColoredString, Colorize};
use mdbform_core::diagnostics::{AttributePath, Diagnostics, PathStep};
use mdbform_core::effect::Effect;
use mdbform_core::plan::Plan;
use mdbform_core::resource::Value;
use mdbform_core::schema::{AttributeMode, AttributeSchema, PlanModifier, ResourceSchema};

const SENSITIVE: &str = "(sensitive)";
const KNOWN_AFTER_APPLY: &str = "(known after apply)";

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Unknown => KNOWN_AFTER_APPLY.to_string(),
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) | Value::Set(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let strs: Vec<_> = keys
                .into_iter()
                .map(|k| format!("{}: {}", k, format_value(&map[k])))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
    }
}

/// Value at a path inside an attribute map; `Null` when any step is missing
pub fn value_at<'a>(attributes: &'a HashMap<String, Value>, path: &AttributePath) -> &'a Value {
    let mut steps = path.steps().iter();
    let mut current = match steps.next() {
        Some(PathStep::Attribute(name)) => attributes.get(name).unwrap_or(Value::null_ref()),
        _ => return Value::null_ref(),
    };
    for step in steps {
        current = match (step, current) {
            (PathStep::Attribute(key) | PathStep::Key(key), Value::Map(map)) => {
                map.get(key).unwrap_or(Value::null_ref())
            }
            (PathStep::Index(i), Value::List(items) | Value::Set(items)) => {
                items.get(*i).unwrap_or(Value::null_ref())
            }
            _ => return Value::null_ref(),
        };
    }
    current
}

fn is_sensitive(schema: Option<&ResourceSchema>, path: &AttributePath) -> bool {
    schema.is_some_and(|s| s.attributes_along(path).iter().any(|a| a.sensitive))
}

fn forces_replacement(schema: Option<&ResourceSchema>, path: &AttributePath) -> bool {
    schema.is_some_and(|s| {
        s.attributes_along(path)
            .iter()
            .any(|a| a.has_modifier(PlanModifier::RequiresReplace))
    })
}

fn display_value(schema: Option<&ResourceSchema>, path: &AttributePath, value: &Value) -> String {
    if is_sensitive(schema, path) && !value.is_null() && !value.is_unknown() {
        SENSITIVE.to_string()
    } else {
        format_value(value)
    }
}

pub fn format_effect(effect: &Effect) -> String {
    let verb = match effect {
        Effect::Create(_) => "Create",
        Effect::Update { .. } => "Update",
        Effect::Replace { .. } => "Replace",
        Effect::Delete(_) => "Delete",
    };
    format!("{} {}", verb, effect.resource_id())
}

fn effect_symbol(effect: &Effect) -> ColoredString {
    match effect {
        Effect::Create(_) => "+".green().bold(),
        Effect::Update { .. } => "~".yellow().bold(),
        Effect::Replace { .. } => "-/+".magenta().bold(),
        Effect::Delete(_) => "-".red().bold(),
    }
}

/// Lines describing one effect, without the header line
pub fn effect_details(effect: &Effect, schemas: &HashMap<String, ResourceSchema>) -> Vec<String> {
    let schema = schemas.get(&effect.resource_id().resource_type);
    match effect {
        Effect::Create(resource) => {
            let mut names: Vec<&String> = resource
                .attributes
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .collect();
            names.sort();
            names
                .into_iter()
                .map(|name| {
                    let path = AttributePath::new(name.as_str());
                    let value = display_value(schema, &path, &resource.attributes[name]);
                    format!("{} = {}", name, value)
                })
                .collect()
        }
        Effect::Update {
            from, to, changed, ..
        }
        | Effect::Replace {
            from, to, changed, ..
        } => changed
            .iter()
            .map(|path| {
                let old = display_value(schema, path, value_at(&from.attributes, path));
                let new = display_value(schema, path, value_at(&to.attributes, path));
                let mut line = format!("{}: {} -> {}", path, old, new);
                if matches!(effect, Effect::Replace { .. }) && forces_replacement(schema, path) {
                    line.push_str(" # forces replacement");
                }
                line
            })
            .collect(),
        Effect::Delete(state) => state
            .identifier
            .iter()
            .map(|identifier| format!("id = \"{}\"", identifier))
            .collect(),
    }
}

pub fn print_plan(plan: &Plan, schemas: &HashMap<String, ResourceSchema>) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();
    for effect in plan.effects() {
        println!("  {} {}", effect_symbol(effect), effect.resource_id());
        for line in effect_details(effect, schemas) {
            println!("      {}", line.dimmed());
        }
    }
    println!();
    println!("{}", plan.summary());
}

pub fn print_diagnostics(diags: &Diagnostics) {
    for warning in diags.warnings() {
        eprintln!("{} {}", "Warning:".yellow().bold(), warning);
    }
}

fn mode_label(attr: &AttributeSchema) -> &'static str {
    match attr.mode {
        AttributeMode::Required => "required",
        AttributeMode::Optional => "optional",
        AttributeMode::Computed => "computed",
        AttributeMode::OptionalComputed => "optional, computed",
    }
}

/// Schema as an indented attribute tree
pub fn schema_lines(schema: &ResourceSchema) -> Vec<String> {
    fn walk(attrs: Vec<&AttributeSchema>, indent: usize, out: &mut Vec<String>) {
        for attr in attrs {
            let mut flags = vec![mode_label(attr).to_string()];
            if attr.sensitive {
                flags.push("sensitive".to_string());
            }
            if attr.has_modifier(PlanModifier::RequiresReplace) {
                flags.push("forces replacement".to_string());
            }
            if let Some(default) = &attr.default {
                flags.push(format!("default {}", format_value(default)));
            }
            out.push(format!(
                "{}{}: {} ({})",
                "  ".repeat(indent),
                attr.name,
                attr.attr_type,
                flags.join(", ")
            ));
            if let Some(nested) = attr.attr_type.object_attributes() {
                let mut nested: Vec<&AttributeSchema> = nested.iter().collect();
                nested.sort_by(|a, b| a.name.cmp(&b.name));
                walk(nested, indent + 1, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(schema.sorted_attributes(), 0, &mut out);
    out
}

pub fn print_schema(schema: &ResourceSchema) {
    println!("{}", schema.resource_type.cyan().bold());
    if let Some(description) = &schema.description {
        println!("  {}", description.dimmed());
    }
    println!();
    for line in schema_lines(schema) {
        println!("  {}", line);
    }
}
