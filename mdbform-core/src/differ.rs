//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared in configuration with the "current
//! state" fetched from the Provider. Unset computed attributes are planned
//! from prior state or marked unknown, and the schema's plan modifiers decide
//! between an in-place update and a replacement.

use std::collections::HashMap;

use log::debug;

use crate::diagnostics::{AttributePath, Diagnostics};
use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeSchema, AttributeType, PlanModifier, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<AttributePath>,
    },
    /// Resource exists with differences that cannot be applied in place
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<AttributePath>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but not in desired state -> needs deletion
    Delete(State),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(schema: &ResourceSchema, desired: &Resource, current: &State) -> Result<Diff, Diagnostics> {
    schema.validate(&desired.attributes).into_result()?;

    let attrs = schema.sorted_attributes();

    if !current.exists {
        let planned = plan_object(&attrs, &desired.attributes, None, true);
        return Ok(Diff::Create(planned_resource(desired, planned)));
    }

    let planned = plan_object(&attrs, &desired.attributes, Some(&current.attributes), false);
    let changed = changed_paths(&attrs, &planned, &current.attributes, &AttributePath::root());
    if changed.is_empty() {
        return Ok(Diff::NoChange(desired.id.clone()));
    }

    let forcing: Vec<String> = changed
        .iter()
        .filter(|path| {
            schema
                .attributes_along(path)
                .iter()
                .any(|a| a.has_modifier(PlanModifier::RequiresReplace))
        })
        .map(|path| path.to_string())
        .collect();

    if !forcing.is_empty() {
        debug!("{}: replacement forced by {}", desired.id, forcing.join(", "));
        let planned = plan_object(&attrs, &desired.attributes, None, true);
        Ok(Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: planned_resource(desired, planned),
            changed_attributes: changed,
        })
    } else {
        let planned = plan_object(&attrs, &desired.attributes, Some(&current.attributes), true);
        Ok(Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: planned_resource(desired, planned),
            changed_attributes: changed,
        })
    }
}

fn planned_resource(desired: &Resource, attributes: HashMap<String, Value>) -> Resource {
    Resource::new(desired.id.resource_type.clone(), desired.id.name.clone())
        .with_attributes(attributes)
}

/// Compute planned values for one object level
///
/// Configured values win. Unset attributes take their default; unset
/// computed attributes keep the prior value unless `unknown_computed` is set
/// and the attribute lacks `UseStateForUnknown`, in which case they become
/// unknown. Without any prior state every unset computed attribute is unknown.
fn plan_object(
    schemas: &[&AttributeSchema],
    config: &HashMap<String, Value>,
    prior: Option<&HashMap<String, Value>>,
    unknown_computed: bool,
) -> HashMap<String, Value> {
    let mut planned = HashMap::new();

    for schema in schemas {
        let configured = config.get(&schema.name).unwrap_or(Value::null_ref());
        let prior_value = prior.and_then(|p| p.get(&schema.name));

        let value = if configured.is_known() {
            match (&schema.attr_type, configured) {
                (AttributeType::Object(nested), Value::Map(fields)) => {
                    let nested: Vec<&AttributeSchema> = nested.iter().collect();
                    let prior_fields = prior_value.and_then(Value::as_map);
                    let prior_fields = if prior.is_some() {
                        Some(prior_fields.cloned().unwrap_or_default())
                    } else {
                        None
                    };
                    Value::Map(plan_object(
                        &nested,
                        fields,
                        prior_fields.as_ref(),
                        unknown_computed,
                    ))
                }
                _ => configured.clone(),
            }
        } else if configured.is_unknown() {
            Value::Unknown
        } else if let Some(default) = &schema.default {
            default.clone()
        } else if schema.is_computed() {
            let keep_prior = prior_value.is_some_and(Value::is_known)
                && (!unknown_computed || schema.has_modifier(PlanModifier::UseStateForUnknown));
            if keep_prior {
                prior_value.cloned().unwrap_or_default()
            } else if unknown_computed || prior.is_none() {
                Value::Unknown
            } else {
                prior_value.cloned().unwrap_or_default()
            }
        } else {
            Value::Null
        };

        if !value.is_null() {
            planned.insert(schema.name.clone(), value);
        }
    }

    planned
}

/// Paths of configurable values that differ between planned and prior state
///
/// Nested objects are compared field by field and map attributes key by key,
/// so callers can tell exactly which leaf changed.
pub fn changed_paths(
    schemas: &[&AttributeSchema],
    planned: &HashMap<String, Value>,
    prior: &HashMap<String, Value>,
    path: &AttributePath,
) -> Vec<AttributePath> {
    let mut changed = Vec::new();

    for schema in schemas {
        let a = planned.get(&schema.name).unwrap_or(Value::null_ref());
        let b = prior.get(&schema.name).unwrap_or(Value::null_ref());
        if a == b || a.is_unknown() {
            continue;
        }
        let attr_path = path.attribute(schema.name.as_str());

        match (&schema.attr_type, a, b) {
            (AttributeType::Object(nested), Value::Map(x), Value::Map(y)) => {
                let nested: Vec<&AttributeSchema> = nested.iter().collect();
                changed.extend(changed_paths(&nested, x, y, &attr_path));
            }
            (AttributeType::Map(_), Value::Map(x), Value::Map(y)) => {
                let mut keys: Vec<&String> = x.keys().chain(y.keys()).collect();
                keys.sort();
                keys.dedup();
                for key in keys {
                    if x.get(key) != y.get(key) {
                        changed.push(attr_path.key(key.as_str()));
                    }
                }
            }
            _ => changed.push(attr_path),
        }
    }

    changed
}

/// Compute Diff for multiple resources and generate a Plan
///
/// Resources present in `current_states` but absent from `desired` are
/// deleted. Diagnostics of every resource are collected before failing.
pub fn create_plan(
    schemas: &HashMap<String, ResourceSchema>,
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
) -> Result<Plan, Diagnostics> {
    let mut plan = Plan::new();
    let mut diags = Diagnostics::new();

    for resource in desired {
        let Some(schema) = schemas.get(&resource.id.resource_type) else {
            diags.add_error(
                format!("{}: Unsupported resource type", resource.id),
                format!("no schema for '{}'", resource.id.resource_type),
            );
            continue;
        };

        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(schema, resource, &current) {
            Ok(Diff::Create(r)) => plan.add(Effect::Create(r)),
            Ok(Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            }) => plan.add(Effect::Update {
                id,
                from,
                to,
                changed: changed_attributes,
            }),
            Ok(Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            }) => plan.add(Effect::Replace {
                id,
                from,
                to,
                changed: changed_attributes,
            }),
            Ok(Diff::NoChange(_)) => debug!("{}: no changes", resource.id),
            Ok(Diff::Delete(state)) => plan.add(Effect::Delete(state)),
            Err(errors) => diags.extend(errors.prefixed(&resource.id.to_string())),
        }
    }

    let mut orphans: Vec<&State> = current_states
        .values()
        .filter(|s| s.exists && !desired.iter().any(|r| r.id == s.id))
        .collect();
    orphans.sort_by(|a, b| a.id.name.cmp(&b.id.name));
    for state in orphans {
        debug!("{}: no longer in configuration, planning delete", state.id);
        plan.add(Effect::Delete(state.clone()));
    }

    debug!("{}", plan.summary());

    diags.into_result()?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("cluster")
            .attribute(
                AttributeSchema::new("id", AttributeType::String)
                    .computed()
                    .use_state_for_unknown(),
            )
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(
                AttributeSchema::new("zone_id", AttributeType::String)
                    .required()
                    .requires_replace(),
            )
            .attribute(
                AttributeSchema::new("deletion_protection", AttributeType::Bool)
                    .optional_computed()
                    .with_default(Value::Bool(false)),
            )
            .attribute(AttributeSchema::new("labels", types::string_map()))
            .attribute(AttributeSchema::new(
                "cloud_storage",
                AttributeType::Object(vec![AttributeSchema::new("enable", AttributeType::Bool)]),
            ))
    }

    fn desired(name: &str) -> Resource {
        Resource::new("cluster", "main")
            .with_attribute("name", Value::from(name))
            .with_attribute("zone_id", Value::from("ru-central1-a"))
    }

    fn prior() -> State {
        let attrs = HashMap::from([
            ("id".to_string(), Value::from("c9q1")),
            ("status".to_string(), Value::from("RUNNING")),
            ("name".to_string(), Value::from("gp")),
            ("zone_id".to_string(), Value::from("ru-central1-a")),
            ("deletion_protection".to_string(), Value::Bool(false)),
        ]);
        State::existing(ResourceId::new("cluster", "main"), attrs).with_identifier("c9q1")
    }

    #[test]
    fn create_marks_computed_unknown_and_applies_defaults() {
        let current = State::not_found(ResourceId::new("cluster", "main"));
        let Diff::Create(planned) = diff(&schema(), &desired("gp"), &current).unwrap() else {
            panic!("Expected Create");
        };
        assert!(planned.get("id").is_unknown());
        assert!(planned.get("status").is_unknown());
        assert_eq!(planned.get("deletion_protection"), &Value::Bool(false));
        assert!(planned.get("labels").is_null());
    }

    #[test]
    fn no_change_when_config_matches_prior() {
        let result = diff(&schema(), &desired("gp"), &prior()).unwrap();
        assert_eq!(result, Diff::NoChange(ResourceId::new("cluster", "main")));
    }

    #[test]
    fn update_keeps_state_for_unknown_but_not_others() {
        let result = diff(&schema(), &desired("gp-renamed"), &prior()).unwrap();
        let Diff::Update {
            to,
            changed_attributes,
            ..
        } = result
        else {
            panic!("Expected Update");
        };
        assert_eq!(changed_attributes, vec![AttributePath::new("name")]);
        assert_eq!(to.get("id"), &Value::from("c9q1"));
        assert!(to.get("status").is_unknown());
    }

    #[test]
    fn replace_when_requires_replace_attribute_changes() {
        let desired = desired("gp").with_attribute("zone_id", Value::from("ru-central1-b"));
        let result = diff(&schema(), &desired, &prior()).unwrap();
        let Diff::Replace { to, .. } = result else {
            panic!("Expected Replace");
        };
        assert!(to.get("id").is_unknown());
    }

    #[test]
    fn map_changes_are_reported_per_key() {
        let desired = desired("gp").with_attribute(
            "labels",
            Value::object([("env", Value::from("prod")), ("team", Value::from("dwh"))]),
        );
        let mut current = prior();
        current.attributes.insert(
            "labels".to_string(),
            Value::object([("env", Value::from("prod")), ("owner", Value::from("me"))]),
        );

        let Diff::Update {
            changed_attributes, ..
        } = diff(&schema(), &desired, &current).unwrap()
        else {
            panic!("Expected Update");
        };
        let rendered: Vec<String> = changed_attributes.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["labels[\"owner\"]", "labels[\"team\"]"]);
    }

    #[test]
    fn nested_object_changes_are_reported_per_field() {
        let desired = desired("gp")
            .with_attribute("cloud_storage", Value::object([("enable", Value::Bool(true))]));
        let mut current = prior();
        current.attributes.insert(
            "cloud_storage".to_string(),
            Value::object([("enable", Value::Bool(false))]),
        );

        let Diff::Update {
            changed_attributes, ..
        } = diff(&schema(), &desired, &current).unwrap()
        else {
            panic!("Expected Update");
        };
        assert_eq!(
            changed_attributes,
            vec![AttributePath::new("cloud_storage").attribute("enable")]
        );
    }

    #[test]
    fn invalid_config_returns_diagnostics() {
        let desired = Resource::new("cluster", "main");
        let errors = diff(&schema(), &desired, &prior()).unwrap_err();
        assert_eq!(errors.errors().count(), 2);
    }

    #[test]
    fn create_plan_from_resources() {
        let schemas = HashMap::from([("cluster".to_string(), schema())]);
        let resources = vec![
            Resource::new("cluster", "new")
                .with_attribute("name", Value::from("a"))
                .with_attribute("zone_id", Value::from("ru-central1-a")),
            desired("gp-renamed"),
        ];

        let mut current_states = HashMap::new();
        current_states.insert(ResourceId::new("cluster", "main"), prior());
        let mut orphan = prior();
        orphan.id = ResourceId::new("cluster", "orphan");
        current_states.insert(orphan.id.clone(), orphan);

        let plan = create_plan(&schemas, &resources, &current_states).unwrap();

        assert_eq!(plan.effects().len(), 3);
        assert!(matches!(plan.effects()[0], Effect::Create(_)));
        assert!(matches!(plan.effects()[1], Effect::Update { .. }));
        assert!(matches!(plan.effects()[2], Effect::Delete(_)));
    }

    #[test]
    fn create_plan_collects_errors_per_resource() {
        let schemas = HashMap::from([("cluster".to_string(), schema())]);
        let resources = vec![Resource::new("cluster", "a"), Resource::new("unknown", "b")];

        let errors = create_plan(&schemas, &resources, &HashMap::new()).unwrap_err();
        let rendered = errors.to_string();
        assert!(rendered.contains("cluster.a: Missing required attribute"));
        assert!(rendered.contains("unknown.b: Unsupported resource type"));
    }
}
