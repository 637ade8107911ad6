//! Manifest parser built on `serde_yaml`.
//!
//! Transforms raw YAML text into a [`Manifest`] in two phases: the document
//! is read into an order-preserving entry list (so duplicate logical names
//! surface as such instead of as a generic YAML error), then every resource
//! and output is lowered into the AST, recognizing intrinsic functions in
//! both `!Tag` and `Fn::` mapping form.

pub mod ast;
pub mod template;
pub mod validator;

use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde_yaml::{Mapping, Value};
use stackplan_common::constants::RESOURCE_ATTRIBUTES;
use stackplan_common::error::{Result, StackplanError};
use stackplan_common::types::Location;

use self::ast::{Manifest, OutputDecl, PropertyValue, Resource};

/// Top-level mapping entries in document order, with repeated keys set aside.
#[derive(Debug, Default)]
struct Entries {
    entries: Vec<(String, Value)>,
    duplicates: Vec<String>,
}

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(EntriesVisitor)
    }
}

struct EntriesVisitor;

impl<'de> Visitor<'de> for EntriesVisitor {
    type Value = Entries;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of names to declarations")
    }

    fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Entries, E> {
        Ok(Entries::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Entries, A::Error> {
        let mut seen = HashSet::new();
        let mut out = Entries::default();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            if seen.insert(key.clone()) {
                out.entries.push((key, value));
            } else {
                out.duplicates.push(key);
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTemplate {
    resources: Entries,
    #[serde(default)]
    outputs: Entries,
    #[serde(default)]
    parameters: Entries,
}

fn at(path: &str, message: impl Into<String>) -> StackplanError {
    StackplanError::Parse {
        location: None,
        path: Some(path.to_owned()),
        message: message.into(),
    }
}

fn yaml_err(e: &serde_yaml::Error) -> StackplanError {
    StackplanError::Parse {
        location: e.location().map(|l| Location {
            line: l.line(),
            column: l.column(),
        }),
        path: None,
        message: e.to_string(),
    }
}

/// Parses a manifest from its YAML source text.
///
/// Reference targets are not checked here; see [`crate::resolver`].
///
/// # Errors
///
/// Returns [`StackplanError::DuplicateResourceName`] if a logical name is
/// declared twice, or [`StackplanError::Parse`] for malformed input.
pub fn parse_manifest(input: &str) -> Result<Manifest> {
    tracing::info!("parsing manifest input");
    let raw: RawTemplate = serde_yaml::from_str(input).map_err(|e| yaml_err(&e))?;

    if let Some(name) = raw.resources.duplicates.into_iter().next() {
        return Err(StackplanError::DuplicateResourceName { name });
    }
    if let Some(name) = raw.outputs.duplicates.first() {
        return Err(at(&format!("Outputs.{name}"), "duplicate output name"));
    }
    if let Some(name) = raw.parameters.duplicates.first() {
        return Err(at(&format!("Parameters.{name}"), "duplicate parameter name"));
    }

    let resources = raw
        .resources
        .entries
        .into_iter()
        .map(|(name, value)| parse_resource(name, value))
        .collect::<Result<Vec<_>>>()?;
    let outputs = raw
        .outputs
        .entries
        .into_iter()
        .map(|(name, value)| parse_output(name, value))
        .collect::<Result<Vec<_>>>()?;
    let parameters = raw.parameters.entries.into_iter().map(|(name, _)| name).collect();

    let manifest = Manifest {
        parameters,
        resources,
        outputs,
    };
    tracing::debug!(
        resources = manifest.resources.len(),
        outputs = manifest.outputs.len(),
        parameters = manifest.parameters.len(),
        "parsed manifest"
    );
    Ok(manifest)
}

fn key_string(key: Value, path: &str) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        other => Err(at(path, format!("expected a string key, got {other:?}"))),
    }
}

fn parse_resource(name: String, value: Value) -> Result<Resource> {
    let path = format!("Resources.{name}");
    let Value::Mapping(map) = value else {
        return Err(at(&path, "resource declaration must be a mapping"));
    };

    let mut resource = Resource {
        name,
        ..Resource::default()
    };

    for (key, value) in map {
        let key = key_string(key, &path)?;
        match key.as_str() {
            "Type" => {
                resource.resource_type = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => {
                        return Err(at(
                            &format!("{path}.Type"),
                            format!("type tag must be a string, got {other:?}"),
                        ));
                    }
                };
            }
            "Properties" => {
                resource.properties = parse_properties(value, &format!("{path}.Properties"))?;
            }
            "DependsOn" => {
                resource.depends_on = parse_depends_on(value, &format!("{path}.DependsOn"))?;
            }
            "Metadata" => resource.metadata = Some(value),
            other if RESOURCE_ATTRIBUTES.contains(&other) => {}
            other => {
                return Err(at(&path, format!("unknown resource attribute: {other}")));
            }
        }
    }

    Ok(resource)
}

fn parse_properties(value: Value, path: &str) -> Result<Vec<(String, PropertyValue)>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Mapping(map) => parse_entries(map, path),
        _ => Err(at(path, "Properties must be a mapping")),
    }
}

fn parse_entries(map: Mapping, path: &str) -> Result<Vec<(String, PropertyValue)>> {
    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        let key = key_string(key, path)?;
        let child = format!("{path}.{key}");
        entries.push((key, parse_value(value, &child)?));
    }
    Ok(entries)
}

fn parse_depends_on(value: Value, path: &str) -> Result<Vec<String>> {
    match value {
        Value::String(name) => Ok(vec![name]),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(name) => Ok(name),
                other => Err(at(
                    &format!("{path}[{i}]"),
                    format!("expected a logical name, got {other:?}"),
                )),
            })
            .collect(),
        other => Err(at(
            path,
            format!("DependsOn must be a name or a list of names, got {other:?}"),
        )),
    }
}

fn intrinsic_name(map: &Mapping) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    let (key, _) = map.iter().next()?;
    key.as_str()
        .filter(|k| *k == "Ref" || k.starts_with("Fn::"))
}

fn parse_value(value: Value, path: &str) -> Result<PropertyValue> {
    match value {
        Value::Null => Ok(PropertyValue::Null),
        Value::Bool(b) => Ok(PropertyValue::Bool(b)),
        Value::Number(n) => Ok(PropertyValue::Number(n.to_string())),
        Value::String(s) => Ok(PropertyValue::String(s)),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| parse_value(item, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(PropertyValue::List),
        Value::Mapping(map) => {
            if let Some(name) = intrinsic_name(&map).map(str::to_owned) {
                let arg = map.into_iter().next().map_or(Value::Null, |(_, v)| v);
                parse_intrinsic(&name, arg, path)
            } else {
                parse_entries(map, path).map(PropertyValue::Map)
            }
        }
        Value::Tagged(tagged) => {
            let tagged = *tagged;
            let tag = tagged.tag.to_string();
            let short = tag.trim_start_matches('!');
            let name = if short == "Ref" {
                short.to_owned()
            } else {
                format!("Fn::{short}")
            };
            parse_intrinsic(&name, tagged.value, path)
        }
    }
}

fn parse_intrinsic(name: &str, arg: Value, path: &str) -> Result<PropertyValue> {
    let fn_path = format!("{path}.{name}");
    match name {
        "Ref" => match arg {
            Value::String(target) => Ok(PropertyValue::Ref(target)),
            other => Err(at(
                &fn_path,
                format!("Ref expects a logical name, got {other:?}"),
            )),
        },
        "Fn::GetAtt" => parse_get_att(arg, &fn_path),
        "Fn::Sub" => parse_sub(arg, &fn_path),
        _ => Ok(PropertyValue::Function {
            name: name.to_owned(),
            args: Box::new(parse_value(arg, &fn_path)?),
        }),
    }
}

fn parse_get_att(arg: Value, path: &str) -> Result<PropertyValue> {
    let (target, attribute) = match arg {
        Value::String(s) => match s.split_once('.') {
            Some((target, attribute)) => (target.to_owned(), attribute.to_owned()),
            None => {
                return Err(at(
                    path,
                    format!("GetAtt expects \"Resource.Attribute\", got \"{s}\""),
                ));
            }
        },
        Value::Sequence(items) => match <[Value; 2]>::try_from(items) {
            Ok([Value::String(target), Value::String(attribute)]) => (target, attribute),
            _ => {
                return Err(at(
                    path,
                    "GetAtt expects a list of two names: [Resource, Attribute]",
                ));
            }
        },
        other => {
            return Err(at(
                path,
                format!("GetAtt expects a string or a list, got {other:?}"),
            ));
        }
    };
    if target.is_empty() || attribute.is_empty() {
        return Err(at(path, "GetAtt resource and attribute must not be empty"));
    }
    Ok(PropertyValue::GetAtt { target, attribute })
}

fn parse_sub(arg: Value, path: &str) -> Result<PropertyValue> {
    let (template, variables) = match arg {
        Value::String(template) => (template, Vec::new()),
        Value::Sequence(items) => match <[Value; 2]>::try_from(items) {
            Ok([Value::String(template), Value::Mapping(vars)]) => {
                (template, parse_entries(vars, &format!("{path}[1]"))?)
            }
            _ => {
                return Err(at(
                    path,
                    "Sub expects a template string or [template, variables]",
                ));
            }
        },
        other => {
            return Err(at(
                path,
                format!("Sub expects a template string, got {other:?}"),
            ));
        }
    };

    template::check(&template).map_err(|e| match e {
        StackplanError::Parse { message, .. } => at(path, message),
        other => other,
    })?;

    Ok(PropertyValue::Sub {
        template,
        variables,
    })
}

fn parse_output(name: String, value: Value) -> Result<OutputDecl> {
    let path = format!("Outputs.{name}");
    let expr = match value {
        Value::Mapping(mut map) if intrinsic_name(&map).is_none() => map
            .remove("Value")
            .ok_or_else(|| at(&path, "output must declare a Value"))?,
        other => other,
    };
    let value = parse_value(expr, &format!("{path}.Value"))?;
    Ok(OutputDecl { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_manifest() {
        let input = "Resources:\n  Bucket:\n    Type: AWS::S3::Bucket\n";
        let manifest = parse_manifest(input).expect("should parse");
        assert_eq!(manifest.resources.len(), 1);
        assert_eq!(manifest.resources[0].name, "Bucket");
        assert_eq!(manifest.resources[0].resource_type, "AWS::S3::Bucket");
        assert!(manifest.outputs.is_empty());
    }

    #[test]
    fn parse_preserves_declaration_order() {
        let input = r"
Resources:
  Zeta:
    Type: T::Z
  Alpha:
    Type: T::A
  Mid:
    Type: T::M
";
        let manifest = parse_manifest(input).expect("should parse");
        let names: Vec<&str> = manifest.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn parse_short_and_long_intrinsics() {
        let input = r"
Resources:
  Subnet:
    Type: AWS::EC2::Subnet
    Properties:
      VpcId: !Ref Vpc
      CidrBlock: { 'Fn::GetAtt': [Vpc, CidrBlock] }
      AvailabilityZone: !Select [0, !GetAZs '']
  Vpc:
    Type: AWS::EC2::VPC
    Properties:
      Owner: { Ref: 'AWS::AccountId' }
      Peer: !GetAtt Other.Endpoint.Address
";
        let manifest = parse_manifest(input).expect("should parse");
        let subnet = manifest.resource("Subnet").expect("subnet");
        assert_eq!(subnet.properties[0].1, PropertyValue::Ref("Vpc".into()));
        assert_eq!(
            subnet.properties[1].1,
            PropertyValue::GetAtt {
                target: "Vpc".into(),
                attribute: "CidrBlock".into(),
            }
        );
        assert!(matches!(
            &subnet.properties[2].1,
            PropertyValue::Function { name, .. } if name == "Fn::Select"
        ));

        let vpc = manifest.resource("Vpc").expect("vpc");
        assert_eq!(vpc.properties[0].1, PropertyValue::Ref("AWS::AccountId".into()));
        assert_eq!(
            vpc.properties[1].1,
            PropertyValue::GetAtt {
                target: "Other".into(),
                attribute: "Endpoint.Address".into(),
            }
        );
    }

    #[test]
    fn parse_depends_on_single_and_list() {
        let input = r"
Resources:
  A:
    Type: T::A
    DependsOn: B
  B:
    Type: T::B
    DependsOn: [C, D]
  C:
    Type: T::C
  D:
    Type: T::D
";
        let manifest = parse_manifest(input).expect("should parse");
        assert_eq!(manifest.resources[0].depends_on, vec!["B"]);
        assert_eq!(manifest.resources[1].depends_on, vec!["C", "D"]);
        assert!(manifest.resources[2].depends_on.is_empty());
    }

    #[test]
    fn parse_sub_with_variables() {
        let input = r"
Resources:
  Role:
    Type: AWS::IAM::Role
    Properties:
      Name: !Sub
        - '${Prefix}-${Bucket}'
        - Prefix: !Ref Env
";
        let manifest = parse_manifest(input).expect("should parse");
        let PropertyValue::Sub {
            template,
            variables,
        } = &manifest.resources[0].properties[0].1
        else {
            panic!("expected Sub");
        };
        assert_eq!(template, "${Prefix}-${Bucket}");
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].0, "Prefix");
        assert_eq!(variables[0].1, PropertyValue::Ref("Env".into()));
    }

    #[test]
    fn parse_metadata_is_kept_opaque() {
        let input = r"
Resources:
  Host:
    Type: AWS::EC2::Instance
    Metadata:
      Notes: !Ref Nowhere
";
        let manifest = parse_manifest(input).expect("should parse");
        assert!(manifest.resources[0].metadata.is_some());
        assert!(manifest.resources[0].properties.is_empty());
    }

    #[test]
    fn parse_outputs_and_parameters() {
        let input = r"
Parameters:
  Env:
    Type: String
Resources:
  Bucket:
    Type: AWS::S3::Bucket
Outputs:
  BucketName:
    Description: the bucket
    Value: !Ref Bucket
  BucketArn: !GetAtt Bucket.Arn
";
        let manifest = parse_manifest(input).expect("should parse");
        assert_eq!(manifest.parameters, vec!["Env"]);
        assert!(manifest.has_parameter("Env"));
        assert_eq!(manifest.outputs.len(), 2);
        assert_eq!(manifest.outputs[0].value, PropertyValue::Ref("Bucket".into()));
        assert!(matches!(
            manifest.outputs[1].value,
            PropertyValue::GetAtt { .. }
        ));
    }

    #[test]
    fn parse_missing_type_is_empty() {
        let input = "Resources:\n  Thing:\n    Properties:\n      A: 1\n";
        let manifest = parse_manifest(input).expect("should parse");
        assert!(manifest.resources[0].resource_type.is_empty());
        assert_eq!(
            manifest.resources[0].properties[0].1,
            PropertyValue::Number("1".into())
        );
    }

    #[test]
    fn parse_error_duplicate_resource_name() {
        let input = r"
Resources:
  Vpc:
    Type: AWS::EC2::VPC
  Vpc:
    Type: AWS::EC2::VPC
";
        let err = parse_manifest(input).unwrap_err();
        assert!(
            matches!(&err, StackplanError::DuplicateResourceName { name } if name == "Vpc"),
            "got: {err}"
        );
    }

    #[test]
    fn parse_error_missing_resources_section() {
        let err = parse_manifest("Outputs: {}\n").unwrap_err();
        assert!(matches!(err, StackplanError::Parse { .. }), "got: {err}");
    }

    #[test]
    fn parse_error_reports_line_for_bad_yaml() {
        let input = "Resources:\n  Vpc:\n    Type: [unclosed\n";
        let err = parse_manifest(input).unwrap_err();
        let StackplanError::Parse { location, .. } = err else {
            panic!("expected parse error, got {err}");
        };
        assert!(location.is_some());
    }

    #[test]
    fn parse_error_unknown_attribute_names_path() {
        let input = "Resources:\n  Vpc:\n    Type: AWS::EC2::VPC\n    Bogus: 1\n";
        let err = parse_manifest(input).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Resources.Vpc"), "got: {msg}");
        assert!(msg.contains("Bogus"), "got: {msg}");
    }

    #[test]
    fn parse_error_malformed_get_att() {
        let input = "Resources:\n  A:\n    Type: T\n    Properties:\n      X: !GetAtt NoDot\n";
        let err = parse_manifest(input).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Resources.A.Properties.X.Fn::GetAtt"), "got: {msg}");
    }

    #[test]
    fn parse_error_malformed_sub_template() {
        let input = "Resources:\n  A:\n    Type: T\n    Properties:\n      X: !Sub 'arn:${Oops'\n";
        let err = parse_manifest(input).unwrap_err();
        assert!(err.to_string().contains("Fn::Sub"), "got: {err}");
    }

    #[test]
    fn parse_error_resource_not_mapping() {
        let err = parse_manifest("Resources:\n  A: just-a-string\n").unwrap_err();
        assert!(err.to_string().contains("must be a mapping"), "got: {err}");
    }

    #[test]
    fn parse_error_output_without_value() {
        let input = "Resources:\n  A:\n    Type: T\nOutputs:\n  Out:\n    Description: x\n";
        let err = parse_manifest(input).unwrap_err();
        assert!(err.to_string().contains("Outputs.Out"), "got: {err}");
    }
}
