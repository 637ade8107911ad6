//! Reference resolution.
//!
//! Walks every property of every resource looking for `Ref`, `GetAtt`, and
//! `Sub` placeholders and turns the ones that name resources into typed
//! [`Reference`] edges. `Metadata` is never inspected.

use std::collections::HashSet;

use serde::Serialize;
use stackplan_common::config::PlannerConfig;
use stackplan_common::error::{Result, StackplanError};
use stackplan_common::types::{ReferenceKind, UnresolvedReference};

use crate::parser::ast::{Manifest, PropertyValue, Resource};
use crate::parser::template;

/// A resolved edge from one resource to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Resource holding the reference.
    pub source: String,
    /// Resource being referenced.
    pub target: String,
    /// Identity or attribute dependency.
    pub kind: ReferenceKind,
    /// Attribute name for [`ReferenceKind::Attribute`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Property path inside the source resource.
    pub path: String,
}

/// A reference marker found in a value, before its target is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMarker {
    /// Name the marker points at.
    pub target: String,
    /// Attribute, for `GetAtt` and dotted `Sub` placeholders.
    pub attribute: Option<String>,
    /// Path of the marker.
    pub path: String,
}

/// What a marker's name designates within a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    /// A declared resource.
    Resource,
    /// A declared parameter or a provider pseudo parameter.
    NotAResource,
    /// Nothing declared under that name.
    Unknown,
}

/// Classifies the target of a marker.
///
/// Attribute lookups only ever reach resources.
#[must_use]
pub fn classify(marker: &ReferenceMarker, manifest: &Manifest, config: &PlannerConfig) -> TargetClass {
    if manifest.has_resource(&marker.target) {
        TargetClass::Resource
    } else if marker.attribute.is_none()
        && (manifest.has_parameter(&marker.target) || config.is_pseudo_parameter(&marker.target))
    {
        TargetClass::NotAResource
    } else {
        TargetClass::Unknown
    }
}

/// Collects every reference marker in `value`, which sits at `path`.
///
/// # Errors
///
/// Returns an error if a `Sub` template is malformed.
pub fn reference_markers(value: &PropertyValue, path: &str) -> Result<Vec<ReferenceMarker>> {
    let mut out = Vec::new();
    walk(value, path, &mut out)?;
    Ok(out)
}

fn walk(value: &PropertyValue, path: &str, out: &mut Vec<ReferenceMarker>) -> Result<()> {
    match value {
        PropertyValue::Null
        | PropertyValue::Bool(_)
        | PropertyValue::Number(_)
        | PropertyValue::String(_) => {}
        PropertyValue::List(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &format!("{path}[{i}]"), out)?;
            }
        }
        PropertyValue::Map(entries) => {
            for (key, item) in entries {
                walk(item, &format!("{path}.{key}"), out)?;
            }
        }
        PropertyValue::Ref(target) => out.push(ReferenceMarker {
            target: target.clone(),
            attribute: None,
            path: path.to_owned(),
        }),
        PropertyValue::GetAtt { target, attribute } => out.push(ReferenceMarker {
            target: target.clone(),
            attribute: Some(attribute.clone()),
            path: path.to_owned(),
        }),
        PropertyValue::Sub {
            template,
            variables,
        } => {
            let locals: HashSet<&str> = variables.iter().map(|(name, _)| name.as_str()).collect();
            for (name, attribute) in template::placeholders(template)? {
                if locals.contains(name.as_str()) {
                    continue;
                }
                out.push(ReferenceMarker {
                    target: name,
                    attribute,
                    path: path.to_owned(),
                });
            }
            for (name, item) in variables {
                walk(item, &format!("{path}.Fn::Sub[1].{name}"), out)?;
            }
        }
        PropertyValue::Function { name, args } => walk(args, &format!("{path}.{name}"), out)?,
    }
    Ok(())
}

fn depends_on_path(resource: &Resource, index: usize) -> String {
    if resource.depends_on.len() == 1 {
        "DependsOn".to_owned()
    } else {
        format!("DependsOn[{index}]")
    }
}

/// Resolves every reference in the manifest's resources.
///
/// Scans the whole manifest before failing, so every unresolved occurrence
/// is reported at once. Explicit `DependsOn` entries are checked here as
/// well but produce no [`Reference`]; the graph reads them directly.
///
/// # Errors
///
/// Returns [`StackplanError::UnknownReferenceTarget`] listing each reference
/// or explicit dependency whose target is not a declared resource.
pub fn resolve_references(manifest: &Manifest, config: &PlannerConfig) -> Result<Vec<Reference>> {
    tracing::info!(
        resources = manifest.resources.len(),
        "resolving references"
    );
    let mut references = Vec::new();
    let mut unresolved = Vec::new();

    for resource in &manifest.resources {
        for (key, value) in &resource.properties {
            for marker in reference_markers(value, &format!("Properties.{key}"))? {
                match classify(&marker, manifest, config) {
                    TargetClass::Resource => {
                        tracing::debug!(
                            source = %resource.name,
                            target = %marker.target,
                            path = %marker.path,
                            "resolved reference"
                        );
                        let kind = if marker.attribute.is_some() {
                            ReferenceKind::Attribute
                        } else {
                            ReferenceKind::Identity
                        };
                        references.push(Reference {
                            source: resource.name.clone(),
                            target: marker.target,
                            kind,
                            attribute: marker.attribute,
                            path: marker.path,
                        });
                    }
                    TargetClass::NotAResource => {}
                    TargetClass::Unknown => unresolved.push(UnresolvedReference {
                        resource: resource.name.clone(),
                        path: marker.path,
                        target: marker.target,
                    }),
                }
            }
        }

        for (i, dependency) in resource.depends_on.iter().enumerate() {
            if !manifest.has_resource(dependency) {
                unresolved.push(UnresolvedReference {
                    resource: resource.name.clone(),
                    path: depends_on_path(resource, i),
                    target: dependency.clone(),
                });
            }
        }
    }

    if unresolved.is_empty() {
        Ok(references)
    } else {
        Err(StackplanError::UnknownReferenceTarget { unresolved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_manifest;

    fn resolve(input: &str) -> Result<Vec<Reference>> {
        let manifest = parse_manifest(input).expect("should parse");
        resolve_references(&manifest, &PlannerConfig::default())
    }

    #[test]
    fn resolve_manifest_without_references() {
        let refs = resolve("Resources:\n  Bucket:\n    Type: AWS::S3::Bucket\n").expect("resolve");
        assert!(refs.is_empty());
    }

    #[test]
    fn resolve_identity_and_attribute_references() {
        let refs = resolve(
            r"
Resources:
  Vpc:
    Type: AWS::EC2::VPC
  Subnet:
    Type: AWS::EC2::Subnet
    Properties:
      VpcId: !Ref Vpc
      Ipv6CidrBlock: !GetAtt Vpc.Ipv6CidrBlocks
",
        )
        .expect("resolve");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].source, "Subnet");
        assert_eq!(refs[0].target, "Vpc");
        assert_eq!(refs[0].kind, ReferenceKind::Identity);
        assert_eq!(refs[0].path, "Properties.VpcId");
        assert_eq!(refs[1].kind, ReferenceKind::Attribute);
        assert_eq!(refs[1].attribute.as_deref(), Some("Ipv6CidrBlocks"));
    }

    #[test]
    fn resolve_nested_paths() {
        let refs = resolve(
            r"
Resources:
  Sg:
    Type: AWS::EC2::SecurityGroup
  Host:
    Type: AWS::EC2::Instance
    Properties:
      NetworkInterfaces:
        - DeviceIndex: 0
          GroupSet:
            - !Ref Sg
",
        )
        .expect("resolve");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].path, "Properties.NetworkInterfaces[0].GroupSet[0]");
    }

    #[test]
    fn resolve_skips_parameters_and_pseudo_parameters() {
        let refs = resolve(
            r"
Parameters:
  KeyName:
    Type: String
Resources:
  Host:
    Type: AWS::EC2::Instance
    Properties:
      KeyName: !Ref KeyName
      Region: !Ref AWS::Region
      Name: !Sub '${AWS::StackName}-${KeyName}'
",
        )
        .expect("resolve");
        assert!(refs.is_empty());
    }

    #[test]
    fn resolve_sub_placeholders_and_locals() {
        let refs = resolve(
            r"
Resources:
  Bucket:
    Type: AWS::S3::Bucket
  Db:
    Type: AWS::RDS::DBInstance
  Policy:
    Type: AWS::IAM::Policy
    Properties:
      Resource: !Sub
        - 'arn:aws:s3:::${Bucket}/${Suffix}/${Db.Endpoint.Address}'
        - Suffix: !Ref Db
",
        )
        .expect("resolve");
        let described: Vec<(&str, ReferenceKind, &str)> = refs
            .iter()
            .map(|r| (r.target.as_str(), r.kind, r.path.as_str()))
            .collect();
        assert_eq!(
            described,
            vec![
                ("Bucket", ReferenceKind::Identity, "Properties.Resource"),
                ("Db", ReferenceKind::Attribute, "Properties.Resource"),
                (
                    "Db",
                    ReferenceKind::Identity,
                    "Properties.Resource.Fn::Sub[1].Suffix"
                ),
            ]
        );
    }

    #[test]
    fn resolve_walks_other_intrinsics() {
        let refs = resolve(
            r"
Resources:
  Bucket:
    Type: AWS::S3::Bucket
  Role:
    Type: AWS::IAM::Role
    Properties:
      Arn: !Join ['', ['arn:aws:s3:::', !Ref Bucket]]
",
        )
        .expect("resolve");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].path, "Properties.Arn.Fn::Join[1][1]");
    }

    #[test]
    fn resolve_ignores_metadata() {
        let refs = resolve(
            r"
Resources:
  Host:
    Type: AWS::EC2::Instance
    Metadata:
      Init: !Ref Ghost
",
        )
        .expect("resolve");
        assert!(refs.is_empty());
    }

    #[test]
    fn resolve_reports_every_unknown_target() {
        let err = resolve(
            r"
Resources:
  Subnet:
    Type: AWS::EC2::Subnet
    Properties:
      VpcId: !Ref Vpcc
  Host:
    Type: AWS::EC2::Instance
    DependsOn: Gateway
    Properties:
      SubnetId: !GetAtt Subnett.SubnetId
",
        )
        .unwrap_err();
        let StackplanError::UnknownReferenceTarget { unresolved } = err else {
            panic!("expected UnknownReferenceTarget, got {err}");
        };
        let described: Vec<(&str, &str, &str)> = unresolved
            .iter()
            .map(|u| (u.resource.as_str(), u.path.as_str(), u.target.as_str()))
            .collect();
        assert_eq!(
            described,
            vec![
                ("Subnet", "Properties.VpcId", "Vpcc"),
                ("Host", "Properties.SubnetId", "Subnett"),
                ("Host", "DependsOn", "Gateway"),
            ]
        );
    }

    #[test]
    fn resolve_unknown_entry_in_depends_on_list_names_its_index() {
        let err = resolve(
            r"
Resources:
  A:
    Type: T::A
  Host:
    Type: AWS::EC2::Instance
    DependsOn: [A, Ghost]
",
        )
        .unwrap_err();
        let StackplanError::UnknownReferenceTarget { unresolved } = err else {
            panic!("expected UnknownReferenceTarget, got {err}");
        };
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].resource, "Host");
        assert_eq!(unresolved[0].path, "DependsOn[1]");
        assert_eq!(unresolved[0].target, "Ghost");
    }

    #[test]
    fn resolve_attribute_on_parameter_is_unknown() {
        let err = resolve(
            r"
Parameters:
  Env:
    Type: String
Resources:
  Host:
    Type: AWS::EC2::Instance
    Properties:
      X: !GetAtt Env.Value
",
        )
        .unwrap_err();
        assert!(matches!(err, StackplanError::UnknownReferenceTarget { .. }));
    }

    #[test]
    fn resolve_custom_pseudo_prefix() {
        let manifest = parse_manifest(
            "Resources:\n  A:\n    Type: T\n    Properties:\n      R: !Ref Cloud::Zone\n",
        )
        .expect("parse");
        let config = PlannerConfig {
            pseudo_parameter_prefix: "Cloud::".into(),
            ..PlannerConfig::default()
        };
        assert!(resolve_references(&manifest, &config).expect("resolve").is_empty());
        assert!(resolve_references(&manifest, &PlannerConfig::default()).is_err());
    }
}
