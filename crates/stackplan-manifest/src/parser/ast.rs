//! Abstract syntax tree for parsed manifests.

/// Root node of a parsed manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// Declared parameter names, in declaration order.
    pub parameters: Vec<String>,
    /// Resource declarations, in declaration order.
    pub resources: Vec<Resource>,
    /// Output declarations, in declaration order.
    pub outputs: Vec<OutputDecl>,
}

impl Manifest {
    /// Looks up a resource by logical name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Returns whether a resource with this logical name is declared.
    #[must_use]
    pub fn has_resource(&self, name: &str) -> bool {
        self.resource(name).is_some()
    }

    /// Returns whether a parameter with this name is declared.
    #[must_use]
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p == name)
    }
}

/// A single entry of the `Resources` mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    /// Logical name.
    pub name: String,
    /// Type tag such as `AWS::EC2::Instance`. Empty when absent.
    pub resource_type: String,
    /// `Properties` entries, in declaration order.
    pub properties: Vec<(String, PropertyValue)>,
    /// Explicit `DependsOn` entries, in declaration order.
    pub depends_on: Vec<String>,
    /// Opaque `Metadata`, never inspected for references.
    pub metadata: Option<serde_yaml::Value>,
}

/// A property value, literal or intrinsic.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `null` or `~`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Numeric literal, kept in its textual form.
    Number(String),
    /// String literal.
    String(String),
    /// Sequence.
    List(Vec<PropertyValue>),
    /// Mapping with entries in declaration order.
    Map(Vec<(String, PropertyValue)>),
    /// `Ref` to a resource identity, parameter, or pseudo parameter.
    Ref(String),
    /// `Fn::GetAtt` on a resource attribute.
    GetAtt {
        /// Resource logical name.
        target: String,
        /// Attribute name, possibly dotted (`Endpoint.Address`).
        attribute: String,
    },
    /// `Fn::Sub` string interpolation.
    Sub {
        /// Template text containing `${...}` placeholders.
        template: String,
        /// Local variables declared next to the template.
        variables: Vec<(String, PropertyValue)>,
    },
    /// Any other intrinsic function, arguments kept for traversal.
    Function {
        /// Full function name, e.g. `Fn::Join`.
        name: String,
        /// Function arguments.
        args: Box<PropertyValue>,
    },
}

/// An entry of the `Outputs` mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    /// Output name.
    pub name: String,
    /// Value expression.
    pub value: PropertyValue,
}
