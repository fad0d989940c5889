use crate::value::Value;
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt;

pub type Options = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    name: String,
    arguments: Options,
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Options::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Options {
        &self.arguments
    }
}

/// Leaf selection.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    pub(crate) options: Option<Options>,
    pub(crate) directives: Vec<Directive>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            options: None,
            directives: vec![],
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn options(&self) -> Option<&Options> {
        self.options.as_ref()
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// The key of this field in the result: its alias, or its name.
    pub fn result_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Non-leaf selection.
#[derive(Debug, Clone)]
pub struct Link {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    pub(crate) options: Option<Options>,
    pub(crate) directives: Vec<Directive>,
    pub(crate) node: Node,
}

impl Link {
    pub fn new(name: impl Into<String>, node: Node) -> Self {
        Self {
            name: name.into(),
            alias: None,
            options: None,
            directives: vec![],
            node,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn options(&self) -> Option<&Options> {
        self.options.as_ref()
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn result_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    Link(Link),
}

impl Selection {
    pub fn name(&self) -> &str {
        match self {
            Selection::Field(field) => field.name(),
            Selection::Link(link) => link.name(),
        }
    }

    pub fn result_key(&self) -> &str {
        match self {
            Selection::Field(field) => field.result_key(),
            Selection::Link(link) => link.result_key(),
        }
    }

    pub fn options(&self) -> Option<&Options> {
        match self {
            Selection::Field(field) => field.options(),
            Selection::Link(link) => link.options(),
        }
    }
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Selection::Field(field)
    }
}

impl From<Link> for Selection {
    fn from(link: Link) -> Self {
        Selection::Link(link)
    }
}

/// A set of selections made against one object or object set.
///
/// Equality ignores the order of selections and fragments.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub(crate) selections: Vec<Selection>,
    pub(crate) fragments: Vec<Fragment>,
    pub(crate) ordered: bool,
}

impl Node {
    pub fn new<I, S>(selections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Selection>,
    {
        Self {
            selections: selections.into_iter().map(Into::into).collect(),
            fragments: vec![],
            ordered: false,
        }
    }

    pub fn with_fragments(mut self, fragments: Vec<Fragment>) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty() && self.fragments.is_empty()
    }

    pub fn get(&self, result_key: &str) -> Option<&Selection> {
        self.selections
            .iter()
            .find(|selection| selection.result_key() == result_key)
    }

    pub fn field(&self, result_key: &str) -> Option<&Field> {
        match self.get(result_key) {
            Some(Selection::Field(field)) => Some(field),
            _ => None,
        }
    }

    pub fn link(&self, result_key: &str) -> Option<&Link> {
        match self.get(result_key) {
            Some(Selection::Link(link)) => Some(link),
            _ => None,
        }
    }

    pub fn fragment(&self, type_name: &str) -> Option<&Fragment> {
        self.fragments
            .iter()
            .find(|fragment| fragment.type_name() == Some(type_name))
    }
}

fn same_items<T: PartialEq>(xs: &[T], ys: &[T]) -> bool {
    xs.len() == ys.len()
        && xs.iter().all(|x| {
            xs.iter().filter(|&y| y == x).count() == ys.iter().filter(|&y| y == x).count()
        })
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.alias == other.alias
            && self.options == other.options
            && same_items(&self.directives, &other.directives)
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.alias == other.alias
            && self.options == other.options
            && same_items(&self.directives, &other.directives)
            && self.node == other.node
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ordered == other.ordered
            && same_items(&self.selections, &other.selections)
            && same_items(&self.fragments, &other.fragments)
    }
}

/// Selections applying only when the object's concrete type matches
/// `type_name`; `None` applies unconditionally.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub(crate) type_name: Option<String>,
    pub(crate) node: Node,
}

impl Fragment {
    pub fn new(type_name: Option<&str>, node: Node) -> Self {
        Self {
            type_name: type_name.map(String::from),
            node,
        }
    }

    pub fn on(type_name: &str, node: Node) -> Self {
        Self::new(Some(type_name), node)
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

fn fmt_options(options: &Options) -> String {
    options
        .iter()
        .map(|(name, value)| format!(":{} {}", name, value))
        .join(" ")
}

fn fmt_head(name: &str, alias: Option<&str>, options: Option<&Options>) -> String {
    match (alias, options) {
        (None, None) => format!(":{}", name),
        (None, Some(options)) => format!("(:{} {{{}}})", name, fmt_options(options)),
        (Some(alias), None) => format!("(:{} :as :{})", name, alias),
        (Some(alias), Some(options)) => {
            format!("(:{} {{{}}} :as :{})", name, fmt_options(options), alias)
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Field(field) => {
                write!(f, "{}", fmt_head(&field.name, field.alias(), field.options()))
            }
            Selection::Link(link) => write!(
                f,
                "{{{} {}}}",
                fmt_head(&link.name, link.alias(), link.options()),
                link.node
            ),
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_name {
            Some(type_name) => write!(f, "(:on :{} {})", type_name, self.node),
            None => write!(f, "(:on nil {})", self.node),
        }
    }
}

/// Renders the node as an edn vector, e.g. `[:a {:b [:c]}]`.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]",
            self.selections
                .iter()
                .map(ToString::to_string)
                .chain(self.fragments.iter().map(ToString::to_string))
                .join(" ")
        )
    }
}
