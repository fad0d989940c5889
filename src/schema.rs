//! Computed fields, checked and compiled once against the graph.

use crate::{
    error::{Error, Result},
    expr::{compile, extract, parse, Checker, CompiledUnit, Environment, Expr, Function, THIS},
    graph::{Graph, GraphOption},
    query::Node,
    types::Type,
};
use indexmap::IndexMap;
use log::{debug, info};

pub enum Source {
    Text(String),
    Expr(Expr),
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Source::Text(text.to_string())
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Source::Text(text)
    }
}

impl From<Expr> for Source {
    fn from(expr: Expr) -> Self {
        Source::Expr(expr)
    }
}

/// Declaration of a computed field of a graph node.
pub struct ComputedDef {
    node: String,
    name: String,
    source: Source,
    options: Vec<GraphOption>,
}

impl ComputedDef {
    pub fn new(
        node: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<Source>,
    ) -> Self {
        Self {
            node: node.into(),
            name: name.into(),
            source: source.into(),
            options: vec![],
        }
    }

    pub fn with_options(mut self, options: Vec<GraphOption>) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ComputedField {
    node: String,
    name: String,
    options: Vec<GraphOption>,
    expr: Expr,
    requirements: Node,
    unit: CompiledUnit,
}

impl ComputedField {
    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &[GraphOption] {
        &self.options
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// What must be fetched before evaluation, rooted at `this` and the
    /// fields of the graph root.
    pub fn requirements(&self) -> &Node {
        &self.requirements
    }

    pub fn unit(&self) -> &CompiledUnit {
        &self.unit
    }
}

/// Read-only after [`SchemaBuilder::build`]; shared by every request.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    graph: Graph,
    env: Environment,
    fields: IndexMap<(String, String), ComputedField>,
}

impl CompiledSchema {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn computed(&self, node: &str, name: &str) -> Option<&ComputedField> {
        self.fields.get(&(node.to_string(), name.to_string()))
    }

    pub fn computed_fields(&self) -> impl Iterator<Item = &ComputedField> {
        self.fields.values()
    }
}

pub struct SchemaBuilder {
    graph: Graph,
    env: Environment,
    defs: Vec<ComputedDef>,
}

impl SchemaBuilder {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            env: Environment::new(),
            defs: vec![],
        }
    }

    pub fn function(mut self, name: impl Into<String>, function: Function) -> Self {
        self.env.insert(name, function);
        self
    }

    pub fn computed(mut self, def: ComputedDef) -> Self {
        self.defs.push(def);
        self
    }

    /// Checks and compiles every computed field, failing on the first error.
    pub fn build(self) -> Result<CompiledSchema> {
        let types = self.graph.types();
        let mut fields = IndexMap::with_capacity(self.defs.len());
        for def in self.defs {
            let node = self
                .graph
                .node(&def.node)
                .ok_or_else(|| Error::UnknownNode(def.node.clone()))?;
            let key = (def.node.clone(), def.name.clone());
            if node.field(&def.name).is_some() || fields.contains_key(&key) {
                return Err(Error::DuplicateField(format!("{}.{}", def.node, def.name)));
            }
            for (i, option) in def.options.iter().enumerate() {
                if option.name() == THIS
                    || def.options[..i].iter().any(|o| o.name() == option.name())
                {
                    return Err(Error::InvalidOption(
                        format!("{}.{}", def.node, def.name),
                        option.name().to_string(),
                    ));
                }
            }
            let expr = match def.source {
                Source::Text(text) => parse(&text)?,
                Source::Expr(expr) => expr,
            };
            let mut checker = Checker::new(&types, &self.env);
            for field in self.graph.root().fields().values() {
                checker = checker.bind(field.name(), field.typ().clone());
            }
            for option in &def.options {
                checker = checker.bind(option.name(), option.typ().clone());
            }
            let checked = checker
                .bind(THIS, Type::type_ref(def.node.as_str()))
                .check(&expr)?;
            let option_names: Vec<&str> = def.options.iter().map(GraphOption::name).collect();
            let requirements = extract(&checked, &types);
            let requirements = Node::new(
                requirements
                    .selections()
                    .iter()
                    .filter(|selection| !option_names.contains(&selection.name()))
                    .cloned(),
            );
            let unit = compile(&checked, &option_names)?;
            debug!(
                "computed field {}.{} = {} requires {}",
                def.node, def.name, expr, requirements
            );
            fields.insert(
                key,
                ComputedField {
                    node: def.node,
                    name: def.name,
                    options: def.options,
                    expr,
                    requirements,
                    unit,
                },
            );
        }
        info!("built schema with {} computed field(s)", fields.len());
        Ok(CompiledSchema {
            graph: self.graph,
            env: self.env,
            fields,
        })
    }
}
