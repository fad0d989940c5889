//! Batched evaluation of computed fields.

use crate::{
    expr::{EvalError, THIS},
    query::{merge, merge_requirements, Field, Link, Node, Options, QueryMergeError, Selection},
    schema::{CompiledSchema, ComputedField},
    value::{Object, Value},
};
use derive_more::{Display, From};
use log::debug;
use rayon::prelude::*;

/// The graph-resolution collaborator performing the actual fetches.
pub trait Engine {
    /// Resolves `query` for every object of `node` identified by `ids`,
    /// returning one value per id, in order.
    fn fetch_node(&self, node: &str, ids: &[Value], query: &Node) -> Result<Vec<Value>, String>;

    /// Resolves `query` against the graph root.
    fn fetch_root(&self, query: &Node) -> Result<Value, String>;
}

#[derive(Debug, Display, From, Clone, PartialEq)]
pub enum ResolveError {
    #[from(ignore)]
    #[display(fmt = "Unknown computed field \"{}.{}\"", _0, _1)]
    UnknownField(String, String),
    #[from(ignore)]
    #[display(fmt = "Computed fields of \"{}\" and \"{}\" resolved in one batch", _0, _1)]
    MixedOwners(String, String),
    #[from(ignore)]
    #[display(fmt = "Required option \"{}\" for \"{}\" was not provided", _1, _0)]
    MissingOption(String, String),
    #[from(ignore)]
    #[display(fmt = "Engine failed: {}", _0)]
    Engine(String),
    #[display(fmt = "{}", _0)]
    Merge(QueryMergeError),
    #[display(fmt = "{}", _0)]
    Eval(EvalError),
}

impl std::error::Error for ResolveError {}

/// One selection of a computed field with the options it was selected with.
#[derive(Debug, Clone, Copy)]
pub struct ComputedFieldRequest<'a> {
    field: &'a ComputedField,
    options: Option<&'a Options>,
}

impl<'a> ComputedFieldRequest<'a> {
    pub fn new(field: &'a ComputedField, options: Option<&'a Options>) -> Self {
        Self { field, options }
    }

    /// Option values in declaration order, defaults filled in.
    fn option_values(&self) -> Result<Vec<Value>, ResolveError> {
        self.field
            .options()
            .iter()
            .map(|option| {
                match self
                    .options
                    .and_then(|options| options.get(option.name()))
                    .or_else(|| option.default())
                {
                    Some(value) => Ok(value.clone()),
                    None => Err(ResolveError::MissingOption(
                        format!("{}.{}", self.field.node(), self.field.name()),
                        option.name().to_string(),
                    )),
                }
            })
            .collect()
    }
}

pub struct Executor<'a, E: Engine + ?Sized> {
    schema: &'a CompiledSchema,
    engine: &'a E,
    parallel: bool,
}

impl<'a, E: Engine + ?Sized> Executor<'a, E> {
    pub fn new(schema: &'a CompiledSchema, engine: &'a E) -> Self {
        Self {
            schema,
            engine,
            parallel: true,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Evaluates every requested computed field for every object in `ids`.
    ///
    /// The requirements of all requests are merged first: the engine is
    /// called at most once for the owner objects and at most once for the
    /// graph root, however many requests share them.
    pub fn resolve(
        &self,
        ids: &[Value],
        requests: &[ComputedFieldRequest],
    ) -> Result<Vec<Vec<Value>>, ResolveError> {
        let owner = match requests.first() {
            Some(request) => request.field.node(),
            None => return Ok(vec![vec![]; ids.len()]),
        };
        if let Some(other) = requests.iter().find(|r| r.field.node() != owner) {
            return Err(ResolveError::MixedOwners(
                owner.to_string(),
                other.field.node().to_string(),
            ));
        }
        let options = requests
            .iter()
            .map(ComputedFieldRequest::option_values)
            .collect::<Result<Vec<_>, _>>()?;

        let mut reqs = vec![Node::new(vec![Link::new(THIS, Node::default())])];
        reqs.extend(requests.iter().map(|r| r.field.requirements().clone()));
        let reqs = merge_requirements(&reqs);
        let (this_query, other_query) = split_this(reqs);

        let objects = if this_query.is_empty() {
            vec![Value::Object(Object::new()); ids.len()]
        } else {
            debug!("fetching {} {} object(s): {}", ids.len(), owner, this_query);
            let objects = self
                .engine
                .fetch_node(owner, ids, &this_query)
                .map_err(ResolveError::Engine)?;
            if objects.len() != ids.len() {
                return Err(ResolveError::Engine(format!(
                    "expected {} result(s), got {}",
                    ids.len(),
                    objects.len()
                )));
            }
            objects
        };
        let ctx = if other_query.is_empty() {
            Value::Object(Object::new())
        } else {
            debug!("fetching root: {}", other_query);
            self.engine
                .fetch_root(&other_query)
                .map_err(ResolveError::Engine)?
        };

        let env = self.schema.environment();
        let evaluate = |this: &Value| -> Result<Vec<Value>, ResolveError> {
            requests
                .iter()
                .zip(&options)
                .map(|(request, options)| {
                    request
                        .field
                        .unit()
                        .call(env, this, &ctx, options)
                        .map_err(ResolveError::Eval)
                })
                .collect()
        };
        if self.parallel {
            objects.par_iter().map(evaluate).collect()
        } else {
            objects.iter().map(evaluate).collect()
        }
    }

    /// Resolves computed fields selected on `node` by name, keyed in the
    /// result by each selection's alias or name.
    pub fn resolve_fields(
        &self,
        node: &str,
        ids: &[Value],
        fields: &[Field],
    ) -> Result<Vec<Object>, ResolveError> {
        let merged = merge(&[Node::new(fields.iter().cloned())])?;
        let mut keys = Vec::with_capacity(merged.selections().len());
        let mut requests = Vec::with_capacity(merged.selections().len());
        for selection in merged.selections() {
            let computed = self
                .schema
                .computed(node, selection.name())
                .ok_or_else(|| {
                    ResolveError::UnknownField(node.to_string(), selection.name().to_string())
                })?;
            keys.push(selection.result_key());
            requests.push(ComputedFieldRequest::new(computed, selection.options()));
        }
        Ok(self
            .resolve(ids, &requests)?
            .into_iter()
            .map(|values| {
                keys.iter()
                    .map(|key| key.to_string())
                    .zip(values)
                    .collect()
            })
            .collect())
    }
}

/// Splits merged requirements into the `this` branch and everything else.
fn split_this(reqs: Node) -> (Node, Node) {
    let mut this_query = Node::default();
    let mut others = vec![];
    for selection in reqs.selections {
        match selection {
            Selection::Link(link) if link.name() == THIS => this_query = link.node,
            selection => others.push(selection),
        }
    }
    (this_query, Node::new(others))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::{tests::media_graph, GraphOption},
        schema::{ComputedDef, SchemaBuilder},
        types::Type,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Engine for Recorder {
        fn fetch_node(
            &self,
            node: &str,
            ids: &[Value],
            query: &Node,
        ) -> Result<Vec<Value>, String> {
            self.calls
                .lock()
                .map_err(|e| e.to_string())?
                .push(format!("{} {}", node, query));
            Ok(ids
                .iter()
                .map(|id| {
                    Value::object(vec![
                        ("id", id.clone()),
                        ("name", Value::from("ann")),
                    ])
                })
                .collect())
        }

        fn fetch_root(&self, query: &Node) -> Result<Value, String> {
            self.calls
                .lock()
                .map_err(|e| e.to_string())?
                .push(format!("root {}", query));
            Ok(Value::object(vec![(
                "user",
                Value::object(vec![("id", Value::from("root"))]),
            )]))
        }
    }

    fn schema() -> CompiledSchema {
        SchemaBuilder::new(media_graph())
            .computed(
                ComputedDef::new("User", "label", "(if flag (get this :name) (get this :id))")
                    .with_options(vec![GraphOption::new("flag", Type::Boolean)]),
            )
            .computed(ComputedDef::new("User", "me", "(get user :id)"))
            .computed(ComputedDef::new("User", "constant", "42"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_split_this() {
        let reqs = Node::new(vec![
            Selection::from(Link::new(THIS, Node::new(vec![Field::new("a")]))),
            Selection::from(Field::new("b")),
        ]);
        assert_eq!(
            split_this(reqs),
            (
                Node::new(vec![Field::new("a")]),
                Node::new(vec![Field::new("b")])
            )
        );
    }

    #[test]
    fn test_missing_option() {
        let schema = schema();
        let engine = Recorder::default();
        let label = schema.computed("User", "label").unwrap();
        assert_eq!(
            Executor::new(&schema, &engine).resolve(
                &[Value::from(1)],
                &[ComputedFieldRequest::new(label, None)]
            ),
            Err(ResolveError::MissingOption(
                "User.label".to_string(),
                "flag".to_string()
            ))
        );
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_fetch_for_constants() {
        let schema = schema();
        let engine = Recorder::default();
        let result = Executor::new(&schema, &engine)
            .parallel(false)
            .resolve_fields("User", &[Value::from(1), Value::from(2)], &[Field::new("constant")])
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].get("constant"), Some(&Value::from(42)));
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_root_branch() {
        let schema = schema();
        let engine = Recorder::default();
        let result = Executor::new(&schema, &engine)
            .resolve_fields("User", &[Value::from(1)], &[Field::new("me")])
            .unwrap();
        assert_eq!(result[0].get("me"), Some(&Value::from("root")));
        assert_eq!(
            engine.calls.lock().unwrap().as_slice(),
            &["root [{:user [:id]}]".to_string()]
        );
    }

    #[test]
    fn test_unknown_and_mixed() {
        let schema = schema();
        let engine = Recorder::default();
        let executor = Executor::new(&schema, &engine);
        assert_eq!(
            executor.resolve_fields("User", &[], &[Field::new("nope")]),
            Err(ResolveError::UnknownField("User".to_string(), "nope".to_string()))
        );
        assert_eq!(
            executor.resolve_fields(
                "User",
                &[],
                &[Field::new("me"), Field::new("constant").with_alias("me")]
            ),
            Err(ResolveError::Merge(QueryMergeError::DistinctSelections(
                "me".to_string()
            )))
        );
    }
}
