//! Selection walking for [`GraphSchema`].
//!
//! Fields of one selection set resolve concurrently. A failed field is
//! nulled and its error recorded with the field's response path; siblings
//! are unaffected. Errors are reported in selection order. Selections that
//! share a response key are merged before execution.

use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use tracing::trace;

use palisade_contracts::{
    coordinate::FieldCoordinate,
    execution::{ExecutionResult, FieldError, PathSegment, ResolveInfo},
    schema::FieldDescriptor,
    selection::{Document, FieldSelection, SelectionSet},
};
use palisade_core::{ExecutableSchema, FieldInvocation, RequestContext};

use crate::schema::GraphSchema;

type Completed = (Value, Vec<FieldError>);

/// Runs one request against a schema.
pub struct Executor<'a> {
    schema: &'a GraphSchema,
    context: RequestContext,
}

impl<'a> Executor<'a> {
    pub fn new(schema: &'a GraphSchema, context: RequestContext) -> Self {
        Self { schema, context }
    }

    pub async fn run(&self, document: &Document, root: Value) -> ExecutionResult {
        let query_type = self.schema.type_field_map().query_type();
        let selection_set = document.selection_set.merged();
        let (data, errors) = self
            .select(query_type, &selection_set, &root, Vec::new())
            .await;
        ExecutionResult {
            data: Some(data),
            errors,
            extensions: Map::new(),
        }
    }

    fn select<'b>(
        &'b self,
        type_name: &'b str,
        selections: &'b SelectionSet,
        parent: &'b Value,
        path: Vec<PathSegment>,
    ) -> BoxFuture<'b, Completed> {
        async move {
            let resolved = join_all(
                selections
                    .iter()
                    .map(|field| self.resolve_field(type_name, field, parent, path.clone())),
            )
            .await;

            let mut object = Map::new();
            let mut errors = Vec::new();
            for (field, (value, field_errors)) in selections.iter().zip(resolved) {
                object.insert(field.response_key().to_string(), value);
                errors.extend(field_errors);
            }
            (Value::Object(object), errors)
        }
        .boxed()
    }

    async fn resolve_field(
        &self,
        type_name: &str,
        field: &FieldSelection,
        parent: &Value,
        mut path: Vec<PathSegment>,
    ) -> Completed {
        path.push(PathSegment::Key(field.response_key().to_string()));

        let Some(descriptor) = self.schema.type_field_map().field(type_name, &field.name) else {
            let error = FieldError::new(format!(
                "Cannot query field '{}' on type '{}'",
                field.name, type_name
            ))
            .with_path(path);
            return (Value::Null, vec![error]);
        };

        let coordinate = FieldCoordinate::new(type_name, field.name.clone());
        trace!(field = %coordinate, "resolving");
        let invocation = FieldInvocation {
            parent: parent.clone(),
            args: Value::Object(field.arguments.clone()),
            context: self.context.clone(),
            info: ResolveInfo {
                parent_type: type_name.to_string(),
                field_name: field.name.clone(),
                response_key: field.response_key().to_string(),
                return_type: descriptor.output_type.clone(),
                path: path.clone(),
            },
        };

        let resolver = self.schema.resolver(&coordinate);
        match resolver(invocation).await {
            Ok(value) => self.complete(descriptor, field, value, path).await,
            Err(error) => {
                let error = if error.path.is_some() {
                    error
                } else {
                    error.with_path(path)
                };
                (Value::Null, vec![error])
            }
        }
    }

    async fn complete(
        &self,
        descriptor: &FieldDescriptor,
        field: &FieldSelection,
        value: Value,
        path: Vec<PathSegment>,
    ) -> Completed {
        let map = self.schema.type_field_map();
        if field.selection_set.is_empty() || !map.has_type(&descriptor.output_type) {
            return (value, Vec::new());
        }
        let output_type = descriptor.output_type.as_str();
        match value {
            Value::Null => (Value::Null, Vec::new()),
            Value::Array(items) => {
                let completed = join_all(items.iter().enumerate().map(|(index, item)| {
                    let mut item_path = path.clone();
                    item_path.push(PathSegment::Index(index));
                    async move {
                        if item.is_null() {
                            (Value::Null, Vec::new())
                        } else {
                            self.select(output_type, &field.selection_set, item, item_path)
                                .await
                        }
                    }
                }))
                .await;
                let mut values = Vec::with_capacity(completed.len());
                let mut errors = Vec::new();
                for (value, item_errors) in completed {
                    values.push(value);
                    errors.extend(item_errors);
                }
                (Value::Array(values), errors)
            }
            object => {
                self.select(output_type, &field.selection_set, &object, path)
                    .await
            }
        }
    }
}
