//! The host execution engine, as seen by palisade.
//!
//! palisade never fetches data or walks a selection itself. It needs four
//! things from the engine that owns the schema:
//!
//! - `type_field_map`: read-only enumeration of object types and fields
//! - `wrap_field_resolver`: compose a field's resolver with a middleware
//! - `execute`: run a document against a root value and context
//! - `rebuild`: a schema with the same types whose resolvers project
//!   fields out of the parent value (used for the second execution pass)

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use palisade_contracts::{
    coordinate::FieldCoordinate,
    execution::{ExecutionResult, FieldError},
    schema::TypeFieldMap,
    selection::Document,
};

use crate::context::{FieldInvocation, RequestContext};

/// What a field resolver settles to.
pub type FieldResult = Result<Value, FieldError>;

/// A field resolver.
pub type FieldResolver = Arc<dyn Fn(FieldInvocation) -> BoxFuture<'static, FieldResult> + Send + Sync>;

/// A function wrapped around a field resolver. Receives the resolver it
/// wraps and decides whether, and how, to call it.
pub type FieldMiddleware =
    Arc<dyn Fn(FieldResolver, FieldInvocation) -> BoxFuture<'static, FieldResult> + Send + Sync>;

/// A schema the host engine can execute.
///
/// Implementations are values: wrapping a resolver returns a new schema and
/// leaves the original untouched.
#[async_trait]
pub trait ExecutableSchema: Clone + Send + Sync + 'static {
    fn type_field_map(&self) -> &TypeFieldMap;

    /// A copy of this schema with `coordinate`'s resolver wrapped by
    /// `middleware`.
    fn wrap_field_resolver(&self, coordinate: &FieldCoordinate, middleware: FieldMiddleware) -> Self;

    /// Wrap many resolvers at once.
    fn wrap_field_resolvers(&self, middleware: BTreeMap<FieldCoordinate, FieldMiddleware>) -> Self {
        middleware
            .into_iter()
            .fold(self.clone(), |schema, (coordinate, mw)| {
                schema.wrap_field_resolver(&coordinate, mw)
            })
    }

    /// Execute `document` against `root`.
    ///
    /// Field failures are reported in `ExecutionResult::errors` with the
    /// failed field nulled; they never abort sibling fields.
    async fn execute(&self, document: &Document, root: Value, context: RequestContext) -> ExecutionResult;

    /// A schema built from this schema's description: same types and fields,
    /// every resolver replaced by projection from the parent value.
    fn rebuild(&self) -> Self;
}
