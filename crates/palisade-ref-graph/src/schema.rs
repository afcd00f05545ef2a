//! `GraphSchema`: an in-memory executable schema.
//!
//! Types and fields come from a [`TypeFieldMap`]; each field has an optional
//! resolver. Fields without one read their value out of the parent object.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use palisade_contracts::{
    coordinate::FieldCoordinate,
    execution::ExecutionResult,
    schema::{FieldDescriptor, TypeFieldMap},
    selection::Document,
};
use palisade_core::{
    ExecutableSchema, FieldInvocation, FieldMiddleware, FieldResolver, FieldResult, RequestContext,
};

use crate::executor::Executor;

/// How fields without an explicit resolver read the parent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// `parent[field_name]`.
    FieldName,
    /// `parent[response_key]`, then `parent[field_name]`. Used by rebuilt
    /// schemas, whose parent values are previous results.
    ResponseKey,
}

/// An in-memory schema. Cheap to clone.
#[derive(Clone)]
pub struct GraphSchema {
    map: Arc<TypeFieldMap>,
    resolvers: Arc<BTreeMap<FieldCoordinate, FieldResolver>>,
    projection: Projection,
}

impl GraphSchema {
    pub fn builder(query_type: impl Into<String>) -> GraphSchemaBuilder {
        GraphSchemaBuilder {
            map: TypeFieldMap::new(query_type),
            resolvers: BTreeMap::new(),
        }
    }

    /// A schema with no explicit resolvers.
    pub fn from_map(map: TypeFieldMap) -> Self {
        Self {
            map: Arc::new(map),
            resolvers: Arc::new(BTreeMap::new()),
            projection: Projection::FieldName,
        }
    }

    /// The resolver that runs for `coordinate`.
    pub fn resolver(&self, coordinate: &FieldCoordinate) -> FieldResolver {
        match self.resolvers.get(coordinate) {
            Some(resolver) => Arc::clone(resolver),
            None => projection_resolver(self.projection),
        }
    }
}

#[async_trait]
impl ExecutableSchema for GraphSchema {
    fn type_field_map(&self) -> &TypeFieldMap {
        &self.map
    }

    fn wrap_field_resolver(&self, coordinate: &FieldCoordinate, middleware: FieldMiddleware) -> Self {
        let inner = self.resolver(coordinate);
        let wrapped: FieldResolver =
            Arc::new(move |invocation: FieldInvocation| middleware(Arc::clone(&inner), invocation));
        let mut resolvers = (*self.resolvers).clone();
        resolvers.insert(coordinate.clone(), wrapped);
        Self {
            map: Arc::clone(&self.map),
            resolvers: Arc::new(resolvers),
            projection: self.projection,
        }
    }

    async fn execute(&self, document: &Document, root: Value, context: RequestContext) -> ExecutionResult {
        Executor::new(self, context).run(document, root).await
    }

    fn rebuild(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
            resolvers: Arc::new(BTreeMap::new()),
            projection: Projection::ResponseKey,
        }
    }
}

/// The resolver used for fields that have none.
pub fn projection_resolver(projection: Projection) -> FieldResolver {
    Arc::new(move |invocation: FieldInvocation| {
        let parent = &invocation.parent;
        let value = match projection {
            Projection::FieldName => parent.get(&invocation.info.field_name),
            Projection::ResponseKey => parent
                .get(&invocation.info.response_key)
                .or_else(|| parent.get(&invocation.info.field_name)),
        };
        let value = value.cloned().unwrap_or(Value::Null);
        async move { Ok(value) }.boxed()
    })
}

// ── Builder ───────────────────────────────────────────────────────────────────

pub struct GraphSchemaBuilder {
    map: TypeFieldMap,
    resolvers: BTreeMap<FieldCoordinate, FieldResolver>,
}

impl GraphSchemaBuilder {
    /// Declare a field that projects from its parent.
    pub fn field(mut self, type_name: &str, field: FieldDescriptor) -> Self {
        self.map.insert_field(type_name, field);
        self
    }

    /// Declare a field with an async resolver.
    pub fn resolver<F, Fut>(mut self, type_name: &str, field: FieldDescriptor, resolve: F) -> Self
    where
        F: Fn(FieldInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FieldResult> + Send + 'static,
    {
        let coordinate = FieldCoordinate::new(type_name, field.name.clone());
        self.map.insert_field(type_name, field);
        let resolver: FieldResolver =
            Arc::new(move |invocation: FieldInvocation| resolve(invocation).boxed());
        self.resolvers.insert(coordinate, resolver);
        self
    }

    pub fn build(self) -> GraphSchema {
        GraphSchema {
            map: Arc::new(self.map),
            resolvers: Arc::new(self.resolvers),
            projection: Projection::FieldName,
        }
    }
}
