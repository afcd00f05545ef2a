//! Request execution against a shielded schema.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use palisade_contracts::{
    coordinate::FragmentRequirement,
    error::PalisadeResult,
    execution::{ExecutionResult, FieldError},
    selection::Document,
};
use palisade_core::{parse_document, ExecutableSchema, RequestContext};

use crate::rewrite::{is_requested, reserved_alias, rewrite_document, INTERNAL_ALIAS_PREFIX};

/// A host schema with authorization middleware attached.
///
/// When some field's rule needs fragment data, a request runs twice: first
/// against `pass_one` (rules without fragments, document rewritten to fetch
/// fragment data), then against `pass_two` (projection over pass-one data,
/// fragment rules only). Otherwise a single pass runs.
#[derive(Clone)]
pub struct ShieldedSchema<S> {
    pass_one: S,
    pass_two: Option<S>,
    requirements: Arc<Vec<FragmentRequirement>>,
}

impl<S: ExecutableSchema> ShieldedSchema<S> {
    pub(crate) fn new(
        pass_one: S,
        pass_two: Option<S>,
        requirements: Vec<FragmentRequirement>,
    ) -> Self {
        Self {
            pass_one,
            pass_two,
            requirements: Arc::new(requirements),
        }
    }

    pub fn requirements(&self) -> &[FragmentRequirement] {
        &self.requirements
    }

    pub fn is_two_pass(&self) -> bool {
        self.pass_two.is_some()
    }

    /// Execute `document`. `context` must be fresh for every request.
    ///
    /// In two-pass mode, documents using [`INTERNAL_ALIAS_PREFIX`] aliases
    /// are rejected, and first-pass errors on fields only the rewrite added
    /// are dropped.
    pub async fn execute(
        &self,
        document: &Document,
        root: Value,
        context: RequestContext,
    ) -> ExecutionResult {
        let Some(pass_two) = &self.pass_two else {
            return self.pass_one.execute(document, root, context).await;
        };
        if let Some(alias) = reserved_alias(document) {
            warn!(alias, "document uses a reserved alias");
            return ExecutionResult {
                errors: vec![FieldError::new(format!(
                    "alias '{}' is reserved: names starting with '{}' are used internally",
                    alias, INTERNAL_ALIAS_PREFIX
                ))],
                ..ExecutionResult::default()
            };
        }

        let rewritten = rewrite_document(document, &self.requirements, self.pass_one.type_field_map());
        let mut first = self.pass_one.execute(&rewritten, root, context.clone()).await;
        let requested = document.selection_set.merged();
        let before = first.errors.len();
        first.errors.retain(|error| {
            error
                .path
                .as_deref()
                .map_or(true, |path| is_requested(&requested, path))
        });
        debug!(
            errors = first.errors.len(),
            dropped = before - first.errors.len(),
            "first pass complete; running fragment rules"
        );
        let second_root = first.data.clone().unwrap_or(Value::Null);
        let second = pass_two.execute(document, second_root, context).await;
        merge_results(first, second)
    }

    /// Parse `source` and execute it.
    pub async fn execute_query(
        &self,
        source: &str,
        root: Value,
        context: RequestContext,
    ) -> PalisadeResult<ExecutionResult> {
        let document = parse_document(source)?;
        Ok(self.execute(&document, root, context).await)
    }
}

/// Combine the results of both passes.
///
/// Data comes from the second pass, errors from both in order, and
/// extensions are merged key by key with the second pass winning.
pub fn merge_results(first: ExecutionResult, second: ExecutionResult) -> ExecutionResult {
    let mut errors = first.errors;
    errors.extend(second.errors);
    let mut extensions = first.extensions;
    extensions.extend(second.extensions);
    ExecutionResult {
        data: second.data,
        errors,
        extensions,
    }
}
