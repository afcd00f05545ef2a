//! Scenario 1: Secret Code
//!
//! `Query.secret` is guarded by a rule that checks the code presented in the
//! request context. The check awaits a simulated lookup.
//!
//! `Query.vault` is guarded by a plain check on its own `code` argument.
//!
//! Case A: correct code       → value returned
//! Case B: wrong code         → reasoned denial
//! Case C: no code at all     → predicate fault, hidden unless `debug`
//! Case D: vault argument     → value with the right code, fallback error otherwise

use std::time::Duration;

use serde_json::{json, Value};

use palisade_contracts::{
    error::PalisadeResult, execution::ExecutionResult, result::RuleResult,
    schema::FieldDescriptor,
};
use palisade_core::{rule, CachePolicy, RequestContext, RuleFault, ShieldRule};
use palisade_shield::{build_authorized_schema, ShieldedSchema};
use palisade_tree::{RuleTree, ShieldOptions, ShieldSettings};

use crate::{mock_data::SECRET_CODE, schema::GraphSchema};

const QUERY: &str = "{ greeting secret }";

/// `Query.vault` opened with `code`.
pub fn vault_query(code: &str) -> String {
    format!(r#"{{ vault(code: "{}") }}"#, code)
}

pub fn schema() -> GraphSchema {
    GraphSchema::builder("Query")
        .resolver("Query", FieldDescriptor::new("greeting", "String"), |_inv| async {
            Ok(json!("Hello"))
        })
        .resolver("Query", FieldDescriptor::new("secret", "String"), |_inv| async {
            Ok(json!("the treasure is under the old oak"))
        })
        .resolver(
            "Query",
            FieldDescriptor::new("vault", "String").argument("code"),
            |_inv| async { Ok(json!("gold bars")) },
        )
        .build()
}

/// Authorizes when `context.code` matches; faults when no code was sent.
pub fn has_secret_code() -> ShieldRule {
    rule().name("hasSecretCode").resolve(|inv| async move {
        // Simulated credential lookup.
        tokio::time::sleep(Duration::from_millis(5)).await;
        match inv.context.data().get("code").and_then(Value::as_str) {
            Some(code) if code == SECRET_CODE => Ok(RuleResult::Authorized),
            Some(_) => Ok(RuleResult::reason("that code does not open this field")),
            None => Err(RuleFault::new("no secret code presented")),
        }
    })
}

/// Authorizes when the field's own `code` argument matches.
pub fn code_argument_matches() -> ShieldRule {
    rule()
        .name("codeArgumentMatches")
        .cache(CachePolicy::Strict)
        .check(|inv| *inv.arg("code") == SECRET_CODE)
}

pub fn rule_tree() -> RuleTree {
    RuleTree::builder()
        .field("Query", "secret", has_secret_code())
        .field("Query", "vault", code_argument_matches())
        .build()
}

pub fn shielded(options: ShieldOptions) -> PalisadeResult<ShieldedSchema<GraphSchema>> {
    build_authorized_schema(schema(), &rule_tree(), options)
}

pub async fn run_query(
    shield: &ShieldedSchema<GraphSchema>,
    context: Value,
) -> PalisadeResult<ExecutionResult> {
    run_document(shield, QUERY, context).await
}

pub async fn run_document(
    shield: &ShieldedSchema<GraphSchema>,
    query: &str,
    context: Value,
) -> PalisadeResult<ExecutionResult> {
    shield
        .execute_query(query, Value::Null, RequestContext::new(context))
        .await
}

/// Run Scenario 1: Secret Code.
pub async fn run_scenario() -> PalisadeResult<()> {
    println!("=== Scenario 1: Secret Code ===");
    println!();

    let options = ShieldSettings::from_toml_str(super::SHIELD_SETTINGS)?.into_options();
    let shield = shielded(options)?;
    let debug_shield = shielded(ShieldOptions::default().debug(true))?;

    let cases = [
        ("A", "correct code", json!({ "code": SECRET_CODE }), &shield),
        ("B", "wrong code", json!({ "code": "abracadabra" }), &shield),
        ("C", "no code", json!({}), &shield),
        ("C'", "no code, debug", json!({}), &debug_shield),
    ];
    for (label, description, context, shield) in cases {
        let result = run_query(shield, context).await?;
        println!("  Case {}: {}", label, description);
        println!("  Data:   {}", result.data.clone().unwrap_or(Value::Null));
        for error in &result.errors {
            println!("  Error:  {}", error);
        }
        println!();
    }

    for code in [SECRET_CODE, "abracadabra"] {
        let query = vault_query(code);
        let result = run_document(&shield, &query, json!({})).await?;
        println!("  Case D: vault argument '{}'", code);
        println!("  Data:   {}", result.data.clone().unwrap_or(Value::Null));
        for error in &result.errors {
            println!("  Error:  {}", error);
        }
        println!();
    }

    println!("  Scenario 1 complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_shield() -> ShieldedSchema<GraphSchema> {
        shielded(ShieldOptions::default()).unwrap()
    }

    /// The correct code reveals the secret.
    #[tokio::test]
    async fn test_correct_code_reveals_secret() {
        let result = run_query(&default_shield(), json!({ "code": SECRET_CODE }))
            .await
            .unwrap();
        assert!(result.errors.is_empty());
        assert_eq!(
            result.pointer("secret"),
            Some(&json!("the treasure is under the old oak"))
        );
        assert_eq!(result.pointer("greeting"), Some(&json!("Hello")));
    }

    /// A wrong code nulls the field and surfaces the reason.
    #[tokio::test]
    async fn test_wrong_code_surfaces_reason() {
        let result = run_query(&default_shield(), json!({ "code": "nope" }))
            .await
            .unwrap();
        assert_eq!(result.pointer("secret"), Some(&Value::Null));
        assert_eq!(result.pointer("greeting"), Some(&json!("Hello")));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "that code does not open this field");
        assert_eq!(result.errors[0].path_string().as_deref(), Some("secret"));
    }

    /// A predicate fault is hidden behind the fallback error by default.
    #[tokio::test]
    async fn test_missing_code_fault_is_hidden() {
        let result = run_query(&default_shield(), json!({})).await.unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "Not Authorised!");
    }

    /// With debug on, the fault is returned verbatim.
    #[tokio::test]
    async fn test_missing_code_fault_verbatim_in_debug() {
        let shield = shielded(ShieldOptions::default().debug(true)).unwrap();
        let result = run_query(&shield, json!({})).await.unwrap();
        assert_eq!(result.errors[0].message, "no secret code presented");
    }

    /// A plain denial on the field argument nulls the field with the
    /// default message; the right argument returns the resolver's value.
    #[tokio::test]
    async fn test_vault_checks_its_argument() {
        let shield = default_shield();

        let open = run_document(&shield, &vault_query(SECRET_CODE), json!({}))
            .await
            .unwrap();
        assert!(open.errors.is_empty());
        assert_eq!(open.pointer("vault"), Some(&json!("gold bars")));

        let shut = run_document(&shield, &vault_query("y"), json!({}))
            .await
            .unwrap();
        assert_eq!(shut.data, Some(json!({ "vault": null })));
        assert_eq!(shut.errors.len(), 1);
        assert_eq!(shut.errors[0].message, "Not Authorised!");
        assert_eq!(shut.errors[0].path_string().as_deref(), Some("vault"));
    }

    /// Aliased accesses with different arguments are judged separately.
    #[tokio::test]
    async fn test_vault_arguments_per_alias() {
        let query = format!(r#"{{ a: vault(code: "{}") b: vault(code: "y") }}"#, SECRET_CODE);
        let result = run_document(&default_shield(), &query, json!({}))
            .await
            .unwrap();
        assert_eq!(result.data, Some(json!({ "a": "gold bars", "b": null })));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path_string().as_deref(), Some("b"));
    }

    /// The settings file shipped with the scenarios parses.
    #[test]
    fn test_shipped_settings_parse() {
        let settings = ShieldSettings::from_toml_str(super::super::SHIELD_SETTINGS).unwrap();
        assert_eq!(settings, ShieldSettings::default());
    }

    /// The scenario uses a single pass: no rule needs fragment data.
    #[test]
    fn test_single_pass() {
        assert!(!default_shield().is_two_pass());
    }
}
